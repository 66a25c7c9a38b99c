use serde::{Deserialize, Serialize};

use super::grid::{Coord, Grid};

/// Newtype wrapper for room IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub u32);

/// Axis-aligned rectangle in cell coordinates; `x..x+width`, `y..y+height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Coord {
        Coord::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn contains(&self, at: Coord) -> bool {
        at.x >= self.x && at.x < self.x + self.width && at.y >= self.y && at.y < self.y + self.height
    }

    /// Overlap test with `gap` cells of required clearance.
    pub fn intersects(&self, other: &Rect, gap: i32) -> bool {
        self.x - gap < other.x + other.width
            && other.x - gap < self.x + self.width
            && self.y - gap < other.y + other.height
            && other.y - gap < self.y + self.height
    }

    pub fn area(&self) -> i32 {
        self.width * self.height
    }

    /// Every cell of the rectangle in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Coord> {
        let Rect {
            x,
            y,
            width,
            height,
        } = *self;
        (y..y + height).flat_map(move |cy| (x..x + width).map(move |cx| Coord::new(cx, cy)))
    }
}

/// A placed room and the anchors corridors attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub bounds: Rect,
    pub anchors: Vec<Coord>,
}

impl Room {
    /// A room with anchors at the midpoints of its four edges (N, E, S, W).
    pub fn new(id: RoomId, bounds: Rect) -> Self {
        let c = bounds.center();
        let anchors = vec![
            Coord::new(c.x, bounds.y),
            Coord::new(bounds.x + bounds.width - 1, c.y),
            Coord::new(c.x, bounds.y + bounds.height - 1),
            Coord::new(bounds.x, c.y),
        ];
        Self {
            id,
            bounds,
            anchors,
        }
    }

    /// The anchor pair (self, other) with the smallest Manhattan distance.
    /// Ties resolve to the earliest pair in anchor order.
    pub fn closest_anchors(&self, other: &Room) -> (Coord, Coord) {
        let mut best = (self.bounds.center(), other.bounds.center());
        let mut best_distance = u32::MAX;
        for &a in &self.anchors {
            for &b in &other.anchors {
                let d = a.manhattan(b);
                if d < best_distance {
                    best_distance = d;
                    best = (a, b);
                }
            }
        }
        best
    }
}

/// Corridor routing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorridorStyle {
    Straight,
    Minimal,
    Windy,
    Organic,
}

impl CorridorStyle {
    pub const ALL: [CorridorStyle; 4] = [Self::Straight, Self::Minimal, Self::Windy, Self::Organic];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Straight => "straight",
            Self::Minimal => "minimal",
            Self::Windy => "windy",
            Self::Organic => "organic",
        }
    }
}

impl Default for CorridorStyle {
    fn default() -> Self {
        Self::Straight
    }
}

/// A routed corridor. Owned by the level, not by either room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corridor {
    pub from: RoomId,
    pub to: RoomId,
    pub style: CorridorStyle,
    pub path: Vec<Coord>,
}

impl Corridor {
    pub fn start(&self) -> Option<Coord> {
        self.path.first().copied()
    }

    pub fn end(&self) -> Option<Coord> {
        self.path.last().copied()
    }
}

/// A location the player must (or may) reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub at: Coord,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Potion,
    Key,
    Gold,
    Relic,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [Self::Potion, Self::Key, Self::Gold, Self::Relic];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpawn {
    pub id: String,
    pub kind: ItemKind,
    pub at: Coord,
}

/// A room-and-corridor dungeon level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub grid: Grid,
    pub rooms: Vec<Room>,
    pub corridors: Vec<Corridor>,
    pub entrance: Coord,
    pub exit: Coord,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    #[serde(default)]
    pub items: Vec<ItemSpawn>,
}

impl Level {
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// The room whose bounds contain `at`.
    pub fn room_at(&self, at: Coord) -> Option<&Room> {
        self.rooms.iter().find(|r| r.bounds.contains(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_intersection_respects_gap() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(5, 0, 3, 3);
        assert!(!a.intersects(&b, 0));
        assert!(!a.intersects(&b, 1));
        assert!(a.intersects(&b, 2));
    }

    #[test]
    fn rect_cells_cover_area() {
        let r = Rect::new(2, 3, 3, 2);
        let cells: Vec<_> = r.cells().collect();
        assert_eq!(cells.len() as i32, r.area());
        assert!(cells.iter().all(|c| r.contains(*c)));
        assert_eq!(cells[0], Coord::new(2, 3));
    }

    #[test]
    fn room_anchors_lie_inside_bounds() {
        let room = Room::new(RoomId(0), Rect::new(4, 4, 5, 3));
        assert_eq!(room.anchors.len(), 4);
        assert!(room.anchors.iter().all(|a| room.bounds.contains(*a)));
    }

    #[test]
    fn closest_anchors_face_each_other() {
        let left = Room::new(RoomId(0), Rect::new(1, 1, 3, 3));
        let right = Room::new(RoomId(1), Rect::new(10, 1, 3, 3));
        let (a, b) = left.closest_anchors(&right);
        assert_eq!(a, Coord::new(3, 2));
        assert_eq!(b, Coord::new(10, 2));
    }
}
