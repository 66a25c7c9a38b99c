/// Grid primitives shared by every generator: coordinates, cells and the grid itself.

use serde::{Deserialize, Serialize};

use super::context::Biome;
use super::level::RoomId;

/// A cell coordinate. Signed so neighbour arithmetic never underflows;
/// bounds are checked against the owning grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn manhattan(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn chebyshev(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// True when `other` is one orthogonal step away.
    pub fn is_adjacent4(self, other: Coord) -> bool {
        self.manhattan(other) == 1
    }
}

/// Orthogonal steps in N, E, S, W order.
pub const DIRS4: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Moore neighbourhood offsets, orthogonal first so 4-connected
/// searches can take the prefix.
pub const DIRS8: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// What a cell is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainType {
    Wall,
    Floor,
    Corridor,
    Door,
    /// Difficult ground: passable at extra cost.
    Rubble,
    ShallowWater,
    DeepWater,
}

impl TerrainType {
    pub fn default_passable(&self) -> bool {
        !matches!(self, Self::Wall | Self::DeepWater)
    }

    /// Cost of stepping onto this terrain, `None` when impassable.
    pub fn movement_cost(&self) -> Option<u32> {
        match self {
            Self::Wall | Self::DeepWater => None,
            Self::Floor | Self::Corridor | Self::Door => Some(1),
            Self::ShallowWater => Some(2),
            Self::Rubble => Some(3),
        }
    }
}

/// Special map features placed by the terrain generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Spring,
    Shrine,
    Ore,
    Ruin,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 4] = [Self::Spring, Self::Shrine, Self::Ore, Self::Ruin];
}

/// Free-form annotations attached to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellMetadata {
    pub region: Option<u32>,
    pub biome: Option<Biome>,
    pub feature: Option<FeatureKind>,
    pub room: Option<RoomId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub terrain: TerrainType,
    pub passable: bool,
    pub metadata: CellMetadata,
}

impl Cell {
    pub fn new(terrain: TerrainType) -> Self {
        Self {
            terrain,
            passable: terrain.default_passable(),
            metadata: CellMetadata::default(),
        }
    }

    /// Cost of entering this cell, `None` when it blocks movement.
    pub fn movement_cost(&self) -> Option<u32> {
        if self.passable {
            Some(self.terrain.movement_cost().unwrap_or(1))
        } else {
            None
        }
    }
}

/// A fixed-size 2-D cell array. Dimensions never change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// A grid filled with `terrain`.
    pub fn filled(width: usize, height: usize, terrain: TerrainType) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::new(terrain); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn in_bounds(&self, at: Coord) -> bool {
        at.x >= 0 && at.y >= 0 && (at.x as usize) < self.width && (at.y as usize) < self.height
    }

    /// Row-major index of an in-bounds coordinate.
    pub fn index(&self, at: Coord) -> Option<usize> {
        if self.in_bounds(at) {
            Some(at.y as usize * self.width + at.x as usize)
        } else {
            None
        }
    }

    pub fn coord_of(&self, index: usize) -> Coord {
        Coord::new((index % self.width) as i32, (index / self.width) as i32)
    }

    pub fn get(&self, at: Coord) -> Option<&Cell> {
        self.index(at).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, at: Coord) -> Option<&mut Cell> {
        self.index(at).map(move |i| &mut self.cells[i])
    }

    pub fn is_passable(&self, at: Coord) -> bool {
        self.get(at).is_some_and(|c| c.passable)
    }

    /// Replace the terrain at `at`, resetting passability to the terrain default.
    /// Out-of-bounds writes are ignored and reported as `false`.
    pub fn set_terrain(&mut self, at: Coord, terrain: TerrainType) -> bool {
        match self.get_mut(at) {
            Some(cell) => {
                cell.terrain = terrain;
                cell.passable = terrain.default_passable();
                true
            }
            None => false,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// All coordinates in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.cells.len()).map(move |i| self.coord_of(i))
    }

    pub fn count_passable(&self) -> usize {
        self.cells.iter().filter(|c| c.passable).count()
    }

    /// In-bounds neighbours of `at` using the first `dirs` offsets.
    pub fn neighbors<'a>(
        &'a self,
        at: Coord,
        dirs: &'a [(i32, i32)],
    ) -> impl Iterator<Item = Coord> + 'a {
        dirs.iter()
            .map(move |&(dx, dy)| at.offset(dx, dy))
            .filter(move |c| self.in_bounds(*c))
    }

    /// Structural self-check: storage length matches the dimensions and no
    /// cell claims to be passable on terrain that can never be walked.
    pub fn check_integrity(&self) -> Result<(), String> {
        if self.cells.len() != self.width * self.height {
            return Err(format!(
                "grid storage holds {} cells, expected {}x{}",
                self.cells.len(),
                self.width,
                self.height
            ));
        }
        if let Some(i) = self
            .cells
            .iter()
            .position(|c| c.passable && c.terrain == TerrainType::Wall)
        {
            return Err(format!("wall cell at {:?} is marked passable", self.coord_of(i)));
        }
        Ok(())
    }
}
