/// Structural validation of generated content.
///
/// Every check runs on every call; results list all violations found, in
/// check order. Content is only ever borrowed immutably.

use rustc_hash::FxHashSet;
use std::fmt;

use crate::core::flood::{self, ReachSet};
use crate::core::pathfind::{find_path, Neighborhood, PathOptions};
use crate::schema::content::{ContentType, Maze, TerrainMap};
use crate::schema::grid::Coord;
use crate::schema::level::{CorridorStyle, Level, RoomId};

/// A structural problem that makes content unusable.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    WrongContent { expected: ContentType },
    EntranceBlocked { at: Coord },
    UnreachableExit { at: Coord },
    UnreachableRoom { id: RoomId },
    UnreachableObjective { id: String },
    TooFewRooms { found: usize, required: usize },
    OrphanCorridor { index: usize, from: RoomId, to: RoomId },
    BrokenCorridor { index: usize, at: Coord },
    IllegalObjective { id: String, reason: &'static str },
    MissingObjectives,
    IllegalItem { id: String, reason: &'static str },
    MazePassageCount { expected: usize, found: usize },
    MazeCycle,
    MazeUnsolvable,
    RegionTooSmall { at: Coord, size: usize, min: usize },
    UnreachableFeature { index: usize, at: Coord },
    FeatureSpacing { first: usize, second: usize, distance: u32 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongContent { expected } => write!(f, "expected {} content", expected),
            Self::EntranceBlocked { at } => write!(f, "entrance {:?} is not passable", at),
            Self::UnreachableExit { at } => write!(f, "exit {:?} is unreachable", at),
            Self::UnreachableRoom { id } => write!(f, "room {} is unreachable", id.0),
            Self::UnreachableObjective { id } => write!(f, "objective '{}' is unreachable", id),
            Self::TooFewRooms { found, required } => {
                write!(f, "only {} room(s), at least {} required", found, required)
            }
            Self::OrphanCorridor { index, from, to } => write!(
                f,
                "corridor {} does not join room {} to room {}",
                index, from.0, to.0
            ),
            Self::BrokenCorridor { index, at } => {
                write!(f, "corridor {} is broken at {:?}", index, at)
            }
            Self::IllegalObjective { id, reason } => write!(f, "objective '{}' {}", id, reason),
            Self::MissingObjectives => f.write_str("no objectives were placed"),
            Self::IllegalItem { id, reason } => write!(f, "item '{}' {}", id, reason),
            Self::MazePassageCount { expected, found } => {
                write!(f, "maze has {} passages, expected {}", found, expected)
            }
            Self::MazeCycle => f.write_str("maze contains a cycle"),
            Self::MazeUnsolvable => f.write_str("maze exit is unreachable from its entrance"),
            Self::RegionTooSmall { at, size, min } => write!(
                f,
                "open region at {:?} has {} cell(s), minimum is {}",
                at, size, min
            ),
            Self::UnreachableFeature { index, at } => {
                write!(f, "feature {} at {:?} is unreachable", index, at)
            }
            Self::FeatureSpacing {
                first,
                second,
                distance,
            } => write!(
                f,
                "features {} and {} are only {} cell(s) apart",
                first, second, distance
            ),
        }
    }
}

/// Non-fatal observations about accepted content.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    CorridorFallback { from: RoomId, to: RoomId, style: CorridorStyle },
    LongCorridor { from: RoomId, to: RoomId, length: usize, ideal: usize },
    RoomShortfall { placed: usize, requested: usize },
    FeatureShortfall { placed: usize, requested: usize },
    ItemShortfall { placed: usize, requested: usize },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorridorFallback { from, to, style } => write!(
                f,
                "{} corridor between rooms {} and {} fell back to minimal",
                style.name(),
                from.0,
                to.0
            ),
            Self::LongCorridor {
                from,
                to,
                length,
                ideal,
            } => write!(
                f,
                "corridor between rooms {} and {} is {} cells (ideal {})",
                from.0, to.0, length, ideal
            ),
            Self::RoomShortfall { placed, requested } => {
                write!(f, "placed {} of {} rooms", placed, requested)
            }
            Self::FeatureShortfall { placed, requested } => {
                write!(f, "placed {} of {} features", placed, requested)
            }
            Self::ItemShortfall { placed, requested } => {
                write!(f, "placed {} of {} items", placed, requested)
            }
        }
    }
}

/// Outcome of validating one piece of content. Never partial: `ok` is
/// true exactly when `violations` is empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationResult {
    pub ok: bool,
    pub violations: Vec<Violation>,
    pub notices: Vec<Notice>,
}

impl ValidationResult {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            ok: violations.is_empty(),
            violations,
            notices: Vec::new(),
        }
    }

    pub fn with_notices(mut self, notices: Vec<Notice>) -> Self {
        self.notices.extend(notices);
        self
    }
}

/// Level-specific structural requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRules {
    pub min_rooms: usize,
    pub require_objectives: bool,
}

impl Default for LevelRules {
    fn default() -> Self {
        Self {
            min_rooms: 1,
            require_objectives: false,
        }
    }
}

fn entrance_reach(level: &Level, out: &mut Vec<Violation>) -> ReachSet {
    if !level.grid.is_passable(level.entrance) {
        out.push(Violation::EntranceBlocked { at: level.entrance });
    }
    flood::reachable(&level.grid, level.entrance, Neighborhood::Four)
}

/// Every room, the exit and every required objective must be reachable
/// from the entrance.
pub fn validate_connectivity(level: &Level) -> Vec<Violation> {
    let mut out = Vec::new();
    let reach = entrance_reach(level, &mut out);
    connectivity_with(level, &reach, &mut out);
    out
}

fn connectivity_with(level: &Level, reach: &ReachSet, out: &mut Vec<Violation>) {
    if !reach.contains(level.exit) {
        out.push(Violation::UnreachableExit { at: level.exit });
    }
    for room in &level.rooms {
        if !room.bounds.cells().any(|c| reach.contains(c)) {
            out.push(Violation::UnreachableRoom { id: room.id });
        }
    }
    for objective in level.objectives.iter().filter(|o| o.required) {
        if !reach.contains(objective.at) {
            out.push(Violation::UnreachableObjective {
                id: objective.id.clone(),
            });
        }
    }
}

fn corridor_checks(level: &Level, out: &mut Vec<Violation>) {
    for (index, corridor) in level.corridors.iter().enumerate() {
        let joins = |id: RoomId, end: Option<Coord>| match (level.room(id), end) {
            (Some(room), Some(at)) => room.bounds.contains(at),
            _ => false,
        };
        if !joins(corridor.from, corridor.start()) || !joins(corridor.to, corridor.end()) {
            out.push(Violation::OrphanCorridor {
                index,
                from: corridor.from,
                to: corridor.to,
            });
        }
        let mut previous: Option<Coord> = None;
        for &at in &corridor.path {
            let continuous = previous.map_or(true, |p| p.is_adjacent4(at));
            if !level.grid.is_passable(at) || !continuous {
                out.push(Violation::BrokenCorridor { index, at });
                break;
            }
            previous = Some(at);
        }
    }
}

fn objective_checks(level: &Level, rules: &LevelRules, out: &mut Vec<Violation>) {
    if rules.require_objectives && level.objectives.is_empty() {
        out.push(Violation::MissingObjectives);
    }
    let mut taken = FxHashSet::default();
    for objective in &level.objectives {
        let reason = if !level.grid.in_bounds(objective.at) {
            Some("is out of bounds")
        } else if !level.grid.is_passable(objective.at) {
            Some("is on an impassable cell")
        } else if objective.at == level.entrance {
            Some("is on the entrance")
        } else if !taken.insert(objective.at) {
            Some("shares a cell with another objective")
        } else {
            None
        };
        if let Some(reason) = reason {
            out.push(Violation::IllegalObjective {
                id: objective.id.clone(),
                reason,
            });
        }
    }
}

fn item_checks(level: &Level, reach: &ReachSet, out: &mut Vec<Violation>) {
    let objectives: FxHashSet<Coord> = level.objectives.iter().map(|o| o.at).collect();
    let mut taken = FxHashSet::default();
    for item in &level.items {
        let reason = if !level.grid.is_passable(item.at) {
            Some("is on an impassable cell")
        } else if !reach.contains(item.at) {
            Some("is unreachable")
        } else if objectives.contains(&item.at) {
            Some("is on an objective")
        } else if !taken.insert(item.at) {
            Some("shares a cell with another item")
        } else {
            None
        };
        if let Some(reason) = reason {
            out.push(Violation::IllegalItem {
                id: item.id.clone(),
                reason,
            });
        }
    }
}

/// Run every level check and report all violations.
pub fn validate_level(level: &Level, rules: &LevelRules) -> ValidationResult {
    let mut out = Vec::new();
    let reach = entrance_reach(level, &mut out);
    connectivity_with(level, &reach, &mut out);
    if level.rooms.len() < rules.min_rooms {
        out.push(Violation::TooFewRooms {
            found: level.rooms.len(),
            required: rules.min_rooms,
        });
    }
    corridor_checks(level, &mut out);
    objective_checks(level, rules, &mut out);
    item_checks(level, &reach, &mut out);
    ValidationResult::from_violations(out)
}

/// Passage count, acyclicity (for unbraided mazes) and solvability.
pub fn validate_maze(maze: &Maze) -> ValidationResult {
    let mut out = Vec::new();
    let cells = maze.cell_count();
    let passages = maze.passage_count();
    if maze.braid == 0.0 {
        if passages + 1 != cells {
            out.push(Violation::MazePassageCount {
                expected: cells.saturating_sub(1),
                found: passages,
            });
        }
        if maze.has_cycle() {
            out.push(Violation::MazeCycle);
        }
    } else if passages + 1 < cells {
        out.push(Violation::MazePassageCount {
            expected: cells.saturating_sub(1),
            found: passages,
        });
    }
    let entrance = Maze::cell_to_grid(maze.entrance);
    if !maze.grid.is_passable(entrance) {
        out.push(Violation::EntranceBlocked { at: entrance });
    }
    let exit = Maze::cell_to_grid(maze.exit);
    if find_path(&maze.grid, entrance, exit, PathOptions::default()).is_err() {
        out.push(Violation::MazeUnsolvable);
    }
    ValidationResult::from_violations(out)
}

/// Region sizes, entrance, feature reachability and spacing.
pub fn validate_terrain(map: &TerrainMap) -> ValidationResult {
    let mut out = Vec::new();
    if !map.grid.is_passable(map.entrance) {
        out.push(Violation::EntranceBlocked { at: map.entrance });
    }
    for region in flood::regions(&map.grid) {
        if region.size() < map.min_region_size {
            out.push(Violation::RegionTooSmall {
                at: region.first().unwrap_or(map.entrance),
                size: region.size(),
                min: map.min_region_size,
            });
        }
    }
    let reach = flood::reachable(&map.grid, map.entrance, Neighborhood::Four);
    for (index, feature) in map.features.iter().enumerate() {
        if !reach.contains(feature.at) {
            out.push(Violation::UnreachableFeature {
                index,
                at: feature.at,
            });
        }
    }
    for (i, a) in map.features.iter().enumerate() {
        for (j, b) in map.features.iter().enumerate().skip(i + 1) {
            let distance = a.at.chebyshev(b.at);
            if distance < map.feature_spacing {
                out.push(Violation::FeatureSpacing {
                    first: i,
                    second: j,
                    distance,
                });
            }
        }
    }
    ValidationResult::from_violations(out)
}
