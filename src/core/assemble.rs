/// Boundary between validated content and the world it is placed into.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::content::{Content, Maze};
use crate::schema::grid::{Coord, TerrainType};

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("content has no cells to assemble")]
    Empty,
    #[error("marker '{id}' at {at:?} lies outside the {width}x{height} fragment")]
    MarkerOutOfBounds {
        id: String,
        at: Coord,
        width: usize,
        height: usize,
    },
}

/// Turns validated content into an engine-specific fragment. Only ever
/// called with content that passed validation.
pub trait LevelAssembler {
    type Fragment;

    fn assemble_level(&self, content: &Content) -> Result<Self::Fragment, AssembleError>;
}

/// A named point of interest in an assembled fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    pub at: Coord,
}

/// A flat, engine-neutral tile map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldFragment {
    pub width: usize,
    pub height: usize,
    /// Row-major tile ids, see `TileAssembler::tile_id`.
    pub tiles: Vec<u8>,
    pub spawn: Coord,
    pub markers: Vec<Marker>,
}

impl WorldFragment {
    pub fn tile(&self, at: Coord) -> Option<u8> {
        if at.x < 0 || at.y < 0 || at.x as usize >= self.width || at.y as usize >= self.height {
            return None;
        }
        self.tiles.get(at.y as usize * self.width + at.x as usize).copied()
    }
}

/// Reference assembler producing a `WorldFragment`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileAssembler;

impl TileAssembler {
    pub fn tile_id(terrain: TerrainType) -> u8 {
        match terrain {
            TerrainType::Wall => 0,
            TerrainType::Floor => 1,
            TerrainType::Corridor => 2,
            TerrainType::Door => 3,
            TerrainType::Rubble => 4,
            TerrainType::ShallowWater => 5,
            TerrainType::DeepWater => 6,
        }
    }

    fn markers(content: &Content) -> Vec<Marker> {
        let marker = |id: String, at: Coord| Marker { id, at };
        match content {
            Content::Level(level) => {
                let mut out = vec![marker("exit".to_string(), level.exit)];
                out.extend(level.objectives.iter().map(|o| marker(o.id.clone(), o.at)));
                out.extend(level.items.iter().map(|i| marker(i.id.clone(), i.at)));
                out
            }
            Content::Maze(maze) => vec![marker("exit".to_string(), Maze::cell_to_grid(maze.exit))],
            Content::Terrain(map) => map
                .features
                .iter()
                .enumerate()
                .map(|(i, f)| marker(format!("feature-{}", i + 1), f.at))
                .collect(),
        }
    }
}

impl LevelAssembler for TileAssembler {
    type Fragment = WorldFragment;

    fn assemble_level(&self, content: &Content) -> Result<WorldFragment, AssembleError> {
        let grid = content.grid();
        if grid.is_empty() {
            return Err(AssembleError::Empty);
        }
        let markers = Self::markers(content);
        if let Some(m) = markers.iter().find(|m| !grid.in_bounds(m.at)) {
            return Err(AssembleError::MarkerOutOfBounds {
                id: m.id.clone(),
                at: m.at,
                width: grid.width(),
                height: grid.height(),
            });
        }
        Ok(WorldFragment {
            width: grid.width(),
            height: grid.height(),
            tiles: grid.cells().iter().map(|c| Self::tile_id(c.terrain)).collect(),
            spawn: content.entrance(),
            markers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::grid::Grid;
    use crate::schema::level::{Level, Objective, Rect, Room, RoomId};

    fn level() -> Level {
        let mut grid = Grid::filled(8, 6, TerrainType::Wall);
        let room = Room::new(RoomId(0), Rect::new(1, 1, 5, 4));
        for at in room.bounds.cells() {
            grid.set_terrain(at, TerrainType::Floor);
        }
        Level {
            grid,
            rooms: vec![room],
            corridors: Vec::new(),
            entrance: Coord::new(1, 1),
            exit: Coord::new(5, 4),
            objectives: vec![Objective {
                id: "quest-boss".to_string(),
                at: Coord::new(3, 2),
                required: true,
            }],
            items: Vec::new(),
        }
    }

    #[test]
    fn level_becomes_tiles_and_markers() {
        let fragment = TileAssembler.assemble_level(&Content::Level(level())).unwrap();
        assert_eq!((fragment.width, fragment.height), (8, 6));
        assert_eq!(fragment.tiles.len(), 48);
        assert_eq!(fragment.spawn, Coord::new(1, 1));
        assert_eq!(fragment.tile(Coord::new(0, 0)), Some(0));
        assert_eq!(fragment.tile(Coord::new(2, 2)), Some(1));
        let ids: Vec<&str> = fragment.markers.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["exit", "quest-boss"]);
    }

    #[test]
    fn out_of_bounds_marker_is_rejected() {
        let mut bad = level();
        bad.exit = Coord::new(20, 20);
        let err = TileAssembler.assemble_level(&Content::Level(bad)).unwrap_err();
        assert!(matches!(err, AssembleError::MarkerOutOfBounds { .. }));
    }
}
