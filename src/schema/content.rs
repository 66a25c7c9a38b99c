use serde::{Deserialize, Serialize};
use std::fmt;

use super::context::Biome;
use super::grid::{Coord, FeatureKind, Grid, DIRS4};
use super::level::Level;

/// Tag used to look up a generator in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Terrain,
    Maze,
    Room,
    Quest,
    Item,
    /// Generators registered by the embedding application.
    Custom(&'static str),
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terrain => f.write_str("terrain"),
            Self::Maze => f.write_str("maze"),
            Self::Room => f.write_str("room"),
            Self::Quest => f.write_str("quest"),
            Self::Item => f.write_str("item"),
            Self::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// A placed terrain feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub kind: FeatureKind,
    pub at: Coord,
}

/// Cellular-automata terrain with features and biome bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainMap {
    pub grid: Grid,
    pub entrance: Coord,
    pub features: Vec<Feature>,
    /// Distinct biomes present, in band order.
    pub biomes: Vec<Biome>,
    /// Regions smaller than this were culled during generation.
    pub min_region_size: usize,
    pub feature_spacing: u32,
}

/// Passage bits of a maze cell, in `DIRS4` order.
pub const LINK_N: u8 = 1;
pub const LINK_E: u8 = 2;
pub const LINK_S: u8 = 4;
pub const LINK_W: u8 = 8;
pub const LINKS: [u8; 4] = [LINK_N, LINK_E, LINK_S, LINK_W];

/// A carved maze. `width`/`height` count maze cells; `grid` is the
/// rendered `(2w+1) x (2h+1)` wall/floor view of the same passages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maze {
    pub width: usize,
    pub height: usize,
    /// One passage bitmask per cell, row-major.
    pub links: Vec<u8>,
    pub entrance: Coord,
    pub exit: Coord,
    pub grid: Grid,
    pub braid: f64,
}

impl Maze {
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    pub fn in_bounds(&self, cell: Coord) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height
    }

    pub fn links_at(&self, cell: Coord) -> u8 {
        if self.in_bounds(cell) {
            self.links[cell.y as usize * self.width + cell.x as usize]
        } else {
            0
        }
    }

    /// Cells reachable in one step through a carved passage.
    pub fn open_neighbors(&self, cell: Coord) -> impl Iterator<Item = Coord> + '_ {
        let bits = self.links_at(cell);
        DIRS4
            .iter()
            .zip(LINKS)
            .filter(move |(_, bit)| bits & bit != 0)
            .map(move |(&(dx, dy), _)| cell.offset(dx, dy))
    }

    /// Number of carved passages; each edge is counted once.
    pub fn passage_count(&self) -> usize {
        self.links
            .iter()
            .map(|bits| usize::from(bits & LINK_E != 0) + usize::from(bits & LINK_S != 0))
            .sum()
    }

    /// Union-find over the passage edges; any edge joining an already
    /// joined pair closes a cycle.
    pub fn has_cycle(&self) -> bool {
        let mut parent: Vec<usize> = (0..self.cell_count()).collect();
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for (i, bits) in self.links.iter().enumerate() {
            let mut edges = [None, None];
            if bits & LINK_E != 0 {
                edges[0] = Some(i + 1);
            }
            if bits & LINK_S != 0 {
                edges[1] = Some(i + self.width);
            }
            for j in edges.into_iter().flatten() {
                if j >= parent.len() {
                    continue;
                }
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a == b {
                    return true;
                }
                parent[a] = b;
            }
        }
        false
    }

    /// Rendered-grid coordinate of a maze cell.
    pub fn cell_to_grid(cell: Coord) -> Coord {
        Coord::new(cell.x * 2 + 1, cell.y * 2 + 1)
    }
}

/// Generated content, one variant per output shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Content {
    Terrain(TerrainMap),
    Maze(Maze),
    Level(Level),
}

impl Content {
    pub fn grid(&self) -> &Grid {
        match self {
            Self::Terrain(t) => &t.grid,
            Self::Maze(m) => &m.grid,
            Self::Level(l) => &l.grid,
        }
    }

    /// Entrance in grid coordinates.
    pub fn entrance(&self) -> Coord {
        match self {
            Self::Terrain(t) => t.entrance,
            Self::Maze(m) => Maze::cell_to_grid(m.entrance),
            Self::Level(l) => l.entrance,
        }
    }

    pub fn as_level(&self) -> Option<&Level> {
        match self {
            Self::Level(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_maze(&self) -> Option<&Maze> {
        match self {
            Self::Maze(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_terrain(&self) -> Option<&TerrainMap> {
        match self {
            Self::Terrain(t) => Some(t),
            _ => None,
        }
    }
}
