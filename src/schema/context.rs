use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Smallest accepted grid side.
pub const MIN_DIMENSION: usize = 2;
/// Largest accepted grid side.
pub const MAX_DIMENSION: usize = 2048;

/// Climate/theme of generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Biome {
    Cavern,
    Forest,
    Swamp,
    Desert,
    Tundra,
    Volcanic,
}

impl Biome {
    /// The neighbouring biome on the wet side of the band ordering.
    pub fn wetter(&self) -> Biome {
        match self {
            Self::Desert => Self::Forest,
            Self::Volcanic => Self::Cavern,
            Self::Forest | Self::Cavern => Self::Swamp,
            Self::Tundra => Self::Cavern,
            Self::Swamp => Self::Swamp,
        }
    }

    /// The neighbouring biome on the dry side of the band ordering.
    pub fn drier(&self) -> Biome {
        match self {
            Self::Swamp => Self::Forest,
            Self::Forest => Self::Desert,
            Self::Cavern => Self::Volcanic,
            Self::Tundra => Self::Desert,
            Self::Desert | Self::Volcanic => Self::Volcanic,
        }
    }

    /// Terrain used for open ground in this biome.
    pub fn floor_terrain(&self) -> super::grid::TerrainType {
        use super::grid::TerrainType;
        match self {
            Self::Swamp => TerrainType::ShallowWater,
            Self::Volcanic => TerrainType::Rubble,
            _ => TerrainType::Floor,
        }
    }
}

impl Default for Biome {
    fn default() -> Self {
        Self::Cavern
    }
}

/// Difficulty level, 1 (gentle) to 10 (brutal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Difficulty(pub u8);

impl Difficulty {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn is_valid(&self) -> bool {
        (Self::MIN..=Self::MAX).contains(&self.0)
    }

    /// Difficulty mapped onto `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        f64::from(self.0.clamp(Self::MIN, Self::MAX) - Self::MIN)
            / f64::from(Self::MAX - Self::MIN)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(3)
    }
}

/// Cooperative cancellation flag shared between a caller and one request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Named points in a request where cancellation is observed and errors are attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Setup,
    Terrain,
    Smoothing,
    Regions,
    Features,
    Biomes,
    Maze,
    Rooms,
    Corridors,
    Objectives,
    Items,
    Validation,
    Assembly,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Terrain => "terrain",
            Self::Smoothing => "smoothing",
            Self::Regions => "regions",
            Self::Features => "features",
            Self::Biomes => "biomes",
            Self::Maze => "maze",
            Self::Rooms => "rooms",
            Self::Corridors => "corridors",
            Self::Objectives => "objectives",
            Self::Items => "items",
            Self::Validation => "validation",
            Self::Assembly => "assembly",
        };
        f.write_str(name)
    }
}

/// Per-request parameters threaded through every generation stage.
///
/// A context belongs to exactly one request. The cancel token is the only
/// handle shared with the outside world.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub seed: u64,
    pub width: usize,
    pub height: usize,
    pub difficulty: Difficulty,
    pub biome: Biome,
    pub cancel: CancelToken,
}

impl GenerationContext {
    pub fn new(seed: u64, width: usize, height: usize) -> Self {
        Self {
            seed,
            width,
            height,
            difficulty: Difficulty::default(),
            biome: Biome::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_difficulty(mut self, difficulty: u8) -> Self {
        self.difficulty = Difficulty(difficulty);
        self
    }

    pub fn with_biome(mut self, biome: Biome) -> Self {
        self.biome = biome;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Copy of this context for a retry attempt, sharing the cancel token.
    pub fn reseeded(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }
}
