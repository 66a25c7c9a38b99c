/// Generation parameters, loadable from RON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::context::Biome;
use crate::schema::level::CorridorStyle;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// A biome assigned to noise values below `upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiomeBand {
    pub upper: f64,
    pub biome: Biome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Probability that a cell starts as wall.
    pub density: f64,
    pub iterations: u32,
    /// Wall neighbours needed for an open cell to fill in.
    pub birth_limit: u8,
    /// Wall neighbours needed for a wall to survive.
    pub death_limit: u8,
    /// Open regions smaller than this are filled.
    pub min_region_size: usize,
    /// Join surviving side regions to the main one instead of filling them.
    pub connect_regions: bool,
    pub solid_border: bool,
    pub feature_count: u32,
    /// Minimum Chebyshev distance between features.
    pub feature_spacing: u32,
    pub feature_attempts: u32,
    /// Lattice spacing of the biome noise, in cells.
    pub biome_scale: u32,
    /// Explicit bands; derived from the request biome when absent.
    pub biome_bands: Option<Vec<BiomeBand>>,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            density: 0.45,
            iterations: 4,
            birth_limit: 5,
            death_limit: 4,
            min_region_size: 3,
            connect_regions: true,
            solid_border: true,
            feature_count: 4,
            feature_spacing: 4,
            feature_attempts: 200,
            biome_scale: 8,
            biome_bands: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MazeParams {
    /// Fraction of dead ends that receive an extra passage.
    pub braid: f64,
}

impl Default for MazeParams {
    fn default() -> Self {
        Self { braid: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomParams {
    pub max_rooms: u32,
    pub min_rooms: u32,
    pub min_size: u32,
    pub max_size: u32,
    pub placement_attempts: u32,
    /// Loop corridors added on top of the spanning tree.
    pub extra_connections: u32,
    pub style: CorridorStyle,
}

impl Default for RoomParams {
    fn default() -> Self {
        Self {
            max_rooms: 10,
            min_rooms: 2,
            min_size: 3,
            max_size: 8,
            placement_attempts: 200,
            extra_connections: 1,
            style: CorridorStyle::Straight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorParams {
    /// Budget multiplier over the ideal (manhattan + 1) length.
    pub budget_factor: f64,
    pub budget_slack: usize,
    /// Largest lateral deviation of a windy corridor.
    pub max_offset: u32,
    /// Probability an organic walk keeps its heading.
    pub momentum: f64,
    /// Every n-th organic step heads straight for the target.
    pub correction_interval: u32,
    /// Hard cap on organic walk steps.
    pub max_walk: usize,
    /// Corridors longer than this multiple of the ideal raise a notice.
    pub long_corridor_ratio: f64,
}

impl Default for CorridorParams {
    fn default() -> Self {
        Self {
            budget_factor: 3.0,
            budget_slack: 8,
            max_offset: 3,
            momentum: 0.7,
            correction_interval: 4,
            max_walk: 4000,
            long_corridor_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestParams {
    pub base_objectives: u32,
    /// One more objective per this many difficulty levels.
    pub difficulty_step: u8,
}

impl Default for QuestParams {
    fn default() -> Self {
        Self {
            base_objectives: 1,
            difficulty_step: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemParams {
    /// Items at difficulty 1; harder levels get fewer.
    pub max_items: u32,
    pub min_items: u32,
    pub spacing: u32,
}

impl Default for ItemParams {
    fn default() -> Self {
        Self {
            max_items: 8,
            min_items: 2,
            spacing: 2,
        }
    }
}

/// Complete parameter set for every built-in generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub terrain: TerrainParams,
    pub maze: MazeParams,
    pub rooms: RoomParams,
    pub corridors: CorridorParams,
    pub quest: QuestParams,
    pub items: ItemParams,
    /// Attempts after the first before a request fails.
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainParams::default(),
            maze: MazeParams::default(),
            rooms: RoomParams::default(),
            corridors: CorridorParams::default(),
            quest: QuestParams::default(),
            items: ItemParams::default(),
            max_retries: 3,
        }
    }
}

fn check(ok: bool, field: &'static str, reason: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        })
    }
}

fn unit(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl GenerationConfig {
    /// Parse a configuration from a RON string. Missing sections and fields
    /// take their defaults. The result is validated.
    pub fn parse_ron(input: &str) -> Result<GenerationConfig, ConfigError> {
        let config: GenerationConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.terrain;
        check(unit(t.density), "terrain.density", "must be within [0, 1]")?;
        check(t.birth_limit <= 8, "terrain.birth_limit", "must be at most 8")?;
        check(t.death_limit <= 8, "terrain.death_limit", "must be at most 8")?;
        check(t.min_region_size >= 1, "terrain.min_region_size", "must be at least 1")?;
        check(t.biome_scale >= 1, "terrain.biome_scale", "must be at least 1")?;
        if let Some(bands) = &t.biome_bands {
            check(!bands.is_empty(), "terrain.biome_bands", "must not be empty")?;
            check(
                bands.windows(2).all(|w| w[0].upper < w[1].upper),
                "terrain.biome_bands",
                "upper bounds must be strictly increasing",
            )?;
        }

        check(unit(self.maze.braid), "maze.braid", "must be within [0, 1]")?;

        let r = &self.rooms;
        check(r.min_size >= 1, "rooms.min_size", "must be at least 1")?;
        check(r.min_size <= r.max_size, "rooms.max_size", "must not be below min_size")?;
        check(r.max_rooms >= 1, "rooms.max_rooms", "must be at least 1")?;
        check(r.min_rooms <= r.max_rooms, "rooms.min_rooms", "must not exceed max_rooms")?;

        let c = &self.corridors;
        check(c.budget_factor >= 1.0, "corridors.budget_factor", "must be at least 1")?;
        check(unit(c.momentum), "corridors.momentum", "must be within [0, 1]")?;
        check(
            c.correction_interval >= 1,
            "corridors.correction_interval",
            "must be at least 1",
        )?;
        check(c.long_corridor_ratio >= 1.0, "corridors.long_corridor_ratio", "must be at least 1")?;

        check(self.quest.difficulty_step >= 1, "quest.difficulty_step", "must be at least 1")?;
        check(
            self.items.min_items <= self.items.max_items,
            "items.min_items",
            "must not exceed max_items",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(GenerationConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_ron_fills_defaults() {
        let config = GenerationConfig::parse_ron(
            r#"(
                maze: (braid: 0.25),
                rooms: (max_rooms: 6, style: Windy),
            )"#,
        )
        .unwrap();
        assert_eq!(config.maze.braid, 0.25);
        assert_eq!(config.rooms.max_rooms, 6);
        assert_eq!(config.rooms.style, CorridorStyle::Windy);
        assert_eq!(config.rooms.min_size, 3);
        assert_eq!(config.terrain, TerrainParams::default());
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = GenerationConfig::parse_ron("(terrain: (density: 1.5))").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "terrain.density", .. }));

        let err = GenerationConfig::parse_ron("(rooms: (min_size: 9, max_size: 4))").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "rooms.max_size", .. }));
    }

    #[test]
    fn malformed_ron_is_a_parse_error() {
        let err = GenerationConfig::parse_ron("(terrain: ").unwrap_err();
        assert!(matches!(err, ConfigError::Ron(_)));
    }

    #[test]
    fn explicit_biome_bands_parse() {
        let config = GenerationConfig::parse_ron(
            r#"(terrain: (biome_bands: Some([
                (upper: 0.5, biome: Swamp),
                (upper: 1.0, biome: Forest),
            ])))"#,
        )
        .unwrap();
        let bands = config.terrain.biome_bands.unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[1].biome, Biome::Forest);
    }

    #[test]
    fn ron_round_trip() {
        let config = GenerationConfig::default();
        let text = ron::to_string(&config).unwrap();
        let back = GenerationConfig::parse_ron(&text).unwrap();
        assert_eq!(back, config);
    }
}
