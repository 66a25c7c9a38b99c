//! Dungeon Forge: deterministic procedural generation of dungeon levels,
//! mazes and cave terrain.
//!
//! Every request is a pure function of its seed and parameters. Generated
//! content is validated for connectivity and solvability before it is
//! returned, and failed attempts are retried with re-derived seeds.

pub mod core;
pub mod schema;

pub use crate::core::assemble::{AssembleError, LevelAssembler, TileAssembler, WorldFragment};
pub use crate::core::config::GenerationConfig;
pub use crate::core::error::GenerationError;
pub use crate::core::pipeline::{Generated, GenerationState, LevelEngine};
pub use crate::core::registry::{Draft, Generator, GeneratorRegistry};
pub use crate::schema::content::{Content, ContentType};
pub use crate::schema::context::{Biome, CancelToken, GenerationContext};
