pub mod assemble;
pub mod config;
pub mod corridor;
pub mod error;
pub mod flood;
pub mod maze;
pub mod pathfind;
pub mod pipeline;
pub mod placement;
pub mod registry;
pub mod rooms;
pub mod seed;
pub mod terrain;
pub mod validate;
