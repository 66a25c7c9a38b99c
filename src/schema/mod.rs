pub mod content;
pub mod context;
pub mod grid;
pub mod level;
