pub mod actions;
pub mod agent;
pub mod arena;
pub mod config;
pub mod constants;
pub mod geometry;
pub mod intercept;
pub mod occlusion;
pub mod pathfinding;
pub mod protocol;
pub mod types;
