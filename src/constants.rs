use crate::types::Weapon;

pub const CELL_SIZE: f64 = 30.0;
pub const ACTION_SCALE: f64 = 30.0;
pub const SAVE_LIMIT: usize = 100;

pub const DEFAULT_BOT_NAME: &str = "Isabella";
pub const DEFAULT_GRID_SIZE: usize = 10;
pub const MAX_GRID_SIZE: usize = 64;
pub const DEFAULT_EDGE_BAND: f64 = 0.16;
pub const DEFAULT_STALL_TOLERANCE: f64 = 1e-6;

pub const DEFAULT_TARGET_SPEED: f64 = 3.0;
pub const DEFAULT_PROJECTILE_SPEED: f64 = 9.0;
pub const DEFAULT_TARGET_HITBOX: f64 = 15.0;
pub const DEFAULT_WEAPON: Weapon = Weapon::Ranged;

pub const EPSILON: f64 = 1e-9;
