// gradlink-core/src/tasks/mod.rs

pub mod rate_limit_maintenance;
pub mod typing_maintenance;

pub use rate_limit_maintenance::spawn_rate_limit_sweep;
pub use typing_maintenance::spawn_typing_sweep;
