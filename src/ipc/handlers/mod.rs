pub mod attendance;
pub mod calendar;
pub mod cells;
pub mod core;
pub mod discipline;
pub mod reports;
pub mod roster;
pub mod setup;
