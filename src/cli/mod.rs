pub mod actions;
pub mod mycnf;
pub mod telemetry;

mod start;
pub use self::start::start;

pub mod commands;
pub mod dispatch;
