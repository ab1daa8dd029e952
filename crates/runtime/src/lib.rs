pub mod controller;
pub mod error;
pub mod monitor;
pub mod runner;
pub mod settings;

mod workers;

#[cfg(test)]
mod tests;

pub use controller::{ControllerSnapshot, Counter, ThreadController};
pub use error::RunnerError;
pub use monitor::{StatusMonitor, StatusSample};
pub use runner::{RunSummary, run_pipeline};
pub use settings::{RunnerSettings, StatusLog};
