pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod inventory;
pub mod runner;
pub mod tags;
pub mod types;
pub mod updater;

pub use error::{ConfigError, DeployError};

#[cfg(test)]
mod tests;
