pub mod agent;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod scheduler;
pub mod stream;

pub use error::{DockyardError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
