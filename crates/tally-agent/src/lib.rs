//! The tally agent: drives scanning, flushing and upload of method-usage data
//! on a single cooperative scheduler loop.

pub mod adapters;
pub mod agent;
pub mod config;
pub mod error;
pub mod modes;
pub mod scheduler;

pub use agent::{Agent, AgentHandle};
pub use config::{AgentConfig, DynamicConfig, TaskSettings};
pub use error::AgentError;
pub use modes::daemon::AgentStats;
