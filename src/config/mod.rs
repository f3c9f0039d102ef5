//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A missing mandatory setting aborts startup for the whole instance

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_args, ConfigError};
pub use schema::{
    DeadLetterConfig, FanoutConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    SecretsConfig, ServiceConfig, StoreConfig, TimeoutConfig,
};
