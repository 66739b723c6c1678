pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, QueryCommand};
pub use config::TomlConfig;

pub use adapters::SqliteBackend;
pub use core::service::{PhoneCheck, ServiceOptions, StudentQueryService, TiePolicy};
pub use domain::model::{NewStudent, Student};
pub use utils::error::{QueryError, Result};
