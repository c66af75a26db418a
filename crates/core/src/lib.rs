pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, Environment, LoadOptions};
pub use domain::helper::{HelperData, RoleChange, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
