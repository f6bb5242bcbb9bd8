pub mod loader;
pub mod models;
pub mod starter;
pub mod validation;

pub use loader::load_config;
pub use models::*;
pub use validation::{
    HEALTH_PATH, ServerConfigValidator, ValidationError, ValidationResult, normalize_resource,
};
