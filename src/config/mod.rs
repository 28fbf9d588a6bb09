pub mod app_config;
pub mod definitions;
pub mod loader;

// Re-export commonly used types
pub use app_config::AppConfig;
pub use definitions::{DefinitionDocument, ServiceEntry};
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
