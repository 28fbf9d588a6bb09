//! wirebox - 声明式依赖注入容器
//!
//! 服务按字符串ID注册，参数可以是字面量、服务引用或参数引用；
//! `compile()` 校验整个服务图后容器只读，单例在首次请求时惰性创建。
//!
//! ```
//! use wirebox::infrastructure::container::{ArgumentSpec, ServiceContainer, ServiceDefinition};
//!
//! let mut container = ServiceContainer::new();
//! container.set_parameter("greeting", "hello").unwrap();
//! container
//!     .register(
//!         "greeter",
//!         ServiceDefinition::from_fn(|args| Ok(format!("{} world", args.str(0)?)))
//!             .arg(ArgumentSpec::parameter("greeting")),
//!     )
//!     .unwrap();
//! container.compile().unwrap();
//!
//! let greeter = container.get_as::<String>("greeter").unwrap();
//! assert_eq!(greeter.as_str(), "hello world");
//! ```

pub mod app;
pub mod args;
pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::{AppConfig, ConfigLoader, DefinitionDocument};
pub use errors::{AppError, ConfigError};
pub use infrastructure::container::{
    ArgumentSpec, CompileSummary, ContainerError, ContainerState, Scope, ServiceContainer,
    ServiceDefinition,
};
pub use infrastructure::provider::FactoryRegistry;
