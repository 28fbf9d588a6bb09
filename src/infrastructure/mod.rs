//! 基础设施层
//!
//! 提供具体的技术实现，包括：
//! - 依赖注入容器
//! - 构造器注册表

// 容器实现
pub mod container;
pub mod provider;

// 重新导出API
pub use container::{ContainerError, ContainerState, Scope, ServiceContainer, ServiceDefinition};
pub use provider::FactoryRegistry;
