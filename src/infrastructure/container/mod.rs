//! 依赖注入容器
//!
//! 提供按字符串ID注册、编译期校验、惰性单例解析的服务容器：
//! - 单例 / 瞬态两种生命周期
//! - 服务引用、参数引用和字面量三种参数
//! - 编译时检测悬空引用和循环依赖

pub mod core;
pub mod definition;
pub mod error;
mod graph;

pub use self::core::{CompileSummary, ContainerStats, ServiceContainer};
pub use definition::{
    ArgumentSpec, Args, FnServiceFactory, Instance, ResolvedArg, Scope, ServiceDefinition,
    ServiceFactory,
};
pub use error::{BoxError, ContainerError, ReferenceKind};

/// 容器生命周期状态，`compile()` 是唯一且单向的转换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// 可注册服务和参数
    Open,
    /// 已编译，只能解析服务
    Sealed,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerState::Open => f.write_str("open"),
            ContainerState::Sealed => f.write_str("sealed"),
        }
    }
}
