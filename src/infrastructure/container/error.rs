//! 容器错误类型

use thiserror::Error;

use super::ContainerState;

/// 工厂返回的错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 引用的种类：服务或参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Service,
    Parameter,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Service => f.write_str("service"),
            ReferenceKind::Parameter => f.write_str("parameter"),
        }
    }
}

/// 依赖注入容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 服务ID已注册
    #[error("Service '{id}' is already registered")]
    DuplicateService { id: String },

    /// 编译时发现悬空引用
    #[error("Service '{service}' references unknown {kind} '{reference}'")]
    UnresolvedReference {
        service: String,
        reference: String,
        kind: ReferenceKind,
    },

    /// 编译时发现循环依赖，`cycle` 首尾是同一个服务
    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// 服务未注册
    #[error("Service '{id}' is not registered")]
    UnknownService { id: String },

    /// 在错误的生命周期阶段调用
    #[error("Cannot {operation} while the container is {state}")]
    IllegalState {
        operation: &'static str,
        state: ContainerState,
    },

    /// 工厂创建服务失败，原始错误保存在 source 中
    #[error("Failed to create service '{id}': {source}")]
    ServiceCreationFailed {
        id: String,
        #[source]
        source: BoxError,
    },

    /// 类型转换失败
    #[error("Type cast failed for service '{id}': expected '{expected}'")]
    TypeMismatch { id: String, expected: &'static str },

    /// 工厂参数缺失或类型不符
    #[error("Invalid argument #{index} for service '{service}': {reason}")]
    InvalidArgument {
        service: String,
        index: usize,
        reason: String,
    },
}

impl ContainerError {
    /// 若为工厂失败，返回工厂的原始错误
    pub fn creation_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ContainerError::ServiceCreationFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
