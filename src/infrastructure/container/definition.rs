//! 服务定义与工厂
//!
//! 服务定义是纯数据：一个工厂、一组有序的参数规格和生命周期。
//! 参数在解析时从左到右求值，再以 [`Args`] 的形式交给工厂。

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::error::{BoxError, ContainerError, ReferenceKind};

/// 已解析的服务实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 服务生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// 单例 - 容器生命周期内只创建一次，首次请求时惰性创建
    #[default]
    Singleton,
    /// 瞬态 - 每次请求都创建新实例
    Transient,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Singleton => "singleton",
            Scope::Transient => "transient",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "singleton" | "shared" => Ok(Scope::Singleton),
            "transient" | "prototype" => Ok(Scope::Transient),
            other => Err(format!("unknown scope '{}'", other)),
        }
    }
}

/// 参数规格
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentSpec {
    /// 字面量
    Value(Value),
    /// 引用另一个服务
    Service(String),
    /// 查找参数表
    Parameter(String),
}

impl ArgumentSpec {
    pub fn value(value: impl Into<Value>) -> Self {
        ArgumentSpec::Value(value.into())
    }

    pub fn service(id: impl Into<String>) -> Self {
        ArgumentSpec::Service(id.into())
    }

    pub fn parameter(key: impl Into<String>) -> Self {
        ArgumentSpec::Parameter(key.into())
    }

    /// 返回该参数引用的目标（字面量没有引用）
    pub fn reference(&self) -> Option<(ReferenceKind, &str)> {
        match self {
            ArgumentSpec::Value(_) => None,
            ArgumentSpec::Service(id) => Some((ReferenceKind::Service, id)),
            ArgumentSpec::Parameter(key) => Some((ReferenceKind::Parameter, key)),
        }
    }
}

impl fmt::Display for ArgumentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentSpec::Value(value) => write!(f, "{}", value),
            ArgumentSpec::Service(id) => write!(f, "@{}", id),
            ArgumentSpec::Parameter(key) => write!(f, "%{}%", key),
        }
    }
}

/// 已解析的参数
#[derive(Clone)]
pub enum ResolvedArg {
    Service(Instance),
    Value(Value),
}

impl fmt::Debug for ResolvedArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedArg::Service(_) => f.write_str("Service(..)"),
            ResolvedArg::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// 工厂看到的参数列表
#[derive(Debug, Clone)]
pub struct Args {
    service: String,
    values: Vec<ResolvedArg>,
}

impl Args {
    pub(crate) fn new(service: &str, values: Vec<ResolvedArg>) -> Self {
        Self {
            service: service.to_string(),
            values,
        }
    }

    /// 正在构造的服务ID
    pub fn service_id(&self) -> &str {
        &self.service
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedArg> {
        self.values.iter()
    }

    fn invalid(&self, index: usize, reason: impl Into<String>) -> ContainerError {
        ContainerError::InvalidArgument {
            service: self.service.clone(),
            index,
            reason: reason.into(),
        }
    }

    fn slot(&self, index: usize) -> Result<&ResolvedArg, ContainerError> {
        self.values
            .get(index)
            .ok_or_else(|| self.invalid(index, format!("only {} argument(s) given", self.len())))
    }

    /// 取出未转换的服务实例
    pub fn instance(&self, index: usize) -> Result<Instance, ContainerError> {
        match self.slot(index)? {
            ResolvedArg::Service(instance) => Ok(instance.clone()),
            ResolvedArg::Value(_) => Err(self.invalid(index, "expected a service reference, got a value")),
        }
    }

    /// 取出服务引用并向下转型
    pub fn service<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, ContainerError> {
        self.instance(index)?.downcast::<T>().map_err(|_| {
            self.invalid(
                index,
                format!("referenced service is not a '{}'", std::any::type_name::<T>()),
            )
        })
    }

    /// 取出字面量或参数值
    pub fn value(&self, index: usize) -> Result<&Value, ContainerError> {
        match self.slot(index)? {
            ResolvedArg::Value(value) => Ok(value),
            ResolvedArg::Service(_) => Err(self.invalid(index, "expected a value, got a service reference")),
        }
    }

    pub fn str(&self, index: usize) -> Result<&str, ContainerError> {
        self.value(index)?
            .as_str()
            .ok_or_else(|| self.invalid(index, "expected a string"))
    }

    /// 将值反序列化为任意类型
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, ContainerError> {
        let value = self.value(index)?;
        serde_json::from_value(value.clone()).map_err(|e| self.invalid(index, e.to_string()))
    }

    /// 缺失或为 null 时返回 None
    pub fn optional<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, ContainerError> {
        match self.values.get(index) {
            None | Some(ResolvedArg::Value(Value::Null)) => Ok(None),
            Some(_) => self.get(index).map(Some),
        }
    }
}

/// 服务工厂trait
pub trait ServiceFactory: Send + Sync {
    /// 用已解析的参数创建服务实例
    fn create(&self, args: &Args) -> Result<Instance, BoxError>;

    /// 获取服务类型名称（用于错误信息和列表输出）
    fn service_type_name(&self) -> &'static str;
}

/// 函数式服务工厂
pub struct FnServiceFactory<F, T> {
    factory_fn: F,
    type_name: &'static str,
    _phantom: PhantomData<fn() -> T>,
}

impl<F, T> FnServiceFactory<F, T> {
    pub fn new(factory_fn: F) -> Self {
        Self {
            factory_fn,
            type_name: std::any::type_name::<T>(),
            _phantom: PhantomData,
        }
    }
}

impl<F, T> ServiceFactory for FnServiceFactory<F, T>
where
    F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn create(&self, args: &Args) -> Result<Instance, BoxError> {
        let service = (self.factory_fn)(args)?;
        Ok(Arc::new(service))
    }

    fn service_type_name(&self) -> &'static str {
        self.type_name
    }
}

/// 服务定义，注册后不可变
#[derive(Clone)]
pub struct ServiceDefinition {
    factory: Arc<dyn ServiceFactory>,
    arguments: Vec<ArgumentSpec>,
    scope: Scope,
}

impl ServiceDefinition {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self {
            factory,
            arguments: Vec::new(),
            scope: Scope::default(),
        }
    }

    /// 用闭包创建定义
    pub fn from_fn<T, F>(factory: F) -> Self
    where
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        Self::new(Arc::new(FnServiceFactory::<F, T>::new(factory)))
    }

    pub fn arg(mut self, argument: ArgumentSpec) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn args(mut self, arguments: impl IntoIterator<Item = ArgumentSpec>) -> Self {
        self.arguments.extend(arguments);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn transient(self) -> Self {
        self.scope(Scope::Transient)
    }

    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.arguments
    }

    pub fn lifetime(&self) -> Scope {
        self.scope
    }

    pub fn type_name(&self) -> &'static str {
        self.factory.service_type_name()
    }

    /// 引用的服务ID（按参数顺序）
    pub fn service_references(&self) -> impl Iterator<Item = &str> {
        self.arguments.iter().filter_map(|arg| match arg {
            ArgumentSpec::Service(id) => Some(id.as_str()),
            _ => None,
        })
    }

    pub(crate) fn factory(&self) -> &dyn ServiceFactory {
        self.factory.as_ref()
    }
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("type", &self.type_name())
            .field("arguments", &self.arguments)
            .field("scope", &self.scope)
            .finish()
    }
}
