//! 构造器注册表
//!
//! 把定义文件中的构造器名称映射到具体的服务工厂，
//! 不依赖任何运行时反射。

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::container::{Args, BoxError, FnServiceFactory, ServiceFactory};
use crate::logging::{parse_level, ChannelLogger};

/// 内置构造器名称
pub const VALUE_CONSTRUCTOR: &str = "value";
pub const LOGGER_CONSTRUCTOR: &str = "logger";

/// 构造器名称 -> 服务工厂
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn ServiceFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带内置构造器的注册表
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_fn(VALUE_CONSTRUCTOR, value_service);
        registry.register_fn(LOGGER_CONSTRUCTOR, logger_service);
        registry
    }

    /// 注册构造器，同名构造器会被替换
    pub fn register(&mut self, name: impl Into<String>, factory: Arc<dyn ServiceFactory>) -> &mut Self {
        let name = name.into();
        if self.factories.insert(name.clone(), factory).is_some() {
            tracing::debug!(constructor = %name, "Constructor replaced");
        }
        self
    }

    pub fn register_fn<T, F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnServiceFactory::<F, T>::new(factory)))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ServiceFactory>> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// 已注册的构造器名称（有序）
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("constructors", &self.names())
            .finish()
    }
}

/// 单个参数原样返回，多个参数组成数组
fn value_service(args: &Args) -> Result<Value, BoxError> {
    match args.len() {
        0 => Ok(Value::Null),
        1 => Ok(args.value(0)?.clone()),
        n => {
            let values = (0..n)
                .map(|i| args.value(i).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(values))
        }
    }
}

/// 参数：通道名称，可选的最低级别（默认 debug）
fn logger_service(args: &Args) -> Result<ChannelLogger, BoxError> {
    let channel = args.str(0)?;
    let level = match args.optional::<String>(1)? {
        Some(name) => parse_level(&name).ok_or_else(|| format!("unknown log level '{}'", name))?,
        None => tracing::Level::DEBUG,
    };
    Ok(ChannelLogger::new(channel, level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::container::{ArgumentSpec, ContainerError, ServiceContainer, ServiceDefinition};
    use serde_json::json;

    fn definition(registry: &FactoryRegistry, name: &str) -> ServiceDefinition {
        ServiceDefinition::new(registry.get(name).unwrap())
    }

    #[test]
    fn test_builtin_names() {
        let registry = FactoryRegistry::with_builtins();

        assert_eq!(registry.names(), vec!["logger", "value"]);
        assert!(registry.contains("value"));
        assert!(registry.get("mailer").is_none());
    }

    #[test]
    fn test_value_constructor() {
        let registry = FactoryRegistry::with_builtins();
        let mut container = ServiceContainer::new();
        container.set_parameter("port", 8080).unwrap();
        container
            .register("single", definition(&registry, "value").arg(ArgumentSpec::parameter("port")))
            .unwrap();
        container
            .register(
                "pair",
                definition(&registry, "value").args([ArgumentSpec::value("a"), ArgumentSpec::value(2)]),
            )
            .unwrap();
        container.compile().unwrap();

        assert_eq!(*container.get_as::<Value>("single").unwrap(), json!(8080));
        assert_eq!(*container.get_as::<Value>("pair").unwrap(), json!(["a", 2]));
    }

    #[test]
    fn test_logger_constructor() {
        let registry = FactoryRegistry::with_builtins();
        let mut container = ServiceContainer::new();
        container
            .register(
                "logger",
                definition(&registry, "logger").args([ArgumentSpec::value("app"), ArgumentSpec::value("warning")]),
            )
            .unwrap();
        container
            .register("bad_logger", definition(&registry, "logger").arg(ArgumentSpec::value("x")).arg(ArgumentSpec::value("loud")))
            .unwrap();
        container.compile().unwrap();

        let logger = container.get_as::<ChannelLogger>("logger").unwrap();
        assert_eq!(logger.channel(), "app");
        assert_eq!(logger.level(), tracing::Level::WARN);

        let err = container.get("bad_logger").unwrap_err();
        assert!(matches!(err, ContainerError::ServiceCreationFailed { ref id, .. } if id == "bad_logger"));
    }
}
