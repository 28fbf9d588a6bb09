//! 服务容器
//!
//! 生命周期分两个阶段：
//! - `Open`：注册服务、设置参数（需要 `&mut self`，单线程）
//! - `Sealed`：`compile()` 之后只读，可在多线程间共享并解析服务
//!
//! 单例首次解析按服务ID加锁（每个ID一个 `OnceCell`），
//! 不相关的服务不会互相阻塞。
//!
//! 解析单例前先按依赖优先的顺序构造它传递依赖中的单例，
//! 因此单例依赖链的深度不受线程栈大小限制；只有经过瞬态服务的依赖会逐层解析。

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::definition::{ArgumentSpec, Args, Instance, ResolvedArg, Scope, ServiceDefinition};
use super::error::ContainerError;
use super::graph;
use super::ContainerState;
use crate::logging::OperationTimer;

/// 编译结果摘要，编译成功后缓存
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSummary {
    pub services: usize,
    pub singletons: usize,
    pub transients: usize,
    pub parameters: usize,
    /// 依赖优先的构造顺序
    pub order: Vec<String>,
}

/// 服务容器
pub struct ServiceContainer {
    definitions: BTreeMap<String, ServiceDefinition>,
    parameters: BTreeMap<String, Value>,
    /// 单例实例缓存 - 使用OnceCell确保只创建一次
    singletons: DashMap<String, Arc<OnceCell<Instance>>>,
    summary: Option<CompileSummary>,
    stats: InnerStats,
}

/// 内部容器统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    transient_creations: AtomicUsize,
    failed_creations: AtomicUsize,
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    pub total_resolutions: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub transient_creations: usize,
    pub failed_creations: usize,
    pub active_singletons: usize,
}

impl ContainerStats {
    /// 获取单例缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl ServiceContainer {
    /// 创建新的容器实例
    pub fn new() -> Self {
        Self {
            definitions: BTreeMap::new(),
            parameters: BTreeMap::new(),
            singletons: DashMap::new(),
            summary: None,
            stats: InnerStats::default(),
        }
    }

    pub fn state(&self) -> ContainerState {
        if self.summary.is_some() {
            ContainerState::Sealed
        } else {
            ContainerState::Open
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.summary.is_some()
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), ContainerError> {
        match self.state() {
            ContainerState::Open => Ok(()),
            state => Err(ContainerError::IllegalState { operation, state }),
        }
    }

    fn ensure_sealed(&self, operation: &'static str) -> Result<(), ContainerError> {
        match self.state() {
            ContainerState::Sealed => Ok(()),
            state => Err(ContainerError::IllegalState { operation, state }),
        }
    }

    /// 注册服务定义
    pub fn register(
        &mut self,
        id: impl Into<String>,
        definition: ServiceDefinition,
    ) -> Result<(), ContainerError> {
        self.ensure_open("register a service")?;
        let id = id.into();
        if self.definitions.contains_key(&id) {
            return Err(ContainerError::DuplicateService { id });
        }

        tracing::debug!(
            service = %id,
            scope = %definition.lifetime(),
            service_type = definition.type_name(),
            arguments = definition.arguments().len(),
            "Service registered"
        );
        self.definitions.insert(id, definition);
        Ok(())
    }

    /// 设置参数，已存在则覆盖
    pub fn set_parameter(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), ContainerError> {
        self.ensure_open("set a parameter")?;
        let key = key.into();
        let value = value.into();
        if let Some(previous) = self.parameters.insert(key.clone(), value) {
            tracing::debug!(parameter = %key, previous = %previous, "Parameter overwritten");
        }
        Ok(())
    }

    /// 校验服务图并封存容器
    ///
    /// 已封存时直接返回缓存的摘要。校验失败时容器保持 `Open`。
    pub fn compile(&mut self) -> Result<CompileSummary, ContainerError> {
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }

        let timer = OperationTimer::new("container.compile")
            .with_metadata("services", &self.definitions.len().to_string());

        let order = match graph::validate(&self.definitions, &self.parameters) {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(error = %e, "Container compilation failed");
                return Err(e);
            }
        };

        let singletons = self
            .definitions
            .values()
            .filter(|d| d.lifetime() == Scope::Singleton)
            .count();
        let summary = CompileSummary {
            services: self.definitions.len(),
            singletons,
            transients: self.definitions.len() - singletons,
            parameters: self.parameters.len(),
            order,
        };

        timer.finish();
        tracing::info!(
            services = summary.services,
            singletons = summary.singletons,
            parameters = summary.parameters,
            "Container compiled"
        );

        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// 解析服务 - 主要API
    pub fn get(&self, id: &str) -> Result<Instance, ContainerError> {
        self.ensure_sealed("resolve a service")?;
        self.stats.total_resolutions.fetch_add(1, Ordering::Relaxed);

        let definition = self
            .definitions
            .get(id)
            .ok_or_else(|| ContainerError::UnknownService { id: id.to_string() })?;

        match definition.lifetime() {
            Scope::Singleton => {
                if let Some(instance) = self.cached(id) {
                    self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(service = %id, "Singleton cache hit");
                    return Ok(instance);
                }
                self.prepare_dependencies(definition)?;
                self.resolve_singleton(id, definition)
            }
            Scope::Transient => {
                self.prepare_dependencies(definition)?;
                let instance = self.construct(id, definition)?;
                self.stats.transient_creations.fetch_add(1, Ordering::Relaxed);
                Ok(instance)
            }
        }
    }

    /// 解析并向下转型
    pub fn get_as<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>, ContainerError> {
        self.get(id)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                id: id.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    fn cached(&self, id: &str) -> Option<Instance> {
        self.singletons.get(id).and_then(|cell| cell.get().cloned())
    }

    /// 依赖优先地构造 `definition` 传递依赖中尚未缓存的单例
    ///
    /// 按参数从左到右的深度优先后序进行，与逐层递归解析的构造顺序一致；
    /// 任何一个失败立即返回。遇到瞬态依赖时停止，其余依赖交给
    /// `construct` 按参数顺序解析。
    fn prepare_dependencies(&self, definition: &ServiceDefinition) -> Result<(), ContainerError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut pending: Vec<(&str, bool)> = Vec::new();
        push_dependencies(&mut pending, definition);

        while let Some((current, expanded)) = pending.pop() {
            let Some((key, dependency)) = self.definitions.get_key_value(current) else {
                break;
            };
            if expanded {
                self.resolve_singleton(key, dependency)?;
                continue;
            }
            if dependency.lifetime() == Scope::Transient {
                break;
            }
            if !visited.insert(key.as_str()) || self.cached(key).is_some() {
                continue;
            }
            pending.push((key.as_str(), true));
            push_dependencies(&mut pending, dependency);
        }
        Ok(())
    }

    fn resolve_singleton(
        &self,
        id: &str,
        definition: &ServiceDefinition,
    ) -> Result<Instance, ContainerError> {
        // 获取或创建OnceCell；分片锁在语句结束时释放
        let cell = self
            .singletons
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let mut constructed = false;
        let instance = cell.get_or_try_init(|| {
            constructed = true;
            self.construct(id, definition)
        })?;

        if constructed {
            self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        } else {
            // 另一个线程抢先完成了构造
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(instance.clone())
    }

    /// 从左到右解析参数并调用工厂，任何一步失败立即返回
    fn construct(&self, id: &str, definition: &ServiceDefinition) -> Result<Instance, ContainerError> {
        let mut resolved = Vec::with_capacity(definition.arguments().len());
        for argument in definition.arguments() {
            let value = match argument {
                ArgumentSpec::Value(value) => ResolvedArg::Value(value.clone()),
                ArgumentSpec::Parameter(key) => ResolvedArg::Value(self.parameter_or_err(id, key)?),
                ArgumentSpec::Service(dependency) => ResolvedArg::Service(self.get(dependency)?),
            };
            resolved.push(value);
        }

        let args = Args::new(id, resolved);
        match definition.factory().create(&args) {
            Ok(instance) => {
                tracing::debug!(
                    service = %id,
                    scope = %definition.lifetime(),
                    service_type = definition.type_name(),
                    "Service constructed"
                );
                Ok(instance)
            }
            Err(source) => {
                self.stats.failed_creations.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(service = %id, error = %source, "Service construction failed");
                Err(ContainerError::ServiceCreationFailed {
                    id: id.to_string(),
                    source,
                })
            }
        }
    }

    fn parameter_or_err(&self, service: &str, key: &str) -> Result<Value, ContainerError> {
        self.parameters
            .get(key)
            .cloned()
            .ok_or_else(|| ContainerError::UnresolvedReference {
                service: service.to_string(),
                reference: key.to_string(),
                kind: super::ReferenceKind::Parameter,
            })
    }

    /// 检查服务是否已注册
    pub fn has(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 已注册的服务ID（有序）
    pub fn service_ids(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn definition(&self, id: &str) -> Option<&ServiceDefinition> {
        self.definitions.get(id)
    }

    /// 最近一次成功编译的摘要
    pub fn summary(&self) -> Option<&CompileSummary> {
        self.summary.as_ref()
    }

    /// 获取容器统计信息
    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            total_resolutions: self.stats.total_resolutions.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.stats.cache_misses.load(Ordering::Relaxed),
            transient_creations: self.stats.transient_creations.load(Ordering::Relaxed),
            failed_creations: self.stats.failed_creations.load(Ordering::Relaxed),
            active_singletons: self
                .singletons
                .iter()
                .filter(|entry| entry.value().get().is_some())
                .count(),
        }
    }
}

/// 逆序压栈，出栈时即为参数从左到右的顺序
fn push_dependencies<'a>(pending: &mut Vec<(&'a str, bool)>, definition: &'a ServiceDefinition) {
    let dependencies: Vec<&str> = definition.service_references().collect();
    pending.extend(dependencies.into_iter().rev().map(|id| (id, false)));
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("state", &self.state())
            .field("services", &self.definitions.len())
            .field("parameters", &self.parameters.len())
            .finish()
    }
}
