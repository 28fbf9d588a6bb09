// 主应用程序逻辑

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::args::{Args, Command};
use crate::config::{AppConfig, ConfigLoader, DefinitionDocument};
use crate::errors::AppError;
use crate::infrastructure::container::{CompileSummary, ContainerError, ServiceContainer};
use crate::infrastructure::provider::FactoryRegistry;
use crate::logging::{ChannelLogger, OperationTimer};

/// 启动时写入容器的根目录参数
pub const APPLICATION_ROOT_PARAMETER: &str = "application_root";
/// 启动后尝试获取的日志服务ID
pub const LOGGER_SERVICE: &str = "logger";

/// 启动结果：已编译的容器和加载的定义
pub struct Bootstrapped {
    pub container: ServiceContainer,
    pub document: DefinitionDocument,
    pub summary: CompileSummary,
}

/// 构建、加载并编译容器
///
/// 顺序：写入 `application_root` → 加载定义文件（文件中的参数可覆盖它）
/// → 编译 → 若定义了 `logger` 则通过它记录启动完成。
pub fn bootstrap(
    definitions: &Path,
    root: Option<&Path>,
    registry: &FactoryRegistry,
    loader: &ConfigLoader,
) -> Result<Bootstrapped, AppError> {
    let timer = OperationTimer::new("bootstrap")
        .with_metadata("definitions", &definitions.display().to_string());

    let root = match root {
        Some(root) => root.to_path_buf(),
        None => default_root(definitions)?,
    };

    let mut container = ServiceContainer::new();
    container.set_parameter(APPLICATION_ROOT_PARAMETER, root.display().to_string())?;

    let document = loader.load_into(definitions, registry, &mut container)?;
    let summary = container.compile()?;

    if container.has(LOGGER_SERVICE) {
        match container.get_as::<ChannelLogger>(LOGGER_SERVICE) {
            Ok(logger) => logger.info(&format!(
                "container ready: {} services, {} parameters",
                summary.services, summary.parameters
            )),
            Err(ContainerError::TypeMismatch { .. }) => {
                tracing::warn!("'logger' service is not a channel logger")
            }
            Err(e) => return Err(e.into()),
        }
    }

    timer.finish();
    Ok(Bootstrapped {
        container,
        document,
        summary,
    })
}

/// 定义文件所在目录
fn default_root(definitions: &Path) -> Result<PathBuf, AppError> {
    let canonical = definitions.canonicalize().map_err(|e| {
        AppError::IO(format!("resolving '{}'", definitions.display()), e)
    })?;
    Ok(canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/")))
}

/// wirebox 应用程序
pub struct WireboxApp {
    config: AppConfig,
    registry: FactoryRegistry,
}

impl WireboxApp {
    /// 创建新的应用程序实例
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: FactoryRegistry::with_builtins(),
        }
    }

    /// 使用自定义构造器注册表
    pub fn with_registry(mut self, registry: FactoryRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// 运行应用程序，输出写入 `out`
    pub fn run(&self, args: &Args, out: &mut impl std::io::Write) -> Result<(), AppError> {
        let definitions = self.definitions_path(args.file.as_deref())?;
        let loader = ConfigLoader::new().with_env_prefix(self.config.env_prefix.clone());
        let app = bootstrap(&definitions, args.root.as_deref(), &self.registry, &loader)?;

        let write_err = |e: std::io::Error| AppError::IO("writing output".to_string(), e);
        match &args.command {
            Command::Check => {
                writeln!(
                    out,
                    "OK: {} services ({} singleton, {} transient), {} parameters",
                    app.summary.services,
                    app.summary.singletons,
                    app.summary.transients,
                    app.summary.parameters
                )
                .map_err(write_err)?;
                writeln!(out, "construction order: {}", app.summary.order.join(", ")).map_err(write_err)?;
            }
            Command::List => {
                for id in app.container.service_ids() {
                    let Some(definition) = app.container.definition(id) else {
                        continue;
                    };
                    let arguments: Vec<String> =
                        definition.arguments().iter().map(ToString::to_string).collect();
                    writeln!(
                        out,
                        "{}\t{}\t{}\t[{}]",
                        id,
                        definition.lifetime(),
                        definition.type_name(),
                        arguments.join(", ")
                    )
                    .map_err(write_err)?;
                }
            }
            Command::Get { id } => {
                let instance = app.container.get(id)?;
                if let Some(value) = instance.downcast_ref::<Value>() {
                    let rendered = serde_json::to_string_pretty(value)
                        .map_err(|e| AppError::Generic(e.to_string()))?;
                    writeln!(out, "{}", rendered).map_err(write_err)?;
                } else if let Some(logger) = instance.downcast_ref::<ChannelLogger>() {
                    writeln!(out, "logger channel={} level={}", logger.channel(), logger.level())
                        .map_err(write_err)?;
                } else {
                    let type_name = app
                        .container
                        .definition(id)
                        .map(|d| d.type_name())
                        .unwrap_or("unknown");
                    writeln!(out, "{}: instance of {}", id, type_name).map_err(write_err)?;
                }
            }
        }

        Ok(())
    }

    fn definitions_path(&self, file: Option<&Path>) -> Result<PathBuf, AppError> {
        file.map(Path::to_path_buf)
            .or_else(|| self.config.definitions.clone())
            .ok_or_else(|| {
                AppError::Generic(
                    "no definition file given and none configured (WIREBOX_DEFINITIONS)".to_string(),
                )
            })
    }
}
