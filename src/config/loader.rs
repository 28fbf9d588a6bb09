use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::definitions::DefinitionDocument;
use crate::errors::ConfigError;
use crate::infrastructure::container::{ServiceContainer, ServiceDefinition};
use crate::infrastructure::provider::FactoryRegistry;

/// Default prefix for environment overrides
pub const DEFAULT_ENV_PREFIX: &str = "WIREBOX_";

/// Loads definition documents from disk and applies them to a container
pub struct ConfigLoader {
    env_prefix: String,
    env_vars: Option<HashMap<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader reading overrides from the process environment
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env_vars: None,
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Use a fixed environment instead of the process one (for testing)
    pub fn with_env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Load a document, following imports and applying environment overrides
    pub fn load(&self, path: &Path) -> Result<DefinitionDocument, ConfigError> {
        let mut merged = DefinitionDocument::default();
        let mut stack = Vec::new();
        let mut loaded = HashSet::new();

        self.load_recursive(&expand_path(path), &mut stack, &mut loaded, &mut merged)?;
        merged.source = Some(path.to_path_buf());

        self.apply_env_overrides(&mut merged);
        Ok(merged)
    }

    fn load_recursive(
        &self,
        path: &Path,
        stack: &mut Vec<PathBuf>,
        loaded: &mut HashSet<PathBuf>,
        merged: &mut DefinitionDocument,
    ) -> Result<(), ConfigError> {
        let canonical =
            fs::canonicalize(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;

        if stack.contains(&canonical) {
            return Err(ConfigError::ImportCycle(canonical));
        }
        // Files imported from several places are only loaded once
        if !loaded.insert(canonical.clone()) {
            return Ok(());
        }

        let mut document = DefinitionDocument::from_file(&canonical)?;
        let base_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        stack.push(canonical.clone());
        for import in std::mem::take(&mut document.imports) {
            let import_path = expand_path(Path::new(&import));
            let import_path = if import_path.is_absolute() {
                import_path
            } else {
                base_dir.join(import_path)
            };
            tracing::debug!(from = %canonical.display(), import = %import_path.display(), "Following import");
            self.load_recursive(&import_path, stack, loaded, merged)?;
        }
        stack.pop();

        tracing::debug!(
            file = %canonical.display(),
            parameters = document.parameters.len(),
            services = document.services.len(),
            "Definition file loaded"
        );
        merged.merge(document);
        Ok(())
    }

    /// Collect environment variables, using the injected set when present
    pub fn collect_env_vars(&self) -> HashMap<String, String> {
        match &self.env_vars {
            Some(vars) => vars.clone(),
            None => env::vars().collect(),
        }
    }

    /// `<PREFIX>PARAM_<KEY>` overwrites parameter `key` (lower-cased)
    pub fn apply_env_overrides(&self, document: &mut DefinitionDocument) {
        let prefix = format!("{}PARAM_", self.env_prefix);
        for (name, raw) in self.collect_env_vars() {
            let Some(key) = name.strip_prefix(&prefix) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let key = key.to_ascii_lowercase();
            tracing::debug!(parameter = %key, variable = %name, "Parameter overridden from environment");
            document.parameters.insert(key, env_value(&raw));
        }
    }

    /// Register every parameter, then every service of `document`
    pub fn apply(
        &self,
        document: &DefinitionDocument,
        registry: &FactoryRegistry,
        container: &mut ServiceContainer,
    ) -> Result<(), ConfigError> {
        for (key, value) in &document.parameters {
            container.set_parameter(key.clone(), value.clone())?;
        }

        for entry in &document.services {
            let factory = registry
                .get(&entry.constructor)
                .ok_or_else(|| ConfigError::UnknownConstructor {
                    service: entry.id.clone(),
                    constructor: entry.constructor.clone(),
                })?;
            let definition = ServiceDefinition::new(factory)
                .args(entry.arguments.iter().cloned())
                .scope(entry.scope);
            container.register(entry.id.clone(), definition)?;
        }

        Ok(())
    }

    /// `load` followed by `apply`
    pub fn load_into(
        &self,
        path: &Path,
        registry: &FactoryRegistry,
        container: &mut ServiceContainer,
    ) -> Result<DefinitionDocument, ConfigError> {
        let document = self.load(path)?;
        self.apply(&document, registry, container)?;
        Ok(document)
    }
}

/// Numbers and booleans keep their type, anything else stays a string
fn env_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

pub(crate) fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).into_owned())
}
