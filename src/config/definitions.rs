//! Declarative service definition documents (TOML).
//!
//! A document is pure data: parameters plus service entries naming a
//! constructor. It knows nothing about factories or containers; see
//! [`ConfigLoader::apply`](super::loader::ConfigLoader::apply).
//!
//! ```toml
//! imports = ["common.toml"]
//!
//! [parameters]
//! log_level = "info"
//!
//! [services.logger]
//! constructor = "logger"
//! arguments = ["app", "%log_level%"]
//!
//! [services.mailer]
//! constructor = "mailer"
//! arguments = ["@logger", { value = "@not-a-reference" }]
//! scope = "transient"
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::infrastructure::container::{ArgumentSpec, Scope};

/// One service entry as written in a document
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEntry {
    pub id: String,
    pub constructor: String,
    pub arguments: Vec<ArgumentSpec>,
    pub scope: Scope,
}

/// A parsed definition document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionDocument {
    /// File the document was read from, if any
    pub source: Option<PathBuf>,
    pub imports: Vec<String>,
    pub parameters: BTreeMap<String, Value>,
    pub services: Vec<ServiceEntry>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default)]
    parameters: BTreeMap<String, toml::Value>,
    #[serde(default)]
    services: BTreeMap<String, RawService>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawService {
    constructor: String,
    #[serde(default)]
    arguments: Vec<toml::Value>,
    scope: Option<String>,
}

impl DefinitionDocument {
    /// Parse a document; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let raw: RawDocument =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(origin.to_string(), e))?;

        let parameters = raw
            .parameters
            .into_iter()
            .map(|(key, value)| (key, toml_to_json(value)))
            .collect();

        let mut services = Vec::with_capacity(raw.services.len());
        for (id, service) in raw.services {
            let scope = match service.scope {
                Some(scope) => scope.parse::<Scope>().map_err(|_| ConfigError::InvalidScope {
                    service: id.clone(),
                    scope,
                })?,
                None => Scope::default(),
            };
            let arguments = service
                .arguments
                .into_iter()
                .enumerate()
                .map(|(index, value)| parse_argument(&id, index, value))
                .collect::<Result<Vec<_>, _>>()?;

            services.push(ServiceEntry {
                id,
                constructor: service.constructor,
                arguments,
                scope,
            });
        }

        Ok(Self {
            source: None,
            imports: raw.imports,
            parameters,
            services,
        })
    }

    /// Read and parse a single file; imports are not followed
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        let mut document = Self::parse(&content, &path.display().to_string())?;
        document.source = Some(path.to_path_buf());
        Ok(document)
    }

    /// Append another document: its parameters win, its services are added
    pub fn merge(&mut self, other: DefinitionDocument) {
        self.parameters.extend(other.parameters);
        self.services.extend(other.services);
    }
}

/// `"@id"` service, `"%key%"` parameter, `"@@x"` literal `"@x"`, `"%%"` literal `%`
fn parse_argument(service: &str, index: usize, value: toml::Value) -> Result<ArgumentSpec, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidArgument {
        service: service.to_string(),
        index,
        reason: reason.to_string(),
    };

    match value {
        toml::Value::String(s) => {
            if let Some(escaped) = s.strip_prefix("@@") {
                Ok(ArgumentSpec::value(format!("@{}", escaped)))
            } else if let Some(id) = s.strip_prefix('@') {
                if id.is_empty() {
                    return Err(invalid("empty service reference"));
                }
                Ok(ArgumentSpec::service(id))
            } else if let Some(key) = parameter_key(&s) {
                Ok(ArgumentSpec::parameter(key))
            } else {
                Ok(ArgumentSpec::value(s.replace("%%", "%")))
            }
        }
        toml::Value::Table(mut table) => {
            if table.len() != 1 {
                return Err(invalid("expected exactly one of 'service', 'parameter' or 'value'"));
            }
            if let Some(value) = table.remove("value") {
                return Ok(ArgumentSpec::Value(toml_to_json(value)));
            }
            let (kind, target) = table
                .into_iter()
                .next()
                .ok_or_else(|| invalid("empty table"))?;
            let target = match target {
                toml::Value::String(s) if !s.is_empty() => s,
                _ => return Err(invalid("reference must be a non-empty string")),
            };
            match kind.as_str() {
                "service" => Ok(ArgumentSpec::Service(target)),
                "parameter" => Ok(ArgumentSpec::Parameter(target)),
                other => Err(invalid(&format!("unknown argument kind '{}'", other))),
            }
        }
        other => Ok(ArgumentSpec::Value(toml_to_json(other))),
    }
}

fn parameter_key(s: &str) -> Option<&str> {
    let key = s.strip_prefix('%')?.strip_suffix('%')?;
    if key.is_empty() || key.contains('%') {
        None
    } else {
        Some(key)
    }
}

pub(crate) fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
