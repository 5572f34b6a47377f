//! Settings loaded from `settings.toml`.
//!
//! Settings configure the parse scheduler (debounce delay, which documents
//! are parsed) and the CEL environment documents are checked against.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cel_core::{ext, CelType, Env};
use serde::Deserialize;
use thiserror::Error;

use crate::document::SupportedExtensions;
use crate::scheduler::{SchedulerConfig, DEFAULT_DEBOUNCE};

pub const SETTINGS_FILE: &str = "settings.toml";

/// Root settings structure.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    pub scheduler: Option<SchedulerSettings>,
    pub documents: Option<DocumentSettings>,
    pub env: Option<EnvSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SchedulerSettings {
    /// Quiet period after the last edit before a document is reparsed.
    pub debounce_ms: Option<u64>,
}

/// Extension allow-list. Omitted lists keep their defaults.
#[derive(Debug, Default, Deserialize)]
pub struct DocumentSettings {
    pub sources: Option<Vec<String>>,
    pub templates: Option<Vec<String>>,
}

/// CEL environment settings.
#[derive(Debug, Default, Deserialize)]
pub struct EnvSettings {
    /// Container namespace for qualified name resolution.
    pub container: Option<String>,
    /// Extensions to enable: "strings", "math", "encoders", "optionals", "all".
    pub extensions: Option<Vec<String>>,
    /// Variable declarations: name -> type string (see `parse_type_string`).
    pub variables: Option<HashMap<String, String>>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Settings {
    /// Scheduler configuration, falling back to defaults for anything unset.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let debounce = self
            .scheduler
            .as_ref()
            .and_then(|s| s.debounce_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);

        let defaults = SupportedExtensions::default();
        let documents = self.documents.as_ref();
        let sources = documents
            .and_then(|d| d.sources.clone())
            .unwrap_or_else(|| defaults.sources().to_vec());
        let templates = documents
            .and_then(|d| d.templates.clone())
            .unwrap_or_else(|| defaults.templates().to_vec());

        SchedulerConfig {
            debounce,
            extensions: SupportedExtensions::new(sources, templates),
        }
    }
}

/// Parse a settings file.
pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load settings, returning defaults if the file is missing or invalid.
pub fn load_settings(path: &Path) -> Settings {
    match read_settings(path) {
        Ok(settings) => settings,
        Err(SettingsError::Read { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            Settings::default()
        }
        Err(err) => {
            tracing::warn!("{}; using default settings", err);
            Settings::default()
        }
    }
}

/// Discover `settings.toml` by walking up from `start_dir`, then checking its
/// immediate child directories.
///
/// Returns the settings and the directory they were found in, or defaults
/// and `start_dir` when there is none.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    for dir in start_dir.ancestors() {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            return (load_settings(&candidate), dir.to_path_buf());
        }
    }

    let children = std::fs::read_dir(start_dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false));
    for child in children {
        let candidate = child.path().join(SETTINGS_FILE);
        if candidate.is_file() {
            return (load_settings(&candidate), child.path());
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}

/// Parse a type string into a `CelType`.
///
/// Supports primitives (`bool`, `int`, `uint`, `double`, `string`, `bytes`),
/// `null`, `dyn`, `timestamp`, `duration`, the parameterized forms
/// `list(T)`, `map(K, V)`, `optional(T)`, `type(T)`, `wrapper(T)`, and
/// message names such as `google.protobuf.Struct`.
pub fn parse_type_string(s: &str) -> Result<CelType, String> {
    let s = s.trim();

    if let Some(open) = s.find('(') {
        let Some(inner) = s[open + 1..].strip_suffix(')') else {
            return Err(format!("missing closing paren in '{}'", s));
        };
        let params = split_params(inner)?;
        let single = |params: &[&str]| -> Result<CelType, String> {
            match params {
                [one] => parse_type_string(one),
                _ => Err(format!("'{}' takes exactly one type parameter", s)),
            }
        };

        return match &s[..open] {
            "list" => single(&params).map(CelType::list),
            "optional" => single(&params).map(CelType::optional),
            "type" => single(&params).map(CelType::type_of),
            "wrapper" => single(&params).map(CelType::wrapper),
            "map" => match params.as_slice() {
                [key, value] => Ok(CelType::map(
                    parse_type_string(key)?,
                    parse_type_string(value)?,
                )),
                _ => Err(format!("map type must have 2 parameters: '{}'", s)),
            },
            other => Err(format!("unknown parameterized type: '{}'", other)),
        };
    }

    Ok(match s {
        "" => return Err("empty type string".to_string()),
        "bool" => CelType::Bool,
        "int" => CelType::Int,
        "uint" => CelType::UInt,
        "double" => CelType::Double,
        "string" => CelType::String,
        "bytes" => CelType::Bytes,
        "null" => CelType::Null,
        "dyn" => CelType::Dyn,
        "timestamp" => CelType::Timestamp,
        "duration" => CelType::Duration,
        message => CelType::message(message),
    })
}

/// Split type parameters on top-level commas.
fn split_params(s: &str) -> Result<Vec<&str>, String> {
    let mut params = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                params.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        if depth < 0 {
            return Err(format!("unbalanced parens in '{}'", s));
        }
    }
    params.push(s[start..].trim());
    Ok(params)
}

/// Build the CEL environment documents are checked against.
pub fn build_env(settings: &Settings) -> Env {
    let mut env = Env::with_standard_library();
    let Some(env_settings) = settings.env.as_ref() else {
        return env.with_all_extensions();
    };

    if let Some(extensions) = &env_settings.extensions {
        env = apply_extensions(env, extensions);
    }

    if let Some(variables) = &env_settings.variables {
        for (name, type_str) in variables {
            match parse_type_string(type_str) {
                Ok(cel_type) => {
                    env.add_variable(name, cel_type);
                }
                Err(e) => {
                    tracing::warn!(variable = %name, "skipping variable with bad type: {}", e);
                }
            }
        }
    }

    if let Some(container) = &env_settings.container {
        env.set_container(container);
    }

    env
}

fn apply_extensions(mut env: Env, extensions: &[String]) -> Env {
    for name in extensions {
        env = match name.as_str() {
            "all" => env.with_all_extensions(),
            "strings" | "string" => env.with_extension(ext::string_extension()),
            "math" => env.with_extension(ext::math_extension()),
            "encoders" | "encoder" => env.with_extension(ext::encoders_extension()),
            "optionals" | "optional" => env.with_extension(ext::optionals_extension()),
            other => {
                tracing::warn!(extension = %other, "ignoring unknown extension");
                env
            }
        };
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a unique temp directory for test isolation.
    fn make_test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("celsync-test")
            .join(name)
            .join(format!("{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup_test_dir(dir: &Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn parse_primitive_and_special_types() {
        assert_eq!(parse_type_string("bool").unwrap(), CelType::Bool);
        assert_eq!(parse_type_string(" int ").unwrap(), CelType::Int);
        assert_eq!(parse_type_string("bytes").unwrap(), CelType::Bytes);
        assert_eq!(parse_type_string("dyn").unwrap(), CelType::Dyn);
        assert_eq!(parse_type_string("duration").unwrap(), CelType::Duration);
    }

    #[test]
    fn parse_parameterized_types() {
        assert_eq!(
            parse_type_string("list(list(int))").unwrap(),
            CelType::list(CelType::list(CelType::Int))
        );
        assert_eq!(
            parse_type_string("map( string , list(int) )").unwrap(),
            CelType::map(CelType::String, CelType::list(CelType::Int))
        );
        assert_eq!(
            parse_type_string("optional(string)").unwrap(),
            CelType::optional(CelType::String)
        );
    }

    #[test]
    fn parse_message_type() {
        assert_eq!(
            parse_type_string("my.custom.Message").unwrap(),
            CelType::message("my.custom.Message")
        );
    }

    #[test]
    fn parse_malformed_fails() {
        assert!(parse_type_string("").is_err());
        assert!(parse_type_string("list(").is_err());
        assert!(parse_type_string("map(int)").is_err());
        assert!(parse_type_string("list(int, int)").is_err());
        assert!(parse_type_string("unknown_param(int)").is_err());
    }

    #[test]
    fn scheduler_config_defaults() {
        let config = Settings::default().scheduler_config();
        assert_eq!(config.debounce, DEFAULT_DEBOUNCE);
        assert_eq!(config.extensions, SupportedExtensions::default());
    }

    #[test]
    fn scheduler_config_from_toml() {
        let settings: Settings = toml::from_str(
            r#"
[scheduler]
debounce_ms = 50

[documents]
sources = ["ex", ".exs"]
"#,
        )
        .unwrap();

        let config = settings.scheduler_config();
        assert_eq!(config.debounce, Duration::from_millis(50));
        assert_eq!(config.extensions.sources(), ["ex", "exs"]);
        assert_eq!(config.extensions.templates(), ["celtmpl"]);
    }

    #[test]
    fn build_env_with_variables_and_container() {
        let settings: Settings = toml::from_str(
            r#"
[env]
container = "my.package"
variables = { x = "int", name = "string", bad = "list(" }
"#,
        )
        .unwrap();

        let env = build_env(&settings);
        assert_eq!(env.variables().get("x"), Some(&CelType::Int));
        assert_eq!(env.variables().get("name"), Some(&CelType::String));
        assert!(!env.variables().contains_key("bad"));
        assert_eq!(env.container(), "my.package");
    }

    #[test]
    fn build_env_with_extensions() {
        let settings = Settings {
            env: Some(EnvSettings {
                extensions: Some(vec!["strings".to_string(), "math".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let env = build_env(&settings);
        assert!(env.functions().contains_key("charAt"));
        assert!(env.functions().contains_key("math.greatest"));
        assert!(!env.functions().contains_key("base64.encode"));
    }

    #[test]
    fn build_env_without_settings_enables_everything() {
        let env = build_env(&Settings::default());
        assert!(env.functions().contains_key("size"));
        assert!(env.functions().contains_key("optional.of"));
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = make_test_dir("invalid");
        let path = dir.join(SETTINGS_FILE);
        std::fs::write(&path, "[scheduler\ndebounce_ms = ").unwrap();

        assert!(matches!(
            read_settings(&path),
            Err(SettingsError::Parse { .. })
        ));
        assert!(load_settings(&path).scheduler.is_none());

        cleanup_test_dir(&dir);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = make_test_dir("missing");
        let settings = load_settings(&dir.join(SETTINGS_FILE));
        assert!(settings.env.is_none());
        cleanup_test_dir(&dir);
    }

    #[test]
    fn discover_settings_in_parent_dir() {
        let parent = make_test_dir("discover-parent");
        let child = parent.join("subdir");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(
            parent.join(SETTINGS_FILE),
            "[scheduler]\ndebounce_ms = 120\n",
        )
        .unwrap();

        let (settings, settings_dir) = discover_settings(&child);
        assert_eq!(settings_dir, parent);
        assert_eq!(
            settings.scheduler_config().debounce,
            Duration::from_millis(120)
        );

        cleanup_test_dir(&parent);
    }

    #[test]
    fn discover_settings_in_child_dir() {
        let parent = make_test_dir("discover-child");
        let child = parent.join("config");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(
            child.join(SETTINGS_FILE),
            "[documents]\ntemplates = [\"tmpl\"]\n",
        )
        .unwrap();

        let (settings, settings_dir) = discover_settings(&parent);
        assert_eq!(settings_dir, child);
        assert_eq!(settings.scheduler_config().extensions.templates(), ["tmpl"]);

        cleanup_test_dir(&parent);
    }
}
