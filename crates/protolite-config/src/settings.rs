use protolite::{
    parse_messages, DecodeOptions, Schema, SchemaError, DEFAULT_MAX_DEPTH, MAX_PAYLOAD_SIZE,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to read schema file {path}: {source}")]
    SchemaFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid schema in {path}: {source}")]
    SchemaSyntax { path: PathBuf, source: SchemaError },

    #[error("Invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration for the protolite tool
///
/// ```toml
/// [decode]
/// max_depth = 32
/// max_length = 1048576
///
/// [schema]
/// paths = ["schemas/playback.proto"]
/// root = "PlaybackFile"
///
/// [logging]
/// level = "debug"
/// format = "json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    pub decode: DecodeConfig,
    pub schema: SchemaConfig,
    pub logging: LoggingConfig,
}

/// Limits applied when decoding files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub max_depth: usize,
    pub max_length: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_length: MAX_PAYLOAD_SIZE,
        }
    }
}

impl DecodeConfig {
    pub fn to_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_depth: self.max_depth,
            max_length: self.max_length,
        }
    }
}

/// Where schema text comes from when no `--schema` flag is given
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Schema files, parsed together
    pub paths: Vec<PathBuf>,

    /// Message to decode files as; defaults to the last message declared
    pub root: Option<String>,
}

/// Log level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    /// Default: the tool's output goes to stdout, diagnostics stay quiet
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing level filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::InvalidConfig(format!(
                "Unknown log level: {other}"
            ))),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console output
    #[default]
    Console,
    /// JSON structured logging
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl ToolConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ToolConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.decode.max_depth == 0 {
            return Err(ConfigError::InvalidConfig(
                "decode.max_depth must be at least 1".to_string(),
            ));
        }
        if self.decode.max_length == 0 {
            return Err(ConfigError::InvalidConfig(
                "decode.max_length must be at least 1".to_string(),
            ));
        }
        if self.schema.paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(ConfigError::InvalidConfig(
                "schema.paths entries must not be empty".to_string(),
            ));
        }
        if matches!(&self.schema.root, Some(root) if root.trim().is_empty()) {
            return Err(ConfigError::InvalidConfig(
                "schema.root must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse the configured schema files, if any
    pub fn load_schema(&self) -> Result<Option<Schema>> {
        if self.schema.paths.is_empty() {
            return Ok(None);
        }
        load_schema_files(&self.schema.paths).map(Some)
    }
}

/// Parse each file on its own, then validate the combined message set so
/// files may reference each other's messages
pub fn load_schema_files<P: AsRef<Path>>(paths: &[P]) -> Result<Schema> {
    let mut messages = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::SchemaFile {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = parse_messages(&text).map_err(|source| ConfigError::SchemaSyntax {
            path: path.to_path_buf(),
            source,
        })?;
        messages.extend(parsed);
    }
    Ok(Schema::new(messages)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn schema_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ToolConfig::from_toml_str("").unwrap();
        assert_eq!(config, ToolConfig::default());
        assert_eq!(config.decode.to_options(), DecodeOptions::default());
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.logging.format, LogFormat::Console);
        assert!(config.load_schema().unwrap().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [decode]
            max_depth = 8
            max_length = 4096

            [schema]
            paths = ["a.proto", "b.proto"]
            root = "PlaybackFile"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config = ToolConfig::from_toml_str(toml).unwrap();
        assert_eq!(
            config.decode.to_options(),
            DecodeOptions {
                max_depth: 8,
                max_length: 4096,
            }
        );
        assert_eq!(config.schema.paths.len(), 2);
        assert_eq!(config.schema.root.as_deref(), Some("PlaybackFile"));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let err = ToolConfig::from_toml_str("[decode]\nmax_depth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));

        let err = ToolConfig::from_toml_str("[decode]\nmax_length = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_empty_schema_entries() {
        let err = ToolConfig::from_toml_str("[schema]\npaths = [\"\"]").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));

        let err = ToolConfig::from_toml_str("[schema]\nroot = \" \"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_log_level_is_parse_error() {
        let err = ToolConfig::from_toml_str("[logging]\nlevel = \"loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("trace".parse::<LogLevel>().unwrap().to_string(), "trace");
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let file = schema_file("[logging]\nlevel = \"error\"\n");
        let config = ToolConfig::load(file.path()).unwrap();
        assert_eq!(config.logging.level, LogLevel::Error);

        let err = ToolConfig::load("/nonexistent/protolite.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_schema_files_may_reference_each_other() {
        let header = schema_file("message Header { int32 magic = 1; }");
        let file = schema_file("message File { Header header = 1; bytes body = 2; }");

        let config = ToolConfig {
            schema: SchemaConfig {
                paths: vec![header.path().to_path_buf(), file.path().to_path_buf()],
                root: None,
            },
            ..ToolConfig::default()
        };
        let schema = config.load_schema().unwrap().unwrap();
        assert_eq!(schema.messages().len(), 2);
        assert!(schema.message("File").is_some());
    }

    #[test]
    fn test_schema_syntax_error_names_file() {
        let bad = schema_file("message A {\n  int32 x = ;\n}");
        let err = load_schema_files(&[bad.path()]).unwrap_err();
        match err {
            ConfigError::SchemaSyntax { path, source } => {
                assert_eq!(path, bad.path());
                assert!(matches!(source, SchemaError::UnexpectedToken { line: 2, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unresolved_reference_across_files() {
        let only = schema_file("message File { Header header = 1; }");
        let err = load_schema_files(&[only.path()]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Schema(SchemaError::UnresolvedType { .. })
        ));
    }
}
