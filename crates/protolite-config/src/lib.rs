pub mod settings;

pub use settings::{
    load_schema_files, ConfigError, DecodeConfig, LogFormat, LogLevel, LoggingConfig, Result,
    SchemaConfig, ToolConfig,
};
