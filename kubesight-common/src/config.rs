//! Logging settings and JSON5 document loading.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

/// The `logging` section shared by KubeSight binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `kubesight_engine=debug`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    String::from("info")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Replace the level when an override is given (e.g. `--log-level`).
    pub fn with_level_override(mut self, level: Option<&str>) -> Self {
        if let Some(level) = level {
            self.level = level.to_string();
        }
        self
    }
}

/// Read and deserialize a JSON5 file.
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;

    json5::from_str(&content).map_err(|e| Error::Parse {
        path: Some(path.to_path_buf()),
        message: e.to_string(),
    })
}

/// Deserialize a JSON5 document held in memory.
pub fn parse_config<T: DeserializeOwned>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Parse {
        path: None,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Document {
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_logging_defaults_to_info_text() {
        let doc: Document = parse_config("{}").unwrap();
        assert_eq!(doc.logging, LoggingConfig::default());
        assert_eq!(doc.logging.level, "info");
    }

    #[test]
    fn test_json_format_and_level() {
        let doc: Document =
            parse_config(r#"{ logging: { level: "kubesight_engine=trace", format: "json" } }"#)
                .unwrap();
        assert_eq!(doc.logging.level, "kubesight_engine=trace");
        assert_eq!(doc.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_level_override() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.clone().with_level_override(None).level, "info");
        assert_eq!(logging.with_level_override(Some("debug")).level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ logging: {{ level: 'warn' }} }}").unwrap();

        let doc: Document = load_config(file.path()).unwrap();
        assert_eq!(doc.logging.level, "warn");
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let result: Result<Document> = load_config("/nonexistent/kubesight.json5");
        assert!(matches!(result, Err(Error::Read { .. })));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ logging: ").unwrap();

        let err = load_config::<Document>(file.path()).unwrap_err();
        assert!(matches!(err, Error::Parse { path: Some(_), .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
