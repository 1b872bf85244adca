use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Serialization of a config document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from the file extension; anything other than
    /// `.yaml`/`.yml` is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Json,
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    log::debug!("Loading config from {}", path.display());
    load_config_from_str(&content, ConfigFormat::from_path(path))
}

pub fn load_config_from_str(
    content: &str,
    format: ConfigFormat,
) -> Result<ServiceConfig, ConfigError> {
    let json_value: serde_json::Value = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_schema(&json_value)?;

    let config: ServiceConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Checks constraints the schema cannot express, and guards configs built in
/// code rather than loaded from a file.
pub fn validate_config(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.workers.max_concurrent_jobs == 0 {
        return Err(ConfigError::Validation {
            message: "workers.maxConcurrentJobs must be at least 1".to_string(),
        });
    }

    if config.workers.max_job_duration_secs == Some(0) {
        return Err(ConfigError::Validation {
            message: "workers.maxJobDurationSecs must be positive".to_string(),
        });
    }

    if config.events.capacity == 0 {
        return Err(ConfigError::Validation {
            message: "events.capacity must be at least 1".to_string(),
        });
    }

    if config.database.in_memory && config.database.path.is_some() {
        return Err(ConfigError::Validation {
            message: "database.path and database.inMemory are mutually exclusive".to_string(),
        });
    }

    if config.upload_path() == config.transcript_path() {
        return Err(ConfigError::Validation {
            message: "uploadDirectory and transcriptDirectory must differ".to_string(),
        });
    }

    if config.logging.level.parse::<log::LevelFilter>().is_err() {
        return Err(ConfigError::Validation {
            message: format!("Unknown log level: {}", config.logging.level),
        });
    }

    let cpus = num_cpus::get();
    if config.workers.max_concurrent_jobs > cpus {
        log::warn!(
            "workers.maxConcurrentJobs ({}) exceeds the number of CPUs ({})",
            config.workers.max_concurrent_jobs,
            cpus
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_load_valid_json_config() {
        let config_json = r#"
        {
            "dataDirectory": "/var/lib/murmur",
            "transcriptDirectory": "out",
            "workers": { "maxConcurrentJobs": 2, "maxJobDurationSecs": 600 },
            "events": { "capacity": 64 },
            "retainSourceAfterCompletion": false,
            "logging": { "level": "debug", "json": true }
        }
        "#;

        let config = load_config_from_str(config_json, ConfigFormat::Json).unwrap();
        assert_eq!(config.data_directory, PathBuf::from("/var/lib/murmur"));
        assert_eq!(config.transcript_path(), PathBuf::from("/var/lib/murmur/out"));
        assert_eq!(config.workers.max_concurrent_jobs, 2);
        assert_eq!(
            config.workers.max_job_duration(),
            Some(Duration::from_secs(600))
        );
        assert_eq!(config.events.capacity, 64);
        assert!(!config.retain_source_after_completion);
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_valid_yaml_config() {
        let config_yaml = r#"
dataDirectory: /data
database:
  inMemory: true
workers:
  maxConcurrentJobs: 3
"#;

        let config = load_config_from_str(config_yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.data_directory, PathBuf::from("/data"));
        assert!(config.database.in_memory);
        assert_eq!(config.database_path(), None);
        assert_eq!(config.workers.max_concurrent_jobs, 3);
    }

    #[test]
    fn test_empty_object_is_valid() {
        let config = load_config_from_str("{}", ConfigFormat::Json).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_zero_workers_fails_schema() {
        let result = load_config_from_str(
            r#"{ "workers": { "maxConcurrentJobs": 0 } }"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_field_fails_schema() {
        let result = load_config_from_str(r#"{ "workerCount": 4 }"#, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_bad_log_level_fails_schema() {
        let result = load_config_from_str(
            r#"{ "logging": { "level": "loud" } }"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ not json", ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = load_config_from_str("workers: [unclosed", ConfigFormat::Yaml);
        assert!(matches!(result, Err(ConfigError::ParseYaml(_))));
    }

    #[test]
    fn test_path_and_in_memory_conflict() {
        let result = load_config_from_str(
            r#"{ "database": { "path": "jobs.db", "inMemory": true } }"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_same_upload_and_transcript_directory_rejected() {
        let result = load_config_from_str(
            r#"{ "uploadDirectory": "files", "transcriptDirectory": "files" }"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_validate_config_rejects_zero_timeout() {
        let mut config = ServiceConfig::default();
        config.workers.max_job_duration_secs = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Json);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("murmur.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "workers:\n  maxConcurrentJobs: 2").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.workers.max_concurrent_jobs, 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/murmur.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
