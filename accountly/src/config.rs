use creds_api::config::Config as CredsApiConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    /// `EnvFilter` directives, used when `RUST_LOG` is unset
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
    pub creds_api: CredsApiConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use creds_api::config::StoreType;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example.com/1
                filter: debug
            creds_api:
                listener:
                    host: 0.0.0.0
                    port: 8080
                admin_listener:
                    host: 0.0.0.0
                    port: 8081
                store:
                    type: dynamodb
                    table: staging-credentials
                    endpoint: http://localhost:8000
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.metrics.expect("metrics").statsd_port, 8125);
        assert_eq!(config.logging.expect("logging").filter.as_deref(), Some("debug"));
        assert_eq!(config.creds_api.listener.port, 8080);
        assert_eq!(config.creds_api.collection_path, "/creds");
        assert_eq!(
            config.creds_api.store.r#type,
            StoreType::Dynamodb {
                table: "staging-credentials".into(),
                region: Some("us-east-2".into()),
                endpoint: Some("http://localhost:8000".into()),
            }
        );
        assert!(config.creds_api.validate().is_ok());
    }

    #[test]
    fn minimal_config() {
        let yaml = r#"
            creds_api:
                store:
                    type: memory
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert!(config.metrics.is_none());
        assert!(config.logging.is_none());
        assert_eq!(config.creds_api.store.r#type, StoreType::Memory);
        assert_eq!(config.creds_api.listener.port, 3000);
    }

    #[test]
    fn errors() {
        let missing = Config::from_file(std::path::Path::new("/nonexistent/accountly.yaml"));
        assert!(matches!(missing, Err(ConfigError::LoadError(_))));

        let tmp = write_tmp_file("creds_api: [not, a, map]");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
