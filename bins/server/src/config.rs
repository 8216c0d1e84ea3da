use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use topic_engine::LogConfig;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "topiclog-server", about = "Append-only topic log over HTTP")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить сервер
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу (без него — значения по умолчанию)
    #[arg(long, env = "TOPICLOG_CONFIG")]
    pub config: Option<String>,

    /// Адрес HTTP API, перекрывает `listen` из конфига
    #[arg(long, env = "TOPICLOG_LISTEN")]
    pub listen: Option<String>,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(flatten)]
    pub log: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log: LogConfig::default(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Конфиг из файла (если задан) + переопределения из CLI.
    pub fn resolve(args: &ServeArgs) -> Result<Self, ServerError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(listen) = &args.listen {
            config.listen = listen.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.log.topics_dir, PathBuf::from("topics"));
        assert_eq!(config.log.subscribers_dir, PathBuf::from("subscribers"));
        assert!(config.log.sync_on_append);
    }

    #[test]
    fn storage_keys_are_read_from_top_level() {
        let config = ServerConfig::parse(
            r#"
            listen = "127.0.0.1:9000"
            topics_dir = "/var/lib/topiclog/topics"
            sync_on_append = false
            follow_chunk_size = 4096
            "#,
        )
        .unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.log.topics_dir, PathBuf::from("/var/lib/topiclog/topics"));
        assert!(!config.log.sync_on_append);
        assert_eq!(config.log.follow_chunk_size, 4096);
        assert_eq!(config.log.follow_buffer, 64);
    }

    #[test]
    fn cli_listen_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "listen = \"127.0.0.1:1\"\n").unwrap();

        let args = ServeArgs {
            config: Some(path.display().to_string()),
            listen: Some("127.0.0.1:2".to_string()),
        };
        assert_eq!(ServerConfig::resolve(&args).unwrap().listen, "127.0.0.1:2");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = ServeArgs { config: Some("/nonexistent/topiclog.toml".to_string()), listen: None };
        let err = ServerConfig::resolve(&args).unwrap_err();
        assert!(matches!(err, ServerError::Config { context: "read", .. }));
    }
}
