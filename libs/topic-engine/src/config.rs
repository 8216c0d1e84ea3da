use std::path::PathBuf;

use serde::Deserialize;

/// Настройки хранилища topic'ов. Встраивается в TOML конфиг сервера.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Директория файлов `<topic>.topic`.
    #[serde(default = "default_topics_dir")]
    pub topics_dir: PathBuf,

    /// Директория подписок `<topic>/<id>.sub`.
    #[serde(default = "default_subscribers_dir")]
    pub subscribers_dir: PathBuf,

    /// `sync_data` после каждого append.
    #[serde(default = "default_sync_on_append")]
    pub sync_on_append: bool,

    /// Размер канала follow-сессии (в кусках).
    #[serde(default = "default_follow_buffer")]
    pub follow_buffer: usize,

    /// Максимальный размер одного куска follow-сессии, байт.
    #[serde(default = "default_follow_chunk_size")]
    pub follow_chunk_size: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            topics_dir: default_topics_dir(),
            subscribers_dir: default_subscribers_dir(),
            sync_on_append: default_sync_on_append(),
            follow_buffer: default_follow_buffer(),
            follow_chunk_size: default_follow_chunk_size(),
        }
    }
}

impl LogConfig {
    /// Конфиг с обеими директориями внутри `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            topics_dir: root.join(default_topics_dir()),
            subscribers_dir: root.join(default_subscribers_dir()),
            ..Self::default()
        }
    }
}

fn default_topics_dir() -> PathBuf {
    PathBuf::from("topics")
}
fn default_subscribers_dir() -> PathBuf {
    PathBuf::from("subscribers")
}
fn default_sync_on_append() -> bool {
    true
}
fn default_follow_buffer() -> usize {
    64
}
fn default_follow_chunk_size() -> usize {
    64 * 1024
}
