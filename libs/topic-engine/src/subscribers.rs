use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::io::AsyncWriteExt;

use log_api::{LogError, RECORD_DELIMITER, SubscriberId, SubscriberStore, validate_topic_name};

use crate::error::TopicError;

pub const SUBSCRIBER_ID_LEN: usize = 20;
const SUB_EXT: &str = "sub";
const MAX_ID_ATTEMPTS: usize = 8;

/// Сгенерировать случайный alphanumeric id длины `len`.
///
/// Thread-local генератор: каждый поток tokio runtime берёт свой,
/// общего изменяемого состояния между запросами нет.
pub fn random_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// ═══════════════════════════════════════════════════════════════
//  SubscriberRegistry
// ═══════════════════════════════════════════════════════════════

/// Файловое хранилище заявок на подписку:
/// ```text
/// {subscribers_dir}/{topic}/{id}.sub
/// ```
/// Payload сохраняется как есть, с завершающим `\n`. Доставки нет.
#[derive(Debug, Clone)]
pub struct SubscriberRegistry {
    dir: PathBuf,
}

impl SubscriberRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn topic_dir(&self, topic: &str) -> PathBuf {
        self.dir.join(topic)
    }

    fn sub_path(&self, topic: &str, id: &str) -> PathBuf {
        self.topic_dir(topic).join(format!("{id}.{SUB_EXT}"))
    }

    pub async fn subscribe(&self, topic: &str, payload: &[u8]) -> Result<SubscriberId, TopicError> {
        let dir = self.topic_dir(topic);
        tokio::fs::create_dir_all(&dir).await.map_err(|source| TopicError::Create {
            path: dir.display().to_string(),
            source,
        })?;

        let (id, mut file) = self.create_unique(topic).await?;

        let mut buf = Vec::with_capacity(payload.len() + 1);
        buf.extend_from_slice(payload);
        buf.push(RECORD_DELIMITER);
        file.write_all(&buf)
            .await
            .map_err(|e| TopicError::io("write subscription", topic, e))?;
        file.flush()
            .await
            .map_err(|e| TopicError::io("write subscription", topic, e))?;

        tracing::info!(%topic, subscriber_id = %id, "registered subscriber");
        Ok(SubscriberId::new(id))
    }

    /// Создать файл `<id>.sub` с новым id; при коллизии id генерируется заново.
    async fn create_unique(&self, topic: &str) -> Result<(String, tokio::fs::File), TopicError> {
        let mut last_err = None;
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = random_id(SUBSCRIBER_ID_LEN);
            let path = self.sub_path(topic, &id);
            match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((id, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tracing::warn!(%topic, subscriber_id = %id, "subscriber id collision, regenerating");
                    last_err = Some(e);
                }
                Err(source) => {
                    return Err(TopicError::Create { path: path.display().to_string(), source });
                }
            }
        }
        Err(TopicError::Create {
            path: self.topic_dir(topic).display().to_string(),
            source: last_err.unwrap_or_else(|| std::io::Error::other("subscriber id exhausted")),
        })
    }

    /// Payload подписки без завершающего `\n`.
    pub async fn load(&self, topic: &str, id: &SubscriberId) -> Result<Vec<u8>, TopicError> {
        if !is_valid_id(id.as_str()) {
            return Err(TopicError::NotFound(format!("{topic}/{id}")));
        }
        let path = self.sub_path(topic, id.as_str());
        let mut bytes = tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                TopicError::NotFound(format!("{topic}/{id}"))
            } else {
                TopicError::Open { path: path.display().to_string(), source }
            }
        })?;
        if bytes.last() == Some(&RECORD_DELIMITER) {
            bytes.pop();
        }
        Ok(bytes)
    }

    /// Id всех сохранённых подписок topic'а, по возрастанию.
    pub async fn list(&self, topic: &str) -> Result<Vec<SubscriberId>, TopicError> {
        let dir = self.topic_dir(topic);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(TopicError::Open { path: dir.display().to_string(), source }),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TopicError::io("list subscriptions", topic, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_suffix(".sub") {
                ids.push(SubscriberId::new(id));
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

impl SubscriberStore for SubscriberRegistry {
    fn subscribe(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<SubscriberId, LogError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move {
            validate_topic_name(&topic)?;
            Ok(SubscriberRegistry::subscribe(self, &topic, &payload).await?)
        })
    }

    fn load(
        &self,
        topic: &str,
        id: &SubscriberId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, LogError>> + Send + '_>> {
        let topic = topic.to_string();
        let id = id.clone();
        Box::pin(async move {
            validate_topic_name(&topic)?;
            Ok(SubscriberRegistry::load(self, &topic, &id).await?)
        })
    }

    fn list(
        &self,
        topic: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SubscriberId>, LogError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move {
            validate_topic_name(&topic)?;
            Ok(SubscriberRegistry::list(self, &topic).await?)
        })
    }
}
