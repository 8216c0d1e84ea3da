use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;

use log_api::{AppendOffsets, FollowStream, LogError, RECORD_DELIMITER, TopicLog, validate_topic_name};

use crate::config::LogConfig;
use crate::error::TopicError;
use crate::session::{FollowSession, ReadSession};
use crate::store::{TopicStore, topic_path};

// ═══════════════════════════════════════════════════════════════
//  TopicRegistry
// ═══════════════════════════════════════════════════════════════

/// Реестр topic'ов процесса: имя → `TopicStore`.
///
/// Запись создаётся атомарно под write lock'ом карты; handle'ы внутри
/// записи открываются через `OnceCell`, так что конкурентные первые
/// обращения к одному topic'у создают ровно один handle на направление.
/// Реализует `TopicLog`.
pub struct TopicRegistry {
    config: LogConfig,
    topics: RwLock<HashMap<String, Arc<TopicStore>>>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("topics_dir", &self.config.topics_dir)
            .field("topics", &self.len())
            .finish()
    }
}

impl TopicRegistry {
    pub fn new(config: LogConfig) -> Self {
        Self::with_shutdown(config, CancellationToken::new())
    }

    /// `shutdown` закрывает все follow-сессии реестра.
    pub fn with_shutdown(config: LogConfig, shutdown: CancellationToken) -> Self {
        Self {
            config,
            topics: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<TopicStore>>> {
        match self.topics.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("topic registry read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<TopicStore>>> {
        match self.topics.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("topic registry write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn get(&self, name: &str) -> Option<Arc<TopicStore>> {
        self.read_map().get(name).cloned()
    }

    /// Вернуть запись topic'а, создав её, если нет.
    ///
    /// Длина файла читается до захвата map lock'а; при гонке в реестр
    /// попадает первая вставленная запись, остальные отбрасываются.
    async fn entry(&self, name: &str) -> Arc<TopicStore> {
        if let Some(store) = self.get(name) {
            return store;
        }
        let fresh = TopicStore::load(name, &self.config.topics_dir, self.config.sync_on_append).await;
        let mut map = self.write_map();
        map.entry(name.to_string())
            .or_insert_with(|| Arc::new(fresh))
            .clone()
    }

    /// Единственный write handle topic'а; создаёт topic при первом обращении.
    pub async fn resolve_for_write(&self, name: &str) -> Result<Arc<TopicStore>, LogError> {
        validate_topic_name(name)?;
        let store = self.entry(name).await;
        store.open_writer().await?;
        Ok(store)
    }

    /// Единственный read handle topic'а. Topic без файла → `NotFound`,
    /// запись в реестре при этом не создаётся.
    pub async fn resolve_for_read(&self, name: &str) -> Result<Arc<TopicStore>, LogError> {
        validate_topic_name(name)?;
        let store = match self.get(name) {
            Some(s) => s,
            None => {
                let path = topic_path(&self.config.topics_dir, name);
                let exists = tokio::fs::try_exists(&path)
                    .await
                    .map_err(|e| TopicError::io("stat", name, e))?;
                if !exists {
                    return Err(TopicError::NotFound(name.to_string()).into());
                }
                self.entry(name).await
            }
        };
        store.open_reader().await?;
        Ok(store)
    }

    pub async fn append(&self, name: &str, payload: &[u8]) -> Result<AppendOffsets, LogError> {
        // Отклонённая запись не должна создавать topic.
        if payload.contains(&RECORD_DELIMITER) {
            return Err(TopicError::Delimiter(name.to_string()).into());
        }
        let store = self.resolve_for_write(name).await?;
        Ok(store.append(payload).await?)
    }

    pub async fn read_at(&self, name: &str, offset: u64) -> Result<Vec<u8>, LogError> {
        let store = self.resolve_for_read(name).await?;
        let session = ReadSession::open(store, offset).await?;
        Ok(session.read_one().await?)
    }

    pub async fn follow(&self, name: &str, offset: u64) -> Result<FollowSession, LogError> {
        let store = self.resolve_for_read(name).await?;
        let session = ReadSession::open(store, offset).await?;
        tracing::info!(topic = %name, offset, "follow session opened");
        Ok(session.follow(
            self.config.follow_buffer,
            self.config.follow_chunk_size,
            self.shutdown.child_token(),
        ))
    }

    /// Topic'и с открытым write handle в этом процессе, по алфавиту.
    pub fn list_topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read_map()
            .values()
            .filter(|s| s.has_writer())
            .map(|s| s.name().to_string())
            .collect();
        names.sort();
        names
    }

    pub async fn flush(&self) -> Result<(), LogError> {
        let stores: Vec<Arc<TopicStore>> = self.read_map().values().cloned().collect();
        let mut first_err = None;
        for store in stores {
            if let Err(e) = store.flush().await {
                tracing::error!(topic = %store.name(), error = %e, "flush error");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Закрыть все follow-сессии.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl TopicLog for TopicRegistry {
    fn append(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<AppendOffsets, LogError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move { TopicRegistry::append(self, &topic, &payload).await })
    }

    fn read_at(
        &self,
        topic: &str,
        offset: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, LogError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move { TopicRegistry::read_at(self, &topic, offset).await })
    }

    fn follow(
        &self,
        topic: &str,
        offset: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn FollowStream>, LogError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move {
            let session = TopicRegistry::follow(self, &topic, offset).await?;
            Ok(Box::new(session) as Box<dyn FollowStream>)
        })
    }

    fn topics(&self) -> Vec<String> {
        self.list_topics()
    }

    fn flush_all(&self) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>> {
        Box::pin(self.flush())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use log_api::ErrorKind;

    use super::*;

    fn registry(dir: &std::path::Path) -> Arc<TopicRegistry> {
        let mut config = LogConfig::with_root(dir);
        config.sync_on_append = false;
        Arc::new(TopicRegistry::new(config))
    }

    #[tokio::test]
    async fn read_back_every_appended_record() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());

        let payloads: Vec<Vec<u8>> = (0..20).map(|i| format!("record-{i}").into_bytes()).collect();
        let mut offsets = Vec::new();
        for p in &payloads {
            offsets.push(reg.append("t", p).await.unwrap());
        }
        for (p, off) in payloads.iter().zip(&offsets) {
            assert_eq!(off.next - off.offset, p.len() as u64 + 1);
            assert_eq!(&reg.read_at("t", off.offset).await.unwrap(), p);
        }
    }

    #[tokio::test]
    async fn list_topics_reports_written_topics_only() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        assert!(reg.list_topics().is_empty());

        for name in ["c", "a", "b"] {
            reg.append(name, b"x").await.unwrap();
        }
        let _ = reg.read_at("missing", 0).await;

        assert_eq!(reg.list_topics(), vec!["a", "b", "c"]);
        assert_eq!(TopicLog::topics(&*reg), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn read_of_unknown_topic_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());

        let err = reg.read_at("ghost", 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(reg.get("ghost").is_none());
    }

    #[tokio::test]
    async fn invalid_topic_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());

        let err = reg.append("../escape", b"x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTopic);
    }

    #[tokio::test]
    async fn offset_errors_are_distinguishable() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let off = reg.append("t", b"hello").await.unwrap();

        assert_eq!(reg.read_at("t", 2).await.unwrap_err().kind(), ErrorKind::InvalidOffset);
        assert_eq!(reg.read_at("t", 99).await.unwrap_err().kind(), ErrorKind::InvalidOffset);
        assert_eq!(reg.read_at("t", off.next).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(reg.append("t", b"a\nb").await.unwrap_err().kind(), ErrorKind::InvalidRecord);
        assert_eq!(reg.append("fresh", b"a\nb").await.unwrap_err().kind(), ErrorKind::InvalidRecord);
        assert_eq!(reg.list_topics(), vec!["t"]);
    }

    #[tokio::test]
    async fn handles_are_reused_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());

        let first = reg.resolve_for_write("t").await.unwrap();
        let second = reg.resolve_for_write("t").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let reader = reg.resolve_for_read("t").await.unwrap();
        assert!(Arc::ptr_eq(&first, &reader));
        assert!(reader.has_reader());
    }

    #[tokio::test]
    async fn topic_written_by_previous_process_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let off = {
            let reg = registry(dir.path());
            reg.append("t", b"persisted").await.unwrap()
        };

        let reg = registry(dir.path());
        assert!(reg.list_topics().is_empty());
        assert_eq!(reg.read_at("t", off.offset).await.unwrap(), b"persisted");

        let next = reg.append("t", b"more").await.unwrap();
        assert_eq!(next.offset, off.next);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_partition_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());

        let mut tasks = Vec::new();
        for i in 0..16 {
            let reg = reg.clone();
            tasks.push(tokio::spawn(async move {
                let mut out = Vec::new();
                for j in 0..25 {
                    let payload = format!("w{i}-r{j}-{}", "x".repeat(i * 3 + j));
                    let off = reg.append("shared", payload.as_bytes()).await.unwrap();
                    out.push((off, payload));
                }
                out
            }));
        }

        let mut all = Vec::new();
        for t in tasks {
            all.extend(t.await.unwrap());
        }
        all.sort_by_key(|(off, _)| off.offset);

        let mut expected_start = 0;
        for (off, payload) in &all {
            assert_eq!(off.offset, expected_start, "gap or overlap at {}", off.offset);
            assert_eq!(off.next, off.offset + payload.len() as u64 + 1);
            expected_start = off.next;
        }
        let file_len = std::fs::metadata(dir.path().join("topics").join("shared.topic")).unwrap().len();
        assert_eq!(expected_start, file_len);

        for (off, payload) in &all {
            assert_eq!(reg.read_at("shared", off.offset).await.unwrap(), payload.as_bytes());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_access_creates_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let reg = reg.clone();
            tasks.push(tokio::spawn(async move { reg.resolve_for_write("race").await.unwrap() }));
        }
        let mut stores = Vec::new();
        for t in tasks {
            stores.push(t.await.unwrap());
        }
        let ptrs: HashSet<*const TopicStore> = stores.iter().map(Arc::as_ptr).collect();
        assert_eq!(ptrs.len(), 1);
    }

    #[tokio::test]
    async fn follow_sees_appends_without_rerequest() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let off = reg.append("t", b"first").await.unwrap();

        let mut stream = TopicLog::follow(&*reg, "t", off.next).await.unwrap();
        reg.append("t", b"second").await.unwrap();

        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(chunk, b"second\n");
    }

    #[tokio::test]
    async fn shutdown_closes_follow_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        reg.append("t", b"x").await.unwrap();

        let mut session = reg.follow("t", 0).await.unwrap();
        assert_eq!(session.next_chunk().await.unwrap().unwrap(), b"x\n");

        reg.shutdown();
        let end = tokio::time::timeout(Duration::from_secs(5), session.next_chunk()).await.unwrap();
        assert!(end.is_none());
    }
}
