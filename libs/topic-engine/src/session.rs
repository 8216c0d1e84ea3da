use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use log_api::{FollowStream, LogError, RECORD_DELIMITER};

use crate::error::TopicError;
use crate::store::TopicStore;

// ═══════════════════════════════════════════════════════════════
//  ReadSession — Opened(offset)
// ═══════════════════════════════════════════════════════════════

/// Сессия чтения topic'а с проверенного смещения.
///
/// Переходы: `open` → `read_one` (запись или `Absent`) либо
/// `open` → `follow` (`FollowSession`, живёт до закрытия потребителем).
#[derive(Debug)]
pub struct ReadSession {
    store: Arc<TopicStore>,
    offset: u64,
}

impl ReadSession {
    /// Открыть сессию. Смещение должно быть не дальше конца лога и
    /// указывать на начало записи (0 или байт сразу после разделителя).
    pub async fn open(store: Arc<TopicStore>, offset: u64) -> Result<Self, TopicError> {
        store.open_reader().await?;

        let end = store.end();
        if offset > end {
            return Err(TopicError::PastEnd { topic: store.name().to_string(), offset, end });
        }
        if offset > 0 && store.byte_before(offset).await? != Some(RECORD_DELIMITER) {
            return Err(TopicError::MidRecord { topic: store.name().to_string(), offset });
        }

        Ok(Self { store, offset })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Одиночное чтение: ровно одна запись без разделителя.
    /// Если полной записи нет — `Absent`, без ожидания.
    pub async fn read_one(self) -> Result<Vec<u8>, TopicError> {
        match self.store.read_record(self.offset).await? {
            Some(record) => Ok(record),
            None => Err(TopicError::Absent {
                topic: self.store.name().to_string(),
                offset: self.offset,
            }),
        }
    }

    /// Перейти в режим live tail.
    ///
    /// Фоновая задача копирует в канал все байты от смещения и далее,
    /// затем ждёт следующего append. Завершается, когда потребитель
    /// закрыл `FollowSession`, сработал `shutdown` или чтение упало
    /// (ошибка уходит последним элементом).
    pub fn follow(self, buffer: usize, chunk_size: usize, shutdown: CancellationToken) -> FollowSession {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(follow_loop(
            self.store,
            self.offset,
            chunk_size.max(1),
            tx,
            shutdown,
        ));
        FollowSession { rx, handle }
    }
}

// ═══════════════════════════════════════════════════════════════
//  FollowSession — Streaming → Closed
// ═══════════════════════════════════════════════════════════════

/// Live tail topic'а. Drop (или `close`) останавливает фоновую задачу.
pub struct FollowSession {
    rx: mpsc::Receiver<Result<Vec<u8>, LogError>>,
    handle: JoinHandle<()>,
}

impl FollowSession {
    /// Следующий кусок байтов. `None` — сессия закрыта.
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, LogError>> {
        self.rx.recv().await
    }

    /// Закрыть сессию явно.
    pub fn close(self) {}

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for FollowSession {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl FollowStream for FollowSession {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<Result<Vec<u8>, LogError>>> + Send + '_>> {
        Box::pin(self.next_chunk())
    }
}

async fn follow_loop(
    store: Arc<TopicStore>,
    mut pos: u64,
    chunk_size: usize,
    tx: mpsc::Sender<Result<Vec<u8>, LogError>>,
    shutdown: CancellationToken,
) {
    let topic = store.name().to_string();
    let mut end_rx = store.watch_end();
    tracing::debug!(%topic, offset = pos, "follow session started");

    loop {
        // Отдать всё, что уже есть в логе.
        loop {
            let chunk = match store.read_chunk(pos, chunk_size).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(%topic, offset = pos, error = %e, "follow read failed");
                    let _ = tx.send(Err(e.into_log_error())).await;
                    return;
                }
            };
            if chunk.is_empty() {
                break;
            }
            pos += chunk.len() as u64;
            tokio::select! {
                sent = tx.send(Ok(chunk)) => {
                    if sent.is_err() {
                        tracing::debug!(%topic, offset = pos, "follow consumer gone");
                        return;
                    }
                }
                _ = shutdown.cancelled() => return,
            }
        }

        // Ждать следующего append.
        tokio::select! {
            changed = end_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = tx.closed() => {
                tracing::debug!(%topic, offset = pos, "follow consumer gone");
                return;
            }
            _ = shutdown.cancelled() => {
                tracing::debug!(%topic, offset = pos, "follow session cancelled");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;

    async fn store(dir: &Path) -> Arc<TopicStore> {
        Arc::new(TopicStore::load("t", &dir.join("topics"), false).await)
    }

    async fn next(session: &mut FollowSession) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), session.next_chunk())
            .await
            .expect("follow chunk timed out")
            .expect("follow session closed")
            .expect("follow read failed")
    }

    #[tokio::test]
    async fn single_read_returns_each_record() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path()).await;
        let a = s.append(b"first").await.unwrap();
        let b = s.append(b"second").await.unwrap();

        let got_a = ReadSession::open(s.clone(), a.offset).await.unwrap().read_one().await.unwrap();
        let got_b = ReadSession::open(s.clone(), b.offset).await.unwrap().read_one().await.unwrap();
        assert_eq!(got_a, b"first");
        assert_eq!(got_b, b"second");
    }

    #[tokio::test]
    async fn read_at_end_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path()).await;
        let a = s.append(b"only").await.unwrap();

        let err = ReadSession::open(s.clone(), a.next).await.unwrap().read_one().await.unwrap_err();
        assert!(matches!(err, TopicError::Absent { offset, .. } if offset == a.next));
    }

    #[tokio::test]
    async fn offset_past_end_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path()).await;
        s.append(b"abc").await.unwrap();

        let err = ReadSession::open(s, 100).await.unwrap_err();
        assert!(matches!(err, TopicError::PastEnd { offset: 100, end: 4, .. }));
    }

    #[tokio::test]
    async fn mid_record_offset_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path()).await;
        s.append(b"abcdef").await.unwrap();

        let err = ReadSession::open(s, 2).await.unwrap_err();
        assert!(matches!(err, TopicError::MidRecord { offset: 2, .. }));
    }

    #[tokio::test]
    async fn follow_delivers_existing_then_new_records() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path()).await;
        s.append(b"old").await.unwrap();

        let mut session = ReadSession::open(s.clone(), 0)
            .await
            .unwrap()
            .follow(8, 1024, CancellationToken::new());
        assert_eq!(next(&mut session).await, b"old\n");

        s.append(b"new").await.unwrap();
        assert_eq!(next(&mut session).await, b"new\n");
    }

    #[tokio::test]
    async fn follow_from_middle_skips_earlier_records() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path()).await;
        s.append(b"a").await.unwrap();
        let b = s.append(b"b").await.unwrap();

        let mut session = ReadSession::open(s.clone(), b.offset)
            .await
            .unwrap()
            .follow(8, 1024, CancellationToken::new());
        assert_eq!(next(&mut session).await, b"b\n");
    }

    #[tokio::test]
    async fn follow_splits_large_backlog_into_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path()).await;
        s.append(b"0123456789").await.unwrap();

        let mut session = ReadSession::open(s.clone(), 0)
            .await
            .unwrap()
            .follow(8, 4, CancellationToken::new());
        let mut got = Vec::new();
        while got.len() < 11 {
            got.extend(next(&mut session).await);
        }
        assert_eq!(got, b"0123456789\n");
    }

    #[tokio::test]
    async fn follow_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path()).await;
        s.append(b"x").await.unwrap();

        let token = CancellationToken::new();
        let mut session = ReadSession::open(s, 0).await.unwrap().follow(8, 1024, token.clone());
        assert_eq!(next(&mut session).await, b"x\n");

        token.cancel();
        let end = tokio::time::timeout(Duration::from_secs(5), session.next_chunk())
            .await
            .expect("session did not close");
        assert!(end.is_none());
    }
}
