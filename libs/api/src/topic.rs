use std::future::Future;
use std::pin::Pin;

use crate::{AppendOffsets, LogError, SubscriberId};

// ════════════════════════════════════════════════════════════════
//  Topic Log Traits
// ════════════════════════════════════════════════════════════════

/// Поток байтов follow-сессии.
///
/// Реализуется движком (mpsc receiver). API crate определяет только
/// трейт, без зависимости от tokio.
pub trait FollowStream: Send {
    /// Следующий кусок байтов лога. `None` = сессия закрыта
    /// (shutdown или ошибка уже доставлена).
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<Result<Vec<u8>, LogError>>> + Send + '_>>;
}

/// Контракт per-topic append-only лога.
///
/// Server-side TopicRegistry реализует этот трейт; HTTP слой работает
/// только через него.
pub trait TopicLog: Send + Sync {
    /// Дописать запись в topic (создаёт topic при первом обращении).
    fn append(&self, topic: &str, payload: Vec<u8>)
        -> Pin<Box<dyn Future<Output = Result<AppendOffsets, LogError>> + Send + '_>>;

    /// Прочитать одну запись, начинающуюся со смещения `offset`.
    fn read_at(&self, topic: &str, offset: u64)
        -> Pin<Box<dyn Future<Output = Result<Vec<u8>, LogError>> + Send + '_>>;

    /// Открыть live tail начиная со смещения `offset`.
    ///
    /// Сессия живёт, пока потребитель держит stream.
    #[allow(clippy::type_complexity)]
    fn follow(&self, topic: &str, offset: u64)
        -> Pin<Box<dyn Future<Output = Result<Box<dyn FollowStream>, LogError>> + Send + '_>>;

    /// Topic'и с открытым write handle в текущем процессе.
    fn topics(&self) -> Vec<String>;

    /// Сбросить все write handle'ы на диск (при graceful shutdown).
    fn flush_all(&self) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>>;
}

/// Хранилище заявок на подписку. Доставки нет — только persist.
pub trait SubscriberStore: Send + Sync {
    /// Сохранить payload подписки, вернуть сгенерированный id.
    fn subscribe(&self, topic: &str, payload: Vec<u8>)
        -> Pin<Box<dyn Future<Output = Result<SubscriberId, LogError>> + Send + '_>>;

    /// Прочитать сохранённый payload подписки.
    fn load(&self, topic: &str, id: &SubscriberId)
        -> Pin<Box<dyn Future<Output = Result<Vec<u8>, LogError>> + Send + '_>>;

    /// Id всех подписок topic'а.
    fn list(&self, topic: &str)
        -> Pin<Box<dyn Future<Output = Result<Vec<SubscriberId>, LogError>> + Send + '_>>;
}
