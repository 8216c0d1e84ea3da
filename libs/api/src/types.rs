use serde::{Deserialize, Serialize};

/// Разделитель записей в файле topic'а.
pub const RECORD_DELIMITER: u8 = b'\n';

// ════════════════════════════════════════════════════════════════
//  Offsets
// ════════════════════════════════════════════════════════════════

/// Результат append: позиция записанной записи и позиция следующей.
///
/// `next - offset == payload.len() + 1` (разделитель).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendOffsets {
    pub offset: u64,
    pub next: u64,
}

// ════════════════════════════════════════════════════════════════
//  Read mode
// ════════════════════════════════════════════════════════════════

/// Режим чтения topic'а.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Одна запись по смещению.
    #[default]
    Single,
    /// Live tail: все байты от смещения и далее, без ограничения по времени.
    Follow,
}

impl ReadMode {
    /// `cmd=follow` → Follow. Любое другое значение (или его отсутствие)
    /// трактуется как одиночное чтение.
    pub fn from_cmd(cmd: Option<&str>) -> Self {
        match cmd {
            Some("follow") => ReadMode::Follow,
            _ => ReadMode::Single,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Subscriptions
// ════════════════════════════════════════════════════════════════

/// Случайный идентификатор подписки, он же имя файла `<id>.sub`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Тело ответа на `POST /topic/{topic}/subscribe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub subscriber_id: SubscriberId,
}
