/// Категория ошибки topic log. HTTP слой по ней выбирает статус
/// ответа (4xx для ошибок клиента, 5xx для ошибок хранилища).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Не удалось создать/открыть директорию или файл хранилища.
    Storage,
    /// Ошибка записи, seek или чтения.
    Io,
    /// Topic, запись или подписка не существует.
    NotFound,
    /// Смещение не число, за концом лога или указывает в середину записи.
    InvalidOffset,
    /// Имя topic'а не проходит валидацию.
    InvalidTopic,
    /// Payload содержит разделитель записей.
    InvalidRecord,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Storage => f.write_str("storage"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::NotFound => f.write_str("not_found"),
            ErrorKind::InvalidOffset => f.write_str("invalid_offset"),
            ErrorKind::InvalidTopic => f.write_str("invalid_topic"),
            ErrorKind::InvalidRecord => f.write_str("invalid_record"),
        }
    }
}

/// Единый тип ошибки для всех операций topic log.
///
/// Несёт `ErrorKind` и человекочитаемое сообщение. `From<std::io::Error>`
/// даёт `Io`, чтобы `?` работал в коде движка без ручного маппинга.
#[derive(Clone)]
pub struct LogError {
    kind: ErrorKind,
    message: String,
}

impl LogError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn invalid_offset(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOffset, msg)
    }

    pub fn invalid_topic(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidTopic, msg)
    }

    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRecord, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Ошибка вызвана запросом клиента, а не состоянием хранилища.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::NotFound
                | ErrorKind::InvalidOffset
                | ErrorKind::InvalidTopic
                | ErrorKind::InvalidRecord
        )
    }
}

impl std::fmt::Debug for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for LogError {}

impl From<std::io::Error> for LogError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Io, message: e.to_string() } }
}

impl From<serde_json::Error> for LogError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Io, message: e.to_string() } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_distinguished_from_storage_failures() {
        assert!(LogError::not_found("x").is_client_error());
        assert!(LogError::invalid_offset("x").is_client_error());
        assert!(!LogError::storage("x").is_client_error());
        assert!(!LogError::from(std::io::Error::other("disk full")).is_client_error());
    }

    #[test]
    fn debug_includes_kind() {
        let e = LogError::not_found("topic 'a' not found");
        assert_eq!(format!("{e:?}"), "[not_found] topic 'a' not found");
        assert_eq!(e.to_string(), "topic 'a' not found");
    }
}
