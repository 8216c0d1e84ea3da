use log_api::LogError;

#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    #[error("topic '{0}' not found")]
    NotFound(String),

    #[error("create {path}: {source}")]
    Create { path: String, source: std::io::Error },

    #[error("open {path}: {source}")]
    Open { path: String, source: std::io::Error },

    #[error("{op} topic '{topic}': {source}")]
    Io { op: &'static str, topic: String, source: std::io::Error },

    #[error("no record at offset {offset} of topic '{topic}'")]
    Absent { topic: String, offset: u64 },

    #[error("offset {offset} is past the end of topic '{topic}' ({end})")]
    PastEnd { topic: String, offset: u64, end: u64 },

    #[error("offset {offset} is not a record boundary in topic '{topic}'")]
    MidRecord { topic: String, offset: u64 },

    #[error("record for topic '{0}' contains the delimiter byte")]
    Delimiter(String),
}

impl TopicError {
    pub(crate) fn io(op: &'static str, topic: &str, source: std::io::Error) -> Self {
        TopicError::Io { op, topic: topic.to_string(), source }
    }

    /// Convert to LogError preserving the error category.
    ///
    /// `NotFound`/`Absent` → NotFound, `PastEnd`/`MidRecord` → InvalidOffset,
    /// `Create`/`Open` → Storage, `Io` → Io.
    pub fn into_log_error(self) -> LogError {
        let msg = self.to_string();
        match self {
            TopicError::NotFound(_) | TopicError::Absent { .. } => LogError::not_found(msg),
            TopicError::PastEnd { .. } | TopicError::MidRecord { .. } => LogError::invalid_offset(msg),
            TopicError::Create { .. } | TopicError::Open { .. } => LogError::storage(msg),
            TopicError::Io { .. } => LogError::io(msg),
            TopicError::Delimiter(_) => LogError::invalid_record(msg),
        }
    }
}

impl From<TopicError> for LogError {
    fn from(e: TopicError) -> Self {
        e.into_log_error()
    }
}
