#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Serve(#[from] topic_api_server::ServeError),

    #[error("api task: {0}")]
    Task(tokio::task::JoinError),

    #[error("flush: {0}")]
    Flush(log_api::LogError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
