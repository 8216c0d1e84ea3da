use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;
use log_api::{SubscriberStore, TopicLog};
use topic_api_server::AppState;
use topic_engine::{SubscriberRegistry, TopicRegistry};

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("topiclog-server starting");

    // --- Load config ---
    let config = ServerConfig::resolve(&args)?;
    tracing::info!(
        config = args.config.as_deref().unwrap_or("<defaults>"),
        listen = %config.listen,
        topics_dir = %config.log.topics_dir.display(),
        subscribers_dir = %config.log.subscribers_dir.display(),
        sync_on_append = config.log.sync_on_append,
        "loaded config"
    );

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    let subscribers: Arc<dyn SubscriberStore> =
        Arc::new(SubscriberRegistry::new(config.log.subscribers_dir.clone()));
    let registry = Arc::new(TopicRegistry::with_shutdown(config.log, token.child_token()));
    let log: Arc<dyn TopicLog> = registry.clone();

    // --- API server (HTTP) ---
    let state = AppState::new(log.clone(), subscribers);
    let api_token = token.clone();
    let listen = config.listen.clone();
    let mut api_handle = tokio::spawn(async move {
        topic_api_server::run(&listen, state, api_token).await
    });

    // --- Ожидание Ctrl+C или падения API ---
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down...");
        }
        res = &mut api_handle => {
            // Сервер завершился сам: bind не удался или serve упал.
            token.cancel();
            return match res {
                Ok(r) => r.map_err(ServerError::from),
                Err(e) => Err(ServerError::Task(e)),
            };
        }
    }

    // Остановить follow-сессии и HTTP сервер
    token.cancel();

    match api_handle.await {
        Ok(Err(e)) => tracing::error!(error = %e, "api server error"),
        Err(e) => tracing::error!(error = %e, "api server task failed"),
        Ok(Ok(())) => {}
    }

    // Flush all topic logs
    log.flush_all().await.map_err(ServerError::Flush)?;

    tracing::info!(topics = registry.list_topics().len(), "shutdown complete");
    Ok(())
}
