//! HTTP API topic log поверх axum.
//!
//! ```text
//! PUT  /topic/{topic}                 append записи (тело = байты записи)
//! GET  /topic                         список topic'ов процесса
//! GET  /topic/{topic}[/{offset}]      одна запись; ?cmd=follow — live tail
//! POST /topic/{topic}/subscribe       сохранить заявку на подписку
//! ```

mod error;
mod http;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, header};
use axum::routing::{get, post, put};
use tokio_util::sync::CancellationToken;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use log_api::{SubscriberStore, TopicLog};

pub use error::{ApiError, ServeError};

#[derive(Clone)]
pub struct AppState {
    pub log: Arc<dyn TopicLog>,
    pub subscribers: Arc<dyn SubscriberStore>,
}

impl AppState {
    pub fn new(log: Arc<dyn TopicLog>, subscribers: Arc<dyn SubscriberStore>) -> Self {
        Self { log, subscribers }
    }
}

/// Собрать router. Все ответы несут `Access-Control-Allow-Origin: *`.
/// Размер тела PUT не ограничен: запись может быть любой длины.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/topic", get(http::handle_list_topics))
        .route(
            "/topic/{topic}",
            put(http::handle_append).get(http::handle_read_from_start),
        )
        .route("/topic/{topic}/subscribe", post(http::handle_subscribe))
        .route("/topic/{topic}/{offset}", get(http::handle_read))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .with_state(state)
}

/// Topic log HTTP сервер. Работает до отмены `shutdown`.
///
/// Ошибка bind возвращается вызывающему: без порта сервер не стартует.
pub async fn run(
    addr: &str,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr: addr.to_string(), source })?;

    match listener.local_addr() {
        Ok(local) => tracing::info!(addr = %local, "api server listening"),
        Err(e) => tracing::warn!(error = %e, "api server listening (local addr unknown)"),
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(ServeError::Serve)?;

    Ok(())
}
