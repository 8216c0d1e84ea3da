//! Движок topic log: append-only файл на topic, реестр topic'ов,
//! сессии чтения (одиночное и follow) и хранилище подписок.

pub mod config;
pub mod error;
pub mod registry;
pub mod session;
pub mod store;
pub mod subscribers;

pub use config::LogConfig;
pub use error::TopicError;
pub use registry::TopicRegistry;
pub use session::{FollowSession, ReadSession};
pub use store::TopicStore;
pub use subscribers::{SUBSCRIBER_ID_LEN, SubscriberRegistry, random_id};
