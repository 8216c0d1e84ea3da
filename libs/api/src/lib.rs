//! Общие типы и трейты topic log: ошибки, смещения, id подписчиков
//! и контракт `append` / `read_at` / `follow`, через который HTTP слой
//! обращается к движку.

pub mod error;
pub mod topic;
pub mod types;
pub mod util;

pub use error::{ErrorKind, LogError};
pub use topic::{FollowStream, SubscriberStore, TopicLog};
pub use types::{AppendOffsets, ReadMode, SubscribeResponse, SubscriberId, RECORD_DELIMITER};
pub use util::{parse_offset, validate_topic_name};
