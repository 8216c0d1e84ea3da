use crate::LogError;

const MAX_TOPIC_LEN: usize = 255;

/// Проверить имя topic'а: `[A-Za-z0-9._-]+`, не `.` и не `..`.
///
/// Имя используется как имя файла, поэтому разделители путей запрещены.
pub fn validate_topic_name(name: &str) -> Result<(), LogError> {
    if name.is_empty() {
        return Err(LogError::invalid_topic("topic name is empty"));
    }
    if name.len() > MAX_TOPIC_LEN {
        return Err(LogError::invalid_topic(format!(
            "topic name longer than {MAX_TOPIC_LEN} bytes"
        )));
    }
    if name == "." || name == ".." {
        return Err(LogError::invalid_topic(format!("invalid topic name '{name}'")));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(LogError::invalid_topic(format!(
            "invalid character {c:?} in topic name '{name}'"
        )));
    }
    Ok(())
}

/// Разобрать смещение из сегмента пути. Пусто или отсутствует → 0.
pub fn parse_offset(raw: Option<&str>) -> Result<u64, LogError> {
    match raw {
        None | Some("") => Ok(0),
        Some(s) => s
            .parse::<u64>()
            .map_err(|e| LogError::invalid_offset(format!("invalid offset '{s}': {e}"))),
    }
}
