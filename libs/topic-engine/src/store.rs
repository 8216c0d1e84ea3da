use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, OnceCell, watch};

use log_api::{AppendOffsets, RECORD_DELIMITER};

use crate::error::TopicError;

pub(crate) const TOPIC_EXT: &str = "topic";

// ═══════════════════════════════════════════════════════════════
//  TopicStore
// ═══════════════════════════════════════════════════════════════

/// Append-only файл одного topic'а.
///
/// Write и read handle открываются лениво и независимо друг от друга,
/// каждый не более одного раза за время жизни процесса. Конец лога
/// хранится явно в `watch` канале: append двигает его под write lock'ом,
/// follow-сессии ждут его изменения. Файловый курсор смещением
/// не считается.
pub struct TopicStore {
    name: String,
    path: PathBuf,
    sync_on_append: bool,
    end: watch::Sender<u64>,
    writer: OnceCell<Mutex<File>>,
    reader: OnceCell<Mutex<File>>,
}

impl std::fmt::Debug for TopicStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicStore")
            .field("name", &self.name)
            .field("end", &self.end())
            .finish()
    }
}

impl TopicStore {
    /// Создать запись для topic'а. Начальный конец лога берётся из
    /// длины файла на диске (0, если файла ещё нет).
    pub async fn load(name: &str, topics_dir: &Path, sync_on_append: bool) -> Self {
        let path = topic_path(topics_dir, name);
        let len = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        Self::with_end(name, path, sync_on_append, len)
    }

    fn with_end(name: &str, path: PathBuf, sync_on_append: bool, len: u64) -> Self {
        let (end, _) = watch::channel(len);
        Self {
            name: name.to_string(),
            path,
            sync_on_append,
            end,
            writer: OnceCell::new(),
            reader: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Текущий конец лога (смещение следующей записи).
    pub fn end(&self) -> u64 {
        *self.end.borrow()
    }

    /// Подписка на изменения конца лога.
    pub fn watch_end(&self) -> watch::Receiver<u64> {
        self.end.subscribe()
    }

    pub fn has_writer(&self) -> bool {
        self.writer.initialized()
    }

    pub fn has_reader(&self) -> bool {
        self.reader.initialized()
    }

    // ───────────────────────────────────────────────────────────
    //  Handles
    // ───────────────────────────────────────────────────────────

    /// Открыть (или вернуть уже открытый) write handle.
    /// Создаёт директорию и файл, если их нет.
    pub async fn open_writer(&self) -> Result<&Mutex<File>, TopicError> {
        self.writer
            .get_or_try_init(|| async {
                if let Some(dir) = self.path.parent() {
                    tokio::fs::create_dir_all(dir).await.map_err(|source| TopicError::Create {
                        path: dir.display().to_string(),
                        source,
                    })?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await
                    .map_err(|source| TopicError::Create {
                        path: self.path.display().to_string(),
                        source,
                    })?;
                tracing::info!(topic = %self.name, path = %self.path.display(), end = self.end(), "opened write handle");
                Ok::<_, TopicError>(Mutex::new(file))
            })
            .await
    }

    /// Открыть (или вернуть уже открытый) read handle.
    /// Файла нет → `NotFound`.
    pub async fn open_reader(&self) -> Result<&Mutex<File>, TopicError> {
        self.reader
            .get_or_try_init(|| async {
                let file = File::open(&self.path).await.map_err(|source| {
                    if source.kind() == std::io::ErrorKind::NotFound {
                        TopicError::NotFound(self.name.clone())
                    } else {
                        TopicError::Open { path: self.path.display().to_string(), source }
                    }
                })?;
                tracing::debug!(topic = %self.name, "opened read handle");
                Ok::<_, TopicError>(Mutex::new(file))
            })
            .await
    }

    // ───────────────────────────────────────────────────────────
    //  Write path
    // ───────────────────────────────────────────────────────────

    /// Дописать `payload` + разделитель. Возвращает конец лога до и после записи.
    ///
    /// Весь цикл "прочитать конец → записать → сдвинуть конец" идёт под
    /// write lock'ом topic'а, поэтому параллельные producer'ы получают
    /// непересекающиеся диапазоны.
    pub async fn append(&self, payload: &[u8]) -> Result<AppendOffsets, TopicError> {
        if payload.contains(&RECORD_DELIMITER) {
            return Err(TopicError::Delimiter(self.name.clone()));
        }

        let writer = self.open_writer().await?;
        let mut file = writer.lock().await;

        let offset = self.end();
        let mut buf = Vec::with_capacity(payload.len() + 1);
        buf.extend_from_slice(payload);
        buf.push(RECORD_DELIMITER);

        if let Err(source) = write_record(&mut file, &buf, self.sync_on_append).await {
            // Откатить хвост, чтобы следующая запись легла ровно на `offset`.
            if let Err(e) = file.set_len(offset).await {
                tracing::error!(topic = %self.name, offset, error = %e, "truncate after failed append");
                // Хвост остался в файле: O_APPEND пишет после него,
                // значит конец лога надо взять из длины файла.
                match self.resync_end(&file).await {
                    Ok(len) => tracing::warn!(topic = %self.name, end = len, "end offset re-read from file"),
                    Err(e) => tracing::error!(topic = %self.name, error = %e, "re-read file length"),
                }
            }
            return Err(TopicError::io("append", &self.name, source));
        }

        let next = offset + buf.len() as u64;
        self.end.send_modify(|end| *end = next);
        tracing::debug!(topic = %self.name, offset, next, "appended record");
        Ok(AppendOffsets { offset, next })
    }

    /// Выставить конец лога по фактической длине файла.
    async fn resync_end(&self, file: &File) -> Result<u64, TopicError> {
        let len = file
            .metadata()
            .await
            .map_err(|e| TopicError::io("stat", &self.name, e))?
            .len();
        self.end.send_modify(|end| *end = len);
        Ok(len)
    }

    /// `sync_all` для write handle, если он открыт.
    pub async fn flush(&self) -> Result<(), TopicError> {
        if let Some(writer) = self.writer.get() {
            let file = writer.lock().await;
            file.sync_all().await.map_err(|e| TopicError::io("sync", &self.name, e))?;
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────
    //  Read path
    // ───────────────────────────────────────────────────────────

    /// Байт непосредственно перед `offset` (для проверки границы записи).
    pub async fn byte_before(&self, offset: u64) -> Result<Option<u8>, TopicError> {
        if offset == 0 || offset > self.end() {
            return Ok(None);
        }
        let reader = self.open_reader().await?;
        let mut file = reader.lock().await;
        file.seek(SeekFrom::Start(offset - 1))
            .await
            .map_err(|e| TopicError::io("seek", &self.name, e))?;
        let byte = file.read_u8().await.map_err(|e| TopicError::io("read", &self.name, e))?;
        Ok(Some(byte))
    }

    /// Прочитать запись от `pos` до ближайшего разделителя, не дальше конца лога.
    /// `None` — полной записи по этому смещению нет.
    pub async fn read_record(&self, pos: u64) -> Result<Option<Vec<u8>>, TopicError> {
        let end = self.end();
        if pos >= end {
            return Ok(None);
        }
        let reader = self.open_reader().await?;
        let mut file = reader.lock().await;
        file.seek(SeekFrom::Start(pos))
            .await
            .map_err(|e| TopicError::io("seek", &self.name, e))?;

        let mut bounded = BufReader::new((&mut *file).take(end - pos));
        let mut buf = Vec::new();
        bounded
            .read_until(RECORD_DELIMITER, &mut buf)
            .await
            .map_err(|e| TopicError::io("read", &self.name, e))?;

        if buf.last() == Some(&RECORD_DELIMITER) {
            buf.pop();
            Ok(Some(buf))
        } else {
            Ok(None)
        }
    }

    /// Прочитать байты `[pos, min(pos + limit, end))`. Пусто, если `pos >= end`.
    pub async fn read_chunk(&self, pos: u64, limit: usize) -> Result<Vec<u8>, TopicError> {
        let end = self.end();
        if pos >= end {
            return Ok(Vec::new());
        }
        let len = (end - pos).min(limit as u64) as usize;
        let reader = self.open_reader().await?;
        let mut file = reader.lock().await;
        file.seek(SeekFrom::Start(pos))
            .await
            .map_err(|e| TopicError::io("seek", &self.name, e))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| TopicError::io("read", &self.name, e))?;
        Ok(buf)
    }
}

async fn write_record(file: &mut File, buf: &[u8], sync: bool) -> std::io::Result<()> {
    file.write_all(buf).await?;
    file.flush().await?;
    if sync {
        file.sync_data().await?;
    }
    Ok(())
}

pub(crate) fn topic_path(topics_dir: &Path, name: &str) -> PathBuf {
    topics_dir.join(format!("{name}.{TOPIC_EXT}"))
}
