//! 答案缓存 - 业务能力层
//!
//! 编辑器在每次防抖后的修改时写入，引擎只在交卷时读取。
//! 键为 `(exam_id, question_id, language_id)`，可选过期时间，过期条目视为空。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, Utc};
use tracing::debug;

use crate::error::CacheError;
use crate::models::SavedAnswer;

/// 答案缓存（从引擎视角看是同步的）
pub trait AnswerCache: Send + Sync {
    fn get(
        &self,
        exam_id: &str,
        question_id: &str,
        language_id: u32,
    ) -> Result<Option<SavedAnswer>, CacheError>;

    fn set(&self, answer: SavedAnswer) -> Result<(), CacheError>;
}

fn is_expired(answer: &SavedAnswer, ttl: Option<Duration>) -> bool {
    match ttl {
        Some(ttl) => Utc::now().signed_duration_since(answer.saved_at) > ttl,
        None => false,
    }
}

type CacheKey = (String, String, u32);

/// 内存缓存
#[derive(Default)]
pub struct MemoryAnswerCache {
    entries: Mutex<HashMap<CacheKey, SavedAnswer>>,
    ttl: Option<Duration>,
}

impl MemoryAnswerCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

impl AnswerCache for MemoryAnswerCache {
    fn get(
        &self,
        exam_id: &str,
        question_id: &str,
        language_id: u32,
    ) -> Result<Option<SavedAnswer>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let key = (exam_id.to_string(), question_id.to_string(), language_id);
        Ok(entries
            .get(&key)
            .filter(|answer| !is_expired(answer, self.ttl))
            .cloned())
    }

    fn set(&self, answer: SavedAnswer) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let key = (
            answer.exam_id.clone(),
            answer.question_id.clone(),
            answer.language_id,
        );
        entries.insert(key, answer);
        Ok(())
    }
}

/// 文件缓存：每个键一个 JSON 文件
pub struct JsonFileCache {
    dir: PathBuf,
    ttl: Option<Duration>,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, exam_id: &str, question_id: &str, language_id: u32) -> PathBuf {
        self.dir.join(format!(
            "{}__{}__{}.json",
            sanitize(exam_id),
            sanitize(question_id),
            language_id
        ))
    }
}

/// 只保留安全的文件名字符
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl AnswerCache for JsonFileCache {
    fn get(
        &self,
        exam_id: &str,
        question_id: &str,
        language_id: u32,
    ) -> Result<Option<SavedAnswer>, CacheError> {
        let path = self.entry_path(exam_id, question_id, language_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|source| CacheError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let answer: SavedAnswer =
            serde_json::from_str(&content).map_err(|source| CacheError::Corrupted {
                path: path.display().to_string(),
                source,
            })?;

        if is_expired(&answer, self.ttl) {
            debug!("缓存已过期: {}", path.display());
            return Ok(None);
        }
        Ok(Some(answer))
    }

    fn set(&self, answer: SavedAnswer) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::WriteFailed {
            path: self.dir.display().to_string(),
            source,
        })?;

        let path = self.entry_path(&answer.exam_id, &answer.question_id, answer.language_id);
        let content = serde_json::to_string_pretty(&answer).map_err(|source| {
            CacheError::Corrupted {
                path: path.display().to_string(),
                source,
            }
        })?;
        fs::write(&path, content).map_err(|source| CacheError::WriteFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        std::env::temp_dir().join(format!("exam_guard_{}_{}_{}", tag, std::process::id(), nanos))
    }

    #[test]
    fn memory_cache_keys_include_language() {
        let cache = MemoryAnswerCache::new(None);
        cache.set(SavedAnswer::new("e1", "q1", 71, "print(1)")).unwrap();

        assert!(cache.get("e1", "q1", 71).unwrap().is_some());
        assert!(cache.get("e1", "q1", 54).unwrap().is_none());
        assert!(cache.get("e2", "q1", 71).unwrap().is_none());
    }

    #[test]
    fn expired_entries_read_as_empty() {
        let cache = MemoryAnswerCache::new(Some(Duration::minutes(10)));
        let mut stale = SavedAnswer::new("e1", "q1", 71, "old");
        stale.saved_at = Utc::now() - Duration::minutes(11);
        cache.set(stale).unwrap();
        assert!(cache.get("e1", "q1", 71).unwrap().is_none());

        cache.set(SavedAnswer::new("e1", "q1", 71, "new")).unwrap();
        assert_eq!(cache.get("e1", "q1", 71).unwrap().unwrap().code, "new");
    }

    #[test]
    fn file_cache_persists_between_instances() {
        let dir = temp_dir("file_cache");
        let writer = JsonFileCache::new(&dir, None);
        writer
            .set(SavedAnswer::new("exam/1", "q:1", 54, "int main() {}"))
            .unwrap();

        let reader = JsonFileCache::new(&dir, None);
        let answer = reader.get("exam/1", "q:1", 54).unwrap().unwrap();
        assert_eq!(answer.code, "int main() {}");
        assert!(reader.get("exam/1", "q:1", 71).unwrap().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupted_file_is_an_error() {
        let dir = temp_dir("corrupt");
        let cache = JsonFileCache::new(&dir, None);
        fs::create_dir_all(&dir).unwrap();
        fs::write(cache.entry_path("e", "q", 1), "{not json").unwrap();

        let err = cache.get("e", "q", 1).unwrap_err();
        assert!(matches!(err, CacheError::Corrupted { .. }));

        let _ = fs::remove_dir_all(&dir);
    }
}
