use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkKey};

/// Durable `(video_id, start_time) -> Chunk` map backed by one JSON snapshot.
///
/// Every `put` rewrites the whole snapshot through a temp file and a rename,
/// and only then publishes the entry in memory, so after a successful `put`
/// memory and disk hold the same mapping. Writers are serialized; readers
/// never wait on disk I/O.
pub struct ChunkStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, Chunk>>,
    writer: Mutex<()>,
}

impl ChunkStore {
    /// Load the snapshot at `path`; a missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::Store(format!("corrupt snapshot {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), chunks = entries.len(), "chunk store loaded");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &ChunkKey) -> Option<Chunk> {
        self.read().get(&key.storage_key()).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Insert `chunk` and persist the whole mapping before returning.
    ///
    /// On error neither memory nor disk changes.
    pub async fn put(&self, key: &ChunkKey, chunk: Chunk) -> Result<()> {
        let _writer = self.writer.lock().await;

        let storage_key = key.storage_key();
        let mut next = self.read().clone();
        next.insert(storage_key.clone(), chunk);

        let bytes = serde_json::to_vec(&next)?;
        write_atomic(&self.path, &bytes).await?;

        *self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = next;
        debug!(key = %storage_key, bytes = bytes.len(), "chunk persisted");
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Chunk>> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Write `bytes` to a sibling temp file, sync it, then rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp_name = path
        .file_name()
        .ok_or_else(|| Error::Store(format!("snapshot path {} has no file name", path.display())))?
        .to_os_string();
    tmp_name.push(format!(".{}.tmp", std::process::id()));
    let tmp_path = path.with_file_name(tmp_name);

    let written = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(e) = written {
        tokio::fs::remove_file(&tmp_path).await.ok();
        return Err(Error::Store(format!(
            "failed to write snapshot {}: {e}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SentenceRecord, VideoId};
    use std::sync::Arc;

    fn key(id: &str, start: u64) -> ChunkKey {
        ChunkKey::new(VideoId::new(id).unwrap(), start)
    }

    fn chunk(text: &str) -> Chunk {
        Chunk(vec![SentenceRecord {
            original: text.into(),
            pronunciation: text.into(),
            translated: format!("[{text}]"),
        }])
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path().join("chunks.json")).await.unwrap();
        assert!(store.is_empty());
        assert!(store.get(&key("abc", 0)).is_none());
    }

    #[tokio::test]
    async fn test_put_is_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");

        let store = ChunkStore::open(&path).await.unwrap();
        store.put(&key("abc", 0), chunk("one")).await.unwrap();
        store.put(&key("abc", 30), chunk("two")).await.unwrap();
        assert_eq!(store.get(&key("abc", 0)), Some(chunk("one")));

        let reopened = ChunkStore::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get(&key("abc", 30)), Some(chunk("two")));
    }

    #[tokio::test]
    async fn test_snapshot_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        let store = ChunkStore::open(&path).await.unwrap();
        store.put(&key("abc123", 0), chunk("hello")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "abc123_0": [{"original": "hello", "pronunciation": "hello", "translated": "[hello]"}]
            })
        );
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path().join("chunks.json")).await.unwrap();
        store.put(&key("abc", 0), chunk("one")).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["chunks.json"]);
    }

    #[tokio::test]
    async fn test_concurrent_puts_keep_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        let store = Arc::new(ChunkStore::open(&path).await.unwrap());

        let handles: Vec<_> = (0..16u64)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.put(&key("vid", i), chunk(&i.to_string())).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let reopened = ChunkStore::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 16);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the snapshot file should be makes the rename fail.
        let path = dir.path().join("chunks.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("blocker"), b"x").unwrap();

        let store = ChunkStore {
            path: path.clone(),
            entries: RwLock::new(BTreeMap::new()),
            writer: Mutex::new(()),
        };
        let err = store.put(&key("abc", 0), chunk("one")).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(store.get(&key("abc", 0)).is_none());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(ChunkStore::open(&path).await, Err(Error::Store(_))));
    }
}
