use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Ceiling on cached file content before the whole cache is dropped
pub const CONTENT_CACHE_LIMIT_BYTES: usize = 100 * 1024 * 1024;

struct CachedContent {
    content: Arc<str>,
    mtime: Option<SystemTime>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<PathBuf, CachedContent>,
    bytes: usize,
}

/// File contents keyed by path and modification time
pub struct ContentCache {
    inner: Mutex<CacheInner>,
    limit_bytes: usize,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCache {
    pub fn new() -> Self {
        Self::with_limit(CONTENT_CACHE_LIMIT_BYTES)
    }

    pub fn with_limit(limit_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            limit_bytes,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().expect("content cache mutex poisoned")
    }

    /// Read a file, reusing the cached content when its mtime is unchanged
    pub async fn read(&self, path: &Path) -> std::io::Result<(Arc<str>, Option<SystemTime>)> {
        let mtime = tokio::fs::metadata(path).await?.modified().ok();
        if let Some(mtime) = mtime {
            let inner = self.lock();
            if let Some(cached) = inner.entries.get(path) {
                if cached.mtime == Some(mtime) {
                    return Ok((cached.content.clone(), cached.mtime));
                }
            }
        }

        let content: Arc<str> = tokio::fs::read_to_string(path).await?.into();
        self.insert(path, content.clone(), mtime);
        Ok((content, mtime))
    }

    fn insert(&self, path: &Path, content: Arc<str>, mtime: Option<SystemTime>) {
        let mut inner = self.lock();
        let added = content.len();
        if let Some(old) = inner.entries.insert(path.to_path_buf(), CachedContent { content, mtime }) {
            inner.bytes = inner.bytes.saturating_sub(old.content.len());
        }
        inner.bytes += added;
        if inner.bytes > self.limit_bytes {
            log::debug!(
                "Content cache over limit ({} > {} bytes), clearing",
                inner.bytes,
                self.limit_bytes
            );
            inner.entries.clear();
            inner.bytes = 0;
        }
    }

    pub fn invalidate(&self, path: &Path) {
        let mut inner = self.lock();
        if let Some(old) = inner.entries.remove(path) {
            inner.bytes = inner.bytes.saturating_sub(old.content.len());
        }
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> usize {
        self.lock().bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reuses_content_until_invalidated() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a.ts");
        std::fs::write(&path, "export const a = 1;").unwrap();

        let cache = ContentCache::new();
        let (first, _) = cache.read(&path).await.unwrap();
        let (second, _) = cache.read(&path).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.bytes(), first.len());

        cache.invalidate(&path);
        assert!(cache.is_empty());
        assert_eq!(cache.bytes(), 0);
    }

    #[tokio::test]
    async fn clears_everything_over_the_ceiling() {
        let temp = tempdir().unwrap();
        let small = temp.path().join("small.ts");
        let large = temp.path().join("large.ts");
        std::fs::write(&small, "x").unwrap();
        std::fs::write(&large, "y".repeat(64)).unwrap();

        let cache = ContentCache::with_limit(32);
        cache.read(&small).await.unwrap();
        assert_eq!(cache.len(), 1);
        cache.read(&large).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let cache = ContentCache::new();
        assert!(cache.read(Path::new("/definitely/not/here.ts")).await.is_err());
    }
}
