//! Bundle and props-script caches.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use lru::LruCache;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::bundle::bundler::{BundleError, BundleOptions, Bundler};
use crate::bundle::short_hash;
use crate::observability::metrics;

/// A built client bundle.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Content hash of the component source.
    pub hash: String,
    /// Canonical path of the component source.
    pub path: PathBuf,
    pub code: Arc<str>,
}

/// Process-wide cache of client bundles keyed by content hash.
///
/// With caching enabled, concurrent requests for the same hash share one
/// build. A failed build leaves no entry, so the next request retries.
/// With caching disabled, every call rebuilds but the latest output is
/// still kept so the bundle endpoint can serve it.
pub struct BundleCache {
    bundler: Arc<dyn Bundler>,
    options: BundleOptions,
    enabled: bool,
    builds: DashMap<String, Arc<OnceCell<Bundle>>>,
    by_path: DashMap<PathBuf, HashSet<String>>,
}

impl BundleCache {
    pub fn new(bundler: Arc<dyn Bundler>, options: BundleOptions, enabled: bool) -> Self {
        Self {
            bundler,
            options,
            enabled,
            builds: DashMap::new(),
            by_path: DashMap::new(),
        }
    }

    pub fn options(&self) -> BundleOptions {
        self.options
    }

    /// Bundle for the component at `path`, building it if needed.
    pub async fn get_or_build(&self, path: &Path) -> Result<Bundle, BundleError> {
        let absolute = tokio::fs::canonicalize(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BundleError::NotFound(path.to_path_buf()),
            _ => BundleError::Io(e),
        })?;
        let contents = tokio::fs::read(&absolute).await?;
        let hash = short_hash([absolute.to_string_lossy().as_bytes(), contents.as_slice()]);

        self.by_path.entry(absolute.clone()).or_default().insert(hash.clone());

        if !self.enabled {
            let bundle = self.build(&absolute, &hash).await?;
            self.builds
                .insert(hash, Arc::new(OnceCell::new_with(Some(bundle.clone()))));
            return Ok(bundle);
        }

        let cell = Arc::clone(&*self.builds.entry(hash.clone()).or_default());
        let bundle = cell.get_or_try_init(|| self.build(&absolute, &hash)).await?;
        Ok(bundle.clone())
    }

    async fn build(&self, path: &Path, hash: &str) -> Result<Bundle, BundleError> {
        let started = std::time::Instant::now();
        match self.bundler.bundle(path, &self.options).await {
            Ok(code) => {
                metrics::record_bundle_build("success");
                tracing::info!(
                    hash = %hash,
                    path = %path.display(),
                    bytes = code.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Built client bundle"
                );
                Ok(Bundle {
                    hash: hash.to_string(),
                    path: path.to_path_buf(),
                    code: code.into(),
                })
            }
            Err(e) => {
                metrics::record_bundle_build("failure");
                Err(e)
            }
        }
    }

    /// Previously built bundle by hash.
    pub fn get(&self, hash: &str) -> Option<Bundle> {
        self.builds.get(hash).and_then(|cell| cell.get().cloned())
    }

    /// Drop every bundle built from `path`. Returns how many were dropped.
    pub fn invalidate(&self, path: &Path) -> usize {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let Some((_, hashes)) = self.by_path.remove(&key) else {
            return 0;
        };
        let removed = hashes.iter().filter(|hash| self.builds.remove(*hash).is_some()).count();
        tracing::debug!(path = %key.display(), removed, "Invalidated client bundles");
        removed
    }

    pub fn clear(&self) {
        self.builds.clear();
        self.by_path.clear();
    }

    pub fn len(&self) -> usize {
        self.builds.iter().filter(|entry| entry.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for BundleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleCache")
            .field("options", &self.options)
            .field("enabled", &self.enabled)
            .field("entries", &self.builds.len())
            .finish_non_exhaustive()
    }
}

/// Bounded cache of initial-props scripts keyed by script hash.
#[derive(Debug)]
pub struct PropsCache {
    scripts: Mutex<LruCache<String, Arc<str>>>,
}

impl PropsCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            scripts: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn scripts(&self) -> MutexGuard<'_, LruCache<String, Arc<str>>> {
        self.scripts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the script exposing `props` and `root_id`; returns its hash.
    pub fn insert(&self, props: &Value, root_id: &str) -> Result<String, serde_json::Error> {
        let script = props_script(props, root_id)?;
        let hash = short_hash([script.as_bytes()]);
        self.scripts().put(hash.clone(), script.into());
        Ok(hash)
    }

    pub fn get(&self, hash: &str) -> Option<Arc<str>> {
        self.scripts().get(hash).cloned()
    }

    pub fn clear(&self) {
        self.scripts().clear();
    }

    pub fn len(&self) -> usize {
        self.scripts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Script defining the globals read by the hydration entry.
pub fn props_script(props: &Value, root_id: &str) -> Result<String, serde_json::Error> {
    let props = match props {
        Value::Null => "{}".to_string(),
        other => serde_json::to_string(other)?,
    };
    Ok(format!(
        "window.__INITIAL_PROPS__ = {props};\nwindow.__ROOT_ID__ = {};\n",
        serde_json::to_string(root_id)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingBundler {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Bundler for CountingBundler {
        fn bundle<'a>(
            &'a self,
            entry: &'a Path,
            _options: &'a BundleOptions,
        ) -> BoxFuture<'a, Result<String, BundleError>> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                if self.fail {
                    return Err(BundleError::Build("syntax error".into()));
                }
                Ok(format!("// {}", entry.display()))
            }
            .boxed()
        }
    }

    fn component(dir: &tempfile::TempDir, source: &str) -> PathBuf {
        let path = dir.path().join("Counter.tsx");
        std::fs::write(&path, source).unwrap();
        path
    }

    #[tokio::test]
    async fn test_concurrent_builds_share_one_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = component(&dir, "export default 1");
        let bundler = Arc::new(CountingBundler::default());
        let cache = BundleCache::new(bundler.clone(), BundleOptions::default(), true);

        let (a, b) = tokio::join!(cache.get_or_build(&path), cache.get_or_build(&path));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 16);
        assert_eq!(bundler.calls.load(Ordering::SeqCst), 1);
        assert!(cache.get(&a.hash).is_some());
    }

    #[tokio::test]
    async fn test_content_change_yields_new_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = component(&dir, "export default 1");
        let cache = BundleCache::new(Arc::new(CountingBundler::default()), BundleOptions::default(), true);

        let first = cache.get_or_build(&path).await.unwrap();
        std::fs::write(&path, "export default 2").unwrap();
        let second = cache.get_or_build(&path).await.unwrap();

        assert_ne!(first.hash, second.hash);
        assert_eq!(cache.invalidate(&path), 2);
        assert!(cache.get(&first.hash).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failed_build_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = component(&dir, "export default");
        let bundler = Arc::new(CountingBundler {
            fail: true,
            ..Default::default()
        });
        let cache = BundleCache::new(bundler.clone(), BundleOptions::default(), true);

        assert!(cache.get_or_build(&path).await.is_err());
        assert!(cache.get_or_build(&path).await.is_err());
        assert_eq!(bundler.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_cache_rebuilds_but_serves_latest() {
        let dir = tempfile::tempdir().unwrap();
        let path = component(&dir, "export default 1");
        let bundler = Arc::new(CountingBundler::default());
        let cache = BundleCache::new(bundler.clone(), BundleOptions::default(), false);

        let bundle = cache.get_or_build(&path).await.unwrap();
        cache.get_or_build(&path).await.unwrap();

        assert_eq!(bundler.calls.load(Ordering::SeqCst), 2);
        assert!(cache.get(&bundle.hash).is_some());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let cache = BundleCache::new(Arc::new(CountingBundler::default()), BundleOptions::default(), true);
        let err = cache.get_or_build(Path::new("/no/such/Component.tsx")).await.unwrap_err();
        assert!(matches!(err, BundleError::NotFound(_)));
    }

    #[test]
    fn test_props_script() {
        let script = props_script(&json!({"count": 1}), "app").unwrap();
        assert_eq!(
            script,
            "window.__INITIAL_PROPS__ = {\"count\":1};\nwindow.__ROOT_ID__ = \"app\";\n"
        );
        assert!(props_script(&Value::Null, "root").unwrap().contains("= {};"));
    }

    #[test]
    fn test_props_cache_is_bounded() {
        let cache = PropsCache::new(2);
        let first = cache.insert(&json!({"n": 1}), "root").unwrap();
        let again = cache.insert(&json!({"n": 1}), "root").unwrap();
        assert_eq!(first, again);

        cache.insert(&json!({"n": 2}), "root").unwrap();
        cache.insert(&json!({"n": 3}), "root").unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&first).is_none());
    }
}
