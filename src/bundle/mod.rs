//! Client bundling for SPA pages.
//!
//! # Data Flow
//! ```text
//! PageRenderer (spa)
//!     → registry.rs (component name → source file)
//!     → cache.rs BundleCache (content hash, single-flight build)
//!         → bundler.rs Bundler (external build tool)
//!     → cache.rs PropsCache (initial props script)
//!     → http::assets serves /__bundles/{hash}.js and /__props/{hash}.js
//! watcher.rs: file change → BundleCache::invalidate (development only)
//! ```
//!
//! # Design Decisions
//! - Source locations come from explicit registration or a startup scan
//! - Caches are owned by the server and cleared on shutdown
//! - At most one build per content hash is in flight

pub mod bundler;
pub mod cache;
pub mod registry;
pub mod watcher;

use sha2::{Digest, Sha256};

pub use bundler::{BundleError, BundleOptions, Bundler, CommandBundler};
pub use cache::{Bundle, BundleCache, PropsCache};
pub use registry::ComponentRegistry;
pub use watcher::ComponentWatcher;

/// URL prefix of the bundle endpoint.
pub const BUNDLE_PREFIX: &str = "/__bundles";

/// URL prefix of the props script endpoint.
pub const PROPS_PREFIX: &str = "/__props";

/// First 16 hex characters of the SHA-256 of the given parts.
pub fn short_hash<I, T>(parts: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref());
    }
    let mut hash = format!("{:x}", hasher.finalize());
    hash.truncate(16);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash() {
        let hash = short_hash(["abc"]);
        assert_eq!(hash, "ba7816bf8f01cfea");
        assert_eq!(short_hash(["a", "bc"]), hash);
    }
}
