//! Route cache compilation and persistence.
//!
//! # Responsibilities
//! - Snapshot a flat table plus source metadata into one artifact file
//! - Load artifacts back, treating anything malformed as absent
//! - Decide validity against the live source file's modification time
//!
//! # Design Decisions
//! - JSON artifact written to a temp file and renamed into place, so a
//!   concurrent reader sees the old artifact or the new one, never a torn one
//! - Timestamps stored as nanoseconds since the Unix epoch
//! - The source mtime is supplied by the caller, taken before the source
//!   was read, never re-read at write time
//! - Temp files carry a per-write UUID so concurrent writers never share one
//! - Never deletes or rewrites a cache on its own; `clear` is explicit

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use super::error::CacheError;
use super::table::RouteTable;

/// Bumped whenever the artifact layout changes; older artifacts are ignored.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// On-disk snapshot of a compiled route table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteCacheArtifact {
    pub version: u32,
    /// Build time, nanoseconds since epoch.
    pub generated_at: u64,
    /// Source mtime at build time, nanoseconds since epoch.
    pub source_last_modified: u64,
    pub source_path: PathBuf,
    pub table: RouteTable,
}

impl RouteCacheArtifact {
    /// Snapshot `table`, tagging it with `source_last_modified`: the mtime of
    /// `source_path` observed before the table's source was read.
    pub fn new(table: RouteTable, source_path: &Path, source_last_modified: u64) -> Result<Self, CacheError> {
        if let Some(pattern) = table.inline_middleware_route() {
            return Err(CacheError::Uncacheable(pattern.to_string()));
        }
        Ok(Self {
            version: CACHE_FORMAT_VERSION,
            generated_at: to_nanos(SystemTime::now()),
            source_last_modified,
            source_path: source_path.to_path_buf(),
            table,
        })
    }

    /// Valid while the source still exists and has not been modified after
    /// the recorded mtime.
    pub fn is_valid(&self, source_path: &Path) -> bool {
        if self.version != CACHE_FORMAT_VERSION || self.source_path != source_path {
            return false;
        }
        match modified_nanos(source_path) {
            Ok(current) => self.source_last_modified >= current,
            Err(_) => false,
        }
    }
}

/// Handle on the cache artifact location.
#[derive(Debug, Clone)]
pub struct RouteCache {
    path: PathBuf,
}

impl RouteCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `table` into artifact bytes.
    pub fn compile(table: &RouteTable, source_path: &Path, source_modified: u64) -> Result<Vec<u8>, CacheError> {
        let artifact = RouteCacheArtifact::new(table.clone(), source_path, source_modified)?;
        Ok(serde_json::to_vec_pretty(&artifact)?)
    }

    /// Compile and atomically write the artifact, creating the directory if needed.
    pub fn write(&self, table: &RouteTable, source_path: &Path, source_modified: u64) -> Result<(), CacheError> {
        let bytes = Self::compile(table, source_path, source_modified)?;

        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "routes".to_string());
        let tmp = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result?;

        tracing::info!(
            path = ?self.path,
            routes = table.len(),
            bytes = bytes.len(),
            "Route cache written"
        );
        Ok(())
    }

    /// Read the artifact. Missing, unreadable or malformed artifacts are `None`.
    pub fn load(&self) -> Option<RouteCacheArtifact> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Route cache unreadable");
                return None;
            }
        };

        match serde_json::from_slice::<RouteCacheArtifact>(&bytes) {
            Ok(artifact) if artifact.version == CACHE_FORMAT_VERSION => Some(artifact),
            Ok(artifact) => {
                tracing::warn!(
                    path = ?self.path,
                    version = artifact.version,
                    expected = CACHE_FORMAT_VERSION,
                    "Route cache has an unsupported format version"
                );
                None
            }
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Route cache malformed");
                None
            }
        }
    }

    /// Load the table only if the artifact is valid for `source_path`.
    pub fn load_valid(&self, source_path: &Path) -> Option<RouteTable> {
        let artifact = self.load()?;
        if artifact.is_valid(source_path) {
            Some(artifact.table)
        } else {
            tracing::info!(path = ?self.path, source = ?source_path, "Route cache stale");
            None
        }
    }

    /// Remove the artifact. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool, CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = ?self.path, "Route cache cleared");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Modification time of `path` in nanoseconds since epoch.
pub fn modified_nanos(path: &Path) -> std::io::Result<u64> {
    Ok(to_nanos(fs::metadata(path)?.modified()?))
}

fn to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::builder::build;
    use crate::routing::definition::RouteDefinitions;

    fn sample_table() -> RouteTable {
        let mut defs = RouteDefinitions::new();
        defs.get("/", "Home", "index").name("home");
        defs.get("/predictions/:id", "Prediction", "show").constrain("id", "int");
        build(&defs.into_source()).unwrap()
    }

    #[test]
    fn test_write_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("routes.toml");
        fs::write(&source, "").unwrap();

        let cache = RouteCache::new(dir.path().join("nested/cache/routes.json"));
        cache.write(&sample_table(), &source, modified_nanos(&source).unwrap()).unwrap();

        let artifact = cache.load().unwrap();
        assert_eq!(artifact.table.len(), 2);
        assert_eq!(artifact.source_path, source);
        assert!(artifact.generated_at > 0);
    }

    #[test]
    fn test_validity_follows_source_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("routes.toml");
        fs::write(&source, "").unwrap();
        let current = modified_nanos(&source).unwrap();

        let mut artifact = RouteCacheArtifact::new(sample_table(), &source, modified_nanos(&source).unwrap()).unwrap();
        artifact.source_last_modified = current;
        assert!(artifact.is_valid(&source));

        artifact.source_last_modified = current + 1_000;
        assert!(artifact.is_valid(&source));

        artifact.source_last_modified = current - 1;
        assert!(!artifact.is_valid(&source));
    }

    #[test]
    fn test_missing_source_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("routes.toml");
        fs::write(&source, "").unwrap();
        let artifact = RouteCacheArtifact::new(sample_table(), &source, modified_nanos(&source).unwrap()).unwrap();

        fs::remove_file(&source).unwrap();
        assert!(!artifact.is_valid(&source));
    }

    #[test]
    fn test_malformed_artifact_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");

        fs::write(&path, r#"{"version": 1, "generated_at": 1}"#).unwrap();
        assert!(RouteCache::new(&path).load().is_none());

        fs::write(&path, "not json").unwrap();
        assert!(RouteCache::new(&path).load().is_none());

        assert!(RouteCache::new(dir.path().join("absent.json")).load().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("routes.toml");
        fs::write(&source, "").unwrap();
        let cache = RouteCache::new(dir.path().join("routes.json"));
        cache.write(&sample_table(), &source, modified_nanos(&source).unwrap()).unwrap();

        assert!(cache.clear().unwrap());
        assert!(!cache.clear().unwrap());
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_inline_middleware_is_uncacheable() {
        use crate::middleware::{Flow, FnMiddleware};

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("routes.toml");
        fs::write(&source, "").unwrap();

        let mut defs = RouteDefinitions::new();
        defs.get("/vote", "Vote", "store")
            .middleware(crate::routing::MiddlewareRef::inline(FnMiddleware::new(|_req| Flow::Continue)));
        let table = build(&defs.into_source()).unwrap();

        let err = RouteCache::compile(&table, &source, 0).unwrap_err();
        assert!(matches!(err, CacheError::Uncacheable(p) if p == "/vote"));
    }

    #[test]
    fn test_concurrent_writers_each_land_whole_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("routes.toml");
        fs::write(&source, "").unwrap();
        let modified = modified_nanos(&source).unwrap();
        let cache = RouteCache::new(dir.path().join("routes.json"));
        let table = sample_table();

        std::thread::scope(|scope| {
            let writers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| (0..20).try_for_each(|_| cache.write(&table, &source, modified))))
                .collect();
            for writer in writers {
                writer.join().unwrap().unwrap();
            }
        });

        assert_eq!(cache.load_valid(&source).unwrap().len(), 2);
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
