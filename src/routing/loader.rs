//! Route definitions loading from disk.

use std::fs;
use std::path::Path;

use super::cache::modified_nanos;
use super::definition::RouteSource;
use super::error::RouterError;

/// A parsed route source together with the file's mtime (nanoseconds since
/// epoch) as observed before the file was read.
#[derive(Debug, Clone)]
pub struct StampedSource {
    pub source: RouteSource,
    pub modified: u64,
}

/// Load a route source, stamping it with the mtime taken before reading.
///
/// An edit that lands while the file is being read leaves the stamp older
/// than the file, so a cache compiled from this source is stale at once.
pub fn load_stamped(path: &Path) -> Result<StampedSource, RouterError> {
    let modified = modified_nanos(path).map_err(|source| RouterError::SourceIo {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(StampedSource {
        source: load_source(path)?,
        modified,
    })
}

/// Load a route source file. `.json` files are parsed as JSON, anything
/// else as TOML.
pub fn load_source(path: &Path) -> Result<RouteSource, RouterError> {
    let content = fs::read_to_string(path).map_err(|source| RouterError::SourceIo {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let parsed: Result<RouteSource, String> = if is_json {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    } else {
        toml::from_str(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| RouterError::SourceParse {
        path: path.to_path_buf(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::definition::RouteEntry;

    #[test]
    fn test_load_json_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        fs::write(
            &path,
            r#"{
                "routes": [
                    {"uri": "/", "handler": "Home", "action": "index"},
                    {"type": "group", "prefix": "/api", "routes": [
                        {"uri": "/stocks/:symbol", "handler": "Stock", "action": "show", "where": {"symbol": "alpha"}}
                    ]}
                ],
                "fallbacks": {"404": {"handler": "Errors", "action": "not_found"}}
            }"#,
        )
        .unwrap();

        let source = load_source(&path).unwrap();
        assert_eq!(source.routes.len(), 2);
        assert!(matches!(source.routes[1], RouteEntry::Group(_)));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.toml");
        fs::write(&path, "[[routes]]\nuri = 42\n").unwrap();

        let err = load_source(&path).unwrap_err();
        assert!(matches!(err, RouterError::SourceParse { .. }));
        assert!(err.to_string().contains("routes.toml"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_source(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, RouterError::SourceIo { .. }));

        let err = load_stamped(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, RouterError::SourceIo { .. }));
    }

    #[test]
    fn test_stamp_is_the_mtime_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.toml");
        fs::write(&path, "[[routes]]\nuri = \"/\"\nhandler = \"Home\"\naction = \"index\"\n").unwrap();

        let stamped = load_stamped(&path).unwrap();
        assert_eq!(stamped.modified, modified_nanos(&path).unwrap());
        assert_eq!(stamped.source.routes.len(), 1);
    }
}
