//! Engine-distribution download/cache for the `embedded` runtime (spec
//! §4.5: "downloads and caches a vendor distribution under
//! `~/.lucli/express/<version>/`"). [`lucli_runtime::embedded::EmbeddedBackend::prepare`]
//! requires the cache entry to already exist; [`Engine::start`](crate::Engine::start)
//! calls [`ensure_cached`] first.
//!
//! Grounded in [`lucli_deps::http_source`]'s `download`/`extract` pair (a
//! plain `ureq` GET followed by zip/tar extraction) and in
//! [`lucli_deps::maven_source`]'s configurable-base-URL-with-default-constant
//! pattern for the download origin.

use crate::CoreError;
use std::path::Path;

/// Default origin for Lucee Express distribution archives. Overridable via
/// an explicit `base_url_override` (the caller reads `LUCLI_EXPRESS_BASE_URL`
/// for air-gapped mirrors), mirroring `lucli_deps::maven_source::DEFAULT_REPOSITORY`'s
/// override mechanism.
pub const DEFAULT_EXPRESS_BASE_URL: &str = "https://download.lucee.org/express";

fn express_url(base: &str, engine_version: &str) -> String {
    format!("{base}/{engine_version}/lucee-express-{engine_version}.zip")
}

/// Ensure `express_cache_dir/<engine_version>/` exists, downloading and
/// extracting the vendor distribution archive if it does not. A no-op when
/// the cache entry is already present (spec §5: "Caches are read-only after
/// write; writes are temp-then-rename").
pub fn ensure_cached(
    express_cache_dir: &Path,
    engine_version: &str,
    base_url_override: Option<&str>,
) -> Result<(), CoreError> {
    let dest = express_cache_dir.join(engine_version);
    if dest.exists() {
        return Ok(());
    }

    let base = base_url_override.unwrap_or(DEFAULT_EXPRESS_BASE_URL);
    let url = express_url(base, engine_version);

    let archive = lucli_deps::http_source::download(&url)?;

    std::fs::create_dir_all(express_cache_dir)?;
    let staging = express_cache_dir.join(format!(".{engine_version}.staging"));
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    lucli_deps::http_source::extract(&url, &archive, &staging)?;

    // Publish by rename so a half-extracted archive never appears as a
    // valid cache hit to a concurrent reader.
    std::fs::rename(&staging, &dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn express_url_includes_version_twice() {
        let url = express_url(DEFAULT_EXPRESS_BASE_URL, "6.1.0.543");
        assert!(url.contains("6.1.0.543"));
        assert!(url.ends_with(".zip"));
    }

    #[test]
    fn ensure_cached_is_a_no_op_when_already_present() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("express");
        std::fs::create_dir_all(cache_dir.join("6.1")).unwrap();
        // No network access is reachable in this test environment; if this
        // were not a cache hit, `download` would fail and the test would
        // error instead of passing.
        ensure_cached(&cache_dir, "6.1", None).unwrap();
    }
}
