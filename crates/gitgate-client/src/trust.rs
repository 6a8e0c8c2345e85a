//! Extra trust anchors for the TLS transport.
//!
//! The system roots are always trusted (reqwest loads the native store).
//! On top of that, a CA file and every regular file in a CA directory are
//! added on a best-effort basis: files that cannot be read or contain no
//! PEM certificate are skipped, never fatal.

use std::path::{Path, PathBuf};

use reqwest::Certificate;
use tracing::{debug, warn};

/// Certificates collected from the configured CA locations.
#[derive(Default)]
pub struct TrustStore {
    certificates: Vec<Certificate>,
    sources: Vec<PathBuf>,
    skipped: Vec<PathBuf>,
}

impl std::fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustStore")
            .field("certificates", &self.certificates.len())
            .field("sources", &self.sources)
            .field("skipped", &self.skipped)
            .finish()
    }
}

impl TrustStore {
    /// Load from an optional CA file and any number of CA directories.
    #[must_use]
    pub fn load(ca_file: Option<&Path>, ca_dirs: &[&Path]) -> Self {
        let mut store = Self::default();
        if let Some(file) = ca_file {
            store.add_file(file);
        }
        for dir in ca_dirs {
            store.add_dir(dir);
        }
        if !store.skipped.is_empty() {
            warn!(
                skipped = store.skipped.len(),
                "ignored unreadable or invalid CA certificate files"
            );
        }
        store
    }

    /// Add every non-directory entry of `dir`.
    pub fn add_dir(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "CA directory not readable");
                return;
            },
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| !t.is_dir()))
            .map(|entry| entry.path())
            .collect();
        paths.sort();

        for path in paths {
            self.add_file(&path);
        }
    }

    /// Add the certificates of a single PEM file.
    pub fn add_file(&mut self, path: &Path) {
        let parsed = std::fs::read(path)
            .ok()
            .and_then(|pem| Certificate::from_pem_bundle(&pem).ok())
            .filter(|certs| !certs.is_empty());

        match parsed {
            Some(certs) => {
                self.certificates.extend(certs);
                self.sources.push(path.to_path_buf());
            },
            None => self.skipped.push(path.to_path_buf()),
        }
    }

    /// Parsed certificates.
    #[must_use]
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// Files that contributed at least one certificate.
    #[must_use]
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Files that were skipped.
    #[must_use]
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    pub(crate) fn into_certificates(self) -> Vec<Certificate> {
        self.certificates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CA_PEM: &str = include_str!("../../gitgate-test/fixtures/ca.pem");

    #[test]
    fn test_dir_with_valid_and_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let valid = dir.path().join("a-valid.pem");
        std::fs::write(&valid, CA_PEM).unwrap();
        // A dangling symlink cannot be read, even by root.
        let unreadable = dir.path().join("b-unreadable.pem");
        std::os::unix::fs::symlink(dir.path().join("missing"), &unreadable).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let store = TrustStore::load(None, &[dir.path()]);

        assert_eq!(store.certificates().len(), 1);
        assert_eq!(store.sources(), &[valid]);
        assert_eq!(store.skipped(), &[unreadable]);
    }

    #[test]
    fn test_garbage_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("garbage.pem");
        std::fs::write(&garbage, "not a certificate").unwrap();

        let store = TrustStore::load(Some(&garbage), &[]);
        assert!(store.certificates().is_empty());
        assert_eq!(store.skipped(), &[garbage]);
    }

    #[test]
    fn test_missing_dir_is_ignored() {
        let store = TrustStore::load(None, &[Path::new("/nonexistent/gitgate/ca")]);
        assert!(store.certificates().is_empty());
        assert!(store.skipped().is_empty());
    }
}
