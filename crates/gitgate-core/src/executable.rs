//! Entry-point identification.

use std::path::{Path, PathBuf};

use crate::error::{GateError, GateResult};

/// Which entry point was invoked.
///
/// Selects the argument parser and the set of eligible commands. Fixed for
/// the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutableKind {
    /// The main shell dispatcher run by sshd as a forced command.
    Shell,
    /// `AuthorizedKeysCommand` helper.
    AuthorizedKeysCheck,
    /// `AuthorizedPrincipalsCommand` helper.
    AuthorizedPrincipalsCheck,
    /// Control-plane health check.
    Healthcheck,
}

impl ExecutableKind {
    /// The binary name installed for this entry point.
    #[must_use]
    pub fn binary_name(self) -> &'static str {
        match self {
            Self::Shell => "gitgate-shell",
            Self::AuthorizedKeysCheck => "gitgate-authorized-keys-check",
            Self::AuthorizedPrincipalsCheck => "gitgate-authorized-principals-check",
            Self::Healthcheck => "gitgate-check",
        }
    }
}

impl std::fmt::Display for ExecutableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// A resolved entry point: its kind plus the installation root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    /// Entry point kind.
    pub kind: ExecutableKind,
    /// Installation root (the parent of the directory holding the binary).
    pub root_dir: PathBuf,
}

impl Executable {
    /// Resolve the running binary's installation root.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the current executable path cannot be
    /// determined.
    pub fn new(kind: ExecutableKind) -> GateResult<Self> {
        let path = std::env::current_exe()
            .and_then(std::fs::canonicalize)
            .map_err(|e| GateError::Configuration(format!("failed to locate executable: {e}")))?;

        Ok(Self::with_root_dir(kind, root_dir_for(&path)))
    }

    /// Build an executable with an explicit root directory.
    #[must_use]
    pub fn with_root_dir(kind: ExecutableKind, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            root_dir: root_dir.into(),
        }
    }

    /// Path of the shell binary inside this installation.
    #[must_use]
    pub fn shell_path(&self) -> PathBuf {
        self.root_dir
            .join("bin")
            .join(ExecutableKind::Shell.binary_name())
    }
}

fn root_dir_for(binary: &Path) -> PathBuf {
    binary
        .parent()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("/"), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_dir_is_parent_of_bin() {
        let root = root_dir_for(Path::new("/opt/gitgate/bin/gitgate-shell"));
        assert_eq!(root, PathBuf::from("/opt/gitgate"));
    }

    #[test]
    fn test_shell_path() {
        let exe = Executable::with_root_dir(ExecutableKind::AuthorizedKeysCheck, "/srv/gate");
        assert_eq!(
            exe.shell_path(),
            PathBuf::from("/srv/gate/bin/gitgate-shell")
        );
    }
}
