//! Single-slot sandbox: one disjoint copy of production state per trial.
//!
//! A workspace is a private mirror of production storage plus a copy of the
//! production domain text, rooted in a tempdir. It never shares storage with
//! production; the trial mutates the mirror freely and the whole workspace
//! vanishes on destroy. The manager enforces the one-live-workspace
//! invariant with a fail-fast slot, so trials can never nest or overlap.

use crate::skills::path::{resolve_under, PathEscape};
use std::cell::Cell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Errors that can occur managing sandbox workspaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxError {
    /// The specific error that occurred
    pub kind: SandboxErrorKind,
}

/// Specific sandbox error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxErrorKind {
    /// A workspace is already live; only one may exist at a time
    Busy,
    /// A requested path would leave the sandbox jail
    PathEscape {
        /// The offending component
        component: String,
    },
    /// A filesystem operation failed
    Io {
        /// What was being done
        context: String,
        /// The underlying failure
        reason: String,
    },
}

impl SandboxError {
    /// Creates a busy error.
    #[must_use]
    pub fn busy() -> Self {
        Self {
            kind: SandboxErrorKind::Busy,
        }
    }

    /// Creates an I/O error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: SandboxErrorKind::Io {
                context: context.into(),
                reason: reason.into(),
            },
        }
    }

    /// Returns true if the single slot was already taken.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self.kind, SandboxErrorKind::Busy)
    }
}

impl From<PathEscape> for SandboxError {
    fn from(e: PathEscape) -> Self {
        Self {
            kind: SandboxErrorKind::PathEscape {
                component: e.component,
            },
        }
    }
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SandboxErrorKind::Busy => write!(
                f,
                "a sandbox workspace is already live; destroy it before creating another"
            ),
            SandboxErrorKind::PathEscape { component } => write!(
                f,
                "path component '{component}' would escape the sandbox jail"
            ),
            SandboxErrorKind::Io { context, reason } => {
                write!(f, "sandbox I/O failure while {context}: {reason}")
            }
        }
    }
}

impl std::error::Error for SandboxError {}

/// Hands out at most one live [`SandboxWorkspace`] at a time.
pub struct SandboxManager {
    production_storage: PathBuf,
    production_domain: PathBuf,
    slot: Rc<Cell<bool>>,
}

impl SandboxManager {
    /// Creates a manager over the production storage root and domain file.
    #[must_use]
    pub fn new(
        production_storage: impl Into<PathBuf>,
        production_domain: impl Into<PathBuf>,
    ) -> Self {
        Self {
            production_storage: production_storage.into(),
            production_domain: production_domain.into(),
            slot: Rc::new(Cell::new(false)),
        }
    }

    /// Creates a fresh workspace mirroring production.
    ///
    /// # Errors
    ///
    /// Fails fast with a busy error if a workspace is already live, or with
    /// an I/O error if mirroring fails.
    pub fn create(&self) -> Result<SandboxWorkspace, SandboxError> {
        if self.slot.get() {
            tracing::warn!("Sandbox slot already taken, refusing second workspace");
            return Err(SandboxError::busy());
        }

        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        let dir = tempfile::Builder::new()
            .prefix(&format!("evoplan-sandbox-{stamp}-"))
            .tempdir()
            .map_err(|e| SandboxError::io("creating workspace directory", e.to_string()))?;

        let storage_root = dir.path().join("storage");
        mirror_tree(&self.production_storage, &storage_root)?;

        let domain_path = dir.path().join("domain.pddl");
        fs::copy(&self.production_domain, &domain_path)
            .map_err(|e| SandboxError::io("copying domain text", e.to_string()))?;

        self.slot.set(true);
        tracing::info!(workspace = %dir.path().display(), "Sandbox workspace created");
        Ok(SandboxWorkspace {
            dir: Some(dir),
            storage_root,
            domain_path,
            slot: Rc::clone(&self.slot),
        })
    }

    /// Re-mirrors a workspace's storage jail from production, discarding
    /// whatever the previous attempt left behind.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the jail cannot be rebuilt.
    pub fn reset_storage(&self, workspace: &SandboxWorkspace) -> Result<(), SandboxError> {
        if workspace.storage_root.exists() {
            fs::remove_dir_all(&workspace.storage_root)
                .map_err(|e| SandboxError::io("clearing storage jail", e.to_string()))?;
        }
        mirror_tree(&self.production_storage, &workspace.storage_root)
    }
}

/// One live sandbox trial environment.
///
/// Dropping the workspace removes it and frees the slot, so the single-slot
/// invariant survives early returns out of a trial.
#[derive(Debug)]
pub struct SandboxWorkspace {
    dir: Option<TempDir>,
    storage_root: PathBuf,
    domain_path: PathBuf,
    slot: Rc<Cell<bool>>,
}

impl SandboxWorkspace {
    /// Returns the storage jail root.
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Returns the path of the workspace's domain copy.
    #[must_use]
    pub fn domain_path(&self) -> &Path {
        &self.domain_path
    }

    /// Reads the workspace's domain text.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the copy cannot be read.
    pub fn domain_text(&self) -> Result<String, SandboxError> {
        fs::read_to_string(&self.domain_path)
            .map_err(|e| SandboxError::io("reading sandbox domain", e.to_string()))
    }

    /// Replaces the workspace's domain text.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the copy cannot be written.
    pub fn write_domain(&self, text: &str) -> Result<(), SandboxError> {
        fs::write(&self.domain_path, text)
            .map_err(|e| SandboxError::io("writing sandbox domain", e.to_string()))
    }

    /// Resolves symbol components strictly under the storage jail.
    ///
    /// # Errors
    ///
    /// Returns a path-escape error for any traversal attempt.
    pub fn resolve(&self, parts: &[&str]) -> Result<PathBuf, SandboxError> {
        Ok(resolve_under(&self.storage_root, parts)?)
    }

    /// Removes the workspace and frees the slot. Idempotent.
    pub fn destroy(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().display().to_string();
            if let Err(e) = dir.close() {
                tracing::warn!(workspace = %path, error = %e, "Workspace removal incomplete");
            } else {
                tracing::info!(workspace = %path, "Sandbox workspace destroyed");
            }
            self.slot.set(false);
        }
    }
}

impl Drop for SandboxWorkspace {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Recursively copies `src` into a fresh `dst`.
fn mirror_tree(src: &Path, dst: &Path) -> Result<(), SandboxError> {
    fs::create_dir_all(dst)
        .map_err(|e| SandboxError::io("creating storage jail", e.to_string()))?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry =
            entry.map_err(|e| SandboxError::io("walking production storage", e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| SandboxError::io("relativizing storage path", e.to_string()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| SandboxError::io("mirroring directory", e.to_string()))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)
                .map_err(|e| SandboxError::io("mirroring file", e.to_string()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Production {
        _dir: TempDir,
        storage: PathBuf,
        domain: PathBuf,
    }

    fn production() -> Production {
        let dir = TempDir::new().unwrap();
        let storage = dir.path().join("storage");
        fs::create_dir_all(storage.join("root")).unwrap();
        fs::create_dir_all(storage.join("backup")).unwrap();
        fs::write(storage.join("root/file1"), b"data").unwrap();

        let domain = dir.path().join("domain.pddl");
        fs::write(&domain, "(define (domain filestate))").unwrap();

        Production {
            _dir: dir,
            storage,
            domain,
        }
    }

    #[test]
    fn workspace_mirrors_production_storage() {
        let production = production();
        let manager = SandboxManager::new(&production.storage, &production.domain);

        let workspace = manager.create().unwrap();

        assert!(workspace.storage_root().join("root/file1").is_file());
        assert!(workspace.storage_root().join("backup").is_dir());
        assert_eq!(
            workspace.domain_text().unwrap(),
            "(define (domain filestate))"
        );
    }

    #[test]
    fn second_create_fails_busy_while_first_is_live() {
        let production = production();
        let manager = SandboxManager::new(&production.storage, &production.domain);

        let _workspace = manager.create().unwrap();
        let second = manager.create();

        assert!(second.unwrap_err().is_busy());
    }

    #[test]
    fn destroy_frees_the_slot() {
        let production = production();
        let manager = SandboxManager::new(&production.storage, &production.domain);

        let mut workspace = manager.create().unwrap();
        workspace.destroy();

        assert!(manager.create().is_ok());
    }

    #[test]
    fn destroy_is_idempotent() {
        let production = production();
        let manager = SandboxManager::new(&production.storage, &production.domain);

        let mut workspace = manager.create().unwrap();
        workspace.destroy();
        workspace.destroy();

        assert!(manager.create().is_ok());
    }

    #[test]
    fn drop_frees_the_slot() {
        let production = production();
        let manager = SandboxManager::new(&production.storage, &production.domain);

        {
            let _workspace = manager.create().unwrap();
        }

        assert!(manager.create().is_ok());
    }

    #[test]
    fn trial_mutations_never_reach_production() {
        let production = production();
        let manager = SandboxManager::new(&production.storage, &production.domain);

        let mut workspace = manager.create().unwrap();
        fs::write(workspace.storage_root().join("root/planted"), b"x").unwrap();
        fs::remove_file(workspace.storage_root().join("root/file1")).unwrap();
        workspace.write_domain("(define (domain mutated))").unwrap();
        workspace.destroy();

        assert!(production.storage.join("root/file1").is_file());
        assert!(!production.storage.join("root/planted").exists());
        assert_eq!(
            fs::read_to_string(&production.domain).unwrap(),
            "(define (domain filestate))"
        );
    }

    #[test]
    fn reset_storage_discards_trial_residue() {
        let production = production();
        let manager = SandboxManager::new(&production.storage, &production.domain);

        let workspace = manager.create().unwrap();
        fs::write(workspace.storage_root().join("root/residue"), b"x").unwrap();
        fs::remove_file(workspace.storage_root().join("root/file1")).unwrap();

        manager.reset_storage(&workspace).unwrap();

        assert!(workspace.storage_root().join("root/file1").is_file());
        assert!(!workspace.storage_root().join("root/residue").exists());
    }

    #[test]
    fn resolve_rejects_escape_from_jail() {
        let production = production();
        let manager = SandboxManager::new(&production.storage, &production.domain);

        let workspace = manager.create().unwrap();
        let result = workspace.resolve(&["..", "outside"]);

        assert!(matches!(
            result.unwrap_err().kind,
            SandboxErrorKind::PathEscape { .. }
        ));
    }
}
