//! Confinement of caller-supplied paths to a single directory tree.

use std::io;
use std::path::{Component, Path, PathBuf};

pub const REASON_VALID: &str = "Valid path";
pub const REASON_INVALID: &str = "Invalid path";
pub const REASON_OUTSIDE: &str = "Path outside allowed directory";

/// Checked on the raw string, before any resolution happens.
const SYSTEM_PREFIXES: &[&str] = &[
    "/etc/", "/proc/", "/sys/", "/dev/", "/var/", "/usr/", "/bin/", "/sbin/",
];

/// Compared against the lowercased raw string.
const WINDOWS_PREFIXES: &[&str] = &["c:\\windows", "c:/windows", "\\windows", "/windows"];

// ---------------------------------------------------------------------------
// PathDecision
// ---------------------------------------------------------------------------

/// Outcome of a single [`PathGuard::validate`] call. Never cached: the
/// filesystem may change between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDecision {
    pub allowed: bool,
    pub reason: String,
    pub resolved_path: Option<PathBuf>,
}

impl PathDecision {
    fn allow(resolved: PathBuf) -> Self {
        Self {
            allowed: true,
            reason: REASON_VALID.to_string(),
            resolved_path: Some(resolved),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            resolved_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PathGuard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Guard rooted at `root`, which is canonicalized once here.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            root: std::fs::canonicalize(root.as_ref())?,
        })
    }

    /// Guard rooted at the process working directory.
    pub fn from_cwd() -> io::Result<Self> {
        Self::new(std::env::current_dir()?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn validate(&self, raw: &str) -> PathDecision {
        if raw.trim().is_empty() {
            return PathDecision::deny(REASON_INVALID);
        }

        // Home directory access is always denied, wherever it resolves.
        if raw.starts_with('~') {
            return PathDecision::deny(REASON_OUTSIDE);
        }

        if SYSTEM_PREFIXES.iter().any(|p| raw.starts_with(p)) {
            return PathDecision::deny(REASON_OUTSIDE);
        }

        let lowered = raw.to_lowercase();
        if WINDOWS_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
            return PathDecision::deny(REASON_OUTSIDE);
        }

        let resolved = match resolve(&self.root, Path::new(raw)) {
            Ok(p) => p,
            Err(e) => return PathDecision::deny(format!("Path validation error: {e}")),
        };

        if !resolved.starts_with(&self.root) {
            return PathDecision::deny(REASON_OUTSIDE);
        }

        PathDecision::allow(resolved)
    }
}

/// Resolve `path` against `base` the way a non-strict `realpath` would:
/// every existing prefix is canonicalized (following symlinks), the
/// non-existing remainder is normalized lexically.
pub fn resolve(base: &Path, path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                resolved.push(part);
                // A dangling symlink exists but cannot be canonicalized; that
                // surfaces as an error rather than a lexical guess.
                if std::fs::symlink_metadata(&resolved).is_ok() {
                    resolved = std::fs::canonicalize(&resolved)?;
                }
            }
        }
    }
    Ok(resolved)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn guard(dir: &TempDir) -> PathGuard {
        PathGuard::new(dir.path()).unwrap()
    }

    #[test]
    fn existing_paths_inside_root_are_allowed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        let g = guard(&dir);

        for raw in ["src", "src/main.rs", "./src/nested", "src/nested/../main.rs", "."] {
            let d = g.validate(raw);
            assert!(d.allowed, "{raw}: {}", d.reason);
            assert_eq!(d.reason, REASON_VALID);
            assert!(d.resolved_path.unwrap().starts_with(g.root()));
        }
    }

    #[test]
    fn absolute_path_inside_root_is_allowed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        let g = guard(&dir);
        let abs = g.root().join("pkg");
        let d = g.validate(abs.to_str().unwrap());
        assert!(d.allowed);
        assert_eq!(d.resolved_path.unwrap(), abs);
    }

    #[test]
    fn traversal_outside_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let g = guard(&dir);

        for raw in [
            "..",
            "../../../etc/passwd",
            "src/../../outside",
            "does-not-exist/../../..",
        ] {
            let d = g.validate(raw);
            assert!(!d.allowed, "{raw} should be rejected");
            assert_eq!(d.reason, REASON_OUTSIDE);
            assert!(d.resolved_path.is_none());
        }
    }

    #[test]
    fn system_and_home_paths_are_rejected_before_resolution() {
        let dir = TempDir::new().unwrap();
        let g = guard(&dir);
        for raw in [
            "~",
            "~/.ssh/id_rsa",
            "/etc/passwd",
            "/proc/self/environ",
            "/usr/bin/env",
            "C:\\Windows\\System32",
            "c:/windows/win.ini",
        ] {
            let d = g.validate(raw);
            assert!(!d.allowed, "{raw}");
            assert_eq!(d.reason, REASON_OUTSIDE);
        }
    }

    #[test]
    fn blank_input_is_invalid() {
        let dir = TempDir::new().unwrap();
        let g = guard(&dir);
        for raw in ["", "   ", "\t\n"] {
            assert_eq!(g.validate(raw).reason, REASON_INVALID);
        }
    }

    #[test]
    fn missing_paths_inside_root_resolve_lexically() {
        let dir = TempDir::new().unwrap();
        let g = guard(&dir);
        let d = g.validate("not/yet/here");
        assert!(d.allowed);
        assert_eq!(d.resolved_path.unwrap(), g.root().join("not/yet/here"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_root_is_rejected() {
        let outside = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();
        let g = guard(&dir);

        let d = g.validate("escape");
        assert!(!d.allowed);
        assert_eq!(d.reason, REASON_OUTSIDE);
        assert!(!g.validate("escape/anything").allowed);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_within_root_is_allowed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();
        let g = guard(&dir);
        let d = g.validate("alias");
        assert!(d.allowed);
        assert_eq!(d.resolved_path.unwrap(), g.root().join("real"));
    }
}
