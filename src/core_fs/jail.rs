use crate::core_fs::error::FsError;
use log::{debug, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Whether the resolved target has to exist already.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    /// The target must exist (RETR, CWD, DELE, ...).
    MustExist,
    /// Only the parent must exist; the target itself may be created (STOR, MKD, RNTO).
    MayCreate,
    /// The entry itself must exist and is not followed if it is a link
    /// (DELE, RMD, RNFR).
    Entry,
}

/// A client path resolved against the served root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Path as the client sees it, always absolute and normalized ("/", "/pub/a.txt").
    pub virtual_path: String,
    /// Path on the local filesystem, guaranteed to be within the root.
    pub real_path: PathBuf,
}

/// Confines every client-supplied path to a canonical root directory.
///
/// Resolution is lexical first (`.` and `..` are folded without touching the
/// disk, and folding above the root is refused), then the result is
/// canonicalized so symbolic links are re-validated against the same root.
#[derive(Debug, Clone)]
pub struct Jail {
    root: PathBuf,
}

impl Jail {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FsError> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|_| FsError::InvalidPath(root.display().to_string()))?;
        if !canonical.is_dir() {
            return Err(FsError::InvalidPath(root.display().to_string()));
        }
        Ok(Self { root: canonical })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folds `requested` onto `cwd` lexically and returns the virtual path.
    pub fn normalize(cwd: &str, requested: &str) -> Result<String, FsError> {
        if requested.contains('\0') {
            return Err(FsError::InvalidPath(requested.escape_default().to_string()));
        }

        let requested = requested.replace('\\', "/");
        let mut components: Vec<&str> = Vec::new();

        if !requested.starts_with('/') {
            components.extend(cwd.split('/').filter(|c| !c.is_empty() && *c != "."));
        }

        for component in requested.split('/') {
            match component {
                "" | "." => {}
                ".." => {
                    if components.pop().is_none() {
                        return Err(FsError::OutOfBounds(requested.clone()));
                    }
                }
                other => components.push(other),
            }
        }

        Ok(format!("/{}", components.join("/")))
    }

    /// True when `virtual_path` is `home` or lies below it.
    pub fn is_within(home: &str, virtual_path: &str) -> bool {
        let home = home.trim_end_matches('/');
        if home.is_empty() {
            return true;
        }
        virtual_path == home
            || virtual_path
                .strip_prefix(home)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    pub fn resolve(
        &self,
        home: &str,
        cwd: &str,
        requested: &str,
        existence: Existence,
    ) -> Result<Resolved, FsError> {
        let virtual_path = Self::normalize(cwd, requested)?;

        if !Self::is_within(home, &virtual_path) {
            warn!("Access to {} denied outside home {}", virtual_path, home);
            return Err(FsError::PermissionDenied(virtual_path));
        }

        let joined = self.root.join(virtual_path.trim_start_matches('/'));

        let real_path = match (existence, joined.file_name()) {
            (Existence::MayCreate, Some(file_name)) => {
                let parent = joined.parent().unwrap_or(&self.root);
                let parent = canonicalize_existing(parent, &virtual_path)?;
                self.ensure_inside(home, &parent, &virtual_path)?;

                let target = parent.join(file_name);
                // An existing link at the target must not point outside the root
                if let Ok(meta) = std::fs::symlink_metadata(&target) {
                    if meta.file_type().is_symlink() {
                        match target.canonicalize() {
                            Ok(link_target) => {
                                self.ensure_inside(home, &link_target, &virtual_path)?
                            }
                            Err(_) => return Err(FsError::OutOfBounds(virtual_path)),
                        }
                    }
                }
                target
            }
            (Existence::Entry, Some(file_name)) => {
                let parent = joined.parent().unwrap_or(&self.root);
                let parent = canonicalize_existing(parent, &virtual_path)?;
                self.ensure_inside(home, &parent, &virtual_path)?;

                let entry = parent.join(file_name);
                std::fs::symlink_metadata(&entry).map_err(|e| io_to_fs(e, &virtual_path))?;
                entry
            }
            _ => {
                let canonical = canonicalize_existing(&joined, &virtual_path)?;
                self.ensure_inside(home, &canonical, &virtual_path)?;
                canonical
            }
        };

        debug!("Resolved {} to {:?}", virtual_path, real_path);
        Ok(Resolved {
            virtual_path,
            real_path,
        })
    }

    fn ensure_inside(&self, home: &str, canonical: &Path, virtual_path: &str) -> Result<(), FsError> {
        if !canonical.starts_with(&self.root) {
            warn!(
                "Path {} escapes the root through a link: {:?}",
                virtual_path, canonical
            );
            return Err(FsError::OutOfBounds(virtual_path.to_string()));
        }

        let home = home.trim_matches('/');
        if !home.is_empty() {
            if let Ok(home_real) = self.root.join(home).canonicalize() {
                if !canonical.starts_with(&home_real) {
                    return Err(FsError::PermissionDenied(virtual_path.to_string()));
                }
            }
        }

        Ok(())
    }
}

fn canonicalize_existing(path: &Path, virtual_path: &str) -> Result<PathBuf, FsError> {
    path.canonicalize().map_err(|e| io_to_fs(e, virtual_path))
}

fn io_to_fs(e: std::io::Error, virtual_path: &str) -> FsError {
    match e.kind() {
        ErrorKind::NotFound => FsError::NotFound(virtual_path.to_string()),
        ErrorKind::PermissionDenied => FsError::PermissionDenied(virtual_path.to_string()),
        _ => FsError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Jail) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pub/sub")).unwrap();
        fs::create_dir_all(dir.path().join("alice")).unwrap();
        fs::write(dir.path().join("pub/readme.txt"), b"hello").unwrap();
        let jail = Jail::new(dir.path()).unwrap();
        (dir, jail)
    }

    #[test]
    fn test_normalize_relative_and_absolute() {
        assert_eq!(Jail::normalize("/pub", "sub").unwrap(), "/pub/sub");
        assert_eq!(Jail::normalize("/pub", "./sub/../sub").unwrap(), "/pub/sub");
        assert_eq!(Jail::normalize("/pub/sub", "/alice").unwrap(), "/alice");
        assert_eq!(Jail::normalize("/pub", "..").unwrap(), "/");
        assert_eq!(Jail::normalize("/", "pub\\sub").unwrap(), "/pub/sub");
    }

    #[test]
    fn test_normalize_refuses_climbing_above_root() {
        for attempt in ["..", "../../etc", "/../etc", "pub/../../etc", "/pub/sub/../../../x"] {
            assert!(
                matches!(Jail::normalize("/", attempt), Err(FsError::OutOfBounds(_))),
                "{} was not refused",
                attempt
            );
        }
    }

    #[test]
    fn test_dotdot_results_always_stay_inside_root() {
        let (_dir, jail) = fixture();
        let cwds = ["/", "/pub", "/pub/sub"];
        let requests = ["..", "../..", "../../..", "sub/..", "../pub/sub/..", "a/../../b", "../x/../.."];
        for cwd in cwds {
            for request in requests {
                match jail.resolve("/", cwd, request, Existence::MayCreate) {
                    Ok(resolved) => assert!(resolved.real_path.starts_with(jail.root())),
                    Err(FsError::OutOfBounds(_)) | Err(FsError::NotFound(_)) => {}
                    Err(e) => panic!("unexpected error for {} from {}: {}", request, cwd, e),
                }
            }
        }
    }

    #[test]
    fn test_nul_byte_is_invalid() {
        assert!(matches!(
            Jail::normalize("/", "a\0b"),
            Err(FsError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_resolve_existing_file() {
        let (_dir, jail) = fixture();
        let resolved = jail
            .resolve("/", "/pub", "readme.txt", Existence::MustExist)
            .unwrap();
        assert_eq!(resolved.virtual_path, "/pub/readme.txt");
        assert_eq!(resolved.real_path, jail.root().join("pub/readme.txt"));
    }

    #[test]
    fn test_resolve_missing_file() {
        let (_dir, jail) = fixture();
        assert!(matches!(
            jail.resolve("/", "/", "nope.txt", Existence::MustExist),
            Err(FsError::NotFound(_))
        ));
        let created = jail
            .resolve("/", "/", "new.txt", Existence::MayCreate)
            .unwrap();
        assert_eq!(created.real_path, jail.root().join("new.txt"));
        assert!(matches!(
            jail.resolve("/", "/", "missing/new.txt", Existence::MayCreate),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_home_restriction() {
        let (_dir, jail) = fixture();
        assert!(jail
            .resolve("/alice", "/alice", ".", Existence::MustExist)
            .is_ok());
        assert!(matches!(
            jail.resolve("/alice", "/alice", "../pub", Existence::MustExist),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(matches!(
            jail.resolve("/alice", "/alice", "/", Existence::MustExist),
            Err(FsError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_is_within() {
        assert!(Jail::is_within("/", "/anything"));
        assert!(Jail::is_within("/alice", "/alice"));
        assert!(Jail::is_within("/alice", "/alice/docs"));
        assert!(!Jail::is_within("/alice", "/alicebob"));
        assert!(!Jail::is_within("/alice", "/"));
    }

    #[test]
    fn test_root_must_be_a_directory() {
        let (dir, _jail) = fixture();
        assert!(matches!(
            Jail::new(dir.path().join("pub/readme.txt")),
            Err(FsError::InvalidPath(_))
        ));
        assert!(matches!(
            Jail::new(dir.path().join("does-not-exist")),
            Err(FsError::InvalidPath(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_refused() {
        let (dir, jail) = fixture();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret"), b"x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("pub/escape")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret"),
            dir.path().join("pub/secret-link"),
        )
        .unwrap();

        assert!(matches!(
            jail.resolve("/", "/pub", "escape/secret", Existence::MustExist),
            Err(FsError::OutOfBounds(_))
        ));
        assert!(matches!(
            jail.resolve("/", "/pub", "escape/new.txt", Existence::MayCreate),
            Err(FsError::OutOfBounds(_))
        ));
        assert!(matches!(
            jail.resolve("/", "/pub", "secret-link", Existence::MayCreate),
            Err(FsError::OutOfBounds(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_is_followed() {
        let (dir, jail) = fixture();
        std::os::unix::fs::symlink(dir.path().join("pub/sub"), dir.path().join("shortcut"))
            .unwrap();
        let resolved = jail
            .resolve("/", "/", "shortcut", Existence::MustExist)
            .unwrap();
        assert_eq!(resolved.real_path, jail.root().join("pub/sub"));
    }

    #[cfg(unix)]
    #[test]
    fn test_entry_names_the_link_not_its_target() {
        let (dir, jail) = fixture();
        std::os::unix::fs::symlink(dir.path().join("pub/readme.txt"), dir.path().join("pub/link"))
            .unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("pub/away")).unwrap();

        let link = jail.resolve("/", "/pub", "link", Existence::Entry).unwrap();
        assert_eq!(link.real_path, jail.root().join("pub/link"));
        let followed = jail.resolve("/", "/pub", "link", Existence::MustExist).unwrap();
        assert_eq!(followed.real_path, jail.root().join("pub/readme.txt"));

        // The link itself lives inside the root even when it points elsewhere
        let away = jail.resolve("/", "/pub", "away", Existence::Entry).unwrap();
        assert_eq!(away.real_path, jail.root().join("pub/away"));
        assert!(matches!(
            jail.resolve("/", "/pub", "away/x", Existence::Entry),
            Err(FsError::OutOfBounds(_))
        ));
        assert!(matches!(
            jail.resolve("/", "/pub", "gone", Existence::Entry),
            Err(FsError::NotFound(_))
        ));
    }
}
