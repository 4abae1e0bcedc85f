//! Filesystem-backed permission layer.

use std::io;

use localsock_traits::PermissionLayer;

/// Applies permissions with `std::fs::set_permissions`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPermissions;

impl FsPermissions {
    /// Create the permission layer.
    pub const fn new() -> Self {
        Self
    }
}

impl PermissionLayer for FsPermissions {
    #[cfg(unix)]
    fn chmod(&self, path: &str, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    }

    // Only the write bits are representable outside POSIX.
    #[cfg(not(unix))]
    fn chmod(&self, path: &str, mode: u32) -> io::Result<()> {
        let mut permissions = std::fs::metadata(path)?.permissions();
        permissions.set_readonly(mode & 0o222 == 0);
        std::fs::set_permissions(path, permissions)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_chmod_applies_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry");
        std::fs::write(&path, b"").unwrap();
        let path = path.to_str().unwrap();

        FsPermissions::new().chmod(path, 0o444).unwrap();
        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444);
    }

    #[test]
    fn test_chmod_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");
        let err = FsPermissions::new()
            .chmod(path.to_str().unwrap(), 0o666)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
