//! Filesystem helpers that map failures onto [`CertError::FileIo`].

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{CertError, Result};

pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| CertError::file_io(path, e))
}

pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CertError::file_io(path, e))
}

/// Create a new file readable and writable by the owner only.
///
/// The file is created with mode 0600, so its contents are never visible
/// to other users. Fails if `path` already exists.
pub fn write_private_file(path: &Path, contents: &str) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| CertError::file_io(path, e))?;
    file.write_all(contents.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| CertError::file_io(path, e))
}

pub fn restrict_to_owner(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)
            .map_err(|e| CertError::file_io(path, e))?
            .permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms).map_err(|e| CertError::file_io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Replace `path` by writing a sibling `.tmp` file and renaming it over.
pub fn write_private_file_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    let staged = Path::new(&staged);

    // Leftover from an interrupted write
    if staged.exists() {
        remove_file(staged)?;
    }
    write_private_file(staged, contents)?;
    fs::rename(staged, path).map_err(|e| {
        fs::remove_file(staged).ok();
        CertError::file_io(path, e)
    })
}

pub fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| CertError::file_io(path, e))
}

pub fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| CertError::file_io(path, e))
}

pub fn remove_dir(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).map_err(|e| CertError::file_io(path, e))
}
