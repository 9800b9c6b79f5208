// src/cert/store.rs
use super::types::{CertKeyFiles, CertKeyPair};
use crate::error::{CertChainError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const KEY_FILE_MODE: u32 = 0o600;
const CERT_FILE_MODE: u32 = 0o644;

/// Writes `contents` to a temporary file next to `path` and renames it into
/// place, so readers only ever see the old or the new file.
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| CertChainError::io(path, io::Error::new(io::ErrorKind::InvalidInput, "no parent directory")))?;
    fs::create_dir_all(dir).map_err(|e| CertChainError::io(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = dir.join(format!(".{}.tmp-{}", file_name, Uuid::new_v4()));

    let result = write_and_sync(&temp_path, contents, mode)
        .and_then(|_| fs::rename(&temp_path, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(CertChainError::io(path, e));
    }
    Ok(())
}

fn write_and_sync(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let mut file = fs::File::create(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    file.write_all(contents)?;
    file.sync_all()
}

pub fn read_pem(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CertChainError::io(path, e))
}

impl CertKeyFiles {
    /// Both files present. A half-written pair counts as absent.
    pub fn exists(&self) -> bool {
        self.cert.is_file() && self.key.is_file()
    }

    pub fn load(&self) -> Result<Option<CertKeyPair>> {
        self.recover()?;
        if !self.exists() {
            return Ok(None);
        }
        Ok(Some(CertKeyPair {
            cert_pem: read_pem(&self.cert)?,
            key_pem: read_pem(&self.key)?,
        }))
    }

    /// Staging files for a save in progress: key first, then certificate.
    pub(crate) fn staged(&self) -> (PathBuf, PathBuf) {
        (staged_path(&self.key), staged_path(&self.cert))
    }

    /// Stages the whole pair next to the live files, then moves it into
    /// place. A crash at any point leaves a state that [`recover`] turns
    /// back into a matching pair.
    ///
    /// [`recover`]: CertKeyFiles::recover
    pub fn save(&self, pair: &CertKeyPair) -> Result<()> {
        let (staged_key, staged_cert) = self.staged();
        write_atomic(&staged_key, pair.key_pem.as_bytes(), KEY_FILE_MODE)?;
        write_atomic(&staged_cert, pair.cert_pem.as_bytes(), CERT_FILE_MODE)?;
        self.commit()
    }

    fn commit(&self) -> Result<()> {
        let (staged_key, staged_cert) = self.staged();
        for (staged, live) in [(&staged_key, &self.key), (&staged_cert, &self.cert)] {
            if staged.is_file() {
                fs::rename(staged, live).map_err(|e| CertChainError::io(live, e))?;
            }
        }
        Ok(())
    }

    /// Finishes or discards a save that was interrupted. A staged
    /// certificate means the staged key was complete, so the save is rolled
    /// forward; a staged key alone is dropped and the old pair stays.
    /// Returns true when an interrupted save was found.
    pub fn recover(&self) -> Result<bool> {
        let (staged_key, staged_cert) = self.staged();
        match (staged_key.is_file(), staged_cert.is_file()) {
            (false, false) => Ok(false),
            (true, false) => {
                fs::remove_file(&staged_key).map_err(|e| CertChainError::io(&staged_key, e))?;
                Ok(true)
            }
            _ => {
                self.commit()?;
                Ok(true)
            }
        }
    }
}

fn staged_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.staged", file_name))
}

/// Public material such as trust bundles.
pub fn write_public(path: &Path, contents: &[u8]) -> Result<()> {
    write_atomic(path, contents, CERT_FILE_MODE)
}

/// Private key material outside the hierarchy.
pub fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    write_atomic(path, contents, KEY_FILE_MODE)
}
