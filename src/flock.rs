//! A single-attempt, non-blocking advisory file lock guarding exclusive
//! access to a cache directory across processes.

use std::{fs::File, path::Path};

use fs4::fs_std::FileExt;
use thiserror::Error;

pub struct FileLock {
    _file: File,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("lock at {0} is held by another process")]
    Busy(std::path::PathBuf),
    #[error("IO error acquiring lock: {0}")]
    IO(#[from] std::io::Error),
}

impl FileLock {
    /// Takes the lock immediately or fails with [`Error::Busy`]; this is
    /// deliberately non-blocking (no retry loop) so a colliding process is
    /// reported to the caller rather than silently waited on.
    pub fn acquire(path: &Path) -> Result<Self, Error> {
        let file = File::create(path)?;
        match file.try_lock_exclusive() {
            Ok(_) => Ok(Self { _file: file }),
            Err(error) if error.raw_os_error() == fs4::lock_contended_error().raw_os_error() => {
                Err(Error::Busy(path.to_path_buf()))
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_on_same_file_fails_busy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".protato.lock");
        let first = FileLock::acquire(&path).unwrap();
        let second = FileLock::acquire(&path);
        assert!(matches!(second, Err(Error::Busy(_))));
        drop(first);
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".protato.lock");
        {
            let _lock = FileLock::acquire(&path).unwrap();
        }
        let reacquired = FileLock::acquire(&path);
        assert!(reacquired.is_ok());
    }
}
