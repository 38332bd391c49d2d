//! Command-file transport shared by the pump and shaker drivers.
//!
//! Each command is written to a fresh file in a scratch directory and handed
//! to an external program (a remote shell session or a serial helper script).
//! The file is removed afterwards; removal failures are retried a few times and
//! then ignored since they never affect the rig itself.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{HwError, Result};

/// Argument placeholder replaced by the command file path.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Attempts made by [`remove_with_retry`] before giving up.
pub const CLEANUP_ATTEMPTS: u32 = 3;
/// Pause between cleanup attempts.
pub const CLEANUP_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    temp_dir: PathBuf,
    extension: &'static str,
    cleanup_backoff: Duration,
}

impl CommandRunner {
    /// `args` may contain [`FILE_PLACEHOLDER`]; it is substituted with the
    /// path of the command file on every run.
    pub fn new(program: impl Into<String>, args: Vec<String>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            temp_dir: temp_dir.into(),
            extension: "sh",
            cleanup_backoff: CLEANUP_BACKOFF,
        }
    }

    pub fn with_extension(mut self, extension: &'static str) -> Self {
        self.extension = extension;
        self
    }

    pub fn with_cleanup_backoff(mut self, backoff: Duration) -> Self {
        self.cleanup_backoff = backoff;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Write `contents` to a command file and run the program on it.
    pub fn run_with_file(&self, contents: &str) -> Result<()> {
        let file = CommandFile::create(&self.temp_dir, self.extension, contents)?;
        let file_arg = file.path.to_string_lossy().into_owned();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(FILE_PLACEHOLDER, &file_arg))
            .collect();
        debug!(program = %self.program, ?args, contents, "executing command file");
        let status = Command::new(&self.program).args(&args).status();
        file.remove(self.cleanup_backoff);
        let status = status?;
        if !status.success() {
            return Err(HwError::CommandFailed {
                program: self.program.clone(),
                status: status.code(),
            });
        }
        Ok(())
    }
}

struct CommandFile {
    path: PathBuf,
}

impl CommandFile {
    /// Create `tmp<N>.<ext>` with the lowest free N.
    fn create(dir: &Path, extension: &str, contents: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let mut n = 0_u32;
        loop {
            let path = dir.join(format!("tmp{n}.{extension}"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut f) => {
                    f.write_all(contents.as_bytes())?;
                    f.sync_all()?;
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn remove(self, backoff: Duration) {
        remove_with_retry(&self.path, CLEANUP_ATTEMPTS, backoff);
    }
}

/// Remove `path`, retrying up to `attempts` times. A missing file counts as
/// removed. Returns whether the file is gone; persistent failures are logged
/// and otherwise ignored.
pub fn remove_with_retry(path: &Path, attempts: u32, backoff: Duration) -> bool {
    for attempt in 1..=attempts.max(1) {
        match fs::remove_file(path) {
            Ok(()) => return true,
            Err(e) if e.kind() == ErrorKind::NotFound => return true,
            Err(e) => {
                warn!(path = %path.display(), attempt, error = %e, "temporary command file removal failed");
                if attempt < attempts {
                    std::thread::sleep(backoff);
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_counts_as_removed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_with_retry(&dir.path().join("nope.sh"), 3, Duration::ZERO));
    }

    #[test]
    fn command_files_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = CommandFile::create(dir.path(), "sh", "a").unwrap();
        let b = CommandFile::create(dir.path(), "sh", "b").unwrap();
        assert_ne!(a.path, b.path);
        assert_eq!(fs::read_to_string(&b.path).unwrap(), "b");
        a.remove(Duration::ZERO);
        b.remove(Duration::ZERO);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
