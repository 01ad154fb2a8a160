//! FIFO naming: rendezvous paths shared by server and clients
//!
//! Both sides build the same path from a client name and a server name, so
//! no discovery protocol is needed. The on-disk format is
//! `<root>/jack_fifo.<server_name>_<name>`.

use crate::error::{FifoError, Result};
use std::path::{Path, PathBuf};

/// Prefix of every FIFO file name inside the root directory
pub const FIFO_PREFIX: &str = "jack_fifo.";

/// Directory JACK clients conventionally rendezvous in
pub const DEFAULT_ROOT_DIR: &str = "/tmp";

/// Platform path limit, including the trailing NUL
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const MAX_PATH_LEN: usize = 4096;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const MAX_PATH_LEN: usize = 1024;

/// Longest single path component (`NAME_MAX`)
pub const MAX_FILE_NAME_LEN: usize = 255;

const SEPARATOR: char = '_';

/// Naming configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoConfig {
    /// Shared directory the FIFOs live in
    pub root_dir: PathBuf,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
        }
    }
}

impl FifoConfig {
    /// Use `root_dir` instead of the default shared directory
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Build the FIFO path for `name` on server `server_name`
    ///
    /// Pure and deterministic. `server_name` may not contain `_`, which
    /// keeps distinct `(name, server_name)` pairs from sharing a path.
    pub fn build_name(&self, name: &str, server_name: &str) -> Result<PathBuf> {
        check_component(server_name, true)?;
        check_component(name, false)?;

        let file_name = format!("{}{}{}{}", FIFO_PREFIX, server_name, SEPARATOR, name);
        if file_name.len() > MAX_FILE_NAME_LEN {
            return Err(FifoError::NameTooLong {
                max: MAX_FILE_NAME_LEN,
                got: file_name.len(),
            });
        }

        let path = self.root_dir.join(file_name);

        let got = path.as_os_str().len() + 1;
        if got > MAX_PATH_LEN {
            return Err(FifoError::NameTooLong {
                max: MAX_PATH_LEN,
                got,
            });
        }
        Ok(path)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}

fn check_component(component: &str, is_server: bool) -> Result<()> {
    let reason = if component.is_empty() {
        Some("empty")
    } else if component.contains('/') {
        Some("contains '/'")
    } else if component.contains('\0') {
        Some("contains NUL")
    } else if is_server && component.contains(SEPARATOR) {
        Some("server name contains '_'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(FifoError::InvalidName {
            component: component.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
