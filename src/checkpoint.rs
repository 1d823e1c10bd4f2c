//! Versioned on-disk training state.
//!
//! Layout: the magic bytes `NVCK`, the schema version as a little-endian `u32`,
//! then the bincode-encoded [`Checkpoint`].
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{NavigatorError, Result};
use crate::metrics::ScoreHistory;
use crate::network::Parameters;
use crate::optimizer::OptimizerWrapper;

/// Schema version written by this build.
pub const CHECKPOINT_VERSION: u32 = 1;

const MAGIC: &[u8; 4] = b"NVCK";
const HEADER_LEN: usize = MAGIC.len() + 4;

/// Everything needed to resume training.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Number of completed episodes.
    pub epoch: u64,
    pub epsilon: f32,
    /// Environment steps taken over the whole run.
    pub total_steps: u64,
    pub online: Parameters,
    pub optimizer: OptimizerWrapper,
    pub score_history: ScoreHistory,
}

impl Checkpoint {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&CHECKPOINT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decode a checkpoint; `path` is only used in error messages.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self> {
        let corrupt = |reason: String| NavigatorError::CorruptCheckpoint {
            path: path.to_path_buf(),
            reason,
        };

        if bytes.len() < HEADER_LEN {
            return Err(corrupt(format!(
                "file is {} bytes, shorter than the header",
                bytes.len()
            )));
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(corrupt("not a navigator checkpoint".to_string()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
        let version = u32::from_le_bytes(version);
        if version != CHECKPOINT_VERSION {
            return Err(NavigatorError::UnsupportedVersion {
                found: version,
                supported: CHECKPOINT_VERSION,
            });
        }

        bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|err| corrupt(err.to_string()))
    }

    /// Write the checkpoint through a temporary sibling file, then rename it into place.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let tmp_path = temporary_path(path);
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load a checkpoint. A missing file is `Ok(None)`: there is nothing to resume.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Self::from_bytes(&bytes, path).map(Some)
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
