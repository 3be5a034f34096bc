//! Cache manifests recording which corpus an index artifact was built from
//!
//! A manifest is written last, after the artifact it describes, so a build
//! interrupted half way leaves no manifest and is treated as a cache miss.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Job ids in index order
    pub ids: Vec<String>,

    /// Encoder that produced the vectors (dense only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default)]
    pub dimension: usize,

    /// BLAKE3 of the uncompressed vector bytes (dense only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    pub built_at: String,
}

impl IndexManifest {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            model: None,
            dimension: 0,
            checksum: None,
            built_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Read the manifest in `dir`; `None` when absent or unreadable
    pub fn read(dir: &Path) -> Option<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::warn!("Ignoring unreadable manifest {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write the manifest atomically into `dir`
    pub fn write(&self, dir: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        let temp_path = dir.join(format!("{}.tmp", MANIFEST_FILE));
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, dir.join(MANIFEST_FILE))
    }

    /// Same id list, same length and order
    pub fn matches_ids(&self, ids: &[String]) -> bool {
        self.ids.as_slice() == ids
    }
}
