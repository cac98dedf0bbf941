use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings shared by every trial of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Bytes compared at each end of the file.
    pub compare_bytes: usize,
    /// Extent reporting tool, invoked as `<tool> -b512 -e -s <file>`.
    pub report_tool: String,
    /// Where partition sizes are looked up (`<root>/<device-name>/size`).
    pub sysfs_root: PathBuf,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            compare_bytes: 256,
            report_tool: "filefrag".to_owned(),
            sysfs_root: PathBuf::from("/sys/class/block"),
        }
    }
}

impl VerifyConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config json {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verify.json");
        fs::write(&path, r#"{"compare_bytes": 1024}"#).unwrap();

        let config = VerifyConfig::load(&path).unwrap();
        assert_eq!(config.compare_bytes, 1024);
        assert_eq!(config.report_tool, "filefrag");
        assert_eq!(config.sysfs_root, PathBuf::from("/sys/class/block"));
    }

    #[test]
    fn invalid_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{compare_bytes").unwrap();

        let err = VerifyConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }
}
