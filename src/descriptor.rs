use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::environment::Environment;
use crate::errors::RadishError;

pub const DESCRIPTOR_ENV: &str = "RADISH_DESCRIPTOR";
pub const PRIMARY_DESCRIPTOR_PATH: &str = "/u01/app/radish.json";
pub const FALLBACK_DESCRIPTOR_PATH: &str = "/radish.json";

/// Launch description for a JVM application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Descriptor {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "Version", default)]
    pub version: String,
    #[serde(rename = "Data", default)]
    pub data: DescriptorData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DescriptorData {
    #[serde(default)]
    pub basedir: String,
    #[serde(default)]
    pub paths_to_class_libraries: Vec<String>,
    #[serde(default)]
    pub main_class: String,
    #[serde(default)]
    pub application_args: String,
    #[serde(default)]
    pub java_options: String,
}

impl Descriptor {
    pub fn from_json(content: &str) -> Result<Self, RadishError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read descriptor {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("failed to parse descriptor {}", path.display()))
    }
}

/// Finds the descriptor: explicit path, then `RADISH_DESCRIPTOR`, then the
/// well-known image locations.
pub fn locate(explicit: Option<&Path>, env: &dyn Environment) -> Result<PathBuf, RadishError> {
    locate_in(
        explicit,
        env,
        &[
            Path::new(PRIMARY_DESCRIPTOR_PATH),
            Path::new(FALLBACK_DESCRIPTOR_PATH),
        ],
    )
}

fn locate_in(
    explicit: Option<&Path>,
    env: &dyn Environment,
    well_known: &[&Path],
) -> Result<PathBuf, RadishError> {
    if let Some(path) = explicit {
        return match fs::metadata(path) {
            Ok(_) => Ok(path.to_path_buf()),
            Err(source) => Err(RadishError::DescriptorInaccessible {
                path: path.to_path_buf(),
                source,
            }),
        };
    }

    if let Some(path) = env.lookup(DESCRIPTOR_ENV) {
        debug!("using descriptor from {DESCRIPTOR_ENV}: {path}");
        return Ok(PathBuf::from(path));
    }

    well_known
        .iter()
        .find(|candidate| candidate.exists())
        .map(|candidate| candidate.to_path_buf())
        .ok_or(RadishError::DescriptorNotFound)
}
