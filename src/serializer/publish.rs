//! Atomic publication of the artifact and its module manifest
//!
//! Both files are fully written to temporary files inside their destination
//! directories before either is renamed into place, so a failed compile or
//! write never leaves output that looks like a success. The manifest is
//! renamed first and rolled back if the artifact rename fails.

use super::SchemaSerializer;
use crate::construct::ConstructKind;
use crate::error::ToolError;
use crate::linker::SymbolUniverse;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// One translatable module or submodule, as listed for code generators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub kind: ConstructKind,
    /// Module whose namespace the tree's nodes live in
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub file: String,
    /// Generators skip modules that only carry deviations
    pub deviation_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub artifact: String,
    pub modules: Vec<ManifestEntry>,
}

impl ModuleManifest {
    pub fn from_universe(universe: &SymbolUniverse, artifact: &str) -> Self {
        let modules = universe
            .translatable()
            .map(|tree| ManifestEntry {
                name: tree.name.clone(),
                kind: tree.root_node().kind,
                module: tree.module_name().to_string(),
                namespace: tree.header.namespace.clone(),
                prefix: tree.header.own_prefix().map(str::to_string),
                file: tree.file.clone(),
                deviation_only: tree.header.deviation_only,
            })
            .collect();
        Self {
            artifact: artifact.to_string(),
            modules,
        }
    }
}

/// Where a publish put its files
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
    pub artifact: PathBuf,
    pub manifest: PathBuf,
    pub bytes: usize,
}

pub const MANIFEST_NAME: &str = "modules.json";

fn stage(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile, ToolError> {
    std::fs::create_dir_all(dir).map_err(|e| ToolError::io(dir, e))?;
    let mut file = NamedTempFile::new_in(dir).map_err(|e| ToolError::io(dir, e))?;
    file.write_all(bytes).map_err(|e| ToolError::io(file.path(), e))?;
    file.as_file().sync_all().map_err(|e| ToolError::io(file.path(), e))?;
    Ok(file)
}

fn restore(dir: &Path, path: &Path, previous: Option<&[u8]>) {
    let restored = match previous {
        Some(bytes) => stage(dir, bytes).and_then(|file| {
            file.persist(path)
                .map(|_| ())
                .map_err(|e| ToolError::io(path, e.error))
        }),
        None => std::fs::remove_file(path).map_err(|e| ToolError::io(path, e)),
    };
    if let Err(e) = restored {
        warn!("Could not roll back {}: {}", path.display(), e);
    }
}

impl SchemaSerializer {
    /// Write the artifact to `output_dir` and the manifest to `metadata_dir`
    pub fn publish(
        &self,
        universe: &SymbolUniverse,
        output_dir: &Path,
        metadata_dir: &Path,
        artifact_name: &str,
    ) -> Result<PublishedArtifact, ToolError> {
        let artifact = self.serialize(universe)?;
        let artifact_bytes = self.to_bytes(&artifact)?;
        let manifest = ModuleManifest::from_universe(universe, artifact_name);
        let mut manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
        manifest_bytes.push(b'\n');

        let artifact_path = output_dir.join(artifact_name);
        let manifest_path = metadata_dir.join(MANIFEST_NAME);

        let staged_artifact = stage(output_dir, &artifact_bytes)?;
        let staged_manifest = stage(metadata_dir, &manifest_bytes)?;

        // The manifest goes first and is put back if the artifact cannot follow
        let previous_manifest = std::fs::read(&manifest_path).ok();
        staged_manifest
            .persist(&manifest_path)
            .map_err(|e| ToolError::io(&manifest_path, e.error))?;
        if let Err(e) = staged_artifact.persist(&artifact_path) {
            restore(metadata_dir, &manifest_path, previous_manifest.as_deref());
            return Err(ToolError::io(&artifact_path, e.error));
        }

        info!(
            "Published {} ({} bytes, {} trees)",
            artifact_path.display(),
            artifact_bytes.len(),
            artifact.trees.len()
        );
        Ok(PublishedArtifact {
            artifact: artifact_path,
            manifest: manifest_path,
            bytes: artifact_bytes.len(),
        })
    }
}
