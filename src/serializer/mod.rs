//! Schema Serializer - Freezes linked trees into a persisted artifact
//!
//! The artifact is a JSON document holding one entry per translatable
//! module or submodule, ordered by name. Each entry carries the blake3
//! digest of its tree's JSON so a loader can detect truncated or edited
//! artifacts. Serializing the same linked unit twice yields the same bytes.

pub mod publish;

pub use publish::{ManifestEntry, ModuleManifest, PublishedArtifact};

use crate::error::ToolError;
use crate::linker::SymbolUniverse;
use crate::schema::{ResolutionStatus, SchemaTree};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const ARTIFACT_FORMAT: &str = "yangc-schema";
pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub digest: String,
    pub tree: SchemaTree,
}

/// Serialized form of a compiled unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaArtifact {
    pub format: String,
    pub version: u32,
    pub trees: Vec<ArtifactEntry>,
}

impl SchemaArtifact {
    pub fn module_names(&self) -> Vec<&str> {
        self.trees.iter().map(|e| e.tree.name.as_str()).collect()
    }
}

/// Hex blake3 digest of a tree's JSON form
pub fn tree_digest(tree: &SchemaTree) -> Result<String, ToolError> {
    let bytes = serde_json::to_vec(tree)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaSerializer;

impl SchemaSerializer {
    pub fn new() -> Self {
        Self
    }

    /// Build the artifact for the translatable trees of a linked unit
    pub fn serialize(&self, universe: &SymbolUniverse) -> Result<SchemaArtifact, ToolError> {
        let mut trees = Vec::new();
        for tree in universe.translatable() {
            if let Some((_, node)) = tree.iter().find(|(_, n)| n.status != ResolutionStatus::Resolved) {
                return Err(ToolError::invalid_artifact(
                    &tree.file,
                    format!("{} in {} is not resolved", node.short_description(), tree.name),
                ));
            }
            trees.push(ArtifactEntry {
                digest: tree_digest(tree)?,
                tree: tree.clone(),
            });
        }
        debug!("Serialized {} trees", trees.len());

        Ok(SchemaArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            version: ARTIFACT_VERSION,
            trees,
        })
    }

    pub fn to_bytes(&self, artifact: &SchemaArtifact) -> Result<Vec<u8>, ToolError> {
        let mut bytes = serde_json::to_vec_pretty(artifact)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse and verify an artifact. Returned trees are dependency trees:
    /// they are not translatable in the unit that loads them.
    pub fn from_bytes(&self, path: &Path, bytes: &[u8]) -> Result<Vec<SchemaTree>, ToolError> {
        let artifact: SchemaArtifact = serde_json::from_slice(bytes)
            .map_err(|e| ToolError::invalid_artifact(path, e.to_string()))?;

        if artifact.format != ARTIFACT_FORMAT {
            return Err(ToolError::invalid_artifact(
                path,
                format!("unknown format '{}'", artifact.format),
            ));
        }
        if artifact.version != ARTIFACT_VERSION {
            return Err(ToolError::invalid_artifact(
                path,
                format!("unsupported version {}", artifact.version),
            ));
        }

        let mut trees = Vec::with_capacity(artifact.trees.len());
        for entry in artifact.trees {
            let digest = tree_digest(&entry.tree)?;
            if digest != entry.digest {
                return Err(ToolError::invalid_artifact(
                    path,
                    format!("digest mismatch for {}", entry.tree.name),
                ));
            }
            entry
                .tree
                .check_arena()
                .map_err(|message| ToolError::invalid_artifact(path, format!("{}: {}", entry.tree.name, message)))?;
            trees.push(entry.tree);
        }
        Ok(trees)
    }

    /// Read a previously published artifact from disk
    pub fn load(&self, path: &Path) -> Result<Vec<SchemaTree>, ToolError> {
        let bytes = std::fs::read(path).map_err(|e| ToolError::io(path, e))?;
        self.from_bytes(path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_tree;
    use crate::construct::ConstructKind;
    use crate::event::EventStreamBuilder;
    use crate::linker::Linker;

    fn linked_unit() -> SymbolUniverse {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .enter(ConstructKind::Grouping, "g")
            .statement(ConstructKind::Leaf, "x")
            .exit()
            .enter(ConstructKind::Container, "c")
            .statement(ConstructKind::Uses, "g")
            .exit()
            .exit();
        let mut universe = SymbolUniverse::new();
        universe.insert(build_tree("m.yang", &b.finish()).unwrap()).unwrap();
        Linker::new().link(&mut universe).unwrap();
        universe
    }

    #[test]
    fn test_round_trip_gives_equivalent_trees() {
        let universe = linked_unit();
        let serializer = SchemaSerializer::new();
        let bytes = serializer.to_bytes(&serializer.serialize(&universe).unwrap()).unwrap();

        let trees = serializer.from_bytes(Path::new("unit.json"), &bytes).unwrap();
        assert_eq!(trees.len(), 1);
        let mut loaded = trees[0].clone();
        assert!(!loaded.translatable);
        assert!(loaded.find_path("/c/x").is_some());

        loaded.translatable = true;
        assert_eq!(&loaded, universe.get("m").unwrap());
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let serializer = SchemaSerializer::new();
        let first = serializer.to_bytes(&serializer.serialize(&linked_unit()).unwrap()).unwrap();
        let second = serializer.to_bytes(&serializer.serialize(&linked_unit()).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tampered_artifact_is_rejected() {
        let serializer = SchemaSerializer::new();
        let mut artifact = serializer.serialize(&linked_unit()).unwrap();
        artifact.trees[0].tree.name = "renamed".to_string();
        let bytes = serializer.to_bytes(&artifact).unwrap();

        let err = serializer.from_bytes(Path::new("unit.json"), &bytes).unwrap_err();
        assert!(err.to_string().contains("digest mismatch"));
    }

    #[test]
    fn test_broken_arena_with_matching_digest_is_rejected() {
        let serializer = SchemaSerializer::new();
        let artifact = serializer.serialize(&linked_unit()).unwrap();
        let mut json = serde_json::to_value(&artifact).unwrap();
        json["trees"][0]["tree"]["nodes"] = serde_json::json!([]);
        let tree: SchemaTree = serde_json::from_value(json["trees"][0]["tree"].clone()).unwrap();
        json["trees"][0]["digest"] = serde_json::Value::String(tree_digest(&tree).unwrap());
        let bytes = serde_json::to_vec(&json).unwrap();

        let err = serializer.from_bytes(Path::new("unit.json"), &bytes).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArtifact { .. }));
        assert!(err.to_string().contains("tree has no nodes"));
    }

    #[test]
    fn test_wrong_format_is_rejected() {
        let serializer = SchemaSerializer::new();
        let bytes = br#"{"format": "other", "version": 1, "trees": []}"#;
        let err = serializer.from_bytes(Path::new("x.json"), bytes).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArtifact { .. }));
    }

    #[test]
    fn test_unlinked_tree_is_not_serialized() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m").statement(ConstructKind::Uses, "g").exit();
        let mut universe = SymbolUniverse::new();
        universe.insert(build_tree("m.yang", &b.finish()).unwrap()).unwrap();

        let err = SchemaSerializer::new().serialize(&universe).unwrap_err();
        assert!(err.to_string().contains("uses g"));
    }
}
