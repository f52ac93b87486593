//! Compiler - Batch entry point tying the stages together
//!
//! A batch runs, fail-fast:
//! 1. Tree building, one file per rayon task
//! 2. Linking (intra-file pass, barrier, cross-unit pass, augments)
//! 3. Collision checks
//! 4. Optionally, atomic publication of the artifact and manifest
//!
//! Batches on one [`Compiler`] are serialized by a lock; no state survives
//! from one batch to the next.

use crate::Result;
use crate::builder::{SourceFile, SourceRegistry, build_tree, default_registry};
use crate::collision::{CollisionDetector, CollisionError};
use crate::config::OutputSettings;
use crate::error::ToolError;
use crate::linker::{LinkReport, Linker, LinkerError, SymbolUniverse};
use crate::schema::{SchemaTree, TreeStats};
use crate::serializer::{PublishedArtifact, SchemaSerializer};
use crate::sources::expand_inputs;
use crate::ui::{ProgressMessage, ProgressPhase};
use crossbeam::channel::Sender;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};


/// Everything one batch works on: the files being compiled and the universe
/// of trees they may reference. Dependency trees are frozen inputs and are
/// never serialized with the unit.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    files: Vec<String>,
    universe: SymbolUniverse,
}

impl CompilationUnit {
    pub fn new(trees: Vec<SchemaTree>, dependencies: Vec<SchemaTree>) -> std::result::Result<Self, LinkerError> {
        let mut universe = SymbolUniverse::new();
        let files = trees.iter().map(|t| t.file.clone()).collect();
        for mut tree in trees {
            tree.translatable = true;
            universe.insert(tree)?;
        }
        for mut tree in dependencies {
            tree.translatable = false;
            universe.insert(tree)?;
        }
        Ok(Self { files, universe })
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn universe(&self) -> &SymbolUniverse {
        &self.universe
    }

    pub fn link(&mut self) -> std::result::Result<LinkReport, LinkerError> {
        Linker::new().link(&mut self.universe)
    }

    /// Returns the number of holders checked
    pub fn check_collisions(&self) -> std::result::Result<usize, CollisionError> {
        CollisionDetector::new().check_universe(&self.universe)
    }
}

/// Outcome of a successful batch
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub files: Vec<String>,
    pub universe: SymbolUniverse,
    pub report: LinkReport,
    pub holders_checked: usize,
}

impl CompiledUnit {
    /// Shape statistics of each translatable tree, in name order
    pub fn stats(&self) -> Vec<(String, TreeStats)> {
        self.universe
            .translatable()
            .map(|tree| (tree.name.clone(), TreeStats::collect(tree)))
            .collect()
    }

    pub fn tree(&self, name: &str) -> Option<&SchemaTree> {
        self.universe.get(name)
    }
}

pub struct Compiler {
    registry: SourceRegistry,
    serializer: SchemaSerializer,
    lock: Mutex<()>,
    progress: Option<Sender<ProgressMessage>>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_registry(default_registry())
    }

    pub fn with_registry(registry: SourceRegistry) -> Self {
        Self {
            registry,
            serializer: SchemaSerializer::new(),
            lock: Mutex::new(()),
            progress: None,
        }
    }

    /// Report stage progress on `tx`
    pub fn with_progress(mut self, tx: Sender<ProgressMessage>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    fn report(&self, message: ProgressMessage) {
        if let Some(tx) = &self.progress {
            tx.send(message).ok();
        }
    }

    /// Expand inputs and read every file through its event source
    pub fn load_sources(&self, inputs: &[PathBuf], exclude: &[String]) -> Result<Vec<SourceFile>> {
        let paths = expand_inputs(inputs, exclude, &self.registry.extensions())?;
        paths
            .par_iter()
            .map(|path| match self.registry.read_file(path)? {
                Some(file) => Ok(file),
                None => Err(ToolError::UnsupportedInput { path: path.clone() }.into()),
            })
            .collect()
    }

    /// Read previously published artifacts; their trees join the next
    /// batch as frozen dependencies
    pub fn load_dependencies(&self, artifacts: &[PathBuf]) -> Result<Vec<SchemaTree>> {
        let mut trees = Vec::new();
        for path in artifacts {
            let loaded = self.serializer.load(path)?;
            debug!("Loaded {} trees from {}", loaded.len(), path.display());
            trees.extend(loaded);
        }
        Ok(trees)
    }

    /// Build, link and check one batch
    pub fn compile(&self, files: Vec<SourceFile>, dependencies: Vec<SchemaTree>) -> Result<CompiledUnit> {
        let _batch = self.lock.lock();
        self.compile_inner(files, dependencies)
    }

    /// Compile, then publish only if every stage succeeded
    pub fn compile_and_publish(
        &self,
        files: Vec<SourceFile>,
        dependencies: Vec<SchemaTree>,
        settings: &OutputSettings,
    ) -> Result<(CompiledUnit, PublishedArtifact)> {
        let _batch = self.lock.lock();
        let compiled = self.compile_inner(files, dependencies)?;

        self.report(ProgressMessage::Started {
            phase: ProgressPhase::Publishing,
            total: 1,
        });
        let published = self.serializer.publish(
            &compiled.universe,
            &settings.output_dir,
            &settings.metadata_dir,
            &settings.artifact_name,
        )?;
        self.report(ProgressMessage::Finished {
            phase: ProgressPhase::Publishing,
        });
        Ok((compiled, published))
    }

    fn compile_inner(&self, files: Vec<SourceFile>, dependencies: Vec<SchemaTree>) -> Result<CompiledUnit> {
        info!("Compiling {} files with {} dependency trees", files.len(), dependencies.len());
        let trees = self.build_trees(&files).inspect_err(|e| self.report(ProgressMessage::Error(e.to_string())))?;

        let mut unit = CompilationUnit::new(trees, dependencies)?;
        let outcome = self.check_unit(&mut unit);
        if let Err(e) = &outcome {
            self.report(ProgressMessage::Error(e.to_string()));
        }
        let (report, holders_checked) = outcome?;

        Ok(CompiledUnit {
            files: unit.files,
            universe: unit.universe,
            report,
            holders_checked,
        })
    }

    fn build_trees(&self, files: &[SourceFile]) -> Result<Vec<SchemaTree>> {
        self.report(ProgressMessage::Started {
            phase: ProgressPhase::Building,
            total: files.len(),
        });
        let done = AtomicUsize::new(0);
        let results: Vec<_> = files
            .par_iter()
            .map(|file| {
                let result = build_tree(&file.path, &file.events);
                self.report(ProgressMessage::Progress {
                    phase: ProgressPhase::Building,
                    current: done.fetch_add(1, Ordering::Relaxed) + 1,
                    file: Some(file.path.clone()),
                });
                result
            })
            .collect();
        self.report(ProgressMessage::Finished {
            phase: ProgressPhase::Building,
        });

        // Input order decides which failure is reported
        let mut trees = Vec::with_capacity(results.len());
        for result in results {
            trees.push(result?);
        }
        Ok(trees)
    }

    fn check_unit(&self, unit: &mut CompilationUnit) -> Result<(LinkReport, usize)> {
        self.report(ProgressMessage::Started {
            phase: ProgressPhase::Linking,
            total: unit.universe.len(),
        });
        let report = unit.link()?;
        self.report(ProgressMessage::Finished {
            phase: ProgressPhase::Linking,
        });

        self.report(ProgressMessage::Started {
            phase: ProgressPhase::Checking,
            total: unit.universe.len(),
        });
        let holders = unit.check_collisions()?;
        self.report(ProgressMessage::Finished {
            phase: ProgressPhase::Checking,
        });
        info!("Linked {} trees, checked {} holders", unit.universe.len(), holders);
        Ok((report, holders))
    }
}
