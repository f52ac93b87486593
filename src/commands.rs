use crate::{emit_failure, emit_success, OutputMode};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use yangc::builder::SourceFile;
use yangc::config::{load_config, write_config, OutputSettings, YangcConfig};
use yangc::schema::{NodeId, NodeOrigin, SchemaTree};
use yangc::ui::{
    banner, header, human_bytes, module_table, section, stats_table, status, success, tree_line, Icons,
    ProgressManager,
};
use yangc::{CompiledUnit, Compiler, SchemaSerializer};

/// Inputs shared by `compile` and `check`
#[derive(clap::Args, Debug)]
pub struct UnitArgs {
    /// Source files or directories (default: `sources` from yangc.toml)
    pub paths: Vec<PathBuf>,

    /// Artifact of a previously compiled unit; repeatable
    #[arg(short = 'd', long = "dependency")]
    pub dependencies: Vec<PathBuf>,

    /// Gitignore-style pattern skipped in directories; repeatable
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl UnitArgs {
    fn into_config(self) -> anyhow::Result<YangcConfig> {
        let file = load_config(self.config.as_deref())?;
        if let (Some(path), None) = (&self.config, &file) {
            anyhow::bail!("config file {} not found", path.display());
        }
        let flags = YangcConfig {
            sources: self.paths,
            dependencies: self.dependencies,
            exclude: self.exclude,
            ..Default::default()
        };
        Ok(flags.merged_over(&file.unwrap_or_default()))
    }
}

struct Inputs {
    files: Vec<SourceFile>,
    dependencies: Vec<SchemaTree>,
}

fn load_inputs(compiler: &Compiler, config: &YangcConfig) -> yangc::Result<Inputs> {
    Ok(Inputs {
        files: compiler.load_sources(&config.sources, &config.exclude)?,
        dependencies: compiler.load_dependencies(&config.dependencies)?,
    })
}

/// Run one batch with a progress display in human mode
fn compile_unit(
    command: &str,
    config: &YangcConfig,
    settings: Option<&OutputSettings>,
    output_mode: OutputMode,
) -> anyhow::Result<(CompiledUnit, Option<yangc::serializer::PublishedArtifact>)> {
    if config.sources.is_empty() {
        anyhow::bail!("no sources given (pass paths or set `sources` in yangc.toml)");
    }

    let loader = Compiler::new();
    let inputs = match load_inputs(&loader, config) {
        Ok(inputs) => inputs,
        Err(e) => {
            emit_failure(output_mode, command, &e)?;
            anyhow::bail!("{} failed", command);
        }
    };

    if output_mode.is_human() {
        header(&format!(
            "Compiling {} files against {} dependency trees",
            inputs.files.len(),
            inputs.dependencies.len()
        ));
    }

    let started = Instant::now();
    let total = inputs.files.len();
    let (mut progress, compiler) = if output_mode.is_human() {
        let (progress, tx) = ProgressManager::new(total);
        (Some(progress), loader.with_progress(tx))
    } else {
        (None, loader)
    };

    let outcome = match settings {
        Some(settings) => compiler
            .compile_and_publish(inputs.files, inputs.dependencies, settings)
            .map(|(compiled, published)| (compiled, Some(published))),
        None => compiler
            .compile(inputs.files, inputs.dependencies)
            .map(|compiled| (compiled, None)),
    };
    drop(compiler);

    match outcome {
        Ok((compiled, published)) => {
            if let Some(progress) = progress.as_mut() {
                let trees = compiled.universe.translatable().count();
                progress.finish_with_summary(started.elapsed(), total, trees, &compiled.report);
            }
            Ok((compiled, published))
        }
        Err(e) => {
            if let Some(progress) = progress.as_mut() {
                progress.join();
                progress.clear();
            }
            emit_failure(output_mode, command, &e)?;
            anyhow::bail!("{} failed", command);
        }
    }
}

fn print_unit(compiled: &CompiledUnit) {
    section("Modules");
    println!("{}", module_table(&compiled.stats()));

    section("Links");
    let report = &compiled.report;
    println!(
        "{}",
        stats_table(&[
            ("Bound intra-file", &report.intra_bound.to_string()),
            ("Bound cross-unit", &report.cross_bound.to_string()),
            ("Uses expanded", &report.expansions.to_string()),
            ("Augments merged", &report.augments.to_string()),
            ("Deviations bound", &report.deviations.to_string()),
            ("Holders checked", &compiled.holders_checked.to_string()),
        ])
    );
}

fn unit_json(compiled: &CompiledUnit) -> serde_json::Value {
    let modules: Vec<&str> = compiled.universe.translatable().map(|t| t.name.as_str()).collect();
    serde_json::json!({
        "files": compiled.files,
        "modules": modules,
        "report": compiled.report,
        "holders_checked": compiled.holders_checked,
    })
}

pub fn run_compile(
    unit: UnitArgs,
    output_dir: Option<PathBuf>,
    metadata_dir: Option<PathBuf>,
    artifact_name: Option<String>,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let config = YangcConfig {
        output_dir,
        metadata_dir,
        artifact_name,
        ..Default::default()
    }
    .merged_over(&unit.into_config()?);

    let settings = match config.output_settings() {
        Ok(settings) => settings,
        Err(e) => {
            emit_failure(output_mode, "compile", &yangc::Error::from(e))?;
            anyhow::bail!("compile failed");
        }
    };

    let (compiled, published) = compile_unit("compile", &config, Some(&settings), output_mode)?;

    if output_mode.is_human() {
        print_unit(&compiled);
        if let Some(published) = &published {
            section("Published");
            status(Icons::PACKAGE, "Artifact", &published.artifact.display().to_string());
            status(Icons::FILE, "Manifest", &published.manifest.display().to_string());
            status(Icons::STATS, "Size", &human_bytes(published.bytes));
        }
    } else {
        let mut data = unit_json(&compiled);
        data["published"] = serde_json::to_value(&published)?;
        emit_success(output_mode, "compile", data)?;
    }
    Ok(())
}

pub fn run_check(unit: UnitArgs, output_mode: OutputMode) -> anyhow::Result<()> {
    let config = unit.into_config()?;
    let (compiled, _) = compile_unit("check", &config, None, output_mode)?;

    if output_mode.is_human() {
        print_unit(&compiled);
        success("No errors found");
    } else {
        emit_success(output_mode, "check", unit_json(&compiled))?;
    }
    Ok(())
}

fn origin_note(tree: &SchemaTree, id: NodeId) -> String {
    let node = tree.node(id);
    let mut notes = Vec::new();
    if !node.types.is_empty() {
        let types: Vec<String> = node.types.iter().map(|t| t.to_string()).collect();
        notes.push(format!("type {}", types.join(" | ")));
    }
    match &node.origin {
        NodeOrigin::Declared => {}
        NodeOrigin::Expanded { grouping, .. } => notes.push(format!("from {}", grouping)),
        NodeOrigin::Augmented { augment } => notes.push(format!("augmented by {}", augment)),
    }
    if notes.is_empty() {
        String::new()
    } else {
        format!("({})", notes.join(", "))
    }
}

fn print_tree(tree: &SchemaTree, id: NodeId, depth: usize) {
    let node = tree.node(id);
    tree_line(depth, node.kind.as_str(), &node.identifier, &origin_note(tree, id));
    for child in tree.children(id) {
        print_tree(tree, *child, depth + 1);
    }
}

pub fn run_show(artifact: &Path, module: Option<&str>, output_mode: OutputMode) -> anyhow::Result<()> {
    let trees = match SchemaSerializer::new().load(artifact) {
        Ok(trees) => trees,
        Err(e) => {
            emit_failure(output_mode, "show", &yangc::Error::from(e))?;
            anyhow::bail!("show failed");
        }
    };

    let selected: Vec<&SchemaTree> = trees
        .iter()
        .filter(|t| module.is_none_or(|m| t.name == m))
        .collect();
    if let (Some(module), true) = (module, selected.is_empty()) {
        anyhow::bail!("module {} is not in {}", module, artifact.display());
    }

    if output_mode.is_human() {
        for tree in selected {
            section(&format!("{} ({})", tree.name, tree.file));
            print_tree(tree, tree.root(), 0);
        }
    } else {
        emit_success(output_mode, "show", serde_json::to_value(&selected)?)?;
    }
    Ok(())
}

pub fn run_init(path: &Path, force: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    write_config(path, &YangcConfig::starter(), force)?;
    if output_mode.is_human() {
        success(&format!("Wrote {}", path.display()));
    } else {
        emit_success(output_mode, "init", serde_json::json!({ "path": path }))?;
    }
    Ok(())
}

pub fn run_version(output_mode: OutputMode) -> anyhow::Result<()> {
    if output_mode.is_human() {
        banner(
            &format!("{}", "Yangc".bold().style(yangc::ui::theme().info.clone())),
            &format!("Version {}", env!("CARGO_PKG_VERSION").bold()),
        );
    } else {
        let data = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        });
        emit_success(output_mode, "version", data)?;
    }
    Ok(())
}
