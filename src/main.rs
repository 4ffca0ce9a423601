use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use docpatch::blocks::{parse_document_blocks, validate_block, BlockValidation, CodeRef};
use docpatch::config::{discover, load_file, EngineConfig};
use docpatch::edit::read_text;
use docpatch::engine::{Engine, TextPatchRequest};
use docpatch::json_patch::{JsonPatchOp, JsonPatchRequest, ToolStatus};
use docpatch::patch::{render_raw_diff, FileReader};
use docpatch::pending::{
    collect_defined_ids, find_pending_references, mark_pending_references, resolve_pending_references,
};
use docpatch::safety::FsReader;
use docpatch::{atomic_write, validate_document};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "docpatch")]
#[command(about = "Text-anchored patching for documents with embedded JSON blocks", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine config file (defaults to docpatch.toml in the workspace, if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root that files and range references resolve against
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a text patch (raw or headered) to a document
    Apply {
        /// Document to patch, relative to the workspace
        file: String,

        /// Patch file, or '-' for stdin
        #[arg(short, long)]
        patch: PathBuf,

        /// JSON file listing available codes as [{"id", "name"}]
        #[arg(long)]
        codes: Option<PathBuf>,

        /// Acting party recorded on changed blocks (overrides config)
        #[arg(long)]
        actor: Option<String>,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Write the result back (otherwise print it)
        #[arg(long)]
        write: bool,
    },

    /// Validate the structured blocks of one or more documents
    Validate {
        files: Vec<String>,

        /// Previous version, for immutable-field and identifier checks
        #[arg(long)]
        original: Option<PathBuf>,

        #[arg(long)]
        codes: Option<PathBuf>,
    },

    /// Apply JSON patch operations to one block of a document
    JsonPatch {
        file: String,

        /// Block language, e.g. attributes or callout
        #[arg(short, long)]
        language: String,

        /// Block id, required for repeatable block kinds
        #[arg(long)]
        id: Option<String>,

        /// JSON array of operations, or '-' for stdin
        #[arg(short, long)]
        ops: PathBuf,

        #[arg(long)]
        codes: Option<PathBuf>,

        #[arg(short, long)]
        diff: bool,

        #[arg(long)]
        write: bool,
    },

    /// List the fenced blocks of a document
    Blocks { file: String },

    /// Print a raw patch turning OLD into NEW
    Diff { old: PathBuf, new: PathBuf },

    /// Report pending #[id] references across a directory of documents
    Refs {
        /// Directory to scan (defaults to the workspace)
        dir: Option<PathBuf>,

        /// Strip markers whose id is now defined
        #[arg(long)]
        resolve: bool,

        /// Mark undefined ids in string values of this field as pending (repeatable)
        #[arg(long, value_name = "FIELD")]
        mark: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let root = resolve_workspace(cli.workspace.as_deref())?;
    let loaded = match cli.config.as_deref() {
        Some(path) => load_file(path)?,
        None => discover(&root)?,
    };
    let root = match cli.workspace {
        Some(_) => root,
        None => loaded.workspace_root(&root)?,
    };
    let config = loaded.config;

    match cli.command {
        Commands::Apply {
            file,
            patch,
            codes,
            actor,
            diff,
            write,
        } => {
            let mut config = config;
            if let Some(actor) = actor {
                config.actor.name = actor;
            }
            cmd_apply(config, &root, &file, &patch, codes.as_deref(), diff, write)
        }
        Commands::Validate {
            files,
            original,
            codes,
        } => cmd_validate(&root, &files, original.as_deref(), codes.as_deref()),
        Commands::JsonPatch {
            file,
            language,
            id,
            ops,
            codes,
            diff,
            write,
        } => cmd_json_patch(
            config,
            &root,
            JsonPatchRequest {
                file_path: file,
                language,
                block_id: id,
                operations: serde_json::from_str::<Vec<JsonPatchOp>>(&read_input(&ops)?)
                    .context("operations must be a JSON array of patch operations")?,
                available_codes: load_codes(codes.as_deref())?,
            },
            diff,
            write,
        ),
        Commands::Blocks { file } => cmd_blocks(&root, &file),
        Commands::Diff { old, new } => cmd_diff(&old, &new),
        Commands::Refs { dir, resolve, mark } => cmd_refs(dir.as_deref().unwrap_or(&root), resolve, &mark),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::from_default_env();
    if env::var_os("RUST_LOG").is_none() {
        builder.filter_level(level);
    }
    builder.init();
}

/// Explicit --workspace, else the current directory.
fn resolve_workspace(cli_workspace: Option<&Path>) -> Result<PathBuf> {
    let path = match cli_workspace {
        Some(path) => path.to_path_buf(),
        None => env::current_dir()?,
    };
    path.canonicalize()
        .with_context(|| format!("workspace not found: {}", path.display()))
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_codes(path: Option<&Path>) -> Result<Vec<CodeRef>> {
    match path {
        Some(path) => serde_json::from_str(&read_input(path)?)
            .with_context(|| format!("invalid codes file {}", path.display())),
        None => Ok(Vec::new()),
    }
}

fn read_document(reader: &FsReader, file: &str) -> Result<String> {
    reader
        .read_file(file)
        .with_context(|| format!("cannot read {file} inside workspace {}", reader.guard().workspace_root().display()))
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {file} (original)").dimmed());
    println!("{}", format!("+++ {file} (patched)").dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn write_document(reader: &FsReader, file: &str, content: &str) -> Result<()> {
    let target = reader.guard().workspace_root().join(file);
    if target.exists() {
        reader.guard().validate_path(&target)?;
    } else if let Some(parent) = target.parent() {
        reader.guard().validate_path(parent)?;
    }
    atomic_write(&target, content)?;
    Ok(())
}

fn cmd_apply(
    config: EngineConfig,
    root: &Path,
    file: &str,
    patch: &Path,
    codes: Option<&Path>,
    show_diff: bool,
    write: bool,
) -> Result<()> {
    let reader = FsReader::new(root)?;
    let mut request = TextPatchRequest::new(file, read_input(patch)?);
    request.available_codes = load_codes(codes)?;

    let mut engine = Engine::new(config);
    let output = match engine.apply_text_patch(&request, &reader) {
        Ok(output) => output,
        Err(err) => {
            eprintln!("{} {}: {}", "✗".red(), file, err);
            std::process::exit(1);
        }
    };

    if show_diff {
        display_diff(file, &output.original, &output.content);
    }
    if let Some(summary) = output.summary() {
        println!("{}", summary.cyan());
    }

    if !output.changed() {
        println!("{} {}: No changes", "⊘".cyan(), file);
        return Ok(());
    }
    if write {
        write_document(&reader, file, &output.content)?;
        println!(
            "{} {}: {} hunk(s) applied",
            "✓".green(),
            file,
            output.hunks_applied
        );
    } else if !show_diff {
        print!("{}", output.content);
    }
    Ok(())
}

fn cmd_validate(root: &Path, files: &[String], original: Option<&Path>, codes: Option<&Path>) -> Result<()> {
    let reader = FsReader::new(root)?;
    let codes = load_codes(codes)?;
    let original = original.map(read_input).transpose()?;

    let mut failed = 0;
    for file in files {
        let content = read_document(&reader, file)?;
        match validate_document(&content, original.as_deref(), &codes, None) {
            Ok(blocks) => println!("{} {}: {} block(s) valid", "✓".green(), file, blocks.len()),
            Err(errors) => {
                failed += 1;
                eprintln!("{} {}:", "✗".red(), file);
                for issue in &errors.issues {
                    eprintln!("  - {issue}");
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} document(s) failed validation");
    }
    Ok(())
}

fn cmd_json_patch(
    config: EngineConfig,
    root: &Path,
    request: JsonPatchRequest,
    show_diff: bool,
    write: bool,
) -> Result<()> {
    let reader = FsReader::new(root)?;
    let mut engine = Engine::new(config);
    let result = engine.patch_json_block(&request, &reader);

    let marker = match result.status {
        ToolStatus::Ok => "✓".green(),
        ToolStatus::Partial => "~".yellow(),
        ToolStatus::Error => "✗".red(),
    };
    println!("{} {}", marker, result.output);
    if let Some(message) = &result.message {
        if result.status != ToolStatus::Error {
            eprintln!("{}", message.yellow());
        }
    }

    for mutation in &result.mutations {
        if show_diff {
            let before = reader.read_file(&mutation.path).unwrap_or_default();
            display_diff(&mutation.path, &before, &mutation.content);
        }
        if write {
            write_document(&reader, &mutation.path, &mutation.content)?;
        }
    }

    if result.status == ToolStatus::Error {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_blocks(root: &Path, file: &str) -> Result<()> {
    let reader = FsReader::new(root)?;
    let content = read_document(&reader, file)?;
    let (blocks, failures) = parse_document_blocks(&content, None);

    println!("{}", format!("Blocks in {file}").bold());
    for parsed in &blocks {
        let id = parsed.identity().unwrap_or_else(|| "-".to_string());
        let status = match validate_block(parsed.kind, &parsed.value) {
            BlockValidation::Valid { .. } => "valid".green(),
            BlockValidation::Invalid { issues, .. } => format!("{} issue(s)", issues.len()).red(),
        };
        println!(
            "  {:<12} {:<24} bytes {}..{}  {}",
            parsed.kind.language(),
            id,
            parsed.block.start,
            parsed.block.end,
            status
        );
    }
    for failure in &failures {
        println!("  {}", failure.to_string().red());
    }
    Ok(())
}

fn cmd_diff(old: &Path, new: &Path) -> Result<()> {
    let old = read_input(old)?;
    let new = read_input(new)?;
    print!("{}", render_raw_diff(&old, &new));
    Ok(())
}

fn cmd_refs(dir: &Path, resolve: bool, mark: &[String]) -> Result<()> {
    let mut documents = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_entry(|e| {
        e.depth() == 0 || !e.file_name().to_str().is_some_and(|n| n.starts_with('.'))
    }) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().and_then(|s| s.to_str()) == Some("md") {
            let content = read_text(entry.path())?;
            documents.push((entry.path().to_path_buf(), content));
        }
    }
    documents.sort();

    let defined = collect_defined_ids(documents.iter().map(|(_, c)| c.as_str()));
    if !mark.is_empty() {
        let fields: Vec<&str> = mark.iter().map(String::as_str).collect();
        for (path, content) in &mut documents {
            let marked = mark_pending_references(content, &fields, &defined);
            if marked != *content {
                log::info!("marked pending references in {}", path.display());
                atomic_write(path, &marked)?;
                *content = marked;
            }
        }
    }

    let mut pending = 0;
    let mut resolved = 0;
    for (path, content) in &documents {
        for reference in find_pending_references(content) {
            if defined.contains(&reference.id) {
                resolved += 1;
                println!("{} {}: #[{}] now defined", "✓".green(), path.display(), reference.id);
            } else {
                pending += 1;
                println!("{} {}: #[{}] pending", "⊘".cyan(), path.display(), reference.id);
            }
        }
        if resolve {
            let (updated, stripped) = resolve_pending_references(content, &defined);
            if !stripped.is_empty() {
                atomic_write(path, &updated)?;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} pending", format!("{}", pending).cyan());
    println!("  {} resolvable", format!("{}", resolved).green());
    Ok(())
}
