use anyhow::Context;
use bubblemap_core::config::LayoutConfig;
use bubblemap_core::human::group_thousands;
use bubblemap_core::scanner::{ScanMsg, Scanner};
use bubblemap_core::surface::{SurfaceRegistry, SvgSurface};
use bubblemap_core::{export, git, search, HierarchicalPackLayout, NodeId, Progress, TreeDataset};
use clap::{Parser, Subcommand};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DIAGRAM_ID: &str = "problem-areas-diagram";

#[derive(Parser, Debug)]
#[command(name = "bubblemap", about = "Problem-areas bubble map generator")]
struct Cli {
    /// Config file (default: bubblemap.config.json in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a checkout into a tree dataset
    Scan {
        /// Root of the repository to scan
        root: PathBuf,
        /// Output dataset path (stdout when omitted)
        #[arg(short, long)]
        json: Option<PathBuf>,
        /// Web URL used for blame links (default: the origin remote)
        #[arg(long)]
        repo_url: Option<String>,
        /// Days of history to count changes over
        #[arg(long)]
        days: Option<u32>,
    },
    /// Render a dataset to SVG
    Render {
        dataset: PathBuf,
        #[arg(long)]
        svg: PathBuf,
        /// Zoom into the node with this path (or best fuzzy match) first
        #[arg(long)]
        focus: Option<String>,
    },
    /// Export the packed circles
    Export {
        dataset: PathBuf,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Fuzzy-find files and directories in a dataset
    Find {
        dataset: PathBuf,
        query: String,
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let config = LayoutConfig::resolve(cli.config.as_deref(), &cwd).context("loading config")?;

    match cli.command {
        Commands::Scan {
            root,
            json,
            repo_url,
            days,
        } => scan(config, root, json, repo_url, days),
        Commands::Render { dataset, svg, focus } => {
            let layout = laid_out(config, &dataset, focus.as_deref())?;
            let mut registry = SurfaceRegistry::new();
            registry.insert(DIAGRAM_ID, SvgSurface::new(layout.config().width));
            layout.render_to(&mut registry, DIAGRAM_ID)?;
            let doc = registry.get(DIAGRAM_ID)?.finish();
            std::fs::write(&svg, doc).with_context(|| format!("writing {}", svg.display()))?;
            println!("Wrote {}", svg.display());
            Ok(())
        }
        Commands::Export { dataset, csv, json } => {
            if csv.is_none() && json.is_none() {
                anyhow::bail!("nothing to export: pass --csv and/or --json");
            }
            let layout = laid_out(config, &dataset, None)?;
            let tree = layout.tree().context("dataset has no tree")?;
            if let Some(path) = csv {
                let file = std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
                export::to_csv(tree, BufWriter::new(file))?;
                println!("Wrote {} ({} circles)", path.display(), group_thousands(tree.len() as f64));
            }
            if let Some(path) = json {
                let text = serde_json::to_string_pretty(&export::to_json(tree))?;
                std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
            Ok(())
        }
        Commands::Find { dataset, query, limit } => {
            let layout = laid_out(config, &dataset, None)?;
            let tree = layout.tree().context("dataset has no tree")?;
            let hits = search::find(tree, &query, limit);
            if hits.is_empty() {
                println!("No matches for {query:?}");
            }
            for node in hits.into_iter().filter_map(|id| tree.get(id)) {
                let shown = if node.path.is_empty() { &node.name } else { &node.path };
                println!(
                    "{shown}\tcomplexity {}\tchanges {}",
                    group_thousands(node.value),
                    group_thousands(node.changes)
                );
            }
            Ok(())
        }
    }
}

fn scan(
    mut config: LayoutConfig,
    root: PathBuf,
    out: Option<PathBuf>,
    repo_url: Option<String>,
    days: Option<u32>,
) -> anyhow::Result<()> {
    if !root.is_dir() {
        anyhow::bail!("not a directory: {}", root.display());
    }
    if let Some(days) = days {
        config.scan.days = days;
    }
    config.scan.repo_url = repo_url
        .or(config.scan.repo_url)
        .or_else(|| git::origin_url(&root));
    if !git::is_repository(&root) {
        tracing::warn!(root = %root.display(), "not a git repository, every file counts one change");
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = crossbeam_channel::unbounded::<ScanMsg>();
    let scanner = Scanner::new(cancel);
    let options = config.scan.clone();
    std::thread::spawn(move || scanner.scan(root, &options, tx));

    let mut progress = Progress::default();
    let mut dataset = None;
    while let Ok(msg) = rx.recv() {
        match msg {
            ScanMsg::Progress(p) => progress = p,
            ScanMsg::File { path, complexity } => tracing::trace!(path = %path, complexity, "measured"),
            ScanMsg::Error(e) => tracing::warn!(error = %e, "scan"),
            ScanMsg::Done(d) => {
                dataset = Some(d);
                break;
            }
        }
    }
    let dataset: TreeDataset = dataset.context("scan ended without a result")?;
    let text = serde_json::to_string_pretty(&dataset)?;
    match out {
        Some(path) => {
            std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    eprintln!(
        "Scanned {} files, {} skipped as too complex",
        group_thousands(progress.scanned as f64),
        group_thousands(progress.skipped as f64)
    );
    Ok(())
}

/// Loads a dataset and lays it out, optionally zoomed into `focus`.
fn laid_out(config: LayoutConfig, path: &Path, focus: Option<&str>) -> anyhow::Result<HierarchicalPackLayout> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let dataset = TreeDataset::from_json(&text).with_context(|| format!("parsing {}", path.display()))?;
    let mut layout = HierarchicalPackLayout::new(config);
    if layout.build(&dataset).is_none() {
        anyhow::bail!("{} has no tree to draw", path.display());
    }
    if let Some(query) = focus {
        let id = focus_target(&layout, query).with_context(|| format!("no node matches {query:?}"))?;
        layout.focus(id, Instant::now(), false);
        layout.settle();
    }
    Ok(layout)
}

fn focus_target(layout: &HierarchicalPackLayout, query: &str) -> Option<NodeId> {
    let tree = layout.tree()?;
    tree.find_by_path(query)
        .map(|n| n.id)
        .or_else(|| search::find(tree, query, 1).into_iter().next())
}
