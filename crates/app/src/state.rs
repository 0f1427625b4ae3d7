use anyhow::Context;
use bubblemap_core::config::LayoutConfig;
use bubblemap_core::events::{ClickSink, DetailPanel, NodeClick, Telemetry, TracingTelemetry};
use bubblemap_core::scanner::{ScanMsg, Scanner};
use bubblemap_core::{git, search, HierarchicalPackLayout, NodeId, Progress, TreeDataset};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// What survives a restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub last_dataset: Option<PathBuf>,
    pub last_root: Option<PathBuf>,
}

/// Receives clicks from the diagram and keeps what the side panel shows.
#[derive(Debug, Default)]
pub struct Details {
    pub selected: Option<NodeClick>,
    /// Path and panel id of the last detail request.
    pub requested: Option<(String, String)>,
    telemetry: TracingTelemetry,
}

impl DetailPanel for Details {
    fn show_details(&mut self, path: &str, target_panel_id: &str, is_file: bool) {
        tracing::debug!(path, target_panel_id, is_file, "details requested");
        self.requested = Some((path.to_string(), target_panel_id.to_string()));
    }
}

impl ClickSink for Details {
    fn node_clicked(&mut self, click: &NodeClick) {
        self.selected = Some(click.clone());
    }

    fn detail_panel(&mut self) -> &mut dyn DetailPanel {
        self
    }

    fn telemetry(&mut self) -> &mut dyn Telemetry {
        &mut self.telemetry
    }
}

pub struct AppState {
    pub settings: Settings,
    pub config: LayoutConfig,
    pub layout: HierarchicalPackLayout,
    pub dataset: Option<TreeDataset>,
    pub cancel: Arc<AtomicBool>,
    pub scan_rx: Option<Receiver<ScanMsg>>,
    pub progress: Progress,
    pub search: String,
    pub hits: Vec<NodeId>,
    pub details: Details,
    pub status: Option<String>,
}

impl AppState {
    pub fn new(config: LayoutConfig, settings: Settings) -> Self {
        Self {
            settings,
            layout: HierarchicalPackLayout::new(config.clone()),
            config,
            dataset: None,
            cancel: Arc::new(AtomicBool::new(false)),
            scan_rx: None,
            progress: Progress::default(),
            search: String::new(),
            hits: Vec::new(),
            details: Details::default(),
            status: None,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_rx.is_some()
    }

    pub fn start_scan(&mut self, root: PathBuf) {
        self.settings.last_root = Some(root.clone());
        self.progress = Progress::default();
        self.status = None;
        self.cancel.store(false, Ordering::Relaxed);

        let mut options = self.config.scan.clone();
        if options.repo_url.is_none() {
            options.repo_url = git::origin_url(&root);
        }

        let (tx, rx): (Sender<ScanMsg>, Receiver<ScanMsg>) = unbounded();
        self.scan_rx = Some(rx);
        let cancel = self.cancel.clone();

        std::thread::spawn(move || {
            let scanner = Scanner::new(cancel);
            scanner.scan(root, &options, tx);
        });
    }

    pub fn cancel_scan(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn load_dataset(&mut self, path: &Path) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let dataset = TreeDataset::from_json(&text).with_context(|| format!("parsing {}", path.display()))?;
        self.settings.last_dataset = Some(path.to_path_buf());
        self.show(dataset);
        Ok(())
    }

    pub fn save_dataset(&self, path: &Path) -> anyhow::Result<()> {
        let dataset = self.dataset.as_ref().context("nothing to save yet")?;
        let text = serde_json::to_string_pretty(dataset)?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Lays out a new dataset. An empty one keeps the current diagram.
    pub fn show(&mut self, dataset: TreeDataset) {
        if self.layout.build(&dataset).is_none() {
            self.status = Some("No problem areas found".into());
            return;
        }
        self.dataset = Some(dataset);
        self.details = Details::default();
        self.refresh_search();
    }

    pub fn refresh_search(&mut self) {
        self.hits = match self.layout.tree() {
            Some(tree) if !self.search.trim().is_empty() => search::find(tree, self.search.trim(), 12),
            _ => Vec::new(),
        };
    }

    /// Jumps to a search hit: directories get focus, files zoom to their
    /// directory and open their details.
    pub fn reveal(&mut self, id: NodeId, slow_motion: bool) {
        let Some(node) = self.layout.node(id) else {
            return;
        };
        let now = Instant::now();
        if node.has_children() {
            self.layout.click(id, now, slow_motion, &mut self.details);
        } else {
            if let Some(parent) = node.parent {
                self.layout.focus(parent, now, slow_motion);
            }
            self.layout.click(id, now, slow_motion, &mut self.details);
        }
    }
}
