//! Click notifications leaving the diagram.

use crate::model::{NodeId, PackedNode};

pub const FILE_CLICKED: &str = "problem_areas.file.clicked";
pub const DIRECTORY_CLICKED: &str = "problem_areas.directory.clicked";

/// What the diagram reports about a clicked bubble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeClick {
    /// The clicked node in the tree that was current at click time.
    pub node: NodeId,
    pub path: String,
    pub is_file: bool,
    pub repo_link: Option<String>,
    pub has_children: bool,
}

impl From<&PackedNode> for NodeClick {
    fn from(node: &PackedNode) -> Self {
        Self {
            node: node.id,
            path: node.path.clone(),
            is_file: node.is_file(),
            repo_link: node.repo_link.clone(),
            has_children: node.has_children(),
        }
    }
}

/// Fetches and shows per-file details (ownership, change history, complexity
/// trend) for a path in the given panel.
pub trait DetailPanel {
    fn show_details(&mut self, path: &str, target_panel_id: &str, is_file: bool);
}

/// Fire-and-forget usage counting.
pub trait Telemetry {
    fn count(&mut self, event: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn count(&mut self, _event: &str) {}
}

/// Records usage events in the log instead of sending them anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn count(&mut self, event: &str) {
        tracing::info!(target: "bubblemap::telemetry", event, "count");
    }
}

/// Receivers of a click, bundled so hosts can wire them once.
pub trait ClickSink {
    fn node_clicked(&mut self, click: &NodeClick);
    fn detail_panel(&mut self) -> &mut dyn DetailPanel;
    fn telemetry(&mut self) -> &mut dyn Telemetry;
}

/// What a click did, for hosts that need to react (e.g. keep repainting).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Clicked the bubble that already has focus.
    Ignored,
    /// Clicked outside every bubble: the diagram zooms back out to the root.
    Background,
    /// A directory: the diagram zooms into it.
    Zoomed(NodeClick),
    /// A leaf: details were requested.
    Detailed(NodeClick),
}

/// Sink that records everything it receives; handy for hosts without a
/// detail view and for tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub clicks: Vec<NodeClick>,
    pub details: Vec<(String, String, bool)>,
    pub events: Vec<String>,
}

impl DetailPanel for RecordingSink {
    fn show_details(&mut self, path: &str, target_panel_id: &str, is_file: bool) {
        self.details
            .push((path.to_string(), target_panel_id.to_string(), is_file));
    }
}

impl Telemetry for RecordingSink {
    fn count(&mut self, event: &str) {
        self.events.push(event.to_string());
    }
}

impl ClickSink for RecordingSink {
    fn node_clicked(&mut self, click: &NodeClick) {
        self.clicks.push(click.clone());
    }

    fn detail_panel(&mut self) -> &mut dyn DetailPanel {
        self
    }

    fn telemetry(&mut self) -> &mut dyn Telemetry {
        self
    }
}
