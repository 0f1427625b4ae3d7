//! The zoomable problem-areas diagram.
//!
//! [`HierarchicalPackLayout`] owns one packed tree plus its zoom state. Circle
//! positions never change after [`build`](HierarchicalPackLayout::build):
//! zooming only changes the viewport they are projected through. A focus
//! change starts a [`Transition`] that hosts advance with
//! [`tick`](HierarchicalPackLayout::tick) once per frame.

use std::time::Instant;

use crate::color::{Color, DepthShade, HeatMapper};
use crate::config::LayoutConfig;
use crate::events::{ClickOutcome, ClickSink, NodeClick, DIRECTORY_CLICKED, FILE_CLICKED};
use crate::human::group_thousands;
use crate::model::{NodeId, PackedNode, PackedTree, TreeDataset};
use crate::pack::pack;
use crate::surface::{CircleShape, DrawSurface, LabelShape, SurfaceRegistry};
use crate::zoom::{ease_cubic_in_out, interpolate_zoom, LabelFade, Transition, View, ZoomState};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelState {
    pub opacity: f64,
    pub visible: bool,
}

impl LabelState {
    const SHOWN: Self = Self {
        opacity: 1.0,
        visible: true,
    };
    const HIDDEN: Self = Self {
        opacity: 0.0,
        visible: false,
    };
}

#[derive(Debug)]
pub struct HierarchicalPackLayout {
    config: LayoutConfig,
    depth_shade: DepthShade,
    heat: HeatMapper,
    tree: Option<PackedTree>,
    zoom: Option<ZoomState>,
    labels: Vec<LabelState>,
    transition: Option<Transition>,
}

impl Default for HierarchicalPackLayout {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl HierarchicalPackLayout {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            depth_shade: config.depth_shade(),
            heat: config.heat(0.0, 0.0),
            config,
            tree: None,
            zoom: None,
            labels: Vec::new(),
            transition: None,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Lays out a fresh dataset, replacing the current tree, focus, and any
    /// running transition. An empty dataset changes nothing and returns `None`.
    pub fn build(&mut self, dataset: &TreeDataset) -> Option<NodeId> {
        let Some(input) = dataset.root() else {
            tracing::debug!("empty tree, nothing to lay out");
            return None;
        };

        let tree = pack(input, &self.config.pack());
        let root = tree.root();
        let view = View::new(root.x, root.y, root.r * 2.0);
        let root_id = tree.root;

        self.heat = self.config.heat(dataset.min_changes, dataset.max_changes);
        self.labels = tree
            .nodes
            .iter()
            .map(|n| {
                if n.parent == Some(root_id) {
                    LabelState::SHOWN
                } else {
                    LabelState::HIDDEN
                }
            })
            .collect();
        self.zoom = Some(ZoomState { focus: root_id, view });
        if self.transition.take().is_some() {
            tracing::debug!("rebuild discarded a running transition");
        }
        tracing::debug!(nodes = tree.len(), "packed tree");
        self.tree = Some(tree);
        Some(root_id)
    }

    pub fn tree(&self) -> Option<&PackedTree> {
        self.tree.as_ref()
    }

    pub fn node(&self, id: NodeId) -> Option<&PackedNode> {
        self.tree.as_ref().and_then(|t| t.get(id))
    }

    pub fn zoom_state(&self) -> Option<ZoomState> {
        self.zoom
    }

    pub fn focus_id(&self) -> Option<NodeId> {
        self.zoom.map(|z| z.focus)
    }

    pub fn view(&self) -> Option<View> {
        self.zoom.map(|z| z.view)
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    pub fn label(&self, id: NodeId) -> Option<LabelState> {
        self.node(id)?;
        self.labels.get(id.index()).copied()
    }

    pub fn heat(&self) -> &HeatMapper {
        &self.heat
    }

    /// Directories are shaded by depth, leaves by change heat.
    pub fn color_for(&self, node: &PackedNode) -> Color {
        if node.has_children() {
            self.depth_shade.color(node.depth)
        } else {
            self.heat.color(node.changes)
        }
    }

    pub fn background_color(&self) -> Color {
        self.depth_shade.color(0)
    }

    /// Tooltip for a bubble: its path and summed size.
    pub fn hover_text(&self, id: NodeId) -> Option<String> {
        let node = self.node(id)?;
        let title = if node.path.is_empty() { &node.name } else { &node.path };
        Some(format!("{title}\n{}", group_thousands(node.value)))
    }

    /// Screen-space circle of a node under the current view, relative to the
    /// canvas center.
    pub fn screen_circle(&self, id: NodeId) -> Option<(f64, f64, f64)> {
        let node = self.node(id)?;
        let view = self.view()?;
        let (x, y) = view.project(self.config.width, node.x, node.y);
        Some((x, y, node.r * view.scale(self.config.width)))
    }

    /// Draws the current frame. Without a tree the surface is only cleared.
    pub fn render(&self, surface: &mut dyn DrawSurface) {
        surface.clear();
        let (Some(tree), Some(zoom)) = (&self.tree, self.zoom) else {
            return;
        };
        let width = self.config.width;
        let k = zoom.view.scale(width);

        surface.background(self.background_color());
        for node in tree.descendants().filter(|n| n.id != tree.root) {
            let (cx, cy) = zoom.view.project(width, node.x, node.y);
            surface.circle(CircleShape {
                node: node.id,
                cx,
                cy,
                r: node.r * k,
                fill: self.color_for(node),
                has_children: node.has_children(),
            });
        }
        for node in tree.descendants() {
            let (x, y) = zoom.view.project(width, node.x, node.y);
            let state = self.labels[node.id.index()];
            surface.label(LabelShape {
                node: node.id,
                x,
                y,
                text: node.label().to_string(),
                opacity: state.opacity,
                visible: state.visible,
                font_size: self.config.label_font_size,
            });
        }
    }

    /// Renders into the surface registered under `id`.
    pub fn render_to<S: DrawSurface>(&self, registry: &mut SurfaceRegistry<S>, id: &str) -> Result<()> {
        let surface = registry.get_mut(id)?;
        self.render(surface);
        Ok(())
    }

    /// Starts zooming to `id`. Returns whether a transition started; focusing
    /// the current focus or a node outside the tree does nothing.
    pub fn focus(&mut self, id: NodeId, now: Instant, slow_motion: bool) -> bool {
        let Some(tree) = &self.tree else {
            tracing::warn!(node = id.index(), "focus requested before a tree was built");
            return false;
        };
        let Some(target) = tree.get(id) else {
            tracing::warn!(node = id.index(), "focus requested for a node outside the current tree");
            return false;
        };
        let target_view = View::new(target.x, target.y, target.r * 2.0);
        let Some(zoom) = self.zoom else {
            return false;
        };
        if zoom.focus == id {
            return false;
        }

        // Continue from wherever an interrupted transition got to.
        self.apply_frame(now);
        let from = self.view().unwrap_or(zoom.view);

        let Some(tree) = &self.tree else {
            return false;
        };
        let fades: Vec<LabelFade> = tree
            .nodes
            .iter()
            .filter(|n| n.parent == Some(id) || self.labels[n.id.index()].visible)
            .map(|n| LabelFade {
                node: n.id,
                from: self.labels[n.id.index()].opacity,
                to: if n.parent == Some(id) { 1.0 } else { 0.0 },
            })
            .collect();
        for fade in fades.iter().filter(|f| !f.is_fade_out()) {
            self.labels[fade.node.index()].visible = true;
        }

        tracing::debug!(from = zoom.focus.index(), to = id.index(), slow_motion, "zoom");
        self.zoom = Some(ZoomState { focus: id, view: from });
        self.transition = Some(Transition {
            started: now,
            duration: self.config.duration(slow_motion),
            path: interpolate_zoom(from, target_view),
            previous_focus: zoom.focus,
            fades,
        });
        true
    }

    /// Zooms back out to the whole tree.
    pub fn zoom_out(&mut self, now: Instant, slow_motion: bool) -> bool {
        match self.tree.as_ref().map(|t| t.root) {
            Some(root) => self.focus(root, now, slow_motion),
            None => false,
        }
    }

    /// Advances the running transition to `now`. Returns `true` while more
    /// frames are needed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(transition) = &self.transition else {
            return false;
        };
        if transition.is_finished(now) {
            self.settle();
            return false;
        }
        self.apply_frame(now);
        true
    }

    /// Jumps to the end of the running transition, if any.
    pub fn settle(&mut self) {
        let Some(transition) = self.transition.take() else {
            return;
        };
        let focus = self.focus_id();
        if let Some(zoom) = self.zoom.as_mut() {
            zoom.view = transition.path.target();
        }
        let tree = self.tree.as_ref();
        for fade in &transition.fades {
            let label = &mut self.labels[fade.node.index()];
            label.opacity = fade.to;
            let parent = tree.and_then(|t| t.get(fade.node)).and_then(|n| n.parent);
            if parent != focus {
                label.visible = false;
            }
        }
        tracing::debug!(previous = transition.previous_focus.index(), "zoom settled");
    }

    fn apply_frame(&mut self, now: Instant) {
        let Some(transition) = &self.transition else {
            return;
        };
        let t = ease_cubic_in_out(transition.progress(now));
        if let Some(zoom) = self.zoom.as_mut() {
            zoom.view = transition.view_at(now);
        }
        for fade in &transition.fades {
            self.labels[fade.node.index()].opacity = fade.at(t);
        }
    }

    /// Deepest non-root node under a screen point (relative to the canvas
    /// center), or `None` for the background.
    pub fn node_at(&self, sx: f64, sy: f64) -> Option<NodeId> {
        let tree = self.tree.as_ref()?;
        let (x, y) = self.view()?.unproject(self.config.width, sx, sy)?;
        let mut current = tree.root();
        loop {
            let hit = current
                .children
                .iter()
                .filter_map(|c| tree.get(*c))
                .find(|c| contains(c, x, y));
            match hit {
                Some(child) => current = child,
                None => break,
            }
        }
        (current.id != tree.root).then_some(current.id)
    }

    /// Handles a click on a bubble: directories zoom, leaves ask the detail
    /// panel for their history.
    pub fn click(&mut self, id: NodeId, now: Instant, slow_motion: bool, sink: &mut dyn ClickSink) -> ClickOutcome {
        let Some(node) = self.node(id) else {
            tracing::warn!(node = id.index(), "click on a node outside the current tree");
            return ClickOutcome::Ignored;
        };
        if self.focus_id() == Some(id) {
            return ClickOutcome::Ignored;
        }
        let click = NodeClick::from(node);

        if click.has_children {
            self.focus(id, now, slow_motion);
            sink.node_clicked(&click);
            sink.telemetry().count(DIRECTORY_CLICKED);
            ClickOutcome::Zoomed(click)
        } else {
            sink.detail_panel()
                .show_details(&click.path, &self.config.detail_panel_id, click.is_file);
            sink.node_clicked(&click);
            sink.telemetry().count(FILE_CLICKED);
            ClickOutcome::Detailed(click)
        }
    }

    /// Click at a screen point: hit-tests, then either handles the bubble or
    /// zooms out when the background was hit.
    pub fn click_at(&mut self, sx: f64, sy: f64, now: Instant, slow_motion: bool, sink: &mut dyn ClickSink) -> ClickOutcome {
        match self.node_at(sx, sy) {
            Some(id) => self.click(id, now, slow_motion, sink),
            None => {
                self.zoom_out(now, slow_motion);
                ClickOutcome::Background
            }
        }
    }
}

fn contains(node: &PackedNode, x: f64, y: f64) -> bool {
    let (dx, dy) = (x - node.x, y - node.y);
    dx * dx + dy * dy <= node.r * node.r
}
