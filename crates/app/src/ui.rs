use bubblemap_core::color::Color;
use bubblemap_core::human::group_thousands;
use bubblemap_core::scanner::ScanMsg;
use bubblemap_core::surface::{CircleShape, DrawSurface, LabelShape};
use bubblemap_core::NodeId;
use eframe::egui::{self, Align2, Color32, FontId, Painter, Pos2, Sense, Stroke, Ui, Vec2};
use std::time::Instant;

use crate::state::AppState;

pub fn draw(app: &mut AppState, ctx: &egui::Context) {
    poll_scan(app, ctx);

    // Ensure the UI keeps repainting during active scans and transitions
    if app.is_scanning() || app.layout.tick(Instant::now()) {
        ctx.request_repaint();
    }

    egui::TopBottomPanel::top("top").show(ctx, |ui| {
        top_bar(ui, app);
    });

    egui::SidePanel::right("details").resizable(true).default_width(320.0).show(ctx, |ui| {
        details_panel(ui, app);
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        if app.is_scanning() {
            ui.add(egui::ProgressBar::new(app.progress.fraction()).show_percentage().text(format!(
                "Scanning… {} files",
                group_thousands(app.progress.scanned as f64)
            )));
        }
        if let Some(status) = &app.status {
            ui.label(status.as_str());
        }
        if app.layout.tree().is_some() {
            diagram(ui, app);
        } else if !app.is_scanning() {
            ui.centered_and_justified(|ui| {
                ui.label("Scan a repository or open a dataset to see its problem areas");
            });
        }
    });
}

fn top_bar(ui: &mut Ui, app: &mut AppState) {
    ui.horizontal(|ui| {
        if ui.button("Scan Repository").clicked() {
            let mut dialog = rfd::FileDialog::new();
            if let Some(last) = &app.settings.last_root {
                dialog = dialog.set_directory(last);
            }
            if let Some(path) = dialog.pick_folder() {
                app.start_scan(path);
            }
        }
        if ui.add_enabled(app.is_scanning(), egui::Button::new("Cancel")).clicked() {
            app.cancel_scan();
        }
        ui.separator();
        if ui.button("Open Dataset").clicked() {
            if let Some(path) = rfd::FileDialog::new().add_filter("JSON", &["json"]).pick_file() {
                if let Err(e) = app.load_dataset(&path) {
                    tracing::error!(error = %e, "open dataset");
                    app.status = Some(format!("{e:#}"));
                }
            }
        }
        if ui.add_enabled(app.dataset.is_some(), egui::Button::new("Save Dataset")).clicked() {
            if let Some(path) = rfd::FileDialog::new().set_file_name("problem-areas.json").save_file() {
                if let Err(e) = app.save_dataset(&path) {
                    tracing::error!(error = %e, "save dataset");
                    app.status = Some(format!("{e:#}"));
                }
            }
        }
        ui.separator();
        ui.label("Search:");
        if ui.text_edit_singleline(&mut app.search).changed() {
            app.refresh_search();
        }
        if ui.button("Zoom Out").clicked() {
            let slow = ui.input(|i| i.modifiers.alt);
            app.layout.zoom_out(Instant::now(), slow);
        }
    });
}

fn details_panel(ui: &mut Ui, app: &mut AppState) {
    if !app.hits.is_empty() {
        ui.heading("Matches");
        let slow = ui.input(|i| i.modifiers.alt);
        let mut reveal = None;
        for &id in &app.hits {
            if let Some(node) = app.layout.node(id) {
                let text = if node.path.is_empty() { &node.name } else { &node.path };
                if ui.selectable_label(false, text.as_str()).clicked() {
                    reveal = Some(id);
                }
            }
        }
        if let Some(id) = reveal {
            app.reveal(id, slow);
        }
        ui.separator();
    }

    ui.heading("Details");
    let Some(click) = app.details.selected.clone() else {
        ui.label("Click a bubble. Directories zoom in, files show their details. Hold Alt for slow motion.");
        return;
    };
    let tree = app.layout.tree();
    let node = app.layout.node(click.node);
    let title = match node {
        Some(n) if n.path.is_empty() => n.name.as_str(),
        Some(n) => n.path.as_str(),
        None => click.path.as_str(),
    };
    ui.label(egui::RichText::new(title).strong());

    // Enclosing directories, outermost first; each one zooms the diagram.
    let mut jump = None;
    if let (Some(tree), Some(node)) = (tree, node) {
        let mut trail: Vec<_> = tree.ancestors(node.id).skip(1).collect();
        trail.reverse();
        ui.horizontal_wrapped(|ui| {
            for dir in trail {
                if ui.link(dir.label()).clicked() {
                    jump = Some(dir.id);
                }
                ui.label("/");
            }
        });
    }
    if let Some(node) = node {
        egui::Grid::new("detail-grid").num_columns(2).show(ui, |ui| {
            ui.label(if click.is_file { "Complexity" } else { "Total complexity" });
            ui.label(group_thousands(node.value));
            ui.end_row();
            if click.is_file {
                ui.label("Changes");
                ui.label(group_thousands(node.changes));
                ui.end_row();
            }
            ui.label("Depth");
            ui.label(node.depth.to_string());
            ui.end_row();
        });
    }
    if let Some((path, panel)) = &app.details.requested {
        if *path == click.path {
            ui.weak(format!("shown in #{panel}"));
        }
    }
    if let Some(link) = &click.repo_link {
        if ui.link("Open blame view").clicked() {
            if let Err(e) = open::that(link) {
                tracing::warn!(link = %link, error = %e, "could not open browser");
            }
        }
    }
    if let Some(id) = jump {
        let slow = ui.input(|i| i.modifiers.alt);
        app.layout.focus(id, Instant::now(), slow);
    }
}

/// Paints the layout's primitives straight onto an egui painter.
struct PainterSurface<'a> {
    painter: &'a Painter,
    center: Pos2,
    scale: f32,
    hovered: Option<NodeId>,
}

impl PainterSurface<'_> {
    fn at(&self, x: f64, y: f64) -> Pos2 {
        self.center + Vec2::new(x as f32, y as f32) * self.scale
    }
}

fn color32(c: Color) -> Color32 {
    Color32::from_rgb(c.r, c.g, c.b)
}

impl DrawSurface for PainterSurface<'_> {
    fn clear(&mut self) {}

    fn background(&mut self, color: Color) {
        self.painter.rect_filled(self.painter.clip_rect(), 0.0, color32(color));
    }

    fn circle(&mut self, c: CircleShape) {
        let stroke = if self.hovered == Some(c.node) {
            Stroke::new(1.0, Color32::BLACK)
        } else {
            Stroke::NONE
        };
        self.painter.circle(self.at(c.cx, c.cy), c.r as f32 * self.scale, color32(c.fill), stroke);
    }

    fn label(&mut self, l: LabelShape) {
        if !l.visible || l.opacity <= 0.0 {
            return;
        }
        let alpha = (l.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        self.painter.text(
            self.at(l.x, l.y),
            Align2::CENTER_CENTER,
            &l.text,
            FontId::proportional(l.font_size as f32 * self.scale),
            Color32::from_black_alpha(alpha),
        );
    }
}

fn diagram(ui: &mut Ui, app: &mut AppState) {
    let width = app.config.width as f32;
    let avail = ui.available_size();
    let side = avail.x.min(avail.y).max(1.0);
    let (response, painter) = ui.allocate_painter(Vec2::splat(side), Sense::click());
    let center = response.rect.center();
    let scale = side / width;
    let to_layout = |p: Pos2| {
        let d = (p - center) / scale;
        (d.x as f64, d.y as f64)
    };

    let hovered = response
        .hover_pos()
        .and_then(|p| {
            let (x, y) = to_layout(p);
            app.layout.node_at(x, y)
        });

    if response.clicked() {
        if let Some(pos) = response.interact_pointer_pos() {
            let (x, y) = to_layout(pos);
            let slow = ui.input(|i| i.modifiers.alt);
            let outcome = app.layout.click_at(x, y, Instant::now(), slow, &mut app.details);
            tracing::debug!(?outcome, "click");
            ui.ctx().request_repaint();
        }
    }
    if response.double_clicked() || ui.input(|i| i.key_pressed(egui::Key::Escape)) {
        let slow = ui.input(|i| i.modifiers.alt);
        if app.layout.zoom_out(Instant::now(), slow) {
            ui.ctx().request_repaint();
        }
    }

    if let Some(text) = hovered.and_then(|id| app.layout.hover_text(id)) {
        response.on_hover_text(text);
    }

    let mut surface = PainterSurface {
        painter: &painter,
        center,
        scale,
        hovered,
    };
    app.layout.render(&mut surface);
}

fn poll_scan(app: &mut AppState, ctx: &egui::Context) {
    // Take ownership of the receiver to avoid borrowing while we might assign to it.
    let Some(rx) = app.scan_rx.take() else {
        return;
    };
    let mut had_msg = false;
    let mut finished = false;
    while let Ok(msg) = rx.try_recv() {
        had_msg = true;
        match msg {
            ScanMsg::Progress(p) => app.progress = p,
            ScanMsg::File { .. } => {}
            ScanMsg::Done(dataset) => {
                app.show(dataset);
                finished = true;
                break;
            }
            ScanMsg::Error(e) => {
                tracing::warn!(error = %e, "scan");
                app.status = Some(e);
            }
        }
    }
    if !finished {
        // Put the receiver back to keep polling next frame
        app.scan_rx = Some(rx);
    }
    if had_msg {
        ctx.request_repaint();
    }
}
