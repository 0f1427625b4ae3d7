//! Drawing targets for the packed layout.
//!
//! The layout describes a frame as a handful of primitives pushed into a
//! [`DrawSurface`]. Coordinates are screen units relative to the center of the
//! canvas, so `(0, 0)` is the middle of the drawing.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::color::Color;
use crate::model::NodeId;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct CircleShape {
    pub node: NodeId,
    pub cx: f64,
    pub cy: f64,
    pub r: f64,
    pub fill: Color,
    /// Directories accept clicks that zoom; leaves only report.
    pub has_children: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelShape {
    pub node: NodeId,
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub opacity: f64,
    /// Hidden labels are kept around so they can fade back in.
    pub visible: bool,
    pub font_size: f64,
}

pub trait DrawSurface {
    fn clear(&mut self);
    fn background(&mut self, color: Color);
    fn circle(&mut self, circle: CircleShape);
    fn label(&mut self, label: LabelShape);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Background(Color),
    Circle(CircleShape),
    Label(LabelShape),
}

/// Retained list of primitives, replayed by GUI backends and inspected in tests.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub primitives: Vec<Primitive>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn background_color(&self) -> Option<Color> {
        self.primitives.iter().find_map(|p| match p {
            Primitive::Background(c) => Some(*c),
            _ => None,
        })
    }

    pub fn circles(&self) -> impl Iterator<Item = &CircleShape> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Circle(c) => Some(c),
            _ => None,
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = &LabelShape> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Label(l) => Some(l),
            _ => None,
        })
    }

    pub fn visible_labels(&self) -> impl Iterator<Item = &LabelShape> {
        self.labels().filter(|l| l.visible)
    }

    pub fn circle(&self, node: NodeId) -> Option<&CircleShape> {
        self.circles().find(|c| c.node == node)
    }

    pub fn label(&self, node: NodeId) -> Option<&LabelShape> {
        self.labels().find(|l| l.node == node)
    }
}

impl DrawSurface for Scene {
    fn clear(&mut self) {
        self.primitives.clear();
    }

    fn background(&mut self, color: Color) {
        self.primitives.push(Primitive::Background(color));
    }

    fn circle(&mut self, circle: CircleShape) {
        self.primitives.push(Primitive::Circle(circle));
    }

    fn label(&mut self, label: LabelShape) {
        self.primitives.push(Primitive::Label(label));
    }
}

/// Writes a standalone SVG document with the same structure as the
/// dashboard's diagram: a centered `viewBox`, one group of circles and one of
/// labels.
#[derive(Debug, Clone)]
pub struct SvgSurface {
    width: f64,
    background: Option<Color>,
    circles: String,
    labels: String,
}

impl SvgSurface {
    pub fn new(width: f64) -> Self {
        Self {
            width,
            background: None,
            circles: String::new(),
            labels: String::new(),
        }
    }

    pub fn finish(&self) -> String {
        let w = self.width;
        let mut out = String::with_capacity(self.circles.len() + self.labels.len() + 512);
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}" style="display: block; cursor: pointer;"#,
            -w / 2.0,
            -w / 2.0,
            w,
            w
        );
        if let Some(bg) = self.background {
            let _ = write!(out, " background: {bg};");
        }
        out.push_str("\">\n<g>\n");
        out.push_str(&self.circles);
        out.push_str("</g>\n<g style=\"font: 10px sans-serif\" pointer-events=\"none\" text-anchor=\"middle\">\n");
        out.push_str(&self.labels);
        out.push_str("</g>\n</svg>\n");
        out
    }
}

impl DrawSurface for SvgSurface {
    fn clear(&mut self) {
        self.background = None;
        self.circles.clear();
        self.labels.clear();
    }

    fn background(&mut self, color: Color) {
        self.background = Some(color);
    }

    fn circle(&mut self, c: CircleShape) {
        let _ = writeln!(
            self.circles,
            r#"<circle data-node="{}" transform="translate({:.3},{:.3})" r="{:.3}" fill="{}"/>"#,
            c.node.index(), c.cx, c.cy, c.r, c.fill
        );
    }

    fn label(&mut self, l: LabelShape) {
        let display = if l.visible { "inline" } else { "none" };
        let _ = writeln!(
            self.labels,
            r#"<text data-node="{}" transform="translate({:.3},{:.3})" style="fill-opacity: {}; display: {}; font-size: {}px">{}</text>"#,
            l.node.index(),
            l.x,
            l.y,
            l.opacity,
            display,
            l.font_size,
            escape_xml(&l.text)
        );
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Drawing targets addressed by element id, the way the dashboard page
/// exposes its containers.
#[derive(Debug)]
pub struct SurfaceRegistry<S> {
    surfaces: HashMap<String, S>,
}

impl<S> Default for SurfaceRegistry<S> {
    fn default() -> Self {
        Self {
            surfaces: HashMap::new(),
        }
    }
}

impl<S: DrawSurface> SurfaceRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, surface: S) {
        self.surfaces.insert(id.into(), surface);
    }

    pub fn get(&self, id: &str) -> Result<&S> {
        self.surfaces
            .get(id)
            .ok_or_else(|| Error::SurfaceNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut S> {
        self.surfaces
            .get_mut(id)
            .ok_or_else(|| Error::SurfaceNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(visible: bool) -> LabelShape {
        LabelShape {
            node: NodeId::new(3, 0),
            x: 1.0,
            y: 2.0,
            text: "a<b>.rs".into(),
            opacity: if visible { 1.0 } else { 0.0 },
            visible,
            font_size: 10.0,
        }
    }

    #[test]
    fn svg_hides_invisible_labels() {
        let mut svg = SvgSurface::new(932.0);
        svg.background(Color::rgb(255, 255, 255));
        svg.label(label(false));
        let doc = svg.finish();
        assert!(doc.contains(r#"viewBox="-466 -466 932 932""#));
        assert!(doc.contains("display: none"));
        assert!(doc.contains("a&lt;b&gt;.rs"));
        assert!(doc.contains("background: #ffffff"));
    }

    #[test]
    fn clear_discards_previous_frame() {
        let mut svg = SvgSurface::new(100.0);
        svg.circle(CircleShape {
            node: NodeId::new(1, 0),
            cx: 0.0,
            cy: 0.0,
            r: 5.0,
            fill: Color::rgb(0, 0, 0),
            has_children: false,
        });
        svg.clear();
        assert!(!svg.finish().contains("<circle"));
    }

    #[test]
    fn scene_filters_visible_labels() {
        let mut scene = Scene::new();
        DrawSurface::label(&mut scene, label(true));
        DrawSurface::label(&mut scene, LabelShape { node: NodeId::new(4, 0), ..label(false) });
        assert_eq!(scene.labels().count(), 2);
        assert_eq!(scene.visible_labels().count(), 1);
        assert!(scene.label(NodeId::new(4, 0)).is_some());
    }

    #[test]
    fn missing_surface_fails_fast() {
        let mut registry: SurfaceRegistry<Scene> = SurfaceRegistry::new();
        registry.insert("problem-areas-diagram", Scene::new());
        assert!(registry.get_mut("problem-areas-diagram").is_ok());
        assert!(matches!(registry.get("nope"), Err(Error::SurfaceNotFound(id)) if id == "nope"));
    }
}
