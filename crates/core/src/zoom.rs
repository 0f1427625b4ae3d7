//! Smooth zooming between two viewports.
//!
//! A viewport is a center plus the diameter of the visible window, both in
//! layout coordinates. Moving between two of them follows the optimal path of
//! van Wijk and Nuij ("Smooth and efficient zooming and panning", 2003), which
//! zooms out while panning far and zooms back in on arrival.

use std::time::{Duration, Instant};

use crate::model::NodeId;

const RHO: f64 = std::f64::consts::SQRT_2;
const RHO2: f64 = 2.0;
const RHO4: f64 = 4.0;
const EPSILON2: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct View {
    pub cx: f64,
    pub cy: f64,
    pub diameter: f64,
}

impl View {
    pub fn new(cx: f64, cy: f64, diameter: f64) -> Self {
        Self { cx, cy, diameter }
    }

    /// Scale factor from layout units to screen units for a canvas `width` wide.
    pub fn scale(&self, width: f64) -> f64 {
        if self.diameter > 0.0 {
            width / self.diameter
        } else {
            0.0
        }
    }

    /// Screen position of a layout point, relative to the canvas center.
    pub fn project(&self, width: f64, x: f64, y: f64) -> (f64, f64) {
        let k = self.scale(width);
        ((x - self.cx) * k, (y - self.cy) * k)
    }

    /// Inverse of [`View::project`].
    pub fn unproject(&self, width: f64, sx: f64, sy: f64) -> Option<(f64, f64)> {
        let k = self.scale(width);
        (k > 0.0).then(|| (sx / k + self.cx, sy / k + self.cy))
    }
}

#[derive(Debug, Clone, Copy)]
enum PathKind {
    /// Centers coincide: pure exponential scale change.
    Scale { s: f64 },
    /// General case along the hyperbolic path.
    Hyperbolic { d1: f64, r0: f64, s: f64 },
    /// One of the endpoints has zero size, where the optimal path is undefined.
    Linear,
}

#[derive(Debug, Clone, Copy)]
pub struct ZoomPath {
    from: View,
    to: View,
    kind: PathKind,
}

/// Builds the zoom-and-pan path from `from` to `to`.
pub fn interpolate_zoom(from: View, to: View) -> ZoomPath {
    let dx = to.cx - from.cx;
    let dy = to.cy - from.cy;
    let d2 = dx * dx + dy * dy;
    let (w0, w1) = (from.diameter, to.diameter);

    let kind = if w0 <= 0.0 || w1 <= 0.0 {
        PathKind::Linear
    } else if d2 < EPSILON2 {
        PathKind::Scale { s: (w1 / w0).ln() / RHO }
    } else {
        let d1 = d2.sqrt();
        let b0 = (w1 * w1 - w0 * w0 + RHO4 * d2) / (2.0 * w0 * RHO2 * d1);
        let b1 = (w1 * w1 - w0 * w0 - RHO4 * d2) / (2.0 * w1 * RHO2 * d1);
        let r0 = ((b0 * b0 + 1.0).sqrt() - b0).ln();
        let r1 = ((b1 * b1 + 1.0).sqrt() - b1).ln();
        PathKind::Hyperbolic {
            d1,
            r0,
            s: (r1 - r0) / RHO,
        }
    };
    ZoomPath { from, to, kind }
}

impl ZoomPath {
    pub fn at(&self, t: f64) -> View {
        let View { cx: ux0, cy: uy0, diameter: w0 } = self.from;
        let dx = self.to.cx - ux0;
        let dy = self.to.cy - uy0;
        match self.kind {
            PathKind::Linear => View::new(
                ux0 + t * dx,
                uy0 + t * dy,
                w0 + t * (self.to.diameter - w0),
            ),
            PathKind::Scale { s } => View::new(ux0 + t * dx, uy0 + t * dy, w0 * (RHO * t * s).exp()),
            PathKind::Hyperbolic { d1, r0, s } => {
                let s = t * s;
                let cosh_r0 = r0.cosh();
                let u = w0 / (RHO2 * d1) * (cosh_r0 * (RHO * s + r0).tanh() - r0.sinh());
                View::new(ux0 + u * dx, uy0 + u * dy, w0 * cosh_r0 / (RHO * s + r0).cosh())
            }
        }
    }

    pub fn target(&self) -> View {
        self.to
    }
}

pub fn ease_cubic_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0) * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

/// The interactive part of the layout: what is focused and what is visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    pub focus: NodeId,
    pub view: View,
}

/// A label opacity animation that runs alongside the viewport transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelFade {
    pub node: NodeId,
    pub from: f64,
    pub to: f64,
}

impl LabelFade {
    pub fn at(&self, t: f64) -> f64 {
        self.from + (self.to - self.from) * t
    }

    pub fn is_fade_out(&self) -> bool {
        self.to <= 0.0
    }
}

/// One in-flight focus change.
#[derive(Debug, Clone)]
pub struct Transition {
    pub started: Instant,
    pub duration: Duration,
    pub path: ZoomPath,
    pub previous_focus: NodeId,
    pub fades: Vec<LabelFade>,
}

impl Transition {
    /// Linear progress in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    pub fn view_at(&self, now: Instant) -> View {
        let t = self.progress(now);
        if t >= 1.0 {
            return self.path.target();
        }
        self.path.at(ease_cubic_in_out(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: View, b: View) -> bool {
        (a.cx - b.cx).abs() < 1e-6 && (a.cy - b.cy).abs() < 1e-6 && (a.diameter - b.diameter).abs() < 1e-6
    }

    #[test]
    fn path_hits_both_endpoints() {
        let from = View::new(466.0, 466.0, 932.0);
        let to = View::new(300.0, 520.0, 120.0);
        let path = interpolate_zoom(from, to);
        assert!(close(path.at(0.0), from));
        assert!(close(path.at(1.0), to));
    }

    #[test]
    fn pure_zoom_keeps_center() {
        let path = interpolate_zoom(View::new(10.0, 10.0, 100.0), View::new(10.0, 10.0, 25.0));
        let mid = path.at(0.5);
        assert_eq!((mid.cx, mid.cy), (10.0, 10.0));
        assert!((mid.diameter - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_out_before_long_pan() {
        let from = View::new(0.0, 0.0, 10.0);
        let to = View::new(1000.0, 0.0, 10.0);
        let mid = interpolate_zoom(from, to).at(0.5);
        assert!(mid.diameter > 10.0);
        assert!((mid.cx - 500.0).abs() < 1e-6);
    }

    #[test]
    fn zero_diameter_falls_back_to_linear() {
        let path = interpolate_zoom(View::new(0.0, 0.0, 100.0), View::new(10.0, 0.0, 0.0));
        let mid = path.at(0.5);
        assert!(mid.cx.is_finite() && mid.diameter.is_finite());
        assert_eq!(path.at(1.0), View::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn easing_is_symmetric() {
        assert_eq!(ease_cubic_in_out(0.0), 0.0);
        assert_eq!(ease_cubic_in_out(1.0), 1.0);
        assert!((ease_cubic_in_out(0.5) - 0.5).abs() < 1e-12);
        assert!((ease_cubic_in_out(0.25) + ease_cubic_in_out(0.75) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn projection_round_trips() {
        let view = View::new(200.0, 300.0, 466.0);
        let (sx, sy) = view.project(932.0, 250.0, 280.0);
        assert_eq!((sx, sy), (100.0, -40.0));
        assert_eq!(view.unproject(932.0, sx, sy), Some((250.0, 280.0)));
    }

    #[test]
    fn transition_settles_on_target() {
        let start = Instant::now();
        let target = View::new(5.0, 5.0, 2.0);
        let transition = Transition {
            started: start,
            duration: Duration::from_millis(750),
            path: interpolate_zoom(View::new(0.0, 0.0, 10.0), target),
            previous_focus: NodeId::default(),
            fades: Vec::new(),
        };
        assert!(!transition.is_finished(start + Duration::from_millis(300)));
        assert_eq!(transition.view_at(start + Duration::from_millis(750)), target);
        assert_eq!(transition.view_at(start + Duration::from_secs(5)), target);
    }
}
