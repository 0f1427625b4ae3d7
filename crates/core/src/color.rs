//! Color scales for the problem-areas diagram.
//!
//! Directories are shaded by depth, leaves by change heat. Both scales
//! interpolate in HCL (cylindrical CIELAB, D50 white point) so that the
//! perceived lightness changes evenly along the ramp.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses any CSS color (`#rgb`, `#rrggbb`, `rgb(..)`, named colors).
    /// Alpha is dropped: the diagram only draws opaque fills.
    pub fn parse(input: &str) -> Option<Self> {
        let parsed: csscolorparser::Color = input.trim().parse().ok()?;
        let [r, g, b, _] = parsed.to_rgba8();
        Some(Self::rgb(r, g, b))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value).ok_or_else(|| format!("`{value}` is not a CSS color"))
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

const XN: f64 = 0.964_22;
const YN: f64 = 1.0;
const ZN: f64 = 0.825_21;
const T0: f64 = 4.0 / 29.0;
const T1: f64 = 6.0 / 29.0;
const T2: f64 = 3.0 * T1 * T1;
const T3: f64 = T1 * T1 * T1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

/// Hue and chroma are NaN for achromatic colors, which lets interpolation
/// borrow them from the other endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hcl {
    pub h: f64,
    pub c: f64,
    pub l: f64,
}

fn srgb_to_linear(v: u8) -> f64 {
    let x = v as f64 / 255.0;
    if x <= 0.04045 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(x: f64) -> u8 {
    let v = 255.0
        * if x <= 0.003_130_8 {
            12.92 * x
        } else {
            1.055 * x.powf(1.0 / 2.4) - 0.055
        };
    v.round().clamp(0.0, 255.0) as u8
}

fn xyz_to_lab(t: f64) -> f64 {
    if t > T3 {
        t.cbrt()
    } else {
        t / T2 + T0
    }
}

fn lab_to_xyz(t: f64) -> f64 {
    if t > T1 {
        t * t * t
    } else {
        T2 * (t - T0)
    }
}

impl From<Color> for Lab {
    fn from(c: Color) -> Self {
        let (r, g, b) = (srgb_to_linear(c.r), srgb_to_linear(c.g), srgb_to_linear(c.b));
        let y = xyz_to_lab((0.222_504_5 * r + 0.716_878_6 * g + 0.060_616_9 * b) / YN);
        let (x, z) = if c.r == c.g && c.g == c.b {
            (y, y)
        } else {
            (
                xyz_to_lab((0.436_074_7 * r + 0.385_064_9 * g + 0.143_080_4 * b) / XN),
                xyz_to_lab((0.013_932_2 * r + 0.097_104_5 * g + 0.714_173_3 * b) / ZN),
            )
        };
        Lab {
            l: 116.0 * y - 16.0,
            a: 500.0 * (x - y),
            b: 200.0 * (y - z),
        }
    }
}

impl From<Lab> for Color {
    fn from(lab: Lab) -> Self {
        let y = (lab.l + 16.0) / 116.0;
        let x = if lab.a.is_nan() { y } else { y + lab.a / 500.0 };
        let z = if lab.b.is_nan() { y } else { y - lab.b / 200.0 };
        let (x, y, z) = (XN * lab_to_xyz(x), YN * lab_to_xyz(y), ZN * lab_to_xyz(z));
        Color::rgb(
            linear_to_srgb(3.133_856_1 * x - 1.616_866_7 * y - 0.490_614_6 * z),
            linear_to_srgb(-0.978_768_4 * x + 1.916_141_5 * y + 0.033_454 * z),
            linear_to_srgb(0.071_945_3 * x - 0.228_991_4 * y + 1.405_242_7 * z),
        )
    }
}

impl From<Lab> for Hcl {
    fn from(lab: Lab) -> Self {
        if lab.a == 0.0 && lab.b == 0.0 {
            let c = if 0.0 < lab.l && lab.l < 100.0 { 0.0 } else { f64::NAN };
            return Hcl { h: f64::NAN, c, l: lab.l };
        }
        let h = lab.b.atan2(lab.a).to_degrees();
        Hcl {
            h: if h < 0.0 { h + 360.0 } else { h },
            c: lab.a.hypot(lab.b),
            l: lab.l,
        }
    }
}

impl From<Hcl> for Lab {
    fn from(hcl: Hcl) -> Self {
        if hcl.h.is_nan() {
            return Lab { l: hcl.l, a: 0.0, b: 0.0 };
        }
        let h = hcl.h.to_radians();
        Lab {
            l: hcl.l,
            a: h.cos() * hcl.c,
            b: h.sin() * hcl.c,
        }
    }
}

impl From<Color> for Hcl {
    fn from(c: Color) -> Self {
        Lab::from(c).into()
    }
}

impl From<Hcl> for Color {
    fn from(hcl: Hcl) -> Self {
        Lab::from(hcl).into()
    }
}

fn lerp_channel(a: f64, b: f64, t: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (true, _) => b,
        (_, true) => a,
        _ => a + (b - a) * t,
    }
}

fn lerp_hue(a: f64, b: f64, t: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return lerp_channel(a, b, t);
    }
    let mut d = b - a;
    if !(-180.0..=180.0).contains(&d) {
        d -= 360.0 * (d / 360.0).round();
    }
    a + d * t
}

/// Color at `t` on the HCL ramp from `from` to `to`, taking the short way
/// around the hue circle.
pub fn interpolate_hcl(from: Color, to: Color, t: f64) -> Color {
    let (a, b) = (Hcl::from(from), Hcl::from(to));
    Hcl {
        h: lerp_hue(a.h, b.h, t),
        c: lerp_channel(a.c, b.c, t),
        l: lerp_channel(a.l, b.l, t),
    }
    .into()
}

/// Linear map from `domain` onto `[0, 1]`, clamped at both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub lo: f64,
    pub hi: f64,
}

impl LinearScale {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// A zero-width domain maps everything to 0.
    pub fn normalize(&self, v: f64) -> f64 {
        let span = self.hi - self.lo;
        if span == 0.0 || !span.is_finite() || v.is_nan() {
            return 0.0;
        }
        ((v - self.lo) / span).clamp(0.0, 1.0)
    }
}

/// Maps a leaf's change count to a heat color.
///
/// The heat domain is `[min, min + (max - min) / 2]`: any file changed at least
/// halfway between the extremes is drawn at full heat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatMapper {
    scale: LinearScale,
    range: [Color; 2],
}

impl HeatMapper {
    pub fn new(min_changes: f64, max_changes: f64, range: [Color; 2]) -> Self {
        let half = (max_changes - min_changes) / 2.0;
        Self {
            scale: LinearScale::new(min_changes, min_changes + half),
            range,
        }
    }

    pub fn normalize(&self, changes: f64) -> f64 {
        self.scale.normalize(changes)
    }

    pub fn color(&self, changes: f64) -> Color {
        interpolate_hcl(self.range[0], self.range[1], self.normalize(changes))
    }
}

/// Background shade of a directory by nesting depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthShade {
    scale: LinearScale,
    range: [Color; 2],
}

impl DepthShade {
    pub fn new(domain: [f64; 2], range: [Color; 2]) -> Self {
        Self {
            scale: LinearScale::new(domain[0], domain[1]),
            range,
        }
    }

    pub fn color(&self, depth: u32) -> Color {
        interpolate_hcl(self.range[0], self.range[1], self.scale.normalize(depth as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    const GRAY: Color = Color::rgb(0xa9, 0xa9, 0xa9);
    const PALE: Color = Color::rgb(0xfc, 0xeb, 0xec);
    const RED: Color = Color::rgb(0xdf, 0x29, 0x35);

    #[test]
    fn parses_css_colors() {
        assert_eq!(Color::parse("#df2935"), Some(RED));
        assert_eq!(Color::parse("#fff"), Some(WHITE));
        assert_eq!(Color::parse("darkgray"), Some(GRAY));
        assert_eq!(Color::parse("rgb(252, 235, 236)"), Some(PALE));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(RED.to_hex(), "#df2935");
    }

    #[test]
    fn non_ascii_input_is_rejected() {
        assert_eq!(Color::parse("aéaaa"), None);
        assert_eq!(Color::parse("#ééé"), None);
    }

    #[test]
    fn hcl_endpoints_are_exact() {
        assert_eq!(interpolate_hcl(PALE, RED, 0.0), PALE);
        assert_eq!(interpolate_hcl(PALE, RED, 1.0), RED);
        assert_eq!(interpolate_hcl(WHITE, GRAY, 0.0), WHITE);
        assert_eq!(interpolate_hcl(WHITE, GRAY, 1.0), GRAY);
    }

    #[test]
    fn gray_ramp_stays_gray() {
        for step in 0..=10 {
            let c = interpolate_hcl(WHITE, GRAY, step as f64 / 10.0);
            assert!(c.r.abs_diff(c.g) <= 1 && c.g.abs_diff(c.b) <= 1, "{c}");
        }
    }

    #[test]
    fn gray_ramp_darkens_monotonically() {
        let shade = DepthShade::new([0.0, 10.0], [WHITE, GRAY]);
        let mut prev = 255;
        for depth in 0..=12 {
            let c = shade.color(depth);
            assert!(c.r <= prev);
            prev = c.r;
        }
        assert_eq!(shade.color(10), shade.color(25));
    }

    #[test]
    fn heat_normalizes_against_half_range() {
        let heat = HeatMapper::new(5.0, 20.0, [PALE, RED]);
        assert_eq!(heat.normalize(5.0), 0.0);
        assert_eq!(heat.normalize(20.0), 1.0);
        assert!((heat.normalize(8.75) - 0.5).abs() < 1e-12);
        assert_eq!(heat.normalize(0.0), 0.0);
    }

    #[test]
    fn degenerate_heat_domain_is_cold() {
        let heat = HeatMapper::new(3.0, 3.0, [PALE, RED]);
        assert_eq!(heat.normalize(3.0), 0.0);
        assert_eq!(heat.color(100.0), PALE);
    }

    #[test]
    fn hue_takes_short_way_round() {
        assert!((lerp_hue(350.0, 10.0, 0.5) - 360.0).abs() < 1e-9);
        assert!((lerp_hue(10.0, 350.0, 0.5) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn color_deserializes_from_css_string() {
        let c: Color = serde_json::from_str("\"#a9a9a9\"").unwrap();
        assert_eq!(c, GRAY);
        assert_eq!(serde_json::from_str::<Color>("\"red\"").unwrap(), Color::rgb(255, 0, 0));
        assert!(serde_json::from_str::<Color>("\"reddish\"").is_err());
    }
}
