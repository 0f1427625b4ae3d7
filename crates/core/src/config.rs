//! Configuration file support.
//!
//! Settings are read from JSON. Search order:
//! 1. Explicit path (`--config`)
//! 2. `bubblemap.config.json` in the given directory
//!
//! Every field is optional; missing fields take the defaults below, which
//! reproduce the dashboard's problem-areas diagram.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::color::{Color, DepthShade, HeatMapper};
use crate::pack::PackConfig;
use crate::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "bubblemap.config.json";

/// Panel the dashboard renders per-file details into.
pub const DEFAULT_DETAIL_PANEL: &str = "problem-areas-file-information";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Side of the square layout canvas.
    pub width: f64,
    /// Gap between packed circles.
    pub padding: f64,
    pub duration_ms: u64,
    /// Transition time while the slow-motion modifier (Alt) is held.
    pub slow_motion_duration_ms: u64,
    pub depth_domain: [f64; 2],
    pub depth_range: [Color; 2],
    pub heat_range: [Color; 2],
    pub label_font_size: f64,
    pub detail_panel_id: String,
    pub scan: ScanOptions,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 932.0,
            padding: 3.0,
            duration_ms: 750,
            slow_motion_duration_ms: 7500,
            depth_domain: [0.0, 10.0],
            depth_range: [Color::rgb(0xff, 0xff, 0xff), Color::rgb(0xa9, 0xa9, 0xa9)],
            heat_range: [Color::rgb(0xfc, 0xeb, 0xec), Color::rgb(0xdf, 0x29, 0x35)],
            label_font_size: 10.0,
            detail_panel_id: DEFAULT_DETAIL_PANEL.to_string(),
            scan: ScanOptions::default(),
        }
    }
}

impl LayoutConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` if given, otherwise `bubblemap.config.json` under
    /// `dir` when present, otherwise the defaults.
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "loading config");
            return Self::load(&candidate);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(Error::Config(format!("width must be positive, got {}", self.width)));
        }
        if !(self.padding.is_finite() && self.padding >= 0.0) {
            return Err(Error::Config(format!("padding must not be negative, got {}", self.padding)));
        }
        if self.depth_domain[0] == self.depth_domain[1] {
            return Err(Error::Config("depth_domain must not be empty".into()));
        }
        Ok(())
    }

    pub fn pack(&self) -> PackConfig {
        PackConfig {
            width: self.width,
            padding: self.padding,
        }
    }

    pub fn duration(&self, slow_motion: bool) -> Duration {
        Duration::from_millis(if slow_motion {
            self.slow_motion_duration_ms
        } else {
            self.duration_ms
        })
    }

    pub fn depth_shade(&self) -> DepthShade {
        DepthShade::new(self.depth_domain, self.depth_range)
    }

    pub fn heat(&self, min_changes: f64, max_changes: f64) -> HeatMapper {
        HeatMapper::new(min_changes, max_changes, self.heat_range)
    }
}

/// How a checkout is turned into a tree dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanOptions {
    /// Window for counting changes, in days back from now.
    pub days: u32,
    /// Files at or above this indentation complexity are left out (generated
    /// or vendored code dominates the picture otherwise).
    pub complexity_threshold: u64,
    /// Web URL of the repository; leaves link to `{repo_url}/blame/master/{path}`.
    pub repo_url: Option<String>,
    /// Substrings of paths to skip.
    pub exclude: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            days: 30,
            complexity_threshold: 2000,
            repo_url: None,
            exclude: vec!["/.git/".to_string(), "package-lock.json".to_string()],
        }
    }
}

impl ScanOptions {
    pub fn is_excluded(&self, path: &Path) -> bool {
        let text = path.to_string_lossy().replace('\\', "/");
        self.exclude.iter().any(|pattern| text.contains(pattern.as_str()))
    }

    pub fn repo_link(&self, relative: &str) -> Option<String> {
        self.repo_url
            .as_deref()
            .map(|url| format!("{}/blame/master/{}", url.trim_end_matches('/'), relative.trim_start_matches('/')))
    }
}
