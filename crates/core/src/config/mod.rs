use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub viewport: ViewportConfig,
    pub playback: PlaybackConfig,
    pub particles: ParticleConfig,
    pub assets: AssetConfig,
}

impl AppConfig {
    /// Parses a configuration document in TOML form. Missing sections and
    /// keys fall back to their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded configuration");
        Ok(config)
    }
}

/// Size of the scene the overlay is composed into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f32,
    pub height: f32,
    /// Multiplier applied to the font size to obtain the distance between
    /// stacked text lines.
    pub line_height_scale: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            line_height_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Display refresh period used by the headless driver.
    pub frame_interval_ms: f64,
    pub show_overlay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 1000.0 / 60.0,
            show_overlay: true,
        }
    }
}

/// Tuning for the particle dissolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Fade-out length of a single point.
    pub duration_ms: f64,
    /// Horizontal drift per frame is `random() * elapsed / drift_x_divisor`.
    pub drift_x_divisor: f64,
    /// Vertical jitter per frame is `±random() * elapsed / drift_y_divisor`.
    pub drift_y_divisor: f64,
    pub backdrop_opacity: f32,
    pub seed: u32,
    pub left: StaggerConfig,
    pub right: StaggerConfig,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            duration_ms: 2000.0,
            drift_x_divisor: 4.0,
            drift_y_divisor: 6.0,
            backdrop_opacity: 0.07,
            seed: 0x5eed_1234,
            left: StaggerConfig {
                column_step_ms: 30.0,
                jitter_ms: 6.0,
                offset_ms: 400.0,
                scan: ScanOrder::CenterOut,
            },
            right: StaggerConfig {
                column_step_ms: 20.0,
                jitter_ms: 6.0,
                offset_ms: 0.0,
                scan: ScanOrder::CenterOut,
            },
        }
    }
}

/// Delay assignment for one half of the image:
/// `offset + column * column_step + index_in_column * random() * jitter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaggerConfig {
    pub column_step_ms: f64,
    pub jitter_ms: f64,
    pub offset_ms: f64,
    pub scan: ScanOrder,
}

impl Default for StaggerConfig {
    fn default() -> Self {
        Self {
            column_step_ms: 20.0,
            jitter_ms: 6.0,
            offset_ms: 0.0,
            scan: ScanOrder::CenterOut,
        }
    }
}

/// Order in which the columns of an image half are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanOrder {
    /// Start next to the vertical center line and walk towards the edge.
    CenterOut,
    /// Start at the outer edge and walk towards the center.
    EdgeIn,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Font used for every text item. When absent a built-in face is assumed.
    pub font: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.particles.left.offset_ms, 400.0);
        assert_eq!(config.particles.right.column_step_ms, 20.0);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [viewport]
            width = 640

            [particles.right]
            scan = "edge-in"
            "#,
        )
        .unwrap();

        assert_eq!(config.viewport.width, 640.0);
        assert_eq!(config.viewport.height, 720.0);
        assert_eq!(config.particles.right.scan, ScanOrder::EdgeIn);
        assert_eq!(config.particles.right.jitter_ms, 6.0);
    }

    #[test]
    fn rejects_malformed_documents() {
        let err = AppConfig::from_toml_str("[viewport\nwidth = 1").unwrap_err();
        assert!(format!("{err}").contains("invalid configuration"));
    }
}
