// THEORY:
// All tunable behavior of the engine lives in one plain data structure so that a
// deployment can be described by a single JSON file. Every field has a default,
// which means a partial file (or no file at all) is always a valid configuration.

use crate::error::{PipelineError, PipelineResult};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_MOTION_THRESHOLD_PX: f64 = 50.0;
pub const DEFAULT_STROKE_WIDTH: u32 = 4;

/// Configuration for the `PersonPipeline`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Width of the display surface the overlay is drawn on, in pixels.
    pub view_width: f64,
    /// Height of the display surface the overlay is drawn on, in pixels.
    pub view_height: f64,
    /// Distance from the view center beyond which a person counts as moving.
    pub motion_threshold_px: f64,
    /// Line width of the overlay rectangle.
    pub stroke_width: u32,
    pub tracker: TrackerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            view_width: 1000.0,
            view_height: 1000.0,
            motion_threshold_px: DEFAULT_MOTION_THRESHOLD_PX,
            stroke_width: DEFAULT_STROKE_WIDTH,
            tracker: TrackerConfig::default(),
        }
    }
}

/// Tuning for the template-matching tracker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// How far the search window extends beyond the previous box, as a
    /// fraction of the box's own width/height.
    pub search_margin: f64,
    /// Pixel stride used both for candidate offsets and template sampling.
    pub sample_step: u32,
    /// Matches scoring below this are treated as a lost target.
    pub min_confidence: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            search_margin: 0.5,
            sample_step: 2,
            min_confidence: 0.6,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.view_width) || !positive(self.view_height) {
            return Err(PipelineError::InvalidConfig(format!(
                "view size must be positive, got {}x{}",
                self.view_width, self.view_height
            )));
        }
        if !self.motion_threshold_px.is_finite() || self.motion_threshold_px < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "motion threshold must be non-negative, got {}",
                self.motion_threshold_px
            )));
        }
        if self.stroke_width == 0 {
            return Err(PipelineError::InvalidConfig("stroke width must be at least 1".into()));
        }
        self.tracker.validate()
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.search_margin.is_finite() || self.search_margin < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "search margin must be non-negative, got {}",
                self.search_margin
            )));
        }
        if self.sample_step == 0 {
            return Err(PipelineError::InvalidConfig("sample step must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(PipelineError::InvalidConfig(format!(
                "min confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = PipelineConfig::from_json_str("{}").expect("defaults are valid");
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.motion_threshold_px, 50.0);
        assert_eq!(config.stroke_width, 4);
    }

    #[test]
    fn partial_tracker_section_keeps_other_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "view_width": 640, "view_height": 480, "tracker": { "sample_step": 4 } }"#,
        )
        .expect("valid config");
        assert_eq!(config.view_width, 640.0);
        assert_eq!(config.tracker.sample_step, 4);
        assert_eq!(config.tracker.search_margin, 0.5);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(PipelineConfig::from_json_str(r#"{ "view_width": 0 }"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{ "motion_threshold_px": -1 }"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{ "stroke_width": 0 }"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{ "tracker": { "min_confidence": 1.5 } }"#).is_err());
        assert!(PipelineConfig::from_json_str("not json").is_err());
    }
}
