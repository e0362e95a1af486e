//! Editor configuration
//!
//! Tunables for layout, cable cutting and history. Every field has a default,
//! so a config file only needs to name what it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canvas::{Point, Size};
use crate::error::{PatchError, Result};

/// Default maximum number of undo levels to keep.
pub const DEFAULT_MAX_UNDO_LEVELS: usize = 100;

/// Auto-layout tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal gap between columns
    pub column_padding: f32,
    /// Vertical gap between modules in a column
    pub row_padding: f32,
    /// Column assignments never exceed this
    pub max_column: usize,
    /// A module stops being re-queued after this many visits
    pub max_visits: u32,
    /// Footprint for modules of unknown type that the UI never measured
    pub fallback_size: Size,
    /// Canvas position of the layout's top-left corner
    pub origin: Point,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            column_padding: 80.0,
            row_padding: 40.0,
            max_column: 64,
            max_visits: 4,
            fallback_size: Size::new(160.0, 100.0),
            origin: Point::ORIGIN,
        }
    }
}

/// Cable-cut tunables, all in canvas pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutConfig {
    /// Padding added to a cable's bounding box for the broad-phase test
    pub bbox_padding: f32,
    /// Distance that counts as touching for near-parallel cuts
    pub pick_threshold: f32,
    /// Hits closer than this to a pin are ignored
    pub endpoint_margin: f32,
    /// Hits on one cable closer than this collapse into one
    pub merge_distance: f32,
    /// Segments each cable curve is sampled into
    pub curve_samples: usize,
    /// Vertical spacing between pass-throughs created by one cut
    pub stack_offset: f32,
}

impl Default for CutConfig {
    fn default() -> Self {
        Self {
            bbox_padding: 12.0,
            pick_threshold: 4.0,
            endpoint_margin: 10.0,
            merge_distance: 24.0,
            curve_samples: 24,
            stack_offset: 36.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_undo_levels: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_undo_levels: DEFAULT_MAX_UNDO_LEVELS,
        }
    }
}

/// Top-level editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub layout: LayoutConfig,
    pub cut: CutConfig,
    pub history: HistoryConfig,
    /// Offset applied to duplicated modules
    pub duplicate_offset: Point,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            cut: CutConfig::default(),
            history: HistoryConfig::default(),
            duplicate_offset: Point::new(40.0, 40.0),
        }
    }
}

impl EditorConfig {
    /// Load and validate a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EditorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.layout.max_column == 0 {
            return Err(PatchError::Config {
                reason: "layout.max_column must be at least 1".to_string(),
            });
        }
        if self.layout.max_visits == 0 {
            return Err(PatchError::Config {
                reason: "layout.max_visits must be at least 1".to_string(),
            });
        }
        if self.cut.curve_samples == 0 {
            return Err(PatchError::Config {
                reason: "cut.curve_samples must be at least 1".to_string(),
            });
        }
        if self.history.max_undo_levels < 2 {
            return Err(PatchError::Config {
                reason: "history.max_undo_levels must keep at least 2 snapshots".to_string(),
            });
        }
        let distances = [
            self.cut.bbox_padding,
            self.cut.pick_threshold,
            self.cut.endpoint_margin,
            self.cut.merge_distance,
            self.layout.column_padding,
            self.layout.row_padding,
        ];
        if distances.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(PatchError::Config {
                reason: "distances must be finite and non-negative".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EditorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"cut": {{"pick_threshold": 8.0}}, "history": {{"max_undo_levels": 10}}}}"#
        )
        .unwrap();

        let config = EditorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cut.pick_threshold, 8.0);
        assert_eq!(config.cut.curve_samples, CutConfig::default().curve_samples);
        assert_eq!(config.history.max_undo_levels, 10);
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = EditorConfig::default();
        config.layout.max_visits = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let mut config = EditorConfig::default();
        config.cut.merge_distance = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EditorConfig::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
