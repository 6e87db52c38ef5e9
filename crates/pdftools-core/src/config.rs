//! Tunable limits for loading and processing documents
//!
//! Batch sizes are tuning knobs, not part of any output contract: changing
//! them alters how often progress is reported and how much work happens
//! between suspension points, never the produced documents.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default per-file size ceiling (50 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// The only accepted upload MIME type
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// MIME type of image-export archives
pub const ZIP_MIME_TYPE: &str = "application/zip";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Largest accepted input file in bytes
    pub max_file_size: u64,
    /// Pages copied between two suspension points
    pub copy_batch_size: usize,
    /// Pages rasterized concurrently during image export
    pub render_batch_size: usize,
    /// Scale factor applied when rasterizing pages
    pub render_scale: f32,
    /// Share of the progress bar held back for the save/finalize step
    pub save_reserve_percent: u8,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            copy_batch_size: 10,
            render_batch_size: 5,
            render_scale: 2.0,
            save_reserve_percent: 10,
        }
    }
}

impl ToolsConfig {
    /// Parse a JSON configuration. Missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_copy_batch_size(mut self, pages: usize) -> Self {
        self.copy_batch_size = pages;
        self
    }

    pub fn with_render_batch_size(mut self, pages: usize) -> Self {
        self.render_batch_size = pages;
        self
    }

    pub fn with_render_scale(mut self, scale: f32) -> Self {
        self.render_scale = scale;
        self
    }

    pub fn with_save_reserve_percent(mut self, percent: u8) -> Self {
        self.save_reserve_percent = percent;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size == 0 {
            return Err(ConfigError::Invalid("max_file_size must be > 0".into()));
        }
        if self.copy_batch_size == 0 {
            return Err(ConfigError::Invalid("copy_batch_size must be > 0".into()));
        }
        if self.render_batch_size == 0 {
            return Err(ConfigError::Invalid("render_batch_size must be > 0".into()));
        }
        if !(self.render_scale.is_finite() && self.render_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "render_scale must be a positive number, got {}",
                self.render_scale
            )));
        }
        if self.save_reserve_percent >= 100 {
            return Err(ConfigError::Invalid(
                "save_reserve_percent must be below 100".into(),
            ));
        }
        Ok(())
    }

    /// Highest percentage reported before the save/finalize step
    pub(crate) fn work_ceiling(&self) -> u8 {
        100u8.saturating_sub(self.save_reserve_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ToolsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_file_size, 52_428_800);
        assert_eq!(config.work_ceiling(), 90);
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = ToolsConfig::from_json(r#"{"copy_batch_size":5}"#).unwrap();
        assert_eq!(config.copy_batch_size, 5);
        assert_eq!(config.render_batch_size, 5);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn test_from_json_rejects_zero_batch() {
        let result = ToolsConfig::from_json(r#"{"copy_batch_size":0}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let result = ToolsConfig::from_json("not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_bad_scale_and_reserve() {
        assert!(ToolsConfig::default()
            .with_render_scale(0.0)
            .validate()
            .is_err());
        assert!(ToolsConfig::default()
            .with_render_scale(f32::NAN)
            .validate()
            .is_err());
        assert!(ToolsConfig::default()
            .with_save_reserve_percent(100)
            .validate()
            .is_err());
    }

    #[test]
    fn test_work_ceiling_saturates_for_unvalidated_reserve() {
        let config = ToolsConfig::default().with_save_reserve_percent(101);
        assert!(config.validate().is_err());
        assert_eq!(config.work_ceiling(), 0);
        assert_eq!(
            ToolsConfig::default()
                .with_save_reserve_percent(u8::MAX)
                .work_ceiling(),
            0
        );
    }
}
