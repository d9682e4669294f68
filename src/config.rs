// Application configuration

use crate::error::{ExpressionDetectorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding both model artifacts
    pub models_dir: PathBuf,
    /// Face detector file name inside `models_dir`
    pub face_detector_model: String,
    /// Expression classifier file name inside `models_dir`
    pub expression_model: String,

    // Detector tuning
    pub input_size: u32,
    pub score_threshold: f32,
    pub nms_threshold: f32,

    // Camera
    pub camera_index: u32,
    pub max_consecutive_frame_errors: u32,

    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("assets/models"),
            face_detector_model: "face_detection_yunet.onnx".to_string(),
            expression_model: "expression_classifier.onnx".to_string(),
            input_size: 512,
            score_threshold: 0.5,
            nms_threshold: 0.3,
            camera_index: 0,
            max_consecutive_frame_errors: 30,
            log_file: PathBuf::from("facial_expressions.log"),
        }
    }
}

impl Config {
    /// Load config from file, or use defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Rejects values the detector cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(ExpressionDetectorError::Config(
                "input_size must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("score_threshold", self.score_threshold),
            ("nms_threshold", self.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ExpressionDetectorError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.max_consecutive_frame_errors == 0 {
            return Err(ExpressionDetectorError::Config(
                "max_consecutive_frame_errors must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn face_detector_path(&self) -> PathBuf {
        self.models_dir.join(&self.face_detector_model)
    }

    pub fn expression_model_path(&self) -> PathBuf {
        self.models_dir.join(&self.expression_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_detector_settings() {
        let config = Config::default();
        assert_eq!(config.input_size, 512);
        assert_eq!(config.score_threshold, 0.5);
        assert_eq!(
            config.face_detector_path(),
            PathBuf::from("assets/models/face_detection_yunet.onnx")
        );
        assert_eq!(
            config.expression_model_path(),
            PathBuf::from("assets/models/expression_classifier.onnx")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            camera_index: 2,
            input_size: 320,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "score_threshold": 0.7 }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.score_threshold, 0.7);
        assert_eq!(config.input_size, 512);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero_size = Config {
            input_size: 0,
            ..Config::default()
        };
        assert!(matches!(
            zero_size.validate(),
            Err(ExpressionDetectorError::Config(_))
        ));

        let bad_threshold = Config {
            score_threshold: 1.5,
            ..Config::default()
        };
        assert!(bad_threshold.validate().is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ExpressionDetectorError::Json(_))
        ));
    }
}
