// Face detection and expression classification

use crate::config::Config;
use crate::error::{ExpressionDetectorError, Result};
use crate::expression::{Expression, ExpressionScores};
use crate::models::{FaceBox, FaceExpressions, Frame};
use opencv::core::{Mat, Ptr, Rect, Size};
use opencv::imgproc;
use opencv::objdetect::FaceDetectorYN;
use opencv::prelude::*;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Side length of the square face crop the classifier expects
const CLASSIFIER_INPUT_SIZE: usize = 260;

/// ImageNet normalization used by the HSEmotion models
const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// YuNet keeps at most this many candidates before NMS
const DETECTOR_TOP_K: i32 = 5000;

/// Finds the single best face in a frame and scores its expression
pub trait ExpressionDetector {
    fn detect_single_face(&mut self, frame: &Frame) -> Result<Option<FaceExpressions>>;
}

/// Fixed detector configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorOptions {
    /// Longer side of the image handed to the detector
    pub input_size: u32,
    /// Minimum detector confidence to accept a face
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            input_size: 512,
            score_threshold: 0.5,
            nms_threshold: 0.3,
        }
    }
}

impl From<&Config> for DetectorOptions {
    fn from(config: &Config) -> Self {
        Self {
            input_size: config.input_size,
            score_threshold: config.score_threshold,
            nms_threshold: config.nms_threshold,
        }
    }
}

/// Size of the downscaled detector input and the scale factor applied.
///
/// The longer side becomes `input_size`; the aspect ratio is kept.
pub fn detector_input_dims(width: u32, height: u32, input_size: u32) -> (u32, u32, f32) {
    let longest = width.max(height).max(1);
    let scale = input_size as f32 / longest as f32;
    let scaled_width = ((width as f32 * scale).round() as u32).max(1);
    let scaled_height = ((height as f32 * scale).round() as u32).max(1);
    (scaled_width, scaled_height, scale)
}

/// Highest-scoring candidate at or above `score_threshold`; the earliest wins ties
pub fn best_face(
    candidates: impl IntoIterator<Item = FaceBox>,
    score_threshold: f32,
) -> Option<FaceBox> {
    candidates
        .into_iter()
        .filter(|face| face.score >= score_threshold)
        .fold(None, |best: Option<FaceBox>, face| match best {
            Some(top) if face.score <= top.score => Some(top),
            _ => Some(face),
        })
}

/// Face detector using OpenCV's YuNet model
pub struct FaceDetector {
    net: Ptr<FaceDetectorYN>,
    options: DetectorOptions,
}

impl FaceDetector {
    /// Loads the YuNet ONNX model
    pub fn load(model_path: &Path, options: DetectorOptions) -> Result<Self> {
        let path = model_path_str(model_path)?;
        let input = Size::new(options.input_size as i32, options.input_size as i32);

        let net = FaceDetectorYN::create(
            path,
            "",
            input,
            options.score_threshold,
            options.nms_threshold,
            DETECTOR_TOP_K,
            0,
            0,
        )
        .map_err(|e| {
            error!("Failed to load face detector: {}", e);
            ExpressionDetectorError::ModelLoad(format!("Face detector load failed: {e}"))
        })?;

        Ok(Self { net, options })
    }

    /// Returns the best face in a BGR image, in that image's coordinates
    pub fn detect_best(&mut self, bgr: &Mat) -> Result<Option<FaceBox>> {
        let (width, height) = (bgr.cols() as u32, bgr.rows() as u32);
        let (scaled_width, scaled_height, scale) =
            detector_input_dims(width, height, self.options.input_size);
        let scaled_size = Size::new(scaled_width as i32, scaled_height as i32);

        let mut resized = Mat::default();
        imgproc::resize(bgr, &mut resized, scaled_size, 0.0, 0.0, imgproc::INTER_LINEAR)
            .map_err(|e| {
                ExpressionDetectorError::FaceDetection(format!("Failed to resize frame: {e}"))
            })?;

        self.net.set_input_size(scaled_size)?;

        let mut faces = Mat::default();
        self.net.detect(&resized, &mut faces).map_err(|e| {
            ExpressionDetectorError::FaceDetection(format!("Face detection failed: {e}"))
        })?;

        // One row per face: x, y, w, h, five landmark pairs, score
        let mut candidates = Vec::with_capacity(faces.rows().max(0) as usize);
        for row in 0..faces.rows() {
            candidates.push(FaceBox {
                x: *faces.at_2d::<f32>(row, 0)? / scale,
                y: *faces.at_2d::<f32>(row, 1)? / scale,
                width: *faces.at_2d::<f32>(row, 2)? / scale,
                height: *faces.at_2d::<f32>(row, 3)? / scale,
                score: *faces.at_2d::<f32>(row, 14)?,
            });
        }

        debug!("Detector returned {} candidate(s)", candidates.len());
        Ok(best_face(candidates, self.options.score_threshold))
    }
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();
    logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .collect()
}

/// Maps a classifier output index to an expression.
/// HSEmotion layout: 0=Angry, 1=Disgust, 2=Fear, 3=Happy, 4=Sad, 5=Surprise, 6=Neutral, 7=Contempt
fn index_to_expression(index: usize) -> Option<Expression> {
    match index {
        0 => Some(Expression::Angry),
        1 => Some(Expression::Disgusted),
        2 => Some(Expression::Fearful),
        3 => Some(Expression::Happy),
        4 => Some(Expression::Sad),
        5 => Some(Expression::Surprised),
        6 => Some(Expression::Neutral),
        7 => Some(Expression::Disgusted), // contempt
        _ => None,
    }
}

/// Builds a score map in canonical expression order from classifier probabilities
pub fn scores_from_probabilities(probabilities: &[f32]) -> ExpressionScores {
    let mut scores: ExpressionScores = Expression::ALL.iter().map(|&e| (e, 0.0)).collect();
    for (index, &probability) in probabilities.iter().enumerate() {
        match index_to_expression(index) {
            Some(expression) => scores.accumulate(expression, probability),
            None => warn!("Unknown expression index: {}, ignoring", index),
        }
    }
    scores
}

/// Turns a 260x260 RGB crop (HWC bytes) into a normalized NCHW tensor
fn to_input_tensor(face_rgb: &[u8]) -> Result<ndarray::Array4<f32>> {
    let expected = CLASSIFIER_INPUT_SIZE * CLASSIFIER_INPUT_SIZE * 3;
    if face_rgb.len() != expected {
        return Err(ExpressionDetectorError::FrameProcessing(format!(
            "Face crop has {} bytes, expected {expected}",
            face_rgb.len()
        )));
    }

    let side = CLASSIFIER_INPUT_SIZE;
    Ok(ndarray::Array4::from_shape_fn(
        (1, 3, side, side),
        |(_, c, y, x)| {
            let pixel = face_rgb[(y * side + x) * 3 + c] as f32 / 255.0;
            (pixel - CHANNEL_MEAN[c]) / CHANNEL_STD[c]
        },
    ))
}

/// Expression classifier using ONNX Runtime
pub struct ExpressionClassifier {
    session: Session,
}

impl ExpressionClassifier {
    /// Loads the ONNX model
    pub fn load(model_path: &Path) -> Result<Self> {
        model_path_str(model_path)?;

        let session = Session::builder()
            .map_err(|e| {
                ExpressionDetectorError::ModelLoad(format!("Failed to create session builder: {e}"))
            })?
            .commit_from_file(model_path)
            .map_err(|e| {
                error!("Failed to load ONNX model: {}", e);
                ExpressionDetectorError::ModelLoad(format!("ONNX model load failed: {e}"))
            })?;

        Ok(Self { session })
    }

    /// Scores a 260x260 RGB face crop
    pub fn classify(&mut self, face_rgb: &[u8]) -> Result<ExpressionScores> {
        let input_tensor = Value::from_array(to_input_tensor(face_rgb)?).map_err(|e| {
            ExpressionDetectorError::OnnxRuntime(format!("Failed to create input tensor: {e}"))
        })?;

        let outputs = self.session.run(ort::inputs![input_tensor]).map_err(|e| {
            error!("ONNX inference failed: {}", e);
            ExpressionDetectorError::OnnxRuntime(format!("Inference failed: {e}"))
        })?;

        let (_, output_value) = outputs.iter().next().ok_or_else(|| {
            ExpressionDetectorError::OnnxRuntime("No output from model".to_string())
        })?;

        let (_, logits) = output_value.try_extract_tensor::<f32>().map_err(|e| {
            ExpressionDetectorError::OnnxRuntime(format!("Failed to extract output tensor: {e}"))
        })?;

        if logits.is_empty() {
            return Err(ExpressionDetectorError::OnnxRuntime(
                "Model produced no logits".to_string(),
            ));
        }

        Ok(scores_from_probabilities(&softmax(logits)))
    }
}

/// Face detector and expression classifier working as one detector
pub struct FaceExpressionNet {
    face_detector: FaceDetector,
    classifier: ExpressionClassifier,
}

impl FaceExpressionNet {
    /// Loads the face detector, then the expression classifier
    pub fn load(config: &Config) -> Result<Self> {
        let detector_path = config.face_detector_path();
        info!("Loading face detector from {}", detector_path.display());
        let face_detector = FaceDetector::load(&detector_path, DetectorOptions::from(config))?;

        let classifier_path = config.expression_model_path();
        info!("Loading expression classifier from {}", classifier_path.display());
        let classifier = ExpressionClassifier::load(&classifier_path)?;

        info!("Models loaded");
        Ok(Self {
            face_detector,
            classifier,
        })
    }

    /// Crops the face out of the RGB frame and resizes it for the classifier
    fn crop_face(rgb: &Mat, face: &FaceBox) -> Result<Option<Vec<u8>>> {
        let Some((x, y, width, height)) = face.clamped_to(rgb.cols() as u32, rgb.rows() as u32)
        else {
            return Ok(None);
        };

        // Clone the ROI so the crop is continuous in memory
        let roi = Mat::roi(rgb, Rect::new(x, y, width, height))
            .and_then(|roi| roi.try_clone())
            .map_err(|e| {
                ExpressionDetectorError::FrameProcessing(format!("Failed to crop face region: {e}"))
            })?;

        let side = CLASSIFIER_INPUT_SIZE as i32;
        let mut resized = Mat::default();
        imgproc::resize(
            &roi,
            &mut resized,
            Size::new(side, side),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )
        .map_err(|e| ExpressionDetectorError::FrameProcessing(format!("Failed to resize face: {e}")))?;

        let data = resized.data_bytes().map_err(|e| {
            ExpressionDetectorError::FrameProcessing(format!("Failed to get resized data: {e}"))
        })?;
        Ok(Some(data.to_vec()))
    }
}

impl ExpressionDetector for FaceExpressionNet {
    fn detect_single_face(&mut self, frame: &Frame) -> Result<Option<FaceExpressions>> {
        if !frame.is_well_formed() {
            return Err(ExpressionDetectorError::FrameProcessing(format!(
                "Frame buffer of {} bytes does not match {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }

        let rgb = Mat::from_slice(&frame.data)?
            .reshape(3, frame.height as i32)?
            .try_clone()?;

        let mut bgr = Mat::default();
        imgproc::cvt_color(
            &rgb,
            &mut bgr,
            imgproc::COLOR_RGB2BGR,
            0,
            opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(|e| ExpressionDetectorError::FaceDetection(format!("Failed to convert to BGR: {e}")))?;

        let Some(detection) = self.face_detector.detect_best(&bgr)? else {
            return Ok(None);
        };

        let Some(face_rgb) = Self::crop_face(&rgb, &detection)? else {
            debug!("Face box {:?} lies outside the frame", detection);
            return Ok(None);
        };

        let expressions = self.classifier.classify(&face_rgb)?;
        Ok(Some(FaceExpressions {
            detection,
            expressions,
        }))
    }
}

fn model_path_str(model_path: &Path) -> Result<&str> {
    if !model_path.exists() {
        return Err(ExpressionDetectorError::ModelLoad(format!(
            "Model file not found: {}",
            model_path.display()
        )));
    }
    model_path.to_str().ok_or_else(|| {
        ExpressionDetectorError::ModelLoad(format!(
            "Model path is not valid UTF-8: {}",
            model_path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(score: f32) -> FaceBox {
        FaceBox {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            score,
        }
    }

    #[test]
    fn landscape_frame_scales_to_input_size() {
        let (w, h, scale) = detector_input_dims(640, 480, 512);
        assert_eq!((w, h), (512, 384));
        assert!((scale - 0.8).abs() < 1e-6);
    }

    #[test]
    fn portrait_frame_scales_on_height() {
        let (w, h, _) = detector_input_dims(480, 1024, 512);
        assert_eq!((w, h), (240, 512));
    }

    #[test]
    fn best_face_respects_threshold() {
        assert_eq!(best_face(vec![face(0.3), face(0.49)], 0.5), None);

        let best = best_face(vec![face(0.6), face(0.9), face(0.7)], 0.5).unwrap();
        assert_eq!(best.score, 0.9);
    }

    #[test]
    fn softmax_is_a_distribution() {
        let probabilities = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probabilities[2] > probabilities[1] && probabilities[1] > probabilities[0]);
    }

    #[test]
    fn probabilities_map_to_canonical_order() {
        // angry, disgust, fear, happy, sad, surprise, neutral, contempt
        let scores = scores_from_probabilities(&[0.05, 0.05, 0.0, 0.7, 0.0, 0.0, 0.1, 0.1]);

        let order: Vec<_> = scores.iter().map(|(e, _)| e).collect();
        assert_eq!(order, Expression::ALL.to_vec());
        assert_eq!(scores.dominant().map(|(e, _)| e), Some(Expression::Happy));
        // contempt folds into disgusted
        assert!((scores.get(Expression::Disgusted).unwrap() - 0.15).abs() < 1e-6);
    }

    #[test]
    fn wrong_crop_size_is_rejected() {
        assert!(matches!(
            to_input_tensor(&[0u8; 12]),
            Err(ExpressionDetectorError::FrameProcessing(_))
        ));
    }

    #[test]
    fn crop_tensor_is_normalized_nchw() {
        let side = CLASSIFIER_INPUT_SIZE;
        let mut pixels = vec![0u8; side * side * 3];
        // top-left pixel is pure red
        pixels[0] = 255;
        let tensor = to_input_tensor(&pixels).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, side, side]);
        let red = (1.0 - CHANNEL_MEAN[0]) / CHANNEL_STD[0];
        let green = (0.0 - CHANNEL_MEAN[1]) / CHANNEL_STD[1];
        assert!((tensor[[0, 0, 0, 0]] - red).abs() < 1e-5);
        assert!((tensor[[0, 1, 0, 0]] - green).abs() < 1e-5);
    }

    #[test]
    fn missing_model_file_is_a_load_error() {
        let config = Config {
            models_dir: "/nonexistent/models".into(),
            ..Config::default()
        };
        assert!(matches!(
            FaceExpressionNet::load(&config),
            Err(ExpressionDetectorError::ModelLoad(_))
        ));
    }
}
