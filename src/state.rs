// View state for the expression display

use crate::detection::DetectionEvent;
use crate::expression::ExpressionDisplay;

/// Which screen the view shows
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Spinner until both models are loaded
    LoadingModels,
    /// Models loaded, waiting for the camera stream
    StartingCamera,
    Running,
    CameraError(String),
    ModelLoadError(String),
}

impl Phase {
    pub fn is_error(&self) -> bool {
        matches!(self, Phase::CameraError(_) | Phase::ModelLoadError(_))
    }
}

/// Everything the view renders, updated only through [`ViewState::apply`]
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    pub phase: Phase,
    pub models_loaded: bool,
    pub current: ExpressionDisplay,
    /// False while the latest frame had no face; the last expression stays
    pub face_visible: bool,
    /// Number of times `current` was set from a detection
    pub display_updates: u64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            phase: Phase::LoadingModels,
            models_loaded: false,
            current: ExpressionDisplay::default(),
            face_visible: false,
            display_updates: 0,
        }
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event from the detection worker
    pub fn apply(&mut self, event: DetectionEvent) {
        match event {
            DetectionEvent::ModelsLoaded => {
                self.models_loaded = true;
                if self.phase == Phase::LoadingModels {
                    self.phase = Phase::StartingCamera;
                }
            }
            DetectionEvent::ModelLoadFailed(message) => {
                self.phase = Phase::ModelLoadError(message);
            }
            DetectionEvent::CameraReady => {
                if !self.phase.is_error() {
                    self.phase = Phase::Running;
                }
            }
            DetectionEvent::CameraFailed(message) => {
                self.phase = Phase::CameraError(message);
            }
            DetectionEvent::Detected(scores) => {
                self.face_visible = true;
                // An empty score map leaves the display as it was
                if let Some(display) = scores.to_display() {
                    self.current = display;
                    self.display_updates += 1;
                }
            }
            DetectionEvent::NoFaceDetected => {
                self.face_visible = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Expression, ExpressionScores};

    fn detected(pairs: &[(Expression, f32)]) -> DetectionEvent {
        DetectionEvent::Detected(pairs.iter().copied().collect())
    }

    #[test]
    fn starts_loading_with_neutral_face() {
        let state = ViewState::new();
        assert_eq!(state.phase, Phase::LoadingModels);
        assert!(!state.models_loaded);
        assert_eq!(state.current.text, "Neutral");
        assert_eq!(state.current.emoji, "😐");
    }

    #[test]
    fn startup_reaches_running() {
        let mut state = ViewState::new();
        state.apply(DetectionEvent::ModelsLoaded);
        assert!(state.models_loaded);
        assert_eq!(state.phase, Phase::StartingCamera);

        state.apply(DetectionEvent::CameraReady);
        assert_eq!(state.phase, Phase::Running);
    }

    #[test]
    fn detection_updates_display() {
        let mut state = ViewState::new();
        state.apply(detected(&[
            (Expression::Happy, 0.9),
            (Expression::Sad, 0.1),
            (Expression::Neutral, 0.2),
        ]));
        assert_eq!(state.current, Expression::Happy.display());
        assert!(state.face_visible);
        assert_eq!(state.display_updates, 1);
    }

    #[test]
    fn empty_scores_leave_display_unchanged() {
        let mut state = ViewState::new();
        state.apply(detected(&[(Expression::Surprised, 0.8)]));
        state.apply(DetectionEvent::Detected(ExpressionScores::new()));

        assert_eq!(state.current, Expression::Surprised.display());
        assert_eq!(state.display_updates, 1);
    }

    #[test]
    fn no_face_keeps_last_expression() {
        let mut state = ViewState::new();
        state.apply(detected(&[(Expression::Angry, 0.7)]));
        state.apply(DetectionEvent::NoFaceDetected);

        assert!(!state.face_visible);
        assert_eq!(state.current, Expression::Angry.display());
    }

    #[test]
    fn errors_are_explicit_states() {
        let mut state = ViewState::new();
        state.apply(DetectionEvent::ModelLoadFailed("missing file".into()));
        assert_eq!(state.phase, Phase::ModelLoadError("missing file".into()));
        assert!(state.phase.is_error());

        let mut state = ViewState::new();
        state.apply(DetectionEvent::ModelsLoaded);
        state.apply(DetectionEvent::CameraFailed("denied".into()));
        assert_eq!(state.phase, Phase::CameraError("denied".into()));

        // a late CameraReady does not hide an error
        state.apply(DetectionEvent::CameraReady);
        assert!(state.phase.is_error());
    }

    #[test]
    fn every_detection_updates_once() {
        let mut state = ViewState::new();
        let sequence = [
            Expression::Happy,
            Expression::Sad,
            Expression::Sad,
            Expression::Fearful,
        ];
        for expression in sequence {
            state.apply(detected(&[(expression, 0.8), (Expression::Neutral, 0.1)]));
            assert_eq!(state.current, expression.display());
        }
        assert_eq!(state.display_updates, sequence.len() as u64);
    }
}
