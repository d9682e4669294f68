// Detection loop: startup, per-frame detection and cancellation

use crate::camera::FrameSource;
use crate::detector::ExpressionDetector;
use crate::error::Result;
use crate::expression::ExpressionScores;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Messages from the detection worker to the view
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionEvent {
    /// Both model artifacts are loaded
    ModelsLoaded,
    ModelLoadFailed(String),
    /// The camera stream delivers frames; detection starts
    CameraReady,
    CameraFailed(String),
    /// A face was found with these expression scores
    Detected(ExpressionScores),
    NoFaceDetected,
}

/// Counters reported when the loop exits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Completed detections, with or without a face
    pub cycles: u64,
    pub faces: u64,
    pub frame_errors: u64,
    pub detection_errors: u64,
}

/// Raises the stop signal for a running loop
#[derive(Clone, Debug)]
pub struct StopHandle {
    sender: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        // Err means the loop is already gone
        let _ = self.sender.send(true);
    }
}

/// Creates a linked stop handle and signal
pub fn stop_signal() -> (StopHandle, watch::Receiver<bool>) {
    let (sender, receiver) = watch::channel(false);
    (StopHandle { sender }, receiver)
}

/// Repeatedly detects the best face in the current frame and forwards the
/// result. The next cycle only starts once the previous one finished.
pub struct DetectionLoop<S, D> {
    source: S,
    detector: D,
    events: mpsc::Sender<DetectionEvent>,
    stop: watch::Receiver<bool>,
    max_consecutive_frame_errors: u32,
}

impl<S: FrameSource, D: ExpressionDetector> DetectionLoop<S, D> {
    pub fn new(
        source: S,
        detector: D,
        events: mpsc::Sender<DetectionEvent>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            detector,
            events,
            stop,
            max_consecutive_frame_errors: 30,
        }
    }

    /// Frame read failures in a row before the camera is considered lost
    pub fn with_max_consecutive_frame_errors(mut self, max: u32) -> Self {
        self.max_consecutive_frame_errors = max.max(1);
        self
    }

    /// Runs until stopped, until the view drops its receiver, or until the
    /// camera is lost
    pub async fn run(mut self) -> LoopStats {
        let mut stats = LoopStats::default();
        let mut consecutive_frame_errors = 0u32;

        loop {
            if *self.stop.borrow() {
                info!("Detection loop stop requested");
                break;
            }

            let frame = match self.source.next_frame() {
                Ok(frame) => {
                    consecutive_frame_errors = 0;
                    frame
                }
                Err(e) => {
                    stats.frame_errors += 1;
                    consecutive_frame_errors += 1;
                    warn!(
                        "Failed to read frame ({}/{}): {}",
                        consecutive_frame_errors, self.max_consecutive_frame_errors, e
                    );
                    if consecutive_frame_errors >= self.max_consecutive_frame_errors {
                        error!("Camera lost after {} failed reads", consecutive_frame_errors);
                        let _ = self
                            .events
                            .send(DetectionEvent::CameraFailed(e.to_string()))
                            .await;
                        break;
                    }
                    tokio::task::yield_now().await;
                    continue;
                }
            };

            let event = match self.detector.detect_single_face(&frame) {
                Ok(Some(face)) => {
                    stats.faces += 1;
                    debug!(
                        "Face at ({:.0}, {:.0}) score {:.2}: {}",
                        face.detection.x, face.detection.y, face.detection.score, face.expressions
                    );
                    DetectionEvent::Detected(face.expressions)
                }
                Ok(None) => DetectionEvent::NoFaceDetected,
                Err(e) => {
                    stats.detection_errors += 1;
                    error!("Detection failed: {}", e);
                    tokio::task::yield_now().await;
                    continue;
                }
            };
            stats.cycles += 1;

            tokio::select! {
                biased;
                _ = self.stop.changed() => {
                    info!("Detection loop stopped");
                    break;
                }
                sent = self.events.send(event) => {
                    if sent.is_err() {
                        info!("View closed, stopping detection loop");
                        break;
                    }
                }
            }

            tokio::task::yield_now().await;
        }

        info!(
            "Detection loop finished: {} cycles, {} faces, {} frame errors, {} detection errors",
            stats.cycles, stats.faces, stats.frame_errors, stats.detection_errors
        );
        stats
    }
}

/// Loads the models, opens the camera, then runs the detection loop.
///
/// Startup failures are reported as events and end the session.
pub async fn run_session<S, D, OpenCamera, LoadModels>(
    open_camera: OpenCamera,
    load_models: LoadModels,
    events: mpsc::Sender<DetectionEvent>,
    stop: watch::Receiver<bool>,
    max_consecutive_frame_errors: u32,
) -> Option<LoopStats>
where
    S: FrameSource,
    D: ExpressionDetector,
    OpenCamera: FnOnce() -> Result<S>,
    LoadModels: FnOnce() -> Result<D>,
{
    let detector = match load_models() {
        Ok(detector) => {
            let _ = events.send(DetectionEvent::ModelsLoaded).await;
            detector
        }
        Err(e) => {
            error!("Model loading failed: {}", e);
            let _ = events.send(DetectionEvent::ModelLoadFailed(e.to_string())).await;
            return None;
        }
    };

    if *stop.borrow() {
        return None;
    }

    let source = match open_camera() {
        Ok(source) => {
            let _ = events.send(DetectionEvent::CameraReady).await;
            source
        }
        Err(e) => {
            error!("Camera initialization failed: {}", e);
            let _ = events.send(DetectionEvent::CameraFailed(e.to_string())).await;
            return None;
        }
    };

    let stats = DetectionLoop::new(source, detector, events, stop)
        .with_max_consecutive_frame_errors(max_consecutive_frame_errors)
        .run()
        .await;
    Some(stats)
}

/// Detection worker thread owned by the view.
///
/// Dropping the session stops the loop and joins the thread.
pub struct DetectionSession {
    events: mpsc::Receiver<DetectionEvent>,
    stop: StopHandle,
    worker: Option<JoinHandle<Option<LoopStats>>>,
}

impl DetectionSession {
    /// Spawns the worker thread. Camera and models are created on it, so
    /// neither needs to be `Send`.
    pub fn start<S, D, OpenCamera, LoadModels>(
        open_camera: OpenCamera,
        load_models: LoadModels,
        max_consecutive_frame_errors: u32,
    ) -> Result<Self>
    where
        S: FrameSource + 'static,
        D: ExpressionDetector + 'static,
        OpenCamera: FnOnce() -> Result<S> + Send + 'static,
        LoadModels: FnOnce() -> Result<D> + Send + 'static,
    {
        let (event_sender, events) = mpsc::channel(32);
        let (stop, stop_receiver) = stop_signal();

        let worker = std::thread::Builder::new()
            .name("detection".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("Failed to build detection runtime: {}", e);
                        return None;
                    }
                };
                rt.block_on(run_session(
                    open_camera,
                    load_models,
                    event_sender,
                    stop_receiver,
                    max_consecutive_frame_errors,
                ))
            })?;

        Ok(Self {
            events,
            stop,
            worker: Some(worker),
        })
    }

    /// Next pending event, if any
    pub fn try_next_event(&mut self) -> Option<DetectionEvent> {
        self.events.try_recv().ok()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stops the loop and waits for the worker to exit
    pub fn shutdown(&mut self) -> Option<LoopStats> {
        self.stop.stop();
        // Unblocks a loop waiting on a full channel
        self.events.close();

        let worker = self.worker.take()?;
        match worker.join() {
            Ok(stats) => stats,
            Err(_) => {
                error!("Detection thread panicked");
                None
            }
        }
    }
}

impl Drop for DetectionSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
