// UI module for the facial expressions detector

use crate::detection::DetectionSession;
use crate::state::{Phase, ViewState};

/// Main application UI. Owns the detection session, so closing the window
/// stops detection.
pub struct ExpressionDetectorApp {
    session: DetectionSession,
    state: ViewState,
}

impl ExpressionDetectorApp {
    pub fn new(session: DetectionSession) -> Self {
        Self {
            session,
            state: ViewState::new(),
        }
    }

    /// Applies every event the worker sent since the last repaint
    fn drain_events(&mut self) {
        while let Some(event) = self.session.try_next_event() {
            self.state.apply(event);
        }
    }

    fn render_loading(ui: &mut egui::Ui, label: &str) {
        ui.add_space(ui.available_height() / 3.0);
        ui.add(egui::Spinner::new().size(64.0));
        ui.add_space(12.0);
        ui.label(label);
    }

    fn render_error(ui: &mut egui::Ui, title: &str, message: &str) {
        ui.add_space(ui.available_height() / 3.0);
        ui.heading(egui::RichText::new(title).color(ui.visuals().error_fg_color));
        ui.add_space(8.0);
        ui.label(message);
    }

    fn render_expression(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Facial Expressions Detection");
        ui.add_space(8.0);
        ui.label(egui::RichText::new(self.state.current.emoji).size(120.0));
        ui.heading(self.state.current.text);

        if !self.state.face_visible {
            ui.add_space(8.0);
            ui.weak("No face detected");
        }
    }
}

impl eframe::App for ExpressionDetectorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();
        self.drain_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| match &self.state.phase {
                Phase::LoadingModels => Self::render_loading(ui, "Loading models..."),
                Phase::StartingCamera => Self::render_loading(ui, "Starting camera..."),
                Phase::Running => self.render_expression(ui),
                Phase::CameraError(message) => {
                    Self::render_error(ui, "Camera unavailable", message)
                }
                Phase::ModelLoadError(message) => {
                    Self::render_error(ui, "Could not load models", message)
                }
            });
        });
    }
}
