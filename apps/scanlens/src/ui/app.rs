//! Scan screen: camera-style preview with a draggable result panel on top.
//! The panel is gesture-owned; analysis results arriving never move it.

use std::time::{Duration, Instant};

use client_core::CaptureProvider;
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use panel::{GestureSample, PanelController};
use shared::domain::{AnalysisResult, SessionId, SessionPhase};

use crate::backend_bridge::commands::BackendCommand;
use crate::capture::FilePickerCapture;
use crate::config::Settings;
use crate::controller::events::{err_label, UiError, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

/// egui reports pointer velocity in points per second; the panel controller
/// expects points per millisecond (the mobile gesture convention its fling
/// threshold was tuned against).
const VELOCITY_POINTS_PER_MS: f32 = 1.0 / 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecondaryAction {
    Collapse,
    PickImage,
}

/// The secondary button doubles as "close panel" while expanded and as the
/// gallery picker while collapsed.
fn secondary_action(expanded: bool) -> SecondaryAction {
    if expanded {
        SecondaryAction::Collapse
    } else {
        SecondaryAction::PickImage
    }
}

pub struct ScanApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    capture: Box<dyn CaptureProvider>,
    panel: PanelController,
    viewport_height: f32,
    /// Cumulative drag displacement for the in-progress gesture.
    drag_delta: f32,
    result: AnalysisResult,
    phase: SessionPhase,
    active_session: Option<SessionId>,
    status: String,
    hold_started: Option<Instant>,
    hold_fired: bool,
    hold_duration: Duration,
}

impl ScanApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        settings: &Settings,
    ) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            capture: Box::new(FilePickerCapture),
            // Real bounds arrive with the first frame's viewport height.
            panel: PanelController::new(800.0, settings.panel),
            viewport_height: 0.0,
            drag_delta: 0.0,
            result: AnalysisResult::analyzing(),
            phase: SessionPhase::Idle,
            active_session: None,
            status: String::new(),
            hold_started: None,
            hold_fired: false,
            hold_duration: Duration::from_millis(settings.hold_to_capture_ms),
        }
    }

    fn drain_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::SessionStarted { session_id } => {
                    self.active_session = Some(session_id);
                    self.phase = SessionPhase::Connecting;
                    self.status.clear();
                }
                UiEvent::ResultUpdated { session_id, result } => {
                    if self.active_session == Some(session_id) {
                        self.result = result;
                        if self.phase == SessionPhase::Connecting {
                            self.phase = SessionPhase::Streaming;
                        }
                    }
                }
                UiEvent::SessionClosed { session_id } => {
                    if self.active_session == Some(session_id) {
                        self.phase = SessionPhase::Closed;
                    }
                }
                UiEvent::SessionFailed {
                    session_id,
                    failure,
                } => {
                    if self.active_session == Some(session_id) {
                        self.phase = SessionPhase::Failed;
                        let err = UiError::from_failure(&failure);
                        self.status = format!("{}: {}", err_label(err.category()), err.message());
                    }
                }
                UiEvent::Error(err) => {
                    self.status = format!("{}: {}", err_label(err.category()), err.message());
                }
            }
        }
    }

    fn trigger_capture(&mut self) {
        match self.capture.capture() {
            Ok(Some(image_jpeg)) => {
                dispatch_backend_command(
                    &self.cmd_tx,
                    BackendCommand::Analyze { image_jpeg },
                    &mut self.status,
                );
            }
            // Dismissed picker: nothing captured, nothing started.
            Ok(None) => {}
            Err(err) => {
                let err = UiError::capture(format!("{err:#}"));
                tracing::warn!("capture failed: {}", err.message());
                self.status = format!("{}: {}", err_label(err.category()), err.message());
            }
        }
    }

    fn drag_handle(&mut self, ui: &mut egui::Ui) {
        let (rect, response) = ui.allocate_exact_size(
            egui::vec2(ui.available_width(), 30.0),
            egui::Sense::drag(),
        );
        let bar = egui::Rect::from_center_size(rect.center(), egui::vec2(134.0, 5.0));
        ui.painter()
            .rect_filled(bar, 3.0, ui.visuals().weak_text_color());

        if response.drag_started() {
            self.drag_delta = 0.0;
            self.panel.on_gesture_start();
        }
        if response.dragged() {
            self.drag_delta += response.drag_delta().y;
            let velocity =
                ui.ctx().input(|i| i.pointer.velocity()).y * VELOCITY_POINTS_PER_MS;
            self.panel
                .on_gesture_move(GestureSample::new(self.drag_delta, velocity));
        }
        if response.drag_stopped() {
            let velocity =
                ui.ctx().input(|i| i.pointer.velocity()).y * VELOCITY_POINTS_PER_MS;
            self.panel
                .on_gesture_end(GestureSample::new(self.drag_delta, velocity));
            ui.ctx().request_repaint();
        }
    }

    fn show_result_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("result_panel")
            .exact_height(self.panel.current_height())
            .resizable(false)
            .show_separator_line(false)
            .show(ctx, |ui| {
                self.drag_handle(ui);

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                    match secondary_action(self.panel.is_expanded()) {
                        SecondaryAction::Collapse => {
                            if ui.button("✕").clicked() {
                                self.panel.collapse();
                                ui.ctx().request_repaint();
                            }
                        }
                        SecondaryAction::PickImage => {
                            if ui.button("Pick image").clicked() {
                                self.trigger_capture();
                            }
                        }
                    }
                });

                self.render_result(ui);
            });
    }

    fn render_result(&self, ui: &mut egui::Ui) {
        ui.vertical(|ui| {
            ui.horizontal(|ui| {
                ui.heading(self.result.company.display_text());
                if matches!(
                    self.phase,
                    SessionPhase::Connecting | SessionPhase::Streaming
                ) {
                    ui.spinner();
                }
            });

            if self.phase != SessionPhase::Idle {
                let (text, color) = if self.result.flagged {
                    ("Boycott", ui.visuals().error_fg_color)
                } else {
                    ("Safe", egui::Color32::from_rgb(0x2e, 0xa0, 0x43))
                };
                ui.colored_label(color, text);
            }

            if !self.result.product_type.is_empty() {
                ui.label(format!("Product: {}", self.result.product_type));
            }
            if !self.result.cause.is_empty() {
                ui.label(&self.result.cause);
            }

            if !self.result.alternatives.is_empty() {
                ui.separator();
                ui.label("Alternatives");
                for item in &self.result.alternatives {
                    ui.label(format!(
                        "• {} — {} ({})",
                        item.company_name, item.product_name, item.product_type
                    ));
                }
            }

            if !self.status.is_empty() {
                ui.separator();
                ui.colored_label(ui.visuals().warn_fg_color, &self.status);
            }
        });
    }

    fn show_preview(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                let response =
                    ui.interact(rect, ui.id().with("preview"), egui::Sense::click_and_drag());

                let frame = egui::Rect::from_center_size(
                    rect.center(),
                    egui::vec2(280.0_f32.min(rect.width()), 400.0_f32.min(rect.height())),
                );
                ui.painter().rect_stroke(
                    frame,
                    8.0,
                    egui::Stroke::new(3.0, egui::Color32::from_white_alpha(168)),
                    egui::StrokeKind::Inside,
                );
                ui.painter().text(
                    egui::pos2(rect.center().x, rect.top() + 32.0),
                    egui::Align2::CENTER_CENTER,
                    "Hold for 1 second to capture",
                    egui::FontId::proportional(13.0),
                    egui::Color32::WHITE,
                );

                if response.is_pointer_button_down_on() {
                    let started = *self.hold_started.get_or_insert_with(Instant::now);
                    if !self.hold_fired && started.elapsed() >= self.hold_duration {
                        self.hold_fired = true;
                        self.trigger_capture();
                    }
                    ctx.request_repaint();
                } else {
                    self.hold_started = None;
                    self.hold_fired = false;
                }
            });
    }
}

impl eframe::App for ScanApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_ui_events();

        let screen_height = ctx.screen_rect().height();
        if screen_height > 0.0 && (screen_height - self.viewport_height).abs() > 0.5 {
            self.viewport_height = screen_height;
            self.panel.on_viewport_resize(screen_height);
        }

        let dt = ctx.input(|i| i.stable_dt).min(0.1);
        if self.panel.tick(dt) {
            ctx.request_repaint();
        }

        self.show_result_panel(ctx);
        self.show_preview(ctx);

        // New events may arrive from the worker at any time.
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
