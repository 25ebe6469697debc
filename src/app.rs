//! Pitch practice dashboard — egui/eframe application.
//!
//! # Layout
//!
//! ```text
//! ┌──────────── sidebar ────────────┐┌──────────── chart ────────────┐
//! │ URL input                       ││                               │
//! │ status line / error             ││  ● live (red)   ● song (green)│
//! │ reference file  ▾               ││  y: 0 – 500 Hz, x: 50 slots   │
//! │ music file      ▾               ││                               │
//! │ [Play] [Stop Music]             ││                               │
//! │ [Record] [Stop Record]          ││                               │
//! └─────────────────────────────────┘└───────────────────────────────┘
//! ```
//!
//! [`PracticeApp`] only sends [`SessionCommand`]s and starts preparation
//! jobs; everything it draws comes from the [`SharedState`] snapshot.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui;

use crate::config::AppConfig;
use crate::pipeline::{with_state, ChartFrame, ChartPoint, PointColor, SessionCommand, SharedState};
use crate::pitch::list_curves;
use crate::prepare::{list_songs, PreparationJob};
use crate::worker::{WorkerKind, WorkerState};

/// How often the file lists are re-read from disk.
const LIST_REFRESH: Duration = Duration::from_secs(2);

/// Radius of a chart mark in points.
const MARK_RADIUS: f32 = 3.0;

// ---------------------------------------------------------------------------
// PracticeApp
// ---------------------------------------------------------------------------

pub struct PracticeApp {
    state: SharedState,
    commands: Sender<SessionCommand>,
    runtime: tokio::runtime::Handle,
    job: Arc<PreparationJob>,
    config: AppConfig,

    // ── Sidebar state ────────────────────────────────────────────────────
    url_input: String,
    curves: Vec<String>,
    songs: Vec<String>,
    selected_curve: Option<String>,
    selected_song: Option<String>,
    lists_loaded_at: Option<Instant>,
}

impl PracticeApp {
    pub fn new(
        state: SharedState,
        commands: Sender<SessionCommand>,
        runtime: tokio::runtime::Handle,
        job: Arc<PreparationJob>,
        config: AppConfig,
    ) -> Self {
        Self {
            state,
            commands,
            runtime,
            job,
            config,
            url_input: String::new(),
            curves: Vec::new(),
            songs: Vec::new(),
            selected_curve: None,
            selected_song: None,
            lists_loaded_at: None,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────

    fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            log::error!("ui: session controller is gone");
        }
    }

    fn set_status(&self, message: &str) {
        with_state(&self.state, |st| st.status = message.to_string());
    }

    fn start_preparation(&mut self) {
        // Both outcomes are reported through the shared status line.
        if self.job.submit(&self.url_input, &self.runtime).is_ok() {
            // Force a re-read so the new files show up once written.
            self.lists_loaded_at = None;
        }
    }

    fn play(&self) {
        let (Some(curve), Some(song)) = (&self.selected_curve, &self.selected_song) else {
            self.set_status("Select a pitch detection result and a music file first.");
            return;
        };
        let storage = &self.config.storage;
        self.set_status("Playing the music...");
        self.send(SessionCommand::Play {
            song: storage.downloads_dir.join(song),
            reference: storage.results_dir.join(curve),
        });
    }

    // ── File lists ───────────────────────────────────────────────────────

    fn refresh_lists(&mut self) {
        let stale = self
            .lists_loaded_at
            .map_or(true, |t| t.elapsed() >= LIST_REFRESH);
        if !stale {
            return;
        }
        self.curves = list_curves(&self.config.storage.results_dir);
        self.songs = list_songs(&self.config.storage.downloads_dir);
        keep_valid_selection(&mut self.selected_curve, &self.curves);
        keep_valid_selection(&mut self.selected_song, &self.songs);
        self.lists_loaded_at = Some(Instant::now());
    }

    // ── Sidebar ──────────────────────────────────────────────────────────

    fn draw_sidebar(&mut self, ui: &mut egui::Ui) {
        let (status, error, preparing, capture, playback) = with_state(&self.state, |st| {
            (
                st.status.clone(),
                st.error_message.clone(),
                st.preparing,
                st.capture,
                st.playback,
            )
        });

        ui.heading("Pitch Detection");
        ui.add_space(8.0);

        ui.label("Enter the url to download the song");
        let response = ui.add_enabled(
            !preparing,
            egui::TextEdit::singleline(&mut self.url_input).hint_text("https://www.youtube.com/watch?v=…"),
        );
        let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        let clicked = ui
            .add_enabled(!preparing, egui::Button::new("Download"))
            .clicked();
        if submitted || clicked {
            self.start_preparation();
        }

        ui.add_space(4.0);
        if preparing {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(status.as_str());
            });
        } else if !status.is_empty() {
            ui.label(status.as_str());
        }
        if let Some(error) = &error {
            ui.colored_label(egui::Color32::from_rgb(255, 136, 68), error.as_str());
        }

        ui.separator();

        selection_box(
            ui,
            "curve",
            "Select the pitch detection result file",
            &self.curves,
            &mut self.selected_curve,
        );
        selection_box(
            ui,
            "song",
            "Select the music file",
            &self.songs,
            &mut self.selected_song,
        );

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Play").clicked() {
                self.play();
            }
            if ui.button("Stop Music").clicked() {
                self.send(SessionCommand::StopMusic);
                self.set_status("Stopped the music successfully!");
            }
        });
        ui.horizontal(|ui| {
            if ui.button("Record").clicked() {
                self.send(SessionCommand::Record);
            }
            if ui.button("Stop Record").clicked() {
                self.send(SessionCommand::StopRecord);
            }
        });

        ui.add_space(8.0);
        ui.label(
            egui::RichText::new(format!(
                "Microphone: {}   Music: {}",
                capture.label(WorkerKind::Capture),
                playback.label(WorkerKind::Playback)
            ))
            .color(worker_color(most_severe(capture, playback)))
            .size(11.0),
        );
    }

    // ── Chart ────────────────────────────────────────────────────────────

    fn draw_chart(&self, ui: &mut egui::Ui) {
        let frame = with_state(&self.state, |st| st.chart.clone());
        let (w, h) = self.config.ui.chart_size;
        let size = egui::vec2(w.min(ui.available_width()), h.min(ui.available_height()));
        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
        let painter = ui.painter_at(rect);

        painter.rect_stroke(
            rect,
            0.0,
            egui::Stroke::new(1.0, egui::Color32::from_gray(90)),
            egui::StrokeKind::Inside,
        );
        let (lo, hi) = frame.y_domain();
        let axis_font = egui::FontId::proportional(11.0);
        painter.text(
            rect.left_top() + egui::vec2(4.0, 2.0),
            egui::Align2::LEFT_TOP,
            format!("{hi:.0} Hz"),
            axis_font.clone(),
            egui::Color32::from_gray(150),
        );
        painter.text(
            rect.left_bottom() + egui::vec2(4.0, -2.0),
            egui::Align2::LEFT_BOTTOM,
            format!("{lo:.0} Hz"),
            axis_font,
            egui::Color32::from_gray(150),
        );

        for point in &frame.points {
            if !point.color.is_visible() {
                continue;
            }
            painter.circle_filled(
                to_screen(point, &frame, rect),
                MARK_RADIUS,
                point_color(point.color),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn selection_box(
    ui: &mut egui::Ui,
    id: &str,
    label: &str,
    options: &[String],
    selected: &mut Option<String>,
) {
    ui.label(label);
    egui::ComboBox::from_id_salt(id)
        .width(ui.available_width())
        .selected_text(selected.as_deref().unwrap_or("—"))
        .show_ui(ui, |ui| {
            for option in options {
                ui.selectable_value(selected, Some(option.clone()), option.as_str());
            }
        });
}

/// Drop a selection that vanished from disk; default to the first entry.
fn keep_valid_selection(selected: &mut Option<String>, options: &[String]) {
    if selected.as_ref().is_some_and(|s| !options.contains(s)) {
        *selected = None;
    }
    if selected.is_none() {
        *selected = options.first().cloned();
    }
}

/// Map a chart point into `rect`.  `x` slots are spread evenly across the
/// width; `y` is clamped to the frame's domain.
fn to_screen(point: &ChartPoint, frame: &ChartFrame, rect: egui::Rect) -> egui::Pos2 {
    let slots = frame.x_slots.max(1) as f32;
    let (lo, hi) = frame.y_domain();
    let span = (hi - lo).max(f32::EPSILON);
    let fx = (point.x as f32 + 0.5) / slots;
    let fy = (point.y.clamp(lo, hi) - lo) / span;
    egui::pos2(
        rect.left() + fx * rect.width(),
        rect.bottom() - fy * rect.height(),
    )
}

fn point_color(color: PointColor) -> egui::Color32 {
    let [r, g, b, a] = color.rgba();
    egui::Color32::from_rgba_unmultiplied(r, g, b, a)
}

fn worker_color(state: WorkerState) -> egui::Color32 {
    match state {
        WorkerState::Failed => egui::Color32::from_rgb(255, 136, 68),
        WorkerState::Running | WorkerState::Stopping => egui::Color32::from_rgb(80, 200, 120),
        WorkerState::Idle | WorkerState::Terminated => egui::Color32::from_gray(150),
    }
}

/// Failed outranks active, which outranks idle.
fn most_severe(a: WorkerState, b: WorkerState) -> WorkerState {
    let rank = |s: WorkerState| match s {
        WorkerState::Failed => 2,
        WorkerState::Running | WorkerState::Stopping => 1,
        WorkerState::Idle | WorkerState::Terminated => 0,
    };
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for PracticeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.refresh_lists();

        egui::SidePanel::left("sidebar")
            .resizable(false)
            .min_width(260.0)
            .show(ctx, |ui| self.draw_sidebar(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_chart(ui));

        // The chart redraws in full every frame.
        ctx.request_repaint_after(Duration::from_millis(33));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("ui: window closing");
        self.send(SessionCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> egui::Rect {
        egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(500.0, 500.0))
    }

    fn point(x: usize, y: f32) -> ChartPoint {
        ChartPoint {
            x,
            y,
            color: PointColor::Record,
        }
    }

    #[test]
    fn y_is_clamped_to_the_domain() {
        let frame = ChartFrame::default();
        assert_eq!(to_screen(&point(0, 900.0), &frame, rect()).y, 0.0);
        assert_eq!(to_screen(&point(0, -5.0), &frame, rect()).y, 500.0);
        assert_eq!(to_screen(&point(0, 250.0), &frame, rect()).y, 250.0);
    }

    #[test]
    fn x_slots_span_the_width() {
        let frame = ChartFrame::default();
        assert_eq!(to_screen(&point(0, 0.0), &frame, rect()).x, 5.0);
        assert_eq!(to_screen(&point(49, 0.0), &frame, rect()).x, 495.0);
    }

    #[test]
    fn transparent_points_have_zero_alpha() {
        assert_eq!(point_color(PointColor::Transparent).a(), 0);
        assert_eq!(point_color(PointColor::Record), egui::Color32::from_rgb(255, 0, 0));
    }

    #[test]
    fn vanished_selection_falls_back_to_first_option() {
        let mut selected = Some("gone.csv".to_string());
        keep_valid_selection(&mut selected, &["a.csv".into(), "b.csv".into()]);
        assert_eq!(selected.as_deref(), Some("a.csv"));

        let mut none = None;
        keep_valid_selection(&mut none, &[]);
        assert!(none.is_none());
    }

    #[test]
    fn failed_outranks_running() {
        assert_eq!(
            most_severe(WorkerState::Running, WorkerState::Failed),
            WorkerState::Failed
        );
        assert_eq!(
            most_severe(WorkerState::Idle, WorkerState::Running),
            WorkerState::Running
        );
    }
}
