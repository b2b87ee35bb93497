//! GUI application for previewing the glasses overlay.
//!
//! Run with: cargo run --features gui --bin glasses-tryon-gui

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use eframe::egui;
use glasses_tryon::recording::{BlankCamera, RecordedDetector, Recording};
use glasses_tryon::render::FrameCompositor;
use glasses_tryon::{
    telemetry, Config, FrameSource, OverlayTransform, PoseCell, RenderLoop, RenderTick, Tracker,
    TrackingWorker,
};

/// Camera cadence of the replayed feed.
const FEED_FPS: f32 = 30.0;

fn main() -> eframe::Result<()> {
    if let Err(e) = telemetry::init_tracing("info") {
        eprintln!("Warning: {}", e);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([960.0, 560.0]),
        ..Default::default()
    };

    eframe::run_native(
        "glasses-tryon - Overlay Preview",
        options,
        Box::new(|cc| Ok(Box::new(TryOnApp::new(cc)))),
    )
}

/// Feeds recorded frames to a tracking worker at camera rate, looping the
/// recording until stopped.
struct CameraFeed {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CameraFeed {
    fn start(
        recording: Arc<Recording>,
        config: Config,
        cell: Arc<PoseCell>,
    ) -> glasses_tryon::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let interval = Duration::from_secs_f32(1.0 / FEED_FPS);

        let thread = thread::Builder::new()
            .name("camera-feed".into())
            .spawn(move || {
                let detector = RecordedDetector::new(Arc::clone(&recording));
                let tracker = Tracker::new(detector, &config).with_cell(cell);
                let worker = match TrackingWorker::spawn(tracker) {
                    Ok(worker) => worker,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to start tracking worker");
                        return;
                    }
                };

                while !flag.load(Ordering::Relaxed) {
                    let mut camera =
                        BlankCamera::new(config.frame).with_limit(recording.len() as u64);
                    while let Some(frame) = camera.next_frame() {
                        if flag.load(Ordering::Relaxed) {
                            break;
                        }
                        if worker.submit(frame).is_err() {
                            return;
                        }
                        // Outcomes are not needed here; the cell carries the pose.
                        while let Ok(Some(_)) = worker.try_recv_outcome() {}
                        thread::sleep(interval);
                    }
                }
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct TryOnApp {
    config: Config,
    recording: Arc<Recording>,
    recording_name: String,

    // Pipeline
    cell: Arc<PoseCell>,
    feed: Option<CameraFeed>,
    render_loop: RenderLoop,
    compositor: FrameCompositor,

    // Display
    texture: Option<egui::TextureHandle>,
    last_tick: Option<RenderTick>,
    status: String,

    // Settings
    smoothing_enabled: bool,
    smoothing: f32,
    show_anchor: bool,
}

impl TryOnApp {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let config = Config::default();
        let cell = Arc::new(PoseCell::new());
        let mut app = Self {
            recording: Arc::new(Recording::synthetic(360, config.frame)),
            recording_name: "synthetic".to_string(),
            render_loop: RenderLoop::new(Arc::clone(&cell), &config),
            compositor: FrameCompositor::new(config.viewport()),
            cell,
            feed: None,
            texture: None,
            last_tick: None,
            status: String::new(),
            smoothing_enabled: false,
            smoothing: 0.5,
            show_anchor: false,
            config,
        };
        app.restart_feed();
        app
    }

    fn restart_feed(&mut self) {
        // Stop the old feed before the new one starts publishing.
        self.feed = None;
        self.cell.publish(None);

        self.config.overlay.smoothing = self.smoothing_enabled.then_some(self.smoothing);
        match CameraFeed::start(
            Arc::clone(&self.recording),
            self.config.clone(),
            Arc::clone(&self.cell),
        ) {
            Ok(feed) => {
                self.feed = Some(feed);
                self.status = format!(
                    "Playing {} ({} frames)",
                    self.recording_name,
                    self.recording.len()
                );
            }
            Err(e) => {
                self.status = format!("Failed to start camera feed: {}", e);
            }
        }
    }

    fn load_recording(&mut self, path: PathBuf) {
        match Recording::load(&path) {
            Ok(recording) if recording.frame != self.config.frame => {
                self.status = format!(
                    "Recording is {} but the viewport is {}",
                    recording.frame, self.config.frame
                );
            }
            Ok(recording) => {
                self.recording = Arc::new(recording);
                self.recording_name = path.display().to_string();
                self.restart_feed();
            }
            Err(e) => {
                self.status = format!("Failed to load recording: {}", e);
            }
        }
    }

    fn render_frame(&mut self, ctx: &egui::Context) {
        let tick = self.render_loop.drive(&mut self.compositor);
        self.last_tick = Some(tick);

        let canvas = self.compositor.canvas();
        let (width, height) = canvas.dimensions();
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [width as usize, height as usize],
            canvas.as_raw(),
        );
        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture =
                    Some(ctx.load_texture("overlay", image, egui::TextureOptions::LINEAR));
            }
        }
    }
}

impl eframe::App for TryOnApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Recording...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Landmark recordings", &["json"])
                            .pick_file()
                        {
                            self.load_recording(path);
                        }
                        ui.close_menu();
                    }
                    if ui.button("Synthetic Session").clicked() {
                        self.recording = Arc::new(Recording::synthetic(360, self.config.frame));
                        self.recording_name = "synthetic".to_string();
                        self.restart_feed();
                        ui.close_menu();
                    }
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        egui::SidePanel::left("controls").min_width(250.0).show(ctx, |ui| {
            ui.heading("Overlay");
            ui.separator();

            let mut scale = self.render_loop.scale_factor();
            if ui
                .add(egui::Slider::new(&mut scale, 0.5..=2.5).text("Scale factor"))
                .changed()
            {
                self.render_loop.set_scale_factor(scale);
                self.config.overlay.scale_factor = scale;
            }

            if ui.checkbox(&mut self.show_anchor, "Mark eye midpoint").changed() {
                let compositor = FrameCompositor::new(self.config.viewport());
                self.compositor = compositor.with_anchor(self.show_anchor);
            }
            ui.add_space(16.0);

            ui.heading("Tracking");
            ui.separator();

            ui.checkbox(&mut self.smoothing_enabled, "Smooth poses");
            ui.add_enabled(
                self.smoothing_enabled,
                egui::Slider::new(&mut self.smoothing, 0.05..=1.0).text("Smoothing"),
            );
            if ui.button("Apply").clicked() {
                self.restart_feed();
            }
            ui.add_space(16.0);

            ui.heading("Status");
            ui.separator();
            ui.label(&self.status);

            if let Some(tick) = self.last_tick {
                ui.add_space(8.0);
                ui.label(format!("Pose generation: {}", tick.generation));
                match tick.transform {
                    OverlayTransform::Visible(placement) => {
                        ui.label(format!(
                            "Position: ({:.1}, {:.1}, {:.1})",
                            placement.position.x, placement.position.y, placement.position.z
                        ));
                        ui.label(format!("Scale: {:.1}", placement.scale));
                    }
                    OverlayTransform::Hidden => {
                        ui.label("No face - overlay hidden");
                    }
                }
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_frame(ctx);

            if let Some(ref texture) = self.texture {
                let available_size = ui.available_size();
                let texture_size = texture.size_vec2();

                // Scale to fit
                let scale = (available_size.x / texture_size.x)
                    .min(available_size.y / texture_size.y)
                    .min(1.0);
                let display_size = texture_size * scale;

                ui.centered_and_justified(|ui| {
                    ui.image((texture.id(), display_size));
                });
            }
        });

        // Keep the render loop running at display rate
        ctx.request_repaint();
    }
}
