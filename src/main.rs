//! Main application for the YouTube Video Downloader GUI

// External downloader spawning logic (yt-dlp)
mod downloader;
// User-facing error types
mod error;
// Data models for the download session
mod model;
// Progress display logic
mod progress;
// Thumbnail fetching module
mod thumbnail;

use std::sync::{Arc, Mutex};

use eframe::{egui, App, Frame};
use egui::{ColorImage, TextureHandle, TextureOptions, Visuals};
use once_cell::sync::OnceCell;
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};
use tokio::{
    runtime::Runtime,
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
};

use downloader::run_download;
use model::{DownloadEvent, DownloadPhase, DownloadRequest, DownloadSession, SessionAction};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging and the runtime, launches the GUI
fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    // Create a new Tokio runtime and store it globally
    let rt = Arc::new(Runtime::new().unwrap());
    RUNTIME.set(rt).unwrap();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([800.0, 600.0]),
        ..Default::default()
    };
    eframe::run_native(
        "YouTube Video Downloader",
        options,
        Box::new(|cc| {
            // Use dark theme visuals
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::default())
        }),
    )
}

/// Application state for the GUI
struct DownloaderApp {
    /// Input field for the video URL
    url_input: String,
    /// Starting directory for the folder chooser
    last_folder: String,
    /// State of the current download attempt
    session: DownloadSession,
    /// Worker events for the attempt in flight
    events_rx: Option<UnboundedReceiver<DownloadEvent>>,
    /// Hand-off slot filled by the thumbnail fetch thread
    thumbnail_slot: Arc<Mutex<Option<Result<ColorImage, String>>>>,
    thumbnail_texture: Option<TextureHandle>,
    /// Placeholder text shown when the thumbnail failed
    thumbnail_note: Option<String>,
}

impl Default for DownloaderApp {
    fn default() -> Self {
        Self {
            url_input: String::new(),
            last_folder: ".".to_string(),
            session: DownloadSession::new(),
            events_rx: None,
            thumbnail_slot: Arc::new(Mutex::new(None)),
            thumbnail_texture: None,
            thumbnail_note: None,
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.drain_worker_events(ctx);
        self.take_thumbnail_result(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading("YouTube Video Downloader");
            });
            ui.add_space(8.0);

            // URL input field
            ui.label("YouTube URL:");
            ui.add(egui::TextEdit::singleline(&mut self.url_input).desired_width(f32::INFINITY));
            ui.add_space(4.0);

            ui.label(self.session.progress_line.as_str());
            ui.add_space(4.0);

            if ui.button("Download Video").clicked() {
                self.on_download_clicked();
            }

            ui.add_space(8.0);
            ui.separator();

            // Scrolling log pane
            egui::ScrollArea::vertical()
                .auto_shrink([false, true])
                .stick_to_bottom(true)
                .max_height(160.0)
                .show(ui, |ui| {
                    for line in &self.session.log {
                        ui.monospace(line.as_str());
                    }
                });
            ui.separator();
            ui.add_space(4.0);

            // Thumbnail pane with placeholder fallbacks
            match (&self.thumbnail_texture, &self.thumbnail_note) {
                (Some(texture), _) => {
                    ui.add(egui::Image::new(texture).max_size(egui::vec2(300.0, 200.0)));
                }
                (None, Some(note)) => {
                    ui.label(note.as_str());
                }
                (None, None) => {
                    ui.label("Thumbnail will appear here");
                }
            }

            ui.add_space(4.0);
            ui.label(self.session.title_line.as_str());
            ui.label(self.session.size_line.as_str());
        });

        if self.session.phase == DownloadPhase::ShuttingDown {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}

impl DownloaderApp {
    /// Applies everything the worker produced since the last frame.
    fn drain_worker_events(&mut self, ctx: &egui::Context) {
        let mut pending = Vec::new();
        if let Some(rx) = self.events_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                pending.push(event);
            }
        }
        for event in pending {
            match self.session.apply_event(event) {
                SessionAction::None => {}
                SessionAction::FetchThumbnail(url) => self.spawn_thumbnail_fetch(ctx, url),
                SessionAction::NotifySuccess => {
                    MessageDialog::new()
                        .set_level(MessageLevel::Info)
                        .set_title("Success")
                        .set_description("Download completed!")
                        .set_buttons(MessageButtons::Ok)
                        .show();
                    // The acknowledged success dialog shuts the app down
                    self.session.acknowledge_completion();
                }
                SessionAction::NotifyFailure(message) => {
                    MessageDialog::new()
                        .set_level(MessageLevel::Error)
                        .set_title("Error")
                        .set_description(&format!("An error occurred: {message}"))
                        .set_buttons(MessageButtons::Ok)
                        .show();
                }
            }
        }
    }

    /// Empties the thumbnail hand-off slot on the UI's own turn.
    fn take_thumbnail_result(&mut self, ctx: &egui::Context) {
        let result = self.thumbnail_slot.lock().unwrap().take();
        match result {
            Some(Ok(image)) => {
                let texture = ctx.load_texture("thumbnail", image, TextureOptions::default());
                self.thumbnail_texture = Some(texture);
                self.thumbnail_note = None;
            }
            Some(Err(reason)) => {
                self.session.note_thumbnail_failure(&reason);
                self.thumbnail_note = Some("Thumbnail failed to load".to_string());
            }
            None => {}
        }
    }

    fn spawn_thumbnail_fetch(&self, ctx: &egui::Context, url: String) {
        let slot = Arc::clone(&self.thumbnail_slot);
        let ctx = ctx.clone();
        RUNTIME.get().unwrap().spawn_blocking(move || {
            let result = thumbnail::fetch_thumbnail(&url).map_err(|e| e.to_string());
            *slot.lock().unwrap() = Some(result);
            ctx.request_repaint();
        });
    }

    fn on_download_clicked(&mut self) {
        let url = self.url_input.trim().to_string();
        if url.is_empty() {
            MessageDialog::new()
                .set_level(MessageLevel::Error)
                .set_title("Error")
                .set_description("Please enter a YouTube URL.")
                .set_buttons(MessageButtons::Ok)
                .show();
            return;
        }
        if self.session.phase.is_active() {
            MessageDialog::new()
                .set_level(MessageLevel::Warning)
                .set_title("Busy")
                .set_description("A download is already in progress.")
                .set_buttons(MessageButtons::Ok)
                .show();
            return;
        }

        // Pick the destination folder; backing out cancels the request
        let Some(folder) = FileDialog::new().set_directory(&self.last_folder).pick_folder()
        else {
            return;
        };
        self.last_folder = folder.display().to_string();

        let request = DownloadRequest { url, directory: folder };
        if !self.session.try_begin(&request) {
            return;
        }
        self.thumbnail_texture = None;
        self.thumbnail_note = None;
        *self.thumbnail_slot.lock().unwrap() = None;

        // Launch the worker for this attempt
        let (tx, rx) = unbounded_channel();
        self.events_rx = Some(rx);
        RUNTIME.get().unwrap().spawn(run_download(request, tx));
    }
}
