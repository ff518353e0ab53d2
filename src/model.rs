//! Data model for a single download attempt: request, metadata, the
//! phase machine, and the session state the UI renders from.

use std::path::PathBuf;

use crate::progress::{ProgressSnapshot, ProgressTracker};

/// What the user asked for. Fixed once the attempt starts.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub directory: PathBuf,
}

/// Extractor metadata, fetched once per attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail_url: Option<String>,
    /// Where the extractor will write the merged file.
    pub output_path: PathBuf,
}

/// Phase machine for one attempt. `Completed` and `Failed` are terminal;
/// `ShuttingDown` follows the user's acknowledgement of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    FetchingMetadata,
    Downloading,
    Completed,
    Failed,
    ShuttingDown,
}

impl DownloadPhase {
    pub fn is_active(self) -> bool {
        matches!(self, Self::FetchingMetadata | Self::Downloading)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::ShuttingDown)
    }
}

/// Messages from the worker to the UI thread.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Metadata(VideoMetadata),
    Progress(ProgressSnapshot),
    Log(String),
    Finished { file_size: Option<u64> },
    Failed(String),
}

/// Side effect the UI must perform after applying an event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    None,
    FetchThumbnail(String),
    NotifySuccess,
    NotifyFailure(String),
}

/// State of the current attempt, updated only on the UI turn.
pub struct DownloadSession {
    pub phase: DownloadPhase,
    pub progress_line: String,
    pub title_line: String,
    pub size_line: String,
    pub log: Vec<String>,
    tracker: ProgressTracker,
}

impl DownloadSession {
    pub fn new() -> Self {
        Self {
            phase: DownloadPhase::Idle,
            progress_line: "Progress will be displayed here".to_string(),
            title_line: "Video Title: None".to_string(),
            size_line: "File Size: N/A".to_string(),
            log: Vec::new(),
            tracker: ProgressTracker::new(),
        }
    }

    /// Starts a fresh attempt. Refuses while another one is in flight;
    /// a finished session is replaced wholesale.
    pub fn try_begin(&mut self, request: &DownloadRequest) -> bool {
        if self.phase.is_active() {
            return false;
        }
        *self = Self::new();
        log::info!("starting download of {}", request.url);
        self.log.push(format!("Starting download: {}", request.url));
        self.progress_line = "Fetching video metadata...".to_string();
        self.phase = DownloadPhase::FetchingMetadata;
        true
    }

    pub fn apply_event(&mut self, event: DownloadEvent) -> SessionAction {
        if self.phase.is_terminal() {
            // A finished attempt ignores stragglers from the worker.
            return SessionAction::None;
        }
        match event {
            DownloadEvent::Metadata(metadata) => {
                self.phase = DownloadPhase::Downloading;
                self.title_line = format!("Video Title: {}", metadata.title);
                self.progress_line = "Starting download...".to_string();
                match metadata.thumbnail_url {
                    Some(url) => SessionAction::FetchThumbnail(url),
                    None => {
                        self.log.push("No thumbnail available".to_string());
                        SessionAction::None
                    }
                }
            }
            DownloadEvent::Progress(snapshot) => {
                self.progress_line = self.tracker.observe(&snapshot).to_string();
                SessionAction::None
            }
            DownloadEvent::Log(line) => {
                self.log.push(line);
                SessionAction::None
            }
            DownloadEvent::Finished { file_size } => {
                self.phase = DownloadPhase::Completed;
                self.progress_line = self.tracker.finish().to_string();
                self.size_line = match file_size {
                    Some(size) => format!("File Size: {:.2} MB", size as f64 / 1_048_576.0),
                    None => {
                        self.log.push("Failed to get file size".to_string());
                        "File Size: Unknown".to_string()
                    }
                };
                self.log.push("Download complete!".to_string());
                SessionAction::NotifySuccess
            }
            DownloadEvent::Failed(message) => {
                self.phase = DownloadPhase::Failed;
                log::error!("download failed: {message}");
                self.log.push(format!("Error: {message}"));
                SessionAction::NotifyFailure(message)
            }
        }
    }

    pub fn note_thumbnail_failure(&mut self, reason: &str) {
        log::warn!("thumbnail fetch failed: {reason}");
        self.log.push(format!("Failed to load thumbnail: {reason}"));
    }

    /// The success dialog has been acknowledged; the shell may exit.
    pub fn acknowledge_completion(&mut self) {
        if self.phase == DownloadPhase::Completed {
            self.phase = DownloadPhase::ShuttingDown;
        }
    }
}

impl Default for DownloadSession {
    fn default() -> Self {
        Self::new()
    }
}
