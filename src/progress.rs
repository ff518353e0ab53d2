//! Progress state for a single download: byte-count snapshots in,
//! human-readable status lines out.

use std::fmt;
use std::time::Instant;

/// Marker shown when a rate or ETA cannot be computed.
pub const UNKNOWN_MARKER: &str = "unknown";

/// A point-in-time measurement reported by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub downloaded_bytes: u64,
    /// Total size when known; may be the extractor's estimate.
    pub total_bytes: Option<u64>,
    /// Instantaneous rate in bytes per second.
    pub speed: Option<f64>,
}

/// Human-readable rendering of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressDisplay {
    pub percentage: Option<f64>,
    pub speed_text: String,
    pub elapsed_text: String,
    pub eta_text: String,
    complete: bool,
}

impl ProgressDisplay {
    fn complete() -> Self {
        Self {
            percentage: Some(100.0),
            speed_text: String::new(),
            elapsed_text: String::new(),
            eta_text: String::new(),
            complete: true,
        }
    }
}

impl fmt::Display for ProgressDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.complete {
            return write!(f, "Download complete!");
        }
        match self.percentage {
            Some(p) => write!(f, "Downloaded: {:.2}%", p)?,
            None => write!(f, "Downloaded: --%")?,
        }
        write!(
            f,
            " | Speed: {} | Time: {} | ETA: {}",
            self.speed_text, self.elapsed_text, self.eta_text
        )
    }
}

/// Turns the extractor's byte counters into display lines. Malformed or
/// zero-valued input degrades to placeholder text, never to an error.
pub struct ProgressTracker {
    started: Option<Instant>,
    finished: bool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            started: None,
            finished: false,
        }
    }

    /// Records the reference start time. Later calls keep the first one.
    pub fn start(&mut self) {
        self.started.get_or_insert_with(Instant::now);
    }

    pub fn observe(&mut self, snapshot: &ProgressSnapshot) -> ProgressDisplay {
        if self.finished {
            // Stragglers after completion must not regress the line.
            return ProgressDisplay::complete();
        }
        self.start();
        let elapsed = self
            .started
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        ProgressDisplay {
            percentage: percentage(snapshot.downloaded_bytes, snapshot.total_bytes),
            speed_text: speed_text(snapshot.speed),
            elapsed_text: format_hms(elapsed),
            eta_text: eta_text(snapshot),
            complete: false,
        }
    }

    /// Terminal display; safe to call more than once.
    pub fn finish(&mut self) -> ProgressDisplay {
        self.finished = true;
        ProgressDisplay::complete()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn percentage(downloaded: u64, total: Option<u64>) -> Option<f64> {
    let total = total.filter(|t| *t > 0)?;
    Some((downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}

fn speed_text(speed: Option<f64>) -> String {
    match speed {
        Some(s) if s > 0.0 => format!("{:.2} MB/s", s / 1_048_576.0),
        _ => UNKNOWN_MARKER.to_string(),
    }
}

fn eta_text(snapshot: &ProgressSnapshot) -> String {
    let (total, speed) = match (snapshot.total_bytes, snapshot.speed) {
        (Some(t), Some(s)) if t > 0 && s > 0.0 => (t, s),
        _ => return UNKNOWN_MARKER.to_string(),
    };
    let remaining = total.saturating_sub(snapshot.downloaded_bytes);
    format_hms(remaining as f64 / speed)
}

/// H:MM:SS, rounding down. Negative or non-finite input renders as 0:00:00.
fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0) as u64
    } else {
        0
    };
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Parses one line of `--progress-template` output into a snapshot.
/// Returns `None` for anything that is not a progress line.
pub fn parse_progress_from_line(line: &str) -> Option<ProgressSnapshot> {
    let rest = line.strip_prefix("progress:")?;
    let mut fields = rest.trim().split('|');
    let downloaded = parse_bytes(fields.next()?)?;
    let total = fields.next().and_then(parse_bytes);
    let estimate = fields.next().and_then(parse_bytes);
    let speed = fields
        .next()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s > 0.0);
    Some(ProgressSnapshot {
        downloaded_bytes: downloaded,
        total_bytes: total.or(estimate),
        speed,
    })
}

// yt-dlp renders missing counters as "NA" and estimates as floats.
fn parse_bytes(field: &str) -> Option<u64> {
    let value = field.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_stays_within_bounds() {
        for (done, total) in [(0u64, 100u64), (50, 100), (100, 100), (7, 9)] {
            let pct = percentage(done, Some(total)).unwrap();
            assert!((0.0..=100.0).contains(&pct), "{done}/{total} -> {pct}");
        }
        // Counters can overshoot an estimated total near the end.
        assert_eq!(percentage(150, Some(100)), Some(100.0));
    }

    #[test]
    fn zero_total_reports_no_percentage() {
        let mut tracker = ProgressTracker::new();
        let display = tracker.observe(&ProgressSnapshot {
            downloaded_bytes: 10,
            total_bytes: Some(0),
            speed: None,
        });
        assert_eq!(display.percentage, None);
        assert!(display.to_string().starts_with("Downloaded: --%"));
    }

    #[test]
    fn missing_speed_reports_unknown_eta() {
        let mut tracker = ProgressTracker::new();
        for speed in [None, Some(0.0)] {
            let display = tracker.observe(&ProgressSnapshot {
                downloaded_bytes: 10,
                total_bytes: Some(100),
                speed,
            });
            assert_eq!(display.speed_text, UNKNOWN_MARKER);
            assert_eq!(display.eta_text, UNKNOWN_MARKER);
        }
    }

    #[test]
    fn halfway_at_one_megabyte_per_second() {
        let mut tracker = ProgressTracker::new();
        tracker.start();
        let display = tracker.observe(&ProgressSnapshot {
            downloaded_bytes: 50 * 1_048_576,
            total_bytes: Some(100 * 1_048_576),
            speed: Some(1_048_576.0),
        });
        assert_eq!(display.percentage, Some(50.0));
        assert_eq!(display.speed_text, "1.00 MB/s");
        assert_eq!(display.eta_text, "0:00:50");
    }

    #[test]
    fn empty_snapshot_degrades_to_placeholders() {
        let mut tracker = ProgressTracker::new();
        let display = tracker.observe(&ProgressSnapshot {
            downloaded_bytes: 0,
            total_bytes: Some(0),
            speed: None,
        });
        assert_eq!(display.percentage, None);
        assert_eq!(display.speed_text, UNKNOWN_MARKER);
        assert_eq!(display.eta_text, UNKNOWN_MARKER);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut tracker = ProgressTracker::new();
        tracker.start();
        let first = tracker.finish();
        let second = tracker.finish();
        assert_eq!(first, second);
        assert_eq!(first.to_string(), "Download complete!");
    }

    #[test]
    fn snapshots_after_finish_render_the_terminal_line() {
        let mut tracker = ProgressTracker::new();
        tracker.start();
        tracker.finish();
        let display = tracker.observe(&ProgressSnapshot {
            downloaded_bytes: 1,
            total_bytes: Some(100),
            speed: Some(10.0),
        });
        assert_eq!(display.to_string(), "Download complete!");
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0.0), "0:00:00");
        assert_eq!(format_hms(50.0), "0:00:50");
        assert_eq!(format_hms(3671.0), "1:01:11");
        assert_eq!(format_hms(-5.0), "0:00:00");
        assert_eq!(format_hms(f64::NAN), "0:00:00");
    }

    #[test]
    fn parses_template_lines() {
        let snap = parse_progress_from_line("progress:1048576|2097152|NA|524288.0").unwrap();
        assert_eq!(snap.downloaded_bytes, 1_048_576);
        assert_eq!(snap.total_bytes, Some(2_097_152));
        assert_eq!(snap.speed, Some(524_288.0));

        // The estimated total backs up a missing exact total.
        let snap = parse_progress_from_line("progress:100|NA|4096.5|NA").unwrap();
        assert_eq!(snap.total_bytes, Some(4096));
        assert_eq!(snap.speed, None);

        assert_eq!(parse_progress_from_line("[download] Destination: a.mp4"), None);
        assert_eq!(parse_progress_from_line("progress:NA|NA|NA|NA"), None);
    }
}
