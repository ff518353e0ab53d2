use std::path::{Path, PathBuf};
use std::{fs::File, io::Write, process::Stdio};

use rust_embed::RustEmbed;
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};

use crate::error::DownloadError;
use crate::model::{DownloadEvent, DownloadRequest, VideoMetadata};
use crate::progress::parse_progress_from_line;

/// Best avc1 mp4 video up to 1080p plus m4a audio, merged into mp4.
const FORMAT_SELECTOR: &str =
    "bestvideo[ext=mp4][vcodec^=avc1][height<=1080]+bestaudio[ext=m4a]";

/// Template yielding machine-readable progress lines on stdout.
const PROGRESS_TEMPLATE: &str = "progress:%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s";

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

/// Runs one download attempt to completion, reporting everything that
/// happens through `events`. All failures collapse into a single
/// `Failed` event; the worker itself never panics.
pub async fn run_download(request: DownloadRequest, events: UnboundedSender<DownloadEvent>) {
    if let Err(err) = drive(&request, &events).await {
        let _ = events.send(DownloadEvent::Failed(err.to_string()));
    }
}

async fn drive(
    request: &DownloadRequest,
    events: &UnboundedSender<DownloadEvent>,
) -> Result<(), DownloadError> {
    let bin = resolve_binary()?;
    let metadata = fetch_metadata(&bin, request, events).await?;
    let _ = events.send(DownloadEvent::Metadata(metadata.clone()));

    download(&bin, request, events).await?;

    // The merged file may have been moved or deleted already; the UI
    // shows a placeholder when the size cannot be read back.
    let file_size = tokio::fs::metadata(&metadata.output_path)
        .await
        .ok()
        .map(|m| m.len());
    let _ = events.send(DownloadEvent::Finished { file_size });
    Ok(())
}

/// Prefers the embedded yt-dlp binary, falling back to one on PATH.
fn resolve_binary() -> Result<PathBuf, DownloadError> {
    let bin = if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" };
    let Some(data) = Asset::get(bin) else {
        return Ok(PathBuf::from(bin));
    };
    let tmp = std::env::temp_dir().join(bin);
    if !tmp.exists() {
        let mut f = File::create(&tmp)?;
        f.write_all(&data.data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))?;
        }
    }
    Ok(tmp)
}

fn output_template(request: &DownloadRequest) -> String {
    request
        .directory
        .join("%(title)s.%(ext)s")
        .to_string_lossy()
        .into_owned()
}

/// The handful of fields we need out of yt-dlp's JSON dump.
#[derive(Debug, Deserialize)]
struct RawVideoInfo {
    title: Option<String>,
    thumbnail: Option<String>,
    #[serde(rename = "_filename", alias = "filename")]
    filename: Option<String>,
}

impl RawVideoInfo {
    fn into_metadata(self, request: &DownloadRequest) -> VideoMetadata {
        let title = self.title.unwrap_or_else(|| "Unknown Title".to_string());
        let output_path = match self.filename {
            Some(name) => PathBuf::from(name),
            // The merge step always produces an mp4
            None => request.directory.join(format!("{title}.mp4")),
        };
        VideoMetadata {
            title,
            thumbnail_url: self.thumbnail,
            output_path,
        }
    }
}

async fn fetch_metadata(
    bin: &Path,
    request: &DownloadRequest,
    events: &UnboundedSender<DownloadEvent>,
) -> Result<VideoMetadata, DownloadError> {
    let output = Command::new(bin)
        .args(["-j", "--no-playlist", "--no-warnings", "-o"])
        .arg(output_template(request))
        .arg(&request.url)
        .stdin(Stdio::null())
        .output()
        .await?;
    if !output.status.success() {
        return Err(DownloadError::Extractor(stderr_excerpt(&output.stderr)));
    }
    let raw = String::from_utf8_lossy(&output.stdout);
    let _ = events.send(DownloadEvent::Log("Video Metadata:".to_string()));
    let _ = events.send(DownloadEvent::Log(raw.trim().to_string()));
    let info: RawVideoInfo = serde_json::from_str(raw.trim())?;
    Ok(info.into_metadata(request))
}

async fn download(
    bin: &Path,
    request: &DownloadRequest,
    events: &UnboundedSender<DownloadEvent>,
) -> Result<(), DownloadError> {
    let mut child = Command::new(bin)
        .args([
            "-f",
            FORMAT_SELECTOR,
            "--merge-output-format",
            "mp4",
            "--no-playlist",
            "--newline",
            "--progress-template",
            PROGRESS_TEMPLATE,
            "-o",
        ])
        .arg(output_template(request))
        .arg(&request.url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Stderr is drained concurrently; its tail becomes the error detail
    // if the extractor exits non-zero.
    let stderr = child.stderr.take();
    let stderr_events = events.clone();
    let stderr_task = tokio::spawn(async move {
        let mut tail: Vec<String> = Vec::new();
        if let Some(err) = stderr {
            let mut lines = BufReader::new(err).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::warn!("yt-dlp: {line}");
                let _ = stderr_events.send(DownloadEvent::Log(line.clone()));
                if tail.len() == 8 {
                    tail.remove(0);
                }
                tail.push(line);
            }
        }
        tail
    });

    if let Some(out) = child.stdout.take() {
        let mut lines = BufReader::new(out).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_progress_from_line(&line) {
                Some(snapshot) => {
                    let _ = events.send(DownloadEvent::Progress(snapshot));
                }
                None if !line.trim().is_empty() => {
                    let _ = events.send(DownloadEvent::Log(line));
                }
                None => {}
            }
        }
    }

    let status = child.wait().await?;
    let tail = stderr_task.await.unwrap_or_default();
    if !status.success() {
        let detail = if tail.is_empty() {
            format!("yt-dlp exited with status {status}")
        } else {
            tail.join("\n")
        };
        return Err(DownloadError::Extractor(detail));
    }
    Ok(())
}

// Last few stderr lines; yt-dlp puts the actual reason at the end.
fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "yt-dlp reported no details".to_string();
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    let start = lines.len().saturating_sub(4);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_json_maps_onto_the_model() {
        let request = DownloadRequest {
            url: "https://example.com/watch?v=x".into(),
            directory: PathBuf::from("/videos"),
        };
        let raw: RawVideoInfo = serde_json::from_str(
            r#"{"id":"x","title":"Some video","thumbnail":"https://i.ytimg.com/vi/x/hq720.jpg","_filename":"/videos/Some video.mp4"}"#,
        )
        .unwrap();
        let metadata = raw.into_metadata(&request);
        assert_eq!(metadata.title, "Some video");
        assert_eq!(
            metadata.thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/x/hq720.jpg")
        );
        assert_eq!(metadata.output_path, PathBuf::from("/videos/Some video.mp4"));
    }

    #[test]
    fn sparse_metadata_still_resolves_a_path() {
        let request = DownloadRequest {
            url: "u".into(),
            directory: PathBuf::from("/videos"),
        };
        let raw: RawVideoInfo = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        let metadata = raw.into_metadata(&request);
        assert_eq!(metadata.title, "Unknown Title");
        assert_eq!(metadata.thumbnail_url, None);
        assert_eq!(metadata.output_path, PathBuf::from("/videos/Unknown Title.mp4"));
    }

    #[test]
    fn output_template_lives_under_the_chosen_directory() {
        let request = DownloadRequest {
            url: "u".into(),
            directory: PathBuf::from("/videos"),
        };
        assert_eq!(output_template(&request), "/videos/%(title)s.%(ext)s");
    }

    #[test]
    fn stderr_excerpt_keeps_the_tail() {
        assert_eq!(stderr_excerpt(b""), "yt-dlp reported no details");
        let text = b"one\ntwo\nthree\nfour\nfive\n";
        assert_eq!(stderr_excerpt(text), "two\nthree\nfour\nfive");
    }
}
