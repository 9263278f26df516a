//! Streaming downloader: resume via `Range`, progress callbacks with a
//! sliding-window speed estimate, overwrite policy.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::client::Client;
use crate::error::{classify_reqwest_error, ErrorKind, HttpcError};
use crate::request::Request;

const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(200);
const SPEED_WINDOW: usize = 8;

pub type ProgressCallback = Box<dyn Fn(u64, u64, f64) + Send + Sync>;

pub struct DownloadOptions {
    pub destination: PathBuf,
    pub overwrite: bool,
    pub resume: bool,
    pub progress: Option<ProgressCallback>,
    pub progress_interval: Duration,
}

impl DownloadOptions {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            overwrite: false,
            resume: false,
            progress: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn overwrite(mut self, yes: bool) -> Self {
        self.overwrite = yes;
        self
    }

    pub fn resume(mut self, yes: bool) -> Self {
        self.resume = yes;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }
}

#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub total_bytes: u64,
    pub duration: Duration,
    pub average_speed: f64,
    pub status: u16,
    pub resumed: bool,
}

pub struct Downloader<'a> {
    client: &'a Client,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn download_file(&self, url: &str, path: impl Into<PathBuf>) -> Result<DownloadResult, HttpcError> {
        self.download_with_options(url, DownloadOptions::new(path), Request::new(reqwest::Method::GET, url))
            .await
    }

    pub async fn download_with_options(
        &self,
        url: &str,
        options: DownloadOptions,
        mut request: Request,
    ) -> Result<DownloadResult, HttpcError> {
        let started = Instant::now();
        let existing_size = tokio_metadata_len(&options.destination).await;

        if existing_size.is_some() && !options.overwrite && !options.resume {
            return Err(HttpcError::validation(format!(
                "destination {:?} already exists",
                options.destination
            )));
        }

        let mut resumed = false;
        let mut append = false;
        if options.resume {
            if let Some(size) = existing_size {
                if size > 0 {
                    request = request.with_header("Range", format!("bytes={size}-"));
                    resumed = true;
                    append = true;
                }
            }
        }

        request.url = url.to_string();
        let (wire_response, _final_headers) = self.client.send_streaming(&request).await?;
        let status = wire_response.status().as_u16();

        if status == 416 {
            return Ok(DownloadResult {
                path: options.destination,
                total_bytes: existing_size.unwrap_or(0),
                duration: started.elapsed(),
                average_speed: 0.0,
                status: 416,
                resumed: false,
            });
        }

        if status == 200 && append {
            append = false;
            resumed = false;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&options.destination)
            .await
            .map_err(|e| HttpcError::new(ErrorKind::Unknown, format!("failed to open destination: {e}")))?;

        let content_length = wire_response.content_length();
        let total_expected = content_length.map(|len| len + if append { existing_size.unwrap_or(0) } else { 0 });

        let mut written: u64 = if append { existing_size.unwrap_or(0) } else { 0 };
        let mut speed_tracker = SpeedTracker::new();
        let mut last_emit = Instant::now();

        let mut stream = wire_response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                HttpcError::new(classify_reqwest_error(&e), format!("failed reading download stream: {e}"))
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| HttpcError::new(ErrorKind::Unknown, format!("failed writing download: {e}")))?;
            written += chunk.len() as u64;
            speed_tracker.sample(chunk.len() as u64);

            if let Some(cb) = &options.progress {
                if last_emit.elapsed() >= options.progress_interval {
                    cb(written, total_expected.unwrap_or(written), speed_tracker.bytes_per_second());
                    last_emit = Instant::now();
                }
            }
        }
        file.flush()
            .await
            .map_err(|e| HttpcError::new(ErrorKind::Unknown, format!("failed flushing download: {e}")))?;

        if let Some(cb) = &options.progress {
            cb(written, total_expected.unwrap_or(written), speed_tracker.bytes_per_second());
        }

        Ok(DownloadResult {
            path: options.destination,
            total_bytes: written,
            duration: started.elapsed(),
            average_speed: speed_tracker.bytes_per_second(),
            status,
            resumed,
        })
    }
}

async fn tokio_metadata_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

/// Rolling-window average of bytes/sec across the last `SPEED_WINDOW`
/// samples, each tagged with the wall-clock instant it was taken.
struct SpeedTracker {
    samples: VecDeque<(Instant, u64)>,
    started: Instant,
}

impl SpeedTracker {
    fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(SPEED_WINDOW),
            started: Instant::now(),
        }
    }

    fn sample(&mut self, bytes: u64) {
        self.samples.push_back((Instant::now(), bytes));
        if self.samples.len() > SPEED_WINDOW {
            self.samples.pop_front();
        }
    }

    fn bytes_per_second(&self) -> f64 {
        let total_bytes: u64 = self.samples.iter().map(|(_, b)| b).sum();
        let elapsed = self
            .samples
            .front()
            .map(|(t, _)| t.elapsed())
            .unwrap_or_else(|| self.started.elapsed())
            .as_secs_f64();
        if elapsed <= 0.0 {
            total_bytes as f64
        } else {
            total_bytes as f64 / elapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_tracker_reports_zero_before_any_samples() {
        let tracker = SpeedTracker::new();
        assert_eq!(tracker.bytes_per_second(), 0.0);
    }

    #[test]
    fn speed_tracker_caps_window_size() {
        let mut tracker = SpeedTracker::new();
        for _ in 0..(SPEED_WINDOW * 2) {
            tracker.sample(1024);
        }
        assert_eq!(tracker.samples.len(), SPEED_WINDOW);
    }

    #[test]
    fn download_options_builder_sets_flags() {
        let opts = DownloadOptions::new("/tmp/out.bin").overwrite(true).resume(false);
        assert!(opts.overwrite);
        assert!(!opts.resume);
    }
}
