//! Job state, progress, and lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::JobRequest;

/// Most recent processing log lines kept per job.
pub const MAX_LOG_LINES: usize = 200;

/// Status of a generation job.
///
/// Transitions are `pending -> running -> {completed|failed|cancelled}`;
/// terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Pipeline phase a running job is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Initializing,
    Crawling,
    Extracting,
    Composing,
}

impl JobPhase {
    /// Base progress value at the start of this phase.
    pub fn base_progress(&self) -> f64 {
        match self {
            Self::Initializing => 0.05,
            Self::Crawling => 0.10,
            Self::Extracting => 0.70,
            Self::Composing => 0.90,
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Crawling => "crawling",
            Self::Extracting => "extracting",
            Self::Composing => "composing",
        };
        f.write_str(s)
    }
}

/// Bounded, append-only ring of processing log lines.
///
/// Keeps the most recent [`MAX_LOG_LINES`] entries; older lines are dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessingLog {
    lines: Vec<String>,
}

impl ProcessingLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line, dropping the oldest if at capacity.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == MAX_LOG_LINES {
            self.lines.remove(0);
        }
        self.lines.push(line.into());
    }

    /// Current lines, oldest first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of retained lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A generation job and all of its externally visible state.
///
/// This struct is also the serialized form written to `status.json`,
/// so every field name here is wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub job_id: String,

    /// Inputs the job was created with
    #[serde(flatten)]
    pub request: JobRequest,

    /// Current status
    pub status: JobStatus,

    /// Progress fraction in [0, 1], monotonically non-decreasing
    pub progress: f64,

    /// Human-readable status message
    pub message: String,

    /// Current pipeline phase
    pub current_phase: JobPhase,

    /// URL of the page currently being processed
    pub current_page_url: Option<String>,

    /// Total URLs discovered so far
    pub pages_discovered: usize,

    /// Pages taken off the frontier and attempted
    pub pages_processed: usize,

    /// Pages that yielded usable content
    pub pages_crawled: usize,

    /// Bounded processing log
    pub processing_logs: ProcessingLog,

    /// Job creation time (seconds since epoch on the wire)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,

    /// Terminal transition time
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Size of the generated llm.txt in kilobytes
    pub total_size_kb: Option<f64>,

    /// Download URL for llm.txt, set on completion
    pub llm_txt_url: Option<String>,

    /// Download URL for llms-full.txt, set on completion when requested
    pub llms_full_txt_url: Option<String>,

    /// Stable error code when the job failed
    pub error_code: Option<String>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(job_id: impl Into<String>, request: JobRequest) -> Self {
        Self {
            job_id: job_id.into(),
            request,
            status: JobStatus::Pending,
            progress: 0.0,
            message: String::new(),
            current_phase: JobPhase::Initializing,
            current_page_url: None,
            pages_discovered: 0,
            pages_processed: 0,
            pages_crawled: 0,
            processing_logs: ProcessingLog::new(),
            created_at: Utc::now(),
            completed_at: None,
            total_size_kb: None,
            llm_txt_url: None,
            llms_full_txt_url: None,
            error_code: None,
        }
    }

    /// Transition to a new status.
    ///
    /// Terminal states are absorbing: once reached, further transitions are
    /// ignored. Terminal transitions stamp `completed_at`.
    pub fn set_status(&mut self, status: JobStatus, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.message = message.into();
        if status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Update progress, clamped to [0, 1] and never decreasing.
    pub fn set_progress(&mut self, progress: f64, message: impl Into<String>) {
        let clamped = progress.clamp(0.0, 1.0);
        if clamped > self.progress {
            self.progress = clamped;
        }
        let message = message.into();
        if !message.is_empty() {
            self.message = message;
        }
    }

    /// Enter a pipeline phase, bumping progress to at least its base value.
    pub fn set_phase(&mut self, phase: JobPhase) {
        self.current_phase = phase;
        self.set_progress(phase.base_progress(), format!("Phase: {phase}"));
    }

    /// Append a processing log line.
    pub fn log(&mut self, line: impl Into<String>) {
        self.processing_logs.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("job-1", JobRequest::new("https://example.com/docs"))
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let mut job = job();
        job.set_status(JobStatus::Running, "started");
        job.set_status(JobStatus::Cancelled, "cancelled");
        assert!(job.completed_at.is_some());

        job.set_status(JobStatus::Completed, "too late");
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.message, "cancelled");
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut job = job();
        job.set_progress(0.5, "half");
        job.set_progress(0.3, "backwards");
        assert!((job.progress - 0.5).abs() < f64::EPSILON);

        job.set_progress(1.5, "over");
        assert!((job.progress - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_phase_bumps_progress() {
        let mut job = job();
        job.set_phase(JobPhase::Crawling);
        assert!((job.progress - 0.10).abs() < f64::EPSILON);

        job.set_phase(JobPhase::Composing);
        assert!((job.progress - 0.90).abs() < f64::EPSILON);
    }

    #[test]
    fn test_log_ring_is_bounded() {
        let mut log = ProcessingLog::new();
        for i in 0..(MAX_LOG_LINES + 50) {
            log.push(format!("line {i}"));
        }
        assert_eq!(log.len(), MAX_LOG_LINES);
        assert_eq!(log.lines()[0], "line 50");
        assert_eq!(log.lines()[MAX_LOG_LINES - 1], format!("line {}", MAX_LOG_LINES + 49));
    }

    #[test]
    fn test_status_json_round_trip() {
        let mut job = job();
        job.set_status(JobStatus::Running, "crawling");
        job.log("fetched https://example.com/docs");

        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"status\":\"running\""));
        assert!(json.contains("\"current_phase\":\"initializing\""));

        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, JobStatus::Running);
        assert_eq!(back.processing_logs.len(), 1);
        assert_eq!(back.request.url, "https://example.com/docs");
    }
}
