//! Progress reporting for long-running commands.
//!
//! `paper batch`, `paper sync` and `paper sync-notes` report one event per
//! item so users can see how far along a run is. Progress goes to
//! **stderr** so stdout stays parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Work is starting; `total` items are queued.
    Started { task: String, total: u64 },
    /// Item `n` of `total` is being processed.
    Item {
        task: String,
        n: u64,
        total: u64,
        label: String,
    },
    /// The item just reported failed; the run continues.
    ItemFailed { task: String, label: String, error: String },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "batch  12 / 1,204  Attention Is All You Need".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Started { task, total } => {
                format!("{}  {} items queued\n", task, format_number(*total))
            }
            ProgressEvent::Item {
                task,
                n,
                total,
                label,
            } => format!(
                "{}  {} / {}  {}\n",
                task,
                format_number(*n),
                format_number(*total),
                truncate(label, 70)
            ),
            ProgressEvent::ItemFailed { task, label, error } => {
                format!("{}  failed  {}: {}\n", task, truncate(label, 50), error)
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Started { task, total } => serde_json::json!({
                "event": "started",
                "task": task,
                "total": total
            }),
            ProgressEvent::Item {
                task,
                n,
                total,
                label,
            } => serde_json::json!({
                "event": "progress",
                "task": task,
                "n": n,
                "total": total,
                "label": label
            }),
            ProgressEvent::ItemFailed { task, label, error } => serde_json::json!({
                "event": "failed",
                "task": task,
                "label": label,
                "error": error
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len().saturating_sub(1)) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
