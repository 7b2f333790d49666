//! Append-only event log.
//!
//! One JSON object per line. The state machine is the single writer; the
//! analyzer only ever sees an immutable [`LogSnapshot`] taken with
//! [`LogSnapshot::load`], so a scan never observes a half-written append.

use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::error::Result;
use crate::events::{LogEvent, Outcome, TransitionRecord};

/// Destination for log events.
pub trait EventSink: Send {
    fn append(&mut self, event: &LogEvent) -> Result<()>;
}

/// Keeps the written stream non-decreasing in time before handing events
/// to the sink.
pub struct EventLogWriter {
    sink: Box<dyn EventSink>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl EventLogWriter {
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self {
            sink,
            last_timestamp: None,
        }
    }

    /// Append `event`, clamping its timestamp to the previous one if the
    /// wall clock stepped backwards.
    pub fn append(&mut self, mut event: LogEvent) -> Result<()> {
        if let Some(last) = self.last_timestamp {
            if event.timestamp() < last {
                warn!(
                    at = %event.timestamp(),
                    last = %last,
                    "clock went backwards, clamping log timestamp"
                );
                event.set_timestamp(last);
            }
        }
        self.sink.append(&event)?;
        self.last_timestamp = Some(event.timestamp());
        Ok(())
    }
}

/// File-backed JSON-lines log.
pub struct JsonlEventLog {
    path: PathBuf,
    file: File,
}

impl JsonlEventLog {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlEventLog {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

/// In-memory log, shared between the writer and whoever inspects it.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Render the current contents as JSON lines, the same bytes a
    /// [`JsonlEventLog`] would hold.
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for event in self.events() {
            out.push_str(&serde_json::to_string(&event)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot::from_events(self.events())
    }
}

impl EventSink for MemoryEventLog {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Immutable view of the log at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSnapshot {
    events: Vec<LogEvent>,
    skipped_lines: usize,
}

impl LogSnapshot {
    pub fn from_events(events: Vec<LogEvent>) -> Self {
        Self {
            events,
            skipped_lines: 0,
        }
    }

    /// Reload the log from disk.
    ///
    /// A missing or unreadable file yields an empty snapshot.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read event log, treating as empty");
                Self::default()
            }
        }
    }

    /// Parse JSON lines, skipping blank, malformed and unrecognized ones.
    pub fn parse(content: &str) -> Self {
        let mut events = Vec::new();
        let mut skipped_lines = 0;
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    skipped_lines += 1;
                    warn!(line = index + 1, error = %e, "skipping unparseable log line");
                }
            }
        }
        Self {
            events,
            skipped_lines,
        }
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.events.iter().filter_map(LogEvent::as_transition)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (DateTime<Utc>, Outcome)> + '_ {
        self.events
            .iter()
            .filter_map(|event| event.outcome().map(|outcome| (event.timestamp(), outcome)))
    }
}
