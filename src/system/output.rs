// src/system/output.rs

use colored::Colorize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Append-only text log that captured runs forward their output to.
pub trait OutputSink: Send + Sync {
    /// Appends a chunk of output exactly as it was produced.
    fn append(&self, text: &str);

    fn append_line(&self, line: &str) {
        self.append(line);
        self.append("\n");
    }

    /// Brings the sink to the user's attention.
    fn show(&self) {}
}

/// Writes captured output to the process stdout.
/// The channel banner is printed once, the first time the sink is shown.
#[derive(Debug)]
pub struct ConsoleSink {
    name: String,
    shown: AtomicBool,
}

impl ConsoleSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shown: AtomicBool::new(false),
        }
    }
}

impl OutputSink for ConsoleSink {
    fn append(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
            log::warn!("Could not write to output channel '{}': {}", self.name, e);
        }
    }

    fn show(&self) {
        if !self.shown.swap(true, Ordering::SeqCst) {
            println!("{}", format!("--- {} ---", self.name).dimmed());
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every appended chunk in memory.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub(crate) chunks: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub(crate) fn text(&self) -> String {
            self.chunks.lock().unwrap().concat()
        }
    }

    impl OutputSink for RecordingSink {
        fn append(&self, text: &str) {
            self.chunks.lock().unwrap().push(text.to_string());
        }
    }

    #[test]
    fn test_append_line_adds_newline() {
        let sink = RecordingSink::default();
        sink.append_line("hello");
        sink.append("x");
        assert_eq!(sink.text(), "hello\nx");
    }
}
