//! Bounded, newest-first operator log.

use chrono::Local;
use tracing::info;

/// Maximum number of characters kept in the log buffer.
pub const MAX_LOG_CHARS: usize = 12_000;

/// Operator-facing log buffer.
///
/// Lines are prepended, so the buffer always reads newest first. After every
/// append the buffer is cut to [`MAX_LOG_CHARS`] characters, which drops the
/// tail (oldest text) first.
#[derive(Debug, Clone)]
pub struct PanelLog {
    buffer: String,
    max_chars: usize,
    fresh: Vec<String>,
}

impl Default for PanelLog {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_CHARS)
    }

    pub fn with_capacity(max_chars: usize) -> Self {
        Self {
            buffer: String::new(),
            max_chars,
            fresh: Vec::new(),
        }
    }

    /// Append a message stamped with the local wall-clock time.
    pub fn append(&mut self, message: impl AsRef<str>) {
        let stamp = Local::now().format("%H:%M:%S").to_string();
        self.append_stamped(&stamp, message.as_ref());
    }

    /// Append a message with an explicit `HH:MM:SS` stamp.
    pub fn append_stamped(&mut self, stamp: &str, message: &str) {
        let line = format!("[{stamp}] {message}");
        info!(target: "amonitor_panel::log", "{message}");

        let mut next = String::with_capacity(line.len() + 1 + self.buffer.len());
        next.push_str(&line);
        next.push('\n');
        next.push_str(&self.buffer);
        truncate_chars(&mut next, self.max_chars);
        self.buffer = next;
        self.fresh.push(line);
    }

    /// Full buffer text, newest line first.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Buffer length in characters.
    pub fn char_len(&self) -> usize {
        self.buffer.chars().count()
    }

    /// Lines appended since the last drain, oldest first.
    pub fn drain_new(&mut self) -> Vec<String> {
        std::mem::take(&mut self.fresh)
    }

    /// Whether any buffered line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.buffer.contains(needle)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.fresh.clear();
    }
}

fn truncate_chars(text: &mut String, max_chars: usize) {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
    }
}
