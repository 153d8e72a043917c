//! The command buffer: pending command text awaiting buffered execution.
//!
//! A single bounded text buffer with semicolons delimiting entries. Inserts
//! go to the front, appends to the back; the execute loop consumes from the
//! front and shifts the remainder down before each dispatch.

use crate::hooks::ErrorSink;

/// Capacity of the command buffer in bytes.
pub const COMMAND_BUFFER_CAPACITY: usize = 65535;

/// Separator between commands on the same line and in the buffer.
pub const COMMAND_SEPARATOR: char = ';';

/// Bounded FIFO of pending command text.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    data: String,
}

impl CommandBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently pending.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no text is pending.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The pending text, separators included.
    pub fn contents(&self) -> &str {
        &self.data
    }

    /// Drop all pending text.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Append `text` plus a trailing separator. On overflow the text is
    /// dropped and reported.
    pub fn append(&mut self, text: &str, sink: &ErrorSink) -> bool {
        if text.is_empty() {
            return true;
        }
        if !self.fits(text, sink, "execAppend") {
            return false;
        }
        self.data.push_str(text);
        self.data.push(COMMAND_SEPARATOR);
        true
    }

    /// Prepend `text` plus a trailing separator, shifting the pending text
    /// down. On overflow the text is dropped and reported.
    pub fn insert(&mut self, text: &str, sink: &ErrorSink) -> bool {
        if text.is_empty() {
            return true;
        }
        if !self.fits(text, sink, "execInsert") {
            return false;
        }
        self.data.insert(0, COMMAND_SEPARATOR);
        self.data.insert_str(0, text);
        true
    }

    fn fits(&self, text: &str, sink: &ErrorSink, op: &str) -> bool {
        if self.data.len() + text.len() + 1 >= COMMAND_BUFFER_CAPACITY {
            sink.report(format_args!("Buffer overflow! Command buffer depleted in {op}!"));
            return false;
        }
        true
    }

    /// Move the pending text out, leaving the buffer empty. Paired with
    /// [`restore`](Self::restore) around the extract-shift-dispatch cycle.
    pub(crate) fn take(&mut self) -> String {
        std::mem::take(&mut self.data)
    }

    /// Put (possibly shortened) pending text back.
    pub(crate) fn restore(&mut self, data: String) {
        debug_assert!(self.data.is_empty());
        self.data = data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> ErrorSink {
        ErrorSink::new(Box::new(|_| {}))
    }

    #[test]
    fn test_append_and_insert_ordering() {
        let sink = quiet();
        let mut buf = CommandBuffer::new();

        assert!(buf.append("second", &sink));
        assert!(buf.append("third", &sink));
        assert!(buf.insert("first", &sink));

        assert_eq!(buf.contents(), "first;second;third;");
        assert_eq!(buf.len(), 19);
    }

    #[test]
    fn test_empty_text_is_noop() {
        let sink = quiet();
        let mut buf = CommandBuffer::new();
        assert!(buf.append("", &sink));
        assert!(buf.insert("", &sink));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_overflow_drops_text() {
        let sink = quiet();
        let mut buf = CommandBuffer::new();
        let big = "x".repeat(COMMAND_BUFFER_CAPACITY - 10);
        assert!(buf.append(&big, &sink));

        let before = buf.len();
        assert!(!buf.append("does not fit", &sink));
        assert!(!buf.insert("does not fit", &sink));
        assert_eq!(buf.len(), before);
    }

    #[test]
    fn test_take_restore_cycle() {
        let sink = quiet();
        let mut buf = CommandBuffer::new();
        buf.append("a", &sink);

        let mut data = buf.take();
        assert!(buf.is_empty());
        data.drain(..2); // consume "a;"
        buf.restore(data);
        assert!(buf.is_empty());
    }
}
