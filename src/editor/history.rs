//! Session command history: a bounded list with an up/down view cursor.

use std::io::{BufRead, Write};

use crate::hooks::FileIo;

/// Maximum number of commands kept in the session history.
pub const HISTORY_CAPACITY: usize = 40;

/// File used by the `histSave`/`histLoad` built-ins: one command per line.
pub const HISTORY_FILE: &str = "cmdhist.txt";

/// Recent command lines, oldest first.
///
/// `older`/`newer` step a view cursor through the entries for the Up/Down
/// keys; both skip over an entry equal to the current edit line so stepping
/// between two adjacent identical candidates feels responsive. The cursor
/// may sit one past the newest entry, which reads as an empty line.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    view: usize,
}

impl History {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored commands.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by index, oldest first.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|s| s.as_str())
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|s| s.as_str())
    }

    /// Append a command. Once full, the oldest entry is dropped. The view
    /// cursor snaps to the newest entry.
    pub fn add(&mut self, cmd: &str) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.remove(0);
        }
        self.entries.push(cmd.to_string());
        self.view = self.entries.len() - 1;
    }

    /// Drop everything and reset the view.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.view = 0;
    }

    /// Reset the view cursor to the newest entry.
    pub fn reset_view(&mut self) {
        self.view = self.entries.len().saturating_sub(1);
    }

    /// Step toward the oldest entry (Up). `line` is the current edit
    /// buffer; an entry equal to it is skipped once.
    pub fn older(&mut self, line: &str) -> String {
        let mut cmd = self.entry_or_empty(self.view);
        if self.view > 0 {
            self.view -= 1;
            if cmd == line {
                cmd = self.entry_or_empty(self.view);
            }
        }
        cmd
    }

    /// Step toward the newest entry (Down); past the newest an empty line
    /// is returned.
    pub fn newer(&mut self, line: &str) -> String {
        if self.view + 1 >= self.entries.len() {
            return String::new();
        }
        self.view += 1;
        let mut cmd = self.entry_or_empty(self.view);
        if cmd == line && self.view < self.entries.len() {
            self.view += 1;
            cmd = self.entry_or_empty(self.view);
        }
        cmd
    }

    fn entry_or_empty(&self, index: usize) -> String {
        self.entries.get(index).cloned().unwrap_or_default()
    }

    /// Write one command per line through the I/O collaborator.
    pub fn save_to(&self, io: &mut dyn FileIo, path: &str) -> std::io::Result<()> {
        let mut out = io.open_write(path)?;
        for cmd in &self.entries {
            writeln!(out, "{cmd}")?;
        }
        Ok(())
    }

    /// Replace the in-memory history with the file's lines.
    pub fn load_from(&mut self, io: &mut dyn FileIo, path: &str) -> std::io::Result<()> {
        let reader = io.open_read(path)?;
        self.clear();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end();
            if !line.is_empty() {
                self.add(line);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::StdFileIo;
    use std::io::Write as _;

    #[test]
    fn test_add_until_full_then_shift() {
        let mut hist = History::new();
        for i in 0..HISTORY_CAPACITY + 3 {
            hist.add(&format!("cmd{i}"));
        }
        assert_eq!(hist.len(), HISTORY_CAPACITY);
        assert_eq!(hist.get(0), Some("cmd3"));
        assert_eq!(
            hist.get(HISTORY_CAPACITY - 1),
            Some(format!("cmd{}", HISTORY_CAPACITY + 2).as_str())
        );
    }

    #[test]
    fn test_older_walks_toward_oldest() {
        let mut hist = History::new();
        hist.add("first");
        hist.add("second");
        hist.add("third");

        assert_eq!(hist.older(""), "third");
        assert_eq!(hist.older("third"), "second");
        assert_eq!(hist.older("second"), "first");
        // Pinned at the oldest.
        assert_eq!(hist.older("first"), "first");
    }

    #[test]
    fn test_newer_walks_back_and_blanks_out() {
        let mut hist = History::new();
        hist.add("first");
        hist.add("second");
        hist.add("third");

        hist.older("");
        hist.older("third");
        hist.older("second"); // view on "first"

        assert_eq!(hist.newer("first"), "second");
        assert_eq!(hist.newer("second"), "third");
        // Past the newest entry the line goes blank.
        assert_eq!(hist.newer("third"), "");
    }

    #[test]
    fn test_skip_equal_entry() {
        let mut hist = History::new();
        hist.add("alpha");
        hist.add("beta");

        // Line already shows "beta": a single Up lands on "alpha" directly.
        assert_eq!(hist.older("beta"), "alpha");
    }

    #[test]
    fn test_empty_history_yields_empty_line() {
        let mut hist = History::new();
        assert_eq!(hist.older("whatever"), "");
        assert_eq!(hist.newer("whatever"), "");
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist.txt");
        let path = path.to_str().unwrap();

        let mut hist = History::new();
        hist.add("set fps 120");
        hist.add("echo hello");

        let mut io = StdFileIo;
        hist.save_to(&mut io, path).unwrap();

        let mut restored = History::new();
        restored.add("stale entry");
        restored.load_from(&mut io, path).unwrap();

        let entries: Vec<&str> = restored.iter().collect();
        assert_eq!(entries, ["set fps 120", "echo hello"]);
    }

    #[test]
    fn test_load_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist.txt");
        {
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(f, "one\n\ntwo  ").unwrap();
        }

        let mut hist = History::new();
        hist.load_from(&mut StdFileIo, path.to_str().unwrap()).unwrap();
        let entries: Vec<&str> = hist.iter().collect();
        assert_eq!(entries, ["one", "two"]);
    }
}
