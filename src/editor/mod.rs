//! Interactive line editor: edit buffer, history, completion and the
//! built-in verbs.
//!
//! The editor is a pure state machine driven by [`Editor::handle_key`]. It
//! owns no terminal: every entry point takes `&mut Console` and prints
//! through the console's [`Term`](crate::Term) backend, so the same editor
//! runs over a raw TTY, a socket or a test capture. Keystroke decoding is
//! the embedder's job; a native terminal layer should deliver decoded
//! [`Key`] events from a single consumer thread.

mod completion;
mod history;

pub use completion::MAX_COMPLETION_MATCHES;
pub use history::{History, HISTORY_CAPACITY, HISTORY_FILE};

use std::fmt;

use crate::core::args::CommandArgs;
use crate::core::command::ExecMode;
use crate::core::console::Console;

use completion::CompletionState;

/// Maximum length in bytes of the input line.
pub const LINE_BUFFER_CAPACITY: usize = 2048;

/// A decoded key event.
///
/// The wire format (see [`Key::from_raw`]) is a 32-bit code whose low byte
/// is an ASCII character and whose upper bits carry at most one sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Submit the current line.
    Return,
    /// Completion / completion cycling.
    Tab,
    /// Delete the character before the cursor.
    Backspace,
    /// Delete the character under the cursor.
    Delete,
    /// Previous (older) history entry.
    Up,
    /// Next (newer) history entry.
    Down,
    /// Move the cursor right.
    Right,
    /// Move the cursor left.
    Left,
    /// Discard the current line.
    Escape,
    /// Control chord carrying the accompanying character.
    Control(char),
    /// A printable character.
    Char(char),
}

impl Key {
    const RETURN_BIT: u32 = 1 << 8;
    const TAB_BIT: u32 = 1 << 9;
    const BACKSPACE_BIT: u32 = 1 << 10;
    const DELETE_BIT: u32 = 1 << 11;
    const UP_BIT: u32 = 1 << 12;
    const DOWN_BIT: u32 = 1 << 13;
    const RIGHT_BIT: u32 = 1 << 14;
    const LEFT_BIT: u32 = 1 << 15;
    const ESCAPE_BIT: u32 = 1 << 16;
    const CONTROL_BIT: u32 = 1 << 17;

    /// Decode the 32-bit wire form: low 8 bits are the ASCII character,
    /// upper bits one sentinel. A pure ASCII key uses sentinel zero.
    pub fn from_raw(code: u32) -> Self {
        let ch = (code & 0xFF) as u8 as char;
        match code & !0xFF {
            0 => Key::Char(ch),
            Self::RETURN_BIT => Key::Return,
            Self::TAB_BIT => Key::Tab,
            Self::BACKSPACE_BIT => Key::Backspace,
            Self::DELETE_BIT => Key::Delete,
            Self::UP_BIT => Key::Up,
            Self::DOWN_BIT => Key::Down,
            Self::RIGHT_BIT => Key::Right,
            Self::LEFT_BIT => Key::Left,
            Self::ESCAPE_BIT => Key::Escape,
            Self::CONTROL_BIT => Key::Control(ch),
            _ => Key::Char(ch),
        }
    }

    /// Encode back to the 32-bit wire form.
    pub fn to_raw(self) -> u32 {
        match self {
            Key::Char(c) => c as u32 & 0xFF,
            Key::Return => Self::RETURN_BIT,
            Key::Tab => Self::TAB_BIT,
            Key::Backspace => Self::BACKSPACE_BIT,
            Key::Delete => Self::DELETE_BIT,
            Key::Up => Self::UP_BIT,
            Key::Down => Self::DOWN_BIT,
            Key::Right => Self::RIGHT_BIT,
            Key::Left => Self::LEFT_BIT,
            Key::Escape => Self::ESCAPE_BIT,
            Key::Control(c) => Self::CONTROL_BIT | (c as u32 & 0xFF),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Return => write!(f, "Return"),
            Key::Tab => write!(f, "Tab"),
            Key::Backspace => write!(f, "Backspace"),
            Key::Delete => write!(f, "Delete"),
            Key::Up => write!(f, "UpArrow"),
            Key::Down => write!(f, "DownArrow"),
            Key::Right => write!(f, "RightArrow"),
            Key::Left => write!(f, "LeftArrow"),
            Key::Escape => write!(f, "Escape"),
            Key::Control(_) => write!(f, "Control"),
            Key::Char(c) => write!(f, "{c}"),
        }
    }
}

/// One built-in editor verb. Built-ins take no arguments.
pub struct BuiltInCmd {
    /// Verb name, e.g. `exit`.
    pub name: &'static str,
    /// One-line description.
    pub desc: &'static str,
    handler: fn(&mut Editor, &mut Console),
}

const BUILT_IN_CMDS: [BuiltInCmd; 6] = [
    BuiltInCmd {
        name: "exit",
        desc: "Exits the interactive terminal mode.",
        handler: |editor, _| editor.request_exit(),
    },
    BuiltInCmd {
        name: "clear",
        desc: "Clears the terminal screen.",
        handler: Editor::clear,
    },
    BuiltInCmd {
        name: "histView",
        desc: "Prints the current command history.",
        handler: Editor::print_command_history,
    },
    BuiltInCmd {
        name: "histClear",
        desc: "Erases the current command history.",
        handler: |editor, _| editor.history.clear(),
    },
    BuiltInCmd {
        name: "histSave",
        desc: "Saves the current command history to \"cmdhist.txt\".",
        handler: Editor::save_command_history,
    },
    BuiltInCmd {
        name: "histLoad",
        desc: "Load previous command history from \"cmdhist.txt\".",
        handler: Editor::load_command_history,
    },
];

/// The fixed table of built-in verbs.
pub fn builtins() -> &'static [BuiltInCmd] {
    &BUILT_IN_CMDS
}

/// Interactive line editor state machine.
///
/// ```
/// use devcon::{Console, Editor, Key, MemoryTerm};
///
/// let mut console = Console::new().with_term(Box::new(MemoryTerm::new()));
/// let mut editor = Editor::new();
/// for ch in "echo hi".chars() {
///     editor.handle_key(Key::Char(ch), &mut console);
/// }
/// assert_eq!(editor.line(), "echo hi");
/// editor.handle_key(Key::Return, &mut console);
/// assert_eq!(editor.line(), "");
/// ```
pub struct Editor {
    pub(crate) line: String,
    pub(crate) cursor: usize,
    pub(crate) history: History,
    pub(crate) marker: String,
    pub(crate) line_has_marker: bool,
    pub(crate) completion: CompletionState,
    exec_mode: ExecMode,
    exit_requested: bool,
    on_exit: Option<Box<dyn FnMut() -> bool>>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    /// Editor with the default `"> "` newline marker.
    pub fn new() -> Self {
        Self::with_marker("> ")
    }

    /// Editor with a custom newline marker.
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            line: String::new(),
            cursor: 0,
            history: History::new(),
            marker: marker.into(),
            line_has_marker: false,
            completion: CompletionState::default(),
            exec_mode: ExecMode::Append,
            exit_requested: false,
            on_exit: None,
        }
    }

    // ----- state queries -----

    /// The in-progress input line.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Cursor position in bytes, `0 ..= line().len()`.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The session command history.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The session command history, mutable.
    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Execution mode used when dispatching user commands (initially
    /// buffered append).
    pub fn exec_mode(&self) -> ExecMode {
        self.exec_mode
    }

    /// Change the dispatch mode for user commands.
    pub fn set_exec_mode(&mut self, mode: ExecMode) {
        self.exec_mode = mode;
    }

    // ----- exit discipline -----

    /// True after the built-in `exit` ran (and was not vetoed).
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Withdraw a pending exit request.
    pub fn cancel_exit(&mut self) {
        self.exit_requested = false;
    }

    /// Fire the built-in `exit`, as if typed. The `on_exit` callback may
    /// veto by returning false.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
        if let Some(on_exit) = &mut self.on_exit {
            if !on_exit() {
                self.exit_requested = false;
            }
        }
    }

    /// Install the exit callback. Return false from it to veto the exit.
    pub fn set_on_exit(&mut self, callback: impl FnMut() -> bool + 'static) {
        self.on_exit = Some(Box::new(callback));
    }

    // ----- key handling -----

    /// Feed one decoded key event. Returns true when the key was handled.
    pub fn handle_key(&mut self, key: Key, console: &mut Console) -> bool {
        // Any non-Tab input invalidates a completion cycle in progress.
        if key != Key::Tab {
            self.completion.reset();
        }

        match key {
            Key::Return => self.finish_command(console),
            Key::Tab => self.tab_completion(console),
            Key::Backspace => self.pop_char(console),
            Key::Delete => self.del_char(console),
            Key::Up => self.older_from_history(console),
            Key::Down => self.newer_from_history(console),
            Key::Right => self.navigate_right(console),
            Key::Left => self.navigate_left(console),
            Key::Escape => self.discard_input(console),
            Key::Control(chr) => self.handle_ctrl_key(chr, console),
            Key::Char(chr) => self.insert_char(console, chr),
        }
    }

    /// Call after running buffered commands so the newline marker is drawn
    /// once the pipeline goes quiet.
    pub fn update(&mut self, console: &mut Console) {
        if !self.line_has_marker && !self.exit_requested {
            console.print(&self.marker.clone());
            self.line_has_marker = true;
        }
    }

    /// Clear the terminal screen and reset the editor's visual state.
    pub fn clear(&mut self, console: &mut Console) {
        console.term_mut().clear_screen();
        console.print(&self.marker.clone());

        self.line.clear();
        self.cursor = 0;
        self.line_has_marker = true;
        self.completion = CompletionState::default();
    }

    // ----- line buffer primitives -----

    fn is_line_empty(&self) -> bool {
        self.line.is_empty()
    }

    /// Replace the edit line, redrawing it.
    pub(crate) fn set_line(&mut self, console: &mut Console, text: &str) {
        self.clear_visible_edit_line(console);
        if text.is_empty() {
            self.clear_line_buffer();
        } else {
            console.print(text);
            self.line = text.to_string();
            if self.line.len() > LINE_BUFFER_CAPACITY - 1 {
                self.line.truncate(LINE_BUFFER_CAPACITY - 1);
            }
            self.cursor = self.line.len();
        }
    }

    fn clear_line_buffer(&mut self) {
        self.line.clear();
        self.cursor = 0;
    }

    pub(crate) fn new_line_no_marker(&mut self, console: &mut Console) {
        console.print("\n");
        self.line_has_marker = false;
    }

    pub(crate) fn new_line_with_marker(&mut self, console: &mut Console) {
        console.print(&format!("\n{}", self.marker));
        self.line_has_marker = true;
    }

    /// Blank out the visible input line and reprint the marker. The cursor
    /// repositioning works without a gotoxy-style primitive: carriage
    /// return, blanks, carriage return.
    pub(crate) fn clear_visible_edit_line(&mut self, console: &mut Console) {
        let blanks = " ".repeat(self.line.len() + self.marker.len());
        console.print(&format!("\r{blanks}\r{}", self.marker));
        self.line_has_marker = true;
    }

    /// Redraw up to the cursor so the terminal caret lands on it.
    pub(crate) fn redraw_input_line(&mut self, console: &mut Console) {
        console.print(&format!("\r{}{}", self.marker, &self.line[..self.cursor]));
    }

    // ----- command submission -----

    fn finish_command(&mut self, console: &mut Console) -> bool {
        // Break the line but let the command run before the next marker.
        self.new_line_no_marker(console);

        if !self.is_line_empty() {
            let line = self.line.clone();
            self.history.add(&line);
            self.exec_cmd_line(console, &line);
            self.clear_line_buffer();
        }

        // Hold the marker back while the pipeline still has work queued.
        let can_add_marker = !console.has_buffered_commands();
        if can_add_marker && !self.line_has_marker && !self.exit_requested {
            console.print(&self.marker.clone());
            self.line_has_marker = true;
        }
        true
    }

    /// Run one submitted line: CVar shortcut first, then built-ins, then
    /// user commands through the pipeline.
    pub(crate) fn exec_cmd_line(&mut self, console: &mut Console, cmd: &str) {
        let trimmed = cmd.trim_start_matches(is_ws);
        let name: String = trimmed.chars().take_while(|&c| !is_ws(c)).collect();
        if name.is_empty() {
            return;
        }

        // "varName value" updates the variable; a bare "varName" prints it.
        if console.cvars().find(&name).is_some() {
            let args = CommandArgs::parse(cmd, console.sink());
            if args.is_empty() {
                let (value, default) = {
                    let cvar = console.cvars().find(&name).unwrap();
                    (cvar.value_string(), cvar.default_value_string())
                };
                console.print(&format!("{name} is: \"{value}\"  |  default: \"{default}\"\n"));
            } else {
                if args.len() > 1 {
                    console.print_warning("CVar update takes one argument. Ignoring extraneous ones...");
                }
                let ok = console
                    .cvars_mut()
                    .find_mut(&name)
                    .unwrap()
                    .set_string(&args[0])
                    .is_ok();
                if !ok {
                    let message = format!("Cannot set {name} to \"{}\"!", &args[0]);
                    console.print_warning(&message);
                }
            }
            return;
        }

        if let Some(builtin) = builtin_by_name(&name) {
            (builtin.handler)(self, console);
            return;
        }

        if console.commands().find(&name).is_some() {
            console.execute(self.exec_mode, trimmed);
            return;
        }

        console.print(&format!("{name}: Command not found.\n"));
    }

    // ----- history navigation -----

    fn older_from_history(&mut self, console: &mut Console) -> bool {
        let cmd = self.history.older(&self.line);
        self.set_line(console, &cmd);
        true
    }

    fn newer_from_history(&mut self, console: &mut Console) -> bool {
        let cmd = self.history.newer(&self.line);
        self.set_line(console, &cmd);
        true
    }

    fn print_command_history(&mut self, console: &mut Console) {
        console.print_ln("----- Command History -----");
        for (index, cmd) in self.history.iter().enumerate() {
            console.print(&format!("[{index:02}]: {cmd}\n"));
        }
    }

    fn save_command_history(&mut self, console: &mut Console) {
        match self.history.save_to(console.io.as_mut(), HISTORY_FILE) {
            Ok(()) => {
                console.print(&format!("Command history saved to \"{HISTORY_FILE}\".\n"));
            }
            Err(e) => {
                console.sink().report(format_args!(
                    "Unable to save command history to \"{HISTORY_FILE}\": {e}"
                ));
            }
        }
    }

    fn load_command_history(&mut self, console: &mut Console) {
        match self.history.load_from(console.io.as_mut(), HISTORY_FILE) {
            Ok(()) => {
                console.print(&format!("Command history restored from \"{HISTORY_FILE}\".\n"));
            }
            Err(e) => {
                console.sink().report(format_args!(
                    "Unable to load command history from \"{HISTORY_FILE}\": {e}"
                ));
            }
        }
    }

    // ----- cursor movement and editing -----

    fn navigate_left(&mut self, console: &mut Console) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.redraw_input_line(console);
        }
        true
    }

    fn navigate_right(&mut self, console: &mut Console) -> bool {
        if self.cursor < self.line.len() {
            self.cursor += 1;
            self.redraw_input_line(console);
        }
        true
    }

    fn discard_input(&mut self, console: &mut Console) -> bool {
        self.history.reset_view();
        self.set_line(console, "");
        true
    }

    fn handle_ctrl_key(&mut self, chr: char, console: &mut Console) -> bool {
        match chr {
            // Copy the input line / paste by replaying inserts so the
            // cursor position is honored.
            'c' => {
                let line = self.line.clone();
                console.term_mut().set_clipboard(&line);
                true
            }
            'v' => {
                if let Some(text) = console.term_mut().clipboard() {
                    for ch in text.chars() {
                        self.insert_char(console, ch);
                    }
                }
                true
            }
            'l' => {
                self.clear(console);
                true
            }
            'n' => self.newer_from_history(console),
            'p' => self.older_from_history(console),
            _ => false,
        }
    }

    fn pop_char(&mut self, console: &mut Console) -> bool {
        if self.is_line_empty() || self.cursor == 0 {
            return true;
        }

        self.clear_visible_edit_line(console);
        self.cursor -= 1;
        self.line.remove(self.cursor);

        console.print(&self.line.clone());
        if self.cursor != self.line.len() {
            self.redraw_input_line(console);
        }
        true
    }

    fn del_char(&mut self, console: &mut Console) -> bool {
        if self.is_line_empty() || self.cursor == self.line.len() {
            return true;
        }

        self.clear_visible_edit_line(console);
        self.line.remove(self.cursor);

        console.print(&self.line.clone());
        self.redraw_input_line(console);
        true
    }

    fn insert_char(&mut self, console: &mut Console, chr: char) -> bool {
        let printable = chr.is_ascii_graphic() || chr == ' ';
        if !printable || self.line.len() >= LINE_BUFFER_CAPACITY - 1 {
            return false;
        }

        if self.cursor == self.line.len() {
            self.line.push(chr);
            self.cursor += 1;
            console.print(&chr.to_string());
        } else {
            self.line.insert(self.cursor, chr);
            self.cursor += 1;
            self.clear_visible_edit_line(console);
            console.print(&self.line.clone());
            self.redraw_input_line(console);
        }
        true
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("line", &self.line)
            .field("cursor", &self.cursor)
            .field("history_len", &self.history.len())
            .field("exit_requested", &self.exit_requested)
            .finish_non_exhaustive()
    }
}

/// Whitespace per the command grammar: anything at or below ASCII space.
pub(crate) fn is_ws(c: char) -> bool {
    c <= ' '
}

pub(crate) fn builtin_by_name(name: &str) -> Option<&'static BuiltInCmd> {
    BUILT_IN_CMDS
        .iter()
        .find(|b| b.name.eq_ignore_ascii_case(name))
}
