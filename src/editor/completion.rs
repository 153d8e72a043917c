//! Tab completion: command/CVar names, CVar values, command arguments and
//! the cycle mode entered when several matches are listed.

use crate::core::command::MAX_COMMAND_NAME_LEN;
use crate::core::console::Console;
use crate::term::color;

use super::{builtins, is_ws, Editor, Key, LINE_BUFFER_CAPACITY};

/// Maximum completion matches gathered and cycled per Tab.
pub const MAX_COMPLETION_MATCHES: usize = 64;

/// Matches listed per line for command-name completion.
const MAX_CMD_MATCHES_PER_LINE: usize = 4;

/// Matches listed per line for CVar-name completion.
const MAX_CVAR_MATCHES_PER_LINE: usize = 1;

/// Matches listed per line for value/argument completion.
const MAX_ARG_MATCHES_PER_LINE: usize = 1;

/// Tab state. Live only between consecutive Tab presses; any other key
/// resets it.
#[derive(Debug)]
pub(crate) struct CompletionState {
    /// Next Tab on an empty line lists every command.
    pub list_all_on_tab: bool,
    /// First Tab gathers the match list, subsequent ones cycle it.
    pub first_try: bool,
    /// Line length before completion text was appended.
    pub old_line_used: usize,
    /// Next match to display while cycling.
    pub next_match: usize,
    /// Length of the partial string the matches were gathered for.
    pub partial_len: usize,
    /// The gathered matches.
    pub matches: Vec<String>,
}

impl Default for CompletionState {
    fn default() -> Self {
        Self {
            list_all_on_tab: false,
            first_try: true,
            old_line_used: 0,
            next_match: 0,
            partial_len: 0,
            matches: Vec::new(),
        }
    }
}

impl CompletionState {
    /// Invalidate a cycle in progress (any non-Tab key).
    pub fn reset(&mut self) {
        self.list_all_on_tab = false;
        self.first_try = true;
        self.next_match = 0;
        self.old_line_used = 0;
    }
}

impl Editor {
    /// Handle a Tab press: complete or cycle, depending on the buffer.
    pub(crate) fn tab_completion(&mut self, console: &mut Console) -> bool {
        // Not attempted unless the cursor sits at the end of the line.
        if self.cursor != self.line.len() {
            return true;
        }

        if self.line.is_empty() {
            self.list_all_commands(console);
            return true;
        }

        if self.has_full_name_in_line() {
            self.complete_argument(console);
        } else {
            self.complete_name(console);
        }
        true
    }

    /// A name is complete once whitespace follows non-whitespace content.
    pub(crate) fn has_full_name_in_line(&self) -> bool {
        let mut found_non_white = false;
        for c in self.line.chars() {
            if c != ' ' {
                found_non_white = true;
            } else if found_non_white {
                return true;
            }
        }
        false
    }

    /// Empty-line Tab: hint first, list every command on the second press.
    fn list_all_commands(&mut self, console: &mut Console) {
        if !self.completion.list_all_on_tab {
            console.print(&format!("\rPress [{}] again to list commands...\n", Key::Tab));
            self.completion.list_all_on_tab = true;
            return;
        }

        let mut names: Vec<String> = console
            .commands()
            .iter()
            .take(MAX_COMPLETION_MATCHES)
            .map(|c| c.name().to_string())
            .collect();
        names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()));

        let mut written_in_line = 0usize;
        let built_ins = builtins();
        let width = MAX_COMMAND_NAME_LEN;

        // Built-ins first, in the alternate color.
        console.set_text_color(color::cyan());
        for (i, builtin) in built_ins.iter().enumerate() {
            console.print(&format!("{:<width$}", builtin.name));
            written_in_line += 1;
            if written_in_line >= MAX_CMD_MATCHES_PER_LINE && i != built_ins.len() - 1 {
                written_in_line = 0;
                console.print("\n");
            }
        }

        console.restore_text_color();
        for (i, name) in names.iter().enumerate() {
            console.print(&format!("{name:<width$}"));
            written_in_line += 1;
            if written_in_line >= MAX_CMD_MATCHES_PER_LINE && i != names.len() - 1 {
                written_in_line = 0;
                console.print("\n");
            }
        }

        let total = console.commands().len();
        if names.len() < total {
            console.set_text_color(color::cyan());
            console.print(&format!("\n+{} commands...", total - names.len()));
            console.restore_text_color();
        }

        self.new_line_with_marker(console);
        self.completion.list_all_on_tab = false;
    }

    /// Tab on a partial first token: built-ins, then CVar names, then user
    /// command names; the first layer with matches wins.
    fn complete_name(&mut self, console: &mut Console) {
        let partial = self.line.trim_start_matches(is_ws).to_string();
        if partial.is_empty() {
            return;
        }

        let found = self.display_completion_matches(
            console,
            &partial,
            MAX_CMD_MATCHES_PER_LINE,
            true,
            true,
            |_, p, max| builtin_name_matches(p, max),
        );
        if found {
            return;
        }

        let found = self.display_completion_matches(
            console,
            &partial,
            MAX_CVAR_MATCHES_PER_LINE,
            true,
            true,
            |console, p, max| console.cvars().find_partial_names(p, max),
        );
        if found {
            return;
        }

        self.display_completion_matches(
            console,
            &partial,
            MAX_CMD_MATCHES_PER_LINE,
            true,
            true,
            |console, p, max| console.commands().find_partial_names(p, max),
        );
    }

    /// Tab behind a completed name: a CVar name inside an open `$(`, a CVar
    /// value, or the command's own argument completion.
    fn complete_argument(&mut self, console: &mut Console) {
        // Complete the variable name of an unclosed "$(..." expansion.
        if let Some(dollar) = self.line.rfind('$') {
            let after = &self.line[dollar + 1..];
            if let Some(name_part) = after.strip_prefix('(') {
                if !name_part.contains(')') {
                    let partial = name_part.to_string();
                    self.display_completion_matches(
                        console,
                        &partial,
                        MAX_CVAR_MATCHES_PER_LINE,
                        false,
                        true,
                        |console, p, max| console.cvars().find_partial_names(p, max),
                    );
                    return;
                }
            }
        }

        let line = self.line.clone();
        let trimmed = line.trim_start_matches(is_ws);
        let name: String = trimmed.chars().take_while(|&c| !is_ws(c)).collect();
        let rest = &trimmed[name.len()..];

        // The partial last token is the completion target; quoted strings
        // keep their whitespace.
        let mut quotes = false;
        let mut last_ws = 0usize;
        for (i, c) in rest.char_indices() {
            if !quotes && is_ws(c) {
                last_ws = i;
            } else if c == '"' || c == '\'' {
                quotes = !quotes;
            }
        }
        let partial = rest[last_ws..].trim_start_matches(is_ws).to_string();

        if let Some(cvar) = console.cvars().find(&name) {
            // Without a completion hook the allowed values are listed as
            // they are, so cycling only makes sense on an empty partial.
            let allow_cycling = partial.is_empty() || cvar.has_value_completion();
            let target = name.clone();
            self.display_completion_matches(
                console,
                &partial,
                MAX_ARG_MATCHES_PER_LINE,
                false,
                allow_cycling,
                move |console, p, max| {
                    console
                        .cvars()
                        .find(&target)
                        .map(|c| c.value_completion(p, max))
                        .unwrap_or_default()
                },
            );
        } else if console.commands().find(&name).is_some() {
            let target = name.clone();
            self.display_completion_matches(
                console,
                &partial,
                MAX_ARG_MATCHES_PER_LINE,
                true,
                true,
                move |console, p, max| console.argument_completion(&target, p, max),
            );
        }
    }

    /// Gather and display matches for `partial`, or cycle through the saved
    /// list on repeated Tabs. Returns false when the finder produced no
    /// matches at all.
    fn display_completion_matches(
        &mut self,
        console: &mut Console,
        partial: &str,
        max_per_line: usize,
        whitespace_after_single: bool,
        allow_cycling: bool,
        find: impl FnOnce(&Console, &str, usize) -> (Vec<String>, usize),
    ) -> bool {
        if self.completion.first_try {
            let (matches, total) = find(console, partial, MAX_COMPLETION_MATCHES);
            if total == 0 || matches.is_empty() {
                return false;
            }

            if total == 1 {
                // Exactly one: insert the suffix in place.
                let suffix = matches[0].get(partial.len()..).unwrap_or("").to_string();
                self.push_to_line(&suffix);
                if whitespace_after_single {
                    self.push_to_line(" ");
                    console.print(&format!("{suffix} "));
                } else {
                    console.print(&suffix);
                }
                self.cursor = self.line.len();
            } else {
                // Several: print the list and arm cycle mode.
                self.new_line_no_marker(console);
                list_matches(console, partial, &matches, total, max_per_line, allow_cycling);
                self.new_line_with_marker(console);
                console.print(&self.line.clone());

                if allow_cycling {
                    self.completion.first_try = false;
                    self.completion.partial_len = partial.len();
                    self.completion.old_line_used = self.line.len();
                    self.completion.next_match = 0;
                    self.completion.matches = matches;
                }
            }
            true
        } else {
            // Cycling: replace the partial with the next match, wrapping.
            let state = &self.completion;
            if state.matches.is_empty() {
                return true;
            }
            let match_str = state.matches[state.next_match].clone();
            let partial_len = state.partial_len.min(LINE_BUFFER_CAPACITY - 1);
            let old_line_used = state.old_line_used;

            self.clear_visible_edit_line(console);
            if old_line_used > partial_len {
                console.print(&self.line[..old_line_used - partial_len].to_string());
            }

            // Partial in the normal color, the completed guess highlighted.
            let head = match_str.get(..partial_len).unwrap_or(&match_str);
            let tail = match_str.get(partial_len..).unwrap_or("");
            console.print(head);
            console.set_text_color(color::cyan());
            console.print(tail);
            console.restore_text_color();

            self.line.truncate(old_line_used);
            let tail = tail.to_string();
            self.push_to_line(&tail);
            self.cursor = self.line.len();

            let state = &mut self.completion;
            state.next_match = (state.next_match + 1) % state.matches.len();
            true
        }
    }

    fn push_to_line(&mut self, text: &str) {
        let room = LINE_BUFFER_CAPACITY - 1 - self.line.len().min(LINE_BUFFER_CAPACITY - 1);
        let take = text.len().min(room);
        self.line.push_str(&text[..take]);
    }
}

/// Built-in verb names matching a partial prefix (case-insensitive).
fn builtin_name_matches(partial: &str, max: usize) -> (Vec<String>, usize) {
    let mut matches = Vec::new();
    let mut total = 0usize;
    for builtin in builtins() {
        if builtin.name.len() >= partial.len()
            && builtin.name[..partial.len()].eq_ignore_ascii_case(partial)
        {
            if matches.len() < max {
                matches.push(builtin.name.to_string());
            }
            total += 1;
        }
    }
    (matches, total)
}

/// Print a formatted match list; the shared partial prefix is highlighted
/// for cycling-eligible categories, and a `+K matches...` line reports
/// anything beyond the gathered maximum.
fn list_matches(
    console: &mut Console,
    partial: &str,
    matches: &[String],
    total: usize,
    max_per_line: usize,
    colored: bool,
) {
    let partial_len = partial.len();
    let mut written_in_line = 0usize;

    for i in 0..total {
        if i == matches.len() {
            console.set_text_color(color::cyan());
            console.print(&format!("+{} matches...", total - i));
            console.restore_text_color();
            break;
        }

        let m = &matches[i];
        let head = m.get(..partial_len).unwrap_or(m);
        let tail = m.get(partial_len..).unwrap_or("");

        if colored {
            console.set_text_color(color::cyan());
            console.print(head);
            console.restore_text_color();
        } else {
            console.print(head);
        }

        if max_per_line > 1 {
            let spacing = MAX_COMMAND_NAME_LEN.saturating_sub(partial_len);
            console.print(&format!("{tail:<spacing$}"));
        } else {
            console.print(tail);
        }

        written_in_line += 1;
        if written_in_line >= max_per_line {
            if total - i > 1 {
                console.print("\n");
            }
            written_in_line = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::CommandDef;
    use crate::core::cvar::CVarFlags;
    use crate::term::MemoryTerm;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rig() -> (Editor, Console, Rc<RefCell<String>>) {
        let term = MemoryTerm::new();
        let log = term.log();
        let console = Console::new().with_term(Box::new(term));
        console.silence_errors(true);
        (Editor::new(), console, log)
    }

    fn type_line(editor: &mut Editor, console: &mut Console, text: &str) {
        for ch in text.chars() {
            editor.handle_key(Key::Char(ch), console);
        }
    }

    #[test]
    fn test_single_match_inserts_suffix_and_space() {
        let (mut editor, mut console, _) = rig();
        console
            .register_command(CommandDef::new("frobnicate", |_, _| {}))
            .unwrap();

        type_line(&mut editor, &mut console, "frob");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "frobnicate ");
        assert_eq!(editor.cursor(), editor.line().len());
    }

    #[test]
    fn test_tab_cycling_through_matches() {
        let (mut editor, mut console, _) = rig();
        for name in ["alpha", "beta", "bravo"] {
            console.register_command(CommandDef::new(name, |_, _| {})).unwrap();
        }

        type_line(&mut editor, &mut console, "b");

        // First Tab lists beta/bravo; the line is unchanged.
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "b");

        // Subsequent Tabs cycle alphabetically, wrapping around.
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "beta");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "bravo");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "beta");
    }

    #[test]
    fn test_cycle_state_invalidated_by_other_keys() {
        let (mut editor, mut console, _) = rig();
        for name in ["beta", "bravo"] {
            console.register_command(CommandDef::new(name, |_, _| {})).unwrap();
        }

        type_line(&mut editor, &mut console, "b");
        editor.handle_key(Key::Tab, &mut console);
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "beta");

        // Typing resets the cycle; the next Tab starts a fresh match.
        editor.handle_key(Key::Char('x'), &mut console);
        assert_eq!(editor.line(), "betax");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "betax");
    }

    #[test]
    fn test_builtins_win_over_commands() {
        let (mut editor, mut console, _) = rig();
        console
            .register_command(CommandDef::new("exitLevel", |_, _| {}))
            .unwrap();

        // "exit" prefix matches the built-in first; single match inserts
        // nothing extra beyond the space.
        type_line(&mut editor, &mut console, "exi");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "exit ");
    }

    #[test]
    fn test_cvar_name_completion() {
        let (mut editor, mut console, _) = rig();
        console
            .cvars_mut()
            .register_int("snd_volume", "", CVarFlags::NONE, 5, 0, 0)
            .unwrap();

        type_line(&mut editor, &mut console, "snd_v");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "snd_volume ");
    }

    #[test]
    fn test_cvar_value_completion_lists_allowed() {
        let (mut editor, mut console, log) = rig();
        console
            .cvars_mut()
            .register_string(
                "quality",
                "",
                CVarFlags::RANGE_CHECK,
                "low",
                &["low", "medium", "high"],
            )
            .unwrap();

        type_line(&mut editor, &mut console, "quality ");
        editor.handle_key(Key::Tab, &mut console);

        let printed = log.borrow();
        assert!(printed.contains("low"));
        assert!(printed.contains("medium"));
        assert!(printed.contains("high"));
        // Line itself unchanged: multiple matches only list.
        assert!(printed.ends_with("quality "));
    }

    #[test]
    fn test_expansion_cvar_name_completion() {
        let (mut editor, mut console, _) = rig();
        console
            .cvars_mut()
            .register_string("greeting", "", CVarFlags::NONE, "hi", &[])
            .unwrap();
        console
            .register_command(CommandDef::new("echo2", |_, _| {}))
            .unwrap();

        type_line(&mut editor, &mut console, "echo2 $(greet");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "echo2 $(greeting");
    }

    #[test]
    fn test_cvar_value_completion_hook_cycles() {
        let (mut editor, mut console, _) = rig();
        console
            .cvars_mut()
            .register_string("map", "", CVarFlags::NONE, "canyon", &[])
            .unwrap();
        console.cvars_mut().set_value_completion(
            "map",
            Box::new(|partial, _| {
                let maps = ["canyon", "cavern", "citadel"];
                let matches: Vec<String> = maps
                    .iter()
                    .filter(|m| m.starts_with(partial))
                    .map(|m| m.to_string())
                    .collect();
                let total = matches.len();
                (matches, total)
            }),
        );

        type_line(&mut editor, &mut console, "map ca");
        editor.handle_key(Key::Tab, &mut console);
        // Two matches: listed only, then cycled on the next Tabs.
        assert_eq!(editor.line(), "map ca");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "map canyon");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "map cavern");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "map canyon");
    }

    #[test]
    fn test_command_argument_completion_hook() {
        let (mut editor, mut console, _) = rig();
        console
            .register_command(CommandDef::new("load", |_, _| {}).completion(|_, partial, _| {
                let maps = ["canyon", "cavern", "citadel"];
                let matches: Vec<String> = maps
                    .iter()
                    .filter(|m| m.starts_with(partial))
                    .map(|m| m.to_string())
                    .collect();
                let total = matches.len();
                (matches, total)
            }))
            .unwrap();

        type_line(&mut editor, &mut console, "load cany");
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "load canyon ");
    }

    #[test]
    fn test_empty_line_double_tab_lists_commands() {
        let (mut editor, mut console, log) = rig();
        console
            .register_command(CommandDef::new("mycmd", |_, _| {}))
            .unwrap();

        editor.handle_key(Key::Tab, &mut console);
        assert!(log.borrow().contains("Press [Tab] again"));

        editor.handle_key(Key::Tab, &mut console);
        let printed = log.borrow();
        assert!(printed.contains("mycmd"));
        assert!(printed.contains("exit"));
        assert!(printed.contains("histView"));
    }

    #[test]
    fn test_no_completion_mid_line() {
        let (mut editor, mut console, _) = rig();
        console
            .register_command(CommandDef::new("frob", |_, _| {}))
            .unwrap();

        type_line(&mut editor, &mut console, "fr");
        editor.handle_key(Key::Left, &mut console);
        editor.handle_key(Key::Tab, &mut console);
        assert_eq!(editor.line(), "fr");
    }

    #[test]
    fn test_plus_more_matches_reported() {
        let (mut editor, mut console, log) = rig();
        for i in 0..MAX_COMPLETION_MATCHES + 5 {
            console
                .cvars_mut()
                .register_int(&format!("m_var{i:03}"), "", CVarFlags::NONE, 0, 0, 0)
                .unwrap();
        }

        type_line(&mut editor, &mut console, "m_var");
        editor.handle_key(Key::Tab, &mut console);
        assert!(log.borrow().contains("+5 matches..."));
    }
}
