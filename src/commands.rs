//! The default command set: CVar manipulation, listings and config files.
//!
//! These are plain consumers of the public registries and formatters,
//! registered with [`install_default_commands`]. The `set`/`reset` pair
//! goes through the privileged registry path so config replay and the
//! startup command line can target `InitOnly`/`ReadOnly` variables.

use crate::core::args::CommandArgs;
use crate::core::command::{CommandDef, ExecMode};
use crate::core::console::Console;
use crate::core::cvar::{CVarFlags, CVarKind};
use crate::editor::builtins;
use crate::error::ConsoleError;
use crate::persist::DEFAULT_CONFIG_FILE;
use crate::term::color;

/// Register the default commands on a console. Call once at startup, after
/// the CVars they might collide with.
pub fn install_default_commands(console: &mut Console) -> Result<(), ConsoleError> {
    console.register_command(
        CommandDef::new("print", cmd_print)
            .description("Print CVar value, flags and description.")
            .completion(complete_cvar_name),
    )?;
    console.register_command(
        CommandDef::new("help", cmd_help)
            .description("Prints a description comment for the given command or CVar.")
            .completion(complete_cvar_or_cmd_name),
    )?;
    console.register_command(CommandDef::new("echo", cmd_echo).description(
        "Echoes the given arguments to the terminal. If no args provided, prints a blank line.",
    ))?;
    console.register_command(
        CommandDef::new("alias", cmd_alias).description("Create an alias for a command string."),
    )?;
    console.register_command(CommandDef::new("unalias", cmd_unalias).description(
        "Removes the command alias. Does nothing if the name refers to a command or CVar.",
    ))?;
    console.register_command(
        CommandDef::new("isCmd", cmd_is_cmd)
            .description("Test if the name defines a command or a command alias."),
    )?;
    console.register_command(
        CommandDef::new("isCVar", cmd_is_cvar).description("Test if the name defines a CVar."),
    )?;
    console.register_command(
        CommandDef::new("reset", cmd_reset)
            .description("Resets the CVar to its default value.")
            .completion(complete_cvar_name),
    )?;
    console.register_command(
        CommandDef::new("toggle", cmd_toggle)
            .description(
                "Cycles the allowed values of a CVar. Toggles boolean CVars between true and false.",
            )
            .completion(complete_cvar_name),
    )?;
    console.register_command(
        CommandDef::new("set", cmd_set)
            .description(
                "Set the value of a CVar if it is writable. Optionally creates the var if it doesn't exists.",
            )
            .completion(complete_cvar_name),
    )?;
    console.register_command(
        CommandDef::new("varAdd", cmd_var_add)
            .description("Adds a value to a numeric CVar. Does nothing for strings, enums or booleans.")
            .completion(complete_cvar_name),
    )?;
    console.register_command(
        CommandDef::new("varSub", cmd_var_sub)
            .description(
                "Subtract a value from a numeric CVar. Does nothing for strings, enums or booleans.",
            )
            .completion(complete_cvar_name),
    )?;
    console.register_command(
        CommandDef::new("varMul", cmd_var_mul)
            .description(
                "Multiply a value to a numeric CVar. Does nothing for strings, enums or booleans.",
            )
            .completion(complete_cvar_name),
    )?;
    console.register_command(
        CommandDef::new("varDiv", cmd_var_div)
            .description(
                "Divide a value with a numeric CVar. Does nothing for strings, enums or booleans.",
            )
            .completion(complete_cvar_name),
    )?;
    console.register_command(
        CommandDef::new("listCmds", cmd_list_cmds)
            .description("Prints a list of the available commands."),
    )?;
    console.register_command(
        CommandDef::new("listCVars", cmd_list_cvars)
            .description("Prints a list of the registered CVars."),
    )?;
    console.register_command(CommandDef::new("saveConfig", cmd_save_config).description(
        "Writes a configuration file with the registered CVars and command aliases. Clears modified flags.",
    ))?;
    console.register_command(CommandDef::new("reloadConfig", cmd_reload_config).description(
        "Loads a configuration file updating existing CVars and possibly creating new ones.",
    ))?;
    console.register_command(
        CommandDef::new("exec", cmd_exec)
            .description("Execute a command string or a configuration file."),
    )?;
    Ok(())
}

// ========================================================
// Completion helpers
// ========================================================

fn complete_cvar_name(console: &Console, partial: &str, max: usize) -> (Vec<String>, usize) {
    console.cvars().find_partial_names(partial, max)
}

fn complete_cvar_or_cmd_name(console: &Console, partial: &str, max: usize) -> (Vec<String>, usize) {
    let mut matches = Vec::new();
    let mut total = 0usize;

    if !partial.is_empty() {
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
    }
    if total == 0 {
        let (m, t) = console.commands().find_partial_names(partial, max);
        matches = m;
        total = t;
    }
    if total == 0 {
        return console.cvars().find_partial_names(partial, max);
    }
    (matches, total)
}

// ========================================================
// Shared helpers
// ========================================================

fn print_usage(console: &mut Console, cmd_name: &str, usage_args: &str) {
    let desc = console
        .commands()
        .find(cmd_name)
        .map(|c| c.desc().to_string())
        .unwrap_or_default();

    console.print_ln("Wrong number of arguments!");
    if desc.is_empty() {
        console.print_ln(&format!("Usage: {cmd_name} {usage_args}"));
    } else {
        console.print_ln(&format!("{cmd_name}: {desc}\nUsage: {cmd_name} {usage_args}"));
    }
}

/// `[pattern[/i]]` search argument for the listing commands.
struct SearchPattern {
    text: String,
    ignore_case: bool,
}

impl SearchPattern {
    fn from_arg(arg: &str) -> Self {
        match arg.strip_suffix("/i") {
            Some(text) if !text.is_empty() => Self {
                text: text.to_lowercase(),
                ignore_case: true,
            },
            _ => Self {
                text: arg.to_string(),
                ignore_case: false,
            },
        }
    }

    fn matches(&self, name: &str) -> bool {
        if self.ignore_case {
            name.to_lowercase().contains(&self.text)
        } else {
            name.contains(&self.text)
        }
    }
}

// ========================================================
// Command handlers
// ========================================================

fn cmd_is_cvar(console: &mut Console, args: &CommandArgs) {
    if args.len() != 1 {
        print_usage(console, "isCVar", "<name>");
        return;
    }
    let answer = if console.cvars().find(&args[0]).is_some() {
        "yes"
    } else {
        "no"
    };
    console.print_ln(answer);
}

fn cmd_is_cmd(console: &mut Console, args: &CommandArgs) {
    if args.len() != 1 {
        print_usage(console, "isCmd", "<name>");
        return;
    }
    match console.commands().find(&args[0]).map(|c| c.is_alias()) {
        Some(true) => {
            console.print("yes");
            console.set_text_color(color::cyan());
            console.print(" (command alias)\n");
            console.restore_text_color();
        }
        Some(false) => console.print_ln("yes"),
        None => console.print_ln("no"),
    }
}

fn cmd_reset(console: &mut Console, args: &CommandArgs) {
    if args.len() != 1 {
        print_usage(console, "reset", "<cvar>");
        return;
    }
    let name = &args[0];
    if console.cvars().find(name).is_none() {
        console.print_ln(&format!("CVar '{name}' is not defined."));
        return;
    }
    if console.cvars_mut().internal_set_default(name).is_err() {
        let message = format!("Cannot reset {name}!");
        console.print_warning(&message);
    }
}

fn cmd_toggle(console: &mut Console, args: &CommandArgs) {
    if args.len() != 1 {
        print_usage(console, "toggle", "<cvar>");
        return;
    }
    let name = args[0].to_string();

    let Some(cvar) = console.cvars().find(&name) else {
        console.print_ln(&format!("CVar '{name}' is not defined."));
        return;
    };

    if cvar.kind() == CVarKind::Bool {
        let flipped = !cvar.as_bool();
        let _ = console.cvars_mut().find_mut(&name).unwrap().set_bool(flipped);
        return;
    }

    // Cycle the allowed value strings.
    let count = cvar.allowed_value_count();
    let (values, _) = cvar.allowed_value_strings(count);
    let current = cvar.value_string();
    if values.is_empty() {
        console.print_ln("No values to toggle...");
        return;
    }

    let mut toggled = false;
    if let Some(index) = values.iter().position(|v| *v == current) {
        let next = &values[(index + 1) % values.len()];
        toggled = console
            .cvars_mut()
            .find_mut(&name)
            .unwrap()
            .set_string(next)
            .is_ok();
    }
    if !toggled {
        let message = format!("Cannot toggle {name}!");
        console.print_warning(&message);
    }
}

fn cmd_set(console: &mut Console, args: &CommandArgs) {
    if args.len() < 2 {
        print_usage(
            console,
            "set",
            "<cvar> <value> [flags: -persistent | -volatile | -readonly | -initonly | -modified | -nocreate]",
        );
        return;
    }

    let name = &args[0];
    let value = &args[1];

    if console.cvars().find(name).is_none() {
        // New variables are always flagged as user-defined.
        let mut flags = CVarFlags::USER_DEFINED;
        let mut no_create = false;
        for arg in args.iter().skip(2) {
            match arg {
                "-persistent" => flags |= CVarFlags::PERSISTENT,
                "-volatile" => flags |= CVarFlags::VOLATILE,
                "-readonly" => flags |= CVarFlags::READ_ONLY,
                "-initonly" => flags |= CVarFlags::INIT_ONLY,
                "-modified" => flags |= CVarFlags::MODIFIED,
                "-nocreate" => no_create = true,
                _ => {}
            }
        }

        if no_create {
            console.print_ln(&format!("CVar '{name}' is not defined and won't be created."));
            return;
        }
        let _ = console.cvars_mut().set_string(name, value, flags);
    } else if console.cvars_mut().internal_set_string(name, value).is_err() {
        let message = format!("Cannot set {name} to \"{value}\"!");
        console.print_warning(&message);
    }
}

fn var_op(console: &mut Console, args: &CommandArgs, op_name: &str, op: fn(f64, f64) -> f64) {
    if args.len() != 2 {
        print_usage(console, op_name, "<cvar> <value>");
        return;
    }
    let name = args[0].to_string();

    let Some(cvar) = console.cvars().find(&name) else {
        console.print_ln(&format!("CVar '{name}' is not defined."));
        return;
    };
    if !matches!(cvar.kind(), CVarKind::Int | CVarKind::Float) {
        console.print_ln(&format!("Cannot {op_name} to value of non-numeric CVar."));
        return;
    }

    let operand = args.parse_arg::<f64>(1).unwrap_or(0.0);
    let result = op(cvar.as_float(), operand);
    if console
        .cvars_mut()
        .find_mut(&name)
        .unwrap()
        .set_float(result)
        .is_err()
    {
        let message = format!("Cannot {op_name} to value of CVar {name}!");
        console.print_warning(&message);
    }
}

fn cmd_var_add(console: &mut Console, args: &CommandArgs) {
    var_op(console, args, "varAdd", |a, b| a + b);
}

fn cmd_var_sub(console: &mut Console, args: &CommandArgs) {
    var_op(console, args, "varSub", |a, b| a - b);
}

fn cmd_var_mul(console: &mut Console, args: &CommandArgs) {
    var_op(console, args, "varMul", |a, b| a * b);
}

fn cmd_var_div(console: &mut Console, args: &CommandArgs) {
    var_op(console, args, "varDiv", |a, b| a / b);
}

fn cmd_alias(console: &mut Console, args: &CommandArgs) {
    if args.len() < 3 {
        print_usage(
            console,
            "alias",
            "<name> <command string> <mode: -append | -insert | -immediate> [optional description]",
        );
        return;
    }

    let mode = match ExecMode::from_flag_word(&args[2]) {
        Some(mode) => mode,
        None => {
            let message = format!("Unrecognized flag \"{}\". Defaulting to '-append'...", &args[2]);
            console.print_warning(&message);
            ExecMode::Append
        }
    };

    let (name, target) = (args[0].to_string(), args[1].to_string());
    let desc = args.get_or(3, "").to_string();
    if console.create_alias(&name, &target, mode, &desc).is_err() {
        console.print_warning("Failed to create new command alias!");
        return;
    }
    console.print_ln(&format!("New command alias '{name}' created successfully."));
}

fn cmd_unalias(console: &mut Console, args: &CommandArgs) {
    if args.len() != 1 {
        print_usage(console, "unalias", "<name | -all>");
        return;
    }
    if &args[0] == "-all" {
        console.commands_mut().remove_all_aliases();
        console.print_ln("All command aliases removed.");
    } else if console.commands_mut().remove_alias(&args[0]) {
        console.print_ln("Command alias removed.");
    } else {
        console.print_ln(&format!("'{}' is not a command alias.", &args[0]));
    }
}

fn cmd_print(console: &mut Console, args: &CommandArgs) {
    if args.len() != 1 {
        print_usage(console, "print", "<cvar>");
        return;
    }

    let Some(cvar) = console.cvars().find(&args[0]) else {
        console.print_ln(&format!("CVar '{}' is not defined.", &args[0]));
        return;
    };

    let mut line = format!("{} = {};", cvar.name(), cvar.value_string());
    let flags = cvar.flags_string();
    if !flags.is_empty() {
        line.push_str(&format!("  flags:'{flags}';"));
    }
    line.push_str(&format!("  type:{};", cvar.kind().as_str()));
    if matches!(cvar.kind(), CVarKind::Int | CVarKind::Float) {
        let (range, _) = cvar.allowed_value_strings(2);
        line.push_str(&format!("  range:[{}, {}];", range[0], range[1]));
    }
    let default = cvar.default_value_string();
    if !default.is_empty() {
        line.push_str(&format!("  default:{default};"));
    }
    if !cvar.desc().is_empty() {
        line.push_str(&format!("  description:\"{}\";", cvar.desc()));
    }

    console.print_ln(&line);
    console.print("\n");
}

fn cmd_help(console: &mut Console, args: &CommandArgs) {
    if args.len() != 1 {
        print_usage(console, "help", "<command | cvar>");
        return;
    }
    let name = &args[0];

    let found = console
        .commands()
        .find(name)
        .map(|c| (c.name().to_string(), c.desc().to_string()))
        .or_else(|| {
            console
                .cvars()
                .find(name)
                .map(|c| (c.name().to_string(), c.desc().to_string()))
        })
        .or_else(|| {
            builtins()
                .iter()
                .find(|b| b.name.eq_ignore_ascii_case(name))
                .map(|b| (b.name.to_string(), b.desc.to_string()))
        });

    match found {
        Some((name, desc)) => {
            let desc = if desc.is_empty() {
                "No description provided.".to_string()
            } else {
                desc
            };
            console.set_text_color(color::cyan());
            console.print(&format!("{name}: "));
            console.restore_text_color();
            console.print_ln(&desc);
        }
        None => {
            console.print_ln(&format!("No command or CVar found with name \"{name}\"."));
        }
    }
}

fn cmd_echo(console: &mut Console, args: &CommandArgs) {
    if args.is_empty() {
        console.print("\n");
        return;
    }
    console.print_ln(&args.join(" "));
}

fn cmd_list_cmds(console: &mut Console, args: &CommandArgs) {
    if args.len() > 2 {
        print_usage(console, "listCmds", "[search-pattern [/i]] [-sort]");
        return;
    }

    let pattern = match args.get(0) {
        Some(arg) if arg != "-sort" => Some(SearchPattern::from_arg(arg)),
        _ => None,
    };
    let sorted = args.iter().any(|a| a == "-sort");

    // (name, desc, is_alias, is_builtin)
    let mut rows: Vec<(String, String, bool, bool)> = console
        .commands()
        .iter()
        .filter(|c| pattern.as_ref().map_or(true, |p| p.matches(c.name())))
        .map(|c| (c.name().to_string(), c.desc().to_string(), c.is_alias(), false))
        .collect();
    for builtin in builtins() {
        if pattern.as_ref().map_or(true, |p| p.matches(builtin.name)) {
            rows.push((builtin.name.to_string(), builtin.desc.to_string(), false, true));
        }
    }

    if rows.is_empty() {
        match &pattern {
            Some(p) => {
                console.print_ln(&format!("No matching commands found for pattern \"{}\".", p.text));
            }
            None => console.print_ln("No commands found."),
        }
        return;
    }

    if sorted {
        rows.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));
    }
    let width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0);

    console.print_ln("================ Command Listing ================");
    for (name, desc, is_alias, is_builtin) in &rows {
        if *is_alias {
            console.set_text_color(color::magenta());
        } else if *is_builtin {
            console.set_text_color(color::white());
        }
        console.print(&format!("{name:<width$} "));
        if *is_alias || *is_builtin {
            console.restore_text_color();
        }
        if !desc.is_empty() {
            console.print(&format!(" \"{desc}\""));
        }
        console.print("\n");
    }

    console.set_text_color(color::cyan());
    console.print_ln(&format!("listed {} commands.\n", rows.len()));
    console.set_text_color(color::magenta());
    console.print("magenta");
    console.restore_text_color();
    console.print_ln(" = command aliases");
    console.set_text_color(color::white());
    console.print("white  ");
    console.restore_text_color();
    console.print_ln(" = built-in commands");
    console.print_ln("=================================================");
}

fn cmd_list_cvars(console: &mut Console, args: &CommandArgs) {
    if args.len() > 3 {
        print_usage(console, "listCVars", "[search-pattern[/i]] [-sort] [-values]");
        return;
    }

    let pattern = match args.get(0) {
        Some(arg) if arg != "-sort" && arg != "-values" => Some(SearchPattern::from_arg(arg)),
        _ => None,
    };
    let sorted = args.iter().any(|a| a == "-sort");
    let values_only = args.iter().any(|a| a == "-values");

    // (name, value, type, flags, desc)
    let mut rows: Vec<(String, String, &'static str, String, String)> = console
        .cvars()
        .iter()
        .filter(|c| pattern.as_ref().map_or(true, |p| p.matches(c.name())))
        .map(|c| {
            (
                c.name().to_string(),
                c.value_string(),
                c.kind().as_str(),
                c.flags_string(),
                c.desc().to_string(),
            )
        })
        .collect();

    if rows.is_empty() {
        match &pattern {
            Some(p) => {
                console.print_ln(&format!("No matching CVars found for pattern \"{}\".", p.text));
            }
            None => console.print_ln("No CVars found."),
        }
        return;
    }

    if sorted {
        rows.sort_by(|a, b| a.0.cmp(&b.0));
    }
    let width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0);

    console.print_ln("================== CVar Listing =================");
    for (name, value, kind, flags, desc) in &rows {
        if values_only {
            console.print_ln(&format!("{name:<width$} \"{value}\""));
        } else {
            console.print(&format!("{name:<width$} | {kind:<6} | {flags:<11} |"));
            if !desc.is_empty() {
                console.print(&format!(" \"{desc}\""));
            }
            console.print("\n");
        }
    }

    console.set_text_color(color::cyan());
    console.print_ln(&format!("listed {} variables.", rows.len()));
    if !values_only {
        console.print_ln("");
        console.print_ln("Flags reference:");
        console.print_ln("M = Modified");
        console.print_ln("P = Persistent");
        console.print_ln("V = Volatile");
        console.print_ln("R = Read only");
        console.print_ln("I = Init only");
        console.print_ln("C = Range check");
        console.print_ln("U = User defined");
        console.print_ln("0 = No flags");
    }
    console.restore_text_color();
    console.print_ln("=================================================");
}

fn cmd_save_config(console: &mut Console, args: &CommandArgs) {
    if args.len() > 1 {
        print_usage(console, "saveConfig", "[filename]");
        return;
    }
    let filename = args.get_or(0, DEFAULT_CONFIG_FILE).to_string();
    if console.save_config(&filename).is_ok() {
        console.print_ln(&format!("Config file \"{filename}\" successfully written."));
    }
}

fn cmd_reload_config(console: &mut Console, args: &CommandArgs) {
    if args.len() > 3 {
        print_usage(console, "reloadConfig", "[filename] [-echo] [-force]");
        return;
    }

    let filename = match args.get(0) {
        None | Some("-echo") | Some("-force") => DEFAULT_CONFIG_FILE.to_string(),
        Some(name) => name.to_string(),
    };
    let echo = args.iter().any(|a| a == "-echo");
    let force = args.iter().any(|a| a == "-force");

    // Refuse to clobber unsaved modifications unless forced.
    if console.cvars().any_modified() && !force {
        console.set_text_color(color::yellow());
        console.print_ln("There are pending modifications on CVars that haven't been saved yet; Stopping.");
        console.print_ln("To force a reload use: \"reloadConfig [filename] -force\".");
        console.restore_text_color();
        return;
    }

    // Replaying a config may update ReadOnly and InitOnly CVars alike.
    console.cvars_mut().set_allow_writing_read_only(true);
    let result = console.exec_config_file(&filename, echo);
    console.cvars_mut().set_allow_writing_read_only(false);

    match result {
        Ok(()) => console.print_ln(&format!("Config file \"{filename}\" successfully loaded.")),
        Err(_) => {
            console.set_text_color(color::red());
            console.print_ln(&format!("Failed to reload config file \"{filename}\"."));
            console.restore_text_color();
        }
    }
}

fn cmd_exec(console: &mut Console, args: &CommandArgs) {
    if args.is_empty() || args.len() > 2 {
        print_usage(console, "exec", "<config-file | command-string> [-echo]");
        return;
    }
    if &args[0] == "-echo" {
        console.print_ln("Expected filename or command string after 'exec' command.");
        return;
    }

    let exec_string = args[0].to_string();
    let echo = args.get(1) == Some("-echo");
    let is_filename = exec_string
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext == "cfg" || ext == "ini");

    if is_filename {
        console.print_ln(&format!("Executing config file \"{exec_string}\"..."));
        if console.exec_config_file(&exec_string, echo).is_err() {
            console.set_text_color(color::red());
            console.print_ln(&format!("Failed to exec config file \"{exec_string}\"."));
            console.restore_text_color();
            return;
        }
        console.print_ln("Done!");
    } else {
        console.print_ln(&format!("Appending command line \"{exec_string}\"..."));
        console.exec_append(&exec_string);
    }
}
