//! Argument rewriting before clap sees the command line.
//!
//! `todo` alone lists, and `todo buy milk` adds: when the first positional
//! argument is not a command name or alias, `add` is inserted in front of
//! it. Global options may appear before it.

use std::ffi::OsString;

use crate::commands::CommandTable;

/// Global options that consume the following argument as their value.
const VALUE_OPTIONS: &[&str] = &["-p", "--data-path", "-f", "--format"];

/// Global options without a value.
const FLAG_OPTIONS: &[&str] = &["--global", "--verbose"];

/// Options that make clap print and exit without running a command.
const INFO_OPTIONS: &[&str] = &["-h", "--help", "-V", "--version"];

/// Leading list flags that imply `list` rather than `add`.
const LIST_OPTIONS: &[&str] = &["-d", "--done", "-a", "--all"];

/// Insert the implied subcommand into `args` (program name first).
pub fn prepare_args<I>(args: I, table: &CommandTable) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.is_empty() {
        return args;
    }

    let mut index = 1;
    while index < args.len() {
        let arg = args[index].to_string_lossy().into_owned();

        if arg == "--" {
            if index + 1 < args.len() {
                args.insert(index, "add".into());
            } else {
                args.insert(index, "list".into());
            }
            return args;
        }

        if !is_option(&arg) {
            if !(table.is_command(&arg) || arg == "help") {
                tracing::debug!(first = %arg, "no command given; adding");
                args.insert(index, "add".into());
            }
            return args;
        }

        if INFO_OPTIONS.contains(&arg.as_str()) {
            return args;
        }
        if VALUE_OPTIONS.contains(&arg.as_str()) {
            index += 2;
            continue;
        }
        if FLAG_OPTIONS.contains(&arg.as_str()) || is_attached_global(&arg) {
            index += 1;
            continue;
        }

        // A command flag with no command before it.
        let implied = if LIST_OPTIONS.contains(&arg.as_str()) {
            "list"
        } else {
            "add"
        };
        args.insert(index, implied.into());
        return args;
    }

    args.push("list".into());
    args
}

/// `-` followed by something other than whitespace, e.g. `-v` but not `- milk`.
fn is_option(arg: &str) -> bool {
    let mut chars = arg.chars();
    chars.next() == Some('-') && chars.next().is_some_and(|c| !c.is_whitespace())
}

/// `-vv`, `-fjson`, `--format=json` and friends.
fn is_attached_global(arg: &str) -> bool {
    if let Some(long) = arg.strip_prefix("--") {
        return ["data-path=", "format="].iter().any(|p| long.starts_with(p));
    }
    let Some(short) = arg.strip_prefix('-') else {
        return false;
    };
    short.chars().all(|c| c == 'v') || short.starts_with('p') || short.starts_with('f')
}
