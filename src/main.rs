//! todo - hierarchical todo lists from the command line

use clap::Parser;
use todo::cli::{prepare_args, Cli};
use todo::commands::CommandTable;
use todo::error::exit_codes;
use todo::output::emit_error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(verbose: u8) {
    // RUST_LOG wins; ignore invalid/huge filters so startup stays robust.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| {
            EnvFilter::new(match verbose {
                0 => "off",
                1 => "info",
                2 => "debug",
                _ => "trace",
            })
        });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let table = CommandTable::standard();
    let cli = match Cli::try_parse_from(prepare_args(std::env::args_os(), &table)) {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version come through here too, on stdout.
            let _ = err.print();
            std::process::exit(if err.use_stderr() {
                exit_codes::FAILURE
            } else {
                exit_codes::SUCCESS
            });
        }
    };
    init_tracing(cli.verbose);

    let command = cli.command_name();
    let format = cli.error_format();
    if let Err(err) = cli.run() {
        let _ = emit_error(format, command, &err);
        std::process::exit(err.exit_code());
    }
}
