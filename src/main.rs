//! sessionstore CLI - Inspect and administer stored sessions.

use clap::{Parser, Subcommand};
use sessionstore::cli;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sessionstore")]
#[command(author, version, about = "Inspect and administer stored sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh key pair as a `[[keys]]` config entry.
    Keygen {
        /// Encryption key length (16, 24 or 32). 0 for authentication only.
        #[arg(long, default_value = "32")]
        encryption_bytes: usize,
    },

    /// Decode a session cookie and show the stored session.
    Decode {
        /// Cookie name the value was issued under.
        #[arg(short, long)]
        name: String,

        /// Cookie value.
        cookie: String,
    },

    /// Show the stored values of a session.
    Show {
        /// Cookie name the session belongs to.
        #[arg(short, long)]
        name: String,

        /// Session identifier.
        id: String,
    },

    /// Delete a stored session.
    Delete {
        /// Session identifier.
        id: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SESSIONSTORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Keygen { encryption_bytes } => cli::keygen::run(encryption_bytes),
        Commands::Decode { name, cookie } => cli::decode::run(&name, &cookie),
        Commands::Show { name, id } => cli::show::run(&name, &id),
        Commands::Delete { id } => cli::delete::run(&id),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sessionstore: error: {e}");
            ExitCode::FAILURE
        }
    }
}
