mod commands;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use argile_parcours::Settings;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Fonds Prévention Argile parcours engine.
#[derive(Parser)]
#[command(
    name = "argile",
    version,
    about = "Fonds Prévention Argile parcours engine"
)]
struct Cli {
    /// TOML settings file (environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the parcours HTTP API server
    Serve {
        /// Port to listen on (default: settings, then 8080)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Encrypt and decrypt URL-fragment envelopes
    Envelope {
        #[command(subcommand)]
        command: EnvelopeCommands,
    },

    /// Query Démarches Simplifiées
    Ds {
        #[command(subcommand)]
        command: DsCommands,
    },
}

#[derive(Subcommand)]
enum EnvelopeCommands {
    /// Generate a random 256-bit key, hex-encoded
    Keygen,
    /// Encrypt text with ENCRYPTION_KEY
    Encrypt {
        /// Plaintext to encrypt
        plaintext: String,
        /// Print as a `#d=` URL fragment
        #[arg(long)]
        fragment: bool,
    },
    /// Decrypt an envelope, a `#d=` fragment or a URL carrying one
    Decrypt {
        /// Envelope to decrypt
        envelope: String,
    },
}

#[derive(Subcommand)]
enum DsCommands {
    /// Fetch a dossier and print its status
    Dossier {
        /// Dossier number
        number: i64,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,argile_parcours=info,argile_cli=info")
        }))
        .with_writer(std::io::stderr)
        .init();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            report_error(&format!("error: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(settings.server.port);
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error: failed to create tokio runtime: {}", e);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(port, settings)) {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
        Commands::Envelope { command } => match command {
            EnvelopeCommands::Keygen => commands::envelope::cmd_keygen(cli.output),
            EnvelopeCommands::Encrypt {
                plaintext,
                fragment,
            } => commands::envelope::cmd_encrypt(
                &settings,
                &plaintext,
                fragment,
                cli.output,
                cli.quiet,
            ),
            EnvelopeCommands::Decrypt { envelope } => {
                commands::envelope::cmd_decrypt(&settings, &envelope, cli.output, cli.quiet)
            }
        },
        Commands::Ds { command } => match command {
            DsCommands::Dossier { number } => {
                commands::ds::cmd_dossier(&settings, number, cli.output, cli.quiet)
            }
        },
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

pub(crate) fn print_json(value: &serde_json::Value) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}
