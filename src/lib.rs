/// # ironform
///
/// Streamed `multipart/form-data` decoding and encoding.
///
/// Bodies are pulled from a [`source::BodySource`], fed chunk by chunk into a
/// [`multipart::MultipartReader`] and assembled into a [`FormData`]. The
/// reverse direction serializes a [`FormData`] into a body plus its
/// `Content-Type` header. The `run` function drives the command-line tool.
pub mod body;
pub mod boundary;
pub mod cli;
pub mod commands;
pub mod config;
pub mod encoder;
pub mod error;
pub mod escape;
pub mod form_data;
pub mod multipart;
pub mod parser;
pub mod source;

pub use body::DecoderConfig;
pub use encoder::{EncodedForm, Encoder};
pub use error::FormDataError;
pub use form_data::{FormData, FormFile, FormValue};
pub use parser::{DecodedBody, form_data_to_stream, stream_to_form_data};

use crate::cli::{Cli, Command, EncodeEntry};
use crate::config::Config;
use log::error;

/// Initializes the logger, parses command-line arguments, and runs the
/// selected subcommand. Errors are logged and the process exits with status 1.
pub fn run() {
    let (cli, entries) = Cli::parse_ordered();

    // Load configuration with precedence: CLI > INI > Defaults
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let log_level = if config.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::debug!("Log level set to: {log_level}");

    if config.verbose {
        config.print_summary();
    }

    if let Err(e) = run_command(&cli.command, &entries, &config) {
        error!("{} error: {e}", e.exception_name());
        std::process::exit(1);
    }
}

fn run_command(
    command: &Command,
    entries: &[EncodeEntry],
    config: &Config,
) -> Result<(), FormDataError> {
    match command {
        Command::Decode {
            content_type,
            input,
            content_length,
            ..
        } => {
            let reader = commands::open_input(input.as_deref())?;
            let mut out = std::io::stdout().lock();
            commands::decode(reader, content_type, *content_length, config, &mut out)?;
        }
        Command::Encode {
            output, boundary, ..
        } => {
            let form = commands::build_form(entries)?;
            let mut out = commands::open_output(output.as_deref())?;
            let encoded = commands::encode(&form, boundary.as_deref(), &mut out)?;
            eprintln!("Content-Type: {}", encoded.content_type);
            eprintln!("Content-Length: {}", encoded.content_length);
        }
    }
    Ok(())
}
