//! Configuration management for ironform
//! Supports INI files with CLI argument overrides

pub mod ini_parser;

use crate::body::DecoderConfig;
use crate::cli::Cli;
use crate::multipart::MultipartConfig;
use crate::source::DEFAULT_CHUNK_SIZE;
use ini_parser::IniConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    // Limits
    pub max_body_size: Option<u64>,
    pub max_parts: usize,
    pub max_part_size: u64,
    pub max_headers_size: usize,

    // Decoder settings
    pub strict_completion: bool,
    pub chunk_size: usize,

    // Logging settings
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        let limits = MultipartConfig::default();
        Self {
            max_body_size: None,
            max_parts: limits.max_parts,
            max_part_size: limits.max_part_size,
            max_headers_size: limits.max_headers_size,
            strict_completion: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration with precedence: CLI args > INI file > Defaults
    pub fn load(cli: &Cli) -> Result<Self, String> {
        let ini = match Self::find_config_file(cli)? {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                IniConfig::load_file(&path)?
            }
            None => {
                log::info!("No configuration file found, using defaults and CLI overrides");
                IniConfig::new()
            }
        };

        Ok(Self::from_sources(&ini, cli))
    }

    /// Merge an already parsed INI file with CLI overrides
    pub fn from_sources(ini: &IniConfig, cli: &Cli) -> Self {
        let defaults = Self::default();

        Self {
            max_body_size: cli
                .max_body_size
                .or_else(|| ini.get_size("limits", "max_body_size"))
                .or(defaults.max_body_size),
            max_parts: ini
                .get_usize("limits", "max_parts")
                .unwrap_or(defaults.max_parts),
            max_part_size: ini
                .get_size("limits", "max_part_size")
                .unwrap_or(defaults.max_part_size),
            max_headers_size: ini
                .get_size("limits", "max_headers_size")
                .map(|size| size as usize)
                .unwrap_or(defaults.max_headers_size),

            strict_completion: cli.strict_completion
                || ini
                    .get_bool("decoder", "strict_completion")
                    .unwrap_or(defaults.strict_completion),
            chunk_size: cli
                .chunk_size()
                .or_else(|| ini.get_usize("decoder", "chunk_size"))
                .filter(|size| *size > 0)
                .unwrap_or(defaults.chunk_size),

            verbose: cli.verbose || ini.get_bool("logging", "verbose").unwrap_or(defaults.verbose),
        }
    }

    /// Find configuration file in order of preference
    fn find_config_file(cli: &Cli) -> Result<Option<PathBuf>, String> {
        // 1. Explicit --config-file
        if let Some(ref config_path) = cli.config_file {
            let path = PathBuf::from(config_path);
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(format!(
                "Config file specified but not found: {config_path}"
            ));
        }

        // 2. Current directory
        let current_config = PathBuf::from("ironform.ini");
        if current_config.exists() {
            return Ok(Some(current_config));
        }

        // 3. User config directory (~/.config/ironform/config.ini)
        if let Some(home_dir) = std::env::var_os("HOME") {
            let user_config = Path::new(&home_dir)
                .join(".config")
                .join("ironform")
                .join("config.ini");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        Ok(None)
    }

    /// Settings for one decode call
    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            multipart: MultipartConfig {
                max_parts: self.max_parts,
                max_part_size: self.max_part_size,
                max_headers_size: self.max_headers_size,
                ..Default::default()
            },
            max_body_size: self.max_body_size,
            strict_completion: self.strict_completion,
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        log::info!("Configuration Summary:");
        match self.max_body_size {
            Some(size) => log::info!("  Max Body Size: {size} bytes"),
            None => log::info!("  Max Body Size: unlimited"),
        }
        log::info!("  Max Parts: {}", self.max_parts);
        log::info!("  Max Part Size: {} bytes", self.max_part_size);
        log::info!("  Max Headers Size: {} bytes", self.max_headers_size);
        log::info!("  Strict Completion: {}", self.strict_completion);
        log::info!("  Chunk Size: {} bytes", self.chunk_size);
        log::info!("  Verbose Logging: {}", self.verbose);
    }
}
