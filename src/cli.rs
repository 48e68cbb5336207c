use crate::config::ini_parser::parse_size;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

// Command-line interface for decoding and encoding multipart/form-data bodies.
#[derive(Parser, Clone, Debug)]
#[command(
    version,
    about = "Decode and encode multipart/form-data bodies.",
    long_about = "Decode a multipart/form-data body into its form entries, or encode fields and files into a multipart body.\n Decoding reads the body from a file or stdin and needs the Content-Type header value that came with it.\n A body that ends before its announced Content-Length is reported as a premature close.\n Encoding writes the body to a file or stdout and prints the matching Content-Type header to stderr."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file path (INI format). If not provided, looks for ironform.ini in the current directory or ~/.config/ironform/config.ini
    #[arg(long, global = true, value_parser = validate_config_file)]
    pub config_file: Option<String>,

    /// Enable verbose logging (log level: debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Maximum accepted body size, e.g. 512KB or 10MB
    #[arg(long, global = true, value_parser = parse_size_arg)]
    pub max_body_size: Option<u64>,

    /// Fail when the body source cannot tell whether it ended cleanly
    #[arg(long, global = true)]
    pub strict_completion: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Decode a multipart body and list its entries
    Decode {
        /// Content-Type header value carrying the boundary
        #[arg(short = 't', long)]
        content_type: String,

        /// Body file; reads stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Expected body length; a shorter body is a premature close
        #[arg(long)]
        content_length: Option<u64>,

        /// Read size in bytes
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Encode fields and files into a multipart body
    Encode {
        /// Text field as name=value (repeatable, kept in order with --file)
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// File field as name=path or name=path;type (repeatable, kept in order with --field)
        #[arg(long = "file", value_parser = parse_file_spec)]
        files: Vec<FileSpec>,

        /// Output file; writes stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use this boundary instead of a random one
        #[arg(long)]
        boundary: Option<String>,
    },
}

/// A `--file` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub name: String,
    pub path: PathBuf,
    pub content_type: Option<String>,
}

/// One `encode` entry, in the order it appeared on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeEntry {
    Field(String, String),
    File(FileSpec),
}

impl Cli {
    /// Parse the process arguments, exiting on error like [`Parser::parse`].
    /// Also returns the `encode` entries in command-line order.
    pub fn parse_ordered() -> (Self, Vec<EncodeEntry>) {
        Self::try_parse_ordered_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    pub fn try_parse_ordered_from<I, T>(args: I) -> Result<(Self, Vec<EncodeEntry>), clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        let cli = Self::from_arg_matches(&matches)?;
        let entries = cli.ordered_entries(&matches);
        Ok((cli, entries))
    }

    /// Merge `--field` and `--file` values back into their argument order
    fn ordered_entries(&self, matches: &ArgMatches) -> Vec<EncodeEntry> {
        let Command::Encode { fields, files, .. } = &self.command else {
            return Vec::new();
        };
        let Some(encode) = matches.subcommand_matches("encode") else {
            return Vec::new();
        };

        let indices = |id: &str| -> Vec<usize> {
            encode
                .indices_of(id)
                .map(|indices| indices.collect())
                .unwrap_or_default()
        };

        let mut entries: Vec<(usize, EncodeEntry)> = indices("fields")
            .into_iter()
            .zip(fields.iter())
            .map(|(index, (name, value))| (index, EncodeEntry::Field(name.clone(), value.clone())))
            .chain(
                indices("files")
                    .into_iter()
                    .zip(files.iter())
                    .map(|(index, file)| (index, EncodeEntry::File(file.clone()))),
            )
            .collect();
        entries.sort_by_key(|(index, _)| *index);
        entries.into_iter().map(|(_, entry)| entry).collect()
    }

    /// Chunk size requested on the command line, if any
    pub fn chunk_size(&self) -> Option<usize> {
        match &self.command {
            Command::Decode { chunk_size, .. } => *chunk_size,
            Command::Encode { .. } => None,
        }
    }
}

fn parse_size_arg(s: &str) -> Result<u64, String> {
    match parse_size(s) {
        Some(0) => Err("Size must be greater than 0".to_string()),
        Some(size) => Ok(size),
        None => Err(format!("Invalid size '{s}': use a number with an optional KB, MB or GB suffix")),
    }
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) => Ok((name.to_string(), value.to_string())),
        None => Err(format!("Field '{s}' must be written as name=value")),
    }
}

fn parse_file_spec(s: &str) -> Result<FileSpec, String> {
    let Some((name, rest)) = s.split_once('=') else {
        return Err(format!("File '{s}' must be written as name=path[;type]"));
    };
    let (path, content_type) = match rest.rsplit_once(';') {
        Some((path, content_type)) if content_type.contains('/') => {
            (path, Some(content_type.trim().to_string()))
        }
        _ => (rest, None),
    };
    if path.is_empty() {
        return Err(format!("File '{s}' has an empty path"));
    }
    Ok(FileSpec {
        name: name.to_string(),
        path: PathBuf::from(path),
        content_type,
    })
}

/// Validate config file path exists and is readable
fn validate_config_file(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("Config file path cannot be empty".to_string());
    }

    let path = PathBuf::from(s);

    if !path.exists() {
        return Err(format!("Config file does not exist: {s}"));
    }

    if !path.is_file() {
        return Err(format!("Config path is not a file: {s}"));
    }

    match std::fs::File::open(&path) {
        Ok(_) => Ok(s.to_string()),
        Err(e) => Err(format!("Cannot read config file {s}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert_eq!(parse_field("empty=").unwrap().1, "");
        assert!(parse_field("novalue").is_err());
    }

    #[test]
    fn test_parse_file_spec() {
        let spec = parse_file_spec("doc=./a.pdf;application/pdf").unwrap();
        assert_eq!(spec.name, "doc");
        assert_eq!(spec.path, PathBuf::from("./a.pdf"));
        assert_eq!(spec.content_type.as_deref(), Some("application/pdf"));

        let spec = parse_file_spec("doc=./weird;name.txt").unwrap();
        assert_eq!(spec.path, PathBuf::from("./weird;name.txt"));
        assert_eq!(spec.content_type, None);

        assert!(parse_file_spec("doc").is_err());
        assert!(parse_file_spec("doc=").is_err());
    }

    #[test]
    fn test_parse_size_arg() {
        assert_eq!(parse_size_arg("2KB").unwrap(), 2048);
        assert!(parse_size_arg("0").is_err());
        assert!(parse_size_arg("lots").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "ironform",
            "decode",
            "-t",
            "multipart/form-data; boundary=b",
            "--chunk-size",
            "64",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.chunk_size(), Some(64));

        let cli = Cli::try_parse_from([
            "ironform",
            "encode",
            "--field",
            "a=1",
            "-f",
            "b=2",
            "--boundary",
            "XyZ",
        ])
        .unwrap();
        match cli.command {
            Command::Encode {
                fields, boundary, ..
            } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(boundary.as_deref(), Some("XyZ"));
            }
            Command::Decode { .. } => panic!("expected encode"),
        }
    }

    #[test]
    fn test_encode_entries_keep_argument_order() {
        let (_, entries) = Cli::try_parse_ordered_from([
            "ironform",
            "encode",
            "--file",
            "a=./x.bin",
            "--field",
            "b=1",
            "--file",
            "c=./y.txt;text/plain",
            "-f",
            "d=2",
        ])
        .unwrap();

        let names: Vec<&str> = entries
            .iter()
            .map(|entry| match entry {
                EncodeEntry::Field(name, _) => name.as_str(),
                EncodeEntry::File(file) => file.name.as_str(),
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_decode_has_no_encode_entries() {
        let (cli, entries) =
            Cli::try_parse_ordered_from(["ironform", "decode", "-t", "multipart/form-data; boundary=b"])
                .unwrap();
        assert!(matches!(cli.command, Command::Decode { .. }));
        assert!(entries.is_empty());
    }
}
