//! Minimal INI reader for ironform settings
//! Supports sections, key-value pairs, comments, booleans and size suffixes

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Flat view of an INI file keyed by `(section, key)`; keys before the first
/// section header live in section `""`.
#[derive(Debug, Clone, Default)]
pub struct IniConfig {
    values: HashMap<(String, String), String>,
}

impl IniConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {e}"))?;
        Self::parse(&content)
    }

    /// Parse INI content from string
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut config = Self::new();
        let mut section = String::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            let line_number = index + 1;

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(format!("Unterminated section at line {line_number}: {line}"));
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(format!("Empty section name at line {line_number}"));
                }
                section = name.to_lowercase();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(format!("Invalid syntax at line {line_number}: {line}"));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(format!("Empty key at line {line_number}: {line}"));
            }

            // Inline comments start at the first # or ;
            let value = value
                .split(['#', ';'])
                .next()
                .unwrap_or_default()
                .trim();

            config
                .values
                .insert((section.clone(), key.to_lowercase()), value.to_string());
        }

        Ok(config)
    }

    pub fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.values
            .get(&(section.to_lowercase(), key.to_lowercase()))
            .cloned()
    }

    pub fn get_usize(&self, section: &str, key: &str) -> Option<usize> {
        self.get_string(section, key)?.parse().ok()
    }

    /// Boolean value; accepts true/false, yes/no, on/off, 1/0
    pub fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        match self.get_string(section, key)?.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        }
    }

    /// Byte size; accepts plain numbers and B/KB/MB/GB suffixes
    pub fn get_size(&self, section: &str, key: &str) -> Option<u64> {
        parse_size(&self.get_string(section, key)?)
    }
}

/// Parse sizes like "512", "64KB", "1.5MB"
pub fn parse_size(value: &str) -> Option<u64> {
    let value = value.trim().to_uppercase();

    if let Ok(num) = value.parse::<u64>() {
        return Some(num);
    }

    let (number, multiplier) = [
        ("GB", 1024u64 * 1024 * 1024),
        ("MB", 1024 * 1024),
        ("KB", 1024),
        ("B", 1),
    ]
    .iter()
    .find_map(|(suffix, multiplier)| {
        value
            .strip_suffix(suffix)
            .map(|number| (number.trim(), *multiplier))
    })?;

    if let Ok(num) = number.parse::<u64>() {
        return num.checked_mul(multiplier);
    }

    // Decimal values like "1.5"
    let num = number.parse::<f64>().ok()?;
    if num.is_finite() && num >= 0.0 {
        Some((num * multiplier as f64) as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024"), Some(1024));
        assert_eq!(parse_size("1KB"), Some(1024));
        assert_eq!(parse_size("2 mb"), Some(2 * 1024 * 1024));
        assert_eq!(parse_size("10GB"), Some(10 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("1.5MB"), Some((1.5 * 1024.0 * 1024.0) as u64));
        assert_eq!(parse_size("12B"), Some(12));
        assert_eq!(parse_size("invalid"), None);
        assert_eq!(parse_size("-1KB"), None);
    }

    #[test]
    fn test_ini_parsing() {
        let content = r#"
# Global config
debug=true

[limits]
max_parts = 50 ; inline comment
max_body_size = 10MB

[Decoder]
Strict_Completion = yes
        "#;

        let config = IniConfig::parse(content).unwrap();
        assert_eq!(config.get_bool("", "debug"), Some(true));
        assert_eq!(config.get_usize("limits", "max_parts"), Some(50));
        assert_eq!(
            config.get_size("limits", "max_body_size"),
            Some(10 * 1024 * 1024)
        );
        assert_eq!(config.get_bool("decoder", "strict_completion"), Some(true));
        assert_eq!(config.get_string("limits", "missing"), None);
    }

    #[test]
    fn test_boolean_parsing() {
        let content = "[t]\na=on\nb=off\nc=1\nd=no\ne=maybe\n";
        let config = IniConfig::parse(content).unwrap();
        assert_eq!(config.get_bool("t", "a"), Some(true));
        assert_eq!(config.get_bool("t", "b"), Some(false));
        assert_eq!(config.get_bool("t", "c"), Some(true));
        assert_eq!(config.get_bool("t", "d"), Some(false));
        assert_eq!(config.get_bool("t", "e"), None);
    }

    #[test]
    fn test_invalid_syntax() {
        assert!(IniConfig::parse("[limits]\nno equals sign\n").is_err());
        assert!(IniConfig::parse("[]\n").is_err());
        assert!(IniConfig::parse("[open\n").is_err());
        assert!(IniConfig::parse(" = value\n").is_err());
    }
}
