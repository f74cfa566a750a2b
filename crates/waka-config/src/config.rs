use std::collections::BTreeMap;
use std::path::Path;

use waka_store::IniFile;

use crate::error::ConfigError;

/// Layered configuration: explicit flag values over the parsed config file.
///
/// Keys of the form `section.name` fall through to the file when no flag
/// carries them; plain keys (`log-file`, `verbose`) only come from flags.
#[derive(Debug, Clone, Default)]
pub struct Config {
    flags: BTreeMap<String, String>,
    file: IniFile,
}

impl Config {
    pub fn new(file: IniFile) -> Self {
        Self {
            flags: BTreeMap::new(),
            file,
        }
    }

    /// Parse the config file at `path`. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(IniFile::load(path)?))
    }

    pub fn set_flag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.flags.insert(key.into(), value.into());
    }

    pub fn with_flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_flag(key, value);
        self
    }

    pub fn file(&self) -> &IniFile {
        &self.file
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get_string(key).is_some()
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        if let Some(v) = self.flags.get(key) {
            return Some(v.as_str());
        }
        let (section, name) = key.split_once('.')?;
        self.file.get(section, name)
    }

    /// Boolean value of `key`; unset or unparseable reads as false.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get_string(key).and_then(parse_bool).unwrap_or(false)
    }

    /// First key whose trimmed value is non-empty.
    pub fn first_non_empty_string(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get_string(k))
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

/// `1 t true 0 f false` in any common casing.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(text: &str) -> Config {
        Config::new(IniFile::parse(text).unwrap())
    }

    #[test]
    fn flags_override_file() {
        let c = config("[settings]\napi_url = https://file.example\n")
            .with_flag("settings.api_url", "https://flag.example");
        assert_eq!(c.get_string("settings.api_url"), Some("https://flag.example"));
    }

    #[test]
    fn dotted_keys_read_file_sections() {
        let c = config("[settings]\ndebug = true\n");
        assert!(c.get_bool("settings.debug"));
        assert!(c.is_set("settings.debug"));
        assert!(!c.is_set("settings.log_file"));
        assert!(!c.is_set("debug"));
    }

    #[test]
    fn get_bool_defaults_to_false() {
        let c = config("[settings]\ndebug = maybe\n").with_flag("verbose", "true");
        assert!(!c.get_bool("settings.debug"));
        assert!(!c.get_bool("missing"));
        assert!(c.get_bool("verbose"));
    }

    #[test]
    fn first_non_empty_skips_blank_values() {
        let c = config("[settings]\nlog_file = /var/log/waka.log\n").with_flag("log-file", "  ");
        assert_eq!(
            c.first_non_empty_string(&["log-file", "logfile", "settings.log_file"]),
            Some("/var/log/waka.log")
        );
        assert_eq!(c.first_non_empty_string(&["logfile"]), None);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let c = Config::load(&tmp.path().join(".wakatime.cfg")).unwrap();
        assert!(c.file().is_empty());
    }

    #[test]
    fn load_reports_parse_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".wakatime.cfg");
        std::fs::write(&path, "[settings\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Store(_))));
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" 1 "), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
