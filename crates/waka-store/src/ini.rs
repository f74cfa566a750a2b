//! Minimal INI document: `[section]` headers, `key = value` entries, `#`/`;`
//! comments and indented continuation lines for multi-line values.
//!
//! Any indented line after a key continues that key's value, even when it
//! contains `=` or `:`, so an indented `key = value` directly under another
//! key becomes part of the previous value. Pattern lists such as
//! `hide_file_names` rely on this, since regexes often contain those
//! characters.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::StoreError;

/// Entries before the first header land in this section.
pub const DEFAULT_SECTION: &str = "";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

/// Parsed INI file, keeping section and key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniFile {
    sections: Vec<Section>,
}

impl IniFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from disk. A missing file is an empty document.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| e.with_path(path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    pub fn parse(content: &str) -> Result<Self, StoreError> {
        let mut doc = IniFile::default();
        let mut current = DEFAULT_SECTION.to_string();
        let mut last_key: Option<String> = None;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indented = raw.starts_with(' ') || raw.starts_with('\t');
            if indented {
                if let Some(key) = &last_key {
                    let section = doc.section_mut(&current);
                    if let Some((_, value)) = section.entries.iter_mut().find(|(k, _)| k == key) {
                        if !value.is_empty() {
                            value.push('\n');
                        }
                        value.push_str(trimmed);
                        continue;
                    }
                }
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| StoreError::Parse {
                    path: None,
                    line: line_no,
                    message: format!("unterminated section header: {trimmed}"),
                })?;
                current = name.trim().to_string();
                doc.section_mut(&current);
                last_key = None;
                continue;
            }

            let split = trimmed.find(|c: char| c == '=' || c == ':').ok_or_else(|| StoreError::Parse {
                path: None,
                line: line_no,
                message: format!("expected key = value, got: {trimmed}"),
            })?;
            let key = trimmed[..split].trim();
            if key.is_empty() {
                return Err(StoreError::Parse {
                    path: None,
                    line: line_no,
                    message: "empty key".to_string(),
                });
            }
            let value = trimmed[split + 1..].trim();
            doc.set(&current, key, value);
            last_key = Some(key.to_string());
        }

        Ok(doc)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == section)?
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or overwrite a value, keeping the key's original position.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let section = self.section_mut(section);
        match section.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => section.entries.push((key.to_string(), value.to_string())),
        }
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.entries.is_empty())
    }

    /// Serialize back to INI text. Comments from the parsed source are not kept.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let ordered = self
            .sections
            .iter()
            .filter(|s| s.name == DEFAULT_SECTION)
            .chain(self.sections.iter().filter(|s| s.name != DEFAULT_SECTION));
        for section in ordered {
            if section.name == DEFAULT_SECTION && section.entries.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            if section.name != DEFAULT_SECTION {
                let _ = writeln!(out, "[{}]", section.name);
            }
            for (key, value) in &section.entries {
                let mut lines = value.split('\n');
                let first = lines.next().unwrap_or_default();
                let _ = writeln!(out, "{key} = {first}");
                for line in lines {
                    let _ = writeln!(out, "    {line}");
                }
            }
        }
        out
    }

    fn section_mut(&mut self, name: &str) -> &mut Section {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }
}
