use regex::Regex;

use waka_core::SanitizeConfig;

use crate::config::{parse_bool, Config};

const FILE_KEYS: &[&str] = &[
    "hide-file-names",
    "settings.hide_file_names",
    "settings.hide_filenames",
    "settings.hidefilenames",
];
const PROJECT_KEYS: &[&str] = &["hide-project-names", "settings.hide_project_names"];
const BRANCH_KEYS: &[&str] = &["hide-branch-names", "settings.hide_branch_names"];

/// Build the redaction pattern groups from configuration.
pub fn load_sanitize_config(config: &Config) -> SanitizeConfig {
    SanitizeConfig {
        file_patterns: patterns_for(config, FILE_KEYS),
        branch_patterns: patterns_for(config, BRANCH_KEYS),
        project_patterns: patterns_for(config, PROJECT_KEYS),
    }
}

fn patterns_for(config: &Config, keys: &[&str]) -> Vec<Regex> {
    config
        .first_non_empty_string(keys)
        .map(parse_patterns)
        .unwrap_or_default()
}

/// `true` hides everything, `false` nothing; anything else is a
/// newline-separated list of regexes. Invalid regexes are skipped.
pub fn parse_patterns(value: &str) -> Vec<Regex> {
    match parse_bool(value) {
        Some(true) => return Regex::new(".*").into_iter().collect(),
        Some(false) => return Vec::new(),
        None => {}
    }
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match Regex::new(line) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(pattern = line, error = %e, "skipping invalid regex");
                None
            }
        })
        .collect()
}
