use regex::Regex;

use crate::heartbeat::{EntityType, Heartbeat};
use crate::pipeline::{DispatchResult, Handle, Stage};

/// Replacement for a redacted entity.
pub const HIDDEN: &str = "HIDDEN";

/// Pattern groups deciding which heartbeat fields are redacted.
#[derive(Debug, Clone, Default)]
pub struct SanitizeConfig {
    /// Matched against `entity` for every entity type.
    pub file_patterns: Vec<Regex>,
    pub branch_patterns: Vec<Regex>,
    pub project_patterns: Vec<Regex>,
}

impl SanitizeConfig {
    pub fn is_empty(&self) -> bool {
        self.file_patterns.is_empty()
            && self.branch_patterns.is_empty()
            && self.project_patterns.is_empty()
    }
}

/// True if any pattern matches somewhere in `subject`.
pub fn should_sanitize(subject: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|re| re.is_match(subject))
}

/// Return a copy of `h` with the configured redactions applied.
pub fn sanitize(h: &Heartbeat, config: &SanitizeConfig) -> Heartbeat {
    let mut out = h.clone();

    if should_sanitize(&h.entity, &config.file_patterns) {
        out.entity = hidden_entity(&h.entity, h.entity_type);
        out.branch = None;
        out.cursor_position = None;
        out.dependencies = Vec::new();
        out.line_number = None;
        out.lines = None;
        out.project = None;
    }

    if let Some(project) = &h.project {
        if should_sanitize(project, &config.project_patterns) {
            out.branch = None;
        }
    }

    if let Some(branch) = &h.branch {
        if should_sanitize(branch, &config.branch_patterns) {
            out.branch = None;
        }
    }

    out
}

fn hidden_entity(entity: &str, entity_type: EntityType) -> String {
    match entity_type {
        EntityType::File => format!("{HIDDEN}{}", extension(entity)),
        EntityType::App | EntityType::Domain => HIDDEN.to_string(),
    }
}

/// Extension of the last path element including the dot, or "" if none.
fn extension(path: &str) -> &str {
    let name = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) => &name[idx..],
        None => "",
    }
}

// ── Stage ──

/// Pipeline stage redacting every heartbeat before it reaches the next handle.
pub struct WithSanitization {
    config: SanitizeConfig,
}

impl WithSanitization {
    pub fn new(config: SanitizeConfig) -> Self {
        Self { config }
    }
}

struct SanitizeHandle {
    config: SanitizeConfig,
    next: Box<dyn Handle>,
}

impl Stage for WithSanitization {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    fn wrap(self: Box<Self>, next: Box<dyn Handle>) -> Box<dyn Handle> {
        Box::new(SanitizeHandle {
            config: self.config,
            next,
        })
    }
}

impl Handle for SanitizeHandle {
    fn handle(&self, batch: Vec<Heartbeat>) -> DispatchResult {
        tracing::debug!("execute heartbeat sanitization");
        if self.config.is_empty() {
            return self.next.handle(batch);
        }
        let batch = batch.iter().map(|h| sanitize(h, &self.config)).collect();
        self.next.handle(batch)
    }
}
