//! Production domain text: the declarative action vocabulary.
//!
//! The domain file is one of the two production artifacts a promotion may
//! touch (the other is the skill registry). Action injection is a pure text
//! transformation validated before use; promotion replaces the file
//! atomically and keeps the prior revision under a `.bak` name.

use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// The domain text a fresh installation starts from.
pub const DEFAULT_DOMAIN: &str = r"(define (domain filestate)
  (:requirements :strips :typing)
  (:types file folder - object)
  (:constants root - folder)
  (:predicates
    (at ?f - file ?d - folder)
    (connected ?a - folder ?b - folder)
    (scanned ?d - folder)
    (is_created ?x - object))

  (:action scan
    :parameters (?d - folder)
    :precondition (and)
    :effect (scanned ?d))

  (:action move
    :parameters (?f - file ?from - folder ?to - folder)
    :precondition (and (at ?f ?from) (connected ?from ?to))
    :effect (and (at ?f ?to) (not (at ?f ?from))))

  (:action copy
    :parameters (?f - file ?from - folder ?to - folder)
    :precondition (and (at ?f ?from) (connected ?from ?to))
    :effect (at ?f ?to))

  (:action remove_file
    :parameters (?f - file ?d - folder)
    :precondition (at ?f ?d)
    :effect (not (at ?f ?d)))

  (:action create_file
    :parameters (?f - file ?d - folder)
    :precondition (scanned ?d)
    :effect (and (at ?f ?d) (is_created ?f)))

  (:action create_folder
    :parameters (?d - folder)
    :precondition (and)
    :effect (and (connected root ?d) (connected ?d root) (is_created ?d)))
)
";

/// Errors that can occur manipulating domain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainError {
    /// The specific error that occurred
    pub kind: DomainErrorKind,
}

/// Specific domain error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainErrorKind {
    /// The action fragment is not a well-formed block
    MalformedAction {
        /// Why it was rejected
        reason: String,
    },
    /// The domain text has no closing paren to insert before
    TruncatedDomain,
    /// A filesystem operation failed
    Io {
        /// What was being done
        context: String,
        /// The underlying failure
        reason: String,
    },
}

impl DomainError {
    /// Creates a malformed action error.
    #[must_use]
    pub fn malformed_action(reason: impl Into<String>) -> Self {
        Self {
            kind: DomainErrorKind::MalformedAction {
                reason: reason.into(),
            },
        }
    }

    /// Creates an I/O error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: DomainErrorKind::Io {
                context: context.into(),
                reason: reason.into(),
            },
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DomainErrorKind::MalformedAction { reason } => {
                write!(f, "action fragment rejected: {reason}")
            }
            DomainErrorKind::TruncatedDomain => {
                write!(f, "domain text has no closing paren; the file is truncated")
            }
            DomainErrorKind::Io { context, reason } => {
                write!(f, "domain I/O failure while {context}: {reason}")
            }
        }
    }
}

impl std::error::Error for DomainError {}

/// Error returned when atomic promotion of a production artifact fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionError {
    /// What was being done
    pub context: String,
    /// The underlying failure
    pub reason: String,
}

impl PromotionError {
    /// Creates a promotion error with context.
    #[must_use]
    pub fn new(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PromotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "promotion failed while {}: {}; production artifacts are unchanged",
            self.context, self.reason
        )
    }
}

impl std::error::Error for PromotionError {}

/// Extracts the action name from an `(:action name ...)` fragment.
#[must_use]
pub fn action_name_of(action_text: &str) -> Option<String> {
    let pattern = Regex::new(r"\(:action\s+([A-Za-z][A-Za-z0-9_-]*)").ok()?;
    pattern
        .captures(action_text)
        .map(|c| c[1].to_lowercase())
}

fn is_balanced(text: &str) -> bool {
    let mut depth: i64 = 0;
    for ch in text.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Inserts an action block before the domain's final closing paren.
///
/// Injection is idempotent per action name: if the domain already declares
/// an action of the same name, the text is returned unchanged.
///
/// # Errors
///
/// Returns [`DomainError`] for unbalanced fragments, fragments without an
/// action name, or a domain with no closing paren.
pub fn inject_action(domain: &str, action_text: &str) -> Result<String, DomainError> {
    let fragment = action_text.trim();
    if !is_balanced(fragment) {
        return Err(DomainError::malformed_action(
            "unbalanced parentheses in action fragment",
        ));
    }
    let name = action_name_of(fragment).ok_or_else(|| {
        DomainError::malformed_action("fragment does not start an (:action name ...) block")
    })?;

    let already = Regex::new(&format!(r"\(:action\s+{}\b", regex::escape(&name)))
        .map_err(|e| DomainError::malformed_action(format!("unusable action name: {e}")))?;
    if already.is_match(domain) {
        tracing::debug!(action = %name, "Action already declared, injection skipped");
        return Ok(domain.to_string());
    }

    let insert_at = domain
        .rfind(')')
        .ok_or(DomainError {
            kind: DomainErrorKind::TruncatedDomain,
        })?;

    let mut merged = String::with_capacity(domain.len() + fragment.len() + 4);
    merged.push_str(&domain[..insert_at]);
    merged.push_str("\n  ");
    merged.push_str(fragment);
    merged.push('\n');
    merged.push_str(&domain[insert_at..]);

    tracing::info!(action = %name, "Action injected into domain text");
    Ok(merged)
}

/// Owns the production domain file.
#[derive(Debug, Clone)]
pub struct DomainStore {
    domain_path: PathBuf,
}

impl DomainStore {
    /// Creates a store over a domain file path.
    #[must_use]
    pub fn new(domain_path: impl Into<PathBuf>) -> Self {
        Self {
            domain_path: domain_path.into(),
        }
    }

    /// Returns the production domain file path.
    #[must_use]
    pub fn domain_path(&self) -> &Path {
        &self.domain_path
    }

    /// Writes the default domain if no domain file exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] if the file cannot be written.
    pub fn ensure_initialized(&self) -> Result<(), DomainError> {
        if self.domain_path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.domain_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| DomainError::io("creating domain directory", e.to_string()))?;
        }
        fs::write(&self.domain_path, DEFAULT_DOMAIN)
            .map_err(|e| DomainError::io("writing default domain", e.to_string()))
    }

    /// Reads the production domain text.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] if the file cannot be read.
    pub fn load(&self) -> Result<String, DomainError> {
        fs::read_to_string(&self.domain_path)
            .map_err(|e| DomainError::io("reading production domain", e.to_string()))
    }

    /// Atomically replaces the production domain text.
    ///
    /// The new text is written to a temp file first, the prior revision is
    /// retained under a `.bak` name, and the temp file is renamed into
    /// place. Promoting identical text twice is a no-op after the first.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError`]; on failure the production file is either
    /// untouched or already fully replaced, never half-written.
    pub fn promote(&self, new_text: &str) -> Result<(), PromotionError> {
        let current = fs::read_to_string(&self.domain_path).ok();
        if current.as_deref() == Some(new_text) {
            tracing::debug!("Domain text unchanged, promotion is a no-op");
            return Ok(());
        }

        let staged = self.domain_path.with_extension("pddl.tmp");
        fs::write(&staged, new_text)
            .map_err(|e| PromotionError::new("staging new domain text", e.to_string()))?;

        if self.domain_path.exists() {
            let backup = self.domain_path.with_extension("pddl.bak");
            fs::copy(&self.domain_path, &backup)
                .map_err(|e| PromotionError::new("backing up prior domain", e.to_string()))?;
        }

        fs::rename(&staged, &self.domain_path)
            .map_err(|e| PromotionError::new("installing new domain text", e.to_string()))?;
        tracing::info!(path = %self.domain_path.display(), "Domain text promoted");
        Ok(())
    }
}
