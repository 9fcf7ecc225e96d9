//! Optional request/response channel to a remote skill server.
//!
//! The channel is a blocking JSON client with three independently
//! configured timeouts: connection establishment, per-call execution, and
//! response read. A call-level timeout fails only that call; the client
//! stays up and later calls proceed. Only a connection-level failure marks
//! the channel down. Discovered capabilities are exposed through the local
//! skill contract via [`RemoteSkill`].

use crate::facts::Fact;
use crate::skills::{ArgKind, EffectContract, ExecutionResult, Skill, SkillHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Timeouts and endpoint for the remote channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Server base URL, e.g. `http://127.0.0.1:7070`
    pub base_url: String,
    /// Budget for establishing a connection
    pub connect_timeout_secs: u64,
    /// Budget for one skill invocation
    pub call_timeout_secs: u64,
    /// Budget for reading a response
    pub read_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7070".to_string(),
            connect_timeout_secs: 5,
            call_timeout_secs: 30,
            read_timeout_secs: 10,
        }
    }
}

/// Errors the remote channel can surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// The specific error that occurred
    pub kind: RemoteErrorKind,
}

/// Specific remote channel error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The connection could not be established; the channel is down
    Connect {
        /// The underlying failure
        reason: String,
    },
    /// One call exceeded its execution budget
    CallTimeout,
    /// The response body could not be read in time
    ReadTimeout,
    /// The server answered with something the protocol does not admit
    Protocol {
        /// What was wrong with the exchange
        reason: String,
    },
    /// The remote skill ran and reported failure
    SkillFailed {
        /// The skill's failure message
        reason: String,
    },
}

impl RemoteError {
    fn connect(reason: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Connect {
                reason: reason.into(),
            },
        }
    }

    fn protocol(reason: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Protocol {
                reason: reason.into(),
            },
        }
    }

    /// Returns true if the channel itself is down.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self.kind, RemoteErrorKind::Connect { .. })
    }

    /// Returns true if a budget fired; the channel stays usable.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind,
            RemoteErrorKind::CallTimeout | RemoteErrorKind::ReadTimeout
        )
    }

    fn classify(error: &reqwest::Error) -> Self {
        if error.is_connect() {
            return Self::connect(error.to_string());
        }
        if error.is_timeout() {
            if error.is_body() || error.is_decode() {
                return Self {
                    kind: RemoteErrorKind::ReadTimeout,
                };
            }
            return Self {
                kind: RemoteErrorKind::CallTimeout,
            };
        }
        Self::protocol(error.to_string())
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RemoteErrorKind::Connect { reason } => {
                write!(f, "remote channel is down: {reason}; check the server address")
            }
            RemoteErrorKind::CallTimeout => {
                write!(f, "remote call exceeded its execution budget; the channel stays up")
            }
            RemoteErrorKind::ReadTimeout => {
                write!(f, "remote response was not read in time; the channel stays up")
            }
            RemoteErrorKind::Protocol { reason } => {
                write!(f, "remote protocol violation: {reason}")
            }
            RemoteErrorKind::SkillFailed { reason } => {
                write!(f, "remote skill reported failure: {reason}")
            }
        }
    }
}

impl std::error::Error for RemoteError {}

/// A capability the server advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSkillDescriptor {
    /// Registry name
    pub name: String,
    /// Parameter kinds, in call order
    pub params: Vec<ArgKind>,
    /// Predicates the skill may add
    #[serde(default)]
    pub adds: Vec<String>,
    /// Predicates the skill may delete
    #[serde(default)]
    pub dels: Vec<String>,
}

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    skill: &'a str,
    args: &'a [String],
}

/// The wire form of one remote execution outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOutcome {
    /// Whether the skill achieved its effect
    pub success: bool,
    /// Outcome description
    pub message: String,
    /// Canonical fact literals to insert
    #[serde(default)]
    pub add_facts: Vec<String>,
    /// Canonical fact literals to remove
    #[serde(default)]
    pub del_facts: Vec<String>,
}

impl RemoteOutcome {
    /// Converts the wire outcome into a local execution result.
    ///
    /// Unparsable fact literals turn the outcome into a failure so a
    /// malformed delta can never reach the fact-set.
    #[must_use]
    pub fn into_execution_result(self) -> ExecutionResult {
        if !self.success {
            return ExecutionResult::failure(self.message);
        }
        let parse_all = |literals: &[String]| -> Result<Vec<Fact>, String> {
            literals
                .iter()
                .map(|l| Fact::parse(l).map_err(|e| e.to_string()))
                .collect()
        };
        match (parse_all(&self.add_facts), parse_all(&self.del_facts)) {
            (Ok(add_facts), Ok(del_facts)) => {
                ExecutionResult::success(self.message, add_facts, del_facts)
            }
            (Err(e), _) | (_, Err(e)) => {
                ExecutionResult::failure(format!("remote outcome carried a bad fact literal: {e}"))
            }
        }
    }
}

/// Blocking JSON client for a remote skill server.
pub struct RemoteChannel {
    client: reqwest::blocking::Client,
    base_url: String,
    call_timeout: Duration,
}

impl RemoteChannel {
    /// Builds a channel from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the HTTP client cannot be constructed.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| RemoteError::connect(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            call_timeout: Duration::from_secs(config.call_timeout_secs),
        })
    }

    /// Lists the capabilities the server advertises.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] classified by what failed.
    pub fn list_skills(&self) -> Result<Vec<RemoteSkillDescriptor>, RemoteError> {
        let url = format!("{}/skills", self.base_url);
        tracing::debug!(%url, "Listing remote skills");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| RemoteError::classify(&e))?;
        if !response.status().is_success() {
            return Err(RemoteError::protocol(format!(
                "skill listing answered {}",
                response.status()
            )));
        }
        response.json().map_err(|e| RemoteError::classify(&e))
    }

    /// Invokes one remote skill under the call budget.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`]; a call timeout fails only this call.
    pub fn invoke(&self, skill: &str, args: &[String]) -> Result<RemoteOutcome, RemoteError> {
        let url = format!("{}/invoke", self.base_url);
        tracing::debug!(%url, skill, "Invoking remote skill");
        let response = self
            .client
            .post(&url)
            .timeout(self.call_timeout)
            .json(&InvokeRequest { skill, args })
            .send()
            .map_err(|e| RemoteError::classify(&e))?;
        if !response.status().is_success() {
            return Err(RemoteError::protocol(format!(
                "invocation answered {}",
                response.status()
            )));
        }
        response.json().map_err(|e| RemoteError::classify(&e))
    }
}

impl fmt::Debug for RemoteChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteChannel")
            .field("base_url", &self.base_url)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

/// A discovered remote capability behind the local skill contract.
pub struct RemoteSkill {
    channel: Arc<RemoteChannel>,
    name: String,
    params: Vec<ArgKind>,
    effects: EffectContract,
}

impl RemoteSkill {
    /// Wraps one advertised capability.
    #[must_use]
    pub fn new(channel: Arc<RemoteChannel>, descriptor: RemoteSkillDescriptor) -> Self {
        Self {
            channel,
            name: descriptor.name.to_lowercase(),
            params: descriptor.params,
            effects: EffectContract::new(descriptor.adds, descriptor.dels),
        }
    }
}

impl Skill for RemoteSkill {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &[ArgKind] {
        &self.params
    }

    fn effects(&self) -> &EffectContract {
        &self.effects
    }

    fn execute(&self, args: &[String], _root: &Path) -> ExecutionResult {
        match self.channel.invoke(&self.name, args) {
            Ok(outcome) => outcome.into_execution_result(),
            Err(e) => ExecutionResult::failure(e.to_string()),
        }
    }
}

/// Discovers every advertised capability as a registrable skill.
///
/// # Errors
///
/// Returns [`RemoteError`] if discovery itself fails.
pub fn discover_skills(channel: &Arc<RemoteChannel>) -> Result<Vec<SkillHandle>, RemoteError> {
    let descriptors = channel.list_skills()?;
    tracing::info!(count = descriptors.len(), "Remote skills discovered");
    Ok(descriptors
        .into_iter()
        .map(|d| Arc::new(RemoteSkill::new(Arc::clone(channel), d)) as SkillHandle)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_round_trips_through_json() {
        let descriptor = RemoteSkillDescriptor {
            name: "compress".to_string(),
            params: vec![ArgKind::File, ArgKind::Folder],
            adds: vec!["at".to_string()],
            dels: vec![],
        };
        let text = serde_json::to_string(&descriptor).unwrap();
        let parsed: RemoteSkillDescriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn outcome_maps_to_execution_result() {
        let outcome = RemoteOutcome {
            success: true,
            message: "compressed".to_string(),
            add_facts: vec!["(at archive_dot_zip backup)".to_string()],
            del_facts: vec![],
        };
        let result = outcome.into_execution_result();
        assert!(result.success);
        assert_eq!(
            result.add_facts,
            [Fact::new("at", ["archive_dot_zip", "backup"])]
        );
    }

    #[test]
    fn failed_outcome_carries_no_delta() {
        let outcome = RemoteOutcome {
            success: false,
            message: "disk full".to_string(),
            add_facts: vec!["(at x y)".to_string()],
            del_facts: vec![],
        };
        let result = outcome.into_execution_result();
        assert!(!result.success);
        assert!(result.add_facts.is_empty());
    }

    #[test]
    fn bad_fact_literal_poisons_the_outcome() {
        let outcome = RemoteOutcome {
            success: true,
            message: "done".to_string(),
            add_facts: vec!["not a fact".to_string()],
            del_facts: vec![],
        };
        let result = outcome.into_execution_result();
        assert!(!result.success);
        assert!(result.message.contains("bad fact literal"));
    }

    #[test]
    fn unreachable_server_is_a_connect_error() {
        let config = RemoteConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            connect_timeout_secs: 1,
            call_timeout_secs: 1,
            read_timeout_secs: 1,
        };
        let channel = RemoteChannel::new(&config).unwrap();
        let error = channel.list_skills().unwrap_err();
        assert!(error.is_connect() || error.is_timeout());
    }

    #[test]
    fn error_messages_name_the_recovery() {
        let error = RemoteError {
            kind: RemoteErrorKind::CallTimeout,
        };
        assert!(error.to_string().contains("channel stays up"));
    }
}
