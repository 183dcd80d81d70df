//! Server configuration from environment variables

use crate::llm::RoleModels;
use crate::runtime::{CourtSettings, DirectivePolicy};
use crate::scoring::{ScoreTable, ScoreTableError};
use crate::state_machine::{InterruptPolicy, PhasePolicy};
use crate::validator::CitationValidator;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1800);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },
    #[error("COURT_SCORE_TABLE: {0}")]
    ScoreTable(#[from] ScoreTableError),
}

impl ConfigError {
    fn invalid(var: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CourtConfig {
    pub port: u16,
    pub llm_base_url: String,
    pub api_key: Option<String>,
    pub idle_timeout: Duration,
    pub settings: CourtSettings,
}

impl CourtConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset and blank variables
    /// take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = parse_or(var("COURT_PORT"), "COURT_PORT", DEFAULT_PORT)?;
        let llm_base_url = var("COURT_LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = var("COURT_LLM_API_KEY").or_else(|| var("OPENAI_API_KEY"));

        let defaults = RoleModels::default();
        let models = RoleModels {
            researcher: var("COURT_RESEARCHER_MODEL").unwrap_or(defaults.researcher),
            defense: var("COURT_DEFENSE_MODEL").unwrap_or(defaults.defense),
            prosecution: var("COURT_PROSECUTION_MODEL").unwrap_or(defaults.prosecution),
            cross_exam: var("COURT_CROSS_EXAM_MODEL").unwrap_or(defaults.cross_exam),
            judge: var("COURT_JUDGE_MODEL").unwrap_or(defaults.judge),
        };

        let interrupt = match var("COURT_INTERRUPT_POLICY") {
            Some(v) => v
                .parse::<InterruptPolicy>()
                .map_err(|e| ConfigError::invalid("COURT_INTERRUPT_POLICY", e))?,
            None => InterruptPolicy::default(),
        };
        let directives = match var("COURT_DIRECTIVE_POLICY") {
            Some(v) => v
                .parse::<DirectivePolicy>()
                .map_err(|e| ConfigError::invalid("COURT_DIRECTIVE_POLICY", e))?,
            None => DirectivePolicy::default(),
        };

        let phase_defaults = PhasePolicy::default();
        let phases = PhasePolicy {
            interrupt,
            cross_exam_exchanges: parse_or(
                var("COURT_CROSS_EXAM_EXCHANGES"),
                "COURT_CROSS_EXAM_EXCHANGES",
                phase_defaults.cross_exam_exchanges,
            )?,
            closings: parse_or(var("COURT_CLOSINGS"), "COURT_CLOSINGS", phase_defaults.closings)?,
        };

        let idle_timeout = Duration::from_secs(parse_or(
            var("COURT_IDLE_TIMEOUT_SECS"),
            "COURT_IDLE_TIMEOUT_SECS",
            DEFAULT_IDLE_TIMEOUT.as_secs(),
        )?);

        let mut scores = ScoreTable::default();
        if let Some(overrides) = var("COURT_SCORE_TABLE") {
            scores.apply_overrides(&overrides)?;
        }

        let validator = match var("COURT_HEDGE_WORDS") {
            Some(list) => CitationValidator::new(list.split(',').map(str::trim)),
            None => CitationValidator::default(),
        };

        Ok(Self {
            port,
            llm_base_url,
            api_key,
            idle_timeout,
            settings: CourtSettings {
                phases,
                directives,
                models,
                scores,
                validator,
            },
        })
    }
}

fn parse_or<T>(value: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid(var, format!("'{v}': {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoreEventKind;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<CourtConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CourtConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.llm_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_key, None);
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert_eq!(config.settings.phases, PhasePolicy::default());
        assert_eq!(config.settings.directives, DirectivePolicy::Reject);
        assert_eq!(config.settings.models, RoleModels::default());
    }

    #[test]
    fn court_key_wins_over_openai_key() {
        let both = config(&[("OPENAI_API_KEY", "sk-open"), ("COURT_LLM_API_KEY", "sk-court")]).unwrap();
        assert_eq!(both.api_key.as_deref(), Some("sk-court"));
        let fallback = config(&[("OPENAI_API_KEY", "sk-open")]).unwrap();
        assert_eq!(fallback.api_key.as_deref(), Some("sk-open"));
    }

    #[test]
    fn overrides_apply() {
        let config = config(&[
            ("COURT_PORT", "9100"),
            ("COURT_INTERRUPT_POLICY", "openings"),
            ("COURT_DIRECTIVE_POLICY", "replace"),
            ("COURT_CROSS_EXAM_EXCHANGES", "5"),
            ("COURT_CLOSINGS", "false"),
            ("COURT_IDLE_TIMEOUT_SECS", "60"),
            ("COURT_SCORE_TABLE", "kill_shot=-15,rebuttal="),
            ("COURT_JUDGE_MODEL", "gpt-judge"),
        ])
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.settings.phases.interrupt, InterruptPolicy::Openings);
        assert_eq!(config.settings.directives, DirectivePolicy::Replace);
        assert_eq!(config.settings.phases.cross_exam_exchanges, 5);
        assert!(!config.settings.phases.closings);
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.settings.scores.delta(ScoreEventKind::KillShot), Some(-15));
        assert_eq!(config.settings.scores.delta(ScoreEventKind::Rebuttal), None);
        assert_eq!(config.settings.models.judge, "gpt-judge");
    }

    #[test]
    fn custom_hedges_replace_defaults() {
        let config = config(&[("COURT_HEDGE_WORDS", "maybe, i reckon")]).unwrap();
        assert!(config.settings.validator.is_hedged("I reckon costs will fall."));
        assert!(!config.settings.validator.is_hedged("Arguably costs will fall."));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(matches!(
            config(&[("COURT_PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "COURT_PORT", .. })
        ));
        assert!(matches!(
            config(&[("COURT_INTERRUPT_POLICY", "never")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("COURT_SCORE_TABLE", "bogus=3")]),
            Err(ConfigError::ScoreTable(_))
        ));
    }
}
