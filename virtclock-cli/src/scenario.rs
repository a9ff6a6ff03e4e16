//! Scenario files: the subscriptions a replay creates and when it touches them.
//!
//! ```yaml
//! start_unix_ms: 0
//! subscriptions:
//!   - name: heartbeat
//!     kind: ticker
//!     period_ms: 3
//!     reset_at_ms: 5
//!     stop_at_ms: 20
//!   - name: deadline
//!     kind: after_func
//!     period_ms: 7
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Ticker,
    Timer,
    After,
    AfterFunc,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_unique_names"))]
pub struct Scenario {
    /// Overrides the configured start of the timeline.
    #[serde(default)]
    pub start_unix_ms: Option<i64>,

    #[validate(length(min = 1))]
    #[validate(nested)]
    pub subscriptions: Vec<SubscriptionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_actions"))]
pub struct SubscriptionSpec {
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    pub kind: Kind,

    /// Ticker period, or the delay of a one-shot wait.
    pub period_ms: u64,

    /// Offset from the start at which the subscription is created.
    #[serde(default)]
    pub create_at_ms: u64,

    /// Tickers only.
    #[serde(default)]
    pub reset_at_ms: Option<u64>,

    /// New period applied at `reset_at_ms`. Defaults to `period_ms`.
    #[serde(default)]
    pub reset_period_ms: Option<u64>,

    #[serde(default)]
    pub stop_at_ms: Option<u64>,
}

impl SubscriptionSpec {
    pub fn new(name: &str, kind: Kind, period_ms: u64) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            period_ms,
            create_at_ms: 0,
            reset_at_ms: None,
            reset_period_ms: None,
            stop_at_ms: None,
        }
    }
}

impl Scenario {
    /// Loads and validates a scenario from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CliError::ScenarioNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, CliError> {
        let scenario: Self = serde_yaml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// A 3ms ticker next to a 1ms `after`, both registered at the start.
    pub fn demo() -> Self {
        Self {
            start_unix_ms: Some(0),
            subscriptions: vec![
                SubscriptionSpec::new("ticker", Kind::Ticker, 3),
                SubscriptionSpec::new("after", Kind::After, 1),
            ],
        }
    }
}

fn validate_unique_names(scenario: &Scenario) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for spec in &scenario.subscriptions {
        if !seen.insert(spec.name.as_str()) {
            return Err(ValidationError::new("duplicate_name")
                .with_message(format!("subscription `{}` is declared twice", spec.name).into()));
        }
    }
    Ok(())
}

fn validate_actions(spec: &SubscriptionSpec) -> Result<(), ValidationError> {
    if spec.reset_at_ms.is_some() && spec.kind != Kind::Ticker {
        return Err(ValidationError::new("reset_not_supported")
            .with_message("only tickers can be reset".into()));
    }
    if spec.reset_period_ms.is_some() && spec.reset_at_ms.is_none() {
        return Err(ValidationError::new("reset_period_without_reset")
            .with_message("reset_period_ms needs reset_at_ms".into()));
    }
    if spec.stop_at_ms.is_some() && spec.kind == Kind::After {
        return Err(ValidationError::new("stop_not_supported")
            .with_message("`after` waits have no handle to stop".into()));
    }
    let before_creation = [spec.reset_at_ms, spec.stop_at_ms]
        .into_iter()
        .flatten()
        .any(|at| at < spec.create_at_ms);
    if before_creation {
        return Err(ValidationError::new("action_before_creation")
            .with_message("reset and stop must not precede create_at_ms".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_scenario() {
        let scenario = Scenario::from_yaml(
            r#"
start_unix_ms: 1000
subscriptions:
  - name: heartbeat
    kind: ticker
    period_ms: 3
    reset_at_ms: 5
    reset_period_ms: 4
    stop_at_ms: 20
  - name: cleanup
    kind: after_func
    period_ms: 7
    create_at_ms: 2
"#,
        )
        .unwrap();
        assert_eq!(scenario.start_unix_ms, Some(1000));
        assert_eq!(scenario.subscriptions.len(), 2);
        assert_eq!(scenario.subscriptions[0].reset_period_ms, Some(4));
        assert_eq!(scenario.subscriptions[1].kind, Kind::AfterFunc);
        assert_eq!(scenario.subscriptions[1].create_at_ms, 2);
    }

    #[test]
    fn demo_is_valid() {
        assert!(Scenario::demo().validate().is_ok());
    }

    #[test]
    fn rejects_reset_on_timer() {
        let err = Scenario::from_yaml(
            "subscriptions:\n  - {name: t, kind: timer, period_ms: 1, reset_at_ms: 2}\n",
        )
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidScenario(_)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Scenario::from_yaml(
            r#"
subscriptions:
  - {name: a, kind: timer, period_ms: 1}
  - {name: a, kind: after, period_ms: 2}
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("declared twice"), "{err}");
    }

    #[test]
    fn rejects_stop_before_creation() {
        let err = Scenario::from_yaml(
            r#"
subscriptions:
  - {name: a, kind: ticker, period_ms: 1, create_at_ms: 5, stop_at_ms: 2}
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidScenario(_)));
    }

    #[test]
    fn rejects_unknown_kind_and_fields() {
        assert!(matches!(
            Scenario::from_yaml("subscriptions:\n  - {name: a, kind: cron, period_ms: 1}\n"),
            Err(CliError::Parse(_))
        ));
        assert!(matches!(
            Scenario::from_yaml("subscriptions:\n  - {name: a, kind: timer, period: 1}\n"),
            Err(CliError::Parse(_))
        ));
    }

    #[test]
    fn rejects_empty_scenario() {
        let err = Scenario::from_yaml("subscriptions: []\n").unwrap_err();
        assert!(matches!(err, CliError::InvalidScenario(_)));
        assert!(err.to_string().contains("subscriptions"), "{err}");
    }

    #[test]
    fn demo_can_be_written_out_and_replayed() {
        let yaml = serde_yaml::to_string(&Scenario::demo()).unwrap();
        assert!(yaml.contains("kind: after"), "{yaml}");
        let scenario = Scenario::from_yaml(&yaml).unwrap();
        let kinds: Vec<_> = scenario.subscriptions.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![Kind::Ticker, Kind::After]);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "subscriptions:\n  - {{name: a, kind: after, period_ms: 2}}").unwrap();
        let scenario = Scenario::load_from_file(file.path()).unwrap();
        assert_eq!(scenario.subscriptions[0].name, "a");

        assert!(matches!(
            Scenario::load_from_file("missing/scenario.yaml"),
            Err(CliError::ScenarioNotFound(_))
        ));
    }
}
