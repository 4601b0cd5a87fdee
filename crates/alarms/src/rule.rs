use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::{Condition, Skip, Verdict};
use crate::setpoint::SetpointStore;
use crate::value::TagRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Normal,
    Warning,
    Fault,
    /// Safety-logic permissive rather than an operator alert.
    Interlock,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Some(Severity::Normal),
            "WARNING" => Some(Severity::Warning),
            "FAULT" => Some(Severity::Fault),
            "INTERLOCK" => Some(Severity::Interlock),
            _ => None,
        }
    }

    pub fn is_alarm(self) -> bool {
        self != Severity::Normal
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Normal => "NORMAL",
            Severity::Warning => "WARNING",
            Severity::Fault => "FAULT",
            Severity::Interlock => "INTERLOCK",
        };
        f.write_str(s)
    }
}

/// Conditions on one tag raised on behalf of one piece of equipment.
///
/// Every condition is tested on its own and yields its own alert.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlarmRule {
    pub tag: String,
    pub equipment_name: String,
    /// Supports `{tag}`, `{equipment}` and `{value}` placeholders.
    pub description_template: String,
    pub severity: Severity,
    pub conditions: Vec<Condition>,
}

impl AlarmRule {
    pub fn new(
        tag: impl Into<String>,
        equipment_name: impl Into<String>,
        description_template: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            tag: tag.into(),
            equipment_name: equipment_name.into(),
            description_template: description_template.into(),
            severity,
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn render_description(&self, value: Option<f64>) -> String {
        let value = match value {
            Some(v) => format!("{v:.2}"),
            None => "n/a".to_string(),
        };
        self.description_template
            .replace("{tag}", &self.tag)
            .replace("{equipment}", &self.equipment_name)
            .replace("{value}", &value)
    }
}

/// Rules in declaration order, plus the equipment tags listed per sensor.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<AlarmRule>,
    equipment: HashMap<String, Vec<String>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: AlarmRule) {
        self.rules.push(rule);
    }

    pub fn set_equipment(&mut self, tag: impl Into<String>, equipment: Vec<String>) {
        self.equipment.insert(tag.into(), equipment);
    }

    pub fn equipment_for(&self, tag: &str) -> &[String] {
        self.equipment.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rules(&self) -> &[AlarmRule] {
        &self.rules
    }

    pub fn rules_for<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a AlarmRule> + 'a {
        self.rules.iter().filter(move |r| r.tag == tag)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn condition_count(&self) -> usize {
        self.rules.iter().map(|r| r.conditions.len()).sum()
    }

    pub fn evaluate(&self, samples: &TagRegistry, setpoints: &SetpointStore) -> Evaluation {
        evaluate_all(&self.rules, samples, setpoints)
    }
}

impl FromIterator<AlarmRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = AlarmRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
            equipment: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub tag: String,
    pub equipment_name: String,
    pub description: String,
    pub severity: Severity,
    /// `None` for multi-tag conjunctions.
    pub observed_value: Option<f64>,
}

impl fmt::Display for AlertRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.description, self.equipment_name)?;
        match self.observed_value {
            Some(v) => write!(f, " (tag: {}, value: {v:.2})", self.tag),
            None => f.write_str(" (all conditions met)"),
        }
    }
}

/// Per-cycle counts of conditions that could not be evaluated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub missing_samples: u64,
    pub missing_setpoints: u64,
    pub type_mismatches: u64,
    pub config_errors: u64,
    /// Distinct configuration gaps, in the order first seen.
    #[serde(skip)]
    pub config_gaps: Vec<Skip>,
}

impl Diagnostics {
    pub fn record(&mut self, skip: &Skip) {
        match skip {
            Skip::MissingSample { .. } => self.missing_samples += 1,
            Skip::MissingSetpoint { .. } => self.missing_setpoints += 1,
            Skip::TypeMismatch { .. } => self.type_mismatches += 1,
            Skip::Unsupported { .. } => self.config_errors += 1,
        }
        if skip.is_config_error() {
            self.note_gap(skip);
        }
    }

    fn note_gap(&mut self, skip: &Skip) {
        if !self.config_gaps.contains(skip) {
            self.config_gaps.push(skip.clone());
        }
    }

    pub fn merge(&mut self, other: &Diagnostics) {
        self.missing_samples += other.missing_samples;
        self.missing_setpoints += other.missing_setpoints;
        self.type_mismatches += other.type_mismatches;
        self.config_errors += other.config_errors;
        for gap in &other.config_gaps {
            self.note_gap(gap);
        }
    }

    pub fn has_config_gaps(&self) -> bool {
        self.missing_setpoints > 0 || self.config_errors > 0
    }

    pub fn total(&self) -> u64 {
        self.missing_samples + self.missing_setpoints + self.type_mismatches + self.config_errors
    }
}

#[derive(Clone, Debug, Default)]
pub struct Evaluation {
    pub alerts: Vec<AlertRecord>,
    pub diagnostics: Diagnostics,
}

/// Evaluate every condition of every rule against one cycle's samples.
///
/// One alert per satisfied condition, in declaration order. A condition that
/// cannot be evaluated is counted in the diagnostics and evaluation moves on.
pub fn evaluate_all(rules: &[AlarmRule], samples: &TagRegistry, setpoints: &SetpointStore) -> Evaluation {
    let mut out = Evaluation::default();

    for rule in rules {
        for condition in &rule.conditions {
            match condition.check_in(&rule.tag, samples, setpoints) {
                Verdict::Alarm => {
                    let observed_value = if condition.is_multi_tag() {
                        None
                    } else {
                        samples.value(&rule.tag).and_then(|v| v.as_f64())
                    };
                    out.alerts.push(AlertRecord {
                        timestamp: samples.timestamp(),
                        tag: rule.tag.clone(),
                        equipment_name: rule.equipment_name.clone(),
                        description: rule.render_description(observed_value),
                        severity: rule.severity,
                        observed_value,
                    });
                }
                Verdict::Clear => {}
                Verdict::Skipped(skip) => out.diagnostics.record(&skip),
            }
        }
    }

    out
}
