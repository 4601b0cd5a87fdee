//! Rule document loader.
//!
//! The document maps each sensor tag to the equipment that references it and
//! an ordered list of condition entries:
//!
//! ```json
//! {
//!   "2270-LIT-11850": {
//!     "equipos": ["2270-ZM-009-12A/13A"],
//!     "condiciones": [
//!       {"operador": ">", "valor": 40, "unidad": "%", "tipo_alarma": "INTERLOCK",
//!        "nombre_equipo": "LIME TRANSFER PUMP", "descripcion": "Start transfer pump"}
//!     ]
//!   }
//! }
//! ```
//!
//! English keys (`equipment`, `conditions`, `kind`, `operator`, `value`, ...)
//! are accepted as well. Entries that cannot be understood are kept as
//! [`Condition::Unsupported`] and reported as [`ConfigIssue`]s; only an
//! unreadable document is an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::condition::{Condition, Direction, Operator, SubCondition};
use crate::rule::{AlarmRule, RuleSet, Severity};
use crate::value::SampleValue;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule document must be a JSON object keyed by tag")]
    NotAnObject,
}

/// Non-fatal problem found while loading the rule document.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigIssue {
    pub tag: String,
    /// Position of the condition entry under its tag, when the problem is
    /// local to one entry.
    pub index: Option<usize>,
    pub problem: Problem,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(i) => write!(f, "{} condition #{}: {}", self.tag, i + 1, self.problem),
            None => write!(f, "{}: {}", self.tag, self.problem),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Problem {
    #[error("unknown condition kind `{0}`")]
    UnknownKind(String),
    #[error("unknown or missing operator {0:?}")]
    UnknownOperator(Option<String>),
    #[error("missing or non-numeric threshold value")]
    MissingValue,
    #[error("`between` needs a two-element numeric range with low <= high")]
    InvalidRange,
    #[error("free-text condition `{0}` cannot be evaluated")]
    FreeText(String),
    #[error("condition kind `{0}` is evaluated outside the alarm engine")]
    External(String),
    #[error("multiple_and without sub-conditions")]
    EmptyConjunction,
    #[error("multiple_and sub-condition #{0} needs tag, operator and expected value")]
    IncompleteSubCondition(usize),
    #[error("unknown severity `{0}`, using WARNING")]
    UnknownSeverity(String),
    #[error("missing severity, using WARNING")]
    MissingSeverity,
    #[error("malformed entry: {0}")]
    Malformed(String),
}

#[derive(Debug, Default)]
pub struct LoadedRules {
    pub rules: RuleSet,
    pub issues: Vec<ConfigIssue>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTagEntry {
    #[serde(default, alias = "equipos")]
    equipment: Vec<String>,
    #[serde(default, alias = "nombre_equipo")]
    equipment_name: Option<String>,
    #[serde(default, alias = "condiciones")]
    conditions: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCondition {
    #[serde(default, alias = "tipo")]
    kind: Option<String>,
    #[serde(default, alias = "operador")]
    operator: Option<String>,
    #[serde(default, alias = "valor")]
    value: Option<Value>,
    #[serde(default, alias = "rango")]
    range: Option<Value>,
    #[serde(default)]
    delta: Option<f64>,
    #[serde(default, alias = "descripcion")]
    description: Option<String>,
    #[serde(default, alias = "nombre_equipo")]
    equipment_name: Option<String>,
    #[serde(default, alias = "tipo_alarma")]
    severity: Option<String>,
    #[serde(default, alias = "condiciones")]
    conditions: Vec<RawSub>,
    #[serde(default)]
    custom: Option<String>,
}

/// Either `{"condicion": {...}}` or the leg inline.
#[derive(Debug, Default, Deserialize)]
struct RawSub {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default, alias = "operador")]
    operator: Option<String>,
    #[serde(default, alias = "valor_esperado")]
    expected: Option<SampleValue>,
    #[serde(default, alias = "condicion")]
    condition: Option<Box<RawSub>>,
}

pub fn load_rules_from_path(path: impl AsRef<Path>) -> Result<LoadedRules, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_rules_from_str(&text)
}

pub fn load_rules_from_str(text: &str) -> Result<LoadedRules, ConfigError> {
    let doc: Value = serde_json::from_str(text)?;
    let Value::Object(map) = doc else {
        return Err(ConfigError::NotAnObject);
    };
    let loaded = parse_document(map);

    for issue in &loaded.issues {
        warn!("alarm config: {issue}");
    }
    info!(
        rules = loaded.rules.len(),
        conditions = loaded.rules.condition_count(),
        issues = loaded.issues.len(),
        "loaded alarm rule document"
    );
    Ok(loaded)
}

fn parse_document(map: Map<String, Value>) -> LoadedRules {
    let mut out = LoadedRules::default();

    for (tag, entry) in map {
        let tag = tag.trim().to_string();
        let entry: RawTagEntry = match serde_json::from_value(entry) {
            Ok(e) => e,
            Err(e) => {
                out.issues.push(ConfigIssue {
                    tag,
                    index: None,
                    problem: Problem::Malformed(e.to_string()),
                });
                continue;
            }
        };

        if !entry.equipment.is_empty() {
            out.rules.set_equipment(tag.clone(), entry.equipment.clone());
        }

        let mut current: Option<AlarmRule> = None;
        for (index, raw) in entry.conditions.into_iter().enumerate() {
            let mut report = |problem| {
                out.issues.push(ConfigIssue {
                    tag: tag.clone(),
                    index: Some(index),
                    problem,
                })
            };

            let raw: RawCondition = match serde_json::from_value(raw) {
                Ok(r) => r,
                Err(e) => {
                    report(Problem::Malformed(e.to_string()));
                    RawCondition {
                        kind: Some("malformed".into()),
                        ..Default::default()
                    }
                }
            };

            let equipment_name = raw
                .equipment_name
                .clone()
                .or_else(|| entry.equipment_name.clone())
                .unwrap_or_else(|| tag.clone());
            let description = raw
                .description
                .clone()
                .unwrap_or_else(|| format!("Condition {} for {{tag}}", index + 1));
            let severity = match raw.severity.as_deref() {
                Some(s) => Severity::parse(s).unwrap_or_else(|| {
                    report(Problem::UnknownSeverity(s.to_string()));
                    Severity::Warning
                }),
                None => {
                    report(Problem::MissingSeverity);
                    Severity::Warning
                }
            };
            let condition = parse_condition(&raw, &mut report);

            let same_rule = current.as_ref().is_some_and(|r| {
                r.equipment_name == equipment_name
                    && r.description_template == description
                    && r.severity == severity
            });
            if !same_rule {
                if let Some(done) = current.take() {
                    out.rules.push(done);
                }
                current = Some(AlarmRule::new(tag.clone(), equipment_name, description, severity));
            }
            if let Some(rule) = current.as_mut() {
                rule.conditions.push(condition);
            }
        }
        if let Some(done) = current {
            out.rules.push(done);
        }
    }

    out
}

fn parse_condition(raw: &RawCondition, report: &mut impl FnMut(Problem)) -> Condition {
    let kind = raw.kind.as_deref().map(str::trim);
    match kind {
        // An entry without a kind is an absolute threshold.
        None | Some("absoluto") | Some("absolute") => parse_absolute(raw, report),
        Some("between") => parse_between(raw, report),
        Some("relativo_a_SP") | Some("relative_to_setpoint") => {
            match raw.operator.as_deref().and_then(Direction::parse) {
                Some(direction) => Condition::RelativeToSetpoint {
                    direction,
                    delta: raw.delta.unwrap_or(0.0),
                },
                None => {
                    report(Problem::UnknownOperator(raw.operator.clone()));
                    unsupported("relative_to_setpoint")
                }
            }
        }
        Some("multiple_and") => parse_conjunction(raw, report),
        Some(k @ ("custom_eval" | "relacion_control" | "estado_logico")) => {
            report(Problem::External(k.to_string()));
            unsupported(k)
        }
        Some("malformed") => unsupported("malformed"),
        Some(other) => {
            report(Problem::UnknownKind(other.to_string()));
            unsupported(other)
        }
    }
}

fn parse_absolute(raw: &RawCondition, report: &mut impl FnMut(Problem)) -> Condition {
    if raw.operator.is_none() {
        if let Some(text) = &raw.custom {
            report(Problem::FreeText(text.clone()));
            return unsupported("custom");
        }
    }
    if raw.operator.as_deref().map(str::trim) == Some("between") {
        return parse_between(raw, report);
    }
    let Some(operator) = raw.operator.as_deref().and_then(Operator::parse) else {
        report(Problem::UnknownOperator(raw.operator.clone()));
        return unsupported("absolute");
    };
    match raw.value.as_ref().and_then(number) {
        Some(value) => Condition::Absolute { operator, value },
        None => {
            report(Problem::MissingValue);
            unsupported("absolute")
        }
    }
}

fn parse_between(raw: &RawCondition, report: &mut impl FnMut(Problem)) -> Condition {
    let range = raw.range.as_ref().or(raw.value.as_ref());
    let bounds = match range {
        Some(Value::Array(items)) if items.len() == 2 => number(&items[0]).zip(number(&items[1])),
        _ => None,
    };
    match bounds {
        Some((low, high)) if low <= high => Condition::Between { low, high },
        _ => {
            report(Problem::InvalidRange);
            unsupported("between")
        }
    }
}

fn parse_conjunction(raw: &RawCondition, report: &mut impl FnMut(Problem)) -> Condition {
    if raw.conditions.is_empty() {
        report(Problem::EmptyConjunction);
        return unsupported("multiple_and");
    }
    let mut legs = Vec::with_capacity(raw.conditions.len());
    for (i, sub) in raw.conditions.iter().enumerate() {
        let sub = sub.condition.as_deref().unwrap_or(sub);
        let leg = match (&sub.tag, sub.operator.as_deref().and_then(Operator::parse), &sub.expected) {
            (Some(tag), Some(operator), Some(expected)) => SubCondition {
                tag: tag.trim().to_string(),
                operator,
                expected: expected.clone(),
            },
            _ => {
                report(Problem::IncompleteSubCondition(i + 1));
                return unsupported("multiple_and");
            }
        };
        legs.push(leg);
    }
    Condition::MultipleAnd { conditions: legs }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn unsupported(kind: &str) -> Condition {
    Condition::Unsupported {
        kind: kind.to_string(),
    }
}
