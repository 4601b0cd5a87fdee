//! Single-condition evaluation.
//!
//! Conditions fail closed: an absent sample, an absent setpoint, a value of
//! the wrong type or a condition the loader could not understand never raise
//! an alarm. Those cases come back as [`Verdict::Skipped`] so the caller can
//! count them.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::setpoint::SetpointStore;
use crate::value::{SampleValue, TagRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "<" => Some(Operator::Lt),
            ">" => Some(Operator::Gt),
            "<=" => Some(Operator::Le),
            ">=" => Some(Operator::Ge),
            "==" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
        }
    }

    /// `lhs <op> rhs` with plain IEEE semantics. Equality is exact.
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Gt => lhs > rhs,
            Operator::Le => lhs <= rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
        }
    }

    fn apply_ordering(self, ord: Ordering) -> bool {
        match self {
            Operator::Lt => ord == Ordering::Less,
            Operator::Gt => ord == Ordering::Greater,
            Operator::Le => ord != Ordering::Greater,
            Operator::Ge => ord != Ordering::Less,
            Operator::Eq => ord == Ordering::Equal,
            Operator::Ne => ord != Ordering::Equal,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Side of the setpoint a relative condition guards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// `+`: alarm when the sample exceeds setpoint + delta.
    #[serde(rename = "+")]
    Above,
    /// `-`: alarm when the sample falls below setpoint - delta.
    #[serde(rename = "-")]
    Below,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "+" => Some(Direction::Above),
            "-" => Some(Direction::Below),
            _ => None,
        }
    }
}

/// One leg of a [`Condition::MultipleAnd`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubCondition {
    pub tag: String,
    pub operator: Operator,
    pub expected: SampleValue,
}

impl SubCondition {
    pub fn new(tag: impl Into<String>, operator: Operator, expected: impl Into<SampleValue>) -> Self {
        Self {
            tag: tag.into(),
            operator,
            expected: expected.into(),
        }
    }

    fn check(&self, samples: &TagRegistry) -> Verdict {
        let Some(actual) = samples.value(&self.tag) else {
            return Verdict::Skipped(Skip::MissingSample {
                tag: self.tag.clone(),
            });
        };

        if let Some(expected) = self.expected.as_text() {
            return match actual.as_text() {
                Some(actual) => Verdict::from_bool(self.operator.apply_ordering(actual.cmp(expected))),
                None => match self.operator {
                    Operator::Eq => Verdict::Clear,
                    Operator::Ne => Verdict::Alarm,
                    _ => Verdict::Skipped(Skip::TypeMismatch {
                        tag: self.tag.clone(),
                    }),
                },
            };
        }

        match (actual.as_f64(), self.expected.as_f64()) {
            (Some(a), Some(e)) => Verdict::from_bool(self.operator.apply(a, e)),
            _ => Verdict::Skipped(Skip::TypeMismatch {
                tag: self.tag.clone(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Absolute { operator: Operator, value: f64 },
    /// Inclusive on both ends.
    Between { low: f64, high: f64 },
    RelativeToSetpoint { direction: Direction, delta: f64 },
    MultipleAnd { conditions: Vec<SubCondition> },
    /// A shape the loader could not turn into one of the variants above.
    Unsupported { kind: String },
}

impl Condition {
    pub fn kind(&self) -> &str {
        match self {
            Condition::Absolute { .. } => "absolute",
            Condition::Between { .. } => "between",
            Condition::RelativeToSetpoint { .. } => "relative_to_setpoint",
            Condition::MultipleAnd { .. } => "multiple_and",
            Condition::Unsupported { kind } => kind.as_str(),
        }
    }

    pub fn is_multi_tag(&self) -> bool {
        matches!(self, Condition::MultipleAnd { .. })
    }

    /// Evaluate a single-tag condition against the current value of `tag`.
    ///
    /// Conjunctions need the whole registry; use [`Condition::check_multi`].
    pub fn check(&self, tag: &str, value: Option<&SampleValue>, setpoints: &SetpointStore) -> Verdict {
        Verdict::from_result(self.try_check(tag, value, setpoints))
    }

    fn try_check(&self, tag: &str, value: Option<&SampleValue>, setpoints: &SetpointStore) -> Result<bool, Skip> {
        match self {
            Condition::Absolute { operator, value: rhs } => Ok(operator.apply(numeric(tag, value)?, *rhs)),
            Condition::Between { low, high } => {
                let v = numeric(tag, value)?;
                Ok(*low <= v && v <= *high)
            }
            Condition::RelativeToSetpoint { direction, delta } => {
                let v = numeric(tag, value)?;
                let sp = setpoints
                    .value(tag)
                    .ok_or_else(|| Skip::MissingSetpoint { tag: tag.to_string() })?;
                Ok(match direction {
                    Direction::Above => v > sp + delta,
                    Direction::Below => v < sp - delta,
                })
            }
            Condition::MultipleAnd { .. } => Err(Skip::Unsupported {
                kind: self.kind().to_string(),
            }),
            Condition::Unsupported { kind } => Err(Skip::Unsupported { kind: kind.clone() }),
        }
    }

    /// Evaluate a conjunction across other tags of the same cycle.
    ///
    /// Stops at the first leg that does not hold; its reason is returned
    /// when it was skipped. An empty conjunction never alarms.
    pub fn check_multi(&self, samples: &TagRegistry) -> Verdict {
        let conditions = match self {
            Condition::MultipleAnd { conditions } => conditions,
            Condition::Unsupported { kind } => {
                return Verdict::Skipped(Skip::Unsupported { kind: kind.clone() })
            }
            other => {
                return Verdict::Skipped(Skip::Unsupported {
                    kind: other.kind().to_string(),
                })
            }
        };
        if conditions.is_empty() {
            return Verdict::Clear;
        }
        for sub in conditions {
            match sub.check(samples) {
                Verdict::Alarm => continue,
                other => return other,
            }
        }
        Verdict::Alarm
    }

    /// Evaluate any variant for a rule whose primary tag is `tag`.
    pub fn check_in(&self, tag: &str, samples: &TagRegistry, setpoints: &SetpointStore) -> Verdict {
        if self.is_multi_tag() {
            self.check_multi(samples)
        } else {
            self.check(tag, samples.value(tag), setpoints)
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Absolute { operator, value } => write!(f, "{operator} {value}"),
            Condition::Between { low, high } => write!(f, "between {low} and {high}"),
            Condition::RelativeToSetpoint { direction, delta } => match direction {
                Direction::Above => write!(f, "> SP + {delta}"),
                Direction::Below => write!(f, "< SP - {delta}"),
            },
            Condition::MultipleAnd { conditions } => {
                let parts: Vec<String> = conditions
                    .iter()
                    .map(|c| format!("{} {} {}", c.tag, c.operator, c.expected))
                    .collect();
                write!(f, "{}", parts.join(" AND "))
            }
            Condition::Unsupported { kind } => write!(f, "unsupported({kind})"),
        }
    }
}

fn numeric(tag: &str, value: Option<&SampleValue>) -> Result<f64, Skip> {
    let value = value.ok_or_else(|| Skip::MissingSample { tag: tag.to_string() })?;
    value
        .as_f64()
        .ok_or_else(|| Skip::TypeMismatch { tag: tag.to_string() })
}

/// Outcome of evaluating one condition.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Alarm,
    Clear,
    Skipped(Skip),
}

impl Verdict {
    fn from_result(r: Result<bool, Skip>) -> Self {
        match r {
            Ok(b) => Verdict::from_bool(b),
            Err(skip) => Verdict::Skipped(skip),
        }
    }

    fn from_bool(b: bool) -> Self {
        if b {
            Verdict::Alarm
        } else {
            Verdict::Clear
        }
    }

    pub fn is_alarm(&self) -> bool {
        matches!(self, Verdict::Alarm)
    }

    pub fn skip(&self) -> Option<&Skip> {
        match self {
            Verdict::Skipped(s) => Some(s),
            _ => None,
        }
    }
}

/// Why a condition could not be evaluated this cycle.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Skip {
    #[error("no sample for tag {tag}")]
    MissingSample { tag: String },
    #[error("no setpoint registered for tag {tag}")]
    MissingSetpoint { tag: String },
    #[error("non-numeric value for tag {tag}")]
    TypeMismatch { tag: String },
    #[error("unsupported condition kind `{kind}`")]
    Unsupported { kind: String },
}

impl Skip {
    /// True when the skip points at the configuration rather than the data.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Skip::MissingSetpoint { .. } | Skip::Unsupported { .. })
    }
}

/// `true` iff `condition` raises an alarm for the current value of its tag.
pub fn evaluate(condition: &Condition, tag: &str, value: Option<&SampleValue>, setpoints: &SetpointStore) -> bool {
    condition.check(tag, value, setpoints).is_alarm()
}

/// `true` iff every leg of a [`Condition::MultipleAnd`] holds.
pub fn evaluate_multi(condition: &Condition, samples: &TagRegistry) -> bool {
    condition.check_multi(samples).is_alarm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setpoint::Setpoint;
    use chrono::Utc;

    fn abs(op: Operator, value: f64) -> Condition {
        Condition::Absolute { operator: op, value }
    }

    fn check(c: &Condition, v: f64) -> bool {
        evaluate(c, "T", Some(&SampleValue::Float(v)), &SetpointStore::new())
    }

    fn setpoints(value: f64) -> SetpointStore {
        let mut sp = SetpointStore::new();
        sp.set("T", Setpoint::new(value, "°C"));
        sp
    }

    #[test]
    fn absolute_operators() {
        assert!(check(&abs(Operator::Gt, 80.0), 81.0));
        assert!(!check(&abs(Operator::Gt, 80.0), 80.0));
        assert!(check(&abs(Operator::Ge, 80.0), 80.0));
        assert!(check(&abs(Operator::Lt, 5.0), 4.9));
        assert!(check(&abs(Operator::Le, 5.0), 5.0));
        assert!(check(&abs(Operator::Eq, 70.0), 70.0));
        assert!(!check(&abs(Operator::Eq, 70.0), 70.000001));
        assert!(check(&abs(Operator::Ne, 0.0), 1.0));
    }

    #[test]
    fn between_is_inclusive() {
        let c = Condition::Between { low: 40.0, high: 60.0 };
        assert!(check(&c, 40.0));
        assert!(check(&c, 60.0));
        assert!(!check(&c, 39.99));
        assert!(!check(&c, 60.01));
    }

    #[test]
    fn relative_to_setpoint() {
        let sp = setpoints(70.0);
        let above = Condition::RelativeToSetpoint {
            direction: Direction::Above,
            delta: 10.0,
        };
        let below = Condition::RelativeToSetpoint {
            direction: Direction::Below,
            delta: 10.0,
        };
        let eval = |c: &Condition, v: f64| evaluate(c, "T", Some(&SampleValue::Float(v)), &sp);
        assert!(eval(&above, 81.0));
        assert!(!eval(&above, 80.0));
        assert!(eval(&below, 59.0));
        assert!(!eval(&below, 60.0));
    }

    #[test]
    fn missing_setpoint_is_observable() {
        let c = Condition::RelativeToSetpoint {
            direction: Direction::Above,
            delta: 10.0,
        };
        let verdict = c.check("T", Some(&SampleValue::Float(500.0)), &SetpointStore::new());
        assert_eq!(verdict, Verdict::Skipped(Skip::MissingSetpoint { tag: "T".into() }));
        assert!(verdict.skip().unwrap().is_config_error());
    }

    #[test]
    fn missing_sample_fails_closed() {
        let c = abs(Operator::Lt, 1000.0);
        let verdict = c.check("T", None, &SetpointStore::new());
        assert_eq!(verdict, Verdict::Skipped(Skip::MissingSample { tag: "T".into() }));
        assert!(!verdict.skip().unwrap().is_config_error());
    }

    #[test]
    fn non_numeric_value_is_skipped() {
        let c = abs(Operator::Gt, 0.0);
        let v = SampleValue::from("RUNNING");
        assert!(matches!(
            c.check("T", Some(&v), &SetpointStore::new()),
            Verdict::Skipped(Skip::TypeMismatch { .. })
        ));
    }

    #[test]
    fn unsupported_never_alarms() {
        let c = Condition::Unsupported { kind: "custom".into() };
        let verdict = c.check("T", Some(&SampleValue::Float(1.0)), &SetpointStore::new());
        assert!(verdict.skip().unwrap().is_config_error());
        assert!(!verdict.is_alarm());
    }

    fn registry() -> TagRegistry {
        TagRegistry::from_values(
            Utc::now(),
            [
                ("SCREW", SampleValue::Int(1)),
                ("ROTARY", SampleValue::Bool(false)),
                ("GATE", SampleValue::from("OPEN")),
                ("LEVEL", SampleValue::Float(55.0)),
            ],
        )
    }

    #[test]
    fn multiple_and_requires_every_leg() {
        let legs = vec![
            SubCondition::new("SCREW", Operator::Eq, 1i64),
            SubCondition::new("ROTARY", Operator::Eq, 0i64),
            SubCondition::new("GATE", Operator::Eq, "OPEN"),
            SubCondition::new("LEVEL", Operator::Gt, 40.0),
        ];
        let samples = registry();
        assert!(evaluate_multi(&Condition::MultipleAnd { conditions: legs.clone() }, &samples));

        for i in 0..legs.len() {
            let mut broken = legs.clone();
            broken[i].operator = match broken[i].operator {
                Operator::Eq => Operator::Ne,
                Operator::Ne => Operator::Eq,
                Operator::Gt => Operator::Le,
                Operator::Le => Operator::Gt,
                Operator::Lt => Operator::Ge,
                Operator::Ge => Operator::Lt,
            };
            let c = Condition::MultipleAnd { conditions: broken };
            assert!(!evaluate_multi(&c, &samples), "leg {i} negated should clear");
        }
    }

    #[test]
    fn multiple_and_with_absent_tag() {
        let c = Condition::MultipleAnd {
            conditions: vec![
                SubCondition::new("SCREW", Operator::Eq, 1i64),
                SubCondition::new("FAN", Operator::Eq, 1i64),
            ],
        };
        assert_eq!(
            c.check_multi(&registry()),
            Verdict::Skipped(Skip::MissingSample { tag: "FAN".into() })
        );
    }

    #[test]
    fn multiple_and_text_against_number() {
        let samples = registry();
        let eq = Condition::MultipleAnd {
            conditions: vec![SubCondition::new("LEVEL", Operator::Eq, "OPEN")],
        };
        let ne = Condition::MultipleAnd {
            conditions: vec![SubCondition::new("LEVEL", Operator::Ne, "OPEN")],
        };
        let gt = Condition::MultipleAnd {
            conditions: vec![SubCondition::new("LEVEL", Operator::Gt, "OPEN")],
        };
        assert!(!evaluate_multi(&eq, &samples));
        assert!(evaluate_multi(&ne, &samples));
        assert!(matches!(
            gt.check_multi(&samples),
            Verdict::Skipped(Skip::TypeMismatch { .. })
        ));
    }

    #[test]
    fn empty_conjunction_is_clear() {
        let c = Condition::MultipleAnd { conditions: vec![] };
        assert_eq!(c.check_multi(&registry()), Verdict::Clear);
    }
}
