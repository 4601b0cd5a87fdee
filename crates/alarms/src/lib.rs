//! Alarm rule evaluation for the lime slaking line.
//!
//! A [`TagRegistry`] holds one cycle of sensor values, a [`SetpointStore`]
//! the current targets, and [`evaluate_all`] turns a rule set into the
//! alerts raised this cycle.

mod condition;
mod config;
mod rule;
mod setpoint;
mod value;

pub use condition::{evaluate, evaluate_multi, Condition, Direction, Operator, Skip, SubCondition, Verdict};
pub use config::{load_rules_from_path, load_rules_from_str, ConfigError, ConfigIssue, LoadedRules, Problem};
pub use rule::{evaluate_all, AlarmRule, AlertRecord, Diagnostics, Evaluation, RuleSet, Severity};
pub use setpoint::{Setpoint, SetpointStore};
pub use value::{Sample, SampleValue, TagRegistry};
