use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scalar reading of one tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SampleValue {
    /// Numeric view of the value. Booleans count as 1/0 and text is parsed;
    /// `None` means the value cannot take part in a numeric comparison.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            SampleValue::Int(i) => Some(*i as f64),
            SampleValue::Float(f) => Some(*f),
            SampleValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SampleValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, SampleValue::Text(_))
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        SampleValue::Float(v)
    }
}

impl From<i64> for SampleValue {
    fn from(v: i64) -> Self {
        SampleValue::Int(v)
    }
}

impl From<bool> for SampleValue {
    fn from(v: bool) -> Self {
        SampleValue::Bool(v)
    }
}

impl From<&str> for SampleValue {
    fn from(v: &str) -> Self {
        SampleValue::Text(v.to_string())
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Bool(b) => write!(f, "{b}"),
            SampleValue::Int(i) => write!(f, "{i}"),
            SampleValue::Float(v) => write!(f, "{v:.2}"),
            SampleValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Sample {
    pub value: SampleValue,
    pub timestamp: DateTime<Utc>,
}

/// Last known value of every tag for one evaluation cycle.
///
/// Built by the data source once per cycle and only read afterwards.
#[derive(Clone, Debug)]
pub struct TagRegistry {
    timestamp: DateTime<Utc>,
    samples: HashMap<String, Sample>,
}

impl TagRegistry {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            samples: HashMap::new(),
        }
    }

    /// Registry where every value shares the cycle timestamp.
    pub fn from_values<I, K, V>(timestamp: DateTime<Utc>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SampleValue>,
    {
        let mut reg = Self::new(timestamp);
        for (tag, value) in values {
            reg.insert(tag, value);
        }
        reg
    }

    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<SampleValue>) {
        let sample = Sample {
            value: value.into(),
            timestamp: self.timestamp,
        };
        self.samples.insert(tag.into(), sample);
    }

    /// Insert a float reading; NaN and infinities are a dropout and leave
    /// the tag unsampled.
    pub fn insert_f64(&mut self, tag: impl Into<String>, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.insert(tag, SampleValue::Float(value));
        true
    }

    pub fn insert_sample(&mut self, tag: impl Into<String>, sample: Sample) {
        self.samples.insert(tag.into(), sample);
    }

    pub fn get(&self, tag: &str) -> Option<&Sample> {
        self.samples.get(tag)
    }

    pub fn value(&self, tag: &str) -> Option<&SampleValue> {
        self.samples.get(tag).map(|s| &s.value)
    }

    /// Numeric value of `tag`, or `default` when absent or non-numeric.
    pub fn f64_or(&self, tag: &str, default: f64) -> f64 {
        self.value(tag).and_then(SampleValue::as_f64).unwrap_or(default)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sample)> {
        self.samples.iter().map(|(k, v)| (k.as_str(), v))
    }
}
