use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{is_zero, NOISE_FLOOR};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorConfig {
    pub noise_floor: f64,
    /// Temperature rise (°C) that completes a curve.
    pub rise_c: f64,
    /// Longest duration (s) still classified as ALTA.
    pub alta_max_s: i64,
    /// Longest duration (s) still classified as MEDIANA.
    pub mediana_max_s: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            noise_floor: NOISE_FLOOR,
            rise_c: 40.0,
            alta_max_s: 180,
            mediana_max_s: 360,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReactivityCategory {
    Alta,
    Mediana,
    Baja,
}

impl ReactivityCategory {
    /// Category from the time taken to reach the rise, and nothing else.
    pub fn from_duration(duration_s: i64, cfg: &DetectorConfig) -> Self {
        if duration_s <= cfg.alta_max_s {
            ReactivityCategory::Alta
        } else if duration_s <= cfg.mediana_max_s {
            ReactivityCategory::Mediana
        } else {
            ReactivityCategory::Baja
        }
    }
}

impl fmt::Display for ReactivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReactivityCategory::Alta => "ALTA",
            ReactivityCategory::Mediana => "MEDIANA",
            ReactivityCategory::Baja => "BAJA",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
}

/// A completed slaking temperature rise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReactivityCurve {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_temp: f64,
    pub end_temp: f64,
    pub category: ReactivityCategory,
    /// Whole seconds from start to end, truncated.
    pub duration_seconds: i64,
    pub trace: Vec<TracePoint>,
}

impl ReactivityCurve {
    pub fn minutes(&self) -> i64 {
        self.duration_seconds / 60
    }

    pub fn seconds(&self) -> i64 {
        self.duration_seconds % 60
    }

    pub fn rise(&self) -> f64 {
        self.end_temp - self.start_temp
    }
}

#[derive(Clone, Debug)]
struct InProgress {
    start_time: DateTime<Utc>,
    start_temp: f64,
    trace: Vec<TracePoint>,
}

#[derive(Clone, Debug)]
enum State {
    Idle,
    Accumulating(InProgress),
}

/// Watches one slaker for reactivity curves.
///
/// A curve starts on the feeder's off→on edge and completes when the
/// temperature has risen `rise_c` above its starting value. Turning the
/// feeder off mid-curve does not abort it. One detector per slaker; calls
/// must be serialized.
#[derive(Clone, Debug)]
pub struct ReactivityDetector {
    cfg: DetectorConfig,
    state: State,
    prev_actuator: f64,
    history: Vec<ReactivityCurve>,
}

impl Default for ReactivityDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl ReactivityDetector {
    pub fn new(cfg: DetectorConfig) -> Self {
        Self {
            cfg,
            state: State::Idle,
            prev_actuator: 0.0,
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Drop any in-progress curve and forget the previous actuator value.
    /// Completed curves are kept.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.prev_actuator = 0.0;
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, State::Accumulating(_))
    }

    /// Start time, start temperature and trace length of the curve in progress.
    pub fn in_progress(&self) -> Option<(DateTime<Utc>, f64, usize)> {
        match &self.state {
            State::Accumulating(p) => Some((p.start_time, p.start_temp, p.trace.len())),
            State::Idle => None,
        }
    }

    /// Every curve completed so far, oldest first.
    pub fn history(&self) -> &[ReactivityCurve] {
        &self.history
    }

    /// Feed one cycle. Returns the curve completed by this sample, if any.
    ///
    /// A sample with a non-finite temperature is ignored altogether: it
    /// neither moves the actuator edge nor joins the trace, so a start on
    /// that cycle is taken up by the next valid sample.
    pub fn step(&mut self, timestamp: DateTime<Utc>, temperature: f64, actuator: f64) -> Option<ReactivityCurve> {
        if !temperature.is_finite() {
            debug!(%timestamp, "non-finite temperature ignored");
            return None;
        }
        let floor = self.cfg.noise_floor;
        let edge = is_zero(self.prev_actuator, floor) && !is_zero(actuator, floor);
        self.prev_actuator = actuator;

        if edge && !self.is_accumulating() {
            info!(%timestamp, start_temp = temperature, "reactivity curve started");
            self.state = State::Accumulating(InProgress {
                start_time: timestamp,
                start_temp: temperature,
                trace: Vec::new(),
            });
        }

        let State::Accumulating(progress) = &mut self.state else {
            return None;
        };
        progress.trace.push(TracePoint { timestamp, temperature });

        let rise = temperature - progress.start_temp;
        if rise < self.cfg.rise_c {
            debug!(rise, samples = progress.trace.len(), "reactivity curve accumulating");
            return None;
        }

        let State::Accumulating(done) = std::mem::replace(&mut self.state, State::Idle) else {
            return None;
        };
        let duration_seconds = (timestamp - done.start_time).num_seconds();
        let curve = ReactivityCurve {
            start_time: done.start_time,
            end_time: timestamp,
            start_temp: done.start_temp,
            end_temp: temperature,
            category: ReactivityCategory::from_duration(duration_seconds, &self.cfg),
            duration_seconds,
            trace: done.trace,
        };
        info!(
            category = %curve.category,
            minutes = curve.minutes(),
            seconds = curve.seconds(),
            start_temp = curve.start_temp,
            end_temp = curve.end_temp,
            "reactivity curve completed"
        );
        self.history.push(curve.clone());
        Some(curve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn at(s: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(s)
    }

    #[test]
    fn starts_on_edge_not_level() {
        let mut d = ReactivityDetector::default();
        let actuator = [0.0, 0.0, 5.0, 5.0];
        let mut started_at = None;
        for (i, a) in actuator.iter().enumerate() {
            d.step(at(i as i64), 25.0, *a);
            if started_at.is_none() && d.is_accumulating() {
                started_at = Some(i);
            }
        }
        assert_eq!(started_at, Some(2));
        assert_eq!(d.in_progress(), Some((at(2), 25.0, 2)));
    }

    #[test]
    fn stays_idle_without_edge() {
        let mut d = ReactivityDetector::default();
        for i in 0..50 {
            assert!(d.step(at(i), 25.0 + i as f64 * 2.0, 0.05).is_none());
        }
        assert!(!d.is_accumulating());
        assert!(d.history().is_empty());
    }

    fn run_to(duration_s: i64) -> ReactivityCurve {
        let mut d = ReactivityDetector::default();
        assert!(d.step(at(0), 25.0, 1.0).is_none());
        assert!(d.step(at(duration_s / 2), 45.0, 1.0).is_none());
        d.step(at(duration_s), 65.0, 1.0).expect("curve should complete")
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(run_to(180).category, ReactivityCategory::Alta);
        assert_eq!(run_to(181).category, ReactivityCategory::Mediana);
        assert_eq!(run_to(360).category, ReactivityCategory::Mediana);
        assert_eq!(run_to(361).category, ReactivityCategory::Baja);
    }

    #[test]
    fn completed_curve_contents() {
        let c = run_to(181);
        assert_eq!(c.duration_seconds, 181);
        assert_eq!((c.minutes(), c.seconds()), (3, 1));
        assert_eq!(c.start_temp, 25.0);
        assert_eq!(c.end_temp, 65.0);
        assert!(c.rise() >= 40.0);
        let temps: Vec<f64> = c.trace.iter().map(|p| p.temperature).collect();
        assert_eq!(temps, vec![25.0, 45.0, 65.0]);
        assert_eq!(c.trace.first().unwrap().timestamp, c.start_time);
        assert_eq!(c.trace.last().unwrap().timestamp, c.end_time);
    }

    #[test]
    fn second_edge_does_not_restart() {
        let mut d = ReactivityDetector::default();
        d.step(at(0), 25.0, 6.0);
        d.step(at(1), 30.0, 0.0);
        d.step(at(2), 35.0, 6.0);
        assert_eq!(d.in_progress(), Some((at(0), 25.0, 3)));

        let c = d.step(at(3), 65.0, 6.0).unwrap();
        assert_eq!(c.start_temp, 25.0);
        assert_eq!(c.start_time, at(0));
        assert_eq!(c.trace.len(), 4);
    }

    #[test]
    fn actuator_off_does_not_abort() {
        let mut d = ReactivityDetector::default();
        d.step(at(0), 25.0, 6.0);
        for i in 1..10 {
            assert!(d.step(at(i), 30.0, 0.0).is_none());
        }
        assert!(d.is_accumulating());
        let c = d.step(at(400), 66.0, 0.0).unwrap();
        assert_eq!(c.category, ReactivityCategory::Baja);
    }

    #[test]
    fn returns_to_idle_and_detects_again() {
        let mut d = ReactivityDetector::default();
        d.step(at(0), 25.0, 1.0);
        assert!(d.step(at(60), 70.0, 1.0).is_some());
        assert!(!d.is_accumulating());
        assert_eq!(d.in_progress(), None);

        // still on: no new edge
        d.step(at(61), 20.0, 1.0);
        assert!(!d.is_accumulating());

        d.step(at(62), 20.0, 0.0);
        d.step(at(63), 20.0, 1.0);
        assert!(d.is_accumulating());
        assert!(d.step(at(500), 61.0, 1.0).is_some());
        assert_eq!(d.history().len(), 2);
        assert_eq!(d.history()[1].category, ReactivityCategory::Baja);
    }

    #[test]
    fn nan_temperature_is_skipped() {
        let mut d = ReactivityDetector::default();
        d.step(at(0), 25.0, 1.0);
        assert!(d.step(at(1), f64::NAN, 1.0).is_none());
        assert_eq!(d.in_progress(), Some((at(0), 25.0, 1)));
        let c = d.step(at(2), 65.0, 1.0).unwrap();
        assert_eq!(c.trace.len(), 2);
    }

    #[test]
    fn nan_temperature_on_edge_defers_start() {
        let mut d = ReactivityDetector::default();
        d.step(at(0), 25.0, 0.0);
        d.step(at(1), f64::NAN, 6.0);
        assert!(!d.is_accumulating());

        d.step(at(2), 26.0, 6.0);
        assert_eq!(d.in_progress(), Some((at(2), 26.0, 1)));
        let c = d.step(at(3), 66.0, 6.0).unwrap();
        assert_eq!(c.start_temp, 26.0);
    }

    #[test]
    fn nan_actuator_glitch_is_not_an_edge() {
        let mut d = ReactivityDetector::default();
        d.step(at(0), 25.0, 6.0);
        assert!(d.step(at(1), 70.0, 6.0).is_some());

        d.step(at(2), 30.0, f64::NAN);
        d.step(at(3), 30.0, 6.0);
        assert!(!d.is_accumulating());
        assert_eq!(d.history().len(), 1);
    }

    #[test]
    fn reset_keeps_history() {
        let mut d = ReactivityDetector::default();
        d.step(at(0), 25.0, 1.0);
        d.step(at(10), 70.0, 1.0);
        d.step(at(11), 25.0, 0.0);
        d.step(at(12), 25.0, 1.0);
        assert!(d.is_accumulating());
        d.reset();
        assert!(!d.is_accumulating());
        assert_eq!(d.history().len(), 1);
    }

    #[test]
    fn custom_thresholds() {
        let cfg = DetectorConfig {
            rise_c: 10.0,
            alta_max_s: 10,
            mediana_max_s: 20,
            ..DetectorConfig::default()
        };
        let mut d = ReactivityDetector::new(cfg);
        d.step(at(0), 25.0, 1.0);
        let c = d.step(at(15), 35.0, 1.0).unwrap();
        assert_eq!(c.category, ReactivityCategory::Mediana);
    }

    #[test]
    fn curve_serializes_for_charting() {
        let c = run_to(100);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["category"], "ALTA");
        assert_eq!(json["duration_seconds"], 100);
        assert_eq!(json["trace"].as_array().unwrap().len(), 3);
    }
}
