//! Step simulator of a lime slaking line: silo, screw feeder, slaker,
//! separating chambers and slurry distribution.
//!
//! Each [`PlantSimulator::tick`] returns one [`Reading`] of every tag in
//! [`tags::ALL`].

mod sensor;
pub mod tags;

use chrono::{DateTime, Duration, Utc};

pub use sensor::{Sensor, SensorFault};

/// Quality of the quicklime being slaked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReactivityGrade {
    Alta,
    Media,
    Baja,
}

impl ReactivityGrade {
    /// Thermal time constant (s) of the slaking rise.
    pub fn tau_s(self) -> f64 {
        match self {
            ReactivityGrade::Alta => 65.0,
            ReactivityGrade::Media => 135.0,
            ReactivityGrade::Baja => 300.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimMode {
    Producing,
    Reactivity(ReactivityGrade),
    Washing,
    Idle,
}

impl SimMode {
    fn feeder_on(self) -> bool {
        matches!(self, SimMode::Producing | SimMode::Reactivity(_))
    }

    fn water_on(self) -> bool {
        !matches!(self, SimMode::Idle)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PlantParams {
    pub ambient_c: f64,
    /// Steady slaker temperature in normal production.
    pub production_temp_c: f64,
    pub production_tau_s: f64,
    /// Asymptotic rise above ambient during a reactivity test.
    pub reactivity_rise_c: f64,
    pub max_temp_c: f64,
    pub cooling_c_per_s: f64,
    pub feed_min: f64,
    pub feed_max: f64,
    /// Water to lime mass ratio.
    pub water_ratio: f64,
    pub washing_flow: f64,
    pub silo_use_per_s: f64,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            ambient_c: 25.0,
            production_temp_c: 80.0,
            production_tau_s: 18.0,
            reactivity_rise_c: 45.0,
            max_temp_c: 90.0,
            cooling_c_per_s: 0.5,
            feed_min: 5.0,
            feed_max: 15.0,
            water_ratio: 4.0,
            washing_flow: 12.0,
            silo_use_per_s: 0.08,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PlantState {
    pub slaker_temp_c: f64,
    /// 0..=100 %
    pub silo_level: f64,
    /// 10..=80 %
    pub chamber_level: f64,
}

impl Default for PlantState {
    fn default() -> Self {
        Self {
            slaker_temp_c: 25.0,
            silo_level: 70.0,
            chamber_level: 45.0,
        }
    }
}

impl PlantState {
    /// Explicit Euler step. With feed and water the slaker relaxes toward
    /// `target_c` with time constant `tau_s`; otherwise it cools linearly to
    /// ambient.
    pub fn step(&mut self, p: &PlantParams, mode: SimMode, dt_s: f64) {
        let slaking = mode.feeder_on() && mode.water_on();

        if slaking {
            let (target_c, tau_s) = match mode {
                SimMode::Reactivity(grade) => (p.ambient_c + p.reactivity_rise_c, grade.tau_s()),
                _ => (p.production_temp_c, p.production_tau_s),
            };
            self.slaker_temp_c += (target_c - self.slaker_temp_c) * dt_s / tau_s;
            self.slaker_temp_c = self.slaker_temp_c.clamp(p.ambient_c, p.max_temp_c);
        } else {
            self.slaker_temp_c = (self.slaker_temp_c - p.cooling_c_per_s * dt_s).max(p.ambient_c);
        }

        if mode.feeder_on() {
            self.silo_level -= p.silo_use_per_s * dt_s;
        }
        self.silo_level = self.silo_level.clamp(0.0, 100.0);

        let fill = if slaking { 0.02 } else { -0.02 };
        self.chamber_level += fill * dt_s;
        self.chamber_level = self.chamber_level.clamp(10.0, 80.0);

        if self.slaker_temp_c.is_nan() {
            self.slaker_temp_c = p.ambient_c;
        }
    }
}

/// One tick worth of tag values.
#[derive(Clone, Debug)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<(&'static str, f64)>,
}

impl Reading {
    pub fn get(&self, tag: &str) -> Option<f64> {
        self.values.iter().find(|(t, _)| *t == tag).map(|(_, v)| *v)
    }
}

#[derive(Clone, Debug)]
pub struct PlantSimulator {
    pub params: PlantParams,
    pub state: PlantState,
    pub temp_sensor: Sensor,
    mode: SimMode,
    start: DateTime<Utc>,
    dt_s: f64,
    step: u64,
}

impl PlantSimulator {
    pub fn new(start: DateTime<Utc>, dt_s: f64, seed: u64) -> Self {
        Self {
            params: PlantParams::default(),
            state: PlantState::default(),
            temp_sensor: Sensor::new(seed),
            mode: SimMode::Producing,
            start,
            dt_s,
            step: 0,
        }
    }

    pub fn mode(&self) -> SimMode {
        self.mode
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn set_mode(&mut self, mode: SimMode) {
        if matches!(mode, SimMode::Reactivity(_)) && mode != self.mode {
            // fresh charge: the test starts from ambient
            self.state.slaker_temp_c = self.params.ambient_c;
        }
        self.mode = mode;
    }

    /// Read every tag at the current instant, then advance one step.
    pub fn tick(&mut self) -> Reading {
        let k = self.step as f64;
        let p = self.params;
        let feeder = self.mode.feeder_on();
        let water = self.mode.water_on();
        let timestamp = self.start + Duration::milliseconds((k * self.dt_s * 1000.0).round() as i64);

        let feed = if feeder {
            let swing = 0.5 + 0.1 * (k * 0.3).sin() + 0.05 * (k * 0.7).cos();
            (p.feed_min + (p.feed_max - p.feed_min) * swing).clamp(p.feed_min, p.feed_max)
        } else {
            0.0
        };
        let water_flow = match (feeder, water) {
            (true, true) => (feed * p.water_ratio).clamp(20.0, 60.0),
            (false, true) => p.washing_flow,
            _ => 0.0,
        };

        let s = &self.state;
        let vent_dp = (0.5 + 0.008 * s.silo_level + if feeder { 0.15 } else { 0.0 }).clamp(0.2, 1.2);
        let slaking = feeder && water;
        let agitator = slaking || s.chamber_level > 20.0;

        let (density, ph, oil_pressure) = if feed > 0.0 && water_flow > 0.0 {
            let density = density_from_ratio(water_flow / feed);
            let ph = (12.2 + 0.15 * (density - 1.18)).clamp(11.8, 12.6);
            let oil = (65.0 + 2.0 * (k * 0.1).sin()).clamp(60.0, 75.0);
            (density, ph, oil)
        } else {
            (1.0, 7.5, 45.0)
        };

        let values = vec![
            (tags::SILO_LEVEL, round4(s.silo_level)),
            (tags::SILO_LEVEL_HIGH_HIGH, flag(s.silo_level > 95.0)),
            (tags::SILO_LEVEL_LOW_LOW, flag(s.silo_level < 5.0)),
            (tags::SILO_VENT_DP, round4(vent_dp)),
            (tags::LIME_FEED_WEIGHT, round4(feed)),
            (tags::SCREW_FEEDER, flag(feeder)),
            (tags::ROTARY_VALVE, flag(feeder)),
            (tags::WATER_FLOW, round4(water_flow)),
            (tags::SLAKER_TEMP, round4(self.temp_sensor.read(s.slaker_temp_c))),
            (tags::SLAKER_MOTOR, flag(slaking)),
            (tags::CHAMBER_LEVEL, round4(s.chamber_level)),
            (tags::CHAMBER_AGITATOR, flag(agitator)),
            (tags::SLURRY_DENSITY, round4(density)),
            (tags::SLURRY_PH, round4(ph)),
            (tags::OIL_PRESSURE, round4(oil_pressure)),
        ];

        self.state.step(&p, self.mode, self.dt_s);
        self.step += 1;

        Reading { timestamp, values }
    }
}

fn density_from_ratio(ratio: f64) -> f64 {
    const TARGET: f64 = 1.20;
    if ratio > 5.0 {
        (TARGET - 0.05).max(1.15)
    } else if ratio < 3.0 {
        (TARGET + 0.05).min(1.25)
    } else {
        (TARGET + (3.5 - ratio) * 0.02).clamp(1.15, 1.25)
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
