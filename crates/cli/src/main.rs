use std::path::PathBuf;

use alarms::{load_rules_from_path, AlertRecord, Diagnostics, SetpointStore, TagRegistry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use reactivity::{classify_mode, OperatingMode, ReactivityCurve, ReactivityDetector};
use sim::{tags, PlantSimulator, ReactivityGrade, SensorFault, SimMode};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    Normal,
    ReactivityAlta,
    ReactivityMedia,
    ReactivityBaja,
    Washing,
    Idle,
}

impl Scenario {
    fn mode(self) -> SimMode {
        match self {
            Scenario::Normal => SimMode::Producing,
            Scenario::ReactivityAlta => SimMode::Reactivity(ReactivityGrade::Alta),
            Scenario::ReactivityMedia => SimMode::Reactivity(ReactivityGrade::Media),
            Scenario::ReactivityBaja => SimMode::Reactivity(ReactivityGrade::Baja),
            Scenario::Washing => SimMode::Washing,
            Scenario::Idle => SimMode::Idle,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "lime-slaker-monitor",
    version,
    about = "Alarm evaluation and reactivity curve detection for a lime slaking line"
)]
struct Args {
    /// Alarm rule document (JSON)
    #[arg(long, default_value = "config/alarm_config.json")]
    config: PathBuf,

    /// Setpoint file (JSON object of tag -> {value, unit})
    #[arg(long)]
    setpoints: Option<PathBuf>,

    #[arg(value_enum, long, default_value = "normal")]
    scenario: Scenario,

    /// Total simulated time in seconds, warmup included
    #[arg(long, default_value_t = 600.0)]
    seconds: f64,

    /// Polling period in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    dt_ms: u64,

    /// Seconds with the feeder off before the scenario starts
    #[arg(long, default_value_t = 5.0)]
    warmup_s: f64,

    /// RNG seed for deterministic runs
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Drop every Nth slaker temperature reading
    #[arg(long)]
    dropout_every: Option<u64>,
}

#[derive(serde::Serialize)]
struct StatusRow<'a> {
    timestamp: DateTime<Utc>,
    mode: OperatingMode,
    alerts: &'a [AlertRecord],
    new_curves: Vec<ReactivityCurve>,
    sensor_data: serde_json::Map<String, serde_json::Value>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let loaded = load_rules_from_path(&args.config)
        .with_context(|| format!("loading alarm rules from {}", args.config.display()))?;
    let rules = loaded.rules;

    let setpoints = match &args.setpoints {
        Some(path) => SetpointStore::from_path(path)
            .with_context(|| format!("loading setpoints from {}", path.display()))?,
        None => SetpointStore::new(),
    };
    info!(rules = rules.len(), setpoints = setpoints.len(), scenario = ?args.scenario, "monitor starting");

    let dt_s = (args.dt_ms as f64) / 1000.0;
    let steps = (args.seconds / dt_s).ceil() as u64;
    let warmup_steps = (args.warmup_s / dt_s).ceil() as u64;

    let mut plant = PlantSimulator::new(Utc::now(), dt_s, args.seed);
    plant.temp_sensor.noise_std = 0.15;
    if let Some(n) = args.dropout_every {
        plant.temp_sensor.fault = SensorFault::DropoutEvery { n };
    }
    plant.set_mode(if warmup_steps > 0 { SimMode::Idle } else { args.scenario.mode() });

    let mut detector = ReactivityDetector::default();
    // counters accumulate; gaps stay distinct across cycles
    let mut totals = Diagnostics::default();
    let mut alert_count = 0usize;

    for k in 0..steps {
        if k == warmup_steps {
            plant.set_mode(args.scenario.mode());
        }

        let reading = plant.tick();
        let mut samples = TagRegistry::new(reading.timestamp);
        let mut sensor_data = serde_json::Map::new();
        for (tag, value) in &reading.values {
            samples.insert_f64(*tag, *value);
            sensor_data.insert((*tag).to_string(), serde_json::json!(value));
        }

        let mode = classify_mode(
            samples.f64_or(tags::SCREW_FEEDER, 0.0),
            samples.f64_or(tags::ROTARY_VALVE, 0.0),
            samples.f64_or(tags::WATER_FLOW, 0.0),
        );

        let evaluation = rules.evaluate(&samples, &setpoints);
        totals.merge(&evaluation.diagnostics);
        alert_count += evaluation.alerts.len();

        // a lost temperature reading reaches the detector as NaN and is skipped there
        let new_curves: Vec<ReactivityCurve> = detector
            .step(
                reading.timestamp,
                samples.f64_or(tags::SLAKER_TEMP, f64::NAN),
                samples.f64_or(tags::SCREW_FEEDER, 0.0),
            )
            .into_iter()
            .collect();

        let row = StatusRow {
            timestamp: reading.timestamp,
            mode,
            alerts: &evaluation.alerts,
            new_curves,
            sensor_data,
        };
        println!("{}", serde_json::to_string(&row)?);
    }

    info!(
        cycles = steps,
        alerts = alert_count,
        curves = detector.history().len(),
        missing_samples = totals.missing_samples,
        missing_setpoints = totals.missing_setpoints,
        type_mismatches = totals.type_mismatches,
        config_errors = totals.config_errors,
        "run finished"
    );
    for gap in &totals.config_gaps {
        warn!(%gap, "configuration gap");
    }
    for curve in detector.history() {
        info!(
            category = %curve.category,
            start = %curve.start_time,
            minutes = curve.minutes(),
            seconds = curve.seconds(),
            "reactivity curve"
        );
    }

    Ok(())
}
