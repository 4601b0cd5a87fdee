use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{is_zero, NOISE_FLOOR};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperatingMode {
    Producing,
    Washing,
    Idle,
    Waiting,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperatingMode::Producing => "PRODUCING",
            OperatingMode::Washing => "WASHING",
            OperatingMode::Idle => "IDLE",
            OperatingMode::Waiting => "WAITING",
        };
        f.write_str(s)
    }
}

/// Operating mode from the two feed actuators and the water flow.
pub fn classify_mode(primary_actuator: f64, secondary_actuator: f64, water_flow: f64) -> OperatingMode {
    classify_mode_with_floor(primary_actuator, secondary_actuator, water_flow, NOISE_FLOOR)
}

pub fn classify_mode_with_floor(
    primary_actuator: f64,
    secondary_actuator: f64,
    water_flow: f64,
    floor: f64,
) -> OperatingMode {
    let primary_off = is_zero(primary_actuator, floor);
    let secondary_off = is_zero(secondary_actuator, floor);
    let water_off = is_zero(water_flow, floor);

    if !primary_off || !secondary_off {
        OperatingMode::Producing
    } else if !water_off {
        OperatingMode::Washing
    } else if water_off {
        OperatingMode::Idle
    } else {
        OperatingMode::Waiting
    }
}
