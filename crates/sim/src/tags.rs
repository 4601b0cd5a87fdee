//! Tag names published by the simulator, as wired in the plant DCS.

// Silo
pub const SILO_LEVEL: &str = "2270-LIT-11825";
pub const SILO_LEVEL_HIGH_HIGH: &str = "2270-LSHH-11826";
pub const SILO_LEVEL_LOW_LOW: &str = "2270-LSLL-11829";
pub const SILO_VENT_DP: &str = "2270-PDAH-11827";

// Dosing
pub const LIME_FEED_WEIGHT: &str = "2280-WI-01769";
pub const SCREW_FEEDER: &str = "2270-SAL-11817";
pub const ROTARY_VALVE: &str = "2270-SAL-11818";

// Slaking
pub const WATER_FLOW: &str = "2270-FIT-11801";
pub const SLAKER_TEMP: &str = "2270-TT-11824B";
pub const SLAKER_MOTOR: &str = "2270-ZM-009-06";

// Separation
pub const CHAMBER_LEVEL: &str = "2270-LIT-11850";
pub const CHAMBER_AGITATOR: &str = "2270-ZM-009-31";

// Distribution
pub const SLURRY_DENSITY: &str = "DT-2270-HDR";
pub const SLURRY_PH: &str = "pHT-2270-RGH";
pub const OIL_PRESSURE: &str = "2270-PIT-11895";

pub const ALL: [&str; 15] = [
    SILO_LEVEL,
    SILO_LEVEL_HIGH_HIGH,
    SILO_LEVEL_LOW_LOW,
    SILO_VENT_DP,
    LIME_FEED_WEIGHT,
    SCREW_FEEDER,
    ROTARY_VALVE,
    WATER_FLOW,
    SLAKER_TEMP,
    SLAKER_MOTOR,
    CHAMBER_LEVEL,
    CHAMBER_AGITATOR,
    SLURRY_DENSITY,
    SLURRY_PH,
    OIL_PRESSURE,
];
