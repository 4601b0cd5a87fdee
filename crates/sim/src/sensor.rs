use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensorFault {
    None,
    Stuck { value: f64 },
    Bias { value: f64 },
    /// Every `n`th reading is lost.
    DropoutEvery { n: u64 },
}

/// Analog transmitter with Gaussian noise and injectable faults.
#[derive(Clone, Debug)]
pub struct Sensor {
    pub noise_std: f64,
    pub fault: SensorFault,
    rng: StdRng,
    read_count: u64,
}

impl Sensor {
    pub fn new(seed: u64) -> Self {
        Self {
            noise_std: 0.25,
            fault: SensorFault::None,
            rng: StdRng::seed_from_u64(seed),
            read_count: 0,
        }
    }

    /// Measured value for `true_value`. A dropout reads as NaN.
    pub fn read(&mut self, true_value: f64) -> f64 {
        self.read_count += 1;

        let mut v = match self.fault {
            SensorFault::None => true_value,
            SensorFault::Stuck { value } => value,
            SensorFault::Bias { value } => true_value + value,
            SensorFault::DropoutEvery { n } => {
                if n > 0 && (self.read_count % n) == 0 {
                    return f64::NAN;
                }
                true_value
            }
        };

        if self.noise_std > 0.0 {
            if let Ok(normal) = Normal::new(0.0, self.noise_std) {
                v += normal.sample(&mut self.rng);
            }
        }

        v
    }
}
