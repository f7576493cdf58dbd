//! Synthetic boundary scenarios for runs without upstream data.
//!
//! Rain follows a daily sinusoid with Gaussian noise, the two reservoir
//! inflows are held constant, and the tide is a semi-diurnal sinusoid.
//! Output is deterministic for a given seed.

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Boundaries;
use super::resample::RESAMPLE_STEP;
use super::timeseries::TimeSeries;

/// Principal lunar semi-diurnal period in hours.
const M2_PERIOD_HOURS: f64 = 12.42;

/// Parameters of the synthetic scenario.
#[derive(Debug, Clone)]
pub struct SyntheticBoundaries {
    /// Daily rain amplitude (mm/h).
    pub rain_amplitude: f64,
    /// Mean rain intensity (mm/h).
    pub rain_mean: f64,
    /// Rain noise standard deviation (mm/h).
    pub rain_noise_std: f64,
    /// Constant inflow for the first upstream boundary (m3/s).
    pub inflow_a: f64,
    /// Constant inflow for the second upstream boundary (m3/s).
    pub inflow_b: f64,
    /// Tide amplitude (m).
    pub tide_amplitude: f64,
}

impl Default for SyntheticBoundaries {
    fn default() -> Self {
        Self {
            rain_amplitude: 3.0,
            rain_mean: 2.0,
            rain_noise_std: 1.0,
            inflow_a: 24.0,
            inflow_b: 800.0,
            tide_amplitude: 1.2,
        }
    }
}

impl SyntheticBoundaries {
    /// Generates hourly series covering `[start, end]`.
    ///
    /// Returns empty series when `end < start`.
    pub fn generate(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        seed: u64,
    ) -> Boundaries<TimeSeries> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut out = Boundaries::<TimeSeries>::default();

        let mut t = start;
        let mut i = 0usize;
        while t <= end {
            let hour = i as f64;
            let daily = (2.0 * std::f64::consts::PI * hour / 24.0).sin();
            let rain = self.rain_amplitude * daily
                + self.rain_mean
                + gaussian_noise(&mut rng, self.rain_noise_std);
            let tide =
                self.tide_amplitude * (2.0 * std::f64::consts::PI * hour / M2_PERIOD_HOURS).sin();

            out.rain.insert(t, rain.max(0.0));
            out.inflow_a.insert(t, self.inflow_a);
            out.inflow_b.insert(t, self.inflow_b);
            out.tide.insert(t, tide);

            t += RESAMPLE_STEP;
            i += 1;
        }
        out
    }
}

/// Gaussian noise via the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
