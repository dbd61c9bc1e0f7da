//! Random coordinates inside a rectangle.

use fleetwatch_core::config::{ConfigError, CoordinateBounds};
use fleetwatch_types::Position;
use rand::Rng;

const SCALE: f64 = 1_000_000.0;

/// Draws positions uniformly from a [`CoordinateBounds`] rectangle.
///
/// Coordinates are rounded to 6 decimal places (about 10 cm) and stamped
/// with the current Unix time.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateGenerator {
    bounds: CoordinateBounds,
}

impl CoordinateGenerator {
    /// Create a generator over `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for non-finite or inverted bounds.
    pub fn new(bounds: CoordinateBounds) -> Result<Self, ConfigError> {
        bounds.validate()?;
        Ok(Self { bounds })
    }

    /// Draw one position.
    pub fn generate(&self) -> Position {
        let mut rng = rand::rng();
        let latitude = sample(&mut rng, self.bounds.lat_min, self.bounds.lat_max);
        let longitude = sample(&mut rng, self.bounds.lon_min, self.bounds.lon_max);
        Position::new(latitude, longitude, unix_now())
    }
}

fn sample(rng: &mut impl Rng, min: f64, max: f64) -> f64 {
    let raw = rng.random_range(min..=max);
    ((raw * SCALE).round() / SCALE).clamp(min, max)
}

fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
