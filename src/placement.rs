//! Placement planner. Finds an empty spot for a new bubble by rejection
//! sampling within a bounded number of attempts.

use crate::types::SurfaceBounds;
use glam::Vec2;
use rand::Rng;
use thiserror::Error;

/// Distance kept clear between sampled points and the surface edge.
pub const EDGE_MARGIN: f32 = 50.0;

/// Samples tried before giving up on a spawn.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 40;

/// No empty point was found within the attempt budget. Callers skip the spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no empty position after {attempts} attempts")]
pub struct PlacementFailed {
    pub attempts: u32,
}

/// True if no existing center lies within `max_diameter` of `point`.
/// Compares squared distances.
pub fn is_position_empty(existing: &[Vec2], max_diameter: f32, point: Vec2) -> bool {
    let limit = max_diameter * max_diameter;
    existing.iter().all(|c| c.distance_squared(point) >= limit)
}

/// Uniform random point inside `bounds` pulled in by `EDGE_MARGIN`.
pub fn random_point<R: Rng + ?Sized>(bounds: &SurfaceBounds, rng: &mut R) -> Vec2 {
    let h = bounds.inset_half_extents(EDGE_MARGIN);
    Vec2::new(
        rng.random_range(-h.x..=h.x),
        rng.random_range(-h.y..=h.y),
    )
}

/// Sample up to `max_attempts` points and return the first that is empty.
pub fn find_empty_position<R: Rng + ?Sized>(
    existing: &[Vec2],
    max_diameter: f32,
    bounds: &SurfaceBounds,
    max_attempts: u32,
    rng: &mut R,
) -> Result<Vec2, PlacementFailed> {
    for _ in 0..max_attempts {
        let point = random_point(bounds, rng);
        if is_position_empty(existing, max_diameter, point) {
            return Ok(point);
        }
    }
    Err(PlacementFailed {
        attempts: max_attempts,
    })
}
