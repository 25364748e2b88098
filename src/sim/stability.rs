//! Divergence detection
//!
//! Runs after integration when strict mode is on. NaN anywhere wins over
//! infinities, which win over threshold breaches, so the reported error does
//! not depend on which entity happens to be scanned first.

use log::error;
use serde::{Deserialize, Serialize};

use super::entity::Entity;
use crate::consts::{MAX_STABLE_ACCELERATION, MAX_STABLE_VELOCITY};
use crate::error::{NonFiniteKind, Result, SimError};
use crate::math::Vector3;

/// Magnitude limits beyond which a run counts as diverged
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityThresholds {
    pub max_velocity: f64,
    pub max_acceleration: f64,
}

impl Default for StabilityThresholds {
    fn default() -> Self {
        Self {
            max_velocity: MAX_STABLE_VELOCITY,
            max_acceleration: MAX_STABLE_ACCELERATION,
        }
    }
}

impl StabilityThresholds {
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.max_velocity) || !positive(self.max_acceleration) {
            return Err(SimError::InvalidConfig {
                reason: format!(
                    "stability thresholds must be positive, got velocity {} acceleration {}",
                    self.max_velocity, self.max_acceleration
                ),
            });
        }
        Ok(())
    }
}

/// Peak magnitudes seen by a passing check
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StabilityReport {
    pub peak_velocity: f64,
    pub peak_acceleration: f64,
}

/// The acceleration checked is the commanded `entity.acceleration`, before
/// the per-kind cap and without gravity. A runaway command is reported even
/// though the integrator would have clamped it.
fn quantities(entity: &Entity) -> [(&'static str, Vector3); 3] {
    [
        ("position", entity.position()),
        ("velocity", entity.velocity),
        ("acceleration", entity.acceleration),
    ]
}

fn find_non_finite<'a>(
    entities: &[&'a Entity],
    bad: impl Fn(f64) -> bool,
) -> Option<(&'a Entity, &'static str)> {
    entities.iter().find_map(|entity| {
        quantities(entity)
            .into_iter()
            .find(|(_, v)| bad(v.x) || bad(v.y) || bad(v.z))
            .map(|(name, _)| (*entity, name))
    })
}

/// Scan non-disabled entities for NaN, infinities and threshold breaches.
///
/// `max_acceleration` bounds the commanded acceleration, not gravity plus
/// the capped command that the integrator applies.
pub fn check_stability<'a>(
    step: u64,
    entities: impl IntoIterator<Item = &'a Entity>,
    thresholds: &StabilityThresholds,
) -> Result<StabilityReport> {
    let active: Vec<&Entity> = entities.into_iter().filter(|e| !e.is_disabled()).collect();

    let passes: [(NonFiniteKind, fn(f64) -> bool); 2] = [
        (NonFiniteKind::NaN, f64::is_nan),
        (NonFiniteKind::Infinite, f64::is_infinite),
    ];
    for (kind, bad) in passes {
        if let Some((entity, quantity)) = find_non_finite(&active, bad) {
            error!("step {step}: {kind} {quantity} on entity {}", entity.id);
            return Err(SimError::NonFinite {
                step,
                entity: entity.id.clone(),
                quantity,
                kind,
            });
        }
    }

    let mut report = StabilityReport::default();
    let mut worst: Option<&Entity> = None;
    for entity in active.iter().copied() {
        let velocity = entity.velocity.length();
        let acceleration = entity.acceleration.length();
        let breach =
            velocity > thresholds.max_velocity || acceleration > thresholds.max_acceleration;
        if breach && worst.is_none() {
            worst = Some(entity);
        }
        report.peak_velocity = report.peak_velocity.max(velocity);
        report.peak_acceleration = report.peak_acceleration.max(acceleration);
    }

    if let Some(entity) = worst {
        error!(
            "step {step}: entity {} diverged (|v| = {}, |a| = {})",
            entity.id,
            entity.velocity.length(),
            entity.acceleration.length()
        );
        return Err(SimError::Diverged {
            step,
            entity: entity.id.clone(),
            velocity: report.peak_velocity,
            acceleration: report.peak_acceleration,
        });
    }
    Ok(report)
}
