//! Centroids and the step rules that move and merge them.
//!
//! A centroid carries two accumulators:
//! - `weight`: how many points it has absorbed (integer, only grows)
//! - `mass`: the inertia used by the step rule. Under the default
//!   [`StepPolicy::WeightProportional`] it equals `weight`; under
//!   [`StepPolicy::Kernel`] it is the running sum of kernel similarities
//!   between the centroid and the points it absorbed (Zhang et al., 2005).

use serde::{Deserialize, Serialize};

use crate::closest_pair::SlotId;
use crate::error::{AddcError, AddcResult};
use crate::kernel::Kernel;

/// A weighted cluster representative, as exposed by engine snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    /// Slot this centroid occupies.
    pub slot: SlotId,
    /// Current coordinates.
    pub center: Vec<f64>,
    /// Number of points absorbed (seed point included).
    pub weight: u64,
    /// Step-rule inertia.
    pub mass: f64,
}

impl Centroid {
    /// Dimension of the center.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.center.len()
    }
}

/// Engine-side accumulators for one slot. Coordinates live in the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CentroidStats {
    pub(crate) weight: u64,
    pub(crate) mass: f64,
}

impl CentroidStats {
    /// A fresh centroid seeded by a single point.
    pub(crate) const fn seed() -> Self {
        Self {
            weight: 1,
            mass: 1.0,
        }
    }
}

/// Rule used by the attract step (and the merge average under `Kernel`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepPolicy {
    /// `c <- (w c + p) / (w + 1)`; merges average by weight.
    #[default]
    WeightProportional,
    /// `mass <- mass + K(c, p)`, `c <- c + (p - c) / mass`; merges average by mass.
    Kernel {
        /// Similarity kernel; must be nonnegative valued.
        kernel: Kernel,
    },
    /// `c <- c + rate (p - c)`: a fixed learning rate that keeps forgetting
    /// old data. Merges average by weight.
    LearningRate {
        /// Step size in `(0, 1]`.
        rate: f64,
    },
}

impl StepPolicy {
    /// Validate policy parameters.
    ///
    /// # Errors
    ///
    /// Returns `AddcError::InvalidConfig` if the learning rate is outside
    /// `(0, 1]`, or if the kernel can take negative values (its mass could
    /// then shrink to zero).
    pub fn validate(&self) -> AddcResult<()> {
        match *self {
            StepPolicy::WeightProportional => Ok(()),
            StepPolicy::LearningRate { rate } => {
                if rate > 0.0 && rate <= 1.0 {
                    Ok(())
                } else {
                    Err(AddcError::invalid_config(format!(
                        "learning rate must be within (0, 1], got {}",
                        rate
                    )))
                }
            }
            StepPolicy::Kernel { kernel } => {
                kernel.validate()?;
                match kernel {
                    Kernel::Gaussian { .. }
                    | Kernel::Exponential { .. }
                    | Kernel::Laplacian { .. }
                    | Kernel::RationalQuadratic { .. }
                    | Kernel::InverseMultiquadric { .. }
                    | Kernel::Circular { .. } => Ok(()),
                    other => Err(AddcError::invalid_config(format!(
                        "{} kernel can be negative and cannot drive the kernel step policy",
                        other.name()
                    ))),
                }
            }
        }
    }

    /// Move a centroid toward `point`. Returns the new stats and center.
    pub(crate) fn attract(
        &self,
        stats: CentroidStats,
        center: &[f64],
        point: &[f64],
    ) -> (CentroidStats, Vec<f64>) {
        let weight = stats.weight + 1;
        match *self {
            StepPolicy::WeightProportional => {
                let w = stats.weight as f64;
                let total = w + 1.0;
                let moved = center
                    .iter()
                    .zip(point)
                    .map(|(c, p)| (w * c + p) / total)
                    .collect();
                (
                    CentroidStats {
                        weight,
                        mass: stats.mass + 1.0,
                    },
                    moved,
                )
            }
            StepPolicy::Kernel { kernel } => {
                let mass = stats.mass + kernel.evaluate(center, point);
                let moved = center
                    .iter()
                    .zip(point)
                    .map(|(c, p)| c + (p - c) / mass)
                    .collect();
                (CentroidStats { weight, mass }, moved)
            }
            StepPolicy::LearningRate { rate } => {
                let moved = center
                    .iter()
                    .zip(point)
                    .map(|(c, p)| c + rate * (p - c))
                    .collect();
                (
                    CentroidStats {
                        weight,
                        mass: stats.mass + 1.0,
                    },
                    moved,
                )
            }
        }
    }

    /// Combine two centroids. The center is the mass-weighted average; weight
    /// and mass are summed.
    pub(crate) fn merge(
        &self,
        a: CentroidStats,
        center_a: &[f64],
        b: CentroidStats,
        center_b: &[f64],
    ) -> (CentroidStats, Vec<f64>) {
        let total = a.mass + b.mass;
        let merged = center_a
            .iter()
            .zip(center_b)
            .map(|(x, y)| (a.mass * x + b.mass * y) / total)
            .collect();
        (
            CentroidStats {
                weight: a.weight + b.weight,
                mass: total,
            },
            merged,
        )
    }
}
