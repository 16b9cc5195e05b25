//! The online agglomerative clustering engine (AddC).
//!
//! For every arriving point, once `kmax` centroids exist:
//! 1. **Attract**: the centroid nearest to the point moves toward it.
//! 2. **Merge**: the two mutually closest centroids are merged into the
//!    lower slot, freeing the higher one.
//! 3. **Replace**: the freed slot becomes a new centroid seeded at the point.
//!
//! Step 1 keeps within-cluster variance low, step 2 keeps centroids apart,
//! step 3 lets the model follow a drifting distribution. Until `kmax`
//! centroids exist every point simply becomes a new centroid.
//!
//! Guedalia, London & Werman (1999), with the kernel-induced distance
//! refinements of Zhang, Chen & Tan (2005) and Eppstein's dynamic closest
//! pairs (2000).
//!
//! # Example
//!
//! ```
//! use addc_core::{AddcConfig, DistanceConfig, OnlineClusterer, Phase};
//!
//! let config = AddcConfig::new(2).with_distance(DistanceConfig::Euclidean);
//! let mut addc = OnlineClusterer::new(config).unwrap();
//!
//! addc.ingest(&[0.0, 0.0]).unwrap();
//! addc.ingest(&[10.0, 10.0]).unwrap();
//! assert_eq!(addc.phase(), Phase::Saturated);
//!
//! addc.ingest(&[0.0, 1.0]).unwrap();
//! assert_eq!(addc.len(), 2);
//! assert_eq!(addc.npoints(), 3);
//! assert!(addc.contains(&[0.0, 1.0]));
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::centroid::{Centroid, CentroidStats};
use crate::closest_pair::{ClosestPairIndex, SlotId};
use crate::config::AddcConfig;
use crate::error::{AddcError, AddcResult};
use crate::kernel::Distance;

// =============================================================================
// Phase / reports / trimming
// =============================================================================

/// Lifecycle of an engine. `Filling -> Saturated` happens once, permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Fewer than `kmax` centroids: points are inserted as new centroids.
    Filling,
    /// `kmax` centroids: points go through attract, merge and replace.
    Saturated,
}

/// A merge performed during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeEvent {
    /// Slot that kept the combined centroid.
    pub survivor: SlotId,
    /// Slot that was freed and reused for the new point.
    pub absorbed: SlotId,
    /// Distance between the two centroids when they were merged.
    pub distance: f64,
}

/// What one call to [`OnlineClusterer::ingest`] did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Slot now holding the ingested point as a fresh centroid.
    pub slot: SlotId,
    /// Centroid moved toward the point (saturated phase only).
    pub attracted: Option<SlotId>,
    /// Merge performed (saturated phase only).
    pub merged: Option<MergeEvent>,
}

/// How [`OnlineClusterer::trim_with`] interprets its threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimPolicy {
    /// Keep centroids with `weight / max_weight >= t`, `t` in `[0, 1]`.
    #[default]
    RelativeToMax,
    /// Keep centroids with `weight >= mean_weight * t`, `t >= 0`.
    RelativeToMean,
}

// =============================================================================
// OnlineClusterer
// =============================================================================

/// Bounded set of weighted centroids updated one point at a time.
///
/// Coordinates live in the [`ClosestPairIndex`]; the engine keeps only the
/// per-slot weights and refers to centroids by [`SlotId`].
///
/// Ingestion is all-or-nothing: if any sub-step of a saturated ingest fails
/// (e.g. the distance function rejects a merged center), the index and the
/// weights are restored to their state before the call and the point is not
/// counted.
#[derive(Debug, Clone)]
pub struct OnlineClusterer {
    config: AddcConfig,
    index: ClosestPairIndex,
    stats: Vec<CentroidStats>,
    dimension: Option<usize>,
    npoints: u64,
    phase: Phase,
}

impl OnlineClusterer {
    /// Create an engine using the distance described by `config.distance`.
    ///
    /// # Errors
    ///
    /// Returns `AddcError::InvalidConfig` if `config.validate()` fails
    /// (e.g. `kmax < 2`).
    pub fn new(config: AddcConfig) -> AddcResult<Self> {
        let distance = config.distance.build();
        Self::with_distance(config, distance)
    }

    /// Create an engine with a caller-supplied distance function, which
    /// takes precedence over `config.distance`.
    ///
    /// # Errors
    ///
    /// Returns `AddcError::InvalidConfig` if `config.validate()` fails.
    pub fn with_distance(config: AddcConfig, distance: Distance) -> AddcResult<Self> {
        config.validate()?;

        debug!(
            kmax = config.kmax,
            distance = distance.name(),
            step_policy = ?config.step_policy,
            repair_policy = ?config.repair_policy,
            "creating AddC engine"
        );

        let index = ClosestPairIndex::new(distance)
            .with_repair_policy(config.repair_policy)
            .with_symmetry_check(config.check_symmetry);

        Ok(Self {
            stats: Vec::with_capacity(config.kmax),
            config,
            index,
            dimension: None,
            npoints: 0,
            phase: Phase::Filling,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &AddcConfig {
        &self.config
    }

    /// Maximum number of centroids.
    #[inline]
    pub fn kmax(&self) -> usize {
        self.config.kmax
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of live centroids.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True before the first point is ingested.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of points successfully ingested.
    #[inline]
    pub fn npoints(&self) -> u64 {
        self.npoints
    }

    /// Point dimension, fixed by the first ingested point.
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Read-only view of the underlying closest-pair index.
    pub fn index(&self) -> &ClosestPairIndex {
        &self.index
    }

    /// Is some centroid at exactly these coordinates?
    pub fn contains(&self, point: &[f64]) -> bool {
        self.index.contains_point(point)
    }

    /// Snapshot of the centroids in slot order. Reused slots keep their position.
    pub fn centroids(&self) -> Vec<Centroid> {
        self.index
            .iter()
            .map(|(slot, center)| {
                let stats = self.stats[slot.index()];
                Centroid {
                    slot,
                    center: center.to_vec(),
                    weight: stats.weight,
                    mass: stats.mass,
                }
            })
            .collect()
    }

    /// Centroid coordinates in slot order.
    pub fn centers(&self) -> Vec<Vec<f64>> {
        self.index.iter().map(|(_, center)| center.to_vec()).collect()
    }

    /// Sum of all centroid weights.
    pub fn total_weight(&self) -> u64 {
        self.index.slots().map(|slot| self.stats[slot.index()].weight).sum()
    }

    /// Ingest one point.
    ///
    /// # Errors
    ///
    /// - `AddcError::InvalidPoint` for an empty or non-finite point
    /// - `AddcError::DimensionMismatch` if the dimension differs from the first point
    /// - `AddcError::InvalidDistance` if the distance function misbehaves
    /// - index invariant violations are propagated unchanged
    ///
    /// Rejected points are not counted in [`OnlineClusterer::npoints`] and
    /// leave the centroid set unchanged.
    pub fn ingest(&mut self, point: &[f64]) -> AddcResult<IngestReport> {
        self.validate_point(point)?;

        let report = match self.phase {
            Phase::Filling => self.fill(point)?,
            Phase::Saturated => {
                let checkpoint = (self.index.clone(), self.stats.clone());
                match self.step(point) {
                    Ok(report) => report,
                    Err(err) => {
                        (self.index, self.stats) = checkpoint;
                        warn!(
                            npoints = self.npoints,
                            error = %err,
                            "AddC step failed, centroid set restored"
                        );
                        return Err(err);
                    }
                }
            }
        };

        if self.dimension.is_none() {
            self.dimension = Some(point.len());
        }
        self.npoints += 1;
        Ok(report)
    }

    /// Ingest points in order, exactly as repeated [`OnlineClusterer::ingest`] calls.
    ///
    /// Stops at the first error; earlier points stay ingested and later ones
    /// are not processed. Returns the number of points ingested.
    pub fn batch<I, P>(&mut self, points: I) -> AddcResult<usize>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[f64]>,
    {
        let mut count = 0;
        for point in points {
            self.ingest(point.as_ref())?;
            count += 1;
        }
        Ok(count)
    }

    /// Centroids whose weight is at least `threshold` times the largest weight.
    ///
    /// Read-only: the live centroid set is not modified.
    ///
    /// # Errors
    ///
    /// Returns `AddcError::InvalidParameter` if `threshold` is outside `[0, 1]`.
    pub fn trim(&self, threshold: f64) -> AddcResult<Vec<Centroid>> {
        self.trim_with(threshold, TrimPolicy::RelativeToMax)
    }

    /// Centroids surviving `threshold` under the given trimming policy.
    ///
    /// # Errors
    ///
    /// Returns `AddcError::InvalidParameter` for a NaN/negative threshold, or
    /// a threshold above 1 with [`TrimPolicy::RelativeToMax`].
    pub fn trim_with(&self, threshold: f64, policy: TrimPolicy) -> AddcResult<Vec<Centroid>> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AddcError::invalid_parameter(format!(
                "trim threshold must be finite and >= 0, got {}",
                threshold
            )));
        }
        if policy == TrimPolicy::RelativeToMax && threshold > 1.0 {
            return Err(AddcError::invalid_parameter(format!(
                "trim threshold relative to the max weight must be within [0, 1], got {}",
                threshold
            )));
        }

        let centroids = self.centroids();
        if centroids.is_empty() {
            return Ok(centroids);
        }

        let cutoff = match policy {
            TrimPolicy::RelativeToMax => {
                let max = centroids.iter().map(|c| c.weight).max().unwrap_or(0) as f64;
                max * threshold
            }
            TrimPolicy::RelativeToMean => {
                let sum: u64 = centroids.iter().map(|c| c.weight).sum();
                (sum as f64 / centroids.len() as f64) * threshold
            }
        };

        let kept: Vec<Centroid> = centroids
            .into_iter()
            .filter(|c| c.weight as f64 >= cutoff)
            .collect();

        trace!(threshold, ?policy, cutoff, kept = kept.len(), "trimmed centroid view");
        Ok(kept)
    }

    // -------------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------------

    fn validate_point(&self, point: &[f64]) -> AddcResult<()> {
        if point.is_empty() {
            return Err(AddcError::invalid_point("point has no coordinates"));
        }
        if let Some(expected) = self.dimension {
            if point.len() != expected {
                return Err(AddcError::dimension_mismatch(expected, point.len()));
            }
        }
        for (i, &v) in point.iter().enumerate() {
            if !v.is_finite() {
                return Err(AddcError::invalid_point(format!(
                    "coordinate {} is not finite: {}",
                    i, v
                )));
            }
        }
        Ok(())
    }

    /// Filling phase: the point becomes a new centroid in the next slot.
    fn fill(&mut self, point: &[f64]) -> AddcResult<IngestReport> {
        let slot = SlotId::new(self.stats.len());
        self.index.insert(slot, point.to_vec())?;
        self.stats.push(CentroidStats::seed());

        if self.stats.len() == self.config.kmax {
            self.phase = Phase::Saturated;
            info!(
                kmax = self.config.kmax,
                npoints = self.npoints + 1,
                "AddC saturated, switching to attract-merge-replace"
            );
        }

        Ok(IngestReport {
            slot,
            attracted: None,
            merged: None,
        })
    }

    /// Saturated phase: attract, merge, replace.
    fn step(&mut self, point: &[f64]) -> AddcResult<IngestReport> {
        let attracted = self.attract(point)?;
        let merged = self.merge_closest()?;

        self.index.insert(merged.absorbed, point.to_vec())?;
        self.stats[merged.absorbed.index()] = CentroidStats::seed();

        trace!(
            npoints = self.npoints + 1,
            attracted = %attracted,
            survivor = %merged.survivor,
            absorbed = %merged.absorbed,
            "AddC step"
        );

        Ok(IngestReport {
            slot: merged.absorbed,
            attracted: Some(attracted),
            merged: Some(merged),
        })
    }

    /// Move the centroid nearest to `point` toward it.
    fn attract(&mut self, point: &[f64]) -> AddcResult<SlotId> {
        let (nearest, _) = self
            .index
            .nearest_to(point)?
            .ok_or(AddcError::TooFewSlots { live: 0 })?;
        let center = self
            .index
            .point(nearest)
            .ok_or(AddcError::SlotNotLive { slot: nearest })?;

        let (stats, moved) =
            self.config
                .step_policy
                .attract(self.stats[nearest.index()], center, point);
        self.index.move_point(nearest, moved)?;
        self.stats[nearest.index()] = stats;
        Ok(nearest)
    }

    /// Merge the closest pair into its lower slot and free the higher slot.
    fn merge_closest(&mut self) -> AddcResult<MergeEvent> {
        let pair = self.index.closest_pair()?;
        let (survivor, absorbed) = (pair.a, pair.b);

        let absorbed_center = self.index.remove(absorbed)?;
        let survivor_center = self
            .index
            .point(survivor)
            .ok_or(AddcError::SlotNotLive { slot: survivor })?;

        let (stats, merged) = self.config.step_policy.merge(
            self.stats[survivor.index()],
            survivor_center,
            self.stats[absorbed.index()],
            &absorbed_center,
        );
        self.index.move_point(survivor, merged)?;
        self.stats[survivor.index()] = stats;

        debug!(
            survivor = %survivor,
            absorbed = %absorbed,
            distance = pair.distance,
            weight = stats.weight,
            "AddC merged closest pair"
        );

        Ok(MergeEvent {
            survivor,
            absorbed,
            distance: pair.distance,
        })
    }
}
