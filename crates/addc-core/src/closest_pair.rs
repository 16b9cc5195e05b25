//! Dynamic closest-pair index (neighbor heuristic).
//!
//! Keeps a set of live slots, each holding a coordinate vector, a cached
//! nearest neighbor and the distance to it. The global closest pair is the
//! slot with the smallest cached distance together with its neighbor, so a
//! query is a linear scan over the cache instead of an O(n²) recomputation.
//!
//! # Costs
//!
//! | Operation | Distance evaluations |
//! |-----------|----------------------|
//! | `insert` | n |
//! | `move_point` | n, plus n per slot repaired |
//! | `remove` | n per slot whose neighbor was removed |
//! | `closest_pair` | 1, plus n per stale slot repaired |
//!
//! # Cache invariant
//!
//! After every operation, for each live slot `s`:
//! - `s` is not stale: the cached neighbor is a true nearest neighbor of `s`
//!   and the cached distance is exact.
//! - `s` is stale: the cached neighbor is live and the cached distance is the
//!   true distance to it, so it never understates the nearest-neighbor
//!   distance. A slot goes stale when its cached neighbor moved away.
//!
//! Stale slots are repaired according to [`RepairPolicy`]: either at the end
//! of the move (`Eager`) or in one batch at the next [`ClosestPairIndex::closest_pair`]
//! read (`Lazy`, the default).
//!
//! # Example
//!
//! ```
//! use addc_core::closest_pair::{ClosestPairIndex, SlotId};
//! use addc_core::kernel::Distance;
//!
//! let mut index = ClosestPairIndex::new(Distance::euclidean());
//! index.insert(SlotId::new(0), vec![0.0, 0.0]).unwrap();
//! index.insert(SlotId::new(1), vec![10.0, 0.0]).unwrap();
//! index.insert(SlotId::new(2), vec![1.0, 0.0]).unwrap();
//!
//! let pair = index.closest_pair().unwrap();
//! assert_eq!((pair.a, pair.b), (SlotId::new(0), SlotId::new(2)));
//! assert_eq!(pair.distance, 1.0);
//! ```

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{AddcError, AddcResult};
use crate::kernel::Distance;

/// Relative tolerance when re-verifying the returned pair against its cache.
const VERIFY_TOLERANCE: f64 = 1e-9;

// =============================================================================
// SlotId
// =============================================================================

/// Stable identity of a point inside the index, independent of its coordinates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SlotId(usize);

impl SlotId {
    /// Create a slot id from a raw index.
    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Raw index of this slot.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for SlotId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// RepairPolicy / ClosestPair
// =============================================================================

/// When slots invalidated by `move_point` get their neighbor recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairPolicy {
    /// Mark invalidated slots stale; repair them in one batch on the next
    /// `closest_pair` read. Several moves between reads pay for one repair.
    #[default]
    Lazy,
    /// Repair invalidated slots before `move_point` returns.
    Eager,
}

/// Result of a closest-pair query. Always `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosestPair {
    /// Lower slot of the pair.
    pub a: SlotId,
    /// Higher slot of the pair.
    pub b: SlotId,
    /// Distance between the two, re-evaluated at query time.
    pub distance: f64,
}

// =============================================================================
// ClosestPairIndex
// =============================================================================

#[derive(Debug, Clone)]
struct Entry {
    point: Vec<f64>,
    neighbor: Option<SlotId>,
    neighbor_distance: f64,
    stale: bool,
}

impl Entry {
    /// Would `(slot, d)` be a better neighbor than the cached one?
    /// Ties go to the lower slot so results are deterministic.
    #[inline]
    fn prefers(&self, slot: SlotId, d: f64) -> bool {
        match self.neighbor {
            None => true,
            Some(current) => {
                d < self.neighbor_distance || (d == self.neighbor_distance && slot < current)
            }
        }
    }
}

/// Dynamic closest-pair structure over slot-indexed points.
///
/// Owns every coordinate it indexes; callers refer to points only by
/// [`SlotId`]. Not thread-safe for concurrent mutation (`&mut self`).
#[derive(Clone)]
pub struct ClosestPairIndex {
    distance: Distance,
    entries: Vec<Option<Entry>>,
    live: usize,
    stale: usize,
    repair_policy: RepairPolicy,
    check_symmetry: bool,
    evaluations: Cell<u64>,
}

impl fmt::Debug for ClosestPairIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosestPairIndex")
            .field("distance", &self.distance.name())
            .field("live", &self.live)
            .field("stale", &self.stale)
            .field("repair_policy", &self.repair_policy)
            .field("evaluations", &self.evaluations.get())
            .finish()
    }
}

impl ClosestPairIndex {
    /// Create an empty index with lazy repair and symmetry checks enabled.
    pub fn new(distance: Distance) -> Self {
        Self {
            distance,
            entries: Vec::new(),
            live: 0,
            stale: 0,
            repair_policy: RepairPolicy::default(),
            check_symmetry: true,
            evaluations: Cell::new(0),
        }
    }

    /// Build an index with slots `0..n` from the given points.
    ///
    /// # Errors
    ///
    /// Propagates `AddcError::InvalidDistance` from the distance function.
    pub fn from_points<I>(distance: Distance, points: I) -> AddcResult<Self>
    where
        I: IntoIterator<Item = Vec<f64>>,
    {
        let mut index = Self::new(distance);
        for (i, point) in points.into_iter().enumerate() {
            index.insert(SlotId::new(i), point)?;
        }
        Ok(index)
    }

    /// Set the repair policy.
    #[must_use]
    pub fn with_repair_policy(mut self, policy: RepairPolicy) -> Self {
        self.repair_policy = policy;
        self
    }

    /// Enable or disable the symmetry probe performed on every insert.
    #[must_use]
    pub fn with_symmetry_check(mut self, enabled: bool) -> Self {
        self.check_symmetry = enabled;
        self
    }

    /// The distance function in use.
    pub fn distance(&self) -> &Distance {
        &self.distance
    }

    /// Active repair policy.
    pub fn repair_policy(&self) -> RepairPolicy {
        self.repair_policy
    }

    /// Number of live slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// True when no slot is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots awaiting repair.
    #[inline]
    pub fn stale_count(&self) -> usize {
        self.stale
    }

    /// Total distance evaluations performed so far.
    #[inline]
    pub fn evaluations(&self) -> u64 {
        self.evaluations.get()
    }

    /// Is `slot` live?
    #[inline]
    pub fn contains_slot(&self, slot: SlotId) -> bool {
        self.entry(slot).is_some()
    }

    /// Is some live slot at exactly these coordinates?
    pub fn contains_point(&self, point: &[f64]) -> bool {
        self.iter().any(|(_, p)| p == point)
    }

    /// Coordinates of a live slot.
    pub fn point(&self, slot: SlotId) -> Option<&[f64]> {
        self.entry(slot).map(|e| e.point.as_slice())
    }

    /// Cached neighbor of a live slot and the cached distance to it.
    ///
    /// For a stale slot this is an upper bound, not necessarily the nearest.
    pub fn neighbor(&self, slot: SlotId) -> Option<(SlotId, f64)> {
        let entry = self.entry(slot)?;
        entry.neighbor.map(|n| (n, entry.neighbor_distance))
    }

    /// Is `slot` live and awaiting repair?
    pub fn is_stale(&self, slot: SlotId) -> bool {
        self.entry(slot).is_some_and(|e| e.stale)
    }

    /// Live slots in ascending order.
    pub fn slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.iter().map(|(slot, _)| slot)
    }

    /// Live slots and their coordinates in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &[f64])> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (SlotId::new(i), e.point.as_slice())))
    }

    /// Nearest live slot to an arbitrary point (ties go to the lower slot).
    ///
    /// Returns `Ok(None)` when the index is empty.
    ///
    /// # Errors
    ///
    /// Propagates `AddcError::InvalidDistance` from the distance function.
    pub fn nearest_to(&self, point: &[f64]) -> AddcResult<Option<(SlotId, f64)>> {
        let dists = self.scan(point, &[])?;
        Ok(best_of(&dists))
    }

    /// Add a new live slot.
    ///
    /// # Errors
    ///
    /// - `AddcError::SlotAlreadyLive` if `slot` is live (index left unchanged)
    /// - `AddcError::InvalidDistance` if the distance function misbehaves
    pub fn insert(&mut self, slot: SlotId, point: Vec<f64>) -> AddcResult<()> {
        if self.contains_slot(slot) {
            return Err(AddcError::SlotAlreadyLive { slot });
        }

        let dists = self.scan(&point, &[])?;
        let nearest = best_of(&dists);
        if self.check_symmetry {
            if let Some((other, forward)) = nearest {
                if let Some(other_point) = self.point(other) {
                    self.count_evaluation();
                    self.distance.check_symmetry(&point, other_point, forward)?;
                }
            }
        }

        for &(q, d) in &dists {
            if let Some(entry) = self.entry_mut(q) {
                if entry.prefers(slot, d) {
                    entry.neighbor = Some(slot);
                    entry.neighbor_distance = d;
                }
            }
        }

        if slot.index() >= self.entries.len() {
            self.entries.resize_with(slot.index() + 1, || None);
        }
        self.entries[slot.index()] = Some(Entry {
            point,
            neighbor: nearest.map(|(n, _)| n),
            neighbor_distance: nearest.map_or(f64::INFINITY, |(_, d)| d),
            stale: false,
        });
        self.live += 1;

        trace!(slot = %slot, neighbor = ?nearest, live = self.live, "closest-pair insert");
        Ok(())
    }

    /// Remove a live slot and return its coordinates.
    ///
    /// Slots whose cached neighbor was `slot` recompute their neighbor over the
    /// remaining live set.
    ///
    /// # Errors
    ///
    /// - `AddcError::SlotNotLive` if `slot` is not live (index left unchanged)
    /// - `AddcError::InvalidDistance` if the distance function misbehaves
    pub fn remove(&mut self, slot: SlotId) -> AddcResult<Vec<f64>> {
        if !self.contains_slot(slot) {
            return Err(AddcError::SlotNotLive { slot });
        }

        let affected: Vec<SlotId> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e {
                Some(e) if i != slot.index() && e.neighbor == Some(slot) => Some(SlotId::new(i)),
                _ => None,
            })
            .collect();

        let mut repairs = Vec::with_capacity(affected.len());
        for q in affected {
            let point = self.point(q).ok_or(AddcError::SlotNotLive { slot: q })?;
            let dists = self.scan(point, &[q, slot])?;
            repairs.push((q, best_of(&dists)));
        }

        let removed = self.entries[slot.index()]
            .take()
            .ok_or(AddcError::SlotNotLive { slot })?;
        self.live -= 1;
        if removed.stale {
            self.stale -= 1;
        }

        let repaired = repairs.len();
        for (q, best) in repairs {
            self.set_neighbor(q, best);
        }

        trace!(slot = %slot, repaired, live = self.live, "closest-pair remove");
        Ok(removed.point)
    }

    /// Move a live slot to new coordinates.
    ///
    /// The moved slot's own neighbor is recomputed; any other slot for which
    /// the moved slot is now closer adopts it. Slots whose cached neighbor
    /// was the moved slot and which are now farther from it go stale and are
    /// repaired per [`RepairPolicy`].
    ///
    /// # Errors
    ///
    /// - `AddcError::SlotNotLive` if `slot` is not live (index left unchanged)
    /// - `AddcError::InvalidDistance` if the distance function misbehaves
    pub fn move_point(&mut self, slot: SlotId, point: Vec<f64>) -> AddcResult<()> {
        if !self.contains_slot(slot) {
            return Err(AddcError::SlotNotLive { slot });
        }

        let dists = self.scan(&point, &[slot])?;
        let nearest = best_of(&dists);

        if let Some(entry) = self.entry_mut(slot) {
            entry.point = point;
        }
        self.set_neighbor(slot, nearest);

        let mut invalidated = 0usize;
        for &(q, d) in &dists {
            let Some(entry) = self.entries[q.index()].as_mut() else {
                continue;
            };
            if entry.neighbor == Some(slot) {
                if d > entry.neighbor_distance && !entry.stale {
                    entry.stale = true;
                    invalidated += 1;
                }
                entry.neighbor_distance = d;
            } else if entry.prefers(slot, d) {
                entry.neighbor = Some(slot);
                entry.neighbor_distance = d;
            }
        }
        self.stale += invalidated;

        trace!(slot = %slot, neighbor = ?nearest, invalidated, "closest-pair move");

        if self.repair_policy == RepairPolicy::Eager && self.stale > 0 {
            self.repair_stale()?;
        }
        Ok(())
    }

    /// Recompute the neighbor of every stale slot.
    ///
    /// Returns the number of slots repaired.
    ///
    /// # Errors
    ///
    /// Propagates `AddcError::InvalidDistance`; no slot is modified in that case.
    pub fn repair_stale(&mut self) -> AddcResult<usize> {
        if self.stale == 0 {
            return Ok(0);
        }

        let stale: Vec<SlotId> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e {
                Some(e) if e.stale => Some(SlotId::new(i)),
                _ => None,
            })
            .collect();

        let mut repairs = Vec::with_capacity(stale.len());
        for &q in &stale {
            let point = self.point(q).ok_or(AddcError::SlotNotLive { slot: q })?;
            let dists = self.scan(point, &[q])?;
            repairs.push((q, best_of(&dists)));
        }

        let repaired = repairs.len();
        for (q, best) in repairs {
            self.set_neighbor(q, best);
        }

        debug!(repaired, live = self.live, "closest-pair repaired stale neighbors");
        Ok(repaired)
    }

    /// The globally closest pair of live slots.
    ///
    /// Stale slots are repaired first, then the cache is scanned for the
    /// minimum distance; ties are broken by the lowest `(a, b)` slot pair.
    /// The winning pair's distance is re-evaluated before it is returned; if
    /// it disagrees with the cache (a distance function that is not a pure
    /// function of its inputs), both slots' neighbors are recomputed and the
    /// cache is scanned again.
    ///
    /// # Errors
    ///
    /// - `AddcError::TooFewSlots` with fewer than two live slots
    /// - `AddcError::InvalidDistance` if the distance function misbehaves
    pub fn closest_pair(&mut self) -> AddcResult<ClosestPair> {
        if self.live < 2 {
            return Err(AddcError::TooFewSlots { live: self.live });
        }
        self.repair_stale()?;

        let (cached, a, b) = self
            .min_cached_pair()
            .ok_or(AddcError::TooFewSlots { live: self.live })?;
        let distance = self.pair_distance(a, b)?;
        if (distance - cached).abs() <= VERIFY_TOLERANCE * cached.abs().max(1.0) {
            return Ok(ClosestPair { a, b, distance });
        }

        warn!(
            a = %a,
            b = %b,
            cached,
            distance,
            "closest-pair cache disagrees with re-evaluated distance, repairing"
        );
        self.refresh_neighbor(a)?;
        self.refresh_neighbor(b)?;

        let (_, a, b) = self
            .min_cached_pair()
            .ok_or(AddcError::TooFewSlots { live: self.live })?;
        let distance = self.pair_distance(a, b)?;
        Ok(ClosestPair { a, b, distance })
    }

    // -------------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------------

    #[inline]
    fn entry(&self, slot: SlotId) -> Option<&Entry> {
        self.entries.get(slot.index()).and_then(Option::as_ref)
    }

    #[inline]
    fn entry_mut(&mut self, slot: SlotId) -> Option<&mut Entry> {
        self.entries.get_mut(slot.index()).and_then(Option::as_mut)
    }

    #[inline]
    fn count_evaluation(&self) {
        self.evaluations.set(self.evaluations.get() + 1);
    }

    fn eval(&self, a: &[f64], b: &[f64]) -> AddcResult<f64> {
        self.count_evaluation();
        self.distance.checked(a, b)
    }

    /// Distances from `point` to every live slot not in `exclude`, slot order.
    fn scan(&self, point: &[f64], exclude: &[SlotId]) -> AddcResult<Vec<(SlotId, f64)>> {
        let mut out = Vec::with_capacity(self.live);
        for (slot, other) in self.iter() {
            if exclude.contains(&slot) {
                continue;
            }
            out.push((slot, self.eval(point, other)?));
        }
        Ok(out)
    }

    /// Overwrite a slot's cached neighbor with an exact result, clearing staleness.
    fn set_neighbor(&mut self, slot: SlotId, best: Option<(SlotId, f64)>) {
        let mut cleared = false;
        if let Some(entry) = self.entry_mut(slot) {
            entry.neighbor = best.map(|(n, _)| n);
            entry.neighbor_distance = best.map_or(f64::INFINITY, |(_, d)| d);
            if entry.stale {
                entry.stale = false;
                cleared = true;
            }
        }
        if cleared {
            self.stale -= 1;
        }
    }
}

impl ClosestPairIndex {
    /// Smallest cached neighbor distance as `(d, a, b)` with `a < b`;
    /// ties go to the lowest pair.
    fn min_cached_pair(&self) -> Option<(f64, SlotId, SlotId)> {
        let mut best: Option<(f64, SlotId, SlotId)> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            let Some(entry) = entry else { continue };
            let Some(neighbor) = entry.neighbor else {
                continue;
            };
            let slot = SlotId::new(i);
            let (a, b) = if slot < neighbor {
                (slot, neighbor)
            } else {
                (neighbor, slot)
            };
            let d = entry.neighbor_distance;
            let better = match best {
                None => true,
                Some((bd, ba, bb)) => d < bd || (d == bd && (a, b) < (ba, bb)),
            };
            if better {
                best = Some((d, a, b));
            }
        }
        best
    }

    fn pair_distance(&self, a: SlotId, b: SlotId) -> AddcResult<f64> {
        match (self.point(a), self.point(b)) {
            (Some(pa), Some(pb)) => self.eval(pa, pb),
            (None, _) => Err(AddcError::SlotNotLive { slot: a }),
            (_, None) => Err(AddcError::SlotNotLive { slot: b }),
        }
    }

    /// Recompute one slot's neighbor from scratch.
    fn refresh_neighbor(&mut self, slot: SlotId) -> AddcResult<()> {
        let point = self.point(slot).ok_or(AddcError::SlotNotLive { slot })?;
        let dists = self.scan(point, &[slot])?;
        self.set_neighbor(slot, best_of(&dists));
        Ok(())
    }
}

/// Minimum of a slot-ordered distance list; strict `<` keeps the lowest slot on ties.
fn best_of(dists: &[(SlotId, f64)]) -> Option<(SlotId, f64)> {
    let mut best: Option<(SlotId, f64)> = None;
    for &(slot, d) in dists {
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((slot, d)),
        }
    }
    best
}
