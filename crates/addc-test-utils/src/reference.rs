//! O(n²) reference models.
//!
//! These recompute everything from scratch on each step and share the
//! engine's tie rules (lowest slot, lowest `(a, b)` pair) and its arithmetic
//! for the weight-proportional step, so results can be compared exactly.

use addc_core::{Distance, SlotId};

/// Nearest entry to `point` among `(slot, coordinates)` pairs; ties go to the lower slot.
pub fn brute_force_nearest(entries: &[(SlotId, Vec<f64>)], point: &[f64], distance: &Distance) -> Option<(SlotId, f64)> {
    let mut best: Option<(SlotId, f64)> = None;
    let mut sorted: Vec<&(SlotId, Vec<f64>)> = entries.iter().collect();
    sorted.sort_by_key(|(slot, _)| *slot);
    for (slot, center) in sorted {
        let d = distance.evaluate(point, center);
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((*slot, d)),
        }
    }
    best
}

/// Closest pair among `(slot, coordinates)` pairs as `(a, b, distance)` with `a < b`.
///
/// Ties are broken by the lowest `(a, b)`.
pub fn brute_force_closest_pair(
    entries: &[(SlotId, Vec<f64>)],
    distance: &Distance,
) -> Option<(SlotId, SlotId, f64)> {
    let mut sorted: Vec<&(SlotId, Vec<f64>)> = entries.iter().collect();
    sorted.sort_by_key(|(slot, _)| *slot);

    let mut best: Option<(SlotId, SlotId, f64)> = None;
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            let d = distance.evaluate(&sorted[i].1, &sorted[j].1);
            match best {
                Some((_, _, bd)) if d >= bd => {}
                _ => best = Some((sorted[i].0, sorted[j].0, d)),
            }
        }
    }
    best
}

/// Brute-force AddC with the weight-proportional step rule.
#[derive(Debug, Clone)]
pub struct ReferenceClusterer {
    kmax: usize,
    distance: Distance,
    slots: Vec<Option<(Vec<f64>, u64)>>,
    npoints: u64,
}

impl ReferenceClusterer {
    /// Empty model holding at most `kmax` centroids.
    pub fn new(kmax: usize, distance: Distance) -> Self {
        Self {
            kmax,
            distance,
            slots: Vec::with_capacity(kmax),
            npoints: 0,
        }
    }

    /// Number of points ingested.
    pub fn npoints(&self) -> u64 {
        self.npoints
    }

    /// Live centroids in slot order as `(slot, center, weight)`.
    pub fn centroids(&self) -> Vec<(SlotId, Vec<f64>, u64)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|(c, w)| (SlotId::new(i), c.clone(), *w)))
            .collect()
    }

    /// Insert while filling; otherwise attract, merge the closest pair into
    /// its lower slot, and seed the freed slot with `point`.
    ///
    /// # Panics
    ///
    /// Panics if `kmax < 2`, since the merge step then has no pair.
    pub fn ingest(&mut self, point: &[f64]) {
        self.npoints += 1;

        if self.slots.len() < self.kmax {
            self.slots.push(Some((point.to_vec(), 1)));
            return;
        }

        let entries = self.entries();
        let (nearest, _) = brute_force_nearest(&entries, point, &self.distance)
            .expect("saturated reference has centroids");
        if let Some((center, weight)) = self.slots[nearest.index()].as_mut() {
            let w = *weight as f64;
            let total = w + 1.0;
            *center = center
                .iter()
                .zip(point)
                .map(|(c, p)| (w * c + p) / total)
                .collect();
            *weight += 1;
        }

        let entries = self.entries();
        let (a, b, _) = brute_force_closest_pair(&entries, &self.distance)
            .expect("kmax >= 2 leaves a pair");
        let (center_b, weight_b) = self.slots[b.index()]
            .take()
            .expect("closest pair slots are live");
        if let Some((center_a, weight_a)) = self.slots[a.index()].as_mut() {
            let (ma, mb) = (*weight_a as f64, weight_b as f64);
            let total = ma + mb;
            *center_a = center_a
                .iter()
                .zip(&center_b)
                .map(|(x, y)| (ma * x + mb * y) / total)
                .collect();
            *weight_a += weight_b;
        }

        self.slots[b.index()] = Some((point.to_vec(), 1));
    }

    fn entries(&self) -> Vec<(SlotId, Vec<f64>)> {
        self.centroids()
            .into_iter()
            .map(|(slot, center, _)| (slot, center))
            .collect()
    }
}
