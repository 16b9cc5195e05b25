//! Test support for the addc crates.
//!
//! - [`points`]: seeded point-stream generators (uniform, gaussian blobs, drift)
//! - [`reference`]: O(n²) reference models to check the indexed engine against

pub mod points;
pub mod reference;

pub use points::{
    drifting_stream, gaussian_blobs, seeded_rng, uniform_points, BlobStream,
};
pub use reference::{brute_force_closest_pair, brute_force_nearest, ReferenceClusterer};
