//! AddC Core Library
//!
//! Online agglomerative clustering over a data stream with a bounded number
//! of centroids, backed by a dynamic closest-pair index.
//!
//! # Architecture
//!
//! This crate defines:
//! - Distance oracles and Mercer kernels (`Distance`, `Kernel`)
//! - A dynamic closest-pair index over sparse slots (`ClosestPairIndex`)
//! - Centroid step rules (`StepPolicy`, `Centroid`)
//! - The clustering engine (`OnlineClusterer`)
//! - Error types and result aliases
//! - Configuration structures
//!
//! # Example
//!
//! ```
//! use addc_core::{AddcConfig, OnlineClusterer};
//!
//! let mut addc = OnlineClusterer::new(AddcConfig::new(3)).unwrap();
//! addc.batch([[0.0, 0.0], [0.1, 0.0], [5.0, 5.0], [5.1, 5.0]]).unwrap();
//!
//! assert_eq!(addc.len(), 3);
//! assert_eq!(addc.npoints(), 4);
//! let heavy = addc.trim(0.5).unwrap();
//! assert!(!heavy.is_empty());
//! ```

pub mod centroid;
pub mod closest_pair;
pub mod config;
pub mod engine;
pub mod error;
pub mod kernel;

// Re-exports for convenience
pub use centroid::{Centroid, StepPolicy};
pub use closest_pair::{ClosestPair, ClosestPairIndex, RepairPolicy, SlotId};
pub use config::{AddcConfig, DistanceConfig};
pub use engine::{IngestReport, MergeEvent, OnlineClusterer, Phase, TrimPolicy};
pub use error::{AddcError, AddcResult};
pub use kernel::{Distance, DistanceFn, Kernel};
