//! Configuration for the online clustering engine.
//!
//! Configuration is plain serde data so it can come from code, a TOML file,
//! or layered file + environment sources:
//!
//! ```toml
//! kmax = 50
//! repair_policy = "lazy"
//! check_symmetry = true
//!
//! [distance]
//! type = "euclidean"
//!
//! [step_policy]
//! type = "weight_proportional"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::centroid::StepPolicy;
use crate::closest_pair::RepairPolicy;
use crate::error::{AddcError, AddcResult};
use crate::kernel::{Distance, Kernel};

/// Default maximum number of centroids.
pub const DEFAULT_KMAX: usize = 100;

/// Smallest usable `kmax`: the merge step needs two centroids.
pub const MIN_KMAX: usize = 2;

/// Environment variable prefix used by [`AddcConfig::load`].
pub const ENV_PREFIX: &str = "ADDC";

/// Serializable choice of distance function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistanceConfig {
    /// Euclidean distance.
    Euclidean,
    /// Squared Euclidean distance.
    SqEuclidean,
    /// Kernel-induced distance.
    Kernel {
        /// Kernel inducing the distance.
        kernel: Kernel,
    },
}

impl Default for DistanceConfig {
    /// Gaussian kernel-induced distance with σ = 1.
    fn default() -> Self {
        DistanceConfig::Kernel {
            kernel: Kernel::default(),
        }
    }
}

impl DistanceConfig {
    /// Validate kernel parameters, if any.
    pub fn validate(&self) -> AddcResult<()> {
        match self {
            DistanceConfig::Kernel { kernel } => kernel.validate(),
            _ => Ok(()),
        }
    }

    /// Build the distance oracle.
    pub fn build(&self) -> Distance {
        match *self {
            DistanceConfig::Euclidean => Distance::euclidean(),
            DistanceConfig::SqEuclidean => Distance::sq_euclidean(),
            DistanceConfig::Kernel { kernel } => Distance::kernel_induced(kernel),
        }
    }
}

/// Engine configuration.
///
/// # Example
///
/// ```
/// use addc_core::config::{AddcConfig, DistanceConfig};
///
/// let config = AddcConfig::new(8).with_distance(DistanceConfig::Euclidean);
/// assert!(config.validate().is_ok());
/// assert!(AddcConfig::new(1).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddcConfig {
    /// Maximum number of centroids (>= 2).
    pub kmax: usize,
    /// Distance between points and centroids.
    pub distance: DistanceConfig,
    /// Attract / merge step rule.
    pub step_policy: StepPolicy,
    /// When the closest-pair index repairs invalidated neighbors.
    pub repair_policy: RepairPolicy,
    /// Probe the distance function for asymmetry on every index insert.
    pub check_symmetry: bool,
}

impl Default for AddcConfig {
    fn default() -> Self {
        Self {
            kmax: DEFAULT_KMAX,
            distance: DistanceConfig::default(),
            step_policy: StepPolicy::default(),
            repair_policy: RepairPolicy::default(),
            check_symmetry: true,
        }
    }
}

impl AddcConfig {
    /// Defaults with the given capacity.
    ///
    /// Values are NOT validated here - call validate() to check.
    pub fn new(kmax: usize) -> Self {
        Self {
            kmax,
            ..Self::default()
        }
    }

    /// Set the capacity.
    #[must_use]
    pub fn with_kmax(mut self, kmax: usize) -> Self {
        self.kmax = kmax;
        self
    }

    /// Set the distance function.
    #[must_use]
    pub fn with_distance(mut self, distance: DistanceConfig) -> Self {
        self.distance = distance;
        self
    }

    /// Set the step policy.
    #[must_use]
    pub fn with_step_policy(mut self, policy: StepPolicy) -> Self {
        self.step_policy = policy;
        self
    }

    /// Set the repair policy.
    #[must_use]
    pub fn with_repair_policy(mut self, policy: RepairPolicy) -> Self {
        self.repair_policy = policy;
        self
    }

    /// Enable or disable the symmetry probe.
    #[must_use]
    pub fn with_symmetry_check(mut self, enabled: bool) -> Self {
        self.check_symmetry = enabled;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `AddcError::InvalidConfig` if:
    /// - kmax < 2
    /// - kernel parameters are invalid
    /// - the step policy is invalid
    pub fn validate(&self) -> AddcResult<()> {
        if self.kmax < MIN_KMAX {
            return Err(AddcError::invalid_config(format!(
                "kmax must be >= {}, got {}. The merge step needs two centroids.",
                MIN_KMAX, self.kmax
            )));
        }
        self.distance.validate()?;
        self.step_policy.validate()?;
        Ok(())
    }

    /// Load configuration from files and environment.
    ///
    /// Sources, later overriding earlier:
    /// 1. `config/addc.{toml,json,...}` (optional)
    /// 2. Environment variables prefixed `ADDC__`, e.g. `ADDC__KMAX=50`
    pub fn load() -> AddcResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/addc").required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AddcConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> AddcResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AddcError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> AddcResult<Self> {
        let config: AddcConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}
