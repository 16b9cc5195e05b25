//! Distance oracle adapters and the kernel registry.
//!
//! The clustering core only ever sees a [`Distance`]: a named, cloneable,
//! stateless function value over two coordinate slices. This module provides
//! the plain metrics (Euclidean, squared Euclidean), the kernel-induced
//! distance
//!
//! ```text
//! d(x, y) = K(x, x) - 2 K(x, y) + K(y, y)
//! ```
//!
//! over a registry of common kernels, and an escape hatch for caller closures.
//!
//! # Example
//!
//! ```
//! use addc_core::kernel::{Distance, Kernel};
//!
//! let euclid = Distance::euclidean();
//! assert_eq!(euclid.evaluate(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
//!
//! let gauss = Distance::kernel_induced(Kernel::Gaussian { sigma: 1.0 });
//! assert!(gauss.evaluate(&[0.0], &[0.0]).abs() < 1e-12);
//! ```

use std::f64::consts::{E, PI};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AddcError, AddcResult};

/// Signature of a caller-supplied distance function.
pub type DistanceFn = dyn Fn(&[f64], &[f64]) -> f64 + Send + Sync;

/// Relative tolerance for asymmetry and rounding checks.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Kernel-induced distances of identical points can round to tiny negatives.
const ROUNDING_TOLERANCE: f64 = 1e-12;

// =============================================================================
// Vector helpers
// =============================================================================

/// Inner product of two slices.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Squared Euclidean distance.
#[inline]
pub fn sq_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Euclidean distance.
#[inline]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    sq_euclidean(a, b).sqrt()
}

// =============================================================================
// Kernel
// =============================================================================

/// Kernel functions usable for kernel-induced distances and kernel step sizes.
///
/// Serialized with an internal `type` tag so configs read naturally:
///
/// ```toml
/// [distance]
/// type = "kernel"
/// kernel = { type = "gaussian", sigma = 0.5 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    /// `K(x, y) = x'y + c`
    Linear { c: f64 },
    /// `K(x, y) = (a x'y + c)^d`
    Polynomial { a: f64, c: f64, d: i32 },
    /// `K(x, y) = exp(-||x - y||^2 / 2σ^2)`
    Gaussian { sigma: f64 },
    /// `K(x, y) = exp(-||x - y|| / 2σ^2)`
    Exponential { sigma: f64 },
    /// `K(x, y) = exp(-||x - y|| / σ)`
    Laplacian { sigma: f64 },
    /// `K(x, y) = tanh(α x'y + c)`; α defaults to `1 / dim`. Not positive definite.
    Sigmoid { alpha: Option<f64>, c: f64 },
    /// `K(x, y) = 1 - ||x - y||^2 / (||x - y||^2 + c)`
    RationalQuadratic { c: f64 },
    /// `K(x, y) = sqrt(||x - y||^2 + c^2)`. Not positive definite.
    Multiquadric { c: f64 },
    /// `K(x, y) = 1 / sqrt(||x - y||^2 + c^2)`
    InverseMultiquadric { c: f64 },
    /// Circular kernel, zero beyond `||x - y|| >= σ`. Positive definite in R^2.
    Circular { sigma: f64 },
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Gaussian { sigma: 1.0 }
    }
}

impl Kernel {
    /// Registry names accepted by [`Kernel::from_name`].
    pub fn names() -> &'static [&'static str] {
        &[
            "linear",
            "polynomial",
            "gaussian",
            "exponential",
            "laplacian",
            "sigmoid",
            "rational_quadratic",
            "multiquadric",
            "inverse_multiquadric",
            "circular",
        ]
    }

    /// Look up a kernel by registry name with its default parameters.
    ///
    /// ```
    /// use addc_core::kernel::Kernel;
    ///
    /// assert_eq!(Kernel::from_name("gaussian"), Some(Kernel::Gaussian { sigma: 1.0 }));
    /// assert!(Kernel::from_name("banana").is_none());
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        let kernel = match name {
            "linear" => Kernel::Linear { c: 0.0 },
            "polynomial" | "poly" => Kernel::Polynomial { a: 1.0, c: 0.0, d: 2 },
            "gaussian" | "rbf" => Kernel::Gaussian { sigma: 1.0 },
            "exponential" => Kernel::Exponential { sigma: 1.0 },
            "laplacian" => Kernel::Laplacian { sigma: 1.0 },
            "sigmoid" | "tanh" => Kernel::Sigmoid { alpha: None, c: -E },
            "rational_quadratic" => Kernel::RationalQuadratic { c: 1.0 },
            "multiquadric" => Kernel::Multiquadric { c: 1.0 },
            "inverse_multiquadric" => Kernel::InverseMultiquadric { c: 1.0 },
            "circular" => Kernel::Circular { sigma: 1.0 },
            _ => return None,
        };
        Some(kernel)
    }

    /// Registry name of this kernel.
    pub fn name(&self) -> &'static str {
        match self {
            Kernel::Linear { .. } => "linear",
            Kernel::Polynomial { .. } => "polynomial",
            Kernel::Gaussian { .. } => "gaussian",
            Kernel::Exponential { .. } => "exponential",
            Kernel::Laplacian { .. } => "laplacian",
            Kernel::Sigmoid { .. } => "sigmoid",
            Kernel::RationalQuadratic { .. } => "rational_quadratic",
            Kernel::Multiquadric { .. } => "multiquadric",
            Kernel::InverseMultiquadric { .. } => "inverse_multiquadric",
            Kernel::Circular { .. } => "circular",
        }
    }

    /// Check kernel parameters.
    ///
    /// # Errors
    ///
    /// Returns `AddcError::InvalidConfig` for non-finite parameters, a
    /// non-positive bandwidth, or a zero polynomial slope.
    pub fn validate(&self) -> AddcResult<()> {
        let finite = |name: &str, v: f64| -> AddcResult<()> {
            if v.is_finite() {
                Ok(())
            } else {
                Err(AddcError::invalid_config(format!(
                    "{} kernel parameter {} must be finite, got {}",
                    self.name(),
                    name,
                    v
                )))
            }
        };
        let positive = |name: &str, v: f64| -> AddcResult<()> {
            finite(name, v)?;
            if v > 0.0 {
                Ok(())
            } else {
                Err(AddcError::invalid_config(format!(
                    "{} kernel parameter {} must be > 0, got {}",
                    self.name(),
                    name,
                    v
                )))
            }
        };

        match *self {
            Kernel::Linear { c } => finite("c", c),
            Kernel::Polynomial { a, c, d } => {
                finite("c", c)?;
                if a == 0.0 || !a.is_finite() {
                    return Err(AddcError::invalid_config(format!(
                        "polynomial kernel slope a must be finite and non-zero, got {}",
                        a
                    )));
                }
                if d < 1 {
                    return Err(AddcError::invalid_config(format!(
                        "polynomial kernel degree d must be >= 1, got {}",
                        d
                    )));
                }
                Ok(())
            }
            Kernel::Gaussian { sigma }
            | Kernel::Exponential { sigma }
            | Kernel::Laplacian { sigma }
            | Kernel::Circular { sigma } => positive("sigma", sigma),
            Kernel::Sigmoid { alpha, c } => {
                finite("c", c)?;
                match alpha {
                    Some(a) => finite("alpha", a),
                    None => Ok(()),
                }
            }
            Kernel::RationalQuadratic { c } => positive("c", c),
            Kernel::Multiquadric { c } => finite("c", c),
            Kernel::InverseMultiquadric { c } => positive("c", c),
        }
    }

    /// Evaluate `K(x, y)`.
    pub fn evaluate(&self, x: &[f64], y: &[f64]) -> f64 {
        match *self {
            Kernel::Linear { c } => dot(x, y) + c,
            Kernel::Polynomial { a, c, d } => (a * dot(x, y) + c).powi(d),
            Kernel::Gaussian { sigma } => (-sq_euclidean(x, y) / (2.0 * sigma * sigma)).exp(),
            Kernel::Exponential { sigma } => (-euclidean(x, y) / (2.0 * sigma * sigma)).exp(),
            Kernel::Laplacian { sigma } => (-euclidean(x, y) / sigma).exp(),
            Kernel::Sigmoid { alpha, c } => {
                let alpha = alpha.unwrap_or_else(|| 1.0 / x.len().max(1) as f64);
                (alpha * dot(x, y) + c).tanh()
            }
            Kernel::RationalQuadratic { c } => {
                let d = sq_euclidean(x, y);
                1.0 - d / (d + c)
            }
            Kernel::Multiquadric { c } => (sq_euclidean(x, y) + c * c).sqrt(),
            Kernel::InverseMultiquadric { c } => 1.0 / (sq_euclidean(x, y) + c * c).sqrt(),
            Kernel::Circular { sigma } => {
                let r = euclidean(x, y) / sigma;
                if r >= 1.0 {
                    0.0
                } else {
                    let pi2 = 2.0 / PI;
                    pi2 * r.acos() - pi2 * r * (1.0 - r * r).sqrt()
                }
            }
        }
    }
}

// =============================================================================
// Distance
// =============================================================================

/// The distance oracle: a named, stateless, swappable distance function.
///
/// Cloning is cheap (shared `Arc`). Implementations must be symmetric and
/// nonnegative; [`Distance::checked`] and [`Distance::check_symmetry`] catch
/// violations at the point of use.
#[derive(Clone)]
pub struct Distance {
    name: Arc<str>,
    func: Arc<DistanceFn>,
}

impl fmt::Debug for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Distance").field("name", &self.name).finish()
    }
}

impl Distance {
    /// Wrap a caller-supplied distance function.
    ///
    /// ```
    /// use addc_core::kernel::Distance;
    ///
    /// let manhattan = Distance::from_fn("manhattan", |a, b| {
    ///     a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
    /// });
    /// assert_eq!(manhattan.evaluate(&[0.0, 0.0], &[1.0, 2.0]), 3.0);
    /// assert_eq!(manhattan.name(), "manhattan");
    /// ```
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// Euclidean (L2) distance.
    pub fn euclidean() -> Self {
        Self::from_fn("euclidean", euclidean)
    }

    /// Squared Euclidean distance.
    pub fn sq_euclidean() -> Self {
        Self::from_fn("sq_euclidean", sq_euclidean)
    }

    /// Kernel-induced distance `K(x,x) - 2K(x,y) + K(y,y)`.
    ///
    /// The Gaussian kernel uses the shortcut `2 - 2K(x,y)` since `K(x,x) = 1`.
    /// Rounding residue below zero is flushed to zero; genuinely negative
    /// values (non positive-definite kernels) are left for
    /// [`Distance::checked`] to report.
    pub fn kernel_induced(kernel: Kernel) -> Self {
        let name = format!("kernel:{}", kernel.name());
        match kernel {
            Kernel::Gaussian { .. } => Self::from_fn(name, move |x, y| {
                let d = 2.0 - 2.0 * kernel.evaluate(x, y);
                flush_rounding(d, 2.0)
            }),
            _ => Self::from_fn(name, move |x, y| {
                let kxx = kernel.evaluate(x, x);
                let kyy = kernel.evaluate(y, y);
                let d = kxx - 2.0 * kernel.evaluate(x, y) + kyy;
                flush_rounding(d, kxx.abs() + kyy.abs())
            }),
        }
    }

    /// Name used in logs and error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate without validation.
    #[inline]
    pub fn evaluate(&self, a: &[f64], b: &[f64]) -> f64 {
        (self.func)(a, b)
    }

    /// Evaluate and reject NaN, infinite or negative results.
    ///
    /// # Errors
    ///
    /// Returns `AddcError::InvalidDistance` naming this distance function.
    pub fn checked(&self, a: &[f64], b: &[f64]) -> AddcResult<f64> {
        let d = self.evaluate(a, b);
        if d.is_nan() || d.is_infinite() {
            return Err(AddcError::invalid_distance(
                self.name(),
                format!("non-finite distance {}", d),
            ));
        }
        if d < 0.0 {
            return Err(AddcError::invalid_distance(
                self.name(),
                format!("negative distance {}", d),
            ));
        }
        Ok(d)
    }

    /// Compare an already computed `d(a, b)` against `d(b, a)`.
    ///
    /// # Errors
    ///
    /// Returns `AddcError::InvalidDistance` when the two directions disagree
    /// beyond a relative tolerance of 1e-9.
    pub fn check_symmetry(&self, a: &[f64], b: &[f64], forward: f64) -> AddcResult<()> {
        let backward = self.checked(b, a)?;
        let scale = forward.abs().max(backward.abs()).max(1.0);
        if (forward - backward).abs() > SYMMETRY_TOLERANCE * scale {
            return Err(AddcError::invalid_distance(
                self.name(),
                format!("asymmetric: d(a,b)={} but d(b,a)={}", forward, backward),
            ));
        }
        Ok(())
    }
}

impl Default for Distance {
    fn default() -> Self {
        Self::kernel_induced(Kernel::default())
    }
}

#[inline]
fn flush_rounding(d: f64, scale: f64) -> f64 {
    if d < 0.0 && d > -ROUNDING_TOLERANCE * (scale + 1.0) {
        0.0
    } else {
        d
    }
}
