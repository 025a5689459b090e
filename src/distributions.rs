use std::f64::consts::{FRAC_PI_2, PI};

use rand::{distr::Open01, Rng};
use rand_distr::StandardNormal;
use thiserror::Error;

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// The set of values a distribution puts mass on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Real,
    /// `[0, inf)`. Latent sites with this support are sampled on the log scale.
    Positive,
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistError {
    #[error("Location parameter must be finite, got {0}")]
    InvalidLocation(f64),
    #[error("Scale parameter must be finite and positive, got {0}")]
    InvalidScale(f64),
}

/// Univariate distributions that can be attached to a sample site.
///
/// Constructors validate the parameters, so every value of this type
/// has a well defined density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dist {
    Normal { loc: f64, scale: f64 },
    HalfCauchy { scale: f64 },
}

fn check_scale(scale: f64) -> Result<f64, DistError> {
    if scale.is_finite() && scale > 0f64 {
        Ok(scale)
    } else {
        Err(DistError::InvalidScale(scale))
    }
}

impl Dist {
    pub fn normal(loc: f64, scale: f64) -> Result<Self, DistError> {
        if !loc.is_finite() {
            return Err(DistError::InvalidLocation(loc));
        }
        let scale = check_scale(scale)?;
        Ok(Dist::Normal { loc, scale })
    }

    pub fn half_cauchy(scale: f64) -> Result<Self, DistError> {
        Ok(Dist::HalfCauchy {
            scale: check_scale(scale)?,
        })
    }

    pub fn support(&self) -> Support {
        match self {
            Dist::Normal { .. } => Support::Real,
            Dist::HalfCauchy { .. } => Support::Positive,
        }
    }

    /// Normalized log density at `x`, `-inf` outside of the support.
    pub fn log_prob(&self, x: f64) -> f64 {
        match *self {
            Dist::Normal { loc, scale } => normal_log_prob(x, loc, scale),
            Dist::HalfCauchy { scale } => {
                if x < 0f64 {
                    return f64::NEG_INFINITY;
                }
                let z = x / scale;
                (2f64 / PI).ln() - scale.ln() - z.mul_add(z, 1f64).ln()
            }
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Dist::Normal { loc, scale } => {
                let z: f64 = rng.sample(StandardNormal);
                scale.mul_add(z, loc)
            }
            Dist::HalfCauchy { scale } => {
                // Inverse cdf of the half-Cauchy.
                let u: f64 = rng.sample(Open01);
                scale * (FRAC_PI_2 * u).tan()
            }
        }
    }

    /// The mean, if it exists.
    pub fn mean(&self) -> Option<f64> {
        match *self {
            Dist::Normal { loc, .. } => Some(loc),
            Dist::HalfCauchy { .. } => None,
        }
    }
}

fn normal_log_prob(x: f64, loc: f64, scale: f64) -> f64 {
    let z = (x - loc) / scale;
    -0.5 * z * z - scale.ln() - LN_SQRT_2PI
}
