use std::{collections::HashMap, error::Error, fmt::Debug};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::distributions::Support;
use crate::model::{trace_prior, trace_replay, Model, ModelError};
use crate::trace::Trace;

pub trait LogpError: Error {
    /// Unrecoverable errors during logp computation stop sampling,
    /// recoverable errors are seen as divergences.
    fn is_recoverable(&self) -> bool;
}

/// An unnormalized log density on an unconstrained space, together with
/// its gradient. This is the interface Hamiltonian samplers consume.
pub trait CpuLogpFunc {
    type LogpError: Debug + Send + Sync + Error + LogpError + 'static;

    fn dim(&self) -> usize;
    fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, Self::LogpError>;
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModelLogpError {
    #[error("Could not evaluate the model")]
    Model(#[from] ModelError),
    #[error("Position has length {found} but the model has {expected} latent values")]
    Dimension { expected: usize, found: usize },
    #[error("Log density is not finite: {0}")]
    NonFinite(f64),
}

impl LogpError for ModelLogpError {
    fn is_recoverable(&self) -> bool {
        // Extreme positions can push scales to zero or infinity.
        matches!(
            self,
            ModelLogpError::NonFinite(_) | ModelLogpError::Model(ModelError::Distribution(_))
        )
    }
}

/// Settings for the finite difference gradient of [`ModelLogp`].
#[derive(Debug, Clone, Copy)]
pub struct GradientSettings {
    /// Relative step size of the central differences.
    pub step: f64,
    /// Seed of the prior draw used to discover the latent sites.
    pub layout_seed: u64,
}

impl Default for GradientSettings {
    fn default() -> Self {
        Self {
            step: 1e-5,
            layout_seed: 0,
        }
    }
}

/// Where the values of one latent site live in the position vector.
#[derive(Debug, Clone, PartialEq)]
pub struct LatentBlock {
    pub name: String,
    pub offset: usize,
    pub len: usize,
}

/// The joint log density of a model as a function of its latent values.
///
/// Latent sites are laid out in registration order. Values with positive
/// support are represented by their logarithm and the log density
/// includes the Jacobian of that transformation, so every position in
/// `R^dim` is valid.
#[derive(Debug)]
pub struct ModelLogp<M> {
    model: M,
    blocks: Vec<LatentBlock>,
    supports: Vec<Support>,
    settings: GradientSettings,
    scratch: Vec<f64>,
}

impl<M: Model> ModelLogp<M> {
    pub fn new(model: M) -> Result<Self, ModelError> {
        Self::with_settings(model, GradientSettings::default())
    }

    pub fn with_settings(model: M, settings: GradientSettings) -> Result<Self, ModelError> {
        let mut rng = ChaCha8Rng::seed_from_u64(settings.layout_seed);
        let (_, trace) = trace_prior(&model, &mut rng)?;

        let mut blocks = Vec::new();
        let mut supports = Vec::new();
        for site in trace.latent_sites() {
            blocks.push(LatentBlock {
                name: site.name().to_string(),
                offset: supports.len(),
                len: site.value().len(),
            });
            supports.extend(site.dists().iter().map(|dist| dist.support()));
        }
        debug!(
            dim = supports.len(),
            sites = blocks.len(),
            "discovered latent layout"
        );

        Ok(ModelLogp {
            model,
            blocks,
            supports,
            settings,
            scratch: Vec::new(),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn blocks(&self) -> &[LatentBlock] {
        &self.blocks
    }

    fn check_dim(&self, position: &[f64]) -> Result<(), ModelLogpError> {
        if position.len() != self.supports.len() {
            return Err(ModelLogpError::Dimension {
                expected: self.supports.len(),
                found: position.len(),
            });
        }
        Ok(())
    }

    /// Map an unconstrained position to site values and the log Jacobian
    /// determinant of that map.
    pub fn constrain(
        &self,
        position: &[f64],
    ) -> Result<(HashMap<String, Box<[f64]>>, f64), ModelLogpError> {
        self.check_dim(position)?;
        let mut log_det = 0f64;
        let values: HashMap<_, _> = self
            .blocks
            .iter()
            .map(|block| {
                let range = block.offset..block.offset + block.len;
                let value: Box<[f64]> = position[range.clone()]
                    .iter()
                    .zip(&self.supports[range])
                    .map(|(&x, support)| match support {
                        Support::Real => x,
                        Support::Positive => {
                            log_det += x;
                            x.exp()
                        }
                    })
                    .collect();
                (block.name.clone(), value)
            })
            .collect();
        Ok((values, log_det))
    }

    /// Inverse of [`constrain`](Self::constrain).
    pub fn unconstrain(
        &self,
        values: &HashMap<String, Box<[f64]>>,
    ) -> Result<Box<[f64]>, ModelError> {
        let mut position = vec![0f64; self.supports.len()];
        for block in self.blocks.iter() {
            let value = values
                .get(&block.name)
                .ok_or_else(|| ModelError::MissingValue(block.name.clone()))?;
            if value.len() != block.len {
                return Err(ModelError::ShapeMismatch {
                    site: block.name.clone(),
                    expected: block.len,
                    found: value.len(),
                });
            }
            let range = block.offset..block.offset + block.len;
            for ((out, &x), support) in position[range.clone()]
                .iter_mut()
                .zip(value.iter())
                .zip(&self.supports[range])
            {
                *out = match support {
                    Support::Real if x.is_finite() => x,
                    Support::Positive if x.is_finite() && x > 0f64 => x.ln(),
                    _ => {
                        return Err(ModelError::OutsideSupport {
                            site: block.name.clone(),
                            value: x,
                        })
                    }
                };
            }
        }
        Ok(position.into())
    }

    /// Run the model at `position` and return the full trace, including
    /// deterministic sites.
    pub fn trace_at(&self, position: &[f64]) -> Result<Trace, ModelLogpError> {
        let (values, _) = self.constrain(position)?;
        let (_, trace) = trace_replay(&self.model, &values)?;
        Ok(trace)
    }

    /// Joint log density at an unconstrained position.
    pub fn log_density(&self, position: &[f64]) -> Result<f64, ModelLogpError> {
        let (values, log_det) = self.constrain(position)?;
        let (_, trace) = trace_replay(&self.model, &values)?;
        let logp = trace.log_prob_sum() + log_det;
        if !logp.is_finite() {
            return Err(ModelLogpError::NonFinite(logp));
        }
        Ok(logp)
    }

    /// Unconstrained position of a fresh prior draw.
    pub fn initial_position(&self, seed: u64) -> Result<Box<[f64]>, ModelError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (_, trace) = trace_prior(&self.model, &mut rng)?;
        self.unconstrain(&trace.latent_values())
    }
}

impl<M: Model> CpuLogpFunc for ModelLogp<M> {
    type LogpError = ModelLogpError;

    fn dim(&self) -> usize {
        self.supports.len()
    }

    fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, ModelLogpError> {
        self.check_dim(position)?;
        if gradient.len() != position.len() {
            return Err(ModelLogpError::Dimension {
                expected: position.len(),
                found: gradient.len(),
            });
        }
        let logp = self.log_density(position)?;

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.extend_from_slice(position);
        let result = (0..position.len()).try_for_each(|i| {
            let x = position[i];
            let h = self.settings.step * x.abs().max(1f64);
            scratch[i] = x + h;
            let upper = self.log_density(&scratch)?;
            scratch[i] = x - h;
            let lower = self.log_density(&scratch)?;
            scratch[i] = x;
            gradient[i] = (upper - lower) / (2f64 * h);
            Ok::<_, ModelLogpError>(())
        });
        self.scratch = scratch;

        if let Err(err) = &result {
            if err.is_recoverable() {
                warn!(%err, "log density gradient failed near position");
            }
        }
        result.map(|()| logp)
    }
}
