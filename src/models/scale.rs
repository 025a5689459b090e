use crate::context::SampleContext;
use crate::distributions::Dist;
use crate::model::{Model, ModelError};

/// Prior guess for the unknown weight if none is given.
pub const DEFAULT_GUESS: f64 = 8.5;

/// Measure an object of unknown weight on a noisy scale.
///
/// Registers `weight ~ Normal(guess, 1)` and
/// `measurement ~ Normal(weight, 1)` observed at `obs`, and returns the
/// measurement.
pub fn conditioned_scale<C: SampleContext + ?Sized>(
    ctx: &mut C,
    obs: Option<f64>,
    guess: f64,
) -> Result<f64, ModelError> {
    let weight = ctx.sample("weight", Dist::normal(guess, 1.)?, None)?;
    ctx.sample("measurement", Dist::normal(weight, 1.)?, obs)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionedScale {
    pub guess: f64,
    pub obs: Option<f64>,
}

impl ConditionedScale {
    pub fn new(obs: Option<f64>) -> Self {
        ConditionedScale {
            guess: DEFAULT_GUESS,
            obs,
        }
    }

    pub fn with_guess(self, guess: f64) -> Self {
        ConditionedScale { guess, ..self }
    }
}

impl Default for ConditionedScale {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Model for ConditionedScale {
    type Output = f64;

    fn run<C: SampleContext + ?Sized>(&self, ctx: &mut C) -> Result<f64, ModelError> {
        conditioned_scale(ctx, self.obs, self.guess)
    }
}
