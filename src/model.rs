use std::collections::HashMap;

use rand::Rng;
use thiserror::Error;

use crate::context::{PriorDraws, Replay, SampleContext, Tracer};
use crate::distributions::DistError;
use crate::trace::Trace;

/// Errors raised while a model registers its sites.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Sample site {0} was registered twice")]
    DuplicateSite(String),
    #[error("Invalid distribution parameters")]
    Distribution(#[from] DistError),
    #[error("Site {site} expected {expected} values but got {found}")]
    ShapeMismatch {
        site: String,
        expected: usize,
        found: usize,
    },
    #[error("No value to replay for latent site {0}")]
    MissingValue(String),
    #[error("Value {value} of site {site} is outside the support of its distribution")]
    OutsideSupport { site: String, value: f64 },
}

/// A generative model written against the sampling primitives of [`SampleContext`].
///
/// Running a model registers its sites with the context and returns the
/// value of the designated output. The same model can be run under prior
/// sampling, replay or conditioning by choosing the context.
pub trait Model: Send + Sync {
    type Output;

    fn run<C: SampleContext + ?Sized>(&self, ctx: &mut C) -> Result<Self::Output, ModelError>;
}

/// Run the model once with fresh draws for every latent site.
pub fn trace_prior<M: Model + ?Sized, R: Rng + ?Sized>(
    model: &M,
    rng: &mut R,
) -> Result<(M::Output, Trace), ModelError> {
    let mut tracer = Tracer::new(PriorDraws::new(rng));
    let output = model.run(&mut tracer)?;
    Ok((output, tracer.into_trace()))
}

/// Run the model with every latent site fixed to the given values.
pub fn trace_replay<M: Model + ?Sized>(
    model: &M,
    values: &HashMap<String, Box<[f64]>>,
) -> Result<(M::Output, Trace), ModelError> {
    let mut tracer = Tracer::new(Replay::new(values));
    let output = model.run(&mut tracer)?;
    Ok((output, tracer.into_trace()))
}
