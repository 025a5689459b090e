//! Probabilistic models built from named sample sites.
//!
//! Models are written against [`SampleContext`] and can be run forward
//! for prior draws, replayed at given latent values, or turned into an
//! unnormalized log density with [`ModelLogp`] for use with a
//! Hamiltonian sampler.

pub(crate) mod context;
pub(crate) mod distributions;
pub(crate) mod model;
pub mod models;
pub(crate) mod potential;
pub(crate) mod predictive;
pub(crate) mod storage;
pub(crate) mod trace;

pub use context::{PriorDraws, Replay, SampleContext, Substitute, Tracer, ValueSource};
pub use distributions::{Dist, DistError, Support};
pub use model::{trace_prior, trace_replay, Model, ModelError};
pub use potential::{
    CpuLogpFunc, GradientSettings, LatentBlock, LogpError, ModelLogp, ModelLogpError,
};
pub use predictive::{sample_posterior_predictive, sample_prior_predictive, PredictiveSettings};
pub use storage::{ChainStorage, HashMapChainStorage, HashMapResult, SiteColumn};
pub use trace::{Plate, Site, SiteKind, Trace};
