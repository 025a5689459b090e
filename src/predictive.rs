use std::collections::HashMap;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::debug;

use crate::context::{Substitute, Tracer};
use crate::model::{trace_prior, Model};
use crate::storage::{ChainStorage, HashMapChainStorage, HashMapResult};
use crate::trace::Trace;

/// Settings for prior and posterior predictive sampling
#[derive(Debug, Clone, Copy)]
pub struct PredictiveSettings {
    /// The number of draws per chain
    pub num_draws: u64,
    /// Chains run in parallel, each with its own random stream.
    pub num_chains: usize,
    pub seed: u64,
}

impl Default for PredictiveSettings {
    fn default() -> Self {
        Self {
            num_draws: 1000,
            num_chains: 4,
            seed: 0,
        }
    }
}

fn stream_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Run the model forward `num_draws` times per chain, drawing every
/// latent site from its prior.
///
/// Observed sites keep their observations, so conditioned models yield
/// prior draws together with the log likelihood of the data.
pub fn sample_prior_predictive<M: Model>(
    model: &M,
    settings: &PredictiveSettings,
) -> Result<Vec<HashMapResult>> {
    (0..settings.num_chains as u64)
        .into_par_iter()
        .map(|chain| {
            debug!(chain, num_draws = settings.num_draws, "prior predictive chain");
            let mut rng = stream_rng(settings.seed, chain);
            let mut storage = HashMapChainStorage::new(chain);
            for draw in 0..settings.num_draws {
                let (_, trace) = trace_prior(model, &mut rng)
                    .with_context(|| format!("Prior draw {} of chain {} failed", draw, chain))?;
                storage.record_trace(&trace)?;
            }
            storage.finalize()
        })
        .collect()
}

/// Rerun the model once for each posterior draw, substituting the given
/// latent values and drawing all remaining sites.
///
/// Pass a model without observations to sample replicated data. Draw `i`
/// uses random stream `i` of `settings.seed`, so the result does not
/// depend on thread scheduling. `num_draws` and `num_chains` are ignored.
pub fn sample_posterior_predictive<M: Model>(
    model: &M,
    posterior: &[HashMap<String, Box<[f64]>>],
    settings: &PredictiveSettings,
) -> Result<HashMapResult> {
    debug!(num_draws = posterior.len(), "posterior predictive");
    let traces = posterior
        .par_iter()
        .enumerate()
        .map(|(idx, values)| {
            let rng = stream_rng(settings.seed, idx as u64);
            let mut tracer = Tracer::new(Substitute::new(values, rng));
            model
                .run(&mut tracer)
                .with_context(|| format!("Posterior predictive draw {} failed", idx))?;
            Ok(tracer.into_trace())
        })
        .collect::<Result<Vec<Trace>>>()?;

    let mut storage = HashMapChainStorage::new(0);
    for trace in traces.iter() {
        storage.record_trace(trace)?;
    }
    storage.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionedScale, EightSchools, EIGHT_SCHOOLS_SIGMA};
    use crate::trace::SiteKind;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn prior_predictive_is_reproducible() {
        let settings = PredictiveSettings {
            num_draws: 50,
            num_chains: 3,
            seed: 11,
        };
        let model = EightSchools::new(EIGHT_SCHOOLS_SIGMA.to_vec(), None);
        let first = sample_prior_predictive(&model, &settings).unwrap();
        let second = sample_prior_predictive(&model, &settings).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(first[1].chain, 1);
        assert_ne!(
            first[0].site("mu").unwrap().values,
            first[1].site("mu").unwrap().values
        );
        assert_eq!(first[0].site("obs").unwrap().kind, SiteKind::Latent);
    }

    #[test]
    fn prior_predictive_scale_moments() {
        let settings = PredictiveSettings {
            num_draws: 5000,
            num_chains: 2,
            seed: 0,
        };
        let results = sample_prior_predictive(&ConditionedScale::default(), &settings).unwrap();
        for result in results {
            // measurement ~ Normal(8.5, sqrt(2)) marginally
            let measurement = result.site("measurement").unwrap();
            assert_abs_diff_eq!(measurement.mean()[0], 8.5, epsilon = 0.1);
            assert!(result.log_likelihood.iter().all(|&ll| ll == 0.));
        }
    }

    #[test]
    fn posterior_predictive_substitutes_latents() {
        let posterior: Vec<_> = [1., 2., 3.]
            .iter()
            .map(|&w| HashMap::from([("weight".to_string(), vec![w].into_boxed_slice())]))
            .collect();
        let settings = PredictiveSettings::default();
        let result =
            sample_posterior_predictive(&ConditionedScale::default(), &posterior, &settings)
                .unwrap();
        assert_eq!(result.num_draws, 3);
        assert_eq!(result.site("weight").unwrap().values, vec![1., 2., 3.]);
        let again =
            sample_posterior_predictive(&ConditionedScale::default(), &posterior, &settings)
                .unwrap();
        assert_eq!(result, again);
    }
}
