use anyhow::{bail, Result};
use std::collections::HashMap;

use crate::trace::{SiteKind, Trace};

/// Values of one site collected over draws.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteColumn {
    pub kind: SiteKind,
    /// Number of values per draw, the plate size for plate sites.
    pub width: usize,
    /// Row major, one row per draw.
    pub values: Vec<f64>,
}

impl SiteColumn {
    fn new(kind: SiteKind, width: usize) -> Self {
        SiteColumn {
            kind,
            width,
            values: Vec::new(),
        }
    }

    pub fn num_draws(&self) -> usize {
        if self.width == 0 {
            return 0;
        }
        self.values.len() / self.width
    }

    pub fn draw(&self, idx: usize) -> Option<&[f64]> {
        let start = idx.checked_mul(self.width)?;
        self.values.get(start..start.checked_add(self.width)?)
    }

    pub fn draws(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.width.max(1))
    }

    /// Elementwise mean over all draws.
    pub fn mean(&self) -> Box<[f64]> {
        let n = self.num_draws();
        let mut mean = vec![0f64; self.width];
        for draw in self.draws() {
            mean.iter_mut().zip(draw).for_each(|(m, &x)| *m += x);
        }
        if n > 0 {
            mean.iter_mut().for_each(|m| *m /= n as f64);
        }
        mean.into()
    }
}

/// Collects the traces of a single chain.
pub trait ChainStorage: Send {
    type Finalized: Send + Sync + 'static;

    fn record_trace(&mut self, trace: &Trace) -> Result<()>;

    fn finalize(self) -> Result<Self::Finalized>;
}

/// Stores each site as a flat column in a HashMap
#[derive(Debug, Clone, Default)]
pub struct HashMapChainStorage {
    chain: u64,
    columns: HashMap<String, SiteColumn>,
    log_likelihood: Vec<f64>,
    num_draws: u64,
}

/// Collected draws of one chain
#[derive(Debug, Clone, PartialEq)]
pub struct HashMapResult {
    pub chain: u64,
    pub num_draws: u64,
    pub draws: HashMap<String, SiteColumn>,
    /// Log likelihood of the observed sites for each draw
    pub log_likelihood: Vec<f64>,
}

impl HashMapChainStorage {
    pub fn new(chain: u64) -> Self {
        Self {
            chain,
            ..Self::default()
        }
    }
}

impl ChainStorage for HashMapChainStorage {
    type Finalized = HashMapResult;

    fn record_trace(&mut self, trace: &Trace) -> Result<()> {
        if self.num_draws == 0 {
            self.columns = trace
                .iter()
                .map(|site| {
                    (
                        site.name().to_string(),
                        SiteColumn::new(site.kind(), site.value().len()),
                    )
                })
                .collect();
        }

        if trace.len() != self.columns.len() {
            bail!(
                "Trace has {} sites, but earlier draws had {}",
                trace.len(),
                self.columns.len()
            );
        }
        for site in trace.iter() {
            let Some(column) = self.columns.get_mut(site.name()) else {
                bail!("Unknown site name: {}", site.name());
            };
            if column.width != site.value().len() {
                bail!(
                    "Site {} has {} values, expected {}",
                    site.name(),
                    site.value().len(),
                    column.width
                );
            }
            column.values.extend_from_slice(site.value());
        }
        self.log_likelihood.push(trace.log_likelihood());
        self.num_draws += 1;
        Ok(())
    }

    fn finalize(self) -> Result<HashMapResult> {
        Ok(HashMapResult {
            chain: self.chain,
            num_draws: self.num_draws,
            draws: self.columns,
            log_likelihood: self.log_likelihood,
        })
    }
}

impl HashMapResult {
    pub fn site(&self, name: &str) -> Option<&SiteColumn> {
        self.draws.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::trace_prior;
    use crate::models::{ConditionedScale, EightSchools};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn collects_columns() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut storage = HashMapChainStorage::new(2);
        for _ in 0..5 {
            let (_, trace) = trace_prior(&EightSchools::default(), &mut rng).unwrap();
            storage.record_trace(&trace).unwrap();
        }
        let result = storage.finalize().unwrap();
        assert_eq!(result.chain, 2);
        assert_eq!(result.num_draws, 5);
        assert_eq!(result.log_likelihood.len(), 5);

        let theta = result.site("theta").unwrap();
        assert_eq!(theta.kind, SiteKind::Latent);
        assert_eq!(theta.width, 8);
        assert_eq!(theta.num_draws(), 5);
        assert_eq!(theta.draws().count(), 5);
        assert_eq!(theta.draw(4).unwrap().len(), 8);
        assert!(theta.draw(5).is_none());
        assert!(theta.draw(usize::MAX / 8).is_none());
        assert!(theta.draw(usize::MAX).is_none());

        let obs = result.site("obs").unwrap();
        assert_eq!(obs.kind, SiteKind::Observed);
        assert_eq!(obs.mean().len(), 8);
    }

    #[test]
    fn rejects_changing_sites() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut storage = HashMapChainStorage::new(0);
        let (_, trace) = trace_prior(&EightSchools::default(), &mut rng).unwrap();
        storage.record_trace(&trace).unwrap();
        let (_, trace) = trace_prior(&ConditionedScale::default(), &mut rng).unwrap();
        assert!(storage.record_trace(&trace).is_err());
    }
}
