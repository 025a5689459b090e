use std::collections::HashMap;

use itertools::izip;

use crate::distributions::Dist;
use crate::model::ModelError;

/// A named batch of conditionally independent sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plate {
    name: String,
    size: usize,
}

impl Plate {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Plate {
            name: name.into(),
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    /// Drawn from its distribution, or replayed from given values.
    Latent,
    /// Fixed to an observation and only contributes to the likelihood.
    Observed,
    /// A function of other sites, recorded for inspection.
    Deterministic,
}

/// One random variable registered during a model evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub(crate) name: String,
    pub(crate) kind: SiteKind,
    pub(crate) dists: Vec<Dist>,
    pub(crate) value: Box<[f64]>,
    pub(crate) plate: Option<Plate>,
}

impl Site {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SiteKind {
        self.kind
    }

    pub fn is_observed(&self) -> bool {
        self.kind == SiteKind::Observed
    }

    /// One distribution per value. Empty for deterministic sites.
    pub fn dists(&self) -> &[Dist] {
        &self.dists
    }

    pub fn value(&self) -> &[f64] {
        &self.value
    }

    pub fn plate(&self) -> Option<&Plate> {
        self.plate.as_ref()
    }

    /// Sum of the log densities of all values of this site.
    pub fn log_prob(&self) -> f64 {
        izip!(self.dists.iter(), self.value.iter())
            .map(|(dist, &x)| dist.log_prob(x))
            .sum()
    }
}

/// The sites of one model evaluation, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    sites: Vec<Site>,
    index: HashMap<String, usize>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, site: Site) -> Result<(), ModelError> {
        if self.index.contains_key(&site.name) {
            return Err(ModelError::DuplicateSite(site.name));
        }
        self.index.insert(site.name.clone(), self.sites.len());
        self.sites.push(site);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Site> {
        self.index.get(name).map(|&idx| &self.sites[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().map(|site| site.name.as_str())
    }

    pub fn latent_sites(&self) -> impl Iterator<Item = &Site> {
        self.sites
            .iter()
            .filter(|site| site.kind == SiteKind::Latent)
    }

    pub fn observed_sites(&self) -> impl Iterator<Item = &Site> {
        self.sites
            .iter()
            .filter(|site| site.kind == SiteKind::Observed)
    }

    /// Joint log density of latent and observed sites.
    pub fn log_prob_sum(&self) -> f64 {
        self.sites.iter().map(Site::log_prob).sum()
    }

    /// Log likelihood of the observed sites alone.
    pub fn log_likelihood(&self) -> f64 {
        self.observed_sites().map(Site::log_prob).sum()
    }

    /// Values of the latent sites, keyed by name.
    pub fn latent_values(&self) -> HashMap<String, Box<[f64]>> {
        self.latent_sites()
            .map(|site| (site.name.clone(), site.value.clone()))
            .collect()
    }

    /// Values of all sites, keyed by name.
    pub fn values(&self) -> HashMap<String, Box<[f64]>> {
        self.sites
            .iter()
            .map(|site| (site.name.clone(), site.value.clone()))
            .collect()
    }
}
