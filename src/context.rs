use std::collections::HashMap;

use rand::Rng;
use tracing::trace;

use crate::distributions::Dist;
use crate::model::ModelError;
use crate::trace::{Plate, Site, SiteKind, Trace};

/// The sampling primitives models are written against.
///
/// Implementations decide where latent values come from and what is
/// recorded about each site.
pub trait SampleContext {
    /// Register a site with one distribution per value.
    ///
    /// If `obs` is given the site is observed and takes that value.
    fn sample_site(
        &mut self,
        name: &str,
        dists: &[Dist],
        plate: Option<&Plate>,
        obs: Option<&[f64]>,
    ) -> Result<Box<[f64]>, ModelError>;

    /// Record a value computed from other sites.
    fn deterministic(
        &mut self,
        name: &str,
        value: &[f64],
        plate: Option<&Plate>,
    ) -> Result<(), ModelError>;

    /// Register a scalar site.
    fn sample(&mut self, name: &str, dist: Dist, obs: Option<f64>) -> Result<f64, ModelError> {
        let obs = obs.map(|val| [val]);
        let value = self.sample_site(name, &[dist], None, obs.as_ref().map(|val| &val[..]))?;
        value
            .first()
            .copied()
            .ok_or_else(|| ModelError::ShapeMismatch {
                site: name.to_string(),
                expected: 1,
                found: 0,
            })
    }

    /// Register one value per member of `plate`.
    fn plate_sample(
        &mut self,
        name: &str,
        plate: &Plate,
        dists: &[Dist],
        obs: Option<&[f64]>,
    ) -> Result<Box<[f64]>, ModelError> {
        self.sample_site(name, dists, Some(plate), obs)
    }
}

/// Supplies the values of latent sites.
pub trait ValueSource {
    fn latent_value(&mut self, name: &str, dists: &[Dist]) -> Result<Box<[f64]>, ModelError>;
}

/// Draw every latent value from its distribution.
#[derive(Debug)]
pub struct PriorDraws<R> {
    rng: R,
}

impl<R: Rng> PriorDraws<R> {
    pub fn new(rng: R) -> Self {
        PriorDraws { rng }
    }
}

impl<R: Rng> ValueSource for PriorDraws<R> {
    fn latent_value(&mut self, _name: &str, dists: &[Dist]) -> Result<Box<[f64]>, ModelError> {
        Ok(dists.iter().map(|dist| dist.sample(&mut self.rng)).collect())
    }
}

/// Take every latent value from a map, failing on missing sites.
#[derive(Debug, Clone, Copy)]
pub struct Replay<'a> {
    values: &'a HashMap<String, Box<[f64]>>,
}

impl<'a> Replay<'a> {
    pub fn new(values: &'a HashMap<String, Box<[f64]>>) -> Self {
        Replay { values }
    }
}

impl ValueSource for Replay<'_> {
    fn latent_value(&mut self, name: &str, _dists: &[Dist]) -> Result<Box<[f64]>, ModelError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::MissingValue(name.to_string()))
    }
}

/// Take latent values from a map where present and draw the rest.
#[derive(Debug)]
pub struct Substitute<'a, R> {
    values: &'a HashMap<String, Box<[f64]>>,
    rng: R,
}

impl<'a, R: Rng> Substitute<'a, R> {
    pub fn new(values: &'a HashMap<String, Box<[f64]>>, rng: R) -> Self {
        Substitute { values, rng }
    }
}

impl<R: Rng> ValueSource for Substitute<'_, R> {
    fn latent_value(&mut self, name: &str, dists: &[Dist]) -> Result<Box<[f64]>, ModelError> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        Ok(dists.iter().map(|dist| dist.sample(&mut self.rng)).collect())
    }
}

/// Records every registered site into a [`Trace`].
///
/// Observations passed to `sample` take precedence over conditioning
/// data, which in turn takes precedence over the value source.
#[derive(Debug)]
pub struct Tracer<S> {
    source: S,
    data: HashMap<String, Box<[f64]>>,
    trace: Trace,
}

impl<S: ValueSource> Tracer<S> {
    pub fn new(source: S) -> Self {
        Tracer {
            source,
            data: HashMap::new(),
            trace: Trace::new(),
        }
    }

    /// Treat the named sites as observed with the given values.
    pub fn condition(mut self, data: HashMap<String, Box<[f64]>>) -> Self {
        self.data.extend(data);
        self
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn into_trace(self) -> Trace {
        self.trace
    }
}

fn check_len(site: &str, expected: usize, found: usize) -> Result<(), ModelError> {
    if expected != found {
        return Err(ModelError::ShapeMismatch {
            site: site.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

impl<S: ValueSource> SampleContext for Tracer<S> {
    fn sample_site(
        &mut self,
        name: &str,
        dists: &[Dist],
        plate: Option<&Plate>,
        obs: Option<&[f64]>,
    ) -> Result<Box<[f64]>, ModelError> {
        if self.trace.contains(name) {
            return Err(ModelError::DuplicateSite(name.to_string()));
        }
        let size = plate.map(Plate::size).unwrap_or(1);
        check_len(name, size, dists.len())?;

        let observed = obs.or_else(|| self.data.get(name).map(|val| &val[..]));
        let (kind, value): (_, Box<[f64]>) = match observed {
            Some(obs) => (SiteKind::Observed, obs.into()),
            None => (SiteKind::Latent, self.source.latent_value(name, dists)?),
        };
        check_len(name, size, value.len())?;

        trace!(site = name, ?kind, size, "registered sample site");
        self.trace.insert(Site {
            name: name.to_string(),
            kind,
            dists: dists.to_vec(),
            value: value.clone(),
            plate: plate.cloned(),
        })?;
        Ok(value)
    }

    fn deterministic(
        &mut self,
        name: &str,
        value: &[f64],
        plate: Option<&Plate>,
    ) -> Result<(), ModelError> {
        let size = plate.map(Plate::size).unwrap_or(1);
        check_len(name, size, value.len())?;
        trace!(site = name, size, "registered deterministic site");
        self.trace.insert(Site {
            name: name.to_string(),
            kind: SiteKind::Deterministic,
            dists: Vec::new(),
            value: value.into(),
            plate: plate.cloned(),
        })
    }
}
