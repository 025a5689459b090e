use itertools::izip;

use crate::context::SampleContext;
use crate::distributions::Dist;
use crate::model::{Model, ModelError};
use crate::trace::Plate;

pub const EIGHT_SCHOOLS_J: usize = 8;
/// Estimated treatment effects of the coaching programs.
pub const EIGHT_SCHOOLS_Y: [f64; 8] = [28., 8., -3., 7., -1., 1., 18., 12.];
/// Standard errors of the estimated effects.
pub const EIGHT_SCHOOLS_SIGMA: [f64; 8] = [15., 10., 16., 11., 9., 11., 10., 18.];

const MU_SCALE: f64 = 5.;
const TAU_SCALE: f64 = 5.;

fn check_inputs(j: usize, sigma: &[f64], y: Option<&[f64]>) -> Result<Plate, ModelError> {
    if sigma.len() != j {
        return Err(ModelError::ShapeMismatch {
            site: "sigma".to_string(),
            expected: j,
            found: sigma.len(),
        });
    }
    if let Some(y) = y {
        if y.len() != j {
            return Err(ModelError::ShapeMismatch {
                site: "obs".to_string(),
                expected: j,
                found: y.len(),
            });
        }
    }
    Ok(Plate::new("schools", j))
}

fn hyper_priors<C: SampleContext + ?Sized>(ctx: &mut C) -> Result<(f64, f64), ModelError> {
    let mu = ctx.sample("mu", Dist::normal(0., MU_SCALE)?, None)?;
    let tau = ctx.sample("tau", Dist::half_cauchy(TAU_SCALE)?, None)?;
    Ok((mu, tau))
}

fn observe<C: SampleContext + ?Sized>(
    ctx: &mut C,
    schools: &Plate,
    theta: &[f64],
    sigma: &[f64],
    y: Option<&[f64]>,
) -> Result<(), ModelError> {
    let dists = izip!(theta, sigma)
        .map(|(&theta, &sigma)| Dist::normal(theta, sigma))
        .collect::<Result<Vec<_>, _>>()?;
    ctx.plate_sample("obs", schools, &dists, y)?;
    Ok(())
}

/// Centered hierarchical model of the effects of coaching in `j` schools.
///
/// `mu ~ Normal(0, 5)`, `tau ~ HalfCauchy(5)`,
/// `theta[j] ~ Normal(mu, tau)` and `obs[j] ~ Normal(theta[j], sigma[j])`
/// observed at `y`.
pub fn eight_schools<C: SampleContext + ?Sized>(
    ctx: &mut C,
    j: usize,
    sigma: &[f64],
    y: Option<&[f64]>,
) -> Result<(), ModelError> {
    let schools = check_inputs(j, sigma, y)?;
    let (mu, tau) = hyper_priors(ctx)?;
    let theta_dist = Dist::normal(mu, tau)?;
    let theta = ctx.plate_sample("theta", &schools, &vec![theta_dist; j], None)?;
    observe(ctx, &schools, &theta, sigma, y)
}

/// The same joint model as [`eight_schools`] with `theta` expressed
/// through a standardized offset, `theta = mu + tau * eta` with
/// `eta[j] ~ Normal(0, 1)`.
///
/// `theta` is recorded as a deterministic site.
pub fn eight_schools_noncentered<C: SampleContext + ?Sized>(
    ctx: &mut C,
    j: usize,
    sigma: &[f64],
    y: Option<&[f64]>,
) -> Result<(), ModelError> {
    let schools = check_inputs(j, sigma, y)?;
    let (mu, tau) = hyper_priors(ctx)?;
    let eta = ctx.plate_sample("eta", &schools, &vec![Dist::normal(0., 1.)?; j], None)?;
    let theta: Vec<f64> = eta.iter().map(|&eta| tau.mul_add(eta, mu)).collect();
    ctx.deterministic("theta", &theta, Some(&schools))?;
    observe(ctx, &schools, &theta, sigma, y)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parameterization {
    #[default]
    Centered,
    NonCentered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EightSchools {
    pub sigma: Vec<f64>,
    pub y: Option<Vec<f64>>,
    pub parameterization: Parameterization,
}

impl EightSchools {
    pub fn new(sigma: Vec<f64>, y: Option<Vec<f64>>) -> Self {
        EightSchools {
            sigma,
            y,
            parameterization: Parameterization::Centered,
        }
    }

    pub fn noncentered(self) -> Self {
        EightSchools {
            parameterization: Parameterization::NonCentered,
            ..self
        }
    }

    pub fn num_schools(&self) -> usize {
        self.sigma.len()
    }
}

impl Default for EightSchools {
    /// The original coaching study data.
    fn default() -> Self {
        Self::new(
            EIGHT_SCHOOLS_SIGMA.to_vec(),
            Some(EIGHT_SCHOOLS_Y.to_vec()),
        )
    }
}

impl Model for EightSchools {
    type Output = ();

    fn run<C: SampleContext + ?Sized>(&self, ctx: &mut C) -> Result<(), ModelError> {
        let j = self.num_schools();
        let y = self.y.as_deref();
        match self.parameterization {
            Parameterization::Centered => eight_schools(ctx, j, &self.sigma, y),
            Parameterization::NonCentered => eight_schools_noncentered(ctx, j, &self.sigma, y),
        }
    }
}
