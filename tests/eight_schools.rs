use nuts_models::{
    models::{
        eight_schools, eight_schools_noncentered, EightSchools, EIGHT_SCHOOLS_J,
        EIGHT_SCHOOLS_SIGMA, EIGHT_SCHOOLS_Y,
    },
    sample_posterior_predictive, sample_prior_predictive, CpuLogpFunc, LogpError, ModelLogp,
    DistError, ModelError, PredictiveSettings, PriorDraws, SiteKind, Tracer,
};
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn model_functions_return_unit() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    for y in [None, Some(&EIGHT_SCHOOLS_Y[..])] {
        {
            let mut tracer = Tracer::new(PriorDraws::new(&mut rng));
            assert_eq!(
                eight_schools(&mut tracer, EIGHT_SCHOOLS_J, &EIGHT_SCHOOLS_SIGMA, y),
                Ok(())
            );
        }
        let mut tracer = Tracer::new(PriorDraws::new(&mut rng));
        assert_eq!(
            eight_schools_noncentered(&mut tracer, EIGHT_SCHOOLS_J, &EIGHT_SCHOOLS_SIGMA, y),
            Ok(())
        );
        let obs = tracer.trace().get("obs").unwrap();
        assert_eq!(obs.is_observed(), y.is_some());
    }
}

#[test]
fn model_functions_reject_invalid_inputs() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let sigma_mismatch = ModelError::ShapeMismatch {
        site: "sigma".to_string(),
        expected: 3,
        found: 2,
    };
    let y_mismatch = ModelError::ShapeMismatch {
        site: "obs".to_string(),
        expected: 2,
        found: 1,
    };
    let bad_sigma = ModelError::Distribution(DistError::InvalidScale(-1.));

    {
        let mut tracer = Tracer::new(PriorDraws::new(&mut rng));
        assert_eq!(
            eight_schools(&mut tracer, 3, &[1., 2.], None),
            Err(sigma_mismatch.clone())
        );
        assert!(tracer.trace().is_empty());
        assert_eq!(
            eight_schools(&mut tracer, 2, &[1., 2.], Some(&[0.][..])),
            Err(y_mismatch.clone())
        );
        assert_eq!(
            eight_schools(&mut tracer, 2, &[1., -1.], Some(&[0., 0.][..])),
            Err(bad_sigma.clone())
        );
    }

    let mut tracer = Tracer::new(PriorDraws::new(&mut rng));
    assert_eq!(
        eight_schools_noncentered(&mut tracer, 3, &[1., 2.], None),
        Err(sigma_mismatch)
    );
    assert_eq!(
        eight_schools_noncentered(&mut tracer, 2, &[1., 2.], Some(&[0.][..])),
        Err(y_mismatch)
    );
    assert_eq!(
        eight_schools_noncentered(&mut tracer, 2, &[1., -1.], Some(&[0., 0.][..])),
        Err(bad_sigma)
    );
}

#[test]
fn parameterizations_share_prior_predictive() {
    let settings = PredictiveSettings {
        num_draws: 4000,
        num_chains: 2,
        seed: 99,
    };
    let centered = EightSchools::new(EIGHT_SCHOOLS_SIGMA.to_vec(), None);
    let noncentered = centered.clone().noncentered();

    let mean_mu = |results: &[nuts_models::HashMapResult]| {
        let values: Vec<f64> = results
            .iter()
            .flat_map(|r| r.site("mu").unwrap().values.iter().copied())
            .collect();
        values.iter().sum::<f64>() / values.len() as f64
    };
    let a = sample_prior_predictive(&centered, &settings).unwrap();
    let b = sample_prior_predictive(&noncentered, &settings).unwrap();
    assert!(mean_mu(&a[..]).abs() < 0.3);
    assert!(mean_mu(&b[..]).abs() < 0.3);

    // The median of |obs - mu| is dominated by sigma and tau and should agree.
    let median_abs_dev = |results: &[nuts_models::HashMapResult]| {
        let mut devs: Vec<f64> = results
            .iter()
            .flat_map(|r| {
                let mu = &r.site("mu").unwrap().values;
                r.site("obs")
                    .unwrap()
                    .draws()
                    .zip(mu.iter())
                    .map(|(obs, &mu)| (obs[0] - mu).abs())
                    .collect::<Vec<_>>()
            })
            .collect();
        devs.sort_by(f64::total_cmp);
        devs[devs.len() / 2]
    };
    let (da, db) = (median_abs_dev(&a[..]), median_abs_dev(&b[..]));
    assert!((da - db).abs() / da < 0.15, "{da} vs {db}");
}

#[test]
fn noncentered_density_is_usable_by_a_sampler() {
    let mut logp = ModelLogp::new(EightSchools::default().noncentered()).unwrap();
    assert_eq!(logp.dim(), 10);
    let position = logp.initial_position(1).unwrap();
    let mut grad = vec![0.; logp.dim()];
    let value = logp.logp(&position, &mut grad).unwrap();
    assert!(value.is_finite());
    assert!(grad.iter().all(|g| g.is_finite()));

    // A tau that overflows makes the density invalid but recoverable.
    let mut position = position.to_vec();
    position[1] = 1000.;
    let err = logp.logp(&position, &mut grad).unwrap_err();
    assert!(err.is_recoverable());
}

#[test]
fn posterior_predictive_replicates_data() {
    let logp = ModelLogp::new(EightSchools::default()).unwrap();
    let posterior: Vec<_> = (0..20)
        .map(|seed| {
            let position = logp.initial_position(seed).unwrap();
            logp.trace_at(&position).unwrap().latent_values()
        })
        .collect();
    let model = EightSchools::new(EIGHT_SCHOOLS_SIGMA.to_vec(), None);
    let result =
        sample_posterior_predictive(&model, &posterior, &PredictiveSettings::default()).unwrap();
    assert_eq!(result.num_draws, 20);
    let obs = result.site("obs").unwrap();
    assert_eq!(obs.kind, SiteKind::Latent);
    assert_eq!(obs.width, EIGHT_SCHOOLS_J);
    assert_ne!(obs.draw(0).unwrap(), &EIGHT_SCHOOLS_Y[..]);
    assert_eq!(
        result.site("theta").unwrap().draw(3).unwrap(),
        &posterior[3]["theta"][..]
    );
}
