use burn::backend::Autodiff;
use burn_ndarray::NdArray;
use voxreg_core::image::Image;
use voxreg_core::spatial::{Direction3, Point3, Spacing3};
use voxreg_registration::{
    register_volumes, MetricKind, OptimizerKind, RegistrationConfig,
};

type B = Autodiff<NdArray<f32>>;

/// Anisotropic Gaussian blob sampled on a unit grid.
fn make_blob(size: usize, center: [f64; 3], radii: [f64; 3]) -> Image<B, 3> {
    let mut data = Vec::with_capacity(size * size * size);
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let dx = x as f64 - center[0];
                let dy = y as f64 - center[1];
                let dz = z as f64 - center[2];
                let val = (-(dx * dx) / (2.0 * radii[0] * radii[0])
                    - (dy * dy) / (2.0 * radii[1] * radii[1])
                    - (dz * dz) / (2.0 * radii[2] * radii[2]))
                    .exp();
                data.push(val as f32);
            }
        }
    }
    Image::from_raw(
        data,
        [size, size, size],
        Point3::origin(),
        Spacing3::uniform(1.0),
        Direction3::identity(),
        &Default::default(),
    )
}

#[test]
fn test_recovered_affine_maps_fixed_onto_moving() {
    let size = 20;
    let fixed_center = [11.0, 10.0, 9.5];
    let moving_center = [9.0, 10.5, 10.0];
    let radii = [3.0, 4.0, 3.5];

    let fixed = make_blob(size, fixed_center, radii);
    let moving = make_blob(size, moving_center, radii);

    let config = RegistrationConfig {
        metric: MetricKind::MeanSquares,
        optimizer: OptimizerKind::Adam,
        learning_rate: 0.1,
        max_iterations: 250,
        sampling_fraction: 1.0,
        ..Default::default()
    };

    let outcome = register_volumes(&fixed, &moving, &config).unwrap();
    let affine = outcome.transform.affine();

    // The recovered transform maps fixed-space points into moving space,
    // so the fixed blob center must land on the moving blob center.
    let mapped = affine.apply_point(&Point3::new(fixed_center));
    for i in 0..3 {
        assert!(
            (mapped[i] - moving_center[i]).abs() < 0.5,
            "axis {i}: mapped {} vs expected {}",
            mapped[i],
            moving_center[i]
        );
    }

    // The inverse carries moving-space geometry back into fixed space.
    let inverse = affine.inverse().unwrap();
    let back = inverse.apply_point(&Point3::new(moving_center));
    for i in 0..3 {
        assert!((back[i] - fixed_center[i]).abs() < 0.5);
    }

    // History is complete and its metric trace improved overall.
    assert!(!outcome.history.is_empty());
    let first = outcome.history.first().unwrap().metric;
    let last = outcome.history.last().unwrap().metric;
    assert!(last <= first);
}

#[test]
fn test_mutual_information_recovers_translation() {
    let size = 20;
    let fixed_center = [11.0, 10.0, 10.0];
    let moving_center = [9.0, 10.0, 10.0];
    let radii = [3.5, 3.5, 3.5];

    let fixed = make_blob(size, fixed_center, radii);
    let moving = make_blob(size, moving_center, radii);

    let config = RegistrationConfig {
        metric: MetricKind::MutualInformation,
        optimizer: OptimizerKind::Adam,
        learning_rate: 0.1,
        max_iterations: 300,
        sampling_fraction: 1.0,
        ..Default::default()
    };

    let outcome = register_volumes(&fixed, &moving, &config).unwrap();
    let affine = outcome.transform.affine();

    let mapped = affine.apply_point(&Point3::new(fixed_center));
    for i in 0..3 {
        assert!(
            (mapped[i] - moving_center[i]).abs() < 0.5,
            "axis {i}: mapped {} vs expected {}",
            mapped[i],
            moving_center[i]
        );
    }
}
