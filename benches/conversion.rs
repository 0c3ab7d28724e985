use criterion::*;
use ndarray::Array2;
use radiometric::{
    constants::{AtmosphericCoefficients, PlanckConstants, RawRange, SceneParameters},
    CalibrationConstants, DatasetBounds, ImageCalibration, PixelConverter,
};

pub struct Samples<T>(Vec<T>);
impl<T> Samples<T> {
    pub fn sampler<'a>(&'a self) -> impl FnMut() -> &'a T {
        let mut curr = 0;
        move || {
            let ret = curr;
            curr += 1;
            curr %= self.0.len();
            &self.0[ret]
        }
    }
    pub fn from_fn<F: FnMut() -> T>(size: usize, mut proc: F) -> Self {
        Self((0..size).map(|_| proc()).collect())
    }
}

fn calibration(distance: f64) -> ImageCalibration {
    let constants = CalibrationConstants::new(
        PlanckConstants {
            r1: 14906.4,
            r2: 0.012269,
            b: 1443.7,
            o: -7314.,
            f: 1.,
        },
        SceneParameters {
            reflected_temperature: 20.,
            atmospheric_temperature: 20.,
            distance,
            relative_humidity: 50.,
            emissivity: 0.95,
        },
        AtmosphericCoefficients {
            alpha1: 0.006569,
            alpha2: 0.01262,
            beta1: -0.002276,
            beta2: -0.00667,
            x: 1.9,
        },
        RawRange {
            min: 12000,
            max: 16000,
        },
    )
    .expect("valid constants");
    ImageCalibration::new(constants).expect("valid calibration")
}

/// A 640x512 frame sweeping the raw range.
fn frame(seed: usize) -> Array2<u16> {
    Array2::from_shape_fn((512, 640), |(r, c)| {
        12000 + ((r * 640 + c + seed * 97) % 4001) as u16
    })
}

fn conversion(c: &mut Criterion) {
    let frames = Samples::from_fn(4, {
        let mut seed = 0;
        move || {
            seed += 1;
            frame(seed)
        }
    });

    c.bench_function("calibration", |b| {
        let mut distance = 0.;
        b.iter(|| {
            distance = (distance + 0.5) % 50.;
            calibration(black_box(distance))
        })
    });

    let cal = calibration(1.);
    let bounds = DatasetBounds::from_images(std::slice::from_ref(&cal)).expect("bounds");

    c.bench_function("absolute_640x512", |b| {
        let mut next = frames.sampler();
        let converter = PixelConverter::new(&cal);
        b.iter(|| converter.temperatures(next().view()))
    });

    c.bench_function("normalized_640x512", |b| {
        let mut next = frames.sampler();
        let converter = PixelConverter::new(&cal);
        b.iter(|| converter.normalized(next().view(), &bounds))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = conversion
}

criterion_main!(benches);
