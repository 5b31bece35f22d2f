//! Benchmarks for the StaR Map's hot paths: Monte-Carlo support-point
//! computation and approximator fitting, across methods and support sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use promis::approximate::Method;
use promis::geo::{CartesianFeature, CartesianMap, CartesianRasterBand, Geometry, PolarLocation};
use promis::config::Settings;
use promis::star_map::{StarMap, Target};

fn origin() -> PolarLocation {
    PolarLocation::new(49.0, 8.0)
}

fn uam() -> CartesianMap {
    CartesianMap::new(
        origin(),
        vec![
            CartesianFeature::new(Geometry::Point([10.0, 10.0]), "operator"),
            CartesianFeature::new(Geometry::Point([-20.0, 15.0]), "primary"),
        ],
    )
}

fn bench_initialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("star_map_initialize");

    for side in [8usize, 16, 32] {
        for method in [Method::Nearest, Method::Linear, Method::GaussianProcess] {
            let label = format!("{}x{}/{}", side, side, method.as_str());
            group.bench_with_input(BenchmarkId::from_parameter(label), &side, |b, &side| {
                b.iter(|| {
                    let target = Target::Raster(CartesianRasterBand::new(
                        origin(),
                        (side, side),
                        100.0,
                        100.0,
                    ));
                    let mut star_map =
                        StarMap::new(target, uam(), method, Settings::default()).unwrap();
                    let support = star_map.target().collection().clone();
                    star_map
                        .initialize(
                            &support,
                            20,
                            "landscape(X) :- distance(X, operator) < 10, over(X, primary).",
                        )
                        .unwrap();
                    black_box(star_map.is_fitted())
                });
            });
        }
    }

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let target = Target::Raster(CartesianRasterBand::new(origin(), (32, 32), 100.0, 100.0));
    let mut star_map = StarMap::new(target, uam(), Method::GaussianProcess, Settings::default()).unwrap();
    let support = star_map.target().collection().clone();
    star_map
        .initialize(&support, 20, "landscape(X) :- distance(X, operator) < 10.")
        .unwrap();

    c.bench_function("star_map_get_gaussian_process", |b| {
        b.iter(|| black_box(star_map.get("distance", Some("operator")).unwrap()));
    });
}

criterion_group!(benches, bench_initialize, bench_get);
criterion_main!(benches);
