//! End-to-end properties of the AddC engine with full state logging.
//!
//! Randomized streams come from seeded generators; the brute-force
//! reference model shares the engine's tie rules so whole runs can be
//! compared exactly.

use addc_core::{
    AddcConfig, AddcError, Distance, DistanceConfig, OnlineClusterer, Phase, RepairPolicy,
    SlotId, TrimPolicy,
};
use addc_test_utils::{drifting_stream, gaussian_blobs, uniform_points, ReferenceClusterer};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("addc_core=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn euclidean_engine(kmax: usize) -> OnlineClusterer {
    OnlineClusterer::new(AddcConfig::new(kmax).with_distance(DistanceConfig::Euclidean))
        .expect("valid config")
}

fn nearest_center_distance(centers: &[Vec<f64>], point: &[f64]) -> f64 {
    centers
        .iter()
        .map(|c| addc_core::kernel::euclidean(c, point))
        .fold(f64::INFINITY, f64::min)
}

#[test]
fn engine_matches_brute_force_reference() {
    init_tracing();
    println!("\n=== REFERENCE: indexed engine vs O(n²) simulation ===");
    println!("PURPOSE: neighbor caching never changes which centroids are attracted or merged");

    for (seed, policy) in [(1u64, RepairPolicy::Lazy), (2, RepairPolicy::Eager), (3, RepairPolicy::Lazy)] {
        let points = uniform_points(300, 3, -5.0, 5.0, seed);
        let mut engine = OnlineClusterer::new(
            AddcConfig::new(12)
                .with_distance(DistanceConfig::Euclidean)
                .with_repair_policy(policy),
        )
        .expect("valid config");
        let mut reference = ReferenceClusterer::new(12, Distance::euclidean());

        for (i, p) in points.iter().enumerate() {
            engine.ingest(p).expect("ingest");
            reference.ingest(p);

            let actual: Vec<(SlotId, Vec<f64>, u64)> = engine
                .centroids()
                .into_iter()
                .map(|c| (c.slot, c.center, c.weight))
                .collect();
            assert_eq!(actual, reference.centroids(), "seed {} diverged at point {}", seed, i);
        }

        println!(
            "STATE AFTER: seed={} policy={:?} npoints={} evaluations={}",
            seed,
            policy,
            engine.npoints(),
            engine.index().evaluations()
        );
    }

    println!("[EVIDENCE] 3 runs x 300 points identical to brute force - SUCCESS");
}

#[test]
fn size_and_count_invariants_hold_for_every_point() {
    println!("\n=== INVARIANTS: size, npoints, contains ===");

    let kmax = 9;
    let mut addc = euclidean_engine(kmax);
    let points = uniform_points(250, 2, 0.0, 100.0, 99);

    println!("STATE BEFORE: len={} npoints={}", addc.len(), addc.npoints());
    for (i, p) in points.iter().enumerate() {
        let report = addc.ingest(p).expect("ingest");

        assert_eq!(addc.len(), (i + 1).min(kmax));
        assert_eq!(addc.npoints(), (i + 1) as u64);
        assert!(addc.contains(p), "newest point must be a centroid");
        assert_eq!(report.attracted.is_some(), i >= kmax);
        assert_eq!(report.merged.is_some(), i >= kmax);
        assert_eq!(addc.phase() == Phase::Saturated, i + 1 >= kmax);

        for center in addc.centers() {
            assert!(addc.contains(&center));
        }
    }
    println!("STATE AFTER: len={} npoints={}", addc.len(), addc.npoints());
    println!("[EVIDENCE] invariants held for 250 points - SUCCESS");
}

#[test]
fn weight_accounting_after_saturation() {
    println!("\n=== WEIGHT ACCOUNTING ===");
    println!("PURPOSE: each saturated point adds one weight via attract and one via its new centroid");

    for kmax in [2usize, 5, 20] {
        let mut addc = euclidean_engine(kmax);
        let points = uniform_points(kmax + 137, 4, -1.0, 1.0, kmax as u64);
        addc.batch(&points).expect("batch");

        let saturated = 137u64;
        let expected = kmax as u64 + 2 * saturated;
        println!("  kmax={} total_weight={} expected={}", kmax, addc.total_weight(), expected);
        assert_eq!(addc.total_weight(), expected);
        assert!(addc.centroids().iter().all(|c| c.weight >= 1));
    }
    println!("[EVIDENCE] total weight = kmax + 2 * saturated points - SUCCESS");
}

#[test]
fn identical_runs_are_identical() {
    println!("\n=== DETERMINISM ===");

    let points = uniform_points(200, 5, -3.0, 3.0, 2024);
    let run = || {
        let mut addc = OnlineClusterer::new(AddcConfig::new(15)).expect("valid config");
        addc.batch(&points).expect("batch");
        addc.centroids()
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    println!("[EVIDENCE] two runs, {} identical centroids - SUCCESS", first.len());
}

#[test]
fn clustered_stream_is_recovered_after_trimming() {
    init_tracing();
    println!("\n=== CLUSTERING: three gaussian blobs, kmax=6, trim 0.2 ===");

    let means = vec![vec![0.0, 0.0], vec![5.0, 5.0], vec![10.0, 0.0]];
    let stream = gaussian_blobs(&means, 0.5, 600, 314);

    let mut addc = euclidean_engine(6);
    addc.batch(&stream.points).expect("batch");

    let all = addc.centroids();
    println!("STATE BEFORE TRIM: {:?}", all.iter().map(|c| (c.weight, c.center.clone())).collect::<Vec<_>>());

    let heavy = addc.trim(0.2).expect("trim");
    println!("STATE AFTER TRIM: {:?}", heavy.iter().map(|c| (c.weight, c.center.clone())).collect::<Vec<_>>());

    let heavy_centers: Vec<Vec<f64>> = heavy.iter().map(|c| c.center.clone()).collect();
    for mean in &means {
        let d = nearest_center_distance(&heavy_centers, mean);
        println!("  mean {:?} -> nearest heavy centroid at {:.3}", mean, d);
        assert!(d < 1.0, "blob at {:?} not represented (nearest {:.3})", mean, d);
    }
    assert_eq!(addc.len(), 6, "trim is read-only");

    let mean_trimmed = addc.trim_with(0.5, TrimPolicy::RelativeToMean).expect("trim");
    assert!(!mean_trimmed.is_empty());
    assert!(mean_trimmed.len() <= all.len());

    println!("[EVIDENCE] {} heavy centroids cover all 3 blobs - SUCCESS", heavy.len());
}

#[test]
fn centroids_follow_a_drifting_stream() {
    println!("\n=== DRIFT: mean moves from (0,0) to (50,50) ===");
    println!("PURPOSE: replace keeps fresh centroids near the current data");

    let points = drifting_stream(&[0.0, 0.0], &[50.0, 50.0], 0.5, 800, 8);
    let mut addc = euclidean_engine(8);
    addc.batch(&points).expect("batch");

    let centers = addc.centers();
    let tail = &points[points.len() - 20..];
    let worst = tail
        .iter()
        .map(|p| nearest_center_distance(&centers, p))
        .fold(0.0, f64::max);

    println!("STATE AFTER: centers={:?}", centers);
    println!("  worst distance from last 20 points to a centroid = {:.3}", worst);
    assert!(worst < 5.0);
    println!("[EVIDENCE] centroids track the drift - SUCCESS");
}

#[test]
fn batch_equals_repeated_ingest() {
    println!("\n=== BATCH EQUIVALENCE ===");

    let points = uniform_points(120, 3, 0.0, 1.0, 55);
    let mut a = OnlineClusterer::new(AddcConfig::new(7)).expect("valid config");
    let mut b = OnlineClusterer::new(AddcConfig::new(7)).expect("valid config");

    for p in &points {
        a.ingest(p).expect("ingest");
    }
    let n = b.batch(points.iter().map(|p| p.as_slice())).expect("batch");

    assert_eq!(n, points.len());
    assert_eq!(a.centroids(), b.centroids());
    assert_eq!(a.npoints(), b.npoints());
    println!("[EVIDENCE] batch of {} == {} ingests - SUCCESS", n, points.len());
}

#[test]
fn invalid_points_leave_the_engine_untouched() {
    println!("\n=== ERRORS: rejected points ===");

    let mut addc = euclidean_engine(3);
    addc.batch([[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]).expect("batch");
    let before = addc.centroids();
    println!("STATE BEFORE: npoints={} centroids={:?}", addc.npoints(), before);

    let cases: Vec<(Vec<f64>, &str)> = vec![
        (vec![1.0], "dimension"),
        (vec![f64::INFINITY, 0.0], "non-finite"),
        (vec![0.0, f64::NAN], "nan"),
        (vec![], "empty"),
    ];
    for (point, label) in cases {
        let err = addc.ingest(&point).unwrap_err();
        println!("  {} -> {}", label, err);
        assert!(matches!(
            err,
            AddcError::DimensionMismatch { .. } | AddcError::InvalidPoint { .. }
        ));
    }

    println!("STATE AFTER: npoints={}", addc.npoints());
    assert_eq!(addc.npoints(), 4);
    assert_eq!(addc.centroids(), before);
    println!("[EVIDENCE] 4 rejected points, state unchanged - SUCCESS");
}

#[test]
fn custom_distance_is_used() {
    println!("\n=== CUSTOM DISTANCE: manhattan ===");

    let manhattan = Distance::from_fn("manhattan", |a, b| {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
    });
    let mut addc = OnlineClusterer::with_distance(AddcConfig::new(2), manhattan).expect("valid config");
    assert_eq!(addc.index().distance().name(), "manhattan");

    addc.batch([[2.0, 2.0], [3.0, 0.0]]).expect("batch");
    // Euclidean would pick slot 0 (2.83 < 3), manhattan picks slot 1 (3 < 4)
    let report = addc.ingest(&[0.0, 0.0]).expect("ingest");
    assert_eq!(report.attracted, Some(SlotId::new(1)));
    println!("[EVIDENCE] attracted={:?} - SUCCESS", report.attracted);
}

#[test]
fn asymmetric_distance_is_reported() {
    println!("\n=== ERRORS: asymmetric distance ===");

    let skewed = Distance::from_fn("skewed", |a, b| {
        let d: f64 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
        if a[0] < b[0] {
            d
        } else {
            2.0 * d
        }
    });
    let mut addc = OnlineClusterer::with_distance(AddcConfig::new(4), skewed).expect("valid config");
    addc.ingest(&[0.0]).expect("first point has nothing to compare");
    let err = addc.ingest(&[1.0]).unwrap_err();

    println!("STATE AFTER: {}", err);
    assert!(matches!(err, AddcError::InvalidDistance { .. }));
    assert_eq!(addc.len(), 1);
    println!("[EVIDENCE] asymmetry surfaced as InvalidDistance - SUCCESS");
}

#[test]
fn failed_merge_restores_the_centroid_set() {
    println!("\n=== ERRORS: distance fails after attract and remove ===");
    println!("PURPOSE: a saturated ingest that fails mid-step changes nothing");

    // Negative only inside (3.6, 3.7), where the merged center 11/3 lands
    let notched = Distance::from_fn("notched", |a, b| {
        let in_notch = |x: f64| x > 3.6 && x < 3.7;
        if in_notch(a[0]) || in_notch(b[0]) {
            -1.0
        } else {
            (a[0] - b[0]).abs()
        }
    });
    let mut addc = OnlineClusterer::with_distance(AddcConfig::new(3), notched).expect("valid config");
    addc.batch([[0.0], [10.0], [20.0]]).expect("fill");

    let before = addc.centroids();
    println!("STATE BEFORE: npoints={} centroids={:?}", addc.npoints(), before);

    // Attract moves slot 0 to 0.5, merge with slot 1 gives (0.5 * 2 + 10) / 3
    let err = addc.ingest(&[1.0]).unwrap_err();
    println!("STATE AFTER FAILURE: {} len={} npoints={}", err, addc.len(), addc.npoints());
    assert!(matches!(err, AddcError::InvalidDistance { .. }));
    assert_eq!(addc.len(), addc.kmax());
    assert_eq!(addc.npoints(), 3);
    assert_eq!(addc.centroids(), before);
    assert_eq!(addc.total_weight(), 3);

    for p in [[30.0], [40.0], [50.0], [60.0]] {
        addc.ingest(&p).expect("ingest after failure");
        assert_eq!(addc.len(), addc.kmax());
    }

    println!("STATE AFTER RECOVERY: centroids={:?}", addc.centroids());
    assert_eq!(addc.npoints(), 7);
    assert_eq!(addc.total_weight(), 3 + 2 * 4);
    println!("[EVIDENCE] failed step rolled back, kmax={} kept - SUCCESS", addc.kmax());
}
