mod common;

use common::{failing_on, gauged, ConcurrencyGauge, GOLDEN_RESULT, GOLDEN_SEED};
use pretty_assertions::assert_eq;
use signer::config::{HashingConfig, PipelineConfig, SignerConfig};
use signer::hashing::{Crc32Hash, Md5Hash, OverheatGuard};
use signer::pipeline::{sign, signer_pipeline, SignerOptions, StageState};
use signer::{PipelineError, SynchronizedHashResource};
use std::sync::Arc;
use std::time::Duration;

fn default_resource() -> Arc<SynchronizedHashResource> {
    Arc::new(SynchronizedHashResource::default())
}

#[test]
fn test_golden_seed_produces_known_result() {
    let config = SignerConfig::default();
    assert_eq!(config.seed, GOLDEN_SEED.to_vec());

    let combined = sign(&config, SignerOptions::default()).unwrap();
    assert_eq!(combined, GOLDEN_RESULT);
}

#[test]
fn test_result_is_stable_across_buffer_capacities() {
    for capacity in [1, 2, 3, 16] {
        let pipeline = signer_pipeline(
            default_resource(),
            GOLDEN_SEED.to_vec(),
            &PipelineConfig::with_buffer_capacity(capacity),
            SignerOptions::default(),
        );
        let combined = pipeline.execute().unwrap().into_single().unwrap();
        assert_eq!(combined, GOLDEN_RESULT, "buffer capacity {capacity}");
    }
}

#[test]
fn test_print_intermediate_does_not_change_result() {
    let combined = sign(
        &SignerConfig::default(),
        SignerOptions {
            print_intermediate: true,
        },
    )
    .unwrap();
    assert_eq!(combined, GOLDEN_RESULT);
}

#[test]
fn test_empty_seed_yields_empty_string() {
    let config = SignerConfig {
        seed: Vec::new(),
        ..SignerConfig::default()
    };
    assert_eq!(sign(&config, SignerOptions::default()).unwrap(), "");
}

#[test]
fn test_duplicate_items_are_kept() {
    let config = SignerConfig {
        seed: vec![1, 1, 1],
        ..SignerConfig::default()
    };
    let combined = sign(&config, SignerOptions::default()).unwrap();
    let value = "4958044192186797981418233587017209679042592862002427381542";
    assert_eq!(combined, [value, value, value].join("_"));
}

#[test]
fn test_stage_timings_report_every_stage_closed() {
    let pipeline = signer_pipeline(
        default_resource(),
        vec![0, 1, 2],
        &PipelineConfig::default(),
        SignerOptions::default(),
    );
    let output = pipeline.execute().unwrap();

    let names: Vec<_> = output.timings.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Generator", "SingleHash", "MultiHash", "CombineResults"]
    );
    let emitted: Vec<_> = output.timings.iter().map(|t| t.emitted).collect();
    assert_eq!(emitted, vec![3, 3, 3, 1]);
    assert!(output
        .timings
        .iter()
        .all(|t| t.succeeded && t.final_state == StageState::Closed));
}

#[test]
fn test_restricted_hash_is_never_concurrent() {
    let restricted_gauge = Arc::new(ConcurrencyGauge::default());
    let free_gauge = Arc::new(ConcurrencyGauge::default());
    let resource = Arc::new(SynchronizedHashResource::new(
        Box::new(OverheatGuard::new(gauged(
            Md5Hash::default(),
            Arc::clone(&restricted_gauge),
            Duration::from_millis(5),
        ))),
        gauged(
            Crc32Hash::default(),
            Arc::clone(&free_gauge),
            Duration::from_millis(20),
        ),
    ));

    let seed: Vec<u32> = (0..12).collect();
    let config = PipelineConfig::default();
    let pipeline = signer_pipeline(resource, seed.clone(), &config, SignerOptions::default());
    let combined = pipeline.execute().unwrap().into_single().unwrap();

    assert_eq!(combined.split('_').count(), seed.len());
    assert_eq!(restricted_gauge.calls(), seed.len());
    assert_eq!(restricted_gauge.peak(), 1);
    // Two single-hash calls and six multi-hash calls per item
    assert_eq!(free_gauge.calls(), seed.len() * 8);
    assert!(
        free_gauge.peak() > 1,
        "free hash never overlapped (peak {})",
        free_gauge.peak()
    );
}

#[test]
fn test_in_flight_limit_bounds_concurrent_hashing() {
    let free_gauge = Arc::new(ConcurrencyGauge::default());
    let resource = Arc::new(SynchronizedHashResource::new(
        Box::new(Md5Hash::default()),
        gauged(
            Crc32Hash::default(),
            Arc::clone(&free_gauge),
            Duration::from_millis(5),
        ),
    ));
    let config = PipelineConfig {
        buffer_capacity: 3,
        max_in_flight: 2,
    };

    let seed: Vec<u32> = (0..24).collect();
    let pipeline = signer_pipeline(resource, seed.clone(), &config, SignerOptions::default());
    let combined = pipeline.execute().unwrap().into_single().unwrap();

    assert_eq!(combined.split('_').count(), seed.len());
    assert_eq!(free_gauge.calls(), seed.len() * 8);
    // Two SingleHash items with two halves each, two MultiHash items with six parts each
    let bound = 2 * 2 + 2 * 6;
    assert!(
        free_gauge.peak() <= bound,
        "free hash peak {} exceeds {bound}",
        free_gauge.peak()
    );
}

#[test]
fn test_large_seed_completes() {
    let config = SignerConfig {
        seed: (0..30_000).collect(),
        ..SignerConfig::default()
    };
    let combined = sign(&config, SignerOptions::default()).unwrap();

    let parts: Vec<&str> = combined.split('_').collect();
    assert_eq!(parts.len(), 30_000);
    assert!(parts.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn test_latency_is_overlapped_across_items() {
    let hashing = HashingConfig {
        restricted_latency_ms: 1,
        free_latency_ms: 100,
        ..HashingConfig::default()
    };
    let config = SignerConfig {
        hashing,
        ..SignerConfig::default()
    };

    let start = std::time::Instant::now();
    let combined = sign(&config, SignerOptions::default()).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(combined, GOLDEN_RESULT);
    // Sequential execution would need 7 items * 3 free-hash rounds * 100ms.
    assert!(
        elapsed < Duration::from_millis(1500),
        "pipeline took {elapsed:?}"
    );
}

#[test]
fn test_hash_failure_aborts_pipeline() {
    let resource = Arc::new(SynchronizedHashResource::new(
        failing_on("3"),
        Box::new(Crc32Hash::default()),
    ));
    let seed: Vec<u32> = (0..40).collect();
    let config = PipelineConfig::with_buffer_capacity(1);
    let pipeline = signer_pipeline(resource, seed, &config, SignerOptions::default());

    let err = pipeline.execute().unwrap_err();
    assert!(matches!(err, PipelineError::Aborted { .. }), "{err:?}");
    assert!(err.is_compute_failure());
    match err.root_cause() {
        PipelineError::ComputeFailure(hash_err) => {
            assert_eq!(hash_err.input, "3");
            assert_eq!(hash_err.reason, "injected failure");
        }
        other => panic!("unexpected root cause: {other:?}"),
    }
}

#[test]
fn test_failure_in_multi_hash_reports_first_failure_only() {
    // Part 3 of every item fails in MultiHash; SingleHash inputs never
    // contain the separator, so they pass. Only one failure is surfaced.
    let resource = Arc::new(SynchronizedHashResource::new(
        Box::new(Md5Hash::default()),
        Box::new(signer::hashing::FnHash::new("picky", |data: &str| {
            if data.starts_with('3') && data.contains('~') {
                Err(signer::HashError::new("picky", data, "no threes"))
            } else {
                Ok(data.len().to_string())
            }
        })),
    ));
    let config = PipelineConfig::with_buffer_capacity(2);
    let pipeline = signer_pipeline(resource, (0..10).collect(), &config, SignerOptions::default());

    let err = pipeline.execute().unwrap_err();
    let PipelineError::Aborted { stage, source } = &err else {
        panic!("expected Aborted, got {err:?}");
    };
    assert_eq!(stage, "MultiHash");
    assert!(matches!(**source, PipelineError::ComputeFailure(_)));
}

#[test]
fn test_aborted_run_leaves_resource_reusable() {
    let resource = Arc::new(SynchronizedHashResource::new(
        failing_on("5"),
        Box::new(Crc32Hash::default()),
    ));
    let config = PipelineConfig::default();
    let failing = signer_pipeline(
        Arc::clone(&resource),
        vec![5, 6],
        &config,
        SignerOptions::default(),
    );
    assert!(failing.execute().is_err());

    let passing = signer_pipeline(resource, vec![6, 7], &config, SignerOptions::default());
    let combined = passing.execute().unwrap().into_single().unwrap();
    assert_eq!(combined.split('_').count(), 2);
}
