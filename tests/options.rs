//! Tests for run options.

use anyhow::Result;
use ironstats::options::{DEFAULT_DESIRED_BATCH_SIZE, DEFAULT_SAMPLE_SEED};
use ironstats::schema::{Feature, SchemaType};
use ironstats::slicing::default_slicer;
use ironstats::{Schema, StatsError, StatsOptions};
use std::io::Write;

fn invalid_option(options: &StatsOptions) -> Option<&'static str> {
    match options.validate() {
        Err(StatsError::InvalidOption { option, .. }) => Some(option),
        _ => None,
    }
}

#[test]
fn defaults() {
    let options = StatsOptions::default();
    assert!(options.validate().is_ok());
    assert_eq!(options.num_top_values, 20);
    assert_eq!(options.frequency_threshold, 1);
    assert_eq!(options.num_rank_histogram_buckets, 1000);
    assert_eq!(options.desired_batch_size(), DEFAULT_DESIRED_BATCH_SIZE);
    assert_eq!(options.sample_seed(), DEFAULT_SAMPLE_SEED);
    assert!(!options.is_slicing_enabled());
    assert!(!options.enable_semantic_domain_stats);
}

#[test]
fn validation_names_the_offending_option() {
    let base = StatsOptions::default;
    assert_eq!(invalid_option(&base().with_num_top_values(0)), Some("num_top_values"));
    assert_eq!(invalid_option(&base().with_frequency_threshold(0)), Some("frequency_threshold"));
    assert_eq!(
        invalid_option(&base().with_weighted_frequency_threshold(-1.0)),
        Some("weighted_frequency_threshold")
    );
    assert_eq!(
        invalid_option(&base().with_weighted_frequency_threshold(f64::NAN)),
        Some("weighted_frequency_threshold")
    );
    assert_eq!(
        invalid_option(&base().with_num_rank_histogram_buckets(0)),
        Some("num_rank_histogram_buckets")
    );
    assert_eq!(invalid_option(&base().with_desired_batch_size(0)), Some("desired_batch_size"));
    for rate in [0.0, -0.5, 1.5] {
        assert_eq!(
            invalid_option(&base().with_semantic_domain_stats(Some(rate))),
            Some("semantic_domain_stats_sample_rate")
        );
    }
    assert_eq!(invalid_option(&base().with_semantic_domain_stats(Some(1.0))), None);
    assert_eq!(invalid_option(&base().with_weighted_frequency_threshold(0.0)), None);
}

#[test]
fn builders_set_fields() {
    let options = StatsOptions::default()
        .with_weight_feature("w")
        .with_feature_whitelist(["a", "b"])
        .with_desired_batch_size(10)
        .with_sample_seed(7)
        .with_slice_function(default_slicer());
    assert_eq!(options.weight_feature.as_deref(), Some("w"));
    assert_eq!(options.feature_whitelist, Some(vec!["a".to_string(), "b".to_string()]));
    assert_eq!(options.desired_batch_size(), 10);
    assert_eq!(options.sample_seed(), 7);
    assert!(options.is_slicing_enabled());
}

#[test]
fn json_round_trip_skips_functions() -> Result<()> {
    let options = StatsOptions::default()
        .with_weight_feature("w")
        .with_num_top_values(5)
        .with_schema(Schema::new(vec![Feature::new("a", SchemaType::Int)]))
        .with_semantic_domain_stats(Some(0.25))
        .with_slice_function(default_slicer());

    let parsed = StatsOptions::from_json_str(&options.to_json_string()?)?;
    assert_eq!(parsed.weight_feature.as_deref(), Some("w"));
    assert_eq!(parsed.num_top_values, 5);
    assert_eq!(parsed.schema, options.schema);
    assert_eq!(parsed.semantic_domain_stats_sample_rate, Some(0.25));
    assert!(parsed.enable_semantic_domain_stats);
    assert!(!parsed.is_slicing_enabled());
    assert!(parsed.generators.is_empty());
    Ok(())
}

#[test]
fn partial_json_uses_defaults() -> Result<()> {
    let parsed = StatsOptions::from_json_str(r#"{"num_top_values": 3}"#)?;
    assert_eq!(parsed.num_top_values, 3);
    assert_eq!(parsed.num_rank_histogram_buckets, 1000);

    assert!(matches!(
        StatsOptions::from_json_str(r#"{"num_top_values": 0}"#),
        Err(StatsError::InvalidOption { option: "num_top_values", .. })
    ));
    assert!(matches!(
        StatsOptions::from_json_str("not json"),
        Err(StatsError::Json(_))
    ));
    Ok(())
}

#[test]
fn loads_from_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, r#"{{"weight_feature": "weight", "desired_batch_size": 64}}"#)?;
    let parsed = StatsOptions::from_json_file(file.path())?;
    assert_eq!(parsed.weight_feature.as_deref(), Some("weight"));
    assert_eq!(parsed.desired_batch_size(), 64);

    assert!(matches!(
        StatsOptions::from_json_file(file.path().with_extension("missing")),
        Err(StatsError::Io(_))
    ));
    Ok(())
}
