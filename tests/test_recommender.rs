//! End-to-end tests for the recommendation pipeline

use cropwise::prelude::*;
use polars::prelude::*;

/// Three well-separated crop clusters with deterministic jitter.
fn crop_df(rows_per_crop: usize) -> DataFrame {
    let mut n = Vec::new();
    let mut p = Vec::new();
    let mut k = Vec::new();
    let mut temperature = Vec::new();
    let mut humidity = Vec::new();
    let mut ph = Vec::new();
    let mut rainfall = Vec::new();
    let mut label = Vec::new();

    // (N, P, K, temp, humidity, ph, rainfall) cluster centers
    let centers = [
        ("rice", [90.0, 45.0, 40.0, 24.0, 82.0, 6.5, 230.0]),
        ("maize", [70.0, 50.0, 20.0, 22.0, 65.0, 6.2, 85.0]),
        ("chickpea", [40.0, 65.0, 80.0, 18.0, 16.0, 7.3, 80.0]),
    ];

    for (crop, center) in &centers {
        for i in 0..rows_per_crop {
            let jitter = (i % 7) as f64 * 0.3 - 0.9;
            n.push(center[0] + jitter);
            p.push(center[1] - jitter);
            k.push(center[2] + jitter * 0.5);
            temperature.push(center[3] + jitter * 0.2);
            humidity.push(center[4] + jitter);
            ph.push(center[5] + jitter * 0.05);
            rainfall.push(center[6] + jitter * 2.0);
            label.push(*crop);
        }
    }

    df!(
        "N" => n,
        "P" => p,
        "K" => k,
        "temperature" => temperature,
        "humidity" => humidity,
        "ph" => ph,
        "rainfall" => rainfall,
        "label" => label
    )
    .unwrap()
}

fn fast_config() -> RecommenderConfig {
    RecommenderConfig {
        n_estimators: 15,
        ..Default::default()
    }
}

#[test]
fn test_training_succeeds_and_labels_sorted() {
    let df = crop_df(20);
    let recommender = CropRecommender::from_dataframe(&df, fast_config()).unwrap();

    assert_eq!(
        recommender.crop_labels(),
        &[
            "chickpea".to_string(),
            "maize".to_string(),
            "rice".to_string()
        ]
    );
}

#[test]
fn test_prediction_at_cluster_center() {
    let df = crop_df(20);
    let recommender = CropRecommender::from_dataframe(&df, fast_config()).unwrap();

    let prediction = recommender
        .predict(&[90.0, 45.0, 40.0, 24.0, 82.0, 6.5, 230.0])
        .unwrap();
    assert_eq!(prediction.label, "rice");
    assert!(prediction.confidence() > 0.5);
}

#[test]
fn test_probabilities_cover_vocabulary_and_sum_to_one() {
    let df = crop_df(20);
    let recommender = CropRecommender::from_dataframe(&df, fast_config()).unwrap();

    let prediction = recommender
        .predict(&[70.0, 50.0, 20.0, 22.0, 65.0, 6.2, 85.0])
        .unwrap();

    assert_eq!(prediction.probabilities.len(), 3);
    let total: f64 = prediction.probabilities.iter().map(|(_, p)| p).sum();
    assert!((total - 1.0).abs() < 1e-6, "probabilities sum to {total}");

    // The recommended label carries the highest probability
    let top = prediction.ranked().remove(0);
    assert_eq!(top.0, prediction.label);
}

#[test]
fn test_two_instances_agree() {
    let df = crop_df(20);
    let a = CropRecommender::from_dataframe(&df, fast_config()).unwrap();
    let b = CropRecommender::from_dataframe(&df, fast_config()).unwrap();

    assert_eq!(a.best_model_name(), b.best_model_name());

    let sa = a.model_scores();
    let sb = b.model_scores();
    assert_eq!(sa.len(), sb.len());
    for ((name_a, rec_a), (name_b, rec_b)) in sa.iter().zip(sb.iter()) {
        assert_eq!(name_a, name_b);
        assert_eq!(rec_a, rec_b, "{name_a} scores drifted between instances");
    }

    let query = [40.0, 65.0, 80.0, 18.0, 16.0, 7.3, 80.0];
    let pa = a.predict(&query).unwrap();
    let pb = b.predict(&query).unwrap();
    assert_eq!(pa.label, pb.label);
    assert_eq!(pa.probabilities, pb.probabilities);
}

#[test]
fn test_debug_summarizes_pipeline() {
    let df = crop_df(20);
    let recommender = CropRecommender::from_dataframe(&df, fast_config()).unwrap();

    let formatted = format!("{recommender:?}");
    assert!(formatted.contains("CropRecommender"));
    assert!(formatted.contains("EnsembleTree"));
}

#[test]
fn test_separable_data_selects_first_variant() {
    // Every variant reaches perfect held-out accuracy here, so the tie
    // must resolve to the first-registered variant
    let df = crop_df(20);
    let recommender = CropRecommender::from_dataframe(&df, fast_config()).unwrap();
    assert_eq!(recommender.best_model_name(), "ensemble_tree");
}

#[test]
fn test_model_scores_reported_per_variant() {
    let df = crop_df(20);
    let recommender = CropRecommender::from_dataframe(&df, fast_config()).unwrap();

    let scores = recommender.model_scores();
    assert_eq!(scores.len(), 3);
    for (name, record) in &scores {
        assert!(
            record.accuracy >= 0.0 && record.accuracy <= 1.0,
            "{name} accuracy {} out of range",
            record.accuracy
        );
        assert!(record.cv_mean >= 0.0 && record.cv_mean <= 1.0);
        assert!(record.cv_std >= 0.0);
    }
}

#[test]
fn test_model_scores_json() {
    let df = crop_df(20);
    let recommender = CropRecommender::from_dataframe(&df, fast_config()).unwrap();

    let json = recommender.model_scores_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let obj = parsed.as_object().unwrap();
    assert!(obj.contains_key("ensemble_tree"));
    assert!(obj.contains_key("gradient_boosted_tree"));
    assert!(obj.contains_key("kernel_support_vector"));
    assert!(obj["ensemble_tree"]["accuracy"].is_number());
}

#[test]
fn test_feature_importance_spans_all_columns() {
    let df = crop_df(20);
    let recommender = CropRecommender::from_dataframe(&df, fast_config()).unwrap();

    let importance = recommender.feature_importance().unwrap();
    assert_eq!(importance.len(), 7);

    let names: Vec<&str> = importance.iter().map(|(n, _)| *n).collect();
    assert_eq!(names, FEATURE_COLUMNS.to_vec());

    let total: f64 = importance.iter().map(|(_, v)| v).sum();
    assert!((total - 1.0).abs() < 1e-6);
}

#[test]
fn test_wrong_feature_count_rejected() {
    let df = crop_df(20);
    let recommender = CropRecommender::from_dataframe(&df, fast_config()).unwrap();

    let err = recommender.predict(&[90.0, 45.0, 40.0]).unwrap_err();
    assert!(matches!(err, CropwiseError::ShapeError { .. }));
}

#[test]
fn test_empty_dataframe_rejected() {
    let df = crop_df(20).head(Some(0));
    let err = CropRecommender::from_dataframe(&df, fast_config()).unwrap_err();
    assert!(matches!(err, CropwiseError::EmptyDataset));
}

#[test]
fn test_missing_column_rejected() {
    let df = crop_df(20).drop("humidity").unwrap();
    let err = CropRecommender::from_dataframe(&df, fast_config()).unwrap_err();
    assert!(matches!(err, CropwiseError::MissingColumn(c) if c == "humidity"));
}

#[test]
fn test_no_viable_model_when_nothing_can_train() {
    // Two rows split 1/1: a single-sample training set defeats every
    // variant, so construction reports the aggregated failures
    let df = df!(
        "N" => &[90.0, 70.0],
        "P" => &[45.0, 50.0],
        "K" => &[40.0, 20.0],
        "temperature" => &[24.0, 22.0],
        "humidity" => &[82.0, 65.0],
        "ph" => &[6.5, 6.2],
        "rainfall" => &[230.0, 85.0],
        "label" => &["rice", "maize"]
    )
    .unwrap();

    let config = RecommenderConfig {
        n_estimators: 5,
        ..Default::default()
    };
    let err = CropRecommender::from_dataframe(&df, config).unwrap_err();
    assert!(matches!(err, CropwiseError::NoViableModel(_)));
}
