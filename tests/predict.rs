//! End-to-end tests against the credit-risk fixture bundle in
//! `tests/fixtures/credit_risk.json`.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use rand::seq::SliceRandom;
use serde_json::{json, Map, Value as JsonValue};

use riskpredict::classifier::Classifier;
use riskpredict::model::{Model, PriorModel};
use riskpredict::{
    Error, Frame, LabelEncoder, LoadError, ModelBundle, PredictOptions, Predictor,
    ProbabilityOrder, Value,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}", uuid::Uuid::new_v4(), name))
}

fn record(v: JsonValue) -> Map<String, JsonValue> {
    v.as_object().unwrap().clone()
}

fn load_predictor() -> Predictor {
    let bundle = ModelBundle::load(fixture("credit_risk.json"))
        .unwrap_or_else(|e| panic!("failed to load fixture bundle: {e}"));
    Predictor::new(bundle)
}

fn customers() -> Vec<Map<String, JsonValue>> {
    vec![
        record(json!({"id": "c1", "age": 35, "annual_income": 85000, "credit_score": 780, "num_delinquencies": 0})),
        record(json!({"id": "c2", "age": 52, "annual_income": 30000, "credit_score": 560, "num_delinquencies": 5})),
        record(json!({"id": "c3", "age": 44, "annual_income": 30000, "credit_score": 650, "num_delinquencies": 2})),
        record(json!({"id": "c4", "age": 29, "annual_income": 50000, "credit_score": 650, "num_delinquencies": 0})),
    ]
}

#[test]
fn fixture_scores_every_risk_category() {
    let predictor = load_predictor();
    assert!(predictor.bundle().label_encoder().is_some());

    let out = predictor.predict(&Frame::from_records(customers())).unwrap();
    assert_eq!(out.labels, vec!["P1", "P4", "P3", "P2"]);
}

#[test]
fn one_prediction_per_row_and_probabilities_sum_to_one() {
    let predictor = load_predictor();
    let out = predictor.predict(&Frame::from_records(customers())).unwrap();
    assert_eq!(out.len(), 4);
    assert_eq!(out.probabilities.len(), 4);
    for proba in &out.probabilities {
        assert_eq!(proba.len(), 4);
        assert!(proba.iter().all(|p| *p >= 0.0));
        assert_abs_diff_eq!(proba.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    }
}

#[test]
fn column_order_does_not_change_output() {
    let predictor = load_predictor();
    let reference = predictor.predict(&Frame::from_records(customers())).unwrap();

    let mut columns: Vec<String> = ["id", "age", "annual_income", "credit_score", "num_delinquencies"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rng = rand::rng();
    for _ in 0..10 {
        columns.shuffle(&mut rng);
        let mut frame = Frame::new(columns.clone()).unwrap();
        for customer in customers() {
            let row = columns
                .iter()
                .map(|c| Value::from(customer[c].clone()))
                .collect();
            frame.push_row(row).unwrap();
        }
        assert_eq!(predictor.predict(&frame).unwrap(), reference);
    }
}

#[test]
fn omitted_feature_is_named() {
    let predictor = load_predictor();
    let rows = Frame::from_records([record(
        json!({"age": 35, "annual_income": 85000, "num_delinquencies": 0}),
    )]);
    match predictor.predict(&rows) {
        Err(Error::MissingFeature { names }) => assert_eq!(names, vec!["credit_score"]),
        other => panic!("expected missing feature, got {:?}", other),
    }
}

#[test]
fn null_cells_follow_default_direction() {
    let predictor = load_predictor();
    let rows = Frame::from_records([record(json!({
        "age": 52, "annual_income": 30000, "credit_score": null, "num_delinquencies": 5
    }))]);
    let out = predictor.predict(&rows).unwrap();
    // margins: P1 -0.5, P2 0.0, P3 1.5, P4 1.0
    assert_eq!(out.labels, vec!["P3"]);
}

#[test]
fn encoded_predictions_stay_within_encoder_labels() {
    let predictor = load_predictor();
    let encoder = predictor.bundle().label_encoder().unwrap().clone();
    let mut frame = Frame::new(["credit_score", "annual_income", "num_delinquencies", "age"]).unwrap();
    for i in 0..200 {
        frame
            .push_row(vec![
                Value::Number(450.0 + (i * 2) as f64),
                Value::Number(15000.0 + (i * 500) as f64),
                Value::Number((i % 7) as f64),
                Value::Number(21.0 + (i % 50) as f64),
            ])
            .unwrap();
    }
    let out = predictor.predict(&frame).unwrap();
    assert_eq!(out.len(), 200);
    for label in &out.labels {
        assert!(encoder.transform(label).is_some(), "unknown label {}", label);
    }
}

#[test]
fn binary_copy_predicts_like_the_json_bundle() {
    let json_bundle = ModelBundle::load(fixture("credit_risk.json")).unwrap();
    let path = scratch("credit_risk.rpmb");
    json_bundle.save(&path).unwrap();
    let binary_bundle = ModelBundle::load(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(binary_bundle, json_bundle);

    let rows = Frame::from_records(customers());
    assert_eq!(
        Predictor::new(binary_bundle).predict(&rows).unwrap(),
        Predictor::new(json_bundle).predict(&rows).unwrap()
    );
}

#[test]
fn absent_bundle_is_a_load_error() {
    let err = ModelBundle::load(fixture("no_such_bundle.rpmb")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn corrupt_bundle_is_a_load_error() {
    let path = scratch("corrupt.rpmb");
    let mut bytes = Vec::new();
    ModelBundle::load(fixture("credit_risk.json"))
        .unwrap()
        .write_to(&mut bytes)
        .unwrap();
    for b in bytes.iter_mut().skip(12) {
        *b = !*b;
    }
    fs::write(&path, &bytes).unwrap();
    let result = ModelBundle::load(&path);
    fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(LoadError::Decode(_))), "{:?}", result);
}

#[test]
fn oversized_bundle_fails_to_load() {
    let path = scratch("oversized.rpmb");
    let mut payload = vec![0u8, 0, 1, 253];
    payload.extend_from_slice(&(u64::MAX / 16).to_le_bytes());
    let mut bytes = Vec::new();
    bytes.extend_from_slice(riskpredict::bundle::MAGIC);
    bytes.extend_from_slice(&riskpredict::bundle::FORMAT_VERSION.to_le_bytes());
    let mut enc = lz4_flex::frame::FrameEncoder::new(bytes);
    enc.write_all(&payload).unwrap();
    fs::write(&path, enc.finish().unwrap()).unwrap();

    let result = ModelBundle::load(&path);
    fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(LoadError::Decode(_))), "{:?}", result);
}

#[test]
fn always_p1_bundle() {
    let bundle = ModelBundle::new(
        Classifier::direct(
            Model::Prior(PriorModel::constant(4, 0)),
            ["P1", "P2", "P3", "P4"],
        ),
        ["age", "income"],
        ["P1", "P2", "P3", "P4"],
    )
    .unwrap();
    let out = Predictor::new(bundle)
        .predict(&Frame::from_records([record(json!({"age": 30, "income": 50000}))]))
        .unwrap();
    assert_eq!(out.labels, vec!["P1"]);
    assert_eq!(out.probabilities, vec![vec![1.0, 0.0, 0.0, 0.0]]);
}

#[test]
fn encoder_zero_is_p1() {
    let bundle = ModelBundle::new(
        Classifier::encoded(
            Model::Prior(PriorModel::constant(4, 0)),
            LabelEncoder::new(["P1", "P2", "P3", "P4"]),
        ),
        ["age", "income"],
        ["P1", "P2", "P3", "P4"],
    )
    .unwrap();
    let (label, _) = Predictor::new(bundle)
        .predict_one(record(json!({"age": 30, "income": 50000})))
        .unwrap();
    assert_eq!(label, "P1");
}

#[test]
fn aligned_output_uses_class_names() {
    let bundle = ModelBundle::load(fixture("credit_risk.json")).unwrap();
    let predictor = Predictor::with_options(
        bundle,
        PredictOptions {
            probability_order: ProbabilityOrder::ClassNames,
            ..PredictOptions::default()
        },
    )
    .unwrap();
    assert_eq!(
        predictor.probability_labels().unwrap(),
        vec!["P1", "P2", "P3", "P4"]
    );
}

#[test]
fn predictor_is_shareable_across_threads() {
    let predictor = std::sync::Arc::new(load_predictor());
    let expected = predictor.predict(&Frame::from_records(customers())).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let predictor = predictor.clone();
            std::thread::spawn(move || predictor.predict(&Frame::from_records(customers())).unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}
