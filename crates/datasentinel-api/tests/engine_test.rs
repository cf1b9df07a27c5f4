mod helpers;

use datasentinel_processing::{read_dataset, DType, FileFormat};
use helpers::{path, setup_test_app, BUCKET};
use serde_json::{json, Value};

const PEOPLE_CSV: &str = "id,age,city\n1,34,Paris\n2,29,Lyon\n3,41,Paris\n4,,Nice\n";

fn labelled_csv() -> String {
    let mut csv = String::from("x,y,label\n");
    for i in 1..=20 {
        let label = if i <= 10 { "low" } else { "high" };
        csv.push_str(&format!("{},{},{}\n", i, i % 3, label));
    }
    csv
}

#[tokio::test]
async fn test_health_at_root_and_base_path() {
    let app = setup_test_app().await;

    for p in ["/health".to_string(), path("/health")] {
        let response = app.client().get(&p).await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.json::<Value>(), json!({"status": "ok"}));
    }
}

#[tokio::test]
async fn test_health_answers_head() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .method(axum::http::Method::HEAD, "/health")
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_responses_carry_security_headers() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("content-security-policy").is_some());
}

#[tokio::test]
async fn test_engine_root() {
    let app = setup_test_app().await;

    let response = app.client().get(&path("/api/")).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.json::<Value>(),
        json!({"status": "ok", "message": "Service is healthy"})
    );
}

#[tokio::test]
async fn test_convert_and_upload_csv_to_json() {
    let app = setup_test_app().await;
    app.put("raw/people.csv", PEOPLE_CSV).await;

    let response = app
        .client()
        .post(&path("/api/convert-and-upload"))
        .add_query_param("filename", "raw/people.csv")
        .add_query_param("source_format", "csv")
        .add_query_param("target_format", "json")
        .await;
    assert_eq!(response.status_code(), 200);

    let body = response.json::<Value>();
    assert_eq!(body["message"], "Conversion successful");
    let uri = body["converted_file_path"].as_str().unwrap();
    assert!(uri.starts_with("file://"));
    assert!(uri.ends_with("converted/people_converted.json"));

    let records: Value = serde_json::from_slice(&app.get("converted/people_converted.json").await)
        .expect("Converted file should be JSON");
    assert_eq!(records.as_array().unwrap().len(), 4);
    assert_eq!(records[0]["city"], "Paris");
    assert_eq!(records[3]["age"], Value::Null);
}

#[tokio::test]
async fn test_convert_rejects_unknown_format_and_missing_file() {
    let app = setup_test_app().await;
    app.put("raw/people.csv", PEOPLE_CSV).await;

    let response = app
        .client()
        .post(&path("/api/convert-and-upload"))
        .add_query_param("filename", "raw/people.csv")
        .add_query_param("source_format", "csv")
        .add_query_param("target_format", "xml")
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .client()
        .post(&path("/api/convert-and-upload"))
        .add_query_param("filename", "raw/absent.csv")
        .add_query_param("source_format", "csv")
        .add_query_param("target_format", "json")
        .await;
    assert_eq!(response.status_code(), 404);

    let response = app
        .client()
        .post(&path("/api/convert-and-upload"))
        .add_query_param("source_format", "csv")
        .add_query_param("target_format", "json")
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_validate_writes_results() {
    let app = setup_test_app().await;
    app.put("raw/people.csv", PEOPLE_CSV).await;

    let response = app
        .client()
        .post(&path("/api/validate"))
        .json(&json!({"bucket": BUCKET, "name": "raw/people.csv"}))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.json::<Value>(),
        json!({"status": "success", "file": "raw/people.csv"})
    );

    let report: Value =
        serde_json::from_slice(&app.get("validation-results/raw/people.csv.results.json").await)
            .expect("Report should be JSON");
    assert_eq!(report["status"], "passed");
    assert_eq!(report["total_rows"], 4);
}

#[tokio::test]
async fn test_validate_rejections() {
    let app = setup_test_app().await;
    app.put("raw/people.csv", PEOPLE_CSV).await;

    let cases = [
        json!({"bucket": "someone-elses-bucket", "name": "raw/people.csv"}),
        json!({"bucket": BUCKET}),
        json!({"bucket": BUCKET, "name": "raw/notes.txt"}),
        json!({"bucket": BUCKET, "name": "raw/people.xlsx"}),
    ];
    for body in cases {
        let response = app.client().post(&path("/api/validate")).json(&body).await;
        assert_eq!(response.status_code(), 400, "body: {}", body);
    }
}

#[tokio::test]
async fn test_normalize_ignores_unsupported_files() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&path("/api/normalize"))
        .json(&json!({"name": "raw/photo.png", "bucket": BUCKET}))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.json::<Value>(),
        json!({"message": "Ignored unsupported file: raw/photo.png"})
    );
}

#[tokio::test]
async fn test_normalize_writes_scaled_parquet() {
    let app = setup_test_app().await;
    app.put("raw/people.csv", PEOPLE_CSV).await;

    let response = app
        .client()
        .post(&path("/api/normalize"))
        .json(&json!({"name": "raw/people.csv", "bucket": BUCKET}))
        .await;
    assert_eq!(response.status_code(), 200);

    let body = response.json::<Value>();
    assert_eq!(body["message"], "Normalization complete");
    assert!(body["output_path"]
        .as_str()
        .unwrap()
        .ends_with("normalized/people_normalized.parquet"));

    let bytes = app.get("normalized/people_normalized.parquet").await;
    let output = read_dataset(&bytes, FileFormat::Parquet).expect("Output should be Parquet");
    assert_eq!(&output.column_names()[..2], &["id", "age"]);
    assert_eq!(output.column("age").unwrap().dtype(), DType::Float64);
    assert_eq!(output.column("age").unwrap().null_count(), 0);
}

#[tokio::test]
async fn test_normalized_parquet_feeds_validation() {
    let app = setup_test_app().await;
    app.put("raw/people.csv", PEOPLE_CSV).await;

    let response = app
        .client()
        .post(&path("/api/normalize"))
        .json(&json!({"name": "raw/people.csv", "bucket": BUCKET}))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = app
        .client()
        .post(&path("/api/validate"))
        .json(&json!({"bucket": BUCKET, "name": "normalized/people_normalized.parquet"}))
        .await;
    assert_eq!(response.status_code(), 200);

    let report: Value = serde_json::from_slice(
        &app.get("validation-results/normalized/people_normalized.parquet.results.json")
            .await,
    )
    .expect("Validation results should be JSON");
    assert_eq!(report["total_rows"], 4);
}

#[tokio::test]
async fn test_normalize_missing_object_is_not_found() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&path("/api/normalize"))
        .json(&json!({"name": "raw/absent.csv", "bucket": BUCKET}))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_profile_with_baseline_reports_drift() {
    let app = setup_test_app().await;
    app.put("raw/baseline.csv", "v\n1\n2\n3\n4\n5\n6\n7\n8\n").await;
    app.put("raw/current.csv", "v\n11\n12\n13\n14\n15\n16\n17\n18\n")
        .await;

    let response = app
        .client()
        .post(&path("/api/profile"))
        .json(&json!({
            "bucket_name": BUCKET,
            "current_blob": "raw/current.csv",
            "baseline_blob": "raw/baseline.csv"
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body = response.json::<Value>();
    assert!(body["profile_url"]
        .as_str()
        .unwrap()
        .ends_with("profiling/current_profile.json"));
    assert!(body["drift_url"]
        .as_str()
        .unwrap()
        .ends_with("profiling/current_drift.json"));

    let drift: Value = serde_json::from_slice(&app.get("profiling/current_drift.json").await)
        .expect("Drift report should be JSON");
    assert_eq!(drift["v"]["drift_by_psi"], true);
}

#[tokio::test]
async fn test_profile_without_baseline_has_no_drift() {
    let app = setup_test_app().await;
    app.put("raw/people.csv", PEOPLE_CSV).await;

    let response = app
        .client()
        .post(&path("/api/profile"))
        .json(&json!({"bucket_name": BUCKET, "current_blob": "raw/people.csv"}))
        .await;
    assert_eq!(response.status_code(), 200);
    assert!(response.json::<Value>().get("drift_url").is_none());

    let profile: Value = serde_json::from_slice(&app.get("profiling/people_profile.json").await)
        .expect("Profile should be JSON");
    assert_eq!(profile["total_rows"], 4);
    assert_eq!(profile["columns"]["age"]["null_count"], 1);
}

#[tokio::test]
async fn test_columns_lists_file_order() {
    let app = setup_test_app().await;
    app.put("scaled/people.csv", PEOPLE_CSV).await;

    let response = app
        .client()
        .post(&path("/api/columns"))
        .json(&json!({"bucket_name": BUCKET, "scaled_blob_path": "scaled/people.csv"}))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.json::<Value>(),
        json!({"columns": ["id", "age", "city"]})
    );

    let response = app
        .client()
        .post(&path("/api/columns"))
        .json(&json!({"bucket_name": BUCKET}))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_predict_writes_parquet_and_json() {
    let app = setup_test_app().await;
    app.put("scaled/data.csv", &labelled_csv()).await;

    let response = app
        .client()
        .post(&path("/api/predict"))
        .json(&json!({
            "bucket_name": BUCKET,
            "scaled_blob_path": "scaled/data.csv",
            "target_column": "label"
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body = response.json::<Value>();
    assert_eq!(body["message"], "Prediction completed");
    assert_eq!(body["target_used"], "label");
    assert!(body["parquet"]
        .as_str()
        .unwrap()
        .ends_with("scaled/data_predictions.parquet"));
    assert!(body["json"]
        .as_str()
        .unwrap()
        .ends_with("scaled/data_predictions.json"));
    assert!(body["report"]["accuracy"].is_number());

    let bytes = app.get("scaled/data_predictions.parquet").await;
    let output = read_dataset(&bytes, FileFormat::Parquet).expect("Output should be Parquet");
    assert_eq!(output.column_names(), vec!["x", "y", "label", "prediction"]);
    assert_eq!(output.n_rows(), 20);

    let records: Value = serde_json::from_slice(&app.get("scaled/data_predictions.json").await)
        .expect("Predictions should be JSON");
    assert_eq!(records.as_array().unwrap().len(), 20);
    assert!(records[0].get("prediction").is_some());
}

#[tokio::test]
async fn test_predictions_for_sibling_files_do_not_overwrite() {
    let app = setup_test_app().await;
    app.put("uploads/a1_first.csv", &labelled_csv()).await;
    app.put("uploads/b2_second.csv", &labelled_csv().replace("low", "small"))
        .await;

    for blob in ["uploads/a1_first.csv", "uploads/b2_second.csv"] {
        let response = app
            .client()
            .post(&path("/api/predict"))
            .json(&json!({
                "bucket_name": BUCKET,
                "scaled_blob_path": blob,
                "target_column": "label"
            }))
            .await;
        assert_eq!(response.status_code(), 200, "blob: {}", blob);
    }

    let first: Value =
        serde_json::from_slice(&app.get("uploads/a1_first_predictions.json").await).unwrap();
    let second: Value =
        serde_json::from_slice(&app.get("uploads/b2_second_predictions.json").await).unwrap();
    let labels = |records: &Value| -> Vec<String> {
        records
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["prediction"].as_str().unwrap_or_default().to_string())
            .collect()
    };
    assert!(labels(&first).iter().all(|l| l != "small"));
    assert!(labels(&second).iter().all(|l| l != "low"));
}

#[tokio::test]
async fn test_predict_unknown_target_is_bad_request() {
    let app = setup_test_app().await;
    app.put("scaled/data.csv", &labelled_csv()).await;

    let response = app
        .client()
        .post(&path("/api/predict"))
        .json(&json!({
            "bucket_name": BUCKET,
            "scaled_blob_path": "scaled/data.csv",
            "target_column": "missing"
        }))
        .await;
    assert_eq!(response.status_code(), 400);
    assert!(response.json::<Value>()["code"].is_string());
}
