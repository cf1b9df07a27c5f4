mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::{path, setup_test_app, TestApp};

fn stored_uploads(app: &TestApp) -> usize {
    let dir = app._temp_dir.path().join("uploads");
    if !dir.exists() {
        return 0;
    }
    std::fs::read_dir(dir).expect("uploads dir should be readable").count()
}

fn csv_part(name: &str, body: &str) -> Part {
    Part::bytes(body.as_bytes().to_vec())
        .file_name(name.to_string())
        .mime_type("text/csv")
}

#[tokio::test]
async fn test_failed_normalization_removes_upload() {
    let app = setup_test_app().await;
    let cookie = app.session_cookie("ada@example.com", false);

    let form = MultipartForm::new().add_part("file", csv_part("broken.csv", "a,b\n1,2,3\n"));
    let response = app
        .client()
        .post(&path("/normalization"))
        .add_header("cookie", cookie)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(stored_uploads(&app), 0);
}

#[tokio::test]
async fn test_failed_profiling_removes_both_uploads() {
    let app = setup_test_app().await;
    let cookie = app.session_cookie("ada@example.com", false);

    let form = MultipartForm::new()
        .add_part("file", csv_part("current.csv", "v\n1\n2\n"))
        .add_part("baseline", csv_part("baseline.csv", "v\n1,2,3\n"));
    let response = app
        .client()
        .post(&path("/profiling"))
        .add_header("cookie", cookie)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(stored_uploads(&app), 0);
}

#[tokio::test]
async fn test_failed_conversion_removes_upload() {
    let app = setup_test_app().await;
    let cookie = app.session_cookie("ada@example.com", false);

    let form = MultipartForm::new()
        .add_text("target_format", "excel")
        .add_part("file", csv_part("sales.csv", "id,amount\n1,9.5\n"));
    let response = app
        .client()
        .post(&path("/convert"))
        .add_header("cookie", cookie)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 415);
    assert_eq!(stored_uploads(&app), 0);
}
