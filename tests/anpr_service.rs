/// Integration tests for the plate recognition HTTP surface
use anpr_service::{
    api,
    recognition::{
        CandidateSelector, PipelineConfig, PlateBox, PlateDetector, PlatePipeline, PlateShape,
        Reading, RecognitionError, TextReader,
    },
    AnprState,
};
use async_trait::async_trait;
use axum_test::{
    multipart::{MultipartForm, Part},
    TestServer,
};
use image::{DynamicImage, ImageFormat};
use serde_json::Value;
use std::{io::Cursor, sync::Arc};

const MAX_UPLOAD: usize = 1024 * 1024;

/// Reports the same boxes for every image
struct StaticDetector(Vec<PlateBox>);

#[async_trait]
impl PlateDetector for StaticDetector {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn detect(&self, _image: Arc<DynamicImage>) -> Result<Vec<PlateBox>, RecognitionError> {
        Ok(self.0.clone())
    }
}

/// Answers each box with the table rows recorded for it
struct TableReader(Vec<(PlateBox, &'static str, f32)>);

#[async_trait]
impl TextReader for TableReader {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn read(&self, _crop: DynamicImage, source: PlateBox) -> Result<Vec<Reading>, RecognitionError> {
        Ok(self
            .0
            .iter()
            .filter(|(plate, _, _)| *plate == source)
            .map(|(_, text, conf)| Reading::new(*text, *conf, source))
            .collect())
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn upload(bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(bytes).file_name("car.png").mime_type("image/png"),
    )
}

fn server_with(boxes: Vec<PlateBox>, readings: Vec<(PlateBox, &'static str, f32)>) -> TestServer {
    let pipeline = PlatePipeline::new(
        Arc::new(StaticDetector(boxes)),
        Arc::new(TableReader(readings)),
        CandidateSelector::new(PlateShape::default(), " "),
        PipelineConfig::default(),
    );
    let state = AnprState::new("test-node", pipeline);
    TestServer::new(api::router(state, MAX_UPLOAD)).unwrap()
}

#[tokio::test]
async fn test_health_reports_node() {
    let server = TestServer::new(api::router(AnprState::without_models("node-a"), MAX_UPLOAD)).unwrap();

    let response = server.get("/healthz").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["node_id"], "node-a");
}

#[tokio::test]
async fn test_not_ready_without_models() {
    let server = TestServer::new(api::router(AnprState::without_models("node-a"), MAX_UPLOAD)).unwrap();

    let response = server.get("/readyz").await;
    assert_eq!(response.status_code(), 503);

    let response = server.post("/recognize-plate").multipart(upload(png(32, 16))).await;
    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert_eq!(body["error"], "models are not loaded");
}

#[tokio::test]
async fn test_concatenate_two_plates() {
    let left = PlateBox::new(0, 0, 40, 20);
    let right = PlateBox::new(60, 0, 100, 20);
    let server = server_with(
        vec![left, right],
        vec![(left, "AB", 0.9), (left, "1234", 0.8), (right, "XY 99", 0.7)],
    );

    let response = server.post("/recognize-plate").multipart(upload(png(120, 40))).await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["plates"], serde_json::json!(["AB 1234", "XY99"]));
}

#[tokio::test]
async fn test_best_match_endpoint_and_query() {
    let plate = PlateBox::new(10, 10, 90, 40);
    let readings = vec![(plate, "AB 1234", 0.6), (plate, "ZZ 99", 0.9), (plate, "hello", 0.99)];

    let server = server_with(vec![plate], readings.clone());
    let response = server
        .post("/recognize-plate/best")
        .multipart(upload(png(100, 50)))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["plate"], "ZZ99");
    assert_eq!(body["box"], serde_json::json!([10, 10, 90, 40]));

    let server = server_with(vec![plate], readings);
    let response = server
        .post("/recognize-plate")
        .add_query_param("policy", "best_match")
        .multipart(upload(png(100, 50)))
        .await;
    let body: Value = response.json();
    assert_eq!(body["plate"], "ZZ99");
}

#[tokio::test]
async fn test_nothing_found_shapes() {
    let server = server_with(Vec::new(), Vec::new());

    let body: Value = server
        .post("/recognize-plate")
        .multipart(upload(png(64, 32)))
        .await
        .json();
    assert_eq!(body["plates"], serde_json::json!([]));

    let body: Value = server
        .post("/recognize-plate/best")
        .multipart(upload(png(64, 32)))
        .await
        .json();
    assert!(body["plate"].is_null());
    assert!(body["box"].is_null());
    assert_eq!(body["confidence"], 0.0);
}

#[tokio::test]
async fn test_rejects_bad_uploads() {
    let server = server_with(Vec::new(), Vec::new());

    let response = server
        .post("/recognize-plate")
        .multipart(upload(b"definitely not an image".to_vec()))
        .await;
    assert_eq!(response.status_code(), 400);

    let wrong_field = MultipartForm::new().add_part("image", Part::bytes(png(8, 8)));
    let response = server.post("/recognize-plate").multipart(wrong_field).await;
    assert_eq!(response.status_code(), 400);

    let response = server
        .post("/recognize-plate")
        .add_query_param("policy", "loudest")
        .multipart(upload(png(8, 8)))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_metrics_exposed() {
    let server = server_with(Vec::new(), Vec::new());
    server
        .post("/recognize-plate")
        .multipart(upload(png(16, 16)))
        .await;

    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.text().contains("anpr_recognitions_total"));
}
