//! End-to-end tests through the HTTP router

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

use crate::config::{ScratchConfig, ServerConfig};
use crate::convert::scratch::file_count;
use crate::convert::Transcoder;
use crate::http::create_router;
use crate::state::AppState;

#[cfg(unix)]
use super::fixtures::{fake_transcoder, write_fake_transcoder, FakeTranscoder};

fn test_config(root: &TempDir) -> ServerConfig {
    ServerConfig {
        scratch: ScratchConfig {
            upload_dir: root.path().join("tmp_uploads"),
            output_dir: root.path().join("tmp_outputs"),
            stale_after_secs: 3600,
        },
        ..Default::default()
    }
}

fn test_app(config: ServerConfig, transcoder: Transcoder) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, transcoder));
    (create_router(state.clone()), state)
}

fn no_transcoder() -> Transcoder {
    Transcoder::new(None, 2, Duration::from_secs(1))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn upload(name: &str, data: &[u8]) -> Value {
    json!({ "fileName": name, "fileData": STANDARD.encode(data) })
}

fn assert_scratch_empty(state: &AppState) {
    assert_eq!(file_count(state.converter.scratch.upload_dir()), 0);
    assert_eq!(file_count(state.converter.scratch.output_dir()), 0);
}

#[tokio::test]
async fn test_liveness() {
    let root = TempDir::new().unwrap();
    let (app, _) = test_app(test_config(&root), no_transcoder());

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["message"].as_str().unwrap().contains("3001"));
}

#[tokio::test]
async fn test_health_without_transcoder() {
    let root = TempDir::new().unwrap();
    let (app, _) = test_app(test_config(&root), no_transcoder());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
    assert!(body["transcoder"].is_null());
}

#[tokio::test]
async fn test_tool_unavailable() {
    let root = TempDir::new().unwrap();
    let (app, state) = test_app(test_config(&root), no_transcoder());

    let (status, body) = post_json(app, "/convert/m4a-to-mp3", upload("song.m4a", b"x")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["detail"].as_str().unwrap().contains("FFMPEG_PATH"));
    assert!(!state.converter.scratch.upload_dir().exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_health_with_transcoder() {
    let root = TempDir::new().unwrap();
    let transcoder = fake_transcoder(root.path(), FakeTranscoder::Mp3)
        .with_probed_version()
        .await;
    let binary = transcoder.binary().unwrap().to_path_buf();
    let (app, _) = test_app(test_config(&root), transcoder);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcoder"]["version"], "fake ffmpeg version 0.0");
    assert_eq!(
        body["transcoder"]["path"],
        binary.to_string_lossy().as_ref()
    );

    // The version comes from startup, not from running the binary per request.
    std::fs::remove_file(&binary).unwrap();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcoder"]["version"], "fake ffmpeg version 0.0");
}

#[cfg(unix)]
#[tokio::test]
async fn test_m4a_to_mp3() {
    let root = TempDir::new().unwrap();
    let (app, state) = test_app(
        test_config(&root),
        fake_transcoder(root.path(), FakeTranscoder::Mp3),
    );

    let (status, body) =
        post_json(app, "/convert/m4a-to-mp3", upload("song.m4a", b"m4a audio")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["fileName"], "song.mp3");
    let mp3 = STANDARD.decode(body["fileData"].as_str().unwrap()).unwrap();
    assert_eq!(mp3, b"ID3m4a audio");
    assert_scratch_empty(&state);
}

#[cfg(unix)]
#[tokio::test]
async fn test_ogg_to_mp3_with_data_uri() {
    let root = TempDir::new().unwrap();
    let (app, state) = test_app(
        test_config(&root),
        fake_transcoder(root.path(), FakeTranscoder::Mp3),
    );

    let body = json!({
        "fileName": "Voice Memo #3 ✓.OGG",
        "fileData": format!("data:audio/ogg;base64,{}", STANDARD.encode(b"OggS")),
    });
    let (status, body) = post_json(app, "/convert/ogg-to-mp3", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fileName"], "Voice_Memo__3__.mp3");
    assert_scratch_empty(&state);
}

#[cfg(unix)]
#[tokio::test]
async fn test_validation_errors() {
    let root = TempDir::new().unwrap();
    let (app, state) = test_app(
        test_config(&root),
        fake_transcoder(root.path(), FakeTranscoder::Mp3),
    );

    let cases = [
        (
            "/convert/ogg-to-mp3",
            upload("a.mp3", b"data"),
            "Please choose a file with the .ogg extension.",
        ),
        (
            "/convert/m4a-to-mp3",
            upload("a.wav", b"data"),
            "Please choose a file with the .m4a extension.",
        ),
        (
            "/convert/m4a-to-mp3",
            json!({ "fileName": "a.m4a" }),
            "Missing file name or file data.",
        ),
        (
            "/convert/m4a-to-mp3",
            json!({ "fileName": "", "fileData": "YWJj" }),
            "Missing file name or file data.",
        ),
        (
            "/convert/m4a-to-mp3",
            json!({ "fileName": "a.m4a", "fileData": "%%%not base64%%%" }),
            "File data is not valid Base64.",
        ),
        (
            "/convert/m4a-to-mp3",
            json!({ "fileName": "a.m4a", "fileData": "data:audio/mp4;base64," }),
            "Uploaded file content is empty.",
        ),
    ];

    for (uri, body, message) in cases {
        let (status, body) = post_json(app.clone(), uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{message}");
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], message);
        assert!(body.get("detail").is_none());
    }

    // Nothing was staged for rejected requests.
    assert!(!state.converter.scratch.upload_dir().exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_file_too_large() {
    let root = TempDir::new().unwrap();
    let mut config = test_config(&root);
    config.limits.max_file_size_mb = 1;
    let (app, _) = test_app(config, fake_transcoder(root.path(), FakeTranscoder::Mp3));

    let data = vec![0u8; 1024 * 1024 + 1];
    let (status, body) = post_json(app, "/convert/m4a-to-mp3", upload("big.m4a", &data)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File exceeds 1MB and cannot be processed.");
}

#[tokio::test]
async fn test_body_limit() {
    let root = TempDir::new().unwrap();
    let mut config = test_config(&root);
    config.limits.max_body_size_mb = 1;
    let (app, _) = test_app(config, no_transcoder());

    let data = vec![0u8; 1024 * 1024];
    let (status, body) = post_json(app, "/convert/m4a-to-mp3", upload("big.m4a", &data)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_malformed_json() {
    let root = TempDir::new().unwrap();
    let (app, _) = test_app(test_config(&root), no_transcoder());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/convert/ogg-to-mp3")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[cfg(unix)]
#[tokio::test]
async fn test_transcoder_failure() {
    let root = TempDir::new().unwrap();
    let (app, state) = test_app(
        test_config(&root),
        fake_transcoder(root.path(), FakeTranscoder::Fail),
    );

    let (status, body) = post_json(app, "/convert/ogg-to-mp3", upload("a.ogg", b"junk")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Transcoding failed.");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Invalid data found when processing input"));
    assert_scratch_empty(&state);
}

#[cfg(unix)]
#[tokio::test]
async fn test_transcoder_timeout() {
    let root = TempDir::new().unwrap();
    let binary = write_fake_transcoder(root.path(), FakeTranscoder::Hang);
    let (app, state) = test_app(
        test_config(&root),
        Transcoder::new(Some(binary), 2, Duration::from_millis(200)),
    );

    let started = std::time::Instant::now();
    let (status, body) = post_json(app, "/convert/m4a-to-mp3", upload("slow.m4a", b"m4a")).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Transcoding failed.");
    assert!(body["detail"].as_str().unwrap().contains("200ms"));
    assert!(state.converter.scratch.upload_dir().is_dir());
    assert_scratch_empty(&state);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests() {
    let root = TempDir::new().unwrap();
    let (app, state) = test_app(
        test_config(&root),
        fake_transcoder(root.path(), FakeTranscoder::Mp3),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let payload = format!("clip number {i}");
                let uri = if i % 2 == 0 {
                    "/convert/m4a-to-mp3"
                } else {
                    "/convert/ogg-to-mp3"
                };
                let ext = if i % 2 == 0 { "m4a" } else { "ogg" };
                let (status, body) =
                    post_json(app, uri, upload(&format!("clip{i}.{ext}"), payload.as_bytes()))
                        .await;
                (i, payload, status, body)
            })
        })
        .collect();

    for handle in handles {
        let (i, payload, status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fileName"], format!("clip{i}.mp3"));
        let mp3 = STANDARD.decode(body["fileData"].as_str().unwrap()).unwrap();
        assert_eq!(&mp3[3..], payload.as_bytes());
    }
    assert_scratch_empty(&state);
}

/// Full conversion with a real ffmpeg, skipped when none with libmp3lame is
/// installed.
#[tokio::test]
async fn test_real_ffmpeg_produces_mp3() {
    let Some(ffmpeg) = crate::convert::transcoder::locate(None) else {
        return;
    };
    let encoders = tokio::process::Command::new(&ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
        .await
        .unwrap();
    if !String::from_utf8_lossy(&encoders.stdout).contains("libmp3lame") {
        return;
    }

    let root = TempDir::new().unwrap();
    let source = root.path().join("tone.m4a");
    let status = tokio::process::Command::new(&ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg("sine=frequency=440:duration=1")
        .args(["-c:a", "aac"])
        .arg(&source)
        .status()
        .await
        .unwrap();
    if !status.success() {
        return;
    }

    let (app, state) = test_app(
        test_config(&root),
        Transcoder::new(Some(ffmpeg), 2, Duration::from_secs(60)),
    );
    let data = std::fs::read(&source).unwrap();
    let (status, body) = post_json(app, "/convert/m4a-to-mp3", upload("tone.m4a", &data)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let mp3 = STANDARD.decode(body["fileData"].as_str().unwrap()).unwrap();
    let is_id3 = mp3.starts_with(b"ID3");
    let is_frame_sync = mp3.len() > 2 && mp3[0] == 0xFF && (mp3[1] & 0xE0) == 0xE0;
    assert!(is_id3 || is_frame_sync);
    assert_scratch_empty(&state);
}
