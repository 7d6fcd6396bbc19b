//! HTTP asset resolver tests against a local axum server

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use imgcap_enrich::models::Dimensions;
use imgcap_enrich::services::asset_resolver::{AssetResolver, FetchError, HttpAssetResolver};
use imgcap_enrich::services::probe_dimensions;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

struct ImageHost {
    png: Vec<u8>,
    hits: AtomicUsize,
}

async fn serve_png(State(host): State<Arc<ImageHost>>) -> impl IntoResponse {
    host.hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], host.png.clone())
}

/// Start an image host on an ephemeral port
async fn start_image_host() -> (String, Arc<ImageHost>) {
    let mut png = Vec::new();
    image::RgbImage::new(32, 16)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    let host = Arc::new(ImageHost {
        png,
        hits: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/img/logo.png", get(serve_png))
        .route("/gone.png", get(|| async { StatusCode::GONE }))
        .with_state(host.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), host)
}

#[tokio::test]
async fn test_download_once_then_cache_hit() {
    let (base, host) = start_image_host().await;
    let temp_dir = TempDir::new().unwrap();
    let cache_dir = temp_dir.path().join("images");
    let resolver = HttpAssetResolver::new(&cache_dir).unwrap();
    let url = format!("{}/img/logo.png", base);

    let first = resolver.resolve(&url).await.unwrap();
    let second = resolver.resolve(&url).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first, resolver.cached_path(&url));
    assert!(first.starts_with(&cache_dir));
    assert_eq!(first.extension().unwrap(), "png");
    assert_eq!(host.hits.load(Ordering::SeqCst), 1);
    assert_eq!(probe_dimensions(&first).await, Dimensions::new(32, 16));

    let leftovers: Vec<_> = std::fs::read_dir(&cache_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_non_success_status_is_fetch_error() {
    let (base, _host) = start_image_host().await;
    let temp_dir = TempDir::new().unwrap();
    let resolver = HttpAssetResolver::new(temp_dir.path()).unwrap();

    let gone = resolver.resolve(&format!("{}/gone.png", base)).await.unwrap_err();
    assert!(matches!(gone, FetchError::Status { status: 410, .. }));

    let missing = resolver.resolve(&format!("{}/nope.jpg", base)).await.unwrap_err();
    assert!(matches!(missing, FetchError::Status { status: 404, .. }));
    assert!(missing.to_string().contains("(404)"));

    assert!(!resolver.cached_path(&format!("{}/gone.png", base)).exists());
}

#[tokio::test]
async fn test_existing_file_is_never_refetched() {
    let temp_dir = TempDir::new().unwrap();
    let resolver = HttpAssetResolver::new(temp_dir.path()).unwrap();
    // Nothing listens here; a network attempt would fail
    let url = "http://127.0.0.1:9/cached.gif";
    std::fs::write(resolver.cached_path(url), b"GIF89a").unwrap();

    assert_eq!(resolver.resolve(url).await.unwrap(), resolver.cached_path(url));
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let temp_dir = TempDir::new().unwrap();
    let resolver = HttpAssetResolver::new(temp_dir.path()).unwrap();

    let err = resolver.resolve("http://127.0.0.1:9/a.png").await.unwrap_err();
    assert!(matches!(err, FetchError::Network { .. }));
}
