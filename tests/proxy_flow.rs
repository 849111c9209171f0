//! End-to-end request flows through the HTTP server and a mock origin.

use axum::http::StatusCode;
use bandwidth_hero_proxy::proxy::WELCOME_BODY;
use bandwidth_hero_proxy::ProxyConfig;

mod common;

use common::{client, jpeg_config, photo_jpeg, proxy_url, start_mock_origin, start_proxy, OriginResponse};

#[tokio::test]
async fn test_welcome_without_url() {
    let (proxy, _shutdown) = start_proxy(jpeg_config()).await;

    let res = client().get(proxy_url(proxy, "")).send().await.expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.headers()["cross-origin-embedder-policy"], "require-corp");
    assert_eq!(res.headers()["content-encoding"], "identity");
    assert_eq!(res.text().await.unwrap(), WELCOME_BODY);
}

#[tokio::test]
async fn test_origin_404_passthrough() {
    let (origin, _) = start_mock_origin(OriginResponse::status(404)).await;
    let (proxy, _shutdown) = start_proxy(jpeg_config()).await;

    let res = client()
        .get(proxy_url(proxy, &format!("url=http://{origin}/missing.jpg")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.headers().contains_key("content-security-policy"));
    assert_eq!(res.headers()["content-encoding"], "identity");
    assert!(res.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_origin_redirect_status() {
    let (proxy, _shutdown) = start_proxy(jpeg_config()).await;

    let res = client()
        .get(proxy_url(proxy, "url=http://127.0.0.1:1/a.jpg"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FOUND);
    assert!(res.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_html_is_bypassed() {
    let page = b"<html><body>hello</body></html>".repeat(100);
    let (origin, _) = start_mock_origin(OriginResponse::ok("text/html", page.clone())).await;
    let (proxy, _shutdown) = start_proxy(jpeg_config()).await;

    let res = client()
        .get(proxy_url(proxy, &format!("url=http://{origin}/index.html")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/html");
    assert_eq!(res.headers()["content-encoding"], "identity");
    assert!(!res.headers().contains_key("x-bytes-saved"));
    assert_eq!(res.bytes().await.unwrap().as_ref(), page.as_slice());
}

#[tokio::test]
async fn test_jpeg_is_recompressed() {
    let source = photo_jpeg(160, 120);
    assert!(source.len() > 1024);
    let (origin, _) = start_mock_origin(OriginResponse::ok("image/jpeg", source.clone())).await;
    let (proxy, _shutdown) = start_proxy(jpeg_config()).await;

    let res = client()
        .get(proxy_url(proxy, &format!("url=http://{origin}/photo.jpg&l=80")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/jpeg");
    assert_eq!(res.headers()["content-encoding"], "identity");
    assert_eq!(res.headers()["x-original-size"], source.len().to_string().as_str());

    let saved: i64 = res.headers()["x-bytes-saved"].to_str().unwrap().parse().unwrap();
    assert!(saved > 0);

    let body = res.bytes().await.unwrap();
    assert_eq!(body.len() as i64, source.len() as i64 - saved);
    assert_eq!(&body[..3], &[0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn test_default_config_serves_jpeg() {
    let source = photo_jpeg(160, 120);
    let (origin, _) = start_mock_origin(OriginResponse::ok("image/jpeg", source.clone())).await;
    let mut config = ProxyConfig::default();
    config.observability.metrics_enabled = false;
    let (proxy, _shutdown) = start_proxy(config).await;

    let res = client()
        .get(proxy_url(proxy, &format!("url=http://{origin}/photo.jpg&l=80")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/jpeg");
    let saved: i64 = res.headers()["x-bytes-saved"].to_str().unwrap().parse().unwrap();
    assert!(saved > 0);
    let body = res.bytes().await.unwrap();
    assert_eq!(&body[..3], &[0xFF, 0xD8, 0xFF]);
    assert!(body.len() < source.len());
}

#[tokio::test]
async fn test_webp_when_enabled() {
    let source = photo_jpeg(160, 120);
    let (origin, _) = start_mock_origin(OriginResponse::ok("image/jpeg", source)).await;
    let mut config = jpeg_config();
    config.compression.webp_enabled = true;
    let (proxy, _shutdown) = start_proxy(config).await;

    let res = client()
        .get(proxy_url(proxy, &format!("url=http://{origin}/photo.jpg")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/webp");
    let body = res.bytes().await.unwrap();
    assert_eq!(&body[..4], b"RIFF");
    assert_eq!(&body[8..12], b"WEBP");
}

#[tokio::test]
async fn test_truncated_jpeg_returns_original() {
    let truncated = photo_jpeg(64, 64)[..20].to_vec();
    let (origin, _) = start_mock_origin(OriginResponse::ok("image/jpeg", truncated.clone())).await;
    let mut config = jpeg_config();
    config.compression.min_compress_length = 0;
    let (proxy, _shutdown) = start_proxy(config).await;

    let res = client()
        .get(proxy_url(proxy, &format!("url=http://{origin}/broken.jpg")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-bytes-saved"], "0");
    assert_eq!(res.headers()["x-original-size"], "20");
    assert_eq!(res.bytes().await.unwrap().as_ref(), truncated.as_slice());
}

#[tokio::test]
async fn test_half_downloaded_jpeg_returns_original() {
    let source = photo_jpeg(160, 120);
    let half = source[..source.len() / 2].to_vec();
    assert!(half.len() > 1024);
    let (origin, _) = start_mock_origin(OriginResponse::ok("image/jpeg", half.clone())).await;
    let (proxy, _shutdown) = start_proxy(jpeg_config()).await;

    let res = client()
        .get(proxy_url(proxy, &format!("url=http://{origin}/cut.jpg")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/jpeg");
    assert_eq!(res.headers()["x-bytes-saved"], "0");
    assert_eq!(res.bytes().await.unwrap().as_ref(), half.as_slice());
}

#[tokio::test]
async fn test_bmi_prefix_and_forwarded_headers() {
    let (origin, seen) = start_mock_origin(OriginResponse::ok("text/plain", b"ok".to_vec())).await;
    let (proxy, _shutdown) = start_proxy(jpeg_config()).await;

    let res = client()
        .get(proxy_url(
            proxy,
            &format!("url=http://1.1.0.0/bmi/http://{origin}/pic.png"),
        ))
        .header("cookie", "session=abc")
        .header("authorization", "Bearer secret")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let requests = seen.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let head = requests[0].to_ascii_lowercase();
    assert!(head.starts_with("get /pic.png "), "{head}");
    assert!(head.contains("cookie: session=abc"));
    assert!(head.contains("user-agent: bandwidth-hero compressor"));
    assert!(head.contains("via: 1.1 bandwidth-hero"));
    assert!(head.contains("x-forwarded-for: 127.0.0.1"));
    assert!(!head.contains("authorization"));
}

#[tokio::test]
async fn test_compression_disabled_passes_images_through() {
    let source = photo_jpeg(96, 96);
    let (origin, _) = start_mock_origin(OriginResponse::ok("image/jpeg", source.clone())).await;
    let mut config = jpeg_config();
    config.compression.enabled = false;
    let (proxy, _shutdown) = start_proxy(config).await;

    let res = client()
        .get(proxy_url(proxy, &format!("url=http://{origin}/photo.jpg")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(!res.headers().contains_key("x-bytes-saved"));
    assert_eq!(res.bytes().await.unwrap().as_ref(), source.as_slice());
}
