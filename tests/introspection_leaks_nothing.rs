use axum::body::to_bytes;
use axum::http::StatusCode;
use serde_json::Value;
use tower::ServiceExt;

use authkeep::config::AuthServerConfig;

mod common;
use common::post_form;

async fn test_server() -> authkeep::AuthServer {
    authkeep::bootstrap(AuthServerConfig::default()).await.expect("bootstrap")
}

async fn introspect(server: &authkeep::AuthServer, token: &str) -> (StatusCode, Value) {
    let resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/introspect", format!("token={token}")))
        .await
        .unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn malformed_and_unknown_tokens_never_error_out() {
    let server = test_server().await;

    for token in [
        "not-a-jwt-at-all",
        "",
        "aaaa.bbbb.cccc",
        "eyJhbGciOiJub25lIn0.eyJzdWIiOiJldmlsIn0.",
    ] {
        let (status, body) = introspect(&server, token).await;
        assert_eq!(status, StatusCode::OK, "introspection must always answer 200, got it for {token:?}");
        assert_eq!(body, serde_json::json!({ "active": false }));
        assert!(
            body.get("error").is_none(),
            "introspection response must never carry an error field"
        );
    }
}
