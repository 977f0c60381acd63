use axum::http::StatusCode;
use serde_json::Value;
use tower::ServiceExt;

use authkeep::config::AuthServerConfig;
use authkeep::store::Client;

mod common;
use common::post_form;

async fn test_server() -> authkeep::AuthServer {
    let config = AuthServerConfig::default();
    authkeep::bootstrap(config).await.expect("bootstrap")
}

#[tokio::test]
async fn client_credentials_happy_path() {
    let server = test_server().await;
    server
        .state
        .clients
        .insert(Client {
            client_id: "svc-1".to_string(),
            secrets: vec!["s3cret".to_string()],
            name: "service one".to_string(),
            redirect_uris: vec![],
            allowed_scopes: vec!["profile".to_string()],
            grant_types: vec!["client_credentials".to_string()],
            response_types: vec![],
            token_endpoint_auth_method: "client_secret_post".to_string(),
            require_pkce: false,
            active: true,
            tenant_id: None,
        })
        .await
        .unwrap();

    let req = post_form(
        "/oauth/token",
        "grant_type=client_credentials&client_id=svc-1&client_secret=s3cret&scope=profile",
    );

    let resp = server.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["token_type"], "Bearer");
    assert!(json["access_token"].as_str().unwrap().split('.').count() == 3);
    assert!(json.get("refresh_token").is_none());
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let server = test_server().await;
    server
        .state
        .clients
        .insert(Client {
            client_id: "svc-2".to_string(),
            secrets: vec!["right".to_string()],
            name: "service two".to_string(),
            redirect_uris: vec![],
            allowed_scopes: vec![],
            grant_types: vec!["client_credentials".to_string()],
            response_types: vec![],
            token_endpoint_auth_method: "client_secret_post".to_string(),
            require_pkce: false,
            active: true,
            tenant_id: None,
        })
        .await
        .unwrap();

    let req = post_form(
        "/oauth/token",
        "grant_type=client_credentials&client_id=svc-2&client_secret=wrong",
    );

    let resp = server.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
