use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use authkeep::config::AuthServerConfig;
use authkeep::store::Client;

mod common;
use common::post_form;

async fn test_server() -> authkeep::AuthServer {
    authkeep::bootstrap(AuthServerConfig::default()).await.expect("bootstrap")
}

#[tokio::test]
async fn tokens_minted_before_rotation_still_verify_after() {
    let server = test_server().await;
    server
        .state
        .clients
        .insert(Client {
            client_id: "svc-3".to_string(),
            secrets: vec!["s3cret".to_string()],
            name: "service three".to_string(),
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

    let original_kid = server.state.keys.active_kid().await.expect("active kid before rotation");

    let token_resp = server
        .router
        .clone()
        .oneshot(post_form(
            "/oauth/token",
            "grant_type=client_credentials&client_id=svc-3&client_secret=s3cret&scope=profile",
        ))
        .await
        .unwrap();
    assert_eq!(token_resp.status(), StatusCode::OK);
    let body = to_bytes(token_resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let access_token = json["access_token"].as_str().unwrap().to_string();

    server.state.keys.rotate().await.expect("rotate");
    let new_kid = server.state.keys.active_kid().await.expect("active kid after rotation");
    assert_ne!(original_kid, new_kid, "rotation should mint a new kid");

    // The JWKS document still advertises the retired key so verifiers who
    // haven't refreshed yet can validate tokens signed under it.
    let jwks_resp = server
        .router
        .clone()
        .oneshot(Request::builder().uri("/.well-known/jwks.json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let jwks_body = to_bytes(jwks_resp.into_body(), usize::MAX).await.unwrap();
    let jwks: Value = serde_json::from_slice(&jwks_body).unwrap();
    let kids: Vec<&str> = jwks["keys"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["kid"].as_str().unwrap())
        .collect();
    assert!(kids.contains(&original_kid.as_str()));
    assert!(kids.contains(&new_kid.as_str()));

    // A token signed under the retired key still introspects as active.
    let introspect_form = format!("token={access_token}");
    let mut introspect_req = Request::builder()
        .method("POST")
        .uri("/oauth/introspect")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(introspect_form))
        .unwrap();
    introspect_req
        .extensions_mut()
        .insert(axum::extract::ConnectInfo(std::net::SocketAddr::from(([127, 0, 0, 1], 0))));
    let introspect_resp = server.router.clone().oneshot(introspect_req).await.unwrap();
    assert_eq!(introspect_resp.status(), StatusCode::OK);
    let introspect_body = to_bytes(introspect_resp.into_body(), usize::MAX).await.unwrap();
    let introspected: Value = serde_json::from_slice(&introspect_body).unwrap();
    assert_eq!(introspected["active"], true);
}
