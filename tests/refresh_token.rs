use axum::http::{StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use authkeep::config::AuthServerConfig;
use authkeep::store::{Client, User};

mod common;
use common::post_form;

async fn test_server() -> authkeep::AuthServer {
    authkeep::bootstrap(AuthServerConfig::default()).await.expect("bootstrap")
}

fn extract_code(location: &str) -> String {
    url::Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .expect("authorization code in redirect")
}

#[tokio::test]
async fn refresh_cannot_widen_scope_but_can_narrow_it() {
    let server = test_server().await;

    server
        .state
        .clients
        .insert(Client {
            client_id: "native-app".to_string(),
            secrets: vec![],
            name: "native app".to_string(),
            redirect_uris: vec!["app://callback".to_string()],
            allowed_scopes: vec!["openid".to_string(), "profile".to_string(), "offline_access".to_string()],
            grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
            response_types: vec!["code".to_string()],
            token_endpoint_auth_method: "none".to_string(),
            require_pkce: false,
            active: true,
            tenant_id: None,
        })
        .await
        .unwrap();

    server
        .state
        .users
        .insert(User {
            id: "user-2".to_string(),
            email: "bob@example.com".to_string(),
            password_hash: authkeep::password_hash::hash("correcthorse").unwrap(),
            email_verified: true,
            given_name: Some("Bob".to_string()),
            family_name: None,
            nickname: None,
            picture: None,
            locale: None,
            scopes: vec![],
            roles: vec![],
            tenant_id: None,
            active: true,
            failed_attempts: 0,
            locked_until: None,
        })
        .await
        .unwrap();

    let authorize_form = format!(
        "response_type=code&client_id=native-app&redirect_uri={}&scope=openid+profile+offline_access&username=bob@example.com&password=correcthorse",
        urlencoding::encode("app://callback"),
    );
    let resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/authorize", authorize_form))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_string();
    let code = extract_code(&location);

    let token_form = format!(
        "grant_type=authorization_code&client_id=native-app&code={}&redirect_uri={}",
        code,
        urlencoding::encode("app://callback"),
    );
    let token_resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/token", token_form))
        .await
        .unwrap();
    assert_eq!(token_resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(token_resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let refresh_token = json["refresh_token"].as_str().expect("offline_access grants a refresh token").to_string();

    // Narrowing the scope on refresh succeeds.
    let narrow_form = format!("grant_type=refresh_token&client_id=native-app&refresh_token={refresh_token}&scope=openid");
    let narrow_resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/token", narrow_form))
        .await
        .unwrap();
    assert_eq!(narrow_resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(narrow_resp.into_body(), usize::MAX).await.unwrap();
    let narrowed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(narrowed["scope"], "openid");
    let rotated_refresh_token = narrowed["refresh_token"].as_str().unwrap().to_string();

    // Widening it back out past the original grant is rejected.
    let wide_form = format!(
        "grant_type=refresh_token&client_id=native-app&refresh_token={rotated_refresh_token}&scope=openid+profile+admin"
    );
    let wide_resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/token", wide_form))
        .await
        .unwrap();
    assert_eq!(wide_resp.status(), StatusCode::BAD_REQUEST);

    // The original refresh token was rotated out and no longer works.
    let reuse_form = format!("grant_type=refresh_token&client_id=native-app&refresh_token={refresh_token}&scope=openid");
    let reuse_resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/token", reuse_form))
        .await
        .unwrap();
    assert_eq!(reuse_resp.status(), StatusCode::UNAUTHORIZED);
}
