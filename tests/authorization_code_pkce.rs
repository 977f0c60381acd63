use axum::http::{StatusCode, header};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_ENGINE;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use authkeep::config::AuthServerConfig;
use authkeep::store::{Client, User};

mod common;
use common::post_form;

async fn test_server() -> authkeep::AuthServer {
    authkeep::bootstrap(AuthServerConfig::default()).await.expect("bootstrap")
}

fn s256_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    BASE64_ENGINE.encode(hasher.finalize())
}

fn extract_code(location: &str) -> String {
    url::Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .expect("authorization code in redirect")
}

async fn seed(server: &authkeep::AuthServer) {
    server
        .state
        .clients
        .insert(Client {
            client_id: "web-app".to_string(),
            secrets: vec![],
            name: "web app".to_string(),
            redirect_uris: vec!["https://app.example.com/callback".to_string()],
            allowed_scopes: vec!["openid".to_string(), "profile".to_string()],
            grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
            response_types: vec!["code".to_string()],
            token_endpoint_auth_method: "none".to_string(),
            require_pkce: true,
            active: true,
            tenant_id: None,
        })
        .await
        .unwrap();

    server
        .state
        .users
        .insert(User {
            id: "user-1".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: authkeep::password_hash::hash("hunter2").unwrap(),
            email_verified: true,
            given_name: Some("Alice".to_string()),
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
}

fn authorize_form(challenge: &str) -> String {
    format!(
        "response_type=code&client_id=web-app&redirect_uri={}&scope=openid+profile&code_challenge={}&code_challenge_method=S256&username=alice@example.com&password=hunter2",
        urlencoding::encode("https://app.example.com/callback"),
        challenge,
    )
}

#[tokio::test]
async fn authorization_code_with_pkce_s256_round_trips() {
    let server = test_server().await;
    seed(&server).await;

    let verifier = "a-random-high-entropy-code-verifier-string-1234567890";
    let challenge = s256_challenge(verifier);

    let resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/authorize", authorize_form(&challenge)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_string();
    let code = extract_code(&location);

    // Wrong verifier fails PKCE; the single-use code is consumed either way.
    let bad_form = format!(
        "grant_type=authorization_code&client_id=web-app&code={}&redirect_uri={}&code_verifier=wrong-verifier",
        code,
        urlencoding::encode("https://app.example.com/callback"),
    );
    let bad_resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/token", bad_form))
        .await
        .unwrap();
    assert_eq!(bad_resp.status(), StatusCode::UNAUTHORIZED);

    // Mint a fresh code and exchange it correctly this time.
    let resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/authorize", authorize_form(&challenge)))
        .await
        .unwrap();
    let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_string();
    let code = extract_code(&location);

    let good_form = format!(
        "grant_type=authorization_code&client_id=web-app&code={}&redirect_uri={}&code_verifier={}",
        code,
        urlencoding::encode("https://app.example.com/callback"),
        verifier,
    );
    let good_resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/token", good_form))
        .await
        .unwrap();
    assert_eq!(good_resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(good_resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["id_token"].is_string(), "openid scope should mint an id_token");
    assert!(json.get("refresh_token").is_none(), "offline_access was not requested");
}
