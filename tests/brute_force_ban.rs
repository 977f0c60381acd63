use axum::http::StatusCode;
use tower::ServiceExt;

use authkeep::config::AuthServerConfig;
use authkeep::store::{Client, User};

mod common;
use common::post_form;

async fn test_server() -> authkeep::AuthServer {
    authkeep::bootstrap(AuthServerConfig::default()).await.expect("bootstrap")
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
            allowed_scopes: vec!["openid".to_string()],
            grant_types: vec!["authorization_code".to_string()],
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
            id: "user-3".to_string(),
            email: "carol@example.com".to_string(),
            password_hash: authkeep::password_hash::hash("swordfish").unwrap(),
            email_verified: true,
            given_name: Some("Carol".to_string()),
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

fn bad_login_form() -> String {
    format!(
        "response_type=code&client_id=web-app&redirect_uri={}&scope=openid&username=carol@example.com&password=wrong-password",
        urlencoding::encode("https://app.example.com/callback"),
    )
}

#[tokio::test]
async fn repeated_failed_logins_from_one_ip_get_banned() {
    let server = test_server().await;
    seed(&server).await;

    // Default failban policy bans after 5 violations within the window; each
    // of these comes from the same source address via `post_form`.
    for attempt in 1..=5 {
        let resp = server
            .router
            .clone()
            .oneshot(post_form("/oauth/authorize", bad_login_form()))
            .await
            .unwrap();
        assert_eq!(
            resp.status(),
            StatusCode::UNAUTHORIZED,
            "attempt {attempt} should fail on bad credentials, not yet be banned"
        );
    }

    // The next attempt is refused outright before credentials are even checked.
    let banned_resp = server
        .router
        .clone()
        .oneshot(post_form("/oauth/authorize", bad_login_form()))
        .await
        .unwrap();
    assert_eq!(banned_resp.status(), StatusCode::FORBIDDEN);

    // Even the correct password no longer gets through while banned.
    let correct_form = format!(
        "response_type=code&client_id=web-app&redirect_uri={}&scope=openid&username=carol@example.com&password=swordfish",
        urlencoding::encode("https://app.example.com/callback"),
    );
    let still_banned = server
        .router
        .clone()
        .oneshot(post_form("/oauth/authorize", correct_form))
        .await
        .unwrap();
    assert_eq!(still_banned.status(), StatusCode::FORBIDDEN);
}
