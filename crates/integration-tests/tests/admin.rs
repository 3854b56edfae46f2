//! End-to-end checks against a running admin panel.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::Value;
use solenne_integration_tests::{admin_client, admin_url, client, location};

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_pages_require_login() {
    let client = client();
    let base = admin_url();

    for path in ["/", "/orders", "/products", "/analytics", "/settings"] {
        let resp = client.get(format!("{base}{path}")).send().await.unwrap();
        assert!(resp.status().is_redirection(), "GET {path}");
        assert_eq!(location(&resp), Some("/auth/login"), "GET {path}");
    }
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_wrong_password_is_unauthorized() {
    let resp = client()
        .post(format!("{}/auth/login", admin_url()))
        .form(&[("email", "nobody@solenne.test"), ("password", "wrong-password")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(
        resp.text()
            .await
            .unwrap()
            .contains("Email or password is incorrect.")
    );
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_TEST_EMAIL/ADMIN_TEST_PASSWORD"]
async fn test_back_office_pages_render() {
    let client = admin_client().await;
    let base = admin_url();

    for path in [
        "/",
        "/orders",
        "/orders?status=paid",
        "/products",
        "/categories",
        "/customers",
        "/membership",
        "/blog",
        "/testimonials",
        "/analytics?range=7d",
        "/settings",
    ] {
        let resp = client.get(format!("{base}{path}")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
    }
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_TEST_EMAIL/ADMIN_TEST_PASSWORD"]
async fn test_analytics_json_report() {
    let client = admin_client().await;
    let resp = client
        .get(format!("{}/api/analytics?range=90d", admin_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["range"], "90d");
    assert!(report["summary"]["revenue"]["current"].is_string());
    assert!(report["daily"].is_array());
    assert!(report["top_products"].is_array());
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_TEST_EMAIL/ADMIN_TEST_PASSWORD"]
async fn test_logout_ends_session() {
    let client = admin_client().await;
    let base = admin_url();

    let resp = client
        .post(format!("{base}/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&resp), Some("/auth/login"));

    let resp = client.get(format!("{base}/orders")).send().await.unwrap();
    assert_eq!(location(&resp), Some("/auth/login"));
}
