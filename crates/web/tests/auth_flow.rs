//! Integration tests for the login -> app selector -> WMS -> sign-out flow,
//! driven in-process against the router.

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use ecomos_web::server::{TestCredentials, WebServer, WebServerConfig};

const TEST_EMAIL: &str = "jarraramjad@ecomos.com";
const TEST_PASSWORD: &str = "SecurePass123!";
const TEST_NAME: &str = "Jarrar Amjad";

fn server(with_test_credentials: bool) -> WebServer {
    WebServer::new(WebServerConfig {
        db_path: None,
        test_credentials: with_test_credentials.then(TestCredentials::default),
        session_ttl_secs: None,
    })
    .unwrap()
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8_lossy(&bytes).into_owned())
}

fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(path: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn login_body(email: &str, password: &str) -> String {
    format!("email={email}&password={password}")
}

/// First `name=value` pair of the Set-Cookie header, usable as a Cookie value.
fn session_cookie(headers: &HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .expect("expected Set-Cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

/// Sign in with the seeded test credentials and return the session cookie.
async fn sign_in(router: &Router) -> String {
    let (status, headers, _) = send(
        router,
        post_form(
            "/auth/login",
            &login_body(TEST_EMAIL, TEST_PASSWORD),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/app-selector");
    session_cookie(&headers)
}

#[tokio::test]
async fn login_page_renders_contract_elements() {
    let router = server(true).router();
    let (status, _, body) = send(&router, get("/auth/login", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<title>Ecom OS (auth)</title>"));
    assert!(body.contains("<h3>Ecom OS</h3>"));
    assert!(body.contains("Sign in to your account"));
    assert!(body.contains(r#"id="email""#));
    assert!(body.contains(&format!(r#"value="{TEST_EMAIL}""#)));
    assert!(body.contains(r#"id="password""#));
    assert!(body.contains(&format!(r#"value="{TEST_PASSWORD}""#)));
    assert!(body.contains(r#"<button type="submit">Sign in</button>"#));
    assert!(!body.contains("error-notice"));
}

#[tokio::test]
async fn login_page_blank_without_test_credentials() {
    let router = server(false).router();
    let (status, _, body) = send(&router, get("/auth/login", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains(TEST_EMAIL));
    assert!(!body.contains(TEST_PASSWORD));
}

#[tokio::test]
async fn valid_credentials_redirect_to_app_selector() {
    let router = server(true).router();
    let cookie = sign_in(&router).await;

    let (status, _, body) = send(&router, get("/app-selector", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&format!("<h1>Welcome, {TEST_NAME}</h1>")));
    assert!(body.contains(r#"data-testid="app-card-wms""#));
    assert!(body.contains(r#"<button type="submit">Warehouse Management</button>"#));
}

#[tokio::test]
async fn rejected_credentials_render_error_notice_and_no_session() {
    let router = server(true).router();
    let (status, headers, body) = send(
        &router,
        post_form("/auth/login", &login_body(TEST_EMAIL, "wrong"), None),
    )
    .await;

    // Exclusive-or on outcome: notice rendered, no redirect, no cookie.
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("error-notice"));
    assert!(body.contains("Invalid email or password"));
    assert!(headers.get(header::LOCATION).is_none());
    assert!(headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn storage_failure_surfaces_denied_access() {
    let server = server(true);
    let router = server.router();
    {
        let conn_arc = server.database().connection();
        let conn = conn_arc.lock();
        conn.execute_batch("DROP TABLE users;").unwrap();
    }

    let (status, headers, body) = send(
        &router,
        post_form(
            "/auth/login",
            &login_body(TEST_EMAIL, TEST_PASSWORD),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("error-notice"));
    assert!(body.contains("sqlite"), "body: {body}");
    assert!(body.contains("denied access"), "body: {body}");
    assert!(headers.get(header::LOCATION).is_none());
}

#[tokio::test]
async fn guarded_paths_redirect_to_login_without_session() {
    let router = server(true).router();

    for path in ["/app-selector", "/wms"] {
        let (status, headers, _) = send(&router, get(path, None)).await;
        assert_eq!(status, StatusCode::SEE_OTHER, "path: {path}");
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/auth/login");
    }

    // A forged token is as good as none.
    let (status, headers, _) = send(
        &router,
        get("/wms", Some("ecomos_session=deadbeefdeadbeef")),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/auth/login");
}

#[tokio::test]
async fn storage_failure_on_guarded_path_redirects_to_login() {
    let server = server(true);
    let router = server.router();
    let cookie = sign_in(&router).await;

    {
        let conn_arc = server.database().connection();
        let conn = conn_arc.lock();
        conn.execute_batch("DROP TABLE sessions;").unwrap();
    }

    // A storage outage on a guarded page degrades to the login redirect.
    let (status, headers, _) = send(&router, get("/wms", Some(&cookie))).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/auth/login");
}

#[tokio::test]
async fn wms_shell_shows_display_name_and_sign_out() {
    let router = server(true).router();
    let cookie = sign_in(&router).await;

    let (status, _, body) = send(&router, get("/wms", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<header"));
    assert!(body.contains(&format!(
        r#"<p class="text-sm font-medium">{TEST_NAME}</p>"#
    )));
    assert!(body.contains(r#"aria-label="Sign out""#));
}

#[tokio::test]
async fn display_name_round_trips_from_selector_to_shell() {
    let router = server(true).router();
    let cookie = sign_in(&router).await;

    let (_, _, selector) = send(&router, get("/app-selector", Some(&cookie))).await;
    let (_, _, shell) = send(&router, get("/wms", Some(&cookie))).await;
    assert!(selector.contains(TEST_NAME));
    assert!(shell.contains(TEST_NAME));
}

#[tokio::test]
async fn sign_out_invalidates_session_and_is_idempotent() {
    let router = server(true).router();
    let cookie = sign_in(&router).await;

    let (status, headers, _) = send(&router, post_form("/auth/signout", "", Some(&cookie))).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/auth/login");

    // The old session no longer opens guarded pages.
    let (status, headers, _) = send(&router, get("/wms", Some(&cookie))).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/auth/login");

    // Signing out again, with or without the stale cookie, is a no-op redirect.
    let (status, headers, _) = send(&router, post_form("/auth/signout", "", Some(&cookie))).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/auth/login");

    let (status, headers, _) = send(&router, post_form("/auth/signout", "", None)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/auth/login");
}
