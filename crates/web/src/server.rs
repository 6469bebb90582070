//! Web server implementation

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use ecomos_common::{Database, APP_CATALOG, VERSION};

use crate::auth::{
    self, backend::AuthBackend, middleware::CurrentIdentity, require_session, session,
    Credential, SessionStore, SqliteAuthBackend,
};
use crate::pages;

/// Default session lifetime: 12h, matching the admin console's workday.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 12 * 60 * 60;

/// Environment-gated test identity. Enabled only when the operator opts in;
/// production configurations render blank login fields and seed nothing.
#[derive(Clone, Debug)]
pub struct TestCredentials {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl Default for TestCredentials {
    fn default() -> Self {
        Self {
            email: "jarraramjad@ecomos.com".to_string(),
            password: "SecurePass123!".to_string(),
            display_name: "Jarrar Amjad".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct WebServerConfig {
    /// State database path. `None` opens an in-memory database.
    pub db_path: Option<PathBuf>,
    /// When set, seeds this identity and pre-fills the login form with it.
    pub test_credentials: Option<TestCredentials>,
    /// Session TTL override; defaults to [`DEFAULT_SESSION_TTL_SECS`].
    pub session_ttl_secs: Option<i64>,
}

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<WebServerConfig>,
    pub backend: Arc<dyn AuthBackend>,
    pub sessions: SessionStore,
}

impl AppState {
    fn prefill(&self) -> Option<(&str, &str)> {
        self.cfg
            .test_credentials
            .as_ref()
            .map(|tc| (tc.email.as_str(), tc.password.as_str()))
    }
}

/// Web server state
#[derive(Clone)]
pub struct WebServer {
    state: AppState,
    db: Database,
}

impl WebServer {
    pub fn new(cfg: WebServerConfig) -> anyhow::Result<Self> {
        let db = match &cfg.db_path {
            Some(path) => Database::open(path)?,
            None => Database::open_memory()?,
        };

        let backend = SqliteAuthBackend::new(db.clone());
        if let Some(tc) = &cfg.test_credentials {
            backend.seed_user(&tc.email, &tc.password, &tc.display_name)?;
            info!(email = %tc.email, "seeded test identity");
        }

        let ttl = cfg.session_ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS);
        let sessions = SessionStore::new(db.clone(), ttl)?;

        Ok(Self {
            state: AppState {
                cfg: Arc::new(cfg),
                backend: Arc::new(backend),
                sessions,
            },
            db,
        })
    }

    /// The shared state database (tests use this to set up failure modes).
    pub fn database(&self) -> Database {
        self.db.clone()
    }

    pub fn router(&self) -> Router {
        let state = self.state.clone();

        let guarded = Router::new()
            .route("/app-selector", get(app_selector_handler))
            .route("/wms", get(wms_handler))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_session,
            ));

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route(
                "/auth/login",
                get(login_page_handler).post(login_submit_handler),
            )
            .route("/auth/signout", post(signout_handler))
            .merge(guarded)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Build the server and run it until the task is cancelled.
pub async fn serve(addr: SocketAddr, cfg: WebServerConfig) -> anyhow::Result<()> {
    let server = WebServer::new(cfg)?;
    let router = server.router();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Ecom OS web listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn root_handler() -> Redirect {
    Redirect::to("/auth/login")
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "version": VERSION }))
}

async fn login_page_handler(State(state): State<AppState>) -> impl IntoResponse {
    Html(pages::login_page(state.prefill(), None))
}

/// One submission has exactly one outcome: redirect to the app selector with
/// a fresh session cookie, or re-render the login page with an error notice.
async fn login_submit_handler(
    State(state): State<AppState>,
    Form(credential): Form<Credential>,
) -> Response {
    let identity = match state.backend.authenticate(&credential).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(email = %credential.email, error = %e, "login rejected");
            return Html(pages::login_page(state.prefill(), Some(&e.notice()))).into_response();
        }
    };

    let session = match state.sessions.create(&identity.id) {
        Ok(session) => session,
        Err(e) => {
            warn!(user_id = %identity.id, error = %e, "session issuance failed");
            return Html(pages::login_page(state.prefill(), Some(&e.notice()))).into_response();
        }
    };

    info!(user_id = %identity.id, "login succeeded");
    (
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, session::set_cookie(&session.token)),
            (header::LOCATION, "/app-selector".to_string()),
        ],
    )
        .into_response()
}

async fn app_selector_handler(
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
) -> impl IntoResponse {
    Html(pages::app_selector_page(&identity, APP_CATALOG))
}

async fn wms_handler(
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
) -> impl IntoResponse {
    Html(pages::wms_shell_page(&identity))
}

/// Sign-out is not behind the guard: tearing down an absent session is a
/// plain redirect to the login surface.
async fn signout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = auth::session::token_from_headers(&headers) {
        if let Err(e) = state.sessions.destroy(&token) {
            warn!(error = %e, "session teardown failed");
        } else {
            info!("session destroyed");
        }
    }

    (
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, session::clear_cookie()),
            (header::LOCATION, "/auth/login".to_string()),
        ],
    )
        .into_response()
}
