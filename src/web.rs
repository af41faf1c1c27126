use crate::annotate::{Segment, annotate, keywords_in_text};
use crate::gateway::{GenerateError, ListingGateway};
use crate::listing::{KEYWORD_CHAR_LIMIT, ListingData, ListingDraft};
use crate::session::{
    DraftView, KeywordView, ListingSession, SaveButton, SaveState, SaveTiming, SessionError,
    SessionView,
};
use askama::Template;
use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use cookie::{Cookie, SameSite};
use lru::LruCache;
use parking_lot::Mutex;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn};

type SharedState = Arc<AppState>;
const SESSION_COOKIE: &str = "listing_session";
const SESSION_ID_LEN: usize = 24;
const MAX_SESSION_COUNT: usize = 4096;

pub struct AppState {
    pub gateway: ListingGateway,
    pub sessions: SessionStore,
    pub timing: SaveTiming,
    pub color_scheme: ColorScheme,
    pub base_url: String,
}

impl AppState {
    pub fn new(gateway: ListingGateway, config: &WebConfig) -> Self {
        Self {
            gateway,
            sessions: SessionStore::new(MAX_SESSION_COUNT),
            timing: config.save_timing,
            color_scheme: config.color_scheme,
            base_url: config.base_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum ColorScheme {
    /// Follow `prefers-color-scheme` in the browser.
    #[default]
    System,
    Light,
    Dark,
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorScheme::System => write!(f, "system"),
            ColorScheme::Light => write!(f, "light"),
            ColorScheme::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for ColorScheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "system" | "auto" => Ok(ColorScheme::System),
            "light" => Ok(ColorScheme::Light),
            "dark" => Ok(ColorScheme::Dark),
            other => Err(format!(
                "unknown color scheme {other:?} (expected system, light or dark)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    scheme: &'static str,
    html_class: &'static str,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    button_class: &'static str,
    muted_button_class: &'static str,
    panel_class: &'static str,
    field_class: &'static str,
    mark_title_class: &'static str,
    mark_description_class: &'static str,
}

impl Chrome {
    fn new(scheme: ColorScheme) -> Self {
        let (scheme, html_class) = match scheme {
            ColorScheme::System => ("system", ""),
            ColorScheme::Light => ("light", ""),
            ColorScheme::Dark => ("dark", "dark"),
        };
        Self {
            scheme,
            html_class,
            body_class: "bg-slate-50 text-slate-900 dark:bg-slate-900 dark:text-slate-100 transition-colors",
            main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
            card_class: "max-w-6xl w-full space-y-8",
            eyebrow_class: "uppercase tracking-wide text-sm text-slate-500 dark:text-slate-400",
            headline_class: "text-3xl md:text-4xl font-extrabold tracking-tight",
            lede_class: "text-lg text-slate-600 dark:text-slate-300",
            button_class: "inline-flex items-center justify-center rounded-xl bg-purple-600 px-5 py-3 text-white font-bold shadow hover:bg-purple-700 disabled:bg-slate-400 disabled:cursor-not-allowed transition-colors",
            muted_button_class: "inline-flex items-center rounded-full px-3 py-1 text-sm bg-slate-200 hover:bg-slate-300 dark:bg-slate-700 dark:hover:bg-slate-600",
            panel_class: "bg-white dark:bg-slate-800 shadow-lg rounded-2xl p-6 space-y-3",
            field_class: "w-full rounded-xl border border-slate-300 dark:border-slate-600 bg-slate-50 dark:bg-slate-700 p-3",
            mark_title_class: "rounded bg-purple-200/60 dark:bg-purple-800/60",
            mark_description_class: "rounded bg-teal-100 dark:bg-teal-900/60",
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub base_url: String,
    pub color_scheme: ColorScheme,
    pub save_timing: SaveTiming,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            base_url: "http://127.0.0.1:8080".to_string(),
            color_scheme: ColorScheme::default(),
            save_timing: SaveTiming::default(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig, gateway: ListingGateway) -> Result<(), WebError> {
    let backend = gateway.backend_name();
    let state = Arc::new(AppState::new(gateway, &config));
    let router = build_router(state);
    info!(
        %config.addr,
        scheme = %config.color_scheme,
        base = %config.base_url,
        backend,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

/// In-memory sessions keyed by cookie, least recently used evicted first.
pub struct SessionStore {
    inner: Mutex<LruCache<String, ListingSession>>,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Runs `f` against the session, creating it on first use. The lock is
    /// released before returning, so never call this across an `.await`.
    pub fn with<R>(&self, id: &str, f: impl FnOnce(&mut ListingSession) -> R) -> R {
        let mut guard = self.inner.lock();
        let session = guard.get_or_insert_mut(id.to_string(), ListingSession::new);
        f(session)
    }

    /// Like [`SessionStore::with`] but leaves evicted sessions alone.
    pub fn with_existing<R>(&self, id: &str, f: impl FnOnce(&mut ListingSession) -> R) -> Option<R> {
        let mut guard = self.inner.lock();
        guard.get_mut(id).map(f)
    }

    pub fn view(&self, id: &str) -> SessionView {
        self.with(id, |session| session.view())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Session id from the request cookie, plus a `Set-Cookie` value when a new
/// id had to be issued.
fn resolve_session(headers: &HeaderMap) -> (String, Option<HeaderValue>) {
    if let Some(id) = session_from_headers(headers) {
        return (id, None);
    }
    let id = generate_session_id();
    let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    let value = HeaderValue::from_str(&cookie.to_string()).ok();
    (id, value)
}

fn session_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| id.len() == SESSION_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn with_cookie(mut response: Response, cookie: Option<HeaderValue>) -> Response {
    if let Some(value) = cookie {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl From<GenerateError> for ApiError {
    fn from(err: GenerateError) -> Self {
        let status = match err {
            GenerateError::EmptyInput => StatusCode::UNPROCESSABLE_ENTITY,
            GenerateError::GenerationFailed { .. } | GenerateError::MalformedResponse { .. } => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self {
            status,
            message: err.user_message().to_string(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NoListing => ApiError::not_found(err.to_string()),
            SessionError::KeywordOutOfRange { .. } | SessionError::EmptyInput => {
                ApiError::bad_request(err.to_string())
            }
            SessionError::NothingToSave
            | SessionError::SaveInProgress
            | SessionError::GenerationInFlight => ApiError::conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/generate", post(generate_form))
        .route("/listing", post(listing_form))
        .route("/api/generate", post(api_generate))
        .route("/api/annotate", post(api_annotate))
        .route("/api/draft", post(api_draft))
        .route("/api/save", post(api_save))
        .route("/api/session", get(api_session))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new().include_headers(false)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "listing-studio" }))
}

async fn home(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let (id, cookie) = resolve_session(&headers);
    let view = state.sessions.view(&id);
    let html = render_page(&state, &view);
    with_cookie(Html(html).into_response(), cookie)
}

#[derive(Debug, Deserialize)]
struct GenerateForm {
    #[serde(default)]
    description: String,
}

async fn generate_form(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<GenerateForm>,
) -> Response {
    let (id, cookie) = resolve_session(&headers);
    let started = state.sessions.with(&id, |session| {
        session.set_input(form.description);
        session.begin_generation()
    });
    match started {
        Ok(description) => run_generation(&state, &id, description).await,
        // The trigger is inert on blank input.
        Err(SessionError::EmptyInput) => {}
        Err(err) => warn!(error = %err, "generation request refused"),
    }
    with_cookie(Redirect::to("/").into_response(), cookie)
}

/// Runs the gateway call and records the result in a detached task, so the
/// session leaves the loading state even if the request is dropped mid-call.
async fn run_generation(state: &SharedState, id: &str, description: String) {
    let task_state = Arc::clone(state);
    let task_id = id.to_string();
    let task = tokio::spawn(async move {
        let result = task_state.gateway.generate(&description).await;
        task_state
            .sessions
            .with_existing(&task_id, |session| session.finish_generation(result));
    });
    if let Err(err) = task.await {
        error!(error = %err, "generation task failed");
        state.sessions.with_existing(id, |session| {
            session.finish_generation(Err(GenerateError::GenerationFailed {
                cause: err.to_string(),
            }))
        });
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ListingForm {
    draft: ListingDraft,
    save: bool,
}

impl ListingForm {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = ListingForm::default();
        for (key, value) in pairs {
            match key.as_str() {
                "title" => form.draft.title = value,
                "description" => form.draft.description = value,
                "keyword" => form.draft.keywords.push(value),
                "action" => form.save = value == "save",
                _ => {}
            }
        }
        form
    }
}

async fn listing_form(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let (id, cookie) = resolve_session(&headers);
    let form = ListingForm::from_pairs(pairs);
    let applied = state
        .sessions
        .with(&id, |session| session.replace_draft(form.draft));
    match applied {
        Ok(_) if form.save => {
            if let Err(err) = save_session(&state, &id).await {
                warn!(error = %err, "save request refused");
            }
        }
        Ok(_) => {}
        Err(err) => warn!(error = %err, "draft update refused"),
    }
    with_cookie(Redirect::to("/").into_response(), cookie)
}

/// Begin, wait out the simulated latency, commit, and schedule the reset of
/// the "saved" confirmation. The store lock is never held across the waits,
/// and everything after `begin_save` runs in a detached task so a dropped
/// request cannot leave the session in `Saving`.
async fn save_session(state: &SharedState, id: &str) -> Result<(), SessionError> {
    let ticket = state.sessions.with(id, |session| session.begin_save())?;
    let seq = ticket.seq();
    let task_state = Arc::clone(state);
    let task_id = id.to_string();
    let commit = tokio::spawn(async move {
        task_state.timing.commit_delay().await;
        task_state
            .sessions
            .with_existing(&task_id, |session| session.complete_save(ticket));
        tokio::spawn(async move {
            task_state.timing.reset_delay().await;
            task_state
                .sessions
                .with_existing(&task_id, |session| session.reset_saved(seq));
        });
    });
    if let Err(err) = commit.await {
        error!(error = %err, "save task failed");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    description: String,
}

async fn api_generate(
    State(state): State<SharedState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<ListingData>, ApiError> {
    let listing = state.gateway.generate(&request.description).await?;
    Ok(Json(listing))
}

#[derive(Debug, Deserialize)]
struct AnnotateRequest {
    text: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnnotateResponse {
    segments: Vec<Segment>,
    keywords_present: Vec<String>,
}

async fn api_annotate(Json(request): Json<AnnotateRequest>) -> Json<AnnotateResponse> {
    Json(AnnotateResponse {
        segments: annotate(&request.text, &request.keywords),
        keywords_present: keywords_in_text(&request.text, &request.keywords),
    })
}

#[derive(Debug, Default, Deserialize)]
struct DraftEdit {
    title: Option<String>,
    description: Option<String>,
    keywords: Option<Vec<String>>,
}

/// Builds the whole next draft before touching the session, so a rejected
/// edit changes nothing. A shorter `keywords` list updates the leading slots.
fn apply_edit(session: &mut ListingSession, edit: DraftEdit) -> Result<DraftView, SessionError> {
    let mut next = session.draft().cloned().ok_or(SessionError::NoListing)?;
    if let Some(title) = edit.title {
        next.title = title;
    }
    if let Some(description) = edit.description {
        next.description = description;
    }
    if let Some(keywords) = edit.keywords {
        let len = next.keywords.len();
        if keywords.len() > len {
            return Err(SessionError::KeywordOutOfRange { index: len, len });
        }
        for (slot, keyword) in next.keywords.iter_mut().zip(keywords) {
            *slot = keyword;
        }
    }
    session.replace_draft(next)?;
    session.draft_view().ok_or(SessionError::NoListing)
}

async fn api_draft(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(edit): Json<DraftEdit>,
) -> Result<Response, ApiError> {
    let (id, cookie) = resolve_session(&headers);
    let view = state.sessions.with(&id, |session| apply_edit(session, edit))?;
    Ok(with_cookie(Json(view).into_response(), cookie))
}

async fn api_save(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionView>, ApiError> {
    let (id, _) = resolve_session(&headers);
    save_session(&state, &id).await?;
    Ok(Json(state.sessions.view(&id)))
}

async fn api_session(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let (id, cookie) = resolve_session(&headers);
    with_cookie(Json(state.sessions.view(&id)).into_response(), cookie)
}

/// Pre-computed content of the result cards.
#[derive(Debug, Default)]
struct ListingCard {
    title: String,
    description: String,
    category: String,
    materials: Vec<String>,
    title_segments: Vec<Segment>,
    description_segments: Vec<Segment>,
    title_badge: String,
    title_over: bool,
    description_badge: String,
    description_over: bool,
    keywords: Vec<KeywordView>,
    keyword_limit: usize,
    save_enabled: bool,
    save_label: &'static str,
    save_state: &'static str,
}

impl ListingCard {
    fn from_view(view: &SessionView) -> Option<Self> {
        let listing = view.listing.as_ref()?;
        let draft = view.draft.as_ref()?;
        let draft_view = view.view.as_ref()?;
        let SaveButton { enabled, label } = draft_view.save_button;
        Some(Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            category: listing.category.clone(),
            materials: listing.materials.clone(),
            title_segments: draft_view.title_segments.clone(),
            description_segments: draft_view.description_segments.clone(),
            title_badge: draft_view.title_badge.to_string(),
            title_over: draft_view.title_badge.over_limit,
            description_badge: draft_view.description_badge.to_string(),
            description_over: draft_view.description_badge.over_limit,
            keywords: draft_view.keywords.clone(),
            keyword_limit: KEYWORD_CHAR_LIMIT,
            save_enabled: enabled,
            save_label: label,
            save_state: match view.save_state {
                SaveState::Idle => "idle",
                SaveState::Saving => "saving",
                SaveState::Saved => "saved",
            },
        })
    }
}

fn render_page(state: &AppState, view: &SessionView) -> String {
    let chrome = Chrome::new(state.color_scheme);
    let card = ListingCard::from_view(view);
    let template = PageTemplate {
        chrome,
        base_url: &state.base_url,
        version: env!("CARGO_PKG_VERSION"),
        input: &view.input,
        error: view.error.as_deref().unwrap_or_default(),
        has_error: view.error.is_some(),
        has_card: card.is_some(),
        card: card.unwrap_or_default(),
    };
    template
        .render()
        .unwrap_or_else(|err| render_error_page(state.color_scheme, err.to_string()))
}

fn render_error_page(scheme: ColorScheme, message: impl Into<String>) -> String {
    let chrome = Chrome::new(scheme);
    let message = escape_html(&message.into());
    format!(
        r#"<!DOCTYPE html>
<html lang="en" class="{html_class}">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Listing Studio • Error</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">Something went wrong</h1>
        <p class="{lede_class}">{message}</p>
        <a href="/" class="{button_class}">Back to the form</a>
      </div>
    </main>
  </body>
</html>"#,
        html_class = chrome.html_class,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        message = message,
    )
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en" class="{{ chrome.html_class }}" data-scheme="{{ chrome.scheme }}">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Listing Studio • Marketplace listing optimizer</title>
    <link rel="canonical" href="{{ base_url }}/">
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    <style type="text/tailwindcss">
      @custom-variant dark (&:where(.dark, .dark *));
    </style>
    <script>
      (function () {
        var root = document.documentElement;
        if (root.dataset.scheme !== "system" || !window.matchMedia) return;
        var query = window.matchMedia("(prefers-color-scheme: dark)");
        var apply = function () { root.classList.toggle("dark", query.matches); };
        apply();
        query.addEventListener("change", apply);
      })();
    </script>
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <header class="flex justify-between items-center">
          <div>
            <p class="{{ chrome.eyebrow_class }}">Listing Studio v{{ version }}</p>
            <h1 class="{{ chrome.headline_class }}">Marketplace listing optimizer</h1>
          </div>
          <button type="button" id="theme-toggle" class="{{ chrome.muted_button_class }}" aria-label="Toggle dark mode">Theme</button>
        </header>

        <section class="{{ chrome.panel_class }} max-w-3xl mx-auto w-full">
          <form method="post" action="/generate" id="generate-form" class="space-y-4">
            <label for="product-description" class="block text-lg font-semibold">Product Description</label>
            <p class="{{ chrome.lede_class }} text-sm">Enter a basic description of your product. The more detail you provide, the better the generated listing will be.</p>
            <textarea id="product-description" name="description" rows="6" class="{{ chrome.field_class }}" placeholder="e.g., A handmade leather tote bag with brass fittings, perfect for daily use. It has an internal pocket for a phone...">{{ input }}</textarea>
            <button type="submit" id="generate-button" class="{{ chrome.button_class }} w-full">Create Listing</button>
          </form>
        </section>

        {% if has_error %}
        <section role="alert" class="max-w-3xl mx-auto w-full rounded-xl p-4 text-center bg-red-100 text-red-700 dark:bg-red-900/50 dark:text-red-300">
          <p class="font-semibold">Oops! Something went wrong.</p>
          <p>{{ error }}</p>
        </section>
        {% endif %}

        {% if has_card %}
        <form method="post" action="/listing" id="listing-form" data-save-state="{{ card.save_state }}">
          <div class="flex justify-end gap-3 mb-6">
            <button type="submit" name="action" value="update" class="{{ chrome.muted_button_class }}">Update preview</button>
            <button type="submit" name="action" value="save" id="save-button" class="{{ chrome.button_class }}" {% if !card.save_enabled %}disabled{% endif %}>{{ card.save_label }}</button>
          </div>
          <div class="grid grid-cols-1 lg:grid-cols-3 gap-8 items-start">
            <div class="lg:col-span-2 space-y-8">
              <article class="{{ chrome.panel_class }}">
                <div class="flex justify-between items-center">
                  <div class="flex items-center gap-3">
                    <h2 class="text-xl font-semibold">Generated Title</h2>
                    <span id="title-badge" class="text-sm font-medium px-2.5 py-1 rounded-full {% if card.title_over %}bg-red-100 text-red-800{% else %}bg-slate-200 dark:bg-slate-700{% endif %}">{{ card.title_badge }}</span>
                  </div>
                  <button type="button" class="{{ chrome.muted_button_class }}" data-copy-target="title-input">Copy</button>
                </div>
                <textarea id="title-input" name="title" rows="2" class="{{ chrome.field_class }} text-lg" aria-label="Editable product title">{{ card.title }}</textarea>
                <div id="title-highlight" class="whitespace-pre-wrap break-words text-lg" aria-hidden="true">
                  {%- for seg in card.title_segments -%}
                    {%- if seg.is_matched() -%}<mark class="{{ chrome.mark_title_class }}">{{ seg.text }}</mark>{%- else -%}{{ seg.text }}{%- endif -%}
                  {%- endfor -%}
                </div>
              </article>

              <article class="{{ chrome.panel_class }}">
                <div class="flex justify-between items-center">
                  <div class="flex items-center gap-3">
                    <h2 class="text-xl font-semibold">Generated Description</h2>
                    <span id="description-badge" class="text-sm font-medium px-2.5 py-1 rounded-full {% if card.description_over %}bg-red-100 text-red-800{% else %}bg-slate-200 dark:bg-slate-700{% endif %}">{{ card.description_badge }}</span>
                  </div>
                  <button type="button" class="{{ chrome.muted_button_class }}" data-copy-target="description-input">Copy</button>
                </div>
                <textarea id="description-input" name="description" rows="8" class="{{ chrome.field_class }}" aria-label="Editable product description">{{ card.description }}</textarea>
                <div id="description-highlight" class="whitespace-pre-wrap break-words leading-relaxed" aria-hidden="true">
                  {%- for seg in card.description_segments -%}
                    {%- if seg.is_matched() -%}<mark class="{{ chrome.mark_description_class }}">{{ seg.text }}</mark>{%- else -%}{{ seg.text }}{%- endif -%}
                  {%- endfor -%}
                </div>
              </article>

              <article class="{{ chrome.panel_class }}">
                <div class="flex justify-between items-center">
                  <h2 class="text-xl font-semibold">Suggested Category</h2>
                  <button type="button" class="{{ chrome.muted_button_class }}" data-copy="{{ card.category }}">Copy</button>
                </div>
                <p class="font-medium text-purple-700 dark:text-purple-300 bg-purple-100 dark:bg-purple-900/50 px-3 py-1 rounded-full inline-block">{{ card.category }}</p>
              </article>
            </div>

            <div class="lg:col-span-1 space-y-8">
              <article class="{{ chrome.panel_class }}">
                <h2 class="text-xl font-semibold">SEO Keywords</h2>
                <div class="flex flex-wrap justify-around text-xs gap-x-4 gap-y-2 text-slate-600 dark:text-slate-400">
                  <span class="flex items-center gap-1.5"><span class="w-3 h-3 rounded-full bg-green-500"></span>High search volume</span>
                  <span class="flex items-center gap-1.5"><span class="w-3 h-3 rounded-full bg-yellow-400"></span>Medium search volume</span>
                  <span class="flex items-center gap-1.5"><span class="w-3 h-3 rounded-full bg-orange-500"></span>Low search volume</span>
                </div>
                <ul class="space-y-3">
                  {% for kw in card.keywords %}
                  <li class="flex items-center gap-2 bg-slate-100 dark:bg-slate-700 p-2 rounded-lg" data-keyword-index="{{ kw.index }}" data-in-title="{{ kw.in_title }}">
                    <span class="w-3 h-3 rounded-full flex-shrink-0 volume-{{ kw.volume }} {% if kw.volume.query_value() == "high" %}bg-green-500{% else if kw.volume.query_value() == "medium" %}bg-yellow-400{% else %}bg-orange-500{% endif %}" title="{{ kw.volume.label() }}" aria-hidden="true"></span>
                    <input type="text" id="keyword-{{ kw.index }}" name="keyword" value="{{ kw.keyword }}" maxlength="{{ card.keyword_limit }}" class="flex-grow bg-transparent focus:outline-none px-1" aria-label="Editable keyword {{ kw.index + 1 }}">
                    <span class="keyword-badge text-sm whitespace-nowrap {% if kw.badge.over_limit %}text-red-600 font-semibold{% else %}text-slate-500{% endif %}">({{ kw.badge.count }}/{{ kw.badge.limit }})</span>
                    <button type="button" class="{{ chrome.muted_button_class }}" data-copy-target="keyword-{{ kw.index }}">Copy</button>
                  </li>
                  {% endfor %}
                </ul>
              </article>

              <article class="{{ chrome.panel_class }}">
                <h2 class="text-xl font-semibold">Suggested Materials</h2>
                <ul class="space-y-3">
                  {% for material in card.materials %}
                  <li class="flex justify-between items-center gap-2 bg-slate-100 dark:bg-slate-700 p-2 rounded-lg">
                    <span class="px-1">{{ material }}</span>
                    <button type="button" class="{{ chrome.muted_button_class }}" data-copy="{{ material }}">Copy</button>
                  </li>
                  {% endfor %}
                </ul>
              </article>
            </div>
          </div>
        </form>
        {% endif %}
      </div>
    </main>
    <script>
      (function () {
        var root = document.documentElement;
        document.getElementById("theme-toggle").addEventListener("click", function () {
          root.dataset.scheme = "manual";
          root.classList.toggle("dark");
        });

        document.querySelectorAll("[data-copy], [data-copy-target]").forEach(function (button) {
          button.addEventListener("click", async function () {
            var target = button.dataset.copyTarget ? document.getElementById(button.dataset.copyTarget) : null;
            var text = target ? target.value : button.dataset.copy;
            try {
              await navigator.clipboard.writeText(text);
              button.textContent = "Copied";
              setTimeout(function () { button.textContent = "Copy"; }, 2000);
            } catch (err) {
              console.error("Failed to copy text: ", err);
            }
          });
        });

        var generate = document.getElementById("generate-form");
        generate.addEventListener("submit", function (event) {
          if (!document.getElementById("product-description").value.trim()) {
            event.preventDefault();
            return;
          }
          var button = document.getElementById("generate-button");
          button.textContent = "Generating...";
          button.setAttribute("aria-busy", "true");
        });

        var form = document.getElementById("listing-form");
        if (!form) return;

        function fill(container, segments, markClass) {
          container.textContent = "";
          segments.forEach(function (segment) {
            if (segment.kind === "matched") {
              var mark = document.createElement("mark");
              mark.className = markClass;
              mark.textContent = segment.text;
              container.appendChild(mark);
            } else {
              container.appendChild(document.createTextNode(segment.text));
            }
          });
        }

        function badge(element, value) {
          element.textContent = value.count + " / " + value.limit;
          element.classList.toggle("bg-red-100", value.over_limit);
          element.classList.toggle("text-red-800", value.over_limit);
        }

        var pending = null;
        function refresh() {
          var keywords = Array.prototype.map.call(form.querySelectorAll("input[name=keyword]"), function (input) { return input.value; });
          fetch("/api/draft", {
            method: "POST",
            headers: { "Content-Type": "application/json" },
            body: JSON.stringify({
              title: document.getElementById("title-input").value,
              description: document.getElementById("description-input").value,
              keywords: keywords
            })
          })
            .then(function (response) { return response.ok ? response.json() : null; })
            .then(function (view) {
              if (!view) return;
              fill(document.getElementById("title-highlight"), view.title_segments, "{{ chrome.mark_title_class|safe }}");
              fill(document.getElementById("description-highlight"), view.description_segments, "{{ chrome.mark_description_class|safe }}");
              badge(document.getElementById("title-badge"), view.title_badge);
              badge(document.getElementById("description-badge"), view.description_badge);
              view.keywords.forEach(function (kw) {
                var row = form.querySelector("[data-keyword-index='" + kw.index + "']");
                if (!row) return;
                row.dataset.inTitle = kw.in_title;
                var counter = row.querySelector(".keyword-badge");
                counter.textContent = "(" + kw.badge.count + "/" + kw.badge.limit + ")";
                counter.classList.toggle("text-red-600", kw.badge.over_limit);
              });
              var save = document.getElementById("save-button");
              save.disabled = !view.save_button.enabled;
              save.textContent = view.save_button.label;
            });
        }

        form.addEventListener("input", function () {
          clearTimeout(pending);
          pending = setTimeout(refresh, 200);
        });

        form.addEventListener("submit", function (event) {
          if (event.submitter && event.submitter.value === "save") {
            event.submitter.textContent = "Saving…";
            event.submitter.setAttribute("aria-busy", "true");
          }
        });
      })();
    </script>
  </body>
</html>"#,
    ext = "html"
)]
struct PageTemplate<'a> {
    chrome: Chrome,
    base_url: &'a str,
    version: &'static str,
    input: &'a str,
    error: &'a str,
    has_error: bool,
    has_card: bool,
    card: ListingCard,
}
