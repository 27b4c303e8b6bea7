use std::{
    convert::Infallible,
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    body::{Body, Bytes},
    extract::{Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Datelike, Utc};
use futures::stream;
use tokio::{
    net::TcpListener,
    sync::{Mutex, Notify},
};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use lights_common::{
    control::{self, OVERRULE_ACCEPTED, RESUME_ACCEPTED, SET_ACCEPTED},
    ControlError, ControllerConfig, LightingController, LocalClock, LogStream, Schedule,
    SyncOutcome, TimeSource,
};

use crate::{
    diagnostics::Diagnostics,
    pwm::{self, LogOutput, OutputDriver},
    store::AppStore,
};

const LOG_CHUNK_BYTES: usize = 512;

/// Wall clock readings before this year mean the host has no real time yet.
const MIN_VALID_YEAR: i32 = 2021;

/// Exit status after `/reset`. Non-zero so that `Restart=on-failure` units
/// come back as well as `Restart=always` ones.
const RESTART_EXIT_STATUS: u8 = 75;

#[derive(Clone)]
struct AppState {
    controller: Arc<Mutex<LightingController>>,
    diagnostics: Diagnostics,
    store: AppStore,
    restart: Arc<Notify>,
    restart_requested: Arc<AtomicBool>,
    web_root: Arc<PathBuf>,
}

/// UTC from the operating system, which is kept in step by NTP.
struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn poll(&mut self) -> Option<DateTime<Utc>> {
        let now = Utc::now();
        (now.year() >= MIN_VALID_YEAR).then_some(now)
    }
}

/// Serves until `/reset` or ctrl-c. A reset ends with `RESTART_EXIT_STATUS`
/// and relies on the process supervisor to start the controller again.
pub async fn run() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::from_env();
    let mut config = store.load_config().await.unwrap_or_else(|err| {
        warn!("failed to load controller config from store: {err:#}");
        ControllerConfig::default()
    });
    if let Some(port) = std::env::var("LIGHTS_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config.http_port = port;
    }
    if let Ok(web_root) = std::env::var("LIGHTS_WEB_ROOT") {
        config.web_root = Some(web_root);
    }
    config.sanitize();

    let diagnostics = Diagnostics::new(&config.diagnostics);
    diagnostics.record(format!(
        "Starting lights controller {}",
        env!("CARGO_PKG_VERSION")
    ));

    let schedule = load_schedule_or_default(&store, &diagnostics).await;

    let mut driver: Box<dyn OutputDriver> = match pwm::build_driver(&config.output) {
        Ok(driver) => driver,
        Err(err) => {
            warn!("pwm output unavailable, falling back to log output: {err:#}");
            Box::new(LogOutput)
        }
    };
    pwm::switch_off(driver.as_mut());

    let web_root = config
        .web_root
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("{}/web", env!("CARGO_MANIFEST_DIR"))));
    let clock = LocalClock::new(
        config.timezone.clone(),
        config.resync_interval_secs * 1_000,
    );
    let app_state = AppState {
        controller: Arc::new(Mutex::new(LightingController::new(schedule, clock))),
        diagnostics,
        store,
        restart: Arc::new(Notify::new()),
        restart_requested: Arc::new(AtomicBool::new(false)),
        web_root: Arc::new(web_root),
    };

    spawn_tick_loop(
        app_state.clone(),
        driver,
        Duration::from_millis(config.tick_interval_ms),
    );

    let app = router(app_state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    app_state
        .diagnostics
        .record(format!("HTTP server started on port {}", config.http_port));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state.restart.clone()))
        .await?;

    let status = exit_status(app_state.restart_requested.load(Ordering::SeqCst));
    info!("controller stopped with status {status}");
    Ok(ExitCode::from(status))
}

fn exit_status(restart_requested: bool) -> u8 {
    if restart_requested {
        RESTART_EXIT_STATUS
    } else {
        0
    }
}

/// The settings block never stops startup: any read failure leaves an empty
/// schedule.
async fn load_schedule_or_default(store: &AppStore, diagnostics: &Diagnostics) -> Schedule {
    match store.load_schedule().await {
        Ok(schedule) => {
            diagnostics.record("Settings loaded");
            schedule
        }
        Err(err) => {
            warn!("failed to load settings from store: {err:#}");
            diagnostics.record("Settings unreadable, schedule cleared");
            Schedule::default()
        }
    }
}

fn router(app_state: AppState) -> Router {
    let assets = Router::new()
        .fallback_service(ServeDir::new(app_state.web_root.as_ref()))
        .layer(middleware::from_fn_with_state(
            app_state.diagnostics.clone(),
            guard_assets,
        ));

    Router::new()
        .route("/", get(handle_root))
        .route("/getconf", get(handle_getconf))
        .route("/setconf", get(handle_setconf).post(handle_setconf))
        .route("/overrule", get(handle_overrule).post(handle_overrule))
        .route("/resume", post(handle_resume))
        .route("/reset", get(handle_reset).post(handle_reset))
        .route("/logging", get(handle_logging))
        .route("/test", get(handle_test))
        .route("/api/status", get(handle_get_status))
        .fallback_service(assets)
        .with_state(app_state)
}

async fn shutdown_signal(restart: Arc<Notify>) {
    tokio::select! {
        _ = restart.notified() => info!("restart requested"),
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!("failed to listen for ctrl-c: {err}");
            }
            info!("ctrl-c received");
        }
    }
}

fn spawn_tick_loop(app_state: AppState, mut driver: Box<dyn OutputDriver>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let mut source = SystemTimeSource;
        let mut last_ms = monotonic_ms();
        let mut sync_failing = false;

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();
            let elapsed = chrono::Duration::milliseconds(now_ms.saturating_sub(last_ms) as i64);
            last_ms = now_ms;

            let (outcome, local_time, seconds_of_day, actions) = {
                let mut controller = app_state.controller.lock().await;
                let clock = controller.clock_mut();
                clock.advance(elapsed);
                let outcome = clock.refresh(&mut source, now_ms);
                let local_time = clock.formatted();
                let seconds_of_day = clock.seconds_of_day();
                (outcome, local_time, seconds_of_day, controller.tick())
            };

            app_state.diagnostics.set_local_time(seconds_of_day);
            match outcome {
                SyncOutcome::Synced { first } => {
                    sync_failing = false;
                    if first {
                        app_state
                            .diagnostics
                            .record(format!("Time synchronized, local time {local_time}"));
                    } else {
                        debug!("time re-synchronized at {local_time}");
                    }
                }
                SyncOutcome::Failed if !sync_failing => {
                    sync_failing = true;
                    warn!("time source has no valid time yet");
                    app_state.diagnostics.record("Time sync failed");
                }
                SyncOutcome::Failed | SyncOutcome::NotDue => {}
            }

            if !actions.is_empty() {
                pwm::apply_actions(driver.as_mut(), &actions, &app_state.diagnostics);
            }
        }
    });
}

async fn handle_root(State(state): State<AppState>) -> Response {
    let path = state.web_root.join("index.html");
    match tokio::fs::read(&path).await {
        Ok(page) => {
            state.diagnostics.record("HTTP home page request");
            ([(header::CONTENT_TYPE, "text/html")], page).into_response()
        }
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!("failed to read {}: {err}", path.display());
            }
            not_found("/index.html")
        }
    }
}

async fn handle_getconf(State(state): State<AppState>) -> Response {
    state.diagnostics.record("HTTP getconf request");
    let reply = control::get_schedule(&*state.controller.lock().await);
    reply.into_response()
}

async fn handle_setconf(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    body: String,
) -> Response {
    state.diagnostics.record("HTTP setconf request");
    let input = request_text(&params, &body);

    let schedule = match control::parse_schedule(input) {
        Ok(schedule) => schedule,
        Err(err) => {
            state.diagnostics.record(format!("Set rejected: {err}"));
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    // Held across the save so the live table and the settings file agree.
    let mut controller = state.controller.lock().await;
    if let Err(err) = state.store.save_schedule(&schedule).await {
        warn!("failed to persist schedule update: {err:#}");
        state.diagnostics.record("Settings write failed");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to persist settings");
    }
    control::install_schedule(&mut controller, schedule);
    drop(controller);
    state.diagnostics.record("Settings saved");

    SET_ACCEPTED.into_response()
}

async fn handle_overrule(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    body: String,
) -> Response {
    state.diagnostics.record("HTTP overrule request");
    let input = request_text(&params, &body);

    let levels = {
        let mut controller = state.controller.lock().await;
        control::set_override(&mut controller, input)
    };
    state
        .diagnostics
        .record(format!("Overrule active, A {} B {}", levels.a, levels.b));

    OVERRULE_ACCEPTED.into_response()
}

async fn handle_resume(State(state): State<AppState>) -> Response {
    state.diagnostics.record("HTTP resume request");
    let was_active = control::resume_schedule(&mut *state.controller.lock().await);
    if was_active {
        state.diagnostics.record("Overrule cleared, schedule resumed");
    }
    RESUME_ACCEPTED.into_response()
}

async fn handle_reset(State(state): State<AppState>) -> Response {
    state.diagnostics.record("HTTP reset request");
    state.restart_requested.store(true, Ordering::SeqCst);
    state.restart.notify_one();
    "Restarting".into_response()
}

async fn handle_test(State(state): State<AppState>) -> Response {
    state.diagnostics.record("HTTP test request");
    format!("Free memory is {}", state.diagnostics.free_bytes()).into_response()
}

async fn handle_get_status(State(state): State<AppState>) -> Response {
    state.diagnostics.record("HTTP status request");
    let status = state.controller.lock().await.status();
    Json(status).into_response()
}

/// Streams the diagnostic log in `LOG_CHUNK_BYTES` pieces; a short chunk ends
/// the body.
async fn handle_logging(State(state): State<AppState>) -> Response {
    state.diagnostics.record("HTTP logging request");

    let diagnostics = state.diagnostics.clone();
    let chunks = stream::unfold(Some((LogStream::new(), 0usize)), move |cursor| {
        let diagnostics = diagnostics.clone();
        async move {
            let (mut log_stream, index) = cursor?;
            let mut buf = vec![0u8; LOG_CHUNK_BYTES];
            let filled = diagnostics.fill(&mut log_stream, &mut buf, index);
            if filled == 0 {
                return None;
            }
            buf.truncate(filled);
            let next = (filled == LOG_CHUNK_BYTES).then_some((log_stream, index + filled));
            Some((Ok::<_, Infallible>(Bytes::from(buf)), next))
        }
    });

    (
        [(header::CONTENT_TYPE, "text/plain")],
        Body::from_stream(chunks),
    )
        .into_response()
}

/// Static files: refuses secrets, unknown types and traversal, and labels
/// everything else with the content type of its extension.
async fn guard_assets(
    State(diagnostics): State<Diagnostics>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let content_type = match control::asset_content_type(&path) {
        Ok(content_type) => content_type,
        Err(err) => return error_response(StatusCode::NOT_FOUND, &err.to_string()),
    };

    let mut response = next.run(request).await;
    if !response.status().is_success() {
        return not_found(&path);
    }

    diagnostics.record(format!("HTTP file request {path}"));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// The first query argument carries the payload, as `?5,5` or `?v=5,5`;
/// without one the request body is used.
fn request_text<'a>(params: &'a [(String, String)], body: &'a str) -> &'a str {
    match params.first() {
        Some((key, value)) if value.is_empty() => key.as_str(),
        Some((_, value)) => value.as_str(),
        None => body,
    }
}

fn not_found(path: &str) -> Response {
    let err = ControlError::NotFound {
        path: path.to_string(),
    };
    error_response(StatusCode::NOT_FOUND, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
