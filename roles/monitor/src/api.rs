use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};
use variance_sv2::types::format_utc;
use variance_sv2::{combined_score, unix_timestamp, StorageError};
use web_assets::icons::{icon_css, PICKAXE_FAVICON_INLINE_SVG};

use crate::collector::MetricsCollector;
use crate::metrics::FleetSummary;

const DASHBOARD_TEMPLATE: &str = include_str!("../templates/dashboard.html");
static DASHBOARD_HTML: OnceLock<String> = OnceLock::new();

const DEFAULT_ANALYTICS_DAYS: u32 = 7;
const DEFAULT_REPORT_DAYS: u32 = 30;
const DEFAULT_HISTORY_WINDOW: u64 = 300;
const DEFAULT_HISTORY_SPAN: u64 = 86_400;

/// Shared state behind every request.
pub struct ApiState {
    pub collector: Arc<MetricsCollector>,
    pub poll_interval: Duration,
}

impl ApiState {
    /// A collection older than three poll intervals means the poller is stuck.
    fn health_max_age(&self) -> Duration {
        self.poll_interval * 3
    }
}

pub async fn run_http_server(
    address: String,
    state: Arc<ApiState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(&address).await?;
    info!("🌐 Dashboard listening on http://{}", address);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(req, state).await }
            });

            if let Err(err) = http1::Builder::new()
                .keep_alive(true)
                .serve_connection(io, service)
                .await
            {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ApiState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    Ok(route(req.method(), &path, &query, &state).await)
}

/// Dispatch one request. Split from the hyper plumbing so it can be driven directly.
pub async fn route(
    method: &Method,
    path: &str,
    query: &str,
    state: &ApiState,
) -> Response<Full<Bytes>> {
    if *method != Method::GET {
        return not_found();
    }

    match path {
        "/" => respond(StatusCode::OK, "text/html; charset=utf-8", dashboard_page()),
        "/favicon.ico" | "/favicon.svg" => respond(
            StatusCode::OK,
            "image/svg+xml",
            Bytes::from_static(PICKAXE_FAVICON_INLINE_SVG.as_bytes()),
        ),
        "/health" => serve_health(state),
        "/api/metrics" => serve_metrics(state),
        "/api/variance/summary" => serve_variance_summary(state),
        _ => {
            if let Some(miner) = miner_segment(path, "/api/history/") {
                json_ok(&state.collector.history(&miner))
            } else if let Some(miner) = miner_segment(path, "/api/debug/") {
                serve_debug(state, &miner)
            } else if let Some(miner) = miner_segment(path, "/api/variance/analytics/") {
                serve_analytics(state, &miner, query).await
            } else if let Some(miner) = miner_segment(path, "/api/variance/report/") {
                serve_report(state, &miner, query).await
            } else if let Some(miner) = miner_segment(path, "/api/variance/history/") {
                serve_stability_history(state, &miner, query).await
            } else if let Some(miner) = miner_segment(path, "/api/variance/") {
                serve_variance(state, &miner)
            } else {
                not_found()
            }
        }
    }
}

fn dashboard_page() -> Bytes {
    let html = DASHBOARD_HTML
        .get_or_init(|| DASHBOARD_TEMPLATE.replace("/* {{ICON_CSS}} */", icon_css()));
    Bytes::from(html.clone())
}

fn serve_health(state: &ApiState) -> Response<Full<Bytes>> {
    let healthy = state.collector.is_fresh(state.health_max_age());
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "healthy": healthy,
        "stale": !healthy,
    });
    respond(status, "application/json", body.to_string())
}

fn serve_metrics(state: &ApiState) -> Response<Full<Bytes>> {
    let miners = state.collector.latest();
    let fleet = FleetSummary::from_metrics(&miners);
    let csv_file = state
        .collector
        .csv_path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let body = json!({
        "timestamp": format_utc(unix_timestamp(), "%Y-%m-%dT%H:%M:%SZ"),
        "csv_file": csv_file,
        "total_hashrate_th": fleet.total_hashrate_th,
        "total_expected_th": fleet.total_expected_th,
        "total_power_w": fleet.total_power_w,
        "fleet_efficiency": fleet.fleet_efficiency,
        "avg_efficiency_jth": fleet.avg_efficiency_jth,
        "avg_temperature": fleet.avg_temperature,
        "online_count": fleet.online_count,
        "total_count": fleet.total_count,
        "miners": miners,
    });
    respond(StatusCode::OK, "application/json", body.to_string())
}

fn serve_debug(state: &ApiState, miner: &str) -> Response<Full<Bytes>> {
    match state.collector.debug_report(miner) {
        Some(report) => json_ok(&report),
        None => respond(
            StatusCode::NOT_FOUND,
            "application/json",
            json!({ "error": "No data found" }).to_string(),
        ),
    }
}

fn serve_variance(state: &ApiState, miner: &str) -> Response<Full<Bytes>> {
    let windows: serde_json::Map<String, serde_json::Value> = state
        .collector
        .window_snapshots(miner)
        .into_iter()
        .map(|w| {
            let value = serde_json::to_value(w).unwrap_or(serde_json::Value::Null);
            (w.result.window_seconds.to_string(), value)
        })
        .collect();

    let body = json!({
        "miner_name": miner,
        "windows": windows,
    });
    respond(StatusCode::OK, "application/json", body.to_string())
}

fn serve_variance_summary(state: &ApiState) -> Response<Full<Bytes>> {
    let mut summaries = BTreeMap::new();

    for miner in state.collector.latest().iter().filter(|m| m.is_online()) {
        let score = combined_score(&miner.window_results(), miner.expected_hashrate_gh);
        let mut summary = json!({
            "stability_score": score.unwrap_or(0.0),
            "efficiency_pct": round_to_tenth(miner.hashrate_efficiency_pct),
            "current_deviation": round_to_tenth(miner.hashrate_gh - miner.expected_hashrate_gh),
        });
        for window in &miner.windows {
            summary[format!("variance_{}s", window.result.window_seconds)] =
                json!(window.result.std_dev.map(round_to_tenth));
        }
        summaries.insert(miner.miner_name.clone(), summary);
    }

    let body = json!({
        "timestamp": format_utc(unix_timestamp(), "%Y-%m-%dT%H:%M:%SZ"),
        "miner_summaries": summaries,
    });
    respond(StatusCode::OK, "application/json", body.to_string())
}

async fn serve_analytics(state: &ApiState, miner: &str, query: &str) -> Response<Full<Bytes>> {
    let days = match parse_param(query, "days", DEFAULT_ANALYTICS_DAYS) {
        Ok(days) => days,
        Err(response) => return response,
    };

    match state
        .collector
        .tracker()
        .analytics(miner, days, unix_timestamp())
        .await
    {
        Ok(analytics) => json_ok(&analytics),
        Err(e) => storage_error(e),
    }
}

async fn serve_report(state: &ApiState, miner: &str, query: &str) -> Response<Full<Bytes>> {
    let days = match parse_param(query, "days", DEFAULT_REPORT_DAYS) {
        Ok(days) => days,
        Err(response) => return response,
    };

    match state
        .collector
        .tracker()
        .export_report(miner, days, unix_timestamp())
        .await
    {
        Ok(path) => json_ok(&json!({
            "report_generated": true,
            "report_path": path.display().to_string(),
            "miner_name": miner,
            "analysis_days": days,
        })),
        Err(e) => storage_error(e),
    }
}

async fn serve_stability_history(
    state: &ApiState,
    miner: &str,
    query: &str,
) -> Response<Full<Bytes>> {
    let window = match parse_param(query, "window", DEFAULT_HISTORY_WINDOW) {
        Ok(window) => window,
        Err(response) => return response,
    };
    let to = match parse_param(query, "to", unix_timestamp()) {
        Ok(to) => to,
        Err(response) => return response,
    };
    let from = match parse_param(query, "from", to.saturating_sub(DEFAULT_HISTORY_SPAN)) {
        Ok(from) => from,
        Err(response) => return response,
    };

    match state
        .collector
        .tracker()
        .stability_history(miner, window, from, to)
        .await
    {
        Ok(points) => json_ok(&json!({
            "miner_name": miner,
            "window_seconds": window,
            "from": from,
            "to": to,
            "points": points,
        })),
        Err(e) => storage_error(e),
    }
}

fn storage_error(e: StorageError) -> Response<Full<Bytes>> {
    let status = match &e {
        StorageError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        _ => {
            error!("Variance storage request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    respond(
        status,
        "application/json",
        json!({ "error": e.to_string() }).to_string(),
    )
}

/// Value of `key` in `query`, `default` when absent, a 400 response when malformed.
fn parse_param<T: std::str::FromStr>(
    query: &str,
    key: &str,
    default: T,
) -> Result<T, Response<Full<Bytes>>> {
    let raw = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v);

    match raw {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| {
            respond(
                StatusCode::BAD_REQUEST,
                "application/json",
                json!({ "error": format!("Invalid {}: {}", key, raw) }).to_string(),
            )
        }),
    }
}

/// The single path segment after `prefix`, percent-decoded.
fn miner_segment(path: &str, prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(percent_decode(rest))
}

fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn json_ok<T: serde::Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_string(value) {
        Ok(body) => respond(StatusCode::OK, "application/json", body),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                "Internal Server Error",
            )
        }
    }
}

fn not_found() -> Response<Full<Bytes>> {
    respond(StatusCode::NOT_FOUND, "text/plain", "Not Found")
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use shared_config::{MinerConfig, MonitorGlobalConfig};
    use tempfile::TempDir;

    async fn state(dir: &TempDir) -> ApiState {
        let mut config = MonitorGlobalConfig {
            miners: vec![MinerConfig {
                name: "Gamma 601".to_string(),
                // Nothing listens on port 1
                ip: "127.0.0.1".to_string(),
                port: 1,
                expected_hashrate_gh: Some(1200.0),
            }],
            ..MonitorGlobalConfig::default()
        };
        config.storage.data_dir = dir.path().to_string_lossy().into_owned();
        config.polling.request_timeout_secs = 2;

        ApiState {
            collector: Arc::new(MetricsCollector::open(&config).await.unwrap()),
            poll_interval: Duration::from_secs(60),
        }
    }

    async fn get(state: &ApiState, path: &str, query: &str) -> (StatusCode, serde_json::Value) {
        let response = route(&Method::GET, path, query, state).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[test]
    fn test_miner_segment() {
        assert_eq!(miner_segment("/api/variance/Gamma", "/api/variance/"), Some("Gamma".to_string()));
        assert_eq!(
            miner_segment("/api/history/Gamma%20601", "/api/history/"),
            Some("Gamma 601".to_string())
        );
        assert_eq!(miner_segment("/api/variance/", "/api/variance/"), None);
        assert_eq!(miner_segment("/api/variance/a/b", "/api/variance/"), None);
        // Malformed escapes pass through
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("a%zzb"), "a%zzb");
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("days=14&x=1", "days", 7u32).ok(), Some(14));
        assert_eq!(parse_param("", "days", 7u32).ok(), Some(7));
        assert_eq!(parse_param("days=", "days", 7u32).ok(), Some(7));
        match parse_param("days=many", "days", 7u32) {
            Err(response) => assert_eq!(response.status(), StatusCode::BAD_REQUEST),
            Ok(days) => panic!("parsed {}", days),
        }
    }

    #[tokio::test]
    async fn test_unknown_routes_are_not_found() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;

        let response = route(&Method::GET, "/nope", "", &state).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Not Found");

        let response = route(&Method::POST, "/api/metrics", "", &state).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_pages() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;

        let response = route(&Method::GET, "/", "", &state).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&body);
        assert!(!html.contains("{{ICON_CSS}}"));
        assert!(html.contains(".pulse-icon::before"));

        let response = route(&Method::GET, "/favicon.ico", "", &state).await;
        assert_eq!(response.headers()[CONTENT_TYPE], "image/svg+xml");
    }

    #[tokio::test]
    async fn test_health_tracks_collections() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;

        let (status, body) = get(&state, "/health", "").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["healthy"], false);

        state.collector.collect_all().await;
        let (status, body) = get(&state, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stale"], false);
    }

    #[tokio::test]
    async fn test_metrics_with_offline_fleet() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;
        state.collector.collect_all().await;

        let (status, body) = get(&state, "/api/metrics", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["online_count"], 0);
        assert_eq!(body["fleet_efficiency"], 0.0);
        assert_eq!(body["csv_file"], "bitaxe_monitor_data.csv");
        assert_eq!(body["miners"][0]["status"], "OFFLINE");

        let (_, summary) = get(&state, "/api/variance/summary", "").await;
        assert!(summary["miner_summaries"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_variance_for_unknown_miner_is_empty() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;

        let (status, body) = get(&state, "/api/variance/ghost", "").await;
        assert_eq!(status, StatusCode::OK);
        for window in ["60", "300", "600"] {
            assert_eq!(body["windows"][window]["sample_count"], 0);
            assert!(body["windows"][window]["variance"].is_null());
        }

        let (status, body) = get(&state, "/api/history/ghost", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));

        let (status, body) = get(&state, "/api/debug/ghost", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No data found");
    }

    #[tokio::test]
    async fn test_stability_history_validation() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;

        let (status, _) = get(&state, "/api/variance/history/Gamma", "window=often").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(&state, "/api/variance/history/Gamma", "from=200&to=100").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = get(&state, "/api/variance/history/Gamma", "window=60&from=0&to=3600").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["window_seconds"], 60);
        assert_eq!(body["points"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_analytics_and_report() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;

        let (status, body) = get(&state, "/api/variance/analytics/Gamma%20601", "days=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["miner_name"], "Gamma 601");
        assert_eq!(body["analysis_period_days"], 3);

        let (status, body) = get(&state, "/api/variance/report/Gamma%20601", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report_generated"], true);
        assert_eq!(body["analysis_days"], 30);
        let path = body["report_path"].as_str().unwrap();
        assert!(std::path::Path::new(path).exists());
    }
}
