//! REST API for the loading service.
//!
//! Exposes the packing engine over HTTP with Axum. Requests carry the bin
//! catalog, the item lines and optional per-request options; responses
//! describe every committed bin and the items left over.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use futures::StreamExt;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, OptimizerConfig};
use crate::model::{
    BinType, BinTypeRecord, CommittedBin, ItemRecord, PackResult, UnitItem, UnplacedItem,
    MAX_UNITS, ValidationError, build_catalog, expand_items, unit_count,
};
use crate::optimizer::{Objective, PackOptions, PackerKind, pack, pack_with_progress};

#[derive(Clone)]
struct ApiState {
    optimizer_config: OptimizerConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>pack-it-now API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
</html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Per-request option overrides. Omitted fields keep the service defaults.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackOptionsRequest {
    pub clearance: Option<f64>,
    pub keep_z_base: Option<bool>,
    pub lock_axes_fully: Option<bool>,
    pub forbid_z_rotation: Option<bool>,
    pub max_stack_height: Option<f64>,
    pub strategy: Option<Objective>,
    pub packer: Option<PackerKind>,
    pub max_iterations: Option<usize>,
}

impl PackOptionsRequest {
    /// Applies the overrides on top of `defaults`.
    fn apply(&self, defaults: PackOptions) -> PackOptions {
        PackOptions::builder()
            .clearance(self.clearance.unwrap_or(defaults.clearance))
            .keep_z_base(self.keep_z_base.unwrap_or(defaults.keep_z_base))
            .lock_axes_fully(self.lock_axes_fully.unwrap_or(defaults.lock_axes_fully))
            .forbid_z_rotation(self.forbid_z_rotation.unwrap_or(defaults.forbid_z_rotation))
            .max_stack_height(self.max_stack_height.or(defaults.max_stack_height))
            .objective(self.strategy.unwrap_or(defaults.objective))
            .packer(self.packer.unwrap_or(defaults.packer))
            .max_iterations(self.max_iterations.unwrap_or(defaults.max_iterations))
            .build()
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "binTypes": [
            {"code": "48", "name": "Van 48'", "length": 576.0, "width": 100.0, "height": 96.0, "cost": 700.0},
            {"code": "53", "name": "Van 53'", "length": 636.0, "width": 100.0, "height": 96.0, "cost": 800.0}
        ],
        "items": [
            {"type": "A", "length": 120.0, "width": 45.0, "height": 33.0, "quantity": 20}
        ],
        "options": {"strategy": "min_vans", "clearance": 0.0}
    })
)]
pub struct PackRequest {
    pub bin_types: Vec<BinTypeRecord>,
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    pub options: Option<PackOptionsRequest>,
}

#[derive(Debug)]
struct ValidatedPackRequest {
    catalog: Vec<BinType>,
    items: Vec<UnitItem>,
    options: PackOptions,
}

impl PackRequest {
    fn into_validated(self, defaults: PackOptions) -> Result<ValidatedPackRequest, ValidationError> {
        let options = match &self.options {
            Some(overrides) => overrides.apply(defaults),
            None => defaults,
        };
        options.validate()?;

        let catalog = build_catalog(&self.bin_types);
        if catalog.is_empty() {
            return Err(ValidationError::EmptyCatalog(format!(
                "{} bin types supplied, none with positive dimensions",
                self.bin_types.len()
            )));
        }

        let units = unit_count(&self.items);
        if units > MAX_UNITS {
            return Err(ValidationError::InvalidOption(format!(
                "items expand to {units} units, at most {MAX_UNITS} are allowed"
            )));
        }

        Ok(ValidatedPackRequest {
            catalog,
            items: expand_items(&self.items),
            options,
        })
    }
}

/// Response with every committed bin and the leftover items.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackResponse {
    pub bins: Vec<PackedBin>,
    pub stats: PackStatsResponse,
    pub remaining: Vec<RemainingItem>,
    pub is_complete: bool,
}

/// One committed bin.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackedBin {
    pub code: String,
    pub name: String,
    pub l: f64,
    pub w: f64,
    pub h: f64,
    pub cost: f64,
    pub placed: Vec<PackedItem>,
    pub fill_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_used: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_weight: Option<f64>,
}

/// One placed item; `l`, `w`, `h` are the chosen orientation.
#[derive(Serialize, ToSchema)]
pub struct PackedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub l: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackStatsResponse {
    pub used_bins: usize,
    pub total_cost: f64,
    pub unplaced_count: usize,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemainingItem {
    pub id: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub l: f64,
    pub w: f64,
    pub h: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    pub reason_code: String,
    pub reason: String,
}

impl From<CommittedBin> for PackedBin {
    fn from(bin: CommittedBin) -> Self {
        let CommittedBin {
            bin_type,
            placements,
            fill_rate,
            weight_used,
        } = bin;

        Self {
            placed: placements
                .into_iter()
                .map(|p| PackedItem {
                    id: p.item.id,
                    type_tag: p.item.type_tag,
                    x: p.position.x,
                    y: p.position.y,
                    z: p.position.z,
                    l: p.dims.x,
                    w: p.dims.y,
                    h: p.dims.z,
                })
                .collect(),
            code: bin_type.code,
            name: bin_type.name,
            l: bin_type.dims.x,
            w: bin_type.dims.y,
            h: bin_type.dims.z,
            cost: bin_type.cost,
            fill_rate,
            weight_used,
            max_weight: bin_type.max_weight,
        }
    }
}

impl From<UnplacedItem> for RemainingItem {
    fn from(entry: UnplacedItem) -> Self {
        Self {
            reason_code: entry.reason.code().to_string(),
            reason: entry.reason.to_string(),
            id: entry.item.id,
            type_tag: entry.item.type_tag,
            l: entry.item.dims.x,
            w: entry.item.dims.y,
            h: entry.item.dims.z,
            weight: entry.item.weight,
        }
    }
}

impl From<PackResult> for PackResponse {
    fn from(result: PackResult) -> Self {
        let is_complete = result.is_complete();
        let PackResult {
            bins,
            unplaced,
            stats,
        } = result;

        Self {
            bins: bins.into_iter().map(PackedBin::from).collect(),
            stats: PackStatsResponse {
                used_bins: stats.used_bins,
                total_cost: stats.total_cost,
                unplaced_count: stats.unplaced_count,
            },
            remaining: unplaced.into_iter().map(RemainingItem::from).collect(),
            is_complete,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(err: ValidationError) -> Response {
    let error = match err {
        ValidationError::InvalidOption(_) => "Invalid options",
        ValidationError::EmptyCatalog(_) => "Invalid bin catalog",
    };
    error_response(StatusCode::UNPROCESSABLE_ENTITY, error, err.to_string())
}

fn parse_pack_request(
    payload: Result<Json<PackRequest>, JsonRejection>,
    defaults: PackOptions,
) -> Result<ValidatedPackRequest, Response> {
    let Json(payload) = payload.map_err(json_deserialize_error)?;
    payload.into_validated(defaults).map_err(validation_error)
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_pack, handle_pack_stream, handle_health),
    components(
        schemas(
            PackRequest,
            PackOptionsRequest,
            ItemRecord,
            BinTypeRecord,
            Objective,
            PackerKind,
            PackResponse,
            PackedBin,
            PackedItem,
            PackStatsResponse,
            RemainingItem,
            HealthResponse,
            ErrorResponse
        )
    ),
    tags((name = "packing", description = "Endpoints for bin loading"))
)]
struct ApiDoc;

fn router(optimizer_config: OptimizerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/pack", post(handle_pack))
        .route("/pack_stream", post(handle_pack_stream))
        .route("/health", get(handle_health))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { optimizer_config })
}

/// Starts the API server and blocks until it terminates.
pub async fn start_api_server(config: ApiConfig, optimizer_config: OptimizerConfig) {
    let app = router(optimizer_config);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("❌ Could not bind API server to {}: {}", addr, err);
            return;
        }
    };

    info!(
        "🚀 Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("💡 Local access: http://localhost:{}", config.port());
    }
    info!("📦 API Endpoints: POST /pack, POST /pack_stream, GET /health");
    info!("📑 Documentation: GET /docs, GET /docs/openapi.json");

    if let Err(err) = axum::serve(listener, app).await {
        error!("❌ API server terminated with an error: {err}");
    }
}

/// Handler for POST /pack.
///
/// Packs the expanded items into bins drawn from the catalog and returns
/// the committed bins with their placements.
#[utoipa::path(
    post,
    path = "/pack",
    request_body = PackRequest,
    responses(
        (status = 200, description = "Items packed", body = PackResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request, options or bin catalog",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> Response {
    let request = match parse_pack_request(payload, state.optimizer_config.pack_options()) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        "📥 New pack request: {} items, {} bin types",
        request.items.len(),
        request.catalog.len()
    );
    let ValidatedPackRequest {
        catalog,
        items,
        options,
    } = request;
    let result = match tokio::task::spawn_blocking(move || pack(items, catalog, &options)).await {
        Ok(result) => result,
        Err(err) => {
            error!("❌ Packing task failed: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Packing failed",
                err.to_string(),
            );
        }
    };
    info!(
        "📦 Result: {} bins, total cost {}, {} unplaced items",
        result.stats.used_bins, result.stats.total_cost, result.stats.unplaced_count
    );

    (StatusCode::OK, Json(PackResponse::from(result))).into_response()
}

/// Handler for POST /pack_stream (SSE).
///
/// Streams packing events while the engine runs, one JSON event per
/// committed bin, per rejected group and a final summary.
#[utoipa::path(
    post,
    path = "/pack_stream",
    request_body = PackRequest,
    responses(
        (
            status = 200,
            description = "Streams packing events in real time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request, options or bin catalog",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> Response {
    let ValidatedPackRequest {
        catalog,
        items,
        options,
    } = match parse_pack_request(payload, state.optimizer_config.pack_options()) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        pack_with_progress(items, catalog, &options, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver only means the client went away.
                let _ = tx.blocking_send(json);
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "packing"
)]
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
