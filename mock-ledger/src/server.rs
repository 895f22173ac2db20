use crate::config::MockConfig;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::wire::{
    EndorseResponse, ErrorBody, ErrorDetail, InvokeRequest, ProposalResponse, StatusResponse,
    SubmitResponse, MSP_ID_HEADER,
};
use axum::{
    extract::{Json, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};

/// Routes of the mock ledger over shared state.
pub fn router(ledger: Arc<Ledger>) -> Router {
    Router::new()
        .route(
            "/channels/:channel/contracts/:contract/evaluate",
            post(evaluate),
        )
        .route(
            "/channels/:channel/contracts/:contract/proposals",
            post(propose),
        )
        .route("/transactions/:id/endorse", post(endorse))
        .route("/transactions/:id/submit", post(submit))
        .route("/transactions/:id/status", get(status))
        .with_state(ledger)
        .layer(TraceLayer::new_for_http())
}

/// Serves a fresh ledger on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, config: MockConfig) -> std::io::Result<()> {
    let app = router(Arc::new(Ledger::new(config)));
    info!("Mock ledger listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

pub async fn run(addr: SocketAddr, config: MockConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, config).await
}

struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(err: LedgerError, ledger: &Ledger) -> Self {
        let status = match &err {
            LedgerError::UnknownTransaction(_) => StatusCode::NOT_FOUND,
            LedgerError::OutOfOrder { .. } => StatusCode::CONFLICT,
            LedgerError::Evaluate(_) | LedgerError::Endorse { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            LedgerError::PoisonData => StatusCode::SERVICE_UNAVAILABLE,
        };

        let details = err
            .contract_error()
            .map(|source| ErrorDetail {
                address: ledger.config().peer_address.clone(),
                msp_id: ledger.config().msp_id.clone(),
                message: format!("chaincode response 500, {source}"),
            })
            .into_iter()
            .collect();

        Self {
            status,
            body: ErrorBody {
                message: err.to_string(),
                details,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[instrument(skip(ledger, request), fields(method = %request.method))]
async fn evaluate(
    State(ledger): State<Arc<Ledger>>,
    Path((channel, contract)): Path<(String, String)>,
    Json(request): Json<InvokeRequest>,
) -> ApiResult<impl IntoResponse> {
    let payload = ledger
        .evaluate(&request)
        .map_err(|err| ApiError::new(err, &ledger))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], payload))
}

#[instrument(skip(ledger, headers, request), fields(method = %request.method))]
async fn propose(
    State(ledger): State<Arc<Ledger>>,
    Path((channel, contract)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<InvokeRequest>,
) -> ApiResult<Json<ProposalResponse>> {
    let creator = headers
        .get(MSP_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");
    ledger
        .propose(creator, request)
        .map(Json)
        .map_err(|err| ApiError::new(err, &ledger))
}

async fn endorse(
    State(ledger): State<Arc<Ledger>>,
    Path(id): Path<String>,
) -> ApiResult<Json<EndorseResponse>> {
    match ledger.endorse(&id).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => Err(ApiError::new(err, &ledger)),
    }
}

async fn submit(
    State(ledger): State<Arc<Ledger>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SubmitResponse>> {
    match ledger.submit(&id).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => Err(ApiError::new(err, &ledger)),
    }
}

async fn status(
    State(ledger): State<Arc<Ledger>>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    match ledger.status(&id).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => Err(ApiError::new(err, &ledger)),
    }
}
