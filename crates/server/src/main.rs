use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use server_api::{into_action_result, ApiContext};
use shared::{
    domain::{Card, CardId, CardOrder, Deck, DeckId, DeckSummary, DeckWithCards, OwnerId},
    error::{ApiError, ErrorCode},
    protocol::{
        ActionResult, CreateCardInput, CreateDeckInput, DeleteCardInput, DeleteDeckInput,
        LoginRequest, LoginResponse, ReorderCardsInput, ServerEvent, UpdateCardInput,
        UpdateDeckInput,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod auth;
mod config;
mod extract;

use app_state::AppState;
use auth::{caller_from_headers, mint_session_token, verify_session_token, SessionConfig};
use config::{load_settings, prepare_database_url};
use extract::{ActionJson, ActionPath};

const MAX_BODY_BYTES: usize = 256 * 1024;
const MAX_USER_ID_CHARS: usize = 255;

type ActionResponse<T> = (StatusCode, Json<ActionResult<T>>);

#[derive(Debug, Deserialize, Serialize)]
struct DeckBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CardBody {
    front: String,
    back: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReorderBody {
    card_orders: Vec<CardOrder>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext::new(storage),
        session: SessionConfig {
            secret: settings.session_secret,
            ttl_seconds: settings.session_ttl_seconds,
        },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(login))
        .route("/decks", get(http_list_decks).post(http_create_deck))
        .route(
            "/decks/:deck_id",
            get(http_get_deck)
                .put(http_update_deck)
                .delete(http_delete_deck),
        )
        .route("/decks/:deck_id/cards", post(http_create_card))
        .route(
            "/decks/:deck_id/cards/:card_id",
            put(http_update_card).delete(http_delete_card),
        )
        .route("/decks/:deck_id/reorder", post(http_reorder_cards))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T>(operation: &str, result: Result<T, ApiError>) -> ActionResponse<T> {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(err) => status_for(err.code),
    };
    (status, Json(into_action_result(operation, result)))
}

fn respond_unit(operation: &str, result: Result<(), ApiError>) -> ActionResponse<()> {
    match result {
        Ok(()) => (StatusCode::OK, Json(ActionResult::done())),
        Err(err) => respond(operation, Err(err)),
    }
}

fn caller(state: &AppState, headers: &HeaderMap) -> Option<OwnerId> {
    caller_from_headers(&state.session, headers)
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.api.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            warn!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ApiError>)> {
    let user_id = req.user_id.as_str().trim();
    if user_id.is_empty() || user_id.chars().count() > MAX_USER_ID_CHARS {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, "invalid user id")),
        ));
    }

    let token = mint_session_token(&state.session, &OwnerId::new(user_id)).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(
                ErrorCode::Internal,
                format!("token mint failed: {e}"),
            )),
        )
    })?;
    Ok(Json(LoginResponse { token }))
}

async fn http_list_decks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ActionResponse<Vec<DeckSummary>> {
    let caller = caller(&state, &headers);
    respond(
        "listDecks",
        server_api::list_decks(&state.api, caller.as_ref()).await,
    )
}

async fn http_get_deck(
    State(state): State<Arc<AppState>>,
    ActionPath(deck_id): ActionPath<i64>,
    headers: HeaderMap,
) -> ActionResponse<DeckWithCards> {
    let caller = caller(&state, &headers);
    respond(
        "getDeckWithCards",
        server_api::get_deck_with_cards(&state.api, caller.as_ref(), DeckId(deck_id)).await,
    )
}

async fn http_create_deck(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ActionJson(body): ActionJson<DeckBody>,
) -> ActionResponse<Deck> {
    let caller = caller(&state, &headers);
    let input = CreateDeckInput {
        name: body.name,
        description: body.description,
    };
    respond(
        "createDeck",
        server_api::create_deck(&state.api, caller.as_ref(), &input).await,
    )
}

async fn http_update_deck(
    State(state): State<Arc<AppState>>,
    ActionPath(deck_id): ActionPath<i64>,
    headers: HeaderMap,
    ActionJson(body): ActionJson<DeckBody>,
) -> ActionResponse<Deck> {
    let caller = caller(&state, &headers);
    let input = UpdateDeckInput {
        id: DeckId(deck_id),
        name: body.name,
        description: body.description,
    };
    respond(
        "updateDeck",
        server_api::update_deck(&state.api, caller.as_ref(), &input).await,
    )
}

async fn http_delete_deck(
    State(state): State<Arc<AppState>>,
    ActionPath(deck_id): ActionPath<i64>,
    headers: HeaderMap,
) -> ActionResponse<()> {
    let caller = caller(&state, &headers);
    let input = DeleteDeckInput {
        id: DeckId(deck_id),
    };
    respond_unit(
        "deleteDeck",
        server_api::delete_deck(&state.api, caller.as_ref(), &input).await,
    )
}

async fn http_create_card(
    State(state): State<Arc<AppState>>,
    ActionPath(deck_id): ActionPath<i64>,
    headers: HeaderMap,
    ActionJson(body): ActionJson<CardBody>,
) -> ActionResponse<Card> {
    let caller = caller(&state, &headers);
    let input = CreateCardInput {
        deck_id: DeckId(deck_id),
        front: body.front,
        back: body.back,
    };
    respond(
        "createCard",
        server_api::create_card(&state.api, caller.as_ref(), &input).await,
    )
}

async fn http_update_card(
    State(state): State<Arc<AppState>>,
    ActionPath((deck_id, card_id)): ActionPath<(i64, i64)>,
    headers: HeaderMap,
    ActionJson(body): ActionJson<CardBody>,
) -> ActionResponse<Card> {
    let caller = caller(&state, &headers);
    let input = UpdateCardInput {
        id: CardId(card_id),
        deck_id: DeckId(deck_id),
        front: body.front,
        back: body.back,
    };
    respond(
        "updateCard",
        server_api::update_card(&state.api, caller.as_ref(), &input).await,
    )
}

async fn http_delete_card(
    State(state): State<Arc<AppState>>,
    ActionPath((deck_id, card_id)): ActionPath<(i64, i64)>,
    headers: HeaderMap,
) -> ActionResponse<()> {
    let caller = caller(&state, &headers);
    let input = DeleteCardInput {
        id: CardId(card_id),
        deck_id: DeckId(deck_id),
    };
    respond_unit(
        "deleteCard",
        server_api::delete_card(&state.api, caller.as_ref(), &input).await,
    )
}

async fn http_reorder_cards(
    State(state): State<Arc<AppState>>,
    ActionPath(deck_id): ActionPath<i64>,
    headers: HeaderMap,
    ActionJson(body): ActionJson<ReorderBody>,
) -> ActionResponse<()> {
    let caller = caller(&state, &headers);
    let input = ReorderCardsInput {
        deck_id: DeckId(deck_id),
        card_orders: body.card_orders,
    };
    respond_unit(
        "reorderCards",
        server_api::reorder_cards(&state.api, caller.as_ref(), &input).await,
    )
}

/// The token is checked before the upgrade so a bad token reads as 401.
async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<WsQuery>,
    ws: Option<WebSocketUpgrade>,
) -> impl IntoResponse {
    let Some(user_id) = verify_session_token(&state.session, &q.token) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(ws) = ws else {
        return StatusCode::UPGRADE_REQUIRED.into_response();
    };
    ws.on_upgrade(move |socket| ws_connection(state, socket, user_id))
}

/// Streams the caller's own invalidation hints until the client goes away.
async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket, user_id: OwnerId) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};
    use tokio_stream::wrappers::BroadcastStream;

    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.api.events.subscribe());

    let send_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let Ok(event) = event else {
                warn!(owner = %user_id, "invalidation stream lagged");
                continue;
            };
            let Some(text) = visible_event(&event, &user_id) else {
                continue;
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

/// Serialized event when it belongs to `user_id`; other owners' hints are
/// never forwarded.
fn visible_event(event: &ServerEvent, user_id: &OwnerId) -> Option<String> {
    if event.owner_id() != user_id {
        return None;
    }
    serde_json::to_string(event).ok()
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
