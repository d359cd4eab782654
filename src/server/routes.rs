use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, patch, post};
use axum::{Extension, Json, Router};

use crate::domain::{GameTable, TableFilter, User};
use crate::engine::hilo::PlayerAction;
use crate::game::{AlertCounts, GameCoordinator, GameError, LocalPushHub, StateView};
use crate::lobby::LobbyService;

use super::dto::{
    ActionResponse, CreateTableRequest, CreateTableResponse, CreateUserRequest, ListTablesQuery,
    PlayerActionRequest, SitRequest, StateQuery, TablesResponse, UpdateConfigRequest, UserRequest,
};
use super::error::ApiError;
use super::logging::log_requests;
use super::ws::table_ws;

#[derive(Clone)]
pub struct ServerContext {
    pub coordinator: Arc<GameCoordinator>,
    pub lobby: Arc<dyn LobbyService>,
    pub hub: Arc<LocalPushHub>,
}

pub struct HiloPokerServer {
    router: Router,
}

impl HiloPokerServer {
    pub fn new(
        coordinator: Arc<GameCoordinator>,
        lobby: Arc<dyn LobbyService>,
        hub: Arc<LocalPushHub>,
    ) -> Self {
        let context = Arc::new(ServerContext {
            coordinator,
            lobby,
            hub,
        });

        let router = Router::new()
            .route("/tables", post(create_table).get(list_tables))
            .route("/tables/:table_id", get(get_table))
            .route("/tables/:table_id/state", get(get_state))
            .route("/tables/:table_id/sit", post(take_seat))
            .route("/tables/:table_id/stand", post(stand_up))
            .route("/tables/:table_id/sit_down", post(sit_down))
            .route("/tables/:table_id/leave", post(leave_table))
            .route("/tables/:table_id/pause_unpause", post(toggle_pause))
            .route("/tables/:table_id/start", post(start_game))
            .route("/tables/:table_id/end", post(end_game))
            .route("/tables/:table_id/update_config", patch(update_config))
            .route("/tables/:table_id/actions", post(player_action))
            .route("/tables/:table_id/ws", get(table_ws))
            .route("/users", post(create_user))
            .route("/users/:user_id", get(get_user))
            .route("/alerts", get(get_alerts))
            .layer(middleware::from_fn(log_requests))
            .layer(Extension(context));

        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

type Ctx = Extension<Arc<ServerContext>>;

async fn create_table(
    Extension(ctx): Ctx,
    Json(body): Json<CreateTableRequest>,
) -> Result<(StatusCode, Json<CreateTableResponse>), ApiError> {
    let table = ctx.lobby.create_table(&body.user_id, body.config).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateTableResponse {
            table_id: table.table_id,
        }),
    ))
}

async fn list_tables(
    Extension(ctx): Ctx,
    Query(query): Query<ListTablesQuery>,
) -> Result<Json<TablesResponse>, ApiError> {
    let tables = ctx
        .lobby
        .list_tables(TableFilter {
            status: query.status,
        })
        .await?;
    Ok(Json(TablesResponse { tables }))
}

async fn get_table(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
) -> Result<Json<GameTable>, ApiError> {
    Ok(Json(ctx.lobby.get_table(&table_id).await?))
}

async fn get_state(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
    Query(query): Query<StateQuery>,
) -> Result<Json<StateView>, ApiError> {
    let view = ctx
        .coordinator
        .view_state(&table_id, query.user_id.as_deref())
        .await?;
    Ok(Json(view))
}

async fn take_seat(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
    Json(body): Json<SitRequest>,
) -> Result<StatusCode, ApiError> {
    ctx.lobby
        .take_seat(&table_id, &body.user_id, body.buy_in)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stand_up(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    ctx.lobby.stand_up(&table_id, &body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sit_down(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    ctx.lobby.sit_down(&table_id, &body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_table(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    ctx.lobby.leave_table(&table_id, &body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_pause(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    ctx.lobby.toggle_pause(&table_id, &body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_game(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    ctx.lobby.start_game(&table_id, &body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn end_game(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    ctx.lobby.end_game(&table_id, &body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_config(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
    Json(body): Json<UpdateConfigRequest>,
) -> Result<StatusCode, ApiError> {
    ctx.lobby
        .update_config(&table_id, &body.user_id, body.config)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn player_action(
    Extension(ctx): Ctx,
    Path(table_id): Path<String>,
    Json(body): Json<PlayerActionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let action = PlayerAction::from_wire(&body.action, &body.payload).map_err(GameError::from)?;
    let receipt = ctx
        .coordinator
        .process_player_action(&table_id, &body.user_id, action)
        .await?;
    Ok(Json(receipt.into()))
}

async fn create_user(
    Extension(ctx): Ctx,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = ctx.lobby.create_user(&body.username, body.balance).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    Extension(ctx): Ctx,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(ctx.lobby.get_user(&user_id).await?))
}

async fn get_alerts(Extension(ctx): Ctx) -> Json<AlertCounts> {
    Json(ctx.coordinator.alerts().snapshot())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::game::CoordinatorConfig;
    use crate::lobby::TableLobby;
    use crate::store::Stores;

    fn test_router() -> Router {
        let hub = Arc::new(LocalPushHub::default());
        let coordinator = GameCoordinator::spawn(
            Stores::in_memory(),
            hub.clone(),
            CoordinatorConfig {
                rng_seed: Some(5),
                ..CoordinatorConfig::default()
            },
        );
        let lobby: Arc<dyn LobbyService> = Arc::new(TableLobby::new(Arc::clone(&coordinator)));
        HiloPokerServer::new(coordinator, lobby, hub).into_router()
    }

    async fn call(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let body = match body {
            Some(json) => Body::from(serde_json::to_vec(&json)?),
            None => Body::empty(),
        };
        let response = router.clone().oneshot(request.body(body)?).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, json))
    }

    #[tokio::test]
    async fn table_flow_over_http() -> anyhow::Result<()> {
        let router = test_router();
        let mut users = Vec::new();
        for name in ["ann", "ben", "cat", "dan"] {
            let (status, user) = call(
                &router,
                Method::POST,
                "/users",
                Some(json!({ "username": name, "balance": 500 })),
            )
            .await?;
            assert_eq!(status, StatusCode::CREATED);
            assert!(user.get("password_hash").is_none());
            users.push(user["user_id"].as_str().unwrap_or_default().to_owned());
        }

        let (status, created) = call(
            &router,
            Method::POST,
            "/tables",
            Some(json!({ "userID": users[0], "config": { "ante": 0, "small_blind": 5, "big_blind": 10 } })),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
        let table_id = created["tableID"].as_str().unwrap_or_default().to_owned();

        for user in &users {
            let (status, _) = call(
                &router,
                Method::POST,
                &format!("/tables/{table_id}/sit"),
                Some(json!({ "userID": user, "buyIn": 100 })),
            )
            .await?;
            assert_eq!(status, StatusCode::NO_CONTENT);
        }

        let (status, body) = call(
            &router,
            Method::POST,
            &format!("/tables/{table_id}/start"),
            Some(json!({ "userID": users[1] })),
        )
        .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["message"].is_string());

        let (status, _) = call(
            &router,
            Method::POST,
            &format!("/tables/{table_id}/start"),
            Some(json!({ "userID": users[0] })),
        )
        .await?;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, state) = call(
            &router,
            Method::GET,
            &format!("/tables/{table_id}/state?userID={}", users[0]),
            None,
        )
        .await?;
        assert_eq!(state["street"], "preflop");
        let actor_seat = state["current_player_seat"].as_u64().unwrap_or_default() as usize;
        let actor = state["seats"][actor_seat]["player_id"]
            .as_str()
            .unwrap_or_default()
            .to_owned();

        let (status, _) = call(
            &router,
            Method::POST,
            &format!("/tables/{table_id}/actions"),
            Some(json!({ "userID": actor, "action": "check", "payload": {} })),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, receipt) = call(
            &router,
            Method::POST,
            &format!("/tables/{table_id}/actions"),
            Some(json!({ "userID": actor, "action": "raise", "payload": { "raise_amount": 20 } })),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["street"], "preflop");
        assert!(receipt["gameSeq"].as_u64().is_some());
        assert_eq!(receipt["advance"], "settled");

        let (status, _) = call(
            &router,
            Method::POST,
            &format!("/tables/{table_id}/actions"),
            Some(json!({ "userID": actor, "action": "call", "payload": {} })),
        )
        .await?;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, listed) = call(&router, Method::GET, "/tables?status=running", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["tables"].as_array().map(Vec::len), Some(1));

        let (status, _) = call(&router, Method::GET, "/tables/nope", None).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, alerts) = call(&router, Method::GET, "/alerts", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(alerts["queue_action_failed"], 0);
        Ok(())
    }
}
