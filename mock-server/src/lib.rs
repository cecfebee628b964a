use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Accepted login and token lifetime for a server instance.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub username: String,
    pub password: String,
    pub token_ttl: Duration,
    /// Prefix used when building `src` links.
    pub public_url: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            username: "user".to_string(),
            password: "pw".to_string(),
            token_ttl: Duration::from_secs(20 * 60),
            public_url: "http://todoable.teachable.tech/api".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
struct StoredItem {
    id: String,
    name: String,
    finished_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
struct StoredList {
    id: String,
    name: String,
    items: Vec<StoredItem>,
}

#[derive(Default)]
struct Store {
    lists: Vec<StoredList>,
    tokens: HashMap<String, DateTime<Utc>>,
}

impl Store {
    fn list(&self, id: &str) -> Result<&StoredList, StatusCode> {
        self.lists
            .iter()
            .find(|l| l.id == id)
            .ok_or(StatusCode::NOT_FOUND)
    }

    fn list_mut(&mut self, id: &str) -> Result<&mut StoredList, StatusCode> {
        self.lists
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(StatusCode::NOT_FOUND)
    }

    /// Forget tokens whose expiry is at or before `now`.
    fn prune_tokens(&mut self, now: DateTime<Utc>) {
        self.tokens.retain(|_, expiry| *expiry > now);
    }
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<MockConfig>,
    store: Arc<RwLock<Store>>,
}

#[derive(Deserialize)]
pub struct NameField {
    pub name: String,
}

#[derive(Deserialize)]
pub struct ListEnvelope {
    pub list: NameField,
}

#[derive(Deserialize)]
pub struct ItemEnvelope {
    pub item: NameField,
}

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(RwLock::new(Store::default())),
    };
    Router::new()
        .route("/authenticate", post(authenticate))
        .route("/lists", get(list_lists).post(create_list))
        .route("/lists/{id}", get(get_list).patch(update_list).delete(delete_list))
        .route("/lists/{id}/items", post(create_item))
        .route("/lists/{id}/items/{item_id}", axum::routing::delete(delete_item))
        .route("/lists/{id}/items/{item_id}/finish", put(finish_item))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn list_src(config: &MockConfig, list_id: &str) -> String {
    format!("{}/lists/{list_id}", config.public_url)
}

fn item_json(config: &MockConfig, list_id: &str, item: &StoredItem) -> Value {
    json!({
        "id": item.id,
        "name": item.name,
        "src": format!("{}/items/{}", list_src(config, list_id), item.id),
        "finished_at": item.finished_at.map(timestamp),
    })
}

fn blank_name() -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"name": ["can't be blank"]})),
    )
        .into_response()
}

/// Decode `Authorization: Basic ...` into `(username, password)`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Reject requests without a live `Authorization: Token token=...` header.
async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Token token="))
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let store = state.store.read().await;
    match store.tokens.get(token) {
        Some(expiry) if Utc::now() < *expiry => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn authenticate(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    let (user, pass) = basic_credentials(&headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if user != state.config.username || pass != state.config.password {
        debug!(%user, "rejected credentials");
        return Err(StatusCode::UNAUTHORIZED);
    }
    let ttl = chrono::Duration::from_std(state.config.token_ttl).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let token = Uuid::new_v4().to_string();
    let now = Utc::now();
    let expires_at = now + ttl;
    let mut store = state.store.write().await;
    store.prune_tokens(now);
    store.tokens.insert(token.clone(), expires_at);
    drop(store);
    info!(%user, "issued token");
    Ok(Json(json!({"token": token, "expires_at": timestamp(expires_at)})))
}

async fn list_lists(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    authorize(&state, &headers).await?;
    let store = state.store.read().await;
    let lists: Vec<Value> = store
        .lists
        .iter()
        .map(|l| json!({"id": l.id, "name": l.name, "src": list_src(&state.config, &l.id)}))
        .collect();
    Ok(Json(json!({"lists": lists})))
}

async fn create_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ListEnvelope>,
) -> Result<Response, StatusCode> {
    authorize(&state, &headers).await?;
    if input.list.name.trim().is_empty() {
        return Ok(blank_name());
    }
    let list = StoredList {
        id: Uuid::new_v4().to_string(),
        name: input.list.name,
        items: Vec::new(),
    };
    let body = json!({"id": list.id, "name": list.name, "src": list_src(&state.config, &list.id)});
    state.store.write().await.lists.push(list);
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// The body carries no `id`; clients already know it.
async fn get_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    authorize(&state, &headers).await?;
    let store = state.store.read().await;
    let list = store.list(&id)?;
    let items: Vec<Value> = list
        .items
        .iter()
        .map(|item| item_json(&state.config, &id, item))
        .collect();
    Ok(Json(json!({"name": list.name, "src": list_src(&state.config, &id), "items": items})))
}

async fn update_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<ListEnvelope>,
) -> Result<Response, StatusCode> {
    authorize(&state, &headers).await?;
    if input.list.name.trim().is_empty() {
        return Ok(blank_name());
    }
    let mut store = state.store.write().await;
    let list = store.list_mut(&id)?;
    list.name = input.list.name;
    Ok((StatusCode::OK, format!("{} updated", list.name)).into_response())
}

async fn delete_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers).await?;
    let mut store = state.store.write().await;
    let before = store.lists.len();
    store.lists.retain(|l| l.id != id);
    if store.lists.len() == before {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn create_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<ItemEnvelope>,
) -> Result<Response, StatusCode> {
    authorize(&state, &headers).await?;
    if input.item.name.trim().is_empty() {
        return Ok(blank_name());
    }
    let mut store = state.store.write().await;
    let list = store.list_mut(&id)?;
    let item = StoredItem {
        id: Uuid::new_v4().to_string(),
        name: input.item.name,
        finished_at: None,
    };
    let body = item_json(&state.config, &id, &item);
    list.items.push(item);
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

async fn finish_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<String, StatusCode> {
    authorize(&state, &headers).await?;
    let mut store = state.store.write().await;
    let list = store.list_mut(&id)?;
    let item = list
        .items
        .iter_mut()
        .find(|i| i.id == item_id)
        .ok_or(StatusCode::NOT_FOUND)?;
    item.finished_at.get_or_insert_with(Utc::now);
    Ok(format!("{} finished", item.name))
}

async fn delete_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers).await?;
    let mut store = state.store.write().await;
    let list = store.list_mut(&id)?;
    let before = list.items.len();
    list.items.retain(|i| i.id != item_id);
    if list.items.len() == before {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}
