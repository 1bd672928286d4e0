//! customers-server — HTTP API for petclinic owners and their pets.
//!
//! Provides CRUD endpoints for owners, plus pet and pet type endpoints, and
//! supports local dev with:
//! - Storage: In-memory or SQLite (file) when the `sqlite` feature is enabled.
//! - Thirdparty: owner lookups call `<THIRDPARTY_BASE_URL>external`; whether a
//!   failure there fails the lookup is set by EXTERNAL_CALL_MODE.
//! - CORS: Configurable via CORS_ALLOW_ORIGIN (origin string).
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p customers-server
//!
//! # in-memory storage, skip the thirdparty call
//! STORAGE_PROVIDER=memory EXTERNAL_CALL_MODE=off cargo run -p customers-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.
//!

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use config::ExternalCallMode;
use domain::adapters::memory_repo::{InMemoryOwnerRepo, InMemoryPetTypeRepo};
use domain::service::CustomerService;
use domain::{
    CoreError, Owner, OwnerFields, OwnerId, OwnerRepository, Pet, PetRequest, PetType,
    PetTypeId, PetTypeRepository,
};
use serde::{Deserialize, Serialize};
use thirdparty_client::{ClientConfig, ThirdPartyClient};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Local repo abstraction supporting memory or sqlite (feature-gated).
enum RepoKind {
    Memory {
        owners: InMemoryOwnerRepo,
        pet_types: InMemoryPetTypeRepo,
    },
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteRepo),
}

#[derive(Clone)]
struct AnyRepo {
    kind: Arc<RepoKind>,
}

impl AnyRepo {
    fn memory() -> Self {
        Self {
            kind: Arc::new(RepoKind::Memory {
                owners: InMemoryOwnerRepo::new(),
                pet_types: InMemoryPetTypeRepo::new(),
            }),
        }
    }

    #[cfg(feature = "sqlite")]
    fn sqlite(db_path: Option<&std::path::Path>) -> Result<Self, CoreError> {
        let repo = match db_path {
            Some(path) => sqlite_adapter::SqliteRepo::new(path)?,
            None => sqlite_adapter::SqliteRepo::from_env()?,
        };
        Ok(Self {
            kind: Arc::new(RepoKind::Sqlite(repo)),
        })
    }
}

impl OwnerRepository for AnyRepo {
    fn find_by_id(&self, id: OwnerId) -> Result<Option<Owner>, CoreError> {
        match &*self.kind {
            RepoKind::Memory { owners, .. } => owners.find_by_id(id),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.find_by_id(id),
        }
    }

    fn find_all(&self) -> Result<Vec<Owner>, CoreError> {
        match &*self.kind {
            RepoKind::Memory { owners, .. } => owners.find_all(),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.find_all(),
        }
    }

    fn save(&self, owner: Owner) -> Result<Owner, CoreError> {
        match &*self.kind {
            RepoKind::Memory { owners, .. } => owners.save(owner),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.save(owner),
        }
    }
}

impl PetTypeRepository for AnyRepo {
    fn find_pet_types(&self) -> Result<Vec<PetType>, CoreError> {
        match &*self.kind {
            RepoKind::Memory { pet_types, .. } => pet_types.find_pet_types(),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.find_pet_types(),
        }
    }

    fn find_pet_type(&self, id: PetTypeId) -> Result<Option<PetType>, CoreError> {
        match &*self.kind {
            RepoKind::Memory { pet_types, .. } => pet_types.find_pet_type(id),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.find_pet_type(id),
        }
    }
}

#[derive(Clone)]
struct AppState {
    service: Arc<CustomerService<AnyRepo, AnyRepo>>,
    thirdparty: ThirdPartyClient,
    external_call: ExternalCallMode,
}

impl AppState {
    fn new(repo: AnyRepo, thirdparty: ThirdPartyClient, external_call: ExternalCallMode) -> Self {
        Self {
            service: Arc::new(CustomerService::new(repo.clone(), repo)),
            thirdparty,
            external_call,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_risky();

    let thirdparty = match ThirdPartyClient::new(ClientConfig {
        base_url: cfg.thirdparty_base_url.clone(),
        timeout: cfg.thirdparty_timeout,
    }) {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to build thirdparty client");
            std::process::exit(1);
        }
    };

    let repo = match build_repo_from_env(&cfg) {
        Ok(r) => r,
        Err(e) => {
            error!(err = %e, "failed to open storage");
            std::process::exit(1);
        }
    };

    let state = AppState::new(repo, thirdparty, cfg.external_call_mode);

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = routes(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(%addr, "customers-server listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
}

fn routes(state: AppState) -> Router {
    Router::new()
        .route("/owners", get(list_owners).post(create_owner))
        .route("/owners/:owner_id", get(get_owner).put(update_owner))
        .route("/owners/:owner_id/pets", axum::routing::post(add_pet))
        .route(
            "/owners/:owner_id/pets/:pet_id",
            get(get_pet).put(update_pet),
        )
        .route("/petTypes", get(list_pet_types))
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct a repository instance based on config and feature flags.
fn build_repo_from_env(cfg: &config::Config) -> Result<AnyRepo, CoreError> {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => AnyRepo::sqlite(cfg.db_path.as_deref()),
        #[cfg(not(feature = "sqlite"))]
        config::StorageProvider::Sqlite => Err(CoreError::Repository(
            "STORAGE_PROVIDER=sqlite but built without the sqlite feature".into(),
        )),
        config::StorageProvider::Memory => Ok(AnyRepo::memory()),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerReq {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    telephone: String,
}

impl From<OwnerReq> for OwnerFields {
    fn from(r: OwnerReq) -> Self {
        OwnerFields {
            first_name: r.first_name,
            last_name: r.last_name,
            address: r.address,
            city: r.city,
            telephone: r.telephone,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PetReq {
    #[serde(default)]
    name: String,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default)]
    type_id: Option<PetTypeId>,
}

#[derive(Serialize)]
struct PetTypeOut {
    id: PetTypeId,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PetOut {
    id: Option<i64>,
    name: String,
    birth_date: String,
    #[serde(rename = "type")]
    pet_type: PetTypeOut,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnerOut {
    id: Option<OwnerId>,
    first_name: String,
    last_name: String,
    address: String,
    city: String,
    telephone: String,
    pets: Vec<PetOut>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PetDetailsOut {
    id: Option<i64>,
    name: String,
    owner: String,
    birth_date: String,
    #[serde(rename = "type")]
    pet_type: PetTypeOut,
}

fn pet_type_to_out(t: PetType) -> PetTypeOut {
    PetTypeOut {
        id: t.id,
        name: t.name,
    }
}

// Pets serialize without their owner back-reference.
fn pet_to_out(p: Pet) -> PetOut {
    PetOut {
        id: p.id,
        name: p.name,
        birth_date: http_common::format_date(p.birth_date),
        pet_type: pet_type_to_out(p.pet_type),
    }
}

fn owner_to_out(o: Owner) -> OwnerOut {
    let pets = o.pets().into_iter().map(pet_to_out).collect();
    OwnerOut {
        id: o.id,
        first_name: o.first_name,
        last_name: o.last_name,
        address: o.address,
        city: o.city,
        telephone: o.telephone,
        pets,
    }
}

fn bad_id(name: &str, raw: &str) -> Response {
    warn!(param = name, value = raw, "bad id in path");
    (
        StatusCode::BAD_REQUEST,
        Json(http_common::json_error_with_message(
            "bad_request",
            &format!("{} must be an integer", name),
        )),
    )
        .into_response()
}

fn core_error_response(e: CoreError) -> Response {
    match e {
        CoreError::Validation(violations) => (
            StatusCode::BAD_REQUEST,
            Json(http_common::json_validation_error(
                violations.iter().map(|v| (v.field, v.message.as_str())),
            )),
        )
            .into_response(),
        CoreError::NotFound(msg) => (
            StatusCode::NOT_FOUND,
            Json(http_common::json_error_with_message("not_found", &msg)),
        )
            .into_response(),
        CoreError::Repository(msg) => {
            error!(err = %msg, "repository error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(http_common::json_err("internal")),
            )
                .into_response()
        }
    }
}

fn to_pet_request(body: PetReq) -> Result<PetRequest, CoreError> {
    let birth_date = match body.birth_date.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => Some(http_common::parse_date(s).map_err(|_| {
            CoreError::Validation(vec![domain::FieldViolation::new(
                "birthDate",
                "Birth date must be formatted as yyyy-MM-dd",
            )])
        })?),
        None => None,
    };
    Ok(PetRequest {
        name: body.name,
        birth_date,
        type_id: body.type_id,
    })
}

async fn create_owner(State(state): State<AppState>, Json(body): Json<OwnerReq>) -> Response {
    match state.service.create_owner(body.into()) {
        Ok(owner) => {
            info!(owner_id = ?owner.id, "create owner ok");
            (StatusCode::CREATED, Json(owner_to_out(owner))).into_response()
        }
        Err(e) => {
            warn!(err = %e, "create owner rejected");
            core_error_response(e)
        }
    }
}

async fn get_owner(State(state): State<AppState>, Path(owner_id): Path<String>) -> Response {
    let Some(id) = http_common::parse_id(&owner_id) else {
        return bad_id("ownerId", &owner_id);
    };

    if state.external_call != ExternalCallMode::Off {
        match state.thirdparty.get_external_service().await {
            Ok(body) => info!(bytes = body.len(), "External call result"),
            Err(e) if state.external_call == ExternalCallMode::Propagate => {
                error!(owner_id = id, err = %e, "thirdparty call failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(http_common::json_error_with_message(
                        "upstream_error",
                        &e.to_string(),
                    )),
                )
                    .into_response();
            }
            Err(e) => warn!(owner_id = id, err = %e, "thirdparty call failed, serving owner anyway"),
        }
    }

    match state.service.find_owner(id) {
        Ok(Some(owner)) => Json(owner_to_out(owner)).into_response(),
        Ok(None) => {
            warn!(owner_id = id, "owner 404");
            (
                StatusCode::NOT_FOUND,
                Json(http_common::json_error_with_message(
                    "not_found",
                    &format!("Owner {} not found", id),
                )),
            )
                .into_response()
        }
        Err(e) => core_error_response(e),
    }
}

async fn list_owners(State(state): State<AppState>) -> Response {
    match state.service.find_all() {
        Ok(owners) => {
            let out: Vec<OwnerOut> = owners.into_iter().map(owner_to_out).collect();
            Json(out).into_response()
        }
        Err(e) => core_error_response(e),
    }
}

async fn update_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Json(body): Json<OwnerReq>,
) -> Response {
    let Some(id) = http_common::parse_id(&owner_id) else {
        return bad_id("ownerId", &owner_id);
    };
    match state.service.update_owner(id, body.into()) {
        Ok(owner) => {
            info!(owner_id = id, owner = %owner.full_name(), "saved owner");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            warn!(owner_id = id, err = %e, "update owner failed");
            core_error_response(e)
        }
    }
}

async fn list_pet_types(State(state): State<AppState>) -> Response {
    match state.service.pet_types() {
        Ok(types) => {
            let out: Vec<PetTypeOut> = types.into_iter().map(pet_type_to_out).collect();
            Json(out).into_response()
        }
        Err(e) => core_error_response(e),
    }
}

async fn add_pet(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Json(body): Json<PetReq>,
) -> Response {
    let Some(id) = http_common::parse_id(&owner_id) else {
        return bad_id("ownerId", &owner_id);
    };
    let result = to_pet_request(body).and_then(|req| state.service.add_pet(id, req));
    match result {
        Ok(pet) => {
            info!(owner_id = id, pet_id = ?pet.id, "add pet ok");
            (StatusCode::CREATED, Json(pet_to_out(pet))).into_response()
        }
        Err(e) => {
            warn!(owner_id = id, err = %e, "add pet failed");
            core_error_response(e)
        }
    }
}

// The owner segment is not checked against the pet's owner; pets are
// addressed by their own id.
async fn update_pet(
    State(state): State<AppState>,
    Path((_owner_id, pet_id)): Path<(String, String)>,
    Json(body): Json<PetReq>,
) -> Response {
    let Some(id) = http_common::parse_id(&pet_id) else {
        return bad_id("petId", &pet_id);
    };
    let result = to_pet_request(body).and_then(|req| state.service.update_pet(id, req));
    match result {
        Ok(pet) => {
            info!(pet_id = id, name = %pet.name, "saved pet");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            warn!(pet_id = id, err = %e, "update pet failed");
            core_error_response(e)
        }
    }
}

async fn get_pet(
    State(state): State<AppState>,
    Path((_owner_id, pet_id)): Path<(String, String)>,
) -> Response {
    let Some(id) = http_common::parse_id(&pet_id) else {
        return bad_id("petId", &pet_id);
    };
    match state.service.find_pet(id) {
        Ok(Some((pet, owner))) => Json(PetDetailsOut {
            id: pet.id,
            name: pet.name,
            owner: owner.full_name(),
            birth_date: http_common::format_date(pet.birth_date),
            pet_type: pet_type_to_out(pet.pet_type),
        })
        .into_response(),
        Ok(None) => core_error_response(CoreError::NotFound(format!("Pet {} not found", id))),
        Err(e) => core_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::util::ServiceExt;

    const JEAN: &str = r#"{"firstName":"Jean","lastName":"Coleman","address":"105 N. Lake St.","city":"Monona","telephone":"6085552654"}"#;
    const CARLOS: &str = r#"{"firstName":"Carlos","lastName":"Estaban","address":"2335 Independence La.","city":"Waunakee","telephone":"6085555487"}"#;

    fn client_for(base_url: String) -> ThirdPartyClient {
        ThirdPartyClient::new(ClientConfig {
            base_url,
            timeout: Some(std::time::Duration::from_secs(2)),
        })
        .unwrap()
    }

    // Base URL of a port nothing listens on.
    async fn dead_upstream() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/")
    }

    async fn live_upstream() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let upstream = Router::new().route("/external", get(|| async { "external says hi" }));
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn app_with(mode: ExternalCallMode, base_url: String) -> Router {
        routes(AppState::new(AnyRepo::memory(), client_for(base_url), mode))
    }

    fn app() -> Router {
        app_with(ExternalCallMode::Off, thirdparty_client::DEFAULT_BASE_URL.into())
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create(router: &Router, body: &str) -> serde_json::Value {
        let resp = router
            .clone()
            .oneshot(json_request("POST", "/owners", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp).await
    }

    #[tokio::test]
    async fn create_and_get_owner() {
        let router = app();
        let created = create(&router, JEAN).await;
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["pets"], serde_json::json!([]));

        let resp = router
            .clone()
            .oneshot(get_request(&format!("/owners/{id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, created);
    }

    #[tokio::test]
    async fn create_rejects_empty_first_name() {
        let router = app();
        let body = JEAN.replace("\"Jean\"", "\"\"");
        let resp = router
            .clone()
            .oneshot(json_request("POST", "/owners", &body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err = body_json(resp).await;
        assert_eq!(err["error"]["code"], "validation_failed");
        assert_eq!(err["error"]["violations"][0]["field"], "firstName");

        let resp = router.oneshot(get_request("/owners")).await.unwrap();
        assert_eq!(body_json(resp).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn create_rejects_bad_telephone_and_long_address() {
        let router = app();
        let body = JEAN.replace("6085552654", "555-1234");
        let resp = router
            .clone()
            .oneshot(json_request("POST", "/owners", &body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = JEAN.replace("105 N. Lake St.", &"x".repeat(201));
        let resp = router
            .oneshot(json_request("POST", "/owners", &body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err = body_json(resp).await;
        assert_eq!(err["error"]["violations"][0]["field"], "address");
    }

    #[tokio::test]
    async fn list_returns_all_owners() {
        let router = app();
        create(&router, JEAN).await;
        create(&router, CARLOS).await;
        let resp = router.oneshot(get_request("/owners")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let list = body_json(resp).await;
        let mut names: Vec<_> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["firstName"].as_str().unwrap().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Carlos", "Jean"]);
    }

    #[tokio::test]
    async fn update_keeps_pets_and_id() {
        let router = app();
        let id = create(&router, JEAN).await["id"].as_i64().unwrap();
        let resp = router
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/owners/{id}/pets"),
                r#"{"name":"Samantha","birthDate":"2012-09-04","typeId":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = router
            .clone()
            .oneshot(json_request("PUT", &format!("/owners/{id}"), CARLOS))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = router
            .oneshot(get_request(&format!("/owners/{id}")))
            .await
            .unwrap();
        let owner = body_json(resp).await;
        assert_eq!(owner["id"], id);
        assert_eq!(owner["firstName"], "Carlos");
        assert_eq!(owner["city"], "Waunakee");
        assert_eq!(owner["pets"][0]["name"], "Samantha");
        assert_eq!(owner["pets"][0]["type"]["name"], "cat");
        assert!(owner["pets"][0].get("owner").is_none());
    }

    #[tokio::test]
    async fn update_unknown_owner_is_404() {
        let router = app();
        let resp = router
            .clone()
            .oneshot(json_request("PUT", "/owners/99", JEAN))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = router.oneshot(get_request("/owners")).await.unwrap();
        assert_eq!(body_json(resp).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn get_unknown_owner_is_404_and_bad_id_is_400() {
        let router = app();
        let resp = router.clone().oneshot(get_request("/owners/5")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = router.oneshot(get_request("/owners/five")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn pets_serialized_in_name_order() {
        let router = app();
        let id = create(&router, JEAN).await["id"].as_i64().unwrap();
        for name in ["Zeus", "abby"] {
            let body = format!(r#"{{"name":"{name}","birthDate":"2015-02-01","typeId":2}}"#);
            let resp = router
                .clone()
                .oneshot(json_request("POST", &format!("/owners/{id}/pets"), &body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
        }
        let resp = router
            .oneshot(get_request(&format!("/owners/{id}")))
            .await
            .unwrap();
        let owner = body_json(resp).await;
        assert_eq!(owner["pets"][0]["name"], "abby");
        assert_eq!(owner["pets"][1]["name"], "Zeus");
        assert_eq!(owner["pets"][1]["birthDate"], "2015-02-01");
    }

    #[tokio::test]
    async fn pet_lifecycle() {
        let router = app();
        let id = create(&router, JEAN).await["id"].as_i64().unwrap();
        let resp = router
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/owners/{id}/pets"),
                r#"{"name":"Max","birthDate":"2012-09-04","typeId":1}"#,
            ))
            .await
            .unwrap();
        let pet_id = body_json(resp).await["id"].as_i64().unwrap();

        let resp = router
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/owners/{id}/pets/{pet_id}"),
                r#"{"name":"Maxine","birthDate":"2012-09-05","typeId":3}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = router
            .clone()
            .oneshot(get_request(&format!("/owners/{id}/pets/{pet_id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let details = body_json(resp).await;
        assert_eq!(details["name"], "Maxine");
        assert_eq!(details["owner"], "Jean Coleman");
        assert_eq!(details["birthDate"], "2012-09-05");
        assert_eq!(details["type"]["name"], "lizard");

        let resp = router
            .oneshot(get_request(&format!("/owners/{id}/pets/999")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn add_pet_validation_and_missing_owner() {
        let router = app();
        let resp = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/owners/12/pets",
                r#"{"name":"Max","birthDate":"2012-09-04","typeId":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let id = create(&router, JEAN).await["id"].as_i64().unwrap();
        let resp = router
            .oneshot(json_request(
                "POST",
                &format!("/owners/{id}/pets"),
                r#"{"name":"","birthDate":"04/09/2012","typeId":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err = body_json(resp).await;
        assert_eq!(err["error"]["violations"][0]["field"], "birthDate");
    }

    #[tokio::test]
    async fn add_pet_without_type_is_400() {
        let router = app();
        let id = create(&router, JEAN).await["id"].as_i64().unwrap();
        let resp = router
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/owners/{id}/pets"),
                r#"{"name":"Max","birthDate":"2012-09-04"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err = body_json(resp).await;
        assert_eq!(err["error"]["violations"][0]["field"], "typeId");

        let resp = router
            .oneshot(get_request(&format!("/owners/{id}")))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["pets"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn pet_types_listed_by_name() {
        let resp = app().oneshot(get_request("/petTypes")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let types = body_json(resp).await;
        assert_eq!(types.as_array().unwrap().len(), 6);
        assert_eq!(types[0]["name"], "bird");
    }

    #[tokio::test]
    async fn get_owner_calls_upstream() {
        let router = app_with(ExternalCallMode::Propagate, live_upstream().await);
        let id = create(&router, JEAN).await["id"].as_i64().unwrap();
        let resp = router
            .oneshot(get_request(&format!("/owners/{id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upstream_failure_isolated_by_default_mode() {
        let router = app_with(ExternalCallMode::Isolate, dead_upstream().await);
        let id = create(&router, JEAN).await["id"].as_i64().unwrap();
        let resp = router
            .oneshot(get_request(&format!("/owners/{id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upstream_failure_propagates_when_configured() {
        let router = app_with(ExternalCallMode::Propagate, dead_upstream().await);
        let id = create(&router, JEAN).await["id"].as_i64().unwrap();
        let resp = router
            .oneshot(get_request(&format!("/owners/{id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["error"]["code"], "upstream_error");
    }

    #[cfg(feature = "sqlite")]
    fn config_with_db(db_path: std::path::PathBuf) -> config::Config {
        config::Config {
            port: 0,
            cors_allow_origin: HeaderValue::from_static("*"),
            storage_provider: config::StorageProvider::Sqlite,
            db_path: Some(db_path),
            log_format: config::LogFormat::Pretty,
            thirdparty_base_url: thirdparty_client::DEFAULT_BASE_URL.into(),
            thirdparty_timeout: None,
            external_call_mode: ExternalCallMode::Off,
        }
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn sqlite_storage_serves_owners_and_pets() {
        let dir = tempfile::tempdir().unwrap();
        let repo = build_repo_from_env(&config_with_db(dir.path().join("data").join("c.db")))
            .unwrap();
        let router = routes(AppState::new(
            repo,
            client_for(thirdparty_client::DEFAULT_BASE_URL.into()),
            ExternalCallMode::Off,
        ));

        let id = create(&router, JEAN).await["id"].as_i64().unwrap();
        for name in ["Zeus", "abby"] {
            let body = format!(r#"{{"name":"{name}","birthDate":"2015-02-01","typeId":2}}"#);
            let resp = router
                .clone()
                .oneshot(json_request("POST", &format!("/owners/{id}/pets"), &body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let resp = router
            .clone()
            .oneshot(json_request("PUT", &format!("/owners/{id}"), CARLOS))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = router
            .clone()
            .oneshot(get_request(&format!("/owners/{id}")))
            .await
            .unwrap();
        let owner = body_json(resp).await;
        assert_eq!(owner["firstName"], "Carlos");
        assert_eq!(owner["pets"][0]["name"], "abby");
        assert_eq!(owner["pets"][1]["name"], "Zeus");
        assert_eq!(owner["pets"][1]["type"]["name"], "dog");

        let resp = router.oneshot(get_request("/petTypes")).await.unwrap();
        assert_eq!(body_json(resp).await.as_array().unwrap().len(), 6);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn unusable_sqlite_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let res = build_repo_from_env(&config_with_db(blocker.join("c.db")));
        assert!(matches!(res, Err(CoreError::Repository(_))));
    }
}
