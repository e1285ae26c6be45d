mod retention;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use quad_api::middleware::{require_member, require_moderator};
use quad_api::{AppState, AppStateInner, admin, auth, members, messages};
use quad_gateway::connection;
use quad_gateway::dispatcher::Dispatcher;
use quad_gateway::engine::DeliveryEngine;

#[derive(Clone)]
struct GatewayState {
    engine: DeliveryEngine,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quad=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("QUAD_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("QUAD_DB_PATH").unwrap_or_else(|_| "quad.db".into());
    let host = std::env::var("QUAD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("QUAD_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let email_domain =
        std::env::var("QUAD_EMAIL_DOMAIN").unwrap_or_else(|_| "bsu.edu.az".into());
    let root_mod_username =
        std::env::var("QUAD_ROOT_MOD_USERNAME").unwrap_or_else(|_| "root".into());
    let root_mod_password =
        std::env::var("QUAD_ROOT_MOD_PASSWORD").unwrap_or_else(|_| "change-me-please".into());

    // Init database
    let db = Arc::new(quad_db::Database::open(&PathBuf::from(&db_path))?);

    // Idempotent super-moderator bootstrap
    let password_hash = auth::hash_password(&root_mod_password)?;
    let created = db.ensure_super_moderator(
        &Uuid::new_v4().to_string(),
        &root_mod_username,
        &password_hash,
        &quad_db::timestamp(Utc::now()),
    )?;
    if created {
        info!("Super moderator '{}' created", root_mod_username);
    }

    // Shared state
    let dispatcher = Dispatcher::new();
    let engine = DeliveryEngine::new(db.clone(), dispatcher.clone(), jwt_secret.clone());
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        dispatcher,
        jwt_secret,
        email_domain,
    });

    // Hourly retention sweeper
    tokio::spawn(retention::run_retention_loop(db));

    // Routes
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/admin/login", post(auth::moderator_login))
        .route("/api/settings", get(admin::get_settings))
        .with_state(app_state.clone());

    let member_routes = Router::new()
        .route("/api/profile", get(members::get_profile).put(members::update_profile))
        .route("/api/members/{member_id}", get(members::get_member))
        .route("/api/members/{member_id}/block", post(members::block_member))
        .route("/api/members/{member_id}/unblock", post(members::unblock_member))
        .route("/api/members/{member_id}/report", post(members::report_member))
        .route("/api/messages/group/{faculty}", get(messages::group_history))
        .route("/api/messages/private/{other_id}", get(messages::private_history))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_member))
        .with_state(app_state.clone());

    let admin_routes = Router::new()
        .route("/api/admin/members", get(admin::list_members))
        .route(
            "/api/admin/members/{member_id}/toggle-active",
            put(admin::toggle_member_active),
        )
        .route("/api/admin/reported", get(admin::reported_members))
        .route("/api/admin/settings", put(admin::update_settings))
        .route(
            "/api/admin/moderators",
            get(admin::list_moderators).post(admin::create_moderator),
        )
        .route("/api/admin/moderators/{moderator_id}", delete(admin::delete_moderator))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_moderator))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(GatewayState { engine });

    let app = Router::new()
        .merge(public_routes)
        .merge(member_routes)
        .merge(admin_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Quad server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.engine))
}
