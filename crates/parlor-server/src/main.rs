mod config;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use parlor_api::middleware::require_auth;
use parlor_api::stargate::StargateClient;
use parlor_api::state::{AppState, AppStateInner};
use parlor_api::{channel, contacts, friends, groups, profile};
use parlor_core::channels::{ChannelProvider, LocalChannelProvider};
use parlor_core::service::{ChatService, ServiceConfig};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(parlor_db::Database::open(&config.db_path)?);

    let provider: Arc<dyn ChannelProvider> = match &config.stargate_url {
        Some(url) => {
            info!("Using Stargate push service at {}", url);
            Arc::new(StargateClient::new(url.clone(), config.stargate_token.clone()))
        }
        None => {
            warn!("PARLOR_STARGATE_URL not set, using in-process channels");
            Arc::new(LocalChannelProvider::new())
        }
    };

    let service = ChatService::new(
        db,
        provider,
        ServiceConfig {
            group_image_path: config.group_image_path.clone(),
            provider_timeout: config.provider_timeout,
        },
    );
    let state: AppState = Arc::new(AppStateInner {
        service,
        jwt_secret: config.jwt_secret.clone(),
        listen_address: config.listen_address.clone(),
    });

    // Routes
    let app = Router::new()
        .route("/me", put(profile::update_me))
        .route("/contacts", get(contacts::get_contacts))
        .route("/conversations/{id}/open", post(contacts::open_conversation))
        .route(
            "/conversations/{id}/messages",
            get(contacts::get_messages).post(contacts::send_message),
        )
        .route("/channel/init", post(channel::init_channel))
        .route(
            "/friends/{peer_id}",
            post(friends::add_friend)
                .get(friends::are_friends)
                .delete(friends::remove_friend),
        )
        .route("/groups", post(groups::create_group))
        .route("/groups/{id}/join", post(groups::join_group))
        .route("/groups/{id}/membership", axum::routing::delete(groups::leave_group))
        .route("/groups/{id}/mute", put(groups::set_muted))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Parlor server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
