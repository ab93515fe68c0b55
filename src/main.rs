mod config;
mod delivery;
mod domain;
mod repository;
mod telemetry;
mod usecase;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    middleware,
    routing::{delete, get, post},
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::delivery::http::v1::broadcasting::authorize_topic;
use crate::delivery::http::v1::events::publish_event;
use crate::delivery::http::v1::groups::enroll_student;
use crate::delivery::http::v1::middleware::{auth_middleware, internal_token_middleware};
use crate::delivery::http::v1::notifications::{
    delete_all_notifications, delete_notification, get_unread_count, list_notifications,
    mark_all_as_read, mark_as_read,
};
use crate::delivery::http::v1::ws::websocket_handler;
use crate::repository::postgres::{
    PostgresGroupRepository, PostgresNotificationRepository, PostgresUserDirectory, create_pool,
};
use crate::usecase::authorizer::BroadcastAuthorizer;
use crate::usecase::broadcast::{BroadcastHub, LocalBroadcaster, NatsBroadcaster, spawn_nats_relay};
use crate::usecase::contracts::{
    Broadcaster, GroupRepository, Mailer, NotificationRepository, UserDirectory,
};
use crate::usecase::dispatcher::NotificationDispatcher;
use crate::usecase::enrollment::EnrollmentUseCase;
use crate::usecase::events::EventsUseCase;
use crate::usecase::jwt::JwtService;
use crate::usecase::notifications::NotificationsUseCase;
use crate::usecase::smtp::{DisabledMailer, SmtpMailer};
use crate::usecase::worker::{DeliveryChannels, DeliveryQueue, DeliveryWorkerPool};

pub struct AppState {
    pub notifications_usecase: NotificationsUseCase<dyn NotificationRepository>,
    pub events_usecase: EventsUseCase<dyn UserDirectory, dyn NotificationRepository>,
    pub enrollment_usecase:
        EnrollmentUseCase<dyn GroupRepository, dyn UserDirectory, dyn NotificationRepository>,
    pub authorizer: BroadcastAuthorizer<dyn GroupRepository>,
    pub hub: Arc<BroadcastHub>,
    pub jwt_service: JwtService,
    pub internal_token: Option<String>,
    pub metrics_handle: PrometheusHandle,
}

pub struct Repositories {
    pub notifications: Arc<dyn NotificationRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub groups: Arc<dyn GroupRepository>,
}

impl AppState {
    pub fn new(
        repositories: Repositories,
        queue: DeliveryQueue,
        hub: Arc<BroadcastHub>,
        jwt_service: JwtService,
        login_url: String,
        internal_token: Option<String>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            repositories.notifications.clone(),
            queue,
            login_url,
        ));

        Self {
            notifications_usecase: NotificationsUseCase::new(repositories.notifications),
            events_usecase: EventsUseCase::new(repositories.users.clone(), dispatcher.clone()),
            enrollment_usecase: EnrollmentUseCase::new(
                repositories.groups.clone(),
                repositories.users,
                dispatcher,
            ),
            authorizer: BroadcastAuthorizer::new(repositories.groups),
            hub,
            jwt_service,
            internal_token,
            metrics_handle,
        }
    }
}

pub fn build_router(shared_state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/api/v1/notifications",
            get(list_notifications).delete(delete_all_notifications),
        )
        .route("/api/v1/notifications/unread-count", get(get_unread_count))
        .route("/api/v1/notifications/read-all", post(mark_all_as_read))
        .route("/api/v1/notifications/{id}/read", post(mark_as_read))
        .route("/api/v1/notifications/{id}", delete(delete_notification))
        .route("/api/v1/broadcasting/auth", post(authorize_topic))
        .route("/api/v1/groups/{id}/students", post(enroll_student))
        .layer(middleware::from_fn_with_state(
            shared_state.clone(),
            auth_middleware,
        ));

    let internal = Router::new()
        .route("/internal/events", post(publish_event))
        .layer(middleware::from_fn_with_state(
            shared_state.clone(),
            internal_token_middleware,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/v1/ws", get(websocket_handler))
        .merge(api)
        .merge(internal)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env().context("failed to load configuration")?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let tracer_provider = if config.telemetry_enabled {
        let telemetry_config = telemetry::TelemetryConfig::from(&config);
        Some(
            telemetry::init_telemetry_with_subscriber(&telemetry_config, env_filter)
                .context("failed to initialize telemetry")?,
        )
    } else {
        telemetry::init_subscriber_without_telemetry(env_filter);
        None
    };

    tracing::info!("starting the notifications service");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to create database pool")?;
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    let hub = Arc::new(BroadcastHub::default());

    let broadcaster: Arc<dyn Broadcaster> = match &config.nats_url {
        Some(nats_url) => match async_nats::connect(nats_url).await {
            Ok(client) => {
                tracing::info!(nats_url = %nats_url, "connected to NATS");
                match spawn_nats_relay(client.clone(), hub.clone()).await {
                    Ok(_) => Arc::new(NatsBroadcaster::new(client)),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to subscribe to NATS, broadcasting locally");
                        Arc::new(LocalBroadcaster::new(hub.clone()))
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, nats_url = %nats_url, "failed to connect to NATS, broadcasting locally");
                Arc::new(LocalBroadcaster::new(hub.clone()))
            }
        },
        None => Arc::new(LocalBroadcaster::new(hub.clone())),
    };

    let mailer: Arc<dyn Mailer> = match config.smtp() {
        Some(smtp) => Arc::new(SmtpMailer::new(&smtp).context("failed to configure SMTP")?),
        None => {
            tracing::warn!("SMTP_HOST is not set, mail delivery is disabled");
            Arc::new(DisabledMailer)
        }
    };

    let (queue, receiver) = DeliveryQueue::bounded(config.delivery_queue_capacity);
    let workers = DeliveryWorkerPool::spawn(
        receiver,
        config.delivery_workers,
        DeliveryChannels {
            broadcaster,
            mailer,
            timeout: config.delivery_timeout(),
        },
    );

    let internal_token = config.internal_token.clone().filter(|token| !token.is_empty());
    if internal_token.is_none() {
        tracing::warn!("INTERNAL_TOKEN is not set, /internal/events will refuse every request");
    }

    let repositories = Repositories {
        notifications: Arc::new(PostgresNotificationRepository::new(pool.clone())),
        users: Arc::new(PostgresUserDirectory::new(pool.clone())),
        groups: Arc::new(PostgresGroupRepository::new(pool)),
    };

    let shared_state = Arc::new(AppState::new(
        repositories,
        queue,
        hub,
        JwtService::new(config.jwt_secret.clone()),
        config.login_url(),
        internal_token,
        metrics_handle,
    ));

    let router = build_router(shared_state.clone());

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("notifications service running on {}", config.http_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Dropping the state closes the delivery queue so the workers can drain it.
    drop(shared_state);
    match tokio::time::timeout(config.delivery_timeout() * 2, workers.join()).await {
        Ok(stats) => tracing::info!(
            delivered = stats.delivered,
            failed = stats.failed,
            "delivery workers stopped"
        ),
        Err(_) => tracing::warn!("delivery workers did not drain before the shutdown deadline"),
    }

    if let Some(provider) = tracer_provider {
        telemetry::shutdown_telemetry(provider);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    metrics_process::Collector::default().collect();
    state.metrics_handle.render()
}

#[tracing::instrument]
async fn healthz() -> &'static str {
    "OK"
}
