use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use market_admin::config::{Config, StorageSettings};
use market_admin::db::{create_pool, ensure_schema, PgDocumentStore};
use market_admin::grpc::{
    HealthServiceImpl, ModerationServiceImpl, ReportsServiceImpl, TaxonomyServiceImpl,
    UsersServiceImpl,
};
use market_admin::middleware::AuthLayer;
use market_admin::proto::health::health_server::HealthServer;
use market_admin::proto::moderation::moderation_service_server::ModerationServiceServer;
use market_admin::proto::reports::reports_service_server::ReportsServiceServer;
use market_admin::proto::taxonomy::taxonomy_service_server::TaxonomyServiceServer;
use market_admin::proto::users::users_service_server::UsersServiceServer;
use market_admin::services::{
    CategoryService, ImageGalleryResolver, ItemService, ReportService, UserService,
};
use market_admin::session::{OperationPolicy, SessionRegistry};
use market_admin::storage::{GcsBackend, MemoryBlobStore, R2Backend, StorageBackend};
use market_admin::store::DocumentStore;

use tonic::transport::Server;
use tonic_reflection::server::Builder as ReflectionBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Include file descriptor for gRPC reflection
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("market_descriptor");

async fn storage_backend(config: &Config) -> Arc<dyn StorageBackend> {
    let backend: Result<Arc<dyn StorageBackend>, _> = match &config.storage {
        StorageSettings::Gcs { bucket } => {
            tracing::info!("GCS storage enabled: bucket={}", bucket);
            GcsBackend::new(bucket.clone(), config.image_url_ttl)
                .await
                .map(|b| Arc::new(b) as Arc<dyn StorageBackend>)
        }
        StorageSettings::R2 {
            bucket,
            account_id,
            access_key,
            secret_key,
        } => {
            tracing::info!("R2 storage enabled: bucket={}", bucket);
            R2Backend::new(
                bucket.clone(),
                account_id.clone(),
                access_key.clone(),
                secret_key.clone(),
                config.image_url_ttl,
            )
            .map(|b| Arc::new(b) as Arc<dyn StorageBackend>)
        }
        StorageSettings::None => {
            tracing::info!("No storage backend configured, previews will have no photos");
            Ok(Arc::new(MemoryBlobStore::new("local")) as Arc<dyn StorageBackend>)
        }
    };

    backend.unwrap_or_else(|e| {
        tracing::error!("Failed to create storage backend: {}", e);
        Arc::new(MemoryBlobStore::new("local"))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_admin=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Starting market-admin gRPC server...");
    tracing::info!("Connecting to database...");

    let pool = create_pool(&config.database_url).await?;
    ensure_schema(&pool).await?;
    tracing::info!("Database connection established");

    let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool));
    let storage = storage_backend(&config).await;
    let policy = OperationPolicy::new(config.operation_timeout);
    tracing::info!(
        "Operation timeout {:?}, category delete policy {:?}",
        policy.timeout(),
        config.category_delete_policy
    );

    // Create services
    let sessions = Arc::new(SessionRegistry::with_idle_ttl(config.session_idle_ttl));
    let categories = Arc::new(CategoryService::new(
        store.clone(),
        policy,
        config.category_delete_policy,
    ));
    let items = Arc::new(ItemService::new(
        store.clone(),
        categories.clone(),
        ImageGalleryResolver::new(storage, policy),
        policy,
    ));
    let reports = Arc::new(ReportService::new(store.clone(), policy));
    let users = Arc::new(UserService::new(store.clone(), policy));

    let taxonomy_service = TaxonomyServiceImpl::new(categories, sessions.clone());
    let moderation_service = ModerationServiceImpl::new(items, sessions.clone());
    let reports_service = ReportsServiceImpl::new(reports, sessions.clone());
    let users_service = UsersServiceImpl::new(users, sessions);
    let health_service = HealthServiceImpl::new(store);

    // CORS layer for gRPC-Web
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any)
        .expose_headers(Any);

    // Build reflection service
    let reflection_service = ReflectionBuilder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    if config.jwt_secret.is_none() {
        tracing::warn!("JWT_SECRET not set, every console call will be rejected");
    }

    let addr: SocketAddr = config.server_addr().parse()?;
    tracing::info!("Listening on {}", addr);

    // Build and run server with gRPC-Web support
    Server::builder()
        .accept_http1(true) // Required for gRPC-Web
        .layer(cors)
        .layer(tonic_web::GrpcWebLayer::new())
        .layer(AuthLayer::new(config.jwt_secret.clone()))
        .add_service(reflection_service)
        .add_service(TaxonomyServiceServer::new(taxonomy_service))
        .add_service(ModerationServiceServer::new(moderation_service))
        .add_service(ReportsServiceServer::new(reports_service))
        .add_service(UsersServiceServer::new(users_service))
        .add_service(HealthServer::new(health_service))
        .serve(addr)
        .await?;

    Ok(())
}
