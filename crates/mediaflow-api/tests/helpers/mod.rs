//! Test helpers: build AppState and router for integration tests.
//!
//! Postgres runs in a throwaway container; object storage and the job queue
//! are the in-memory implementations so tests can inspect them directly.
//! Requires Docker.

pub mod fixtures;

use axum_test::TestServer;
use mediaflow_api::setup::{routes, services::build_http_client};
use mediaflow_api::{AppState, ImgproxySigner};
use mediaflow_core::config::{ApiConfig, QueueConfig, StorageConfig};
use mediaflow_db::AssetRepository;
use mediaflow_storage::MemoryStorage;
use mediaflow_worker::{JobQueue, MemoryJobQueue};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

pub const IMGPROXY_KEY: &str = "943b421c9eb07c830af81030552c86009268de4e532ba2ee2eab8247c6da0881";
pub const IMGPROXY_SALT: &str = "520f986b998545b4785e0defbc4f3c1203f22de2374a3d53cb7a7fe9fea309c5";
pub const PUBLIC_IMGPROXY_URL: &str = "http://img.test";
pub const PUBLIC_VOD_URL: &str = "http://vod.test/media-vod";
pub const PUBLIC_THUMBS_URL: &str = "http://thumbs.test/media-thumbs";

pub struct TestApp {
    pub server: TestServer,
    pub pool: PgPool,
    pub assets: AssetRepository,
    pub storage: Arc<MemoryStorage>,
    pub queue: Arc<MemoryJobQueue>,
    pub _container: ContainerAsync<Postgres>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Like [`setup_test_app`], letting the caller adjust the config first.
pub async fn setup_test_app_with(customize: impl FnOnce(&mut ApiConfig)) -> TestApp {
    build_test_app(customize, None).await
}

/// Routes jobs to `queue` instead of the in-memory queue on [`TestApp`].
pub async fn setup_test_app_with_queue(queue: Arc<dyn JobQueue>) -> TestApp {
    build_test_app(|_| {}, Some(queue)).await
}

async fn build_test_app(
    customize: impl FnOnce(&mut ApiConfig),
    queue_override: Option<Arc<dyn JobQueue>>,
) -> TestApp {
    let container = Postgres::default()
        .start()
        .await
        .expect("Failed to start postgres container");
    let host = container.get_host().await.expect("Failed to get container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get postgres port");
    let database_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let mut config = create_test_config(&database_url);
    customize(&mut config);

    let assets = AssetRepository::new(pool.clone());
    let storage = Arc::new(MemoryStorage::new());
    let queue = Arc::new(MemoryJobQueue::new());
    let app_queue: Arc<dyn JobQueue> = match queue_override {
        Some(queue) => queue,
        None => queue.clone(),
    };

    let state = Arc::new(AppState {
        assets: Arc::new(assets.clone()),
        storage: storage.clone(),
        queue: app_queue,
        signer: ImgproxySigner::new(&config.imgproxy_key, &config.imgproxy_salt)
            .expect("Invalid test imgproxy credentials"),
        http: build_http_client(&config).expect("Failed to build http client"),
        config: config.clone(),
    });

    let app = routes::setup_routes(&config, state);
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        pool,
        assets,
        storage,
        queue,
        _container: container,
    }
}

pub fn create_test_config(database_url: &str) -> ApiConfig {
    ApiConfig {
        server_port: 0,
        database_url: database_url.to_string(),
        db_max_connections: 5,
        db_timeout_seconds: 30,
        request_timeout_secs: 10,
        public_imgproxy_url: PUBLIC_IMGPROXY_URL.to_string(),
        public_vod_url: PUBLIC_VOD_URL.to_string(),
        public_thumbs_url: PUBLIC_THUMBS_URL.to_string(),
        // Nothing listens here unless a test overrides it.
        imgproxy_base_url: "http://127.0.0.1:9".to_string(),
        imgproxy_key: IMGPROXY_KEY.to_string(),
        imgproxy_salt: IMGPROXY_SALT.to_string(),
        storage: StorageConfig {
            endpoint: "http://localhost:9000".to_string(),
            public_endpoint: "http://localhost:9000".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            use_ssl: false,
            use_path_style: true,
        },
        queue: QueueConfig::default(),
    }
}
