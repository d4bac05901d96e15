use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use findpath_server::{
    AppState,
    config::Config,
    middleware::{auth_middleware, log_errors},
    routes, sweeper,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 设置 Redis 客户端（镜像存储）
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        redis: Arc::new(redis_client),
    };

    // 公开路由：无需认证
    let public_routes = Router::new()
        .route("/login", post(routes::user::login))
        .route("/api/users/signup", post(routes::user::signup))
        .route("/api/auth/refresh", post(routes::user::refresh_token));

    // 受保护路由：经过认证网关（令牌解析 + 单会话校验）
    let protected_routes = Router::new()
        .route("/api/users/logout", post(routes::user::logout))
        .route("/api/groups", get(routes::group::get_my_groups))
        .route("/api/groups", post(routes::group::create_group))
        .route("/api/groups/{group_id}", delete(routes::group::delete_group))
        .route(
            "/api/groups/{group_id}/sharing-rule",
            post(routes::group::update_sharing_rule),
        )
        .route(
            "/api/groups/{group_id}/incoming-sharing-rules",
            get(routes::group::get_incoming_rules),
        )
        .route(
            "/api/groups/{group_id}/outgoing-sharing-status",
            get(routes::group::get_outgoing_status),
        )
        .route(
            "/api/groups/{group_id}/members",
            get(routes::group::get_group_members),
        )
        .route(
            "/api/groups/{group_id}/location",
            put(routes::group::update_location),
        )
        .route(
            "/api/groups/{group_id}/locations",
            get(routes::group::get_group_locations),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let router = Router::new().merge(public_routes).merge(protected_routes);

    // 添加日志中间件
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let app = router.with_state(state.clone());

    // 启动过期群组清扫器
    sweeper::spawn(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
