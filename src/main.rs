//! Scribel - 长篇小说写作助手的生成与持久化引擎
//!
//! 启动顺序: 配置 -> 日志 -> 存储 -> Provider -> 服务 -> Worker -> HTTP

use std::sync::Arc;

use scribel::application::{
    AutosaveConfig, AutosaveService, GenerationSettings, ProviderKind, RewriteSettings,
    SynthesizerSettings, TextGeneratorPort,
};
use scribel::config::{load_config, print_config};
use scribel::infrastructure::adapters::provider::{
    FakeGenerator, FakeGeneratorConfig, ProviderConfig, ProviderFactory,
};
use scribel::infrastructure::events::EventPublisher;
use scribel::infrastructure::http::{AppState, HttpServer, ServerConfig};
use scribel::infrastructure::memory::InMemorySessionManager;
use scribel::infrastructure::persistence::sled::{SledSnapshotConfig, SledSnapshotStore};
use scribel::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteStoryRepository,
};
use scribel::infrastructure::worker::{AutosaveWorker, AutosaveWorkerConfig};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},scribel={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Scribel - 长篇小说写作助手");
    print_config(&config);

    // 确保数据目录存在
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Some(parent) = config.snapshot.path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    let story_repo = Arc::new(SqliteStoryRepository::new(pool.clone()));

    // 本地快照存储（WAL）
    let snapshot_config = SledSnapshotConfig {
        db_path: config.snapshot.path.display().to_string(),
    };
    let snapshot_store = Arc::new(SledSnapshotStore::new(&snapshot_config)?);

    // 创建文本生成 Provider
    let (generator, model): (Arc<dyn TextGeneratorPort>, String) =
        if config.provider.kind == "fake" {
            (
                Arc::new(FakeGenerator::new(FakeGeneratorConfig::default())),
                config.provider.model.clone(),
            )
        } else {
            let kind = match config.provider.kind.as_str() {
                "gemini" => ProviderKind::Gemini,
                _ => ProviderKind::OpenRouter,
            };
            ProviderFactory::create(&ProviderConfig {
                kind,
                api_key: config.provider.api_key.clone(),
                model: config.provider.model.clone(),
                base_url: config.provider.base_url.clone(),
                timeout_secs: config.provider.timeout_secs,
            })
            .map_err(|e| anyhow::anyhow!("Failed to create provider: {}", e))?
        };

    // 自动保存服务
    let autosave = Arc::new(AutosaveService::new(
        snapshot_store.clone(),
        story_repo.clone(),
        AutosaveConfig {
            debounce_secs: config.autosave.debounce_secs,
            max_retries: config.autosave.max_retries,
            backoff_base_ms: config.autosave.backoff_base_ms,
            backoff_cap_ms: config.autosave.backoff_cap_ms,
        },
    ));

    // 会话管理与事件发布
    let session_manager = Arc::new(InMemorySessionManager::new());
    let event_publisher = EventPublisher::new().arc();

    // 后台自动保存 Worker
    let shutdown = CancellationToken::new();
    let worker = AutosaveWorker::new(
        AutosaveWorkerConfig {
            debounce_secs: config.autosave.debounce_secs,
        },
        autosave.clone(),
        event_publisher.clone(),
        shutdown.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    // 生成参数
    let generation_settings = GenerationSettings {
        model: model.clone(),
        temperature: config.generation.temperature as f32,
        word_threshold: config.generation.word_threshold,
        context_char_budget: config.generation.context_char_budget,
        reveal_words_per_sec: config.generation.reveal_words_per_sec,
    };
    let synthesizer_settings = SynthesizerSettings {
        model: model.clone(),
        temperature: config.generation.temperature as f32,
        max_attempts: config.outline.max_attempts,
        retry_delay: std::time::Duration::from_millis(config.outline.retry_delay_ms),
    };
    let rewrite_settings = RewriteSettings {
        model,
        temperature: config.generation.temperature as f32,
        word_threshold: config.generation.word_threshold,
    };

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        session_manager,
        story_repo,
        snapshot_store.clone(),
        generator,
        autosave,
        event_publisher,
        generation_settings,
        synthesizer_settings,
        rewrite_settings,
    ));

    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    let shutdown_for_server = shutdown.clone();
    server
        .run_with_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl-c");
            tracing::info!("Received shutdown signal");
            shutdown_for_server.cancel();
        })
        .await?;

    // 等 Worker 做完最后一轮同步，再把快照落盘
    if let Err(e) = worker_handle.await {
        tracing::warn!(error = %e, "Autosave worker join failed");
    }
    if let Err(e) = snapshot_store.flush() {
        tracing::warn!(error = %e, "Snapshot store flush failed on shutdown");
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}
