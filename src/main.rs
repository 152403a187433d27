//! toolchat 网关
//!
//! 入口：加载配置、初始化日志、装配执行后端与规划器，启动 WebSocket 服务直到收到关闭信号。

use std::sync::Arc;

use anyhow::Context;
use toolchat::config::load_config;
use toolchat::core::ShutdownManager;
use toolchat::gateway::{Hub, HubConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    toolchat::observability::init();

    let mut cfg = load_config(None).context("Failed to load config")?;
    cfg.apply_legacy_env();

    if cfg.llm.api_key.is_none() {
        anyhow::bail!("OPENAI_API_KEY not set (or llm.api_key in config)");
    }

    let deps = toolchat::build_session_deps(&cfg).context("Failed to build session dependencies")?;
    tracing::info!(backend = %cfg.backend.url, model = %cfg.llm.model, "Dependencies ready");

    let hub = Hub::new(
        HubConfig {
            bind_addr: cfg.server.bind_addr.clone(),
            allowed_origins: cfg.server.allowed_origins.clone(),
        },
        deps,
    );

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    hub.serve(shutdown.token()).await.context("Gateway failed")?;

    tracing::info!("Gateway stopped");
    Ok(())
}
