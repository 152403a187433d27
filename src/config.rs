//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TOOLCHAT__*` 覆盖（双下划线表示嵌套，如 `TOOLCHAT__LLM__MODEL=gpt-4o`），
//! 最后由 [`AppConfig::apply_legacy_env`] 叠加部署环境里沿用的扁平变量（`MCP_SERVER_URL` 等）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub llm: LlmSection,
}

/// [server] 段：监听地址与 CORS 白名单
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// 允许跨域访问的前端 Origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

/// [backend] 段：工具执行后端（JSON-RPC 端点）
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// 单次 HTTP 请求超时（秒），由 HTTP 客户端施加
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:8084/mcp".to_string()
}

/// [llm] 段：OpenAI 兼容端点、模型与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// 未设置时回退到 OPENAI_API_KEY
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

impl AppConfig {
    /// 叠加扁平环境变量：MCP_SERVER_URL / OPENAI_API_KEY / OPENAI_MODEL / BACKEND_PORT / ALLOWED_ORIGINS
    pub fn apply_legacy_env(&mut self) {
        self.apply_legacy_vars(|key| std::env::var(key).ok());
    }

    fn apply_legacy_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("MCP_SERVER_URL") {
            self.backend.url = url;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(port) = lookup("BACKEND_PORT") {
            let host = self
                .server
                .bind_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind_addr = format!("{}:{}", host, port.trim());
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
    }
}

/// 从 config 目录加载配置，环境变量 TOOLCHAT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TOOLCHAT__*（双下划线表示嵌套键；`TOOLCHAT__SERVER__ALLOWED_ORIGINS` 按逗号拆成列表）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TOOLCHAT")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("server.allowed_origins"),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
