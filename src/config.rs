//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PROMPTSMITH__*` 覆盖（双下划线表示嵌套，如 `PROMPTSMITH__LLM__PROVIDER=openai`）。
//! 迭代上限等核心常量不在配置中，见 `refinement::controller::MAX_ITERATIONS`。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::WorkflowError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
}

/// [app] 段：应用名、默认输入文件、是否自动应用精炼结果
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 待分类回答的 JSON 文件；命令行参数优先
    pub responses_path: Option<PathBuf>,
    /// true 时精炼结果无需人工确认直接应用（非交互模式）
    #[serde(default)]
    pub auto_apply: bool,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmModelSection,
    #[serde(default)]
    pub openai: LlmModelSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmModelSection::default(),
            openai: LlmModelSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmModelSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次补全请求超时（秒）
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

const DEFAULT_CANDIDATES: [&str; 3] = ["config/default.toml", "../config/default.toml", "default.toml"];

const PROVIDERS: [&str; 3] = ["deepseek", "openai", "mock"];

/// 加载配置：默认 TOML（取第一个存在的候选）→ 显式文件 → 环境变量 PROMPTSMITH__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let default_file = DEFAULT_CANDIDATES
        .iter()
        .map(Path::new)
        .find(|p| p.exists());

    let sources = default_file
        .map(Path::to_path_buf)
        .into_iter()
        .chain(config_path.filter(|p| p.exists()));

    let builder = sources.fold(config::Config::builder(), |b, path| {
        tracing::debug!(path = %path.display(), "Adding config file");
        b.add_source(config::File::from(path).required(false))
    });

    builder
        .add_source(
            config::Environment::with_prefix("PROMPTSMITH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

impl AppConfig {
    /// 加载后的基本校验：provider 取值与超时
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let provider = self.llm.provider.to_lowercase();
        if !PROVIDERS.contains(&provider.as_str()) {
            return Err(WorkflowError::Config(format!(
                "unknown llm.provider '{}', expected one of {}",
                self.llm.provider,
                PROVIDERS.join(", ")
            )));
        }
        if self.llm.timeouts.request == 0 {
            return Err(WorkflowError::Config(
                "llm.timeouts.request must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
