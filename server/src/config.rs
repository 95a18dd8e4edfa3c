use anyhow::{Context, Result, bail};

const BIND_VAR: &str = "CAMERA_PUSH_BIND";
const CONCURRENCY_VAR: &str = "CAMERA_PUSH_CONCURRENCY";

const DEFAULT_BIND: &str = "127.0.0.1:8888";
const MAX_CONCURRENCY: usize = 32;

/// 服务配置（来自环境变量）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// 单次请求内并发推送的目标数上限
    pub max_concurrency: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup(BIND_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let max_concurrency = match lookup(CONCURRENCY_VAR) {
            None => 1,
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("{CONCURRENCY_VAR} must be a positive integer, got '{raw}'"))?,
        };
        if !(1..=MAX_CONCURRENCY).contains(&max_concurrency) {
            bail!("{CONCURRENCY_VAR} must be between 1 and {MAX_CONCURRENCY}, got {max_concurrency}");
        }

        Ok(Self {
            bind_addr,
            max_concurrency,
        })
    }
}
