//! 运行配置

use crate::cdm::api::DEFAULT_TIMEOUT;
use std::time::Duration;

/// 默认数据库地址（文件不存在时自动创建）
pub const DEFAULT_DB_URL: &str = "sqlite://cdm_explorer.db?mode=rwc";

/// 本地运行配置
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// SQLite 连接地址
    pub db_url: String,
    /// 单次 HTTP 请求超时
    pub request_timeout: Duration,
}

impl ExplorerConfig {
    pub fn new(db_url: impl Into<String>) -> Self {
        Self {
            db_url: db_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}
