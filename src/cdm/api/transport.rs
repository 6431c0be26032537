//! HTTP 传输层
//!
//! `CdmApi` 只依赖这个 trait 发起 GET 请求，测试中可以替换成脚本化的实现。

use crate::cdm::error::{CdmError, CdmResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// 单次请求超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// GET 传输接口：返回响应 body 文本，传输失败返回 `CdmError::Network`
#[async_trait]
pub trait CdmTransport: Send + Sync {
    async fn get(&self, url: &str) -> CdmResult<String>;
}

/// 基于 reqwest 的传输实现（开启证书校验）
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// 使用默认 15 秒超时创建
    pub fn new() -> CdmResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> CdmResult<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .danger_accept_invalid_certs(false)
            .build()
            .map_err(|e| CdmError::Network(format!("创建 HTTP 客户端失败: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CdmTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> CdmResult<String> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CdmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // 非 2xx 不直接判错，交给 JSON 解析决定
            warn!("[CdmHTTP] 非成功状态码: {} ({})", status, url);
        } else {
            debug!("[CdmHTTP] 请求成功，HTTP状态: {}", status);
        }

        response
            .text()
            .await
            .map_err(|e| CdmError::Network(format!("读取响应 body 失败: {}", e)))
    }
}
