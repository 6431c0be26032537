//! ContentDM 服务器地址规范化

use crate::cdm::error::{CdmError, CdmResult};

const API_PATH: &str = "/digital/bl/dmwebservices/index.php";
const IMAGE_PATH: &str = "/digital/api/singleitem/image";

/// 规范化后的服务器连接信息（只保留 scheme + host，创建后不可变）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConnection {
    server_url: String,
    api_base: String,
    image_base: String,
}

impl ServerConnection {
    /// 解析并规范化服务器地址
    ///
    /// - 去掉首尾空白和末尾的 `/`
    /// - scheme 转小写，缺省为 https
    /// - host 保留原始大小写，路径、查询参数、用户信息、端口全部丢弃
    pub fn parse(url: &str) -> CdmResult<Self> {
        let trimmed = url.trim().trim_end_matches('/');

        let (scheme, rest) = match trimmed.split_once("://") {
            Some((scheme, rest)) => {
                if scheme.is_empty()
                    || !scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                {
                    return Err(CdmError::InvalidServerUrl(url.to_string()));
                }
                (scheme.to_ascii_lowercase(), rest)
            }
            // 协议相对地址 `//host/...`
            None => match trimmed.strip_prefix("//") {
                Some(rest) => ("https".to_string(), rest),
                None => return Err(CdmError::InvalidServerUrl(url.to_string())),
            },
        };

        let authority = rest
            .split(|c| matches!(c, '/' | '?' | '#'))
            .next()
            .unwrap_or_default();
        let host_port = authority
            .rsplit_once('@')
            .map(|(_, h)| h)
            .unwrap_or(authority);
        let host = strip_port(host_port);

        if host.is_empty() {
            return Err(CdmError::InvalidServerUrl(url.to_string()));
        }

        let server_url = format!("{}://{}", scheme, host);
        Ok(Self {
            api_base: format!("{}{}", server_url, API_PATH),
            image_base: format!("{}{}", server_url, IMAGE_PATH),
            server_url,
        })
    }

    /// scheme://host
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// 查询接口基础地址
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// 图片接口基础地址
    pub fn image_base(&self) -> &str {
        &self.image_base
    }
}

fn strip_port(host_port: &str) -> &str {
    // IPv6 字面量 `[::1]:8080`
    if host_port.starts_with('[') {
        return match host_port.find(']') {
            Some(end) => &host_port[..=end],
            None => "",
        };
    }
    match host_port.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => host_port,
    }
}
