//! ContentDM HTTP API 客户端
//!
//! 负责所有 dmwebservices 查询请求，以及展示用 URL 的拼接

use crate::cdm::api::server::ServerConnection;
use crate::cdm::api::transport::CdmTransport;
use crate::cdm::error::{CdmError, CdmResult};
use crate::cdm::types::{FieldInfo, ImageInfo, QueryResult, RecordMap, ValidateResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 分页大小（固定）
pub const PAGE_SIZE: u64 = 100;

/// dmQuery 默认返回字段
pub const DEFAULT_QUERY_FIELDS: &str = "!title!creato";

/// 默认图片尺寸
pub const DEFAULT_IMAGE_SIZE: &str = "default";

/// 去掉 alias 开头的一个 `/`
pub fn clean_alias(alias: &str) -> &str {
    alias.strip_prefix('/').unwrap_or(alias)
}

/// ContentDM API 客户端
#[derive(Clone)]
pub struct CdmApi {
    server: Option<ServerConnection>,
    transport: Arc<dyn CdmTransport>,
}

impl CdmApi {
    /// 创建未设置服务器的客户端
    pub fn new(transport: Arc<dyn CdmTransport>) -> Self {
        Self {
            server: None,
            transport,
        }
    }

    /// 创建并设置服务器地址
    pub fn with_server(url: &str, transport: Arc<dyn CdmTransport>) -> CdmResult<Self> {
        let mut api = Self::new(transport);
        api.set_server(url)?;
        Ok(api)
    }

    /// 设置服务器地址；解析失败时保持原状态不变
    pub fn set_server(&mut self, url: &str) -> CdmResult<()> {
        let conn = ServerConnection::parse(url).map_err(|e| {
            warn!("[CdmApi] 服务器地址无法解析: {}", url);
            e
        })?;
        info!("[CdmApi] 设置服务器: {}", conn.server_url());
        self.server = Some(conn);
        Ok(())
    }

    /// 规范化后的服务器地址（未设置时为 None）
    pub fn server_url(&self) -> Option<&str> {
        self.server.as_ref().map(|s| s.server_url())
    }

    fn connection(&self) -> CdmResult<&ServerConnection> {
        self.server.as_ref().ok_or(CdmError::NotInitialized)
    }

    /// 发起一次 API 调用，返回解码后的 JSON（不做结构校验）
    pub async fn call(&self, function: &str) -> CdmResult<Value> {
        let conn = self.connection()?;
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}?q={}/json", conn.api_base(), function);

        debug!("[CdmApi] 📡 请求: {}", function);
        debug!("[CdmApi]   请求URL: {}, 操作ID: {}", url, operation_id);

        let body = self.transport.get(&url).await.map_err(|e| {
            error!("[CdmApi] 请求失败 {}: {}, 操作ID: {}", function, e, operation_id);
            e
        })?;

        serde_json::from_str::<Value>(&body).map_err(|e| {
            error!(
                "[CdmApi] {} 反序列化失败: {:?}, 操作ID: {}\n原始响应: {}",
                function, e, operation_id, body
            );
            CdmError::Parse(e.to_string())
        })
    }

    /// 校验服务器连接：集合列表必须是数组
    pub async fn validate(&self) -> CdmResult<ValidateResult> {
        let collections = match self.call("dmGetCollectionList").await? {
            Value::Array(list) => list,
            other => {
                error!("[CdmApi] 集合列表不是数组: {}", other);
                return Err(CdmError::InvalidResponse);
            }
        };

        info!("[CdmApi] ✅ 连接校验成功，集合数: {}", collections.len());
        Ok(ValidateResult {
            valid: true,
            total: collections.len(),
            collections,
        })
    }

    /// 获取全部集合（原始 JSON，由调用方校验结构）
    pub async fn get_collections(&self) -> CdmResult<Value> {
        self.call("dmGetCollectionList").await
    }

    /// 获取集合字段定义
    pub async fn get_collection_fields(&self, alias: &str) -> CdmResult<Vec<FieldInfo>> {
        let alias = clean_alias(alias);
        let value = self
            .call(&format!("dmGetCollectionFieldInfo/{}", alias))
            .await?;
        if !value.is_array() {
            return Err(CdmError::InvalidResponse);
        }
        serde_json::from_value(value).map_err(|e| {
            warn!("[CdmApi] 字段定义结构异常 {}: {}", alias, e);
            CdmError::InvalidResponse
        })
    }

    /// 单页查询条目
    pub async fn get_items(
        &self,
        alias: &str,
        limit: u64,
        start: u64,
        fields: &str,
    ) -> CdmResult<QueryResult> {
        let alias = clean_alias(alias);
        let value = self
            .call(&format!(
                "dmQuery/{}/.^.^all^and/{}/{}/{}",
                alias, fields, limit, start
            ))
            .await?;
        if !value.is_object() {
            return Err(CdmError::InvalidResponse);
        }
        serde_json::from_value(value).map_err(|e| {
            warn!("[CdmApi] dmQuery 结构异常 {}: {}", alias, e);
            CdmError::InvalidResponse
        })
    }

    /// 分页获取条目，最多 `max_items` 条
    ///
    /// 任意一页失败或为空时停止，返回已拿到的部分结果，不向上报错。
    pub async fn get_all_items(&self, alias: &str, max_items: usize) -> Vec<RecordMap> {
        let alias = clean_alias(alias);
        let mut all_items: Vec<RecordMap> = Vec::new();
        let mut start: u64 = 0;

        while all_items.len() < max_items {
            let page = match self
                .get_items(alias, PAGE_SIZE, start, DEFAULT_QUERY_FIELDS)
                .await
            {
                Ok(page) if !page.records.is_empty() => page,
                Ok(_) => {
                    debug!("[CdmApi] {} 第 {} 条起无更多记录", alias, start);
                    break;
                }
                Err(e) => {
                    warn!("[CdmApi] {} 分页获取中断 (start={}): {}", alias, start, e);
                    break;
                }
            };

            let total = page.pager.total;
            all_items.extend(page.records);
            start += PAGE_SIZE;

            if start >= total {
                break;
            }
        }

        all_items.truncate(max_items);
        info!("[CdmApi] {} 共获取 {} 条条目", alias, all_items.len());
        all_items
    }

    /// 获取单个条目的完整元数据
    pub async fn get_item_info(&self, alias: &str, pointer: &str) -> CdmResult<RecordMap> {
        let alias = clean_alias(alias);
        match self
            .call(&format!("dmGetItemInfo/{}/{}", alias, pointer))
            .await?
        {
            Value::Object(map) => Ok(map),
            _ => Err(CdmError::InvalidResponse),
        }
    }

    /// 获取图片信息（宽高）
    pub async fn get_image_info(&self, alias: &str, pointer: &str) -> CdmResult<ImageInfo> {
        let alias = clean_alias(alias);
        let value = self
            .call(&format!("dmGetImageInfo/{}/{}", alias, pointer))
            .await?;
        if !value.is_object() {
            return Err(CdmError::InvalidResponse);
        }
        serde_json::from_value(value).map_err(|_| CdmError::InvalidResponse)
    }

    /// 图片地址
    pub fn get_image_url(&self, alias: &str, pointer: &str) -> CdmResult<String> {
        self.get_image_url_sized(alias, pointer, DEFAULT_IMAGE_SIZE)
    }

    pub fn get_image_url_sized(&self, alias: &str, pointer: &str, size: &str) -> CdmResult<String> {
        Ok(format!(
            "{}/{}/{}/{}.jpg",
            self.connection()?.image_base(),
            clean_alias(alias),
            pointer,
            size
        ))
    }

    /// 条目在 ContentDM 上的页面地址
    pub fn get_item_url(&self, alias: &str, pointer: &str) -> CdmResult<String> {
        Ok(format!(
            "{}/digital/collection/{}/id/{}",
            self.connection()?.server_url(),
            clean_alias(alias),
            pointer
        ))
    }

    /// 集合在 ContentDM 上的页面地址
    pub fn get_collection_url(&self, alias: &str) -> CdmResult<String> {
        Ok(format!(
            "{}/digital/collection/{}",
            self.connection()?.server_url(),
            clean_alias(alias)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdm::api::testing::ScriptedTransport;
    use serde_json::json;

    fn page(total: u64, start: u64, count: usize) -> Value {
        let records: Vec<Value> = (0..count)
            .map(|i| json!({"pointer": start + i as u64, "title": format!("Item {}", start + i as u64)}))
            .collect();
        json!({"pager": {"start": start + 1, "maxrecs": 100, "total": total}, "records": records})
    }

    fn query_path(start: u64) -> String {
        format!("dmQuery/photos/.^.^all^and/!title!creato/100/{}", start)
    }

    #[tokio::test]
    async fn call_requires_server() {
        let api = CdmApi::new(Arc::new(ScriptedTransport::new()));
        assert!(matches!(
            api.call("dmGetCollectionList").await,
            Err(CdmError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn call_builds_query_url_and_maps_errors() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond("dmGetCollectionList", "[]")
                .respond("dmGetItemInfo/photos/1", "<html>oops</html>"),
        );
        let api = CdmApi::with_server("https://cdm.example.edu/", transport.clone()).unwrap();

        assert_eq!(api.call("dmGetCollectionList").await.unwrap(), json!([]));
        assert_eq!(
            transport.requested_urls()[0],
            "https://cdm.example.edu/digital/bl/dmwebservices/index.php?q=dmGetCollectionList/json"
        );
        assert!(matches!(
            api.call("dmGetItemInfo/photos/1").await,
            Err(CdmError::Parse(_))
        ));
        assert!(matches!(
            api.call("dmGetImageInfo/photos/1").await,
            Err(CdmError::Network(_))
        ));
    }

    #[tokio::test]
    async fn set_server_failure_keeps_previous_server() {
        let mut api =
            CdmApi::with_server("https://a.example.org", Arc::new(ScriptedTransport::new())).unwrap();
        assert!(api.set_server("no host here").is_err());
        assert_eq!(api.server_url(), Some("https://a.example.org"));
    }

    #[tokio::test]
    async fn validate_rejects_non_array() {
        let transport =
            Arc::new(ScriptedTransport::new().respond("dmGetCollectionList", r#"{"code": -1}"#));
        let api = CdmApi::with_server("https://cdm.example.edu", transport).unwrap();
        assert!(matches!(api.validate().await, Err(CdmError::InvalidResponse)));
    }

    #[tokio::test]
    async fn validate_reports_total() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            "dmGetCollectionList",
            r#"[{"alias": "/photos", "name": "Photos"}, {"alias": "/maps", "name": "Maps"}]"#,
        ));
        let api = CdmApi::with_server("https://cdm.example.edu", transport).unwrap();
        let result = api.validate().await.unwrap();
        assert!(result.valid);
        assert_eq!(result.total, 2);
    }

    #[tokio::test]
    async fn get_all_items_stops_at_max_items() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond_json(&query_path(0), page(1000, 0, 100))
                .respond_json(&query_path(100), page(1000, 100, 100))
                .respond_json(&query_path(200), page(1000, 200, 100))
                .respond_json(&query_path(300), page(1000, 300, 100)),
        );
        let api = CdmApi::with_server("https://cdm.example.edu", transport.clone()).unwrap();

        let items = api.get_all_items("/photos", 250).await;

        assert_eq!(items.len(), 250);
        assert_eq!(
            transport.requested_functions(),
            vec![query_path(0), query_path(100), query_path(200)]
        );
    }

    #[tokio::test]
    async fn get_all_items_stops_at_reported_total() {
        let transport =
            Arc::new(ScriptedTransport::new().respond_json(&query_path(0), page(30, 0, 30)));
        let api = CdmApi::with_server("https://cdm.example.edu", transport.clone()).unwrap();

        let items = api.get_all_items("photos", 1000).await;

        assert_eq!(items.len(), 30);
        assert_eq!(transport.requested_functions(), vec![query_path(0)]);
    }

    #[tokio::test]
    async fn get_all_items_returns_partial_results_on_failure() {
        // 第二页未配置响应，传输层返回网络错误
        let transport =
            Arc::new(ScriptedTransport::new().respond_json(&query_path(0), page(500, 0, 100)));
        let api = CdmApi::with_server("https://cdm.example.edu", transport.clone()).unwrap();

        let items = api.get_all_items("photos", 500).await;

        assert_eq!(items.len(), 100);
        assert_eq!(transport.requested_functions().len(), 2);
    }

    #[test]
    fn display_urls_are_pure() {
        let api =
            CdmApi::with_server("https://cdm.example.edu", Arc::new(ScriptedTransport::new())).unwrap();
        assert_eq!(
            api.get_image_url("/photos", "12").unwrap(),
            "https://cdm.example.edu/digital/api/singleitem/image/photos/12/default.jpg"
        );
        assert_eq!(
            api.get_image_url_sized("photos", "12", "large").unwrap(),
            "https://cdm.example.edu/digital/api/singleitem/image/photos/12/large.jpg"
        );
        assert_eq!(
            api.get_item_url("/photos", "12").unwrap(),
            "https://cdm.example.edu/digital/collection/photos/id/12"
        );
        assert_eq!(
            api.get_collection_url("//photos").unwrap(),
            "https://cdm.example.edu/digital/collection//photos"
        );
    }
}
