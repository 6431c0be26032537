//! 管理操作注册表
//!
//! 操作名 → 处理函数。分发时先做安全校验和权限校验，再调用处理函数，
//! 处理函数的错误统一转换成失败响应。

use crate::cdm::admin::context::AdminContext;
use crate::cdm::admin::models::{ActionRequest, ActionResponse};
use crate::cdm::api::CdmApi;
use crate::cdm::error::{CdmError, CdmResult};
use crate::cdm::importer::content::strip_tags;
use crate::cdm::importer::DEFAULT_MAX_ITEMS;
use crate::cdm::settings::{absint, sanitize_url, Settings};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const ACTION_VALIDATE_URL: &str = "cdm_validate_url";
pub const ACTION_IMPORT_COLLECTIONS: &str = "cdm_import_collections";
pub const ACTION_IMPORT_ITEMS: &str = "cdm_import_items";
pub const ACTION_GET_IMPORT_STATUS: &str = "cdm_get_import_status";
pub const ACTION_SAVE_SETTINGS: &str = "cdm_save_settings";

/// 处理函数签名
pub type ActionHandler =
    for<'a> fn(&'a AdminContext, &'a ActionRequest) -> BoxFuture<'a, CdmResult<Value>>;

#[derive(Clone, Copy)]
struct RegisteredAction {
    handler: ActionHandler,
    /// 是否需要 manage_options 权限
    requires_capability: bool,
}

/// 管理操作注册表
pub struct ActionRegistry {
    actions: HashMap<&'static str, RegisteredAction>,
}

impl Default for ActionRegistry {
    /// 注册全部内置操作
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ACTION_VALIDATE_URL, true, validate_url);
        registry.register(ACTION_IMPORT_COLLECTIONS, true, import_collections);
        registry.register(ACTION_IMPORT_ITEMS, true, import_items);
        registry.register(ACTION_GET_IMPORT_STATUS, false, get_import_status);
        registry.register(ACTION_SAVE_SETTINGS, true, save_settings);
        registry
    }
}

impl ActionRegistry {
    pub fn empty() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: &'static str,
        requires_capability: bool,
        handler: ActionHandler,
    ) {
        self.actions.insert(
            name,
            RegisteredAction {
                handler,
                requires_capability,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// 分发一次请求
    pub async fn dispatch(&self, ctx: &AdminContext, request: &ActionRequest) -> ActionResponse {
        match self.try_dispatch(ctx, request).await {
            Ok(data) => {
                info!("[CdmAdmin] ✅ {} 完成", request.action);
                ActionResponse::ok(data)
            }
            Err(e) => {
                warn!("[CdmAdmin] ❌ {} 失败: {}", request.action, e);
                ActionResponse::error(e.to_string())
            }
        }
    }

    async fn try_dispatch(&self, ctx: &AdminContext, request: &ActionRequest) -> CdmResult<Value> {
        let action = self
            .actions
            .get(request.action.as_str())
            .copied()
            .ok_or_else(|| CdmError::UnknownAction(request.action.clone()))?;

        if !request.nonce_verified {
            return Err(CdmError::InvalidNonce);
        }
        if action.requires_capability && !request.can_manage_options {
            return Err(CdmError::PermissionDenied);
        }

        debug!("[CdmAdmin] 📡 执行操作: {}", request.action);
        (action.handler)(ctx, request).await
    }
}

fn param_str<'a>(request: &'a ActionRequest, key: &str) -> &'a str {
    request
        .param(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// 文本参数清洗：去掉标签和首尾空白，内部连续空白压成一个空格
fn sanitize_text(raw: &str) -> String {
    strip_tags(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 校验服务器地址，成功后保存到设置
fn validate_url<'a>(
    ctx: &'a AdminContext,
    request: &'a ActionRequest,
) -> BoxFuture<'a, CdmResult<Value>> {
    async move {
        let url = sanitize_url(param_str(request, "url"));
        if url.is_empty() {
            return Err(CdmError::MissingUrl);
        }

        let api = CdmApi::with_server(&url, ctx.transport.clone())?;
        let result = api.validate().await?;

        let mut settings = ctx.load_settings().await?;
        settings.cdm_url = url;
        ctx.settings.save(&settings).await?;

        serde_json::to_value(result).map_err(|e| CdmError::Parse(e.to_string()))
    }
    .boxed()
}

fn import_collections<'a>(
    ctx: &'a AdminContext,
    _request: &'a ActionRequest,
) -> BoxFuture<'a, CdmResult<Value>> {
    async move {
        let importer = ctx.importer().await?;
        let summary = importer.import_collections().await?;
        serde_json::to_value(summary).map_err(|e| CdmError::Parse(e.to_string()))
    }
    .boxed()
}

fn import_items<'a>(
    ctx: &'a AdminContext,
    request: &'a ActionRequest,
) -> BoxFuture<'a, CdmResult<Value>> {
    async move {
        let alias = sanitize_text(param_str(request, "alias"));
        let max_items = request
            .param("max_items")
            .map(absint)
            .unwrap_or(DEFAULT_MAX_ITEMS as u64) as usize;
        if alias.is_empty() {
            return Err(CdmError::AliasRequired);
        }

        let importer = ctx.importer().await?;
        let summary = importer.import_items(&alias, max_items).await?;
        serde_json::to_value(summary).map_err(|e| CdmError::Parse(e.to_string()))
    }
    .boxed()
}

/// 保存设置：提交的字段覆盖当前设置，整体清洗后写回
fn save_settings<'a>(
    ctx: &'a AdminContext,
    request: &'a ActionRequest,
) -> BoxFuture<'a, CdmResult<Value>> {
    async move {
        let current = ctx.load_settings().await?;
        let mut input = match serde_json::to_value(current) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Default::default(),
            Err(e) => return Err(CdmError::Parse(e.to_string())),
        };
        input.extend(request.params.clone());

        let settings = Settings::sanitize(&Value::Object(input));
        ctx.settings.save(&settings).await?;
        info!("[CdmAdmin] 设置已保存，服务器: {}", settings.cdm_url);

        serde_json::to_value(settings).map_err(|e| CdmError::Parse(e.to_string()))
    }
    .boxed()
}

/// 本地集合数和条目数
fn get_import_status<'a>(
    ctx: &'a AdminContext,
    _request: &'a ActionRequest,
) -> BoxFuture<'a, CdmResult<Value>> {
    async move {
        let collections = ctx.store.count_collections().await?;
        let items = ctx.store.count_items().await?;
        Ok(json!({ "collections": collections, "items": items }))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdm::api::testing::ScriptedTransport;
    use crate::cdm::api::DEFAULT_QUERY_FIELDS;
    use crate::cdm::settings::{MemorySettingsStore, Settings, SettingsStore};
    use crate::cdm::store::{ContentStore, MemoryContentStore};
    use crate::init_test_logger;
    use std::sync::Arc;

    fn remote() -> ScriptedTransport {
        ScriptedTransport::new()
            .respond_json(
                "dmGetCollectionList",
                json!([{"alias": "/photos", "name": "Photos"}]),
            )
            .respond_json(
                &format!("dmQuery/photos/.^.^all^and/{}/1/0", DEFAULT_QUERY_FIELDS),
                json!({"pager": {"total": 1}, "records": []}),
            )
            .respond_json(
                &format!("dmQuery/photos/.^.^all^and/{}/100/0", DEFAULT_QUERY_FIELDS),
                json!({"pager": {"total": 1}, "records": [{"pointer": "1", "title": "One"}]}),
            )
    }

    fn context(settings: Settings) -> (AdminContext, Arc<MemorySettingsStore>) {
        let settings_store = Arc::new(MemorySettingsStore::with_settings(settings));
        let ctx = AdminContext::new(
            Arc::new(MemoryContentStore::new()),
            settings_store.clone(),
            Arc::new(remote()),
        );
        (ctx, settings_store)
    }

    fn configured() -> Settings {
        Settings {
            cdm_url: "https://cdm.example.edu".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn nonce_is_checked_for_every_action() {
        let (ctx, _) = context(configured());
        let registry = ActionRegistry::default();
        for action in [
            ACTION_VALIDATE_URL,
            ACTION_IMPORT_COLLECTIONS,
            ACTION_IMPORT_ITEMS,
            ACTION_GET_IMPORT_STATUS,
            ACTION_SAVE_SETTINGS,
        ] {
            let mut request = ActionRequest::trusted(action);
            request.nonce_verified = false;
            let response = registry.dispatch(&ctx, &request).await;
            assert!(!response.success);
            assert_eq!(response.message(), Some(CdmError::InvalidNonce.to_string().as_str()));
        }
    }

    #[tokio::test]
    async fn capability_is_required_except_for_status() {
        let (ctx, _) = context(configured());
        let registry = ActionRegistry::default();

        let mut request = ActionRequest::trusted(ACTION_IMPORT_COLLECTIONS);
        request.can_manage_options = false;
        let denied = registry.dispatch(&ctx, &request).await;
        assert_eq!(
            denied.message(),
            Some(CdmError::PermissionDenied.to_string().as_str())
        );

        let mut status = ActionRequest::trusted(ACTION_GET_IMPORT_STATUS);
        status.can_manage_options = false;
        let response = registry.dispatch(&ctx, &status).await;
        assert!(response.success);
        assert_eq!(response.data, json!({"collections": 0, "items": 0}));
    }

    #[tokio::test]
    async fn validate_url_requires_url_and_saves_on_success() {
        init_test_logger();
        let (ctx, settings) = context(Settings::default());
        let registry = ActionRegistry::default();

        let missing = registry
            .dispatch(&ctx, &ActionRequest::trusted(ACTION_VALIDATE_URL))
            .await;
        assert_eq!(
            missing.message(),
            Some(CdmError::MissingUrl.to_string().as_str())
        );

        let request = ActionRequest::trusted(ACTION_VALIDATE_URL)
            .with_param("url", "https://cdm.example.edu/digital/");
        let response = registry.dispatch(&ctx, &request).await;
        assert!(response.success);
        assert_eq!(response.data["valid"], json!(true));
        assert_eq!(response.data["total"], json!(1));
        assert_eq!(
            settings.load().await.unwrap().cdm_url,
            "https://cdm.example.edu/digital/"
        );
    }

    #[tokio::test]
    async fn imports_require_configured_url() {
        let (ctx, _) = context(Settings::default());
        let registry = ActionRegistry::default();

        let response = registry
            .dispatch(&ctx, &ActionRequest::trusted(ACTION_IMPORT_COLLECTIONS))
            .await;
        assert_eq!(
            response.message(),
            Some(CdmError::NotConfigured.to_string().as_str())
        );

        let response = registry
            .dispatch(
                &ctx,
                &ActionRequest::trusted(ACTION_IMPORT_ITEMS).with_param("alias", "photos"),
            )
            .await;
        assert_eq!(
            response.message(),
            Some(CdmError::NotConfigured.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn import_items_requires_alias_and_runs() {
        init_test_logger();
        let (ctx, _) = context(configured());
        let registry = ActionRegistry::default();

        let response = registry
            .dispatch(
                &ctx,
                &ActionRequest::trusted(ACTION_IMPORT_ITEMS).with_param("alias", "  <b></b> "),
            )
            .await;
        assert_eq!(
            response.message(),
            Some(CdmError::AliasRequired.to_string().as_str())
        );

        let collections = registry
            .dispatch(&ctx, &ActionRequest::trusted(ACTION_IMPORT_COLLECTIONS))
            .await;
        assert_eq!(collections.data["imported"], json!(1));

        let request = ActionRequest::trusted(ACTION_IMPORT_ITEMS)
            .with_param("alias", "photos")
            .with_param("max_items", "-5");
        let response = registry.dispatch(&ctx, &request).await;
        assert!(response.success);
        assert_eq!(response.data["imported"], json!(1));
        assert_eq!(response.data["total"], json!(1));
        assert_eq!(ctx.store.count_items().await.unwrap(), 1);

        let status = registry
            .dispatch(&ctx, &ActionRequest::trusted(ACTION_GET_IMPORT_STATUS))
            .await;
        assert_eq!(status.data, json!({"collections": 1, "items": 1}));
    }

    #[test]
    fn default_registry_knows_builtin_actions() {
        let registry = ActionRegistry::default();
        for action in [
            ACTION_VALIDATE_URL,
            ACTION_IMPORT_COLLECTIONS,
            ACTION_IMPORT_ITEMS,
            ACTION_GET_IMPORT_STATUS,
            ACTION_SAVE_SETTINGS,
        ] {
            assert!(registry.contains(action), "{} 未注册", action);
        }
        assert!(!registry.contains("cdm_drop_tables"));
        assert!(!ActionRegistry::empty().contains(ACTION_GET_IMPORT_STATUS));
    }

    #[tokio::test]
    async fn save_settings_sanitizes_and_persists() {
        init_test_logger();
        let (ctx, settings) = context(configured());
        let registry = ActionRegistry::default();

        let request = ActionRequest::trusted(ACTION_SAVE_SETTINGS)
            .with_param("items_per_page", "-15")
            .with_param("cache_duration", "90s")
            .with_param("enable_cache", false);
        let response = registry.dispatch(&ctx, &request).await;
        assert!(response.success);
        assert_eq!(response.data["items_per_page"], json!(15));

        let saved = settings.load().await.unwrap();
        assert_eq!(
            saved,
            Settings {
                cdm_url: "https://cdm.example.edu".to_string(),
                items_per_page: 15,
                enable_cache: false,
                cache_duration: 90,
            }
        );

        let request = ActionRequest::trusted(ACTION_SAVE_SETTINGS)
            .with_param("cdm_url", "ftp://cdm.example.edu");
        let response = registry.dispatch(&ctx, &request).await;
        assert!(response.success);
        let saved = settings.load().await.unwrap();
        assert!(!saved.is_configured());
        assert_eq!(saved.items_per_page, 15);
    }

    #[tokio::test]
    async fn save_settings_requires_capability() {
        let (ctx, settings) = context(configured());
        let mut request =
            ActionRequest::trusted(ACTION_SAVE_SETTINGS).with_param("items_per_page", 50);
        request.can_manage_options = false;

        let response = ActionRegistry::default().dispatch(&ctx, &request).await;
        assert_eq!(
            response.message(),
            Some(CdmError::PermissionDenied.to_string().as_str())
        );
        assert_eq!(settings.load().await.unwrap().items_per_page, 20);
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let (ctx, _) = context(configured());
        let response = ActionRegistry::default()
            .dispatch(&ctx, &ActionRequest::trusted("cdm_drop_tables"))
            .await;
        assert!(!response.success);
        assert!(response.message().unwrap().contains("cdm_drop_tables"));
    }
}
