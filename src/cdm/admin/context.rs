//! 管理操作的运行上下文
//!
//! 存储、设置和传输层都由外部注入；每次操作按需构造客户端和同步器。

use crate::cdm::api::{CdmTransport, ReqwestTransport};
use crate::cdm::config::ExplorerConfig;
use crate::cdm::db::open_database;
use crate::cdm::error::{CdmError, CdmResult};
use crate::cdm::importer::{CdmImporter, EmptyImportListener, ImportListener};
use crate::cdm::settings::{Settings, SettingsStore, SqliteSettingsStore};
use crate::cdm::store::{ContentStore, SqliteContentStore};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AdminContext {
    pub store: Arc<dyn ContentStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub transport: Arc<dyn CdmTransport>,
}

impl AdminContext {
    pub fn new(
        store: Arc<dyn ContentStore>,
        settings: Arc<dyn SettingsStore>,
        transport: Arc<dyn CdmTransport>,
    ) -> Self {
        Self {
            store,
            settings,
            transport,
        }
    }

    /// 打开 SQLite 数据库并使用 reqwest 传输层
    pub async fn open(config: &ExplorerConfig) -> Result<Self> {
        info!("[CdmAdmin] 打开数据库: {}", config.db_url);
        let db = open_database(&config.db_url).await?;
        let transport = ReqwestTransport::with_timeout(config.request_timeout)?;
        Ok(Self::new(
            Arc::new(SqliteContentStore::new(db.clone())),
            Arc::new(SqliteSettingsStore::new(db)),
            Arc::new(transport),
        ))
    }

    pub async fn load_settings(&self) -> CdmResult<Settings> {
        Ok(self.settings.load().await?)
    }

    /// 用已保存的服务器地址创建同步器；未配置时返回 `NotConfigured`
    pub async fn importer(&self) -> CdmResult<CdmImporter> {
        self.importer_with_listener(Arc::new(EmptyImportListener))
            .await
    }

    pub async fn importer_with_listener(
        &self,
        listener: Arc<dyn ImportListener>,
    ) -> CdmResult<CdmImporter> {
        let settings = self.load_settings().await?;
        if !settings.is_configured() {
            return Err(CdmError::NotConfigured);
        }
        CdmImporter::with_listener(
            &settings.cdm_url,
            self.transport.clone(),
            self.store.clone(),
            listener,
        )
    }
}
