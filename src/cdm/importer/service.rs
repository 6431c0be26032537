//! 同步服务层
//!
//! 集合导入与条目导入。单条记录失败只记入 errors，不中断批次；
//! 前置条件（集合不存在、没有条目）不满足时整个操作直接失败。

use crate::cdm::api::{clean_alias, CdmApi, CdmTransport, DEFAULT_QUERY_FIELDS};
use crate::cdm::error::{CdmError, CdmResult};
use crate::cdm::importer::content::{
    build_collection_description, build_item_content, derive_title,
};
use crate::cdm::importer::listener::{EmptyImportListener, ImportListener};
use crate::cdm::importer::models::{BatchImportReport, CollectionImportOutcome, ImportSummary};
use crate::cdm::store::{CollectionDraft, CollectionRecord, ContentStore, ItemDraft, ItemRecord};
use crate::cdm::types::{value_as_string, CollectionEntry, RecordMap};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 单个集合默认最多导入的条目数
pub const DEFAULT_MAX_ITEMS: usize = 100;

const COLLECTIONS_SCOPE: &str = "collections";

/// 已写入的单条记录；分类项写入失败时带上错误信息，记录本身仍计入结果
struct WrittenRecord {
    key: String,
    updated: bool,
    term_error: Option<String>,
}

impl ImportSummary {
    fn count_written(&mut self, record: &WrittenRecord) {
        if record.updated {
            self.updated += 1;
        } else {
            self.imported += 1;
        }
        if let Some(message) = &record.term_error {
            self.errors.push(message.clone());
        }
    }
}

/// ContentDM 同步器
pub struct CdmImporter {
    api: CdmApi,
    store: Arc<dyn ContentStore>,
    listener: Arc<dyn ImportListener>,
}

impl CdmImporter {
    /// 创建同步器（使用默认空监听器）
    pub fn new(
        server_url: &str,
        transport: Arc<dyn CdmTransport>,
        store: Arc<dyn ContentStore>,
    ) -> CdmResult<Self> {
        Self::with_listener(server_url, transport, store, Arc::new(EmptyImportListener))
    }

    /// 创建同步器（带自定义监听器）
    pub fn with_listener(
        server_url: &str,
        transport: Arc<dyn CdmTransport>,
        store: Arc<dyn ContentStore>,
        listener: Arc<dyn ImportListener>,
    ) -> CdmResult<Self> {
        let api = CdmApi::with_server(server_url, transport)?;
        info!(
            "[CdmImport] 创建同步器，服务器: {}",
            api.server_url().unwrap_or_default()
        );
        Ok(Self {
            api,
            store,
            listener,
        })
    }

    pub fn api(&self) -> &CdmApi {
        &self.api
    }

    fn server_url(&self) -> String {
        self.api.server_url().unwrap_or_default().to_string()
    }

    /// 导入全部集合
    pub async fn import_collections(&self) -> CdmResult<ImportSummary> {
        info!("[CdmImport] 🔄 开始导入集合");
        let entries = match self.api.get_collections().await? {
            Value::Array(entries) => entries,
            other => {
                error!("[CdmImport] 集合列表不是数组: {}", other);
                return Err(CdmError::InvalidData);
            }
        };

        self.listener
            .on_import_started(COLLECTIONS_SCOPE.to_string(), entries.len())
            .await;

        let mut summary = ImportSummary {
            total: entries.len(),
            ..Default::default()
        };
        for entry in &entries {
            match self.import_single_collection(entry).await {
                Ok(record) => {
                    summary.count_written(&record);
                    self.listener
                        .on_record_imported(
                            COLLECTIONS_SCOPE.to_string(),
                            record.key,
                            record.updated,
                        )
                        .await;
                }
                Err(e) => {
                    warn!("[CdmImport] 集合导入失败: {}", e);
                    summary.errors.push(e.to_string());
                    self.listener
                        .on_record_failed(COLLECTIONS_SCOPE.to_string(), e.to_string())
                        .await;
                }
            }
        }

        info!(
            "[CdmImport] ✅ 集合导入完成: 新建 {}, 更新 {}, 共 {}, 失败 {}",
            summary.imported,
            summary.updated,
            summary.total,
            summary.errors.len()
        );
        self.listener
            .on_import_finished(COLLECTIONS_SCOPE.to_string(), summary.clone())
            .await;
        Ok(summary)
    }

    /// 导入单个集合
    async fn import_single_collection(&self, entry: &Value) -> CdmResult<WrittenRecord> {
        let entry: CollectionEntry = serde_json::from_value(entry.clone()).unwrap_or_default();
        let alias = clean_alias(&entry.alias).to_string();
        if alias.is_empty() {
            return Err(CdmError::NoAlias);
        }
        let name = if entry.name.is_empty() {
            alias.clone()
        } else {
            entry.name
        };

        let existing = self.lookup_collection(&alias).await?;

        let fields = match self.api.get_collection_fields(&alias).await {
            Ok(fields) => Some(fields),
            Err(e) => {
                warn!("[CdmImport] {} 字段定义获取失败: {}", alias, e);
                None
            }
        };

        // 只取 1 条，用分页信息里的 total 作为条目数
        let item_count = match self.api.get_items(&alias, 1, 0, DEFAULT_QUERY_FIELDS).await {
            Ok(result) => result.pager.total,
            Err(e) => {
                warn!("[CdmImport] {} 条目数获取失败: {}", alias, e);
                0
            }
        };

        let draft = CollectionDraft {
            alias: alias.clone(),
            title: name.clone(),
            content: build_collection_description(item_count, fields.as_deref()),
            server_url: self.server_url(),
            collection_url: self.api.get_collection_url(&alias)?,
            item_count,
            fields,
            imported_at: Utc::now(),
        };

        let updated = match existing {
            Some(record) => {
                self.store.update_collection(record.id, &draft).await?;
                true
            }
            None => {
                self.store.create_collection(&draft).await?;
                false
            }
        };

        debug!(
            "[CdmImport] 集合 {} {}",
            alias,
            if updated { "已更新" } else { "已新建" }
        );

        // 已存在的分类项保持原名
        let term_error = match self.store.ensure_term(&alias, &name).await {
            Ok(_) => None,
            Err(e) => {
                warn!("[CdmImport] 集合 {} 分类项写入失败: {}", alias, e);
                Some(format!("{}: {}", alias, CdmError::from(e)))
            }
        };
        Ok(WrittenRecord {
            key: alias,
            updated,
            term_error,
        })
    }

    /// 导入某个集合的条目（集合需已导入）
    pub async fn import_items(&self, alias: &str, max_items: usize) -> CdmResult<ImportSummary> {
        let alias = clean_alias(alias).to_string();
        info!(
            "[CdmImport] 🔄 开始导入条目: {}, 最多 {} 条",
            alias, max_items
        );

        let collection = self
            .lookup_collection(&alias)
            .await?
            .ok_or(CdmError::NoCollection)?;

        let rows = self.api.get_all_items(&alias, max_items).await;
        if rows.is_empty() {
            warn!("[CdmImport] {} 没有可导入的条目", alias);
            return Err(CdmError::NoItems);
        }

        self.listener
            .on_import_started(alias.clone(), rows.len())
            .await;

        let mut summary = ImportSummary {
            total: rows.len(),
            ..Default::default()
        };
        for row in &rows {
            match self.import_single_item(&alias, row, &collection).await {
                Ok(record) => {
                    summary.count_written(&record);
                    self.listener
                        .on_record_imported(alias.clone(), record.key, record.updated)
                        .await;
                }
                Err(e) => {
                    warn!("[CdmImport] {} 条目导入失败: {}", alias, e);
                    summary.errors.push(e.to_string());
                    self.listener
                        .on_record_failed(alias.clone(), e.to_string())
                        .await;
                }
            }
        }

        // 记录本次结果，覆盖上一次；失败不影响已写入的条目
        if let Err(e) = self
            .store
            .record_item_import(collection.id, summary.written() as u64, Utc::now())
            .await
        {
            warn!("[CdmImport] {} 导入计数写入失败: {}", alias, e);
            summary.errors.push(CdmError::from(e).to_string());
        }

        info!(
            "[CdmImport] ✅ {} 条目导入完成: 新建 {}, 更新 {}, 共 {}, 失败 {}",
            alias,
            summary.imported,
            summary.updated,
            summary.total,
            summary.errors.len()
        );
        self.listener
            .on_import_finished(alias.clone(), summary.clone())
            .await;
        Ok(summary)
    }

    /// 导入单个条目
    async fn import_single_item(
        &self,
        alias: &str,
        row: &RecordMap,
        collection: &CollectionRecord,
    ) -> CdmResult<WrittenRecord> {
        let pointer = row
            .get("pointer")
            .and_then(value_as_string)
            .filter(|p| !p.is_empty())
            .ok_or(CdmError::NoPointer)?;

        let detail = match self.api.get_item_info(alias, &pointer).await {
            Ok(detail) => detail,
            Err(e) => {
                debug!(
                    "[CdmImport] {}/{} 详情获取失败，使用列表数据: {}",
                    alias, pointer, e
                );
                row.clone()
            }
        };

        let title = derive_title(&detail, row, &pointer);
        let existing = self.lookup_item(alias, &pointer).await?;

        let image_size = match self.api.get_image_info(alias, &pointer).await {
            Ok(info) => Some((info.width, info.height)),
            Err(e) => {
                debug!("[CdmImport] {}/{} 图片信息获取失败: {}", alias, pointer, e);
                None
            }
        };

        let draft = ItemDraft {
            alias: alias.to_string(),
            pointer: pointer.clone(),
            collection_id: collection.id,
            title,
            content: build_item_content(&detail),
            server_url: self.server_url(),
            item_url: self.api.get_item_url(alias, &pointer)?,
            image_url: self.api.get_image_url(alias, &pointer)?,
            metadata: detail,
            image_size,
            imported_at: Utc::now(),
        };

        let (item_id, updated) = match existing {
            Some(record) => {
                self.store.update_item(record.id, &draft).await?;
                (record.id, true)
            }
            None => (self.store.create_item(&draft).await?, false),
        };

        let term_error = match self.store.set_item_term(item_id, alias).await {
            Ok(()) => None,
            Err(e) => {
                warn!("[CdmImport] 条目 {}/{} 分类项关联失败: {}", alias, pointer, e);
                Some(format!("{}/{}: {}", alias, pointer, CdmError::from(e)))
            }
        };
        Ok(WrittenRecord {
            key: pointer,
            updated,
            term_error,
        })
    }

    /// 依次导入多个集合的条目；单个集合失败不影响其余集合
    pub async fn import_selected_collections(
        &self,
        aliases: &[String],
        max_items: usize,
    ) -> BatchImportReport {
        let mut report = BatchImportReport {
            total: aliases.len(),
            ..Default::default()
        };

        for alias in aliases {
            info!(
                "[CdmImport] 导入 {} ({}/{})",
                alias,
                report.completed + 1,
                report.total
            );
            self.listener
                .on_batch_progress(alias.clone(), report.completed, report.total)
                .await;

            match self.import_items(alias, max_items).await {
                Ok(summary) => {
                    report.completed += 1;
                    report.outcomes.push(CollectionImportOutcome {
                        alias: alias.clone(),
                        summary: Some(summary),
                        error: None,
                    });
                }
                Err(e) => {
                    error!("[CdmImport] ❌ 导入 {} 失败: {}", alias, e);
                    report.outcomes.push(CollectionImportOutcome {
                        alias: alias.clone(),
                        summary: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            "[CdmImport] ✅ 批量导入完成，成功 {} / {} 个集合",
            report.completed, report.total
        );
        report
    }

    /// 按 alias 查找集合；有重复时只保留最早的一条
    async fn lookup_collection(&self, alias: &str) -> CdmResult<Option<CollectionRecord>> {
        let mut found = self.store.find_collections_by_alias(alias).await?;
        if found.len() > 1 {
            warn!(
                "[CdmImport] 集合 {} 有 {} 条重复记录，清理多余记录",
                alias,
                found.len()
            );
            for duplicate in found.drain(1..) {
                self.store.delete_collection(duplicate.id).await?;
            }
        }
        Ok(found.into_iter().next())
    }

    /// 按 (alias, pointer) 查找条目；有重复时只保留最早的一条
    async fn lookup_item(&self, alias: &str, pointer: &str) -> CdmResult<Option<ItemRecord>> {
        let mut found = self.store.find_items_by_pointer(alias, pointer).await?;
        if found.len() > 1 {
            warn!(
                "[CdmImport] 条目 {}/{} 有 {} 条重复记录，清理多余记录",
                alias,
                pointer,
                found.len()
            );
            for duplicate in found.drain(1..) {
                self.store.delete_item(duplicate.id).await?;
            }
        }
        Ok(found.into_iter().next())
    }
}
