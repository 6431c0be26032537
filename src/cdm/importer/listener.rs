//! 导入监听器回调接口

use crate::cdm::importer::models::ImportSummary;
use async_trait::async_trait;

/// 导入进度回调（批量导入时按顺序触发）
#[async_trait]
pub trait ImportListener: Send + Sync {
    /// 一次导入开始，`scope` 为 `collections` 或集合 alias，`total` 为远程返回的记录数
    async fn on_import_started(&self, scope: String, total: usize);

    /// 单条记录写入成功，`key` 为集合 alias 或条目 pointer
    async fn on_record_imported(&self, scope: String, key: String, updated: bool);

    /// 单条记录失败（批次继续）
    async fn on_record_failed(&self, scope: String, message: String);

    /// 多集合条目导入进度：即将导入 `alias`，此前已成功 `completed` 个，共 `total` 个
    async fn on_batch_progress(&self, alias: String, completed: usize, total: usize);

    /// 一次导入结束
    async fn on_import_finished(&self, scope: String, summary: ImportSummary);
}

/// 默认空实现（无操作）
pub struct EmptyImportListener;

#[async_trait]
impl ImportListener for EmptyImportListener {
    async fn on_import_started(&self, _scope: String, _total: usize) {}

    async fn on_record_imported(&self, _scope: String, _key: String, _updated: bool) {}

    async fn on_record_failed(&self, _scope: String, _message: String) {}

    async fn on_batch_progress(&self, _alias: String, _completed: usize, _total: usize) {}

    async fn on_import_finished(&self, _scope: String, _summary: ImportSummary) {}
}
