//! 本地内容存储模块
//!
//! 同步器只把存储当作按键查找的记录仓库：集合按 alias、条目按 (alias, pointer)，
//! 另有一个以 alias 为 slug 的分组分类。

pub mod dao;
pub mod memory;
pub mod models;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use dao::SqliteContentStore;
pub use memory::MemoryContentStore;
pub use models::{
    CollectionDraft, CollectionQuery, CollectionRecord, ItemDraft, ItemQuery, ItemRecord, OrderBy,
    PreviewImage, SortOrder, Term,
};

/// 本地内容存储接口
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// 按 alias 查找集合，按创建时间从旧到新排序（同一时间按 id）
    async fn find_collections_by_alias(&self, alias: &str) -> Result<Vec<CollectionRecord>>;
    async fn get_collection(&self, id: i64) -> Result<Option<CollectionRecord>>;
    async fn create_collection(&self, draft: &CollectionDraft) -> Result<i64>;
    /// 只覆盖远程来源字段，预览图等本地字段保持不变
    async fn update_collection(&self, id: i64, draft: &CollectionDraft) -> Result<()>;
    async fn delete_collection(&self, id: i64) -> Result<()>;
    async fn set_collection_preview(&self, id: i64, preview: Option<&PreviewImage>) -> Result<()>;
    /// 记录本次条目导入结果（覆盖，不累加）
    async fn record_item_import(
        &self,
        collection_id: i64,
        imported_items: u64,
        at: DateTime<Utc>,
    ) -> Result<()>;
    async fn list_collections(&self, query: &CollectionQuery) -> Result<Vec<CollectionRecord>>;
    async fn count_collections(&self) -> Result<u64>;

    /// 按 (alias, pointer) 查找条目，排序规则同集合
    async fn find_items_by_pointer(&self, alias: &str, pointer: &str) -> Result<Vec<ItemRecord>>;
    async fn get_item(&self, id: i64) -> Result<Option<ItemRecord>>;
    async fn create_item(&self, draft: &ItemDraft) -> Result<i64>;
    async fn update_item(&self, id: i64, draft: &ItemDraft) -> Result<()>;
    async fn delete_item(&self, id: i64) -> Result<()>;
    async fn set_item_preview(&self, id: i64, preview: Option<&PreviewImage>) -> Result<()>;
    async fn list_items(&self, query: &ItemQuery) -> Result<Vec<ItemRecord>>;
    async fn count_items(&self) -> Result<u64>;

    /// 分类项不存在时创建；已存在则原样返回（不改名）
    async fn ensure_term(&self, slug: &str, name: &str) -> Result<Term>;
    async fn find_term(&self, slug: &str) -> Result<Option<Term>>;
    /// 把条目归入 slug 对应的分类项（替换原有归属，必要时创建分类项）
    async fn set_item_term(&self, item_id: i64, slug: &str) -> Result<()>;
    async fn item_term(&self, item_id: i64) -> Result<Option<Term>>;
}
