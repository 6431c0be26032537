//! 内容存储数据访问层（DAO）
//!
//! 基于 sqlx 的 SQLite 实现。表结构见 `cdm::db`。

use crate::cdm::store::models::{
    CollectionDraft, CollectionQuery, CollectionRecord, ItemDraft, ItemQuery, ItemRecord, OrderBy,
    PreviewImage, Term,
};
use crate::cdm::store::ContentStore;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info};

const COLLECTION_COLUMNS: &str = r#"
    id, alias, title, content, server_url, collection_url, item_count, fields,
    last_import, imported_items, last_item_import, preview_image, preview_image_id, created_at
"#;

const ITEM_COLUMNS: &str = r#"
    i.id, i.alias, i.pointer, i.collection_id, i.title, i.content, i.server_url, i.item_url,
    i.image_url, i.metadata, i.image_width, i.image_height, i.last_import,
    i.preview_image, i.preview_image_id, i.created_at
"#;

fn preview_from_row(row: &SqliteRow) -> Option<PreviewImage> {
    let url: Option<String> = row.get("preview_image");
    url.filter(|u| !u.is_empty()).map(|url| PreviewImage {
        url,
        attachment_id: row.get("preview_image_id"),
    })
}

fn collection_from_row(row: &SqliteRow) -> Result<CollectionRecord> {
    let fields: String = row.get("fields");
    let imported_items: Option<i64> = row.get("imported_items");
    Ok(CollectionRecord {
        id: row.get("id"),
        alias: row.get("alias"),
        title: row.get("title"),
        content: row.get("content"),
        server_url: row.get("server_url"),
        collection_url: row.get("collection_url"),
        item_count: row.get::<i64, _>("item_count").max(0) as u64,
        fields: serde_json::from_str(&fields).context("解析集合字段定义失败")?,
        last_import: row.get("last_import"),
        imported_items: imported_items.map(|n| n.max(0) as u64),
        last_item_import: row.get("last_item_import"),
        preview_image: preview_from_row(row),
        created_at: row.get("created_at"),
    })
}

fn item_from_row(row: &SqliteRow) -> Result<ItemRecord> {
    let metadata: String = row.get("metadata");
    let image_width: Option<i64> = row.get("image_width");
    let image_height: Option<i64> = row.get("image_height");
    Ok(ItemRecord {
        id: row.get("id"),
        alias: row.get("alias"),
        pointer: row.get("pointer"),
        collection_id: row.get("collection_id"),
        title: row.get("title"),
        content: row.get("content"),
        server_url: row.get("server_url"),
        item_url: row.get("item_url"),
        image_url: row.get("image_url"),
        metadata: serde_json::from_str(&metadata).context("解析条目元数据失败")?,
        image_width: image_width.map(|n| n.max(0) as u64),
        image_height: image_height.map(|n| n.max(0) as u64),
        last_import: row.get("last_import"),
        preview_image: preview_from_row(row),
        created_at: row.get("created_at"),
    })
}

fn order_column(order_by: OrderBy) -> &'static str {
    match order_by {
        OrderBy::Title => "title",
        OrderBy::Date => "created_at",
    }
}

/// SQLite 内容存储
#[derive(Clone)]
pub struct SqliteContentStore {
    db: Pool<Sqlite>,
}

impl SqliteContentStore {
    /// 创建新的存储（表结构需已由 `cdm::db::init_schema` 创建）
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.db
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn find_collections_by_alias(&self, alias: &str) -> Result<Vec<CollectionRecord>> {
        let sql = format!(
            "SELECT {} FROM cdm_collections WHERE alias = ? ORDER BY created_at ASC, id ASC",
            COLLECTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(alias)
            .fetch_all(&self.db)
            .await
            .context("按 alias 查询集合失败")?;
        rows.iter().map(collection_from_row).collect()
    }

    async fn get_collection(&self, id: i64) -> Result<Option<CollectionRecord>> {
        let sql = format!("SELECT {} FROM cdm_collections WHERE id = ?", COLLECTION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("查询集合失败")?;
        row.as_ref().map(collection_from_row).transpose()
    }

    async fn create_collection(&self, draft: &CollectionDraft) -> Result<i64> {
        let fields = serde_json::to_string(draft.fields.as_deref().unwrap_or_default())
            .context("序列化集合字段定义失败")?;
        let result = sqlx::query(
            r#"
            INSERT INTO cdm_collections (
                alias, title, content, server_url, collection_url, item_count, fields,
                last_import, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.alias)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.server_url)
        .bind(&draft.collection_url)
        .bind(draft.item_count as i64)
        .bind(fields)
        .bind(draft.imported_at)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .context("插入集合失败")?;

        let id = result.last_insert_rowid();
        info!("[CdmStore] 新建集合 {} (id={})", draft.alias, id);
        Ok(id)
    }

    async fn update_collection(&self, id: i64, draft: &CollectionDraft) -> Result<()> {
        let fields = draft
            .fields
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("序列化集合字段定义失败")?;
        let result = sqlx::query(
            r#"
            UPDATE cdm_collections SET
                alias = ?,
                title = ?,
                content = ?,
                server_url = ?,
                collection_url = ?,
                item_count = ?,
                fields = COALESCE(?, fields),
                last_import = ?
            WHERE id = ?
            "#,
        )
        .bind(&draft.alias)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.server_url)
        .bind(&draft.collection_url)
        .bind(draft.item_count as i64)
        .bind(fields)
        .bind(draft.imported_at)
        .bind(id)
        .execute(&self.db)
        .await
        .context("更新集合失败")?;

        if result.rows_affected() == 0 {
            bail!("集合不存在: {}", id);
        }
        debug!("[CdmStore] 更新集合 {} (id={})", draft.alias, id);
        Ok(())
    }

    async fn delete_collection(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM cdm_collections WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .context("删除集合失败")?;
        Ok(())
    }

    async fn set_collection_preview(&self, id: i64, preview: Option<&PreviewImage>) -> Result<()> {
        sqlx::query(
            "UPDATE cdm_collections SET preview_image = ?, preview_image_id = ? WHERE id = ?",
        )
        .bind(preview.map(|p| p.url.as_str()))
        .bind(preview.and_then(|p| p.attachment_id))
        .bind(id)
        .execute(&self.db)
        .await
        .context("保存集合预览图失败")?;
        Ok(())
    }

    async fn record_item_import(
        &self,
        collection_id: i64,
        imported_items: u64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE cdm_collections SET imported_items = ?, last_item_import = ? WHERE id = ?",
        )
        .bind(imported_items as i64)
        .bind(at)
        .bind(collection_id)
        .execute(&self.db)
        .await
        .context("更新集合导入统计失败")?;
        Ok(())
    }

    async fn list_collections(&self, query: &CollectionQuery) -> Result<Vec<CollectionRecord>> {
        let sql = format!(
            "SELECT {} FROM cdm_collections ORDER BY {} {}, id ASC LIMIT ?",
            COLLECTION_COLUMNS,
            order_column(query.order_by),
            query.order.as_sql()
        );
        let rows = sqlx::query(&sql)
            .bind(query.limit.map(|n| n as i64).unwrap_or(-1))
            .fetch_all(&self.db)
            .await
            .context("查询集合列表失败")?;
        rows.iter().map(collection_from_row).collect()
    }

    async fn count_collections(&self) -> Result<u64> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM cdm_collections")
            .fetch_one(&self.db)
            .await
            .context("统计集合数失败")?
            .get("total");
        Ok(total as u64)
    }

    async fn find_items_by_pointer(&self, alias: &str, pointer: &str) -> Result<Vec<ItemRecord>> {
        let sql = format!(
            "SELECT {} FROM cdm_items i WHERE i.alias = ? AND i.pointer = ? ORDER BY i.created_at ASC, i.id ASC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(alias)
            .bind(pointer)
            .fetch_all(&self.db)
            .await
            .context("按 pointer 查询条目失败")?;
        rows.iter().map(item_from_row).collect()
    }

    async fn get_item(&self, id: i64) -> Result<Option<ItemRecord>> {
        let sql = format!("SELECT {} FROM cdm_items i WHERE i.id = ?", ITEM_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("查询条目失败")?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn create_item(&self, draft: &ItemDraft) -> Result<i64> {
        let metadata = serde_json::to_string(&draft.metadata).context("序列化条目元数据失败")?;
        let result = sqlx::query(
            r#"
            INSERT INTO cdm_items (
                alias, pointer, collection_id, title, content, server_url, item_url,
                image_url, metadata, image_width, image_height, last_import, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.alias)
        .bind(&draft.pointer)
        .bind(draft.collection_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.server_url)
        .bind(&draft.item_url)
        .bind(&draft.image_url)
        .bind(metadata)
        .bind(draft.image_size.map(|(w, _)| w as i64))
        .bind(draft.image_size.map(|(_, h)| h as i64))
        .bind(draft.imported_at)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .context("插入条目失败")?;

        let id = result.last_insert_rowid();
        debug!(
            "[CdmStore] 新建条目 {}/{} (id={})",
            draft.alias, draft.pointer, id
        );
        Ok(id)
    }

    async fn update_item(&self, id: i64, draft: &ItemDraft) -> Result<()> {
        let metadata = serde_json::to_string(&draft.metadata).context("序列化条目元数据失败")?;
        let result = sqlx::query(
            r#"
            UPDATE cdm_items SET
                alias = ?,
                pointer = ?,
                collection_id = ?,
                title = ?,
                content = ?,
                server_url = ?,
                item_url = ?,
                image_url = ?,
                metadata = ?,
                image_width = COALESCE(?, image_width),
                image_height = COALESCE(?, image_height),
                last_import = ?
            WHERE id = ?
            "#,
        )
        .bind(&draft.alias)
        .bind(&draft.pointer)
        .bind(draft.collection_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.server_url)
        .bind(&draft.item_url)
        .bind(&draft.image_url)
        .bind(metadata)
        .bind(draft.image_size.map(|(w, _)| w as i64))
        .bind(draft.image_size.map(|(_, h)| h as i64))
        .bind(draft.imported_at)
        .bind(id)
        .execute(&self.db)
        .await
        .context("更新条目失败")?;

        if result.rows_affected() == 0 {
            bail!("条目不存在: {}", id);
        }
        Ok(())
    }

    async fn delete_item(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM cdm_item_terms WHERE item_id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .context("删除条目分类关系失败")?;
        sqlx::query("DELETE FROM cdm_items WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .context("删除条目失败")?;
        Ok(())
    }

    async fn set_item_preview(&self, id: i64, preview: Option<&PreviewImage>) -> Result<()> {
        sqlx::query("UPDATE cdm_items SET preview_image = ?, preview_image_id = ? WHERE id = ?")
            .bind(preview.map(|p| p.url.as_str()))
            .bind(preview.and_then(|p| p.attachment_id))
            .bind(id)
            .execute(&self.db)
            .await
            .context("保存条目预览图失败")?;
        Ok(())
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<Vec<ItemRecord>> {
        let order = format!(
            "i.{} {}, i.id ASC",
            order_column(query.order_by),
            query.order.as_sql()
        );
        let limit = query.limit.map(|n| n as i64).unwrap_or(-1);
        let offset = query.offset as i64;

        let rows = match &query.alias {
            Some(alias) => {
                let sql = format!(
                    r#"
                    SELECT {} FROM cdm_items i
                    JOIN cdm_item_terms it ON it.item_id = i.id
                    JOIN cdm_terms t ON t.id = it.term_id
                    WHERE t.slug = ?
                    ORDER BY {} LIMIT ? OFFSET ?
                    "#,
                    ITEM_COLUMNS, order
                );
                sqlx::query(&sql)
                    .bind(alias)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.db)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM cdm_items i ORDER BY {} LIMIT ? OFFSET ?",
                    ITEM_COLUMNS, order
                );
                sqlx::query(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.db)
                    .await
            }
        }
        .context("查询条目列表失败")?;

        rows.iter().map(item_from_row).collect()
    }

    async fn count_items(&self) -> Result<u64> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM cdm_items")
            .fetch_one(&self.db)
            .await
            .context("统计条目数失败")?
            .get("total");
        Ok(total as u64)
    }

    async fn ensure_term(&self, slug: &str, name: &str) -> Result<Term> {
        sqlx::query("INSERT INTO cdm_terms (slug, name) VALUES (?, ?) ON CONFLICT(slug) DO NOTHING")
            .bind(slug)
            .bind(name)
            .execute(&self.db)
            .await
            .context("创建分类项失败")?;
        match self.find_term(slug).await? {
            Some(term) => Ok(term),
            None => bail!("分类项创建后未找到: {}", slug),
        }
    }

    async fn find_term(&self, slug: &str) -> Result<Option<Term>> {
        let row = sqlx::query("SELECT id, slug, name FROM cdm_terms WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.db)
            .await
            .context("查询分类项失败")?;
        Ok(row.map(|m| Term {
            id: m.get("id"),
            slug: m.get("slug"),
            name: m.get("name"),
        }))
    }

    async fn set_item_term(&self, item_id: i64, slug: &str) -> Result<()> {
        let term = self.ensure_term(slug, slug).await?;
        sqlx::query(
            r#"
            INSERT INTO cdm_item_terms (item_id, term_id) VALUES (?, ?)
            ON CONFLICT(item_id) DO UPDATE SET term_id = excluded.term_id
            "#,
        )
        .bind(item_id)
        .bind(term.id)
        .execute(&self.db)
        .await
        .context("保存条目分类关系失败")?;
        Ok(())
    }

    async fn item_term(&self, item_id: i64) -> Result<Option<Term>> {
        let row = sqlx::query(
            r#"
            SELECT t.id, t.slug, t.name FROM cdm_terms t
            JOIN cdm_item_terms it ON it.term_id = t.id
            WHERE it.item_id = ?
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await
        .context("查询条目分类项失败")?;
        Ok(row.map(|m| Term {
            id: m.get("id"),
            slug: m.get("slug"),
            name: m.get("name"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdm::db::open_database;
    use crate::cdm::store::models::SortOrder;
    use crate::cdm::types::FieldInfo;
    use serde_json::json;

    async fn store() -> SqliteContentStore {
        SqliteContentStore::new(open_database("sqlite::memory:").await.unwrap())
    }

    fn collection_draft(alias: &str, title: &str) -> CollectionDraft {
        CollectionDraft {
            alias: alias.to_string(),
            title: title.to_string(),
            content: "<p>desc</p>".to_string(),
            server_url: "https://cdm.example.edu".to_string(),
            collection_url: format!("https://cdm.example.edu/digital/collection/{}", alias),
            item_count: 12,
            fields: Some(vec![FieldInfo {
                name: "Title".to_string(),
                nick: "title".to_string(),
                ..Default::default()
            }]),
            imported_at: Utc::now(),
        }
    }

    fn item_draft(collection_id: i64, pointer: &str) -> ItemDraft {
        let mut metadata = serde_json::Map::new();
        metadata.insert("title".to_string(), json!("Harbor"));
        ItemDraft {
            alias: "photos".to_string(),
            pointer: pointer.to_string(),
            collection_id,
            title: "Harbor".to_string(),
            content: String::new(),
            server_url: "https://cdm.example.edu".to_string(),
            item_url: String::new(),
            image_url: format!("https://img/{}.jpg", pointer),
            metadata,
            image_size: Some((800, 600)),
            imported_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn collection_roundtrip_keeps_preview_on_update() {
        let store = store().await;
        let id = store
            .create_collection(&collection_draft("photos", "Photos"))
            .await
            .unwrap();
        let preview = PreviewImage {
            url: "https://site/preview.jpg".to_string(),
            attachment_id: Some(9),
        };
        store.set_collection_preview(id, Some(&preview)).await.unwrap();

        let mut draft = collection_draft("photos", "Historic Photos");
        draft.fields = None;
        store.update_collection(id, &draft).await.unwrap();

        let found = store.find_collections_by_alias("photos").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Historic Photos");
        assert_eq!(found[0].fields.len(), 1);
        assert_eq!(found[0].preview_image.as_ref(), Some(&preview));
        assert_eq!(found[0].display_image_url(), Some("https://site/preview.jpg"));
    }

    #[tokio::test]
    async fn alias_uniqueness_is_enforced() {
        let store = store().await;
        store
            .create_collection(&collection_draft("photos", "Photos"))
            .await
            .unwrap();
        assert!(store
            .create_collection(&collection_draft("photos", "Again"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn update_missing_record_fails() {
        let store = store().await;
        assert!(store
            .update_collection(42, &collection_draft("photos", "Photos"))
            .await
            .is_err());
        assert!(store.update_item(42, &item_draft(1, "1")).await.is_err());
    }

    #[tokio::test]
    async fn item_update_keeps_dimensions_when_unknown() {
        let store = store().await;
        let id = store.create_item(&item_draft(1, "7")).await.unwrap();

        let mut draft = item_draft(1, "7");
        draft.image_size = None;
        draft.title = "Harbor at dusk".to_string();
        store.update_item(id, &draft).await.unwrap();

        let item = store.get_item(id).await.unwrap().unwrap();
        assert_eq!(item.title, "Harbor at dusk");
        assert_eq!(item.image_width, Some(800));
        assert_eq!(item.image_height, Some(600));
        assert_eq!(item.metadata.get("title"), Some(&json!("Harbor")));
    }

    #[tokio::test]
    async fn terms_and_filtered_listing() {
        let store = store().await;
        let term = store.ensure_term("photos", "Historic Photos").await.unwrap();
        let again = store.ensure_term("photos", "Renamed").await.unwrap();
        assert_eq!(term, again);

        let a = store.create_item(&item_draft(1, "1")).await.unwrap();
        let b = store.create_item(&item_draft(1, "2")).await.unwrap();
        store.set_item_term(a, "photos").await.unwrap();
        store.set_item_term(b, "maps").await.unwrap();

        let query = ItemQuery {
            alias: Some("photos".to_string()),
            order: SortOrder::Asc,
            ..Default::default()
        };
        let items = store.list_items(&query).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].pointer, "1");
        assert_eq!(store.item_term(b).await.unwrap().unwrap().name, "maps");
        assert_eq!(store.count_items().await.unwrap(), 2);

        store.delete_item(a).await.unwrap();
        assert!(store.item_term(a).await.unwrap().is_none());
        assert_eq!(store.count_items().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn record_item_import_overwrites() {
        let store = store().await;
        let id = store
            .create_collection(&collection_draft("photos", "Photos"))
            .await
            .unwrap();
        store.record_item_import(id, 50, Utc::now()).await.unwrap();
        store.record_item_import(id, 3, Utc::now()).await.unwrap();
        let collection = store.get_collection(id).await.unwrap().unwrap();
        assert_eq!(collection.imported_items, Some(3));
        assert!(collection.last_item_import.is_some());
    }
}
