//! 内存内容存储
//!
//! 不做唯一性约束，同一 alias / pointer 可以出现多条记录，
//! 行为与宿主 CMS 的文章表一致。用于测试和一次性导入。

use crate::cdm::store::models::{
    CollectionDraft, CollectionQuery, CollectionRecord, ItemDraft, ItemQuery, ItemRecord, OrderBy,
    PreviewImage, SortOrder, Term,
};
use crate::cdm::store::ContentStore;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    next_id: i64,
    collections: Vec<CollectionRecord>,
    items: Vec<ItemRecord>,
    terms: Vec<Term>,
    item_terms: HashMap<i64, i64>,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn term_by_slug(&self, slug: &str) -> Option<&Term> {
        self.terms.iter().find(|t| t.slug == slug)
    }

    fn ensure_term(&mut self, slug: &str, name: &str) -> Term {
        if let Some(term) = self.term_by_slug(slug) {
            return term.clone();
        }
        let term = Term {
            id: self.allocate_id(),
            slug: slug.to_string(),
            name: name.to_string(),
        };
        self.terms.push(term.clone());
        term
    }
}

fn by_creation<T>(created: impl Fn(&T) -> (DateTime<Utc>, i64)) -> impl Fn(&T, &T) -> Ordering {
    move |a, b| created(a).cmp(&created(b))
}

fn apply_order(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

/// 内存内容存储
#[derive(Default)]
pub struct MemoryContentStore {
    state: Mutex<State>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        match self.state.lock() {
            Ok(guard) => Ok(guard),
            Err(_) => bail!("内存存储锁已损坏"),
        }
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn find_collections_by_alias(&self, alias: &str) -> Result<Vec<CollectionRecord>> {
        let state = self.lock()?;
        let mut found: Vec<CollectionRecord> = state
            .collections
            .iter()
            .filter(|c| c.alias == alias)
            .cloned()
            .collect();
        found.sort_by(by_creation(|c: &CollectionRecord| (c.created_at, c.id)));
        Ok(found)
    }

    async fn get_collection(&self, id: i64) -> Result<Option<CollectionRecord>> {
        let state = self.lock()?;
        Ok(state.collections.iter().find(|c| c.id == id).cloned())
    }

    async fn create_collection(&self, draft: &CollectionDraft) -> Result<i64> {
        let mut state = self.lock()?;
        let id = state.allocate_id();
        state.collections.push(CollectionRecord {
            id,
            alias: draft.alias.clone(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            server_url: draft.server_url.clone(),
            collection_url: draft.collection_url.clone(),
            item_count: draft.item_count,
            fields: draft.fields.clone().unwrap_or_default(),
            last_import: Some(draft.imported_at),
            imported_items: None,
            last_item_import: None,
            preview_image: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_collection(&self, id: i64, draft: &CollectionDraft) -> Result<()> {
        let mut state = self.lock()?;
        let Some(record) = state.collections.iter_mut().find(|c| c.id == id) else {
            bail!("集合不存在: {}", id);
        };
        record.alias = draft.alias.clone();
        record.title = draft.title.clone();
        record.content = draft.content.clone();
        record.server_url = draft.server_url.clone();
        record.collection_url = draft.collection_url.clone();
        record.item_count = draft.item_count;
        if let Some(fields) = &draft.fields {
            record.fields = fields.clone();
        }
        record.last_import = Some(draft.imported_at);
        Ok(())
    }

    async fn delete_collection(&self, id: i64) -> Result<()> {
        let mut state = self.lock()?;
        state.collections.retain(|c| c.id != id);
        Ok(())
    }

    async fn set_collection_preview(&self, id: i64, preview: Option<&PreviewImage>) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(record) = state.collections.iter_mut().find(|c| c.id == id) {
            record.preview_image = preview.cloned();
        }
        Ok(())
    }

    async fn record_item_import(
        &self,
        collection_id: i64,
        imported_items: u64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(record) = state.collections.iter_mut().find(|c| c.id == collection_id) {
            record.imported_items = Some(imported_items);
            record.last_item_import = Some(at);
        }
        Ok(())
    }

    async fn list_collections(&self, query: &CollectionQuery) -> Result<Vec<CollectionRecord>> {
        let state = self.lock()?;
        let mut list = state.collections.clone();
        list.sort_by(|a, b| {
            let ordering = match query.order_by {
                OrderBy::Title => a.title.cmp(&b.title),
                OrderBy::Date => a.created_at.cmp(&b.created_at),
            };
            apply_order(ordering, query.order).then(a.id.cmp(&b.id))
        });
        if let Some(limit) = query.limit {
            list.truncate(limit);
        }
        Ok(list)
    }

    async fn count_collections(&self) -> Result<u64> {
        Ok(self.lock()?.collections.len() as u64)
    }

    async fn find_items_by_pointer(&self, alias: &str, pointer: &str) -> Result<Vec<ItemRecord>> {
        let state = self.lock()?;
        let mut found: Vec<ItemRecord> = state
            .items
            .iter()
            .filter(|i| i.alias == alias && i.pointer == pointer)
            .cloned()
            .collect();
        found.sort_by(by_creation(|i: &ItemRecord| (i.created_at, i.id)));
        Ok(found)
    }

    async fn get_item(&self, id: i64) -> Result<Option<ItemRecord>> {
        let state = self.lock()?;
        Ok(state.items.iter().find(|i| i.id == id).cloned())
    }

    async fn create_item(&self, draft: &ItemDraft) -> Result<i64> {
        let mut state = self.lock()?;
        let id = state.allocate_id();
        state.items.push(ItemRecord {
            id,
            alias: draft.alias.clone(),
            pointer: draft.pointer.clone(),
            collection_id: draft.collection_id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            server_url: draft.server_url.clone(),
            item_url: draft.item_url.clone(),
            image_url: draft.image_url.clone(),
            metadata: draft.metadata.clone(),
            image_width: draft.image_size.map(|(w, _)| w),
            image_height: draft.image_size.map(|(_, h)| h),
            last_import: Some(draft.imported_at),
            preview_image: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_item(&self, id: i64, draft: &ItemDraft) -> Result<()> {
        let mut state = self.lock()?;
        let Some(record) = state.items.iter_mut().find(|i| i.id == id) else {
            bail!("条目不存在: {}", id);
        };
        record.alias = draft.alias.clone();
        record.pointer = draft.pointer.clone();
        record.collection_id = draft.collection_id;
        record.title = draft.title.clone();
        record.content = draft.content.clone();
        record.server_url = draft.server_url.clone();
        record.item_url = draft.item_url.clone();
        record.image_url = draft.image_url.clone();
        record.metadata = draft.metadata.clone();
        if let Some((width, height)) = draft.image_size {
            record.image_width = Some(width);
            record.image_height = Some(height);
        }
        record.last_import = Some(draft.imported_at);
        Ok(())
    }

    async fn delete_item(&self, id: i64) -> Result<()> {
        let mut state = self.lock()?;
        state.items.retain(|i| i.id != id);
        state.item_terms.remove(&id);
        Ok(())
    }

    async fn set_item_preview(&self, id: i64, preview: Option<&PreviewImage>) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(record) = state.items.iter_mut().find(|i| i.id == id) {
            record.preview_image = preview.cloned();
        }
        Ok(())
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<Vec<ItemRecord>> {
        let state = self.lock()?;
        let term_id = match &query.alias {
            Some(slug) => match state.term_by_slug(slug) {
                Some(term) => Some(term.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let mut list: Vec<ItemRecord> = state
            .items
            .iter()
            .filter(|i| term_id.is_none() || state.item_terms.get(&i.id) == term_id.as_ref())
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            let ordering = match query.order_by {
                OrderBy::Title => a.title.cmp(&b.title),
                OrderBy::Date => a.created_at.cmp(&b.created_at),
            };
            apply_order(ordering, query.order).then(a.id.cmp(&b.id))
        });
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(list.into_iter().skip(query.offset).take(limit).collect())
    }

    async fn count_items(&self) -> Result<u64> {
        Ok(self.lock()?.items.len() as u64)
    }

    async fn ensure_term(&self, slug: &str, name: &str) -> Result<Term> {
        Ok(self.lock()?.ensure_term(slug, name))
    }

    async fn find_term(&self, slug: &str) -> Result<Option<Term>> {
        Ok(self.lock()?.term_by_slug(slug).cloned())
    }

    async fn set_item_term(&self, item_id: i64, slug: &str) -> Result<()> {
        let mut state = self.lock()?;
        let term = state.ensure_term(slug, slug);
        state.item_terms.insert(item_id, term.id);
        Ok(())
    }

    async fn item_term(&self, item_id: i64) -> Result<Option<Term>> {
        let state = self.lock()?;
        Ok(state
            .item_terms
            .get(&item_id)
            .and_then(|term_id| state.terms.iter().find(|t| t.id == *term_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn collection_draft(alias: &str) -> CollectionDraft {
        CollectionDraft {
            alias: alias.to_string(),
            title: alias.to_uppercase(),
            content: String::new(),
            server_url: "https://cdm.example.edu".to_string(),
            collection_url: String::new(),
            item_count: 0,
            fields: None,
            imported_at: Utc::now(),
        }
    }

    fn item_draft(pointer: &str) -> ItemDraft {
        ItemDraft {
            alias: "photos".to_string(),
            pointer: pointer.to_string(),
            collection_id: 1,
            title: format!("Item {}", pointer),
            content: String::new(),
            server_url: String::new(),
            item_url: String::new(),
            image_url: String::new(),
            metadata: Map::new(),
            image_size: None,
            imported_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicates_are_allowed_and_sorted_oldest_first() {
        let store = MemoryContentStore::new();
        let first = store.create_collection(&collection_draft("maps")).await.unwrap();
        let second = store.create_collection(&collection_draft("maps")).await.unwrap();

        let found = store.find_collections_by_alias("maps").await.unwrap();
        assert_eq!(
            found.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![first, second]
        );
    }

    #[tokio::test]
    async fn list_items_filters_by_term_and_pages() {
        let store = MemoryContentStore::new();
        for pointer in ["1", "2", "3"] {
            let id = store.create_item(&item_draft(pointer)).await.unwrap();
            store.set_item_term(id, "photos").await.unwrap();
        }
        store.create_item(&item_draft("4")).await.unwrap();

        let query = ItemQuery {
            alias: Some("photos".to_string()),
            order_by: OrderBy::Title,
            order: SortOrder::Asc,
            limit: Some(2),
            offset: 1,
        };
        let items = store.list_items(&query).await.unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Item 2", "Item 3"]);

        let missing = ItemQuery {
            alias: Some("nothing".to_string()),
            ..Default::default()
        };
        assert!(store.list_items(&missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_item_term_replaces_previous() {
        let store = MemoryContentStore::new();
        let id = store.create_item(&item_draft("1")).await.unwrap();
        store.set_item_term(id, "photos").await.unwrap();
        store.set_item_term(id, "maps").await.unwrap();
        assert_eq!(store.item_term(id).await.unwrap().unwrap().slug, "maps");
        assert!(store.find_term("photos").await.unwrap().is_some());
    }
}
