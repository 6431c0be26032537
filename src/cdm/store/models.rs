//! 本地内容记录模型

use crate::cdm::types::{FieldInfo, RecordMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 自定义预览图（由编辑在后台设置，重新导入不会覆盖）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewImage {
    pub url: String,
    /// 媒体库附件 ID
    #[serde(default)]
    pub attachment_id: Option<i64>,
}

/// 集合写入草稿：只包含远程来源的字段
#[derive(Debug, Clone)]
pub struct CollectionDraft {
    pub alias: String,
    pub title: String,
    pub content: String,
    pub server_url: String,
    pub collection_url: String,
    pub item_count: u64,
    /// None 表示本次未取到字段定义，保留原值
    pub fields: Option<Vec<FieldInfo>>,
    pub imported_at: DateTime<Utc>,
}

/// 本地集合记录
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRecord {
    pub id: i64,
    pub alias: String,
    pub title: String,
    pub content: String,
    pub server_url: String,
    pub collection_url: String,
    pub item_count: u64,
    pub fields: Vec<FieldInfo>,
    pub last_import: Option<DateTime<Utc>>,
    /// 最近一次条目导入的新增 + 更新数（每次覆盖）
    pub imported_items: Option<u64>,
    pub last_item_import: Option<DateTime<Utc>>,
    pub preview_image: Option<PreviewImage>,
    pub created_at: DateTime<Utc>,
}

impl CollectionRecord {
    /// 展示用图片：集合只有自定义预览图
    pub fn display_image_url(&self) -> Option<&str> {
        self.preview_image.as_ref().map(|p| p.url.as_str())
    }
}

/// 条目写入草稿：只包含远程来源的字段
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub alias: String,
    pub pointer: String,
    pub collection_id: i64,
    pub title: String,
    pub content: String,
    pub server_url: String,
    pub item_url: String,
    pub image_url: String,
    pub metadata: RecordMap,
    /// (width, height)；None 表示本次未取到图片信息，保留原值
    pub image_size: Option<(u64, u64)>,
    pub imported_at: DateTime<Utc>,
}

/// 本地条目记录
#[derive(Debug, Clone, Serialize)]
pub struct ItemRecord {
    pub id: i64,
    pub alias: String,
    pub pointer: String,
    pub collection_id: i64,
    pub title: String,
    pub content: String,
    pub server_url: String,
    pub item_url: String,
    pub image_url: String,
    pub metadata: RecordMap,
    pub image_width: Option<u64>,
    pub image_height: Option<u64>,
    pub last_import: Option<DateTime<Utc>>,
    pub preview_image: Option<PreviewImage>,
    pub created_at: DateTime<Utc>,
}

impl ItemRecord {
    /// 展示用图片：自定义预览图优先，其次是 ContentDM 图片
    pub fn display_image_url(&self) -> &str {
        self.preview_image
            .as_ref()
            .map(|p| p.url.as_str())
            .unwrap_or(&self.image_url)
    }
}

/// 分组分类项（每个集合 alias 一个）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Term {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Title,
    Date,
}

/// 集合列表查询（集合网格）
#[derive(Debug, Clone, Default)]
pub struct CollectionQuery {
    pub order_by: OrderBy,
    pub order: SortOrder,
    /// None 表示不限制
    pub limit: Option<usize>,
}

/// 条目列表查询（条目网格、图库）
#[derive(Debug, Clone)]
pub struct ItemQuery {
    /// 按分组分类项（集合 alias）过滤
    pub alias: Option<String>,
    pub order_by: OrderBy,
    pub order: SortOrder,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            alias: None,
            order_by: OrderBy::Date,
            order: SortOrder::Desc,
            limit: Some(20),
            offset: 0,
        }
    }
}
