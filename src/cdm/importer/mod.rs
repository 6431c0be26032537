//! 同步器模块
//!
//! 把远程集合和条目写入本地内容存储

pub mod content;
pub mod listener;
pub mod models;
pub mod service;

pub use content::{build_collection_description, build_item_content, SKIPPED_FIELDS};
pub use listener::{EmptyImportListener, ImportListener};
pub use models::{BatchImportReport, CollectionImportOutcome, ImportSummary};
pub use service::{CdmImporter, DEFAULT_MAX_ITEMS};
