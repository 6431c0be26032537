//! ContentDM 导入模块
//!
//! 远程客户端、同步器、本地内容存储和管理操作

pub mod admin;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod importer;
pub mod settings;
pub mod store;
pub mod types;
