//! SQLite 数据库工具：统一创建连接池并初始化表结构
//!
//! alias 与 (alias, pointer) 的唯一性由唯一索引保证。

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use tracing::info;

const SCHEMA: &[(&str, &str)] = &[
    (
        "cdm_collections",
        r#"
        CREATE TABLE IF NOT EXISTS cdm_collections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alias TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            server_url TEXT NOT NULL DEFAULT '',
            collection_url TEXT NOT NULL DEFAULT '',
            item_count INTEGER NOT NULL DEFAULT 0,
            fields TEXT NOT NULL DEFAULT '[]',
            last_import TEXT,
            imported_items INTEGER,
            last_item_import TEXT,
            preview_image TEXT,
            preview_image_id INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "idx_cdm_collections_alias",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_cdm_collections_alias ON cdm_collections(alias)",
    ),
    (
        "cdm_items",
        r#"
        CREATE TABLE IF NOT EXISTS cdm_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alias TEXT NOT NULL,
            pointer TEXT NOT NULL,
            collection_id INTEGER NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            server_url TEXT NOT NULL DEFAULT '',
            item_url TEXT NOT NULL DEFAULT '',
            image_url TEXT NOT NULL DEFAULT '',
            metadata TEXT NOT NULL DEFAULT '{}',
            image_width INTEGER,
            image_height INTEGER,
            last_import TEXT,
            preview_image TEXT,
            preview_image_id INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "idx_cdm_items_alias_pointer",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_cdm_items_alias_pointer ON cdm_items(alias, pointer)",
    ),
    (
        "cdm_terms",
        r#"
        CREATE TABLE IF NOT EXISTS cdm_terms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT ''
        )
        "#,
    ),
    (
        "cdm_item_terms",
        r#"
        CREATE TABLE IF NOT EXISTS cdm_item_terms (
            item_id INTEGER PRIMARY KEY,
            term_id INTEGER NOT NULL
        )
        "#,
    ),
    (
        "cdm_options",
        r#"
        CREATE TABLE IF NOT EXISTS cdm_options (
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    ),
];

/// 创建 SQLite 连接池（内存数据库只开一个连接，保证所有查询看到同一个库）
pub async fn create_sqlite_pool(db_url: &str) -> Result<Pool<Sqlite>> {
    let max_connections = if db_url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await
        .context(format!("连接SQLite数据库失败: {}", db_url))?;
    Ok(pool)
}

/// 初始化表结构（幂等）
pub async fn init_schema(db: &Pool<Sqlite>) -> Result<()> {
    info!("[CdmDB] 初始化数据库表结构");
    for (name, sql) in SCHEMA {
        sqlx::query(sql)
            .execute(db)
            .await
            .context(format!("创建 {} 失败", name))?;
    }
    info!("[CdmDB] 数据库表初始化完成");
    Ok(())
}

/// 创建连接池并初始化表结构
pub async fn open_database(db_url: &str) -> Result<Pool<Sqlite>> {
    let pool = create_sqlite_pool(db_url).await?;
    init_schema(&pool).await?;
    Ok(pool)
}
