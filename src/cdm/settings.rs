//! 插件设置：服务器地址、分页、缓存参数
//!
//! 设置以 JSON 存在 `cdm_options` 表的 `cdm_explorer_settings` 行中。

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Pool, Row, Sqlite};
use std::sync::Mutex;
use tracing::debug;

/// 设置在存储中的键名
pub const SETTINGS_OPTION_NAME: &str = "cdm_explorer_settings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cdm_url: String,
    pub items_per_page: u64,
    /// 目前只保存，不参与请求
    pub enable_cache: bool,
    /// 秒
    pub cache_duration: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cdm_url: String::new(),
            items_per_page: 20,
            enable_cache: true,
            cache_duration: 3600,
        }
    }
}

impl Settings {
    /// 清洗设置表单提交的原始值
    ///
    /// 缺失的数值字段取默认值，无法解析的取 0；`enable_cache` 按真值判断，缺失即 false。
    pub fn sanitize(input: &Value) -> Self {
        let defaults = Self::default();
        Self {
            cdm_url: input
                .get("cdm_url")
                .and_then(Value::as_str)
                .map(sanitize_url)
                .unwrap_or_default(),
            items_per_page: input
                .get("items_per_page")
                .map(absint)
                .unwrap_or(defaults.items_per_page),
            enable_cache: input.get("enable_cache").map(is_truthy).unwrap_or(false),
            cache_duration: input
                .get("cache_duration")
                .map(absint)
                .unwrap_or(defaults.cache_duration),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.cdm_url.is_empty()
    }
}

/// 非负整数：取绝对值，无法解析时为 0
pub fn absint(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.unsigned_abs())
            .or_else(|| n.as_u64())
            .or_else(|| n.as_f64().map(|f| f.abs().trunc() as u64))
            .unwrap_or(0),
        Value::String(s) => leading_integer(s.trim()).unwrap_or(0),
        Value::Bool(b) => u64::from(*b),
        _ => 0,
    }
}

fn leading_integer(s: &str) -> Option<u64> {
    // 取绝对值，符号直接丢弃
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

/// 清洗 URL：去掉空白和控制字符；没有协议时补 `http://`；只接受 http/https
pub fn sanitize_url(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    if cleaned.is_empty() {
        return String::new();
    }
    match cleaned.split_once("://") {
        Some((scheme, _)) => {
            let scheme = scheme.to_ascii_lowercase();
            if scheme == "http" || scheme == "https" {
                cleaned
            } else {
                String::new()
            }
        }
        None if cleaned.starts_with("//") => format!("http:{}", cleaned),
        None if cleaned.contains(':') && !cleaned.contains('.') => String::new(),
        None => format!("http://{}", cleaned),
    }
}

/// 设置存储接口
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// 未保存过时返回默认设置
    async fn load(&self) -> Result<Settings>;
    async fn save(&self, settings: &Settings) -> Result<()>;
}

/// SQLite 设置存储
#[derive(Clone)]
pub struct SqliteSettingsStore {
    db: Pool<Sqlite>,
}

impl SqliteSettingsStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn load(&self) -> Result<Settings> {
        let row = sqlx::query("SELECT value FROM cdm_options WHERE name = ?")
            .bind(SETTINGS_OPTION_NAME)
            .fetch_optional(&self.db)
            .await
            .context("读取设置失败")?;
        match row {
            Some(row) => {
                let value: String = row.get("value");
                serde_json::from_str(&value).context("解析设置失败")
            }
            None => Ok(Settings::default()),
        }
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        let value = serde_json::to_string(settings).context("序列化设置失败")?;
        sqlx::query(
            r#"
            INSERT INTO cdm_options (name, value) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(SETTINGS_OPTION_NAME)
        .bind(value)
        .execute(&self.db)
        .await
        .context("保存设置失败")?;
        debug!("[CdmSettings] 设置已保存: cdm_url={}", settings.cdm_url);
        Ok(())
    }
}

/// 内存设置存储
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Option<Settings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(Some(settings)),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Settings> {
        match self.settings.lock() {
            Ok(guard) => Ok(guard.clone().unwrap_or_default()),
            Err(_) => bail!("设置锁已损坏"),
        }
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        match self.settings.lock() {
            Ok(mut guard) => {
                *guard = Some(settings.clone());
                Ok(())
            }
            Err(_) => bail!("设置锁已损坏"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdm::db::open_database;
    use serde_json::json;

    #[test]
    fn sanitize_applies_defaults_and_coercions() {
        let settings = Settings::sanitize(&json!({
            "cdm_url": "  cdm.example.edu/digital ",
            "items_per_page": "-15",
            "cache_duration": "abc",
        }));
        assert_eq!(settings.cdm_url, "http://cdm.example.edu/digital");
        assert_eq!(settings.items_per_page, 15);
        assert_eq!(settings.cache_duration, 0);
        assert!(!settings.enable_cache);

        let empty = Settings::sanitize(&json!({}));
        assert_eq!(empty.items_per_page, 20);
        assert_eq!(empty.cache_duration, 3600);
        assert_eq!(empty.cdm_url, "");
    }

    #[test]
    fn sanitize_url_rejects_other_schemes() {
        assert_eq!(sanitize_url("javascript:alert(1)"), "");
        assert_eq!(sanitize_url("ftp://files.example.org"), "");
        assert_eq!(
            sanitize_url("HTTPS://cdm.example.edu"),
            "HTTPS://cdm.example.edu"
        );
        assert_eq!(sanitize_url(""), "");
    }

    #[test]
    fn absint_handles_json_scalars() {
        assert_eq!(absint(&json!(42)), 42);
        assert_eq!(absint(&json!(-7)), 7);
        assert_eq!(absint(&json!("250 items")), 250);
        assert_eq!(absint(&json!(3.9)), 3);
        assert_eq!(absint(&json!(null)), 0);
    }

    #[tokio::test]
    async fn sqlite_settings_roundtrip() {
        let store = SqliteSettingsStore::new(open_database("sqlite::memory:").await.unwrap());
        assert_eq!(store.load().await.unwrap(), Settings::default());

        let settings = Settings {
            cdm_url: "https://cdm.example.edu".to_string(),
            ..Default::default()
        };
        store.save(&settings).await.unwrap();
        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await.unwrap(), settings);
    }
}
