//! ContentDM 导入 CLI
//!
//! 非交互式 CLI：校验服务器地址、导入集合和条目、查看本地导入结果。
//! 所有管理操作都以已授权管理员身份经由操作注册表分发。

use anyhow::Result;
use cdm_explorer_core::cdm::admin::{
    ActionRegistry, ActionRequest, ActionResponse, AdminContext, ACTION_GET_IMPORT_STATUS,
    ACTION_IMPORT_COLLECTIONS, ACTION_IMPORT_ITEMS, ACTION_SAVE_SETTINGS, ACTION_VALIDATE_URL,
};
use cdm_explorer_core::cdm::config::{ExplorerConfig, DEFAULT_DB_URL};
use cdm_explorer_core::cdm::importer::{ImportListener, ImportSummary, DEFAULT_MAX_ITEMS};
use cdm_explorer_core::cdm::store::{CollectionQuery, ItemQuery, OrderBy, SortOrder};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// ContentDM 导入 CLI
#[derive(Parser, Debug)]
#[command(name = "cdm-cli")]
#[command(about = "ContentDM 导入工具 - 把数字馆藏同步到本地内容库", long_about = None)]
struct Args {
    /// SQLite 数据库地址
    #[arg(long, global = true, default_value = DEFAULT_DB_URL)]
    db: String,

    /// 单次请求超时（秒）
    #[arg(long, global = true, default_value = "15")]
    timeout: u64,

    /// 日志级别（默认: info,cdm_explorer_core=debug）
    #[arg(long, global = true, default_value = "info,cdm_explorer_core=debug")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 校验 ContentDM 地址，成功后保存到设置
    Validate { url: String },
    /// 导入全部集合
    ImportCollections,
    /// 导入单个集合的条目
    ImportItems {
        alias: String,
        #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
        max_items: usize,
    },
    /// 依次导入多个集合的条目
    ImportSelected {
        #[arg(required = true)]
        aliases: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
        max_items: usize,
    },
    /// 修改设置，只覆盖给出的字段
    Settings {
        #[arg(long)]
        cdm_url: Option<String>,
        #[arg(long)]
        items_per_page: Option<String>,
        #[arg(long)]
        enable_cache: Option<bool>,
        /// 秒
        #[arg(long)]
        cache_duration: Option<String>,
    },
    /// 本地集合数和条目数
    Status,
    /// 列出本地集合
    ListCollections {
        #[arg(long, value_enum, default_value_t = SortField::Title)]
        order_by: SortField,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// 列出本地条目
    ListItems {
        /// 按集合 alias 过滤
        #[arg(long)]
        alias: Option<String>,
        #[arg(long, value_enum, default_value_t = SortField::Date)]
        order_by: SortField,
        #[arg(long)]
        asc: bool,
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortField {
    Title,
    Date,
}

impl From<SortField> for OrderBy {
    fn from(field: SortField) -> Self {
        match field {
            SortField::Title => OrderBy::Title,
            SortField::Date => OrderBy::Date,
        }
    }
}

/// 初始化日志（同时输出到 stdout 和文件）
fn init_logger(log_level: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG（如果设置了），否则使用命令行参数
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    // 日志走 stderr，stdout 只输出 JSON 结果
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("[CLI] 📝 日志已同时输出到控制台和文件: debug.log");
    Ok(())
}

/// 导入进度输出
struct CliImportListener;

#[async_trait::async_trait]
impl ImportListener for CliImportListener {
    async fn on_import_started(&self, scope: String, total: usize) {
        info!("[CLI/Import] 🔄 {} 开始导入，共 {} 条", scope, total);
    }

    async fn on_record_imported(&self, scope: String, key: String, updated: bool) {
        info!(
            "[CLI/Import] {} {} {}",
            scope,
            key,
            if updated { "已更新" } else { "已新建" }
        );
    }

    async fn on_record_failed(&self, scope: String, message: String) {
        warn!("[CLI/Import] ⚠️ {} 单条失败: {}", scope, message);
    }

    async fn on_batch_progress(&self, alias: String, completed: usize, total: usize) {
        info!(
            "[CLI/Import] 📊 导入 {} ({}/{})...",
            alias,
            completed + 1,
            total
        );
    }

    async fn on_import_finished(&self, scope: String, summary: ImportSummary) {
        info!(
            "[CLI/Import] ✅ {} 完成: 新建 {}, 更新 {}, 失败 {}",
            scope,
            summary.imported,
            summary.updated,
            summary.errors.len()
        );
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_action(
    registry: &ActionRegistry,
    ctx: &AdminContext,
    request: ActionRequest,
) -> Result<()> {
    let response: ActionResponse = registry.dispatch(ctx, &request).await;
    if !response.success {
        error!(
            "[CLI] ❌ {} 失败: {}",
            request.action,
            response.message().unwrap_or_default()
        );
    }
    print_json(&response)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(&args.log_level)?;

    info!("[CLI] 🚀 ContentDM 导入工具");
    info!("[CLI] 🗄️  数据库: {}", args.db);

    let config =
        ExplorerConfig::new(args.db.clone()).with_timeout(Duration::from_secs(args.timeout));
    let ctx = AdminContext::open(&config).await?;
    let registry = ActionRegistry::default();

    match args.command {
        Command::Validate { url } => {
            let request = ActionRequest::trusted(ACTION_VALIDATE_URL).with_param("url", url);
            run_action(&registry, &ctx, request).await?;
        }
        Command::ImportCollections => {
            run_action(
                &registry,
                &ctx,
                ActionRequest::trusted(ACTION_IMPORT_COLLECTIONS),
            )
            .await?;
        }
        Command::ImportItems { alias, max_items } => {
            let request = ActionRequest::trusted(ACTION_IMPORT_ITEMS)
                .with_param("alias", alias)
                .with_param("max_items", max_items);
            run_action(&registry, &ctx, request).await?;
        }
        Command::ImportSelected { aliases, max_items } => {
            let importer = ctx
                .importer_with_listener(Arc::new(CliImportListener))
                .await?;
            let report = importer
                .import_selected_collections(&aliases, max_items)
                .await;
            info!(
                "[CLI] ✅ 完成！成功导入 {} 个集合",
                report.completed
            );
            print_json(&report)?;
        }
        Command::Settings {
            cdm_url,
            items_per_page,
            enable_cache,
            cache_duration,
        } => {
            let mut request = ActionRequest::trusted(ACTION_SAVE_SETTINGS);
            if let Some(url) = cdm_url {
                request = request.with_param("cdm_url", url);
            }
            if let Some(n) = items_per_page {
                request = request.with_param("items_per_page", n);
            }
            if let Some(enabled) = enable_cache {
                request = request.with_param("enable_cache", enabled);
            }
            if let Some(seconds) = cache_duration {
                request = request.with_param("cache_duration", seconds);
            }
            run_action(&registry, &ctx, request).await?;
        }
        Command::Status => {
            run_action(
                &registry,
                &ctx,
                ActionRequest::trusted(ACTION_GET_IMPORT_STATUS),
            )
            .await?;
        }
        Command::ListCollections {
            order_by,
            desc,
            limit,
        } => {
            let query = CollectionQuery {
                order_by: order_by.into(),
                order: if desc { SortOrder::Desc } else { SortOrder::Asc },
                limit,
            };
            print_json(&ctx.store.list_collections(&query).await?)?;
        }
        Command::ListItems {
            alias,
            order_by,
            asc,
            limit,
            offset,
        } => {
            let query = ItemQuery {
                alias,
                order_by: order_by.into(),
                order: if asc { SortOrder::Asc } else { SortOrder::Desc },
                limit: Some(limit),
                offset,
            };
            print_json(&ctx.store.list_items(&query).await?)?;
        }
    }

    Ok(())
}
