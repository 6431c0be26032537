pub mod cdm;

// 重新导出常用类型和函数，方便外部使用
pub use cdm::{
    admin::{ActionRegistry, ActionRequest, ActionResponse, AdminContext},
    api::{CdmApi, CdmTransport, ReqwestTransport},
    config::ExplorerConfig,
    error::{CdmError, CdmResult},
    importer::{CdmImporter, ImportListener, ImportSummary},
    settings::{Settings, SettingsStore},
    store::{ContentStore, MemoryContentStore, SqliteContentStore},
};

#[cfg(test)]
static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

#[cfg(test)]
pub(crate) fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::EnvFilter;

        // 测试中默认打开当前 crate 的 debug，关闭 sqlx 语句日志
        let filter_layer = EnvFilter::new("info,cdm_explorer_core=debug,sqlx=warn");

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_test_writer();

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    });
}
