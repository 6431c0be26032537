//! 导入结果模型

use serde::Serialize;

/// 一次导入的统计结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// 新建的记录数
    pub imported: usize,
    /// 更新的已有记录数
    pub updated: usize,
    /// 远程返回的记录数（含失败的）
    pub total: usize,
    /// 单条记录的失败信息
    pub errors: Vec<String>,
}

impl ImportSummary {
    pub fn written(&self) -> usize {
        self.imported + self.updated
    }
}

/// 多集合条目导入中单个集合的结果
#[derive(Debug, Clone, Serialize)]
pub struct CollectionImportOutcome {
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ImportSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 多集合条目导入报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchImportReport {
    /// 成功完成的集合数
    pub completed: usize,
    pub total: usize,
    pub outcomes: Vec<CollectionImportOutcome>,
}
