// ==========================================
// 卫生机构数据交换引擎 - 导入模块错误类型
// ==========================================
// 说明: 行级校验失败不是错误（进入 ImportResult.errors）；
//       这里只有中止整个导入的配置/IO/持久化错误
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 配置错误 =====
    #[error("不支持的实体类型: {0}")]
    UnsupportedEntity(String),

    #[error("必填字段未映射: {}", .0.join(", "))]
    UnmappedRequiredFields(Vec<String>),

    #[error("映射目标字段不存在 (实体 {entity}): {field}")]
    UnknownTargetField { entity: String, field: String },

    // ===== 文件相关错误 =====
    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    // ===== 持久化错误（整批回滚）=====
    #[error("数据落库失败: {0}")]
    Persistence(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名（ImportResult 已用于导入汇总）
pub type ImportOutcome<T> = Result<T, ImportError>;
