// ==========================================
// 卫生机构数据交换引擎 - 导出模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导出/报表错误类型
#[derive(Error, Debug)]
pub enum ExportError {
    // ===== 请求错误 =====
    #[error("不支持的导出实体: {0}")]
    UnsupportedEntity(String),

    #[error("实体 {entity} 不存在字段: {field}")]
    UnknownField { entity: String, field: String },

    #[error("过滤条件无效 ({field}): {message}")]
    InvalidFilter { field: String, message: String },

    #[error("不支持的报表类型: {0}")]
    UnsupportedReport(String),

    #[error("报表参数缺失: {0}")]
    MissingParameter(String),

    #[error("引用的记录不存在: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ===== 写出错误 =====
    #[error("文件写入失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV 写入失败: {0}")]
    Csv(String),

    // ===== 数据读取错误 =====
    #[error("数据读取失败: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<csv::Error>
impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Csv(err.to_string())
    }
}

/// Result 类型别名
pub type ExportResult<T> = Result<T, ExportError>;
