// ==========================================
// 卫生机构数据交换引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把各层错误归类为调用方可理解的类别
// 说明: 行级校验失败不是错误，随 ImportResponse.errors 返回
// ==========================================

use crate::config::ConfigError;
use crate::exporter::ExportError;
use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 导入/导出错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据导出失败: {0}")]
    ExportError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP 语义状态码（由外层路由直接使用）
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidInput(_) | ApiError::ImportError(_) | ApiError::ExportError(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::DatabaseError(_) | ApiError::InternalError(_) | ApiError::Other(_) => 500,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})", entity, id))
            }
            RepositoryError::UnknownField { .. } | RepositoryError::UnknownEntity(_) => {
                ApiError::InvalidInput(err.to_string())
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::UnsupportedEntity(_)
            | ImportError::UnmappedRequiredFields(_)
            | ImportError::UnknownTargetField { .. } => ApiError::InvalidInput(err.to_string()),
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("上传文件 {}", path)),
            ImportError::Persistence(repo_err) => {
                ApiError::DatabaseError(format!("导入已整体回滚: {}", repo_err))
            }
            ImportError::Other(err) => ApiError::Other(err),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

// ==========================================
// 从 ExportError 转换
// ==========================================
impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::UnsupportedEntity(_)
            | ExportError::UnknownField { .. }
            | ExportError::InvalidFilter { .. }
            | ExportError::UnsupportedReport(_)
            | ExportError::MissingParameter(_) => ApiError::InvalidInput(err.to_string()),
            ExportError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ExportError::Repository(repo_err) => repo_err.into(),
            ExportError::Other(err) => ApiError::Other(err),
            other => ApiError::ExportError(other.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
