// ==========================================
// 卫生机构数据交换引擎 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供外层 HTTP 路由或命令行调用
// ==========================================

pub mod error;
pub mod export_api;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use export_api::{ExportApi, ExportRequest, ExportResponse, ReportRequest, ReportResponse};
pub use import_api::{AnalyzeRequest, ImportApi, ImportRequest, ImportResponse};
