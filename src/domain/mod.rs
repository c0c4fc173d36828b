// ==========================================
// 卫生机构数据交换引擎 - 领域模型层
// ==========================================
// 职责: 定义实体类型、强类型值、导入/导出记录结构
// 红线: 不含数据访问逻辑,不含管道逻辑
// ==========================================

pub mod entity;
pub mod record;
pub mod types;

// 重导出核心类型
pub use entity::EntityKind;
pub use record::{
    ExportArtifact, ExportJob, FieldValues, ImportResult, RawRow, ReportArtifact, RowError,
    StoredRecord, TransformedRow, ValidationOutcome,
};
pub use types::{ExportFormat, SemanticType, TypedValue};
