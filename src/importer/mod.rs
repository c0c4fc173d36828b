// ==========================================
// 卫生机构数据交换引擎 - 导入层
// ==========================================
// 职责: 上传文件 → 分析 → 映射 → 校验 → 预检 → 落库
// 支持: CSV, Excel (.xlsx/.xls)
// ==========================================

// 模块声明
pub mod coercion;
pub mod conflict_handler;
pub mod entity_importer;
pub mod entity_matcher;
pub mod error;
pub mod field_mapper;
pub mod file_analyzer;
pub mod file_parser;
pub mod importer_trait;
pub mod pipeline;
pub mod row_validator;

// 重导出核心类型
pub use coercion::{apply_missing_value_policy, coerce, coerce_detailed, Coercion};
pub use conflict_handler::ConflictHandler as ConflictHandlerImpl;
pub use entity_importer::{EntityImporter, ImportOptions};
pub use entity_matcher::{normalize_header, suggest_entity, EntityScore, EntitySuggestion};
pub use error::{ImportError, ImportOutcome};
pub use field_mapper::{FieldMapping, ResolvedMapping};
pub use file_analyzer::{FileAnalysis, FileAnalyzer};
pub use file_parser::{open_row_source, CsvRowSource, ExcelRowSource, RowSource, SourceOptions};
pub use pipeline::{process, process_source, PipelineOutput};
pub use row_validator::SchemaRowValidator;

// 重导出 Trait 接口
pub use importer_trait::{ConflictHandler, RecordImporter, RowValidator};
