// ==========================================
// 卫生机构数据交换引擎 - 导出层
// ==========================================
// 职责: 实体导出 + 报表生成，渲染为 CSV / Excel / PDF 文件
// 约束: 产物文件名唯一，以 create_new 打开，从不覆盖已有产物
// ==========================================

pub mod artifact;
pub mod csv_renderer;
pub mod error;
pub mod export_builder;
pub mod pdf_renderer;
pub mod renderer;
pub mod report_builder;
pub mod spreadsheet_renderer;

// 重导出核心类型
pub use artifact::ArtifactWriter;
pub use error::{ExportError, ExportResult};
pub use export_builder::ExportBuilder;
pub use renderer::{renderer_for, ReportDocument, ReportSection, ReportTable, TableRenderer};
pub use report_builder::{ReportBuilder, ReportOptions, ReportType};
