// ==========================================
// 卫生机构数据交换引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格数据导入/导出与报表生成（患者、出生、死亡、免疫、产前、疾病监测、计划生育、机构、用户）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 导出层 - 导出与报表
pub mod exporter;

// 配置层 - 实体配置与运行时配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    EntityKind, ExportArtifact, ExportFormat, ExportJob, ImportResult, ReportArtifact, RowError,
    SemanticType, TypedValue,
};

// 配置
pub use config::{ExchangeConfig, ExportConfigRegistry, ImportConfigRegistry};

// 导入/导出
pub use exporter::{ExportBuilder, ReportBuilder, ReportOptions, ReportType};
pub use importer::{EntityImporter, FileAnalyzer, ImportOptions, RecordImporter};

// API
pub use api::{ApiError, ExportApi, ImportApi};
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "卫生机构数据交换引擎";
