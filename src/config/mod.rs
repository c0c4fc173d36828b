// ==========================================
// 卫生机构数据交换引擎 - 配置层
// ==========================================
// 职责: 实体导入/导出配置注册表 + 运行时配置
// 约束: 注册表进程启动时构建一次，之后只读共享
// ==========================================

pub mod entity_config;
pub mod error;
pub mod exchange_config;
pub mod export_registry;
pub mod import_registry;

// 重导出核心类型
pub use entity_config::{
    EntityConfigBuilder, EntityImportConfig, FieldDefinition, FieldRule, ForeignKeyRef,
};
pub use error::{ConfigError, ConfigResult};
pub use exchange_config::ExchangeConfig;
pub use export_registry::{
    EntityExportConfig, ExportConfigRegistry, DATE_FIELD_CANDIDATES, SYSTEM_FIELDS,
};
pub use import_registry::ImportConfigRegistry;
