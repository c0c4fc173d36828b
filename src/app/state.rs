// ==========================================
// 卫生机构数据交换引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 注册表构建一次后只读共享；数据库连接在各仓储间共享
// ==========================================

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::api::{ExportApi, ImportApi};
use crate::config::{ExchangeConfig, ExportConfigRegistry, ImportConfigRegistry};
use crate::db::{init_schema, open_sqlite_connection};
use crate::exporter::{ExportBuilder, ReportBuilder};
use crate::importer::{EntityImporter, FileAnalyzer};
use crate::repository::{RecordRepository, SqliteRecordRepository};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 运行时配置
    pub config: Arc<ExchangeConfig>,

    /// 实体导入配置注册表
    pub import_registry: Arc<ImportConfigRegistry>,

    /// 实体导出配置注册表
    pub export_registry: Arc<ExportConfigRegistry>,

    /// 记录仓储
    pub record_repo: Arc<dyn RecordRepository>,

    /// 导入API（分析 + 导入）
    pub import_api: Arc<ImportApi>,

    /// 导出API（导出 + 报表）
    pub export_api: Arc<ExportApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - config: 运行时配置（数据库路径、导出目录、下载前缀、匹配阈值）
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 构建实体配置注册表
    /// 2. 打开数据库并建表
    /// 3. 创建所有API实例
    pub fn new(config: ExchangeConfig) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", config.db_path);

        // ==========================================
        // 配置注册表
        // ==========================================
        let import_registry = Arc::new(
            ImportConfigRegistry::builtin().map_err(|e| format!("实体配置无效: {}", e))?,
        );
        let export_registry = Arc::new(ExportConfigRegistry::builtin(&import_registry));

        // ==========================================
        // 数据库
        // ==========================================
        if let Some(parent) = Path::new(&config.db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("无法创建数据库目录: {}", e))?;
            }
        }
        let conn = open_sqlite_connection(&config.db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn, &import_registry).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let record_repo: Arc<dyn RecordRepository> = Arc::new(
            SqliteRecordRepository::from_connection(conn, import_registry.clone()),
        );

        // ==========================================
        // API层
        // ==========================================
        let config = Arc::new(config);

        let importer = Arc::new(EntityImporter::new(
            import_registry.clone(),
            record_repo.clone(),
        ));
        let analyzer = FileAnalyzer::new(import_registry.clone(), config.entity_match_threshold);
        let import_api = Arc::new(ImportApi::new(importer, analyzer));

        let export_builder = ExportBuilder::new(
            import_registry.clone(),
            export_registry.clone(),
            record_repo.clone(),
            config.export_dir.clone(),
        );
        let report_builder = ReportBuilder::new(
            import_registry.clone(),
            export_registry.clone(),
            record_repo.clone(),
            config.export_dir.clone(),
        );
        let export_api = Arc::new(ExportApi::new(
            config.clone(),
            export_builder,
            report_builder,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            config,
            import_registry,
            export_registry,
            record_repo,
            import_api,
            export_api,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.config.db_path
    }
}
