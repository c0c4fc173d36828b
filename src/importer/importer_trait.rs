// ==========================================
// 卫生机构数据交换引擎 - 导入接口 Trait
// ==========================================
// 职责: 定义导入主接口与可替换组件接口（不包含实现）
// ==========================================

use crate::config::EntityImportConfig;
use crate::domain::{ImportResult, RawRow, TransformedRow, TypedValue, ValidationOutcome};
use crate::importer::entity_importer::ImportOptions;
use crate::importer::error::ImportOutcome;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// RecordImporter Trait
// ==========================================
// 用途: 实体数据导入主接口
// 实现者: EntityImporter
#[async_trait]
pub trait RecordImporter: Send + Sync {
    /// 导入单个上传文件
    ///
    /// # 返回
    /// - Ok(ImportResult): 行级错误作为数据返回
    /// - Err: 配置错误 / 文件错误 / 持久化失败（整批回滚）
    ///
    /// # 说明
    /// - 无论成功失败，上传文件都会被删除
    async fn import_file(&self, file_path: &Path, options: &ImportOptions)
        -> ImportOutcome<ImportResult>;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 单行校验（行已按映射改为目标字段键，值仍为原始字符串）
// 实现者: SchemaRowValidator
pub trait RowValidator: Send + Sync {
    /// 累积全部错误，不短路
    fn validate(&self, row: &RawRow, config: &EntityImportConfig) -> ValidationOutcome;
}

// ==========================================
// ConflictHandler Trait
// ==========================================
// 用途: 唯一字段冲突检测
// 实现者: ConflictHandler
pub trait ConflictHandler: Send + Sync {
    /// 同一文件内重复值
    ///
    /// # 返回
    /// - Vec<(行号, 值)>: 不包括第一次出现
    fn detect_duplicates(&self, rows: &[TransformedRow], field: &str) -> Vec<(usize, String)>;

    /// 已存在于库中的值
    fn detect_cross_batch_duplicates(
        &self,
        rows: &[TransformedRow],
        field: &str,
        existing: &[TypedValue],
    ) -> Vec<(usize, String)>;
}
