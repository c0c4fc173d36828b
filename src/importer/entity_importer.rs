// ==========================================
// 卫生机构数据交换引擎 - 实体导入编排器
// ==========================================
// 职责: 整合导入流程，从上传文件到数据库
// 流程: 配置查找 → 映射检查 → 流式校验/转换 → 唯一性预检 → 外键预检 → 单事务落库 → 删除上传文件
// 规则: 行级问题作为数据返回；配置/文件/持久化问题作为错误返回
//       valid/invalid 按行校验结果计数，total = valid + invalid
//       预检降级的行仍计入 valid，但进入 errors 且不落库，因此 created <= valid
//       持久化失败整批回滚，created_count 不会部分计入
// ==========================================

use crate::config::{EntityImportConfig, ImportConfigRegistry};
use crate::domain::{EntityKind, FieldValues, ImportResult, RowError, TransformedRow, TypedValue};
use crate::importer::conflict_handler::ConflictHandler as DefaultConflictHandler;
use crate::importer::error::{ImportError, ImportOutcome};
use crate::importer::field_mapper::FieldMapping;
use crate::importer::file_parser::{open_row_source, SourceOptions};
use crate::importer::importer_trait::{ConflictHandler, RecordImporter, RowValidator};
use crate::importer::pipeline::{process_source, PipelineOutput};
use crate::importer::row_validator::SchemaRowValidator;
use crate::repository::RecordRepository;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ==========================================
// ImportOptions - 单次导入参数
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    pub entity: String,                    // 实体名（复数/单数均可）
    pub mappings: HashMap<String, String>, // 源列 → 目标字段
    pub has_header_row: bool,
    pub skip_lines: usize,
}

impl ImportOptions {
    pub fn new(entity: &str, mappings: HashMap<String, String>) -> Self {
        Self {
            entity: entity.to_string(),
            mappings,
            has_header_row: true,
            skip_lines: 0,
        }
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            has_header_row: self.has_header_row,
            skip_lines: self.skip_lines,
        }
    }
}

// 外键查询缓存键: (被引用实体, 被引用字段, 值)
type ReferenceKey = (EntityKind, String, String);

// ==========================================
// EntityImporter - 导入编排器实现
// ==========================================
pub struct EntityImporter {
    registry: Arc<ImportConfigRegistry>,
    repo: Arc<dyn RecordRepository>,

    // 导入组件
    validator: Box<dyn RowValidator>,
    conflict_handler: Box<dyn ConflictHandler>,
}

impl EntityImporter {
    /// 使用默认组件创建
    pub fn new(registry: Arc<ImportConfigRegistry>, repo: Arc<dyn RecordRepository>) -> Self {
        Self::with_components(
            registry,
            repo,
            Box::new(SchemaRowValidator),
            Box::new(DefaultConflictHandler),
        )
    }

    /// 指定校验器与冲突处理器
    pub fn with_components(
        registry: Arc<ImportConfigRegistry>,
        repo: Arc<dyn RecordRepository>,
        validator: Box<dyn RowValidator>,
        conflict_handler: Box<dyn ConflictHandler>,
    ) -> Self {
        Self {
            registry,
            repo,
            validator,
            conflict_handler,
        }
    }

    async fn run_import(
        &self,
        file_path: &Path,
        options: &ImportOptions,
    ) -> ImportOutcome<ImportResult> {
        // === 步骤 1: 查找实体配置 ===
        debug!("步骤 1: 查找实体配置");
        let config = self
            .registry
            .resolve(&options.entity)
            .ok_or_else(|| ImportError::UnsupportedEntity(options.entity.clone()))?;

        // === 步骤 2: 映射覆盖检查（不打开文件） ===
        debug!("步骤 2: 映射覆盖检查");
        let mapping = FieldMapping::new(options.mappings.clone());
        mapping.ensure_covers(config)?;

        // === 步骤 3: 流式解析 + 校验 + 转换 ===
        debug!("步骤 3: 流式解析/校验/转换");
        let output = self.parse_rows(file_path, options, &mapping, config)?;
        info!(
            total = output.total,
            valid = output.valid.len(),
            invalid = output.invalid.len(),
            "行校验完成"
        );

        let PipelineOutput {
            valid,
            mut invalid,
            total,
        } = output;
        let valid_count = valid.len();
        let invalid_count = invalid.len();

        // === 步骤 4: 唯一性预检 ===
        debug!("步骤 4: 唯一性预检");
        let mut demoted: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        self.check_unique_fields(config, &valid, &mut demoted).await?;

        // === 步骤 5: 外键预检 ===
        debug!("步骤 5: 外键预检");
        self.check_foreign_keys(config, &valid, &mut demoted).await?;

        if !demoted.is_empty() {
            info!(count = demoted.len(), "预检降级行数");
        }

        let mut insertable: Vec<FieldValues> = Vec::with_capacity(valid.len());
        for row in valid {
            match demoted.remove(&row.row_number) {
                Some(errors) => invalid.push(RowError {
                    row: row.row_number,
                    original: row.original,
                    errors,
                }),
                None => insertable.push(row.values),
            }
        }
        invalid.sort_by_key(|e| e.row);

        // === 步骤 6: 单事务批量落库 ===
        debug!("步骤 6: 批量落库");
        let created_count = if insertable.is_empty() {
            0
        } else {
            self.repo.bulk_insert(config.entity, &insertable).await?
        };
        info!(entity = %config.entity, created = created_count, "批量落库完成");

        Ok(ImportResult {
            total,
            valid_count,
            invalid_count,
            created_count,
            errors: invalid,
        })
    }

    /// 同步解析（行源不跨越 await）
    fn parse_rows(
        &self,
        file_path: &Path,
        options: &ImportOptions,
        mapping: &FieldMapping,
        config: &EntityImportConfig,
    ) -> ImportOutcome<PipelineOutput<TransformedRow>> {
        let mut source = open_row_source(file_path, &options.source_options())?;
        let resolved = mapping.resolve(source.headers());

        process_source(
            source.as_mut(),
            |raw| self.validator.validate(&resolved.apply(raw), config),
            |raw, row_number| resolved.transform(raw, row_number, config),
        )
    }

    async fn check_unique_fields(
        &self,
        config: &EntityImportConfig,
        rows: &[TransformedRow],
        demoted: &mut BTreeMap<usize, Vec<String>>,
    ) -> ImportOutcome<()> {
        for field in config.unique_fields() {
            let mut seen = HashSet::new();
            let candidates: Vec<TypedValue> = rows
                .iter()
                .filter_map(|row| row.get(field))
                .filter(|value| seen.insert(value.key()))
                .cloned()
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let existing = self
                .repo
                .find_existing_values(config.entity, field, &candidates)
                .await?;

            let mut conflicts = self
                .conflict_handler
                .detect_cross_batch_duplicates(rows, field, &existing);
            conflicts.extend(self.conflict_handler.detect_duplicates(rows, field));

            for (row_number, value) in conflicts {
                push_unique(
                    demoted.entry(row_number).or_default(),
                    format!("{} '{}' already exists", field, value),
                );
            }
        }
        Ok(())
    }

    async fn check_foreign_keys(
        &self,
        config: &EntityImportConfig,
        rows: &[TransformedRow],
        demoted: &mut BTreeMap<usize, Vec<String>>,
    ) -> ImportOutcome<()> {
        let mut cache: HashMap<ReferenceKey, bool> = HashMap::new();

        for row in rows {
            for (field, reference) in config.foreign_keys() {
                let Some(value) = row.get(field) else {
                    continue;
                };
                let key = (
                    reference.referenced_entity,
                    reference.referenced_field.clone(),
                    value.key(),
                );
                let exists = match cache.get(&key) {
                    Some(exists) => *exists,
                    None => {
                        let exists = self
                            .repo
                            .exists(
                                reference.referenced_entity,
                                &reference.referenced_field,
                                value,
                            )
                            .await?;
                        cache.insert(key, exists);
                        exists
                    }
                };

                if !exists {
                    push_unique(
                        demoted.entry(row.row_number).or_default(),
                        format!(
                            "{} references a non-existent {}.{} ({})",
                            field,
                            reference.referenced_entity.table_name(),
                            reference.referenced_field,
                            value
                        ),
                    );
                }
            }
        }

        debug!(lookups = cache.len(), "外键查询完成");
        Ok(())
    }
}

fn push_unique(errors: &mut Vec<String>, message: String) {
    if !errors.contains(&message) {
        errors.push(message);
    }
}

/// 删除上传文件（失败只记录日志）
fn remove_upload(file_path: &Path) {
    match std::fs::remove_file(file_path) {
        Ok(()) => debug!(path = %file_path.display(), "上传文件已删除"),
        Err(e) => warn!(path = %file_path.display(), error = %e, "上传文件删除失败"),
    }
}

#[async_trait]
impl RecordImporter for EntityImporter {
    #[instrument(skip(self, options), fields(entity = %options.entity))]
    async fn import_file(
        &self,
        file_path: &Path,
        options: &ImportOptions,
    ) -> ImportOutcome<ImportResult> {
        info!(file_path = %file_path.display(), "开始导入");

        let result = self.run_import(file_path, options).await;

        // === 步骤 7: 清理上传文件（成功/失败都执行） ===
        debug!("步骤 7: 清理上传文件");
        remove_upload(file_path);

        match &result {
            Ok(summary) => info!(
                total = summary.total,
                valid = summary.valid_count,
                invalid = summary.invalid_count,
                created = summary.created_count,
                "导入完成"
            ),
            Err(e) => warn!(error = %e, "导入失败"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::repository::SqliteRecordRepository;
    use rusqlite::Connection;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    fn setup() -> EntityImporter {
        let registry = Arc::new(ImportConfigRegistry::builtin().unwrap());
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, &registry).unwrap();
        let repo = SqliteRecordRepository::from_connection(
            Arc::new(Mutex::new(conn)),
            registry.clone(),
        );
        EntityImporter::new(registry, Arc::new(repo))
    }

    fn csv_upload(lines: &[&str]) -> NamedTempFile {
        let mut temp_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(temp_file, "{}", line).unwrap();
        }
        temp_file
    }

    fn identity(fields: &[&str]) -> HashMap<String, String> {
        fields
            .iter()
            .map(|f| (f.to_string(), f.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_unsupported_entity() {
        let importer = setup();
        let file = csv_upload(&["a,b", "1,2"]);
        let result = importer
            .import_file(file.path(), &ImportOptions::new("invoices", HashMap::new()))
            .await;
        assert!(matches!(result, Err(ImportError::UnsupportedEntity(_))));
    }

    #[tokio::test]
    async fn test_unmapped_required_fails_and_removes_upload() {
        let importer = setup();
        let file = csv_upload(&["first_name", "Asha"]);
        let path = file.path().to_path_buf();
        let result = importer
            .import_file(
                &path,
                &ImportOptions::new("patients", identity(&["first_name"])),
            )
            .await;
        assert!(matches!(
            result,
            Err(ImportError::UnmappedRequiredFields(_))
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_duplicate_codes_demoted() {
        let importer = setup();
        let file = csv_upload(&[
            "facility_code,name,facility_type",
            "HF-001,Mnazi Mmoja,hospital",
            "HF-002,Kivunge,health_center",
            "HF-001,Duplicate,clinic",
        ]);
        let result = importer
            .import_file(
                file.path(),
                &ImportOptions::new(
                    "facilities",
                    identity(&["facility_code", "name", "facility_type"]),
                ),
            )
            .await
            .unwrap();

        assert_eq!(result.total, 3);
        assert_eq!(result.created_count, 2);
        assert_eq!(result.invalid_count, 1);
        assert_eq!(result.errors[0].row, 3);
        assert_eq!(
            result.errors[0].errors,
            vec!["facility_code 'HF-001' already exists"]
        );
    }
}
