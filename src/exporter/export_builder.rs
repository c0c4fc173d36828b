// ==========================================
// 卫生机构数据交换引擎 - 实体导出构建器
// ==========================================
// 流程: 解析过滤条件 → 解析投影字段 → 查询 → 映射为带标签的列 → 渲染 → 写出唯一文件
// 过滤: dateFrom/dateTo 作用于实体日期字段（实体覆盖 > 候选列表首个存在字段）
//       其他键为已知字段的等值过滤，值按字段类型转换
// ==========================================

use crate::config::{
    EntityExportConfig, EntityImportConfig, ExportConfigRegistry, ImportConfigRegistry,
    DATE_FIELD_CANDIDATES, SYSTEM_FIELDS,
};
use crate::domain::{EntityKind, ExportArtifact, ExportJob, TypedValue};
use crate::exporter::artifact::ArtifactWriter;
use crate::exporter::error::{ExportError, ExportResult};
use crate::exporter::renderer::{renderer_for, ReportDocument, ReportTable};
use crate::importer::coercion::{coerce_detailed, parse_date, Coercion};
use crate::repository::{RecordQuery, RecordRepository};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// 日期区间过滤键
pub const DATE_FROM_KEYS: &[&str] = &["dateFrom", "date_from"];
pub const DATE_TO_KEYS: &[&str] = &["dateTo", "date_to"];

/// 实体日期过滤字段: 导出配置覆盖 → 候选列表中首个存在于实体模式的字段
pub fn resolve_date_field(
    import_config: &EntityImportConfig,
    export_config: Option<&EntityExportConfig>,
) -> String {
    if let Some(field) = export_config.and_then(|c| c.date_field.clone()) {
        return field;
    }
    DATE_FIELD_CANDIDATES
        .iter()
        .find(|candidate| {
            import_config.has_field(candidate) || SYSTEM_FIELDS.contains(*candidate)
        })
        .map(|s| s.to_string())
        .unwrap_or_else(|| "created_at".to_string())
}

fn parse_date_filter(field: &str, raw: &str) -> ExportResult<NaiveDate> {
    parse_date(raw).ok_or_else(|| ExportError::InvalidFilter {
        field: field.to_string(),
        message: format!("无法解析日期: {}", raw),
    })
}

pub struct ExportBuilder {
    imports: Arc<ImportConfigRegistry>,
    exports: Arc<ExportConfigRegistry>,
    repo: Arc<dyn RecordRepository>,
    artifacts: ArtifactWriter,
}

impl ExportBuilder {
    pub fn new(
        imports: Arc<ImportConfigRegistry>,
        exports: Arc<ExportConfigRegistry>,
        repo: Arc<dyn RecordRepository>,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            imports,
            exports,
            repo,
            artifacts: ArtifactWriter::new(export_dir),
        }
    }

    fn configs(
        &self,
        entity: EntityKind,
    ) -> ExportResult<(&EntityImportConfig, &EntityExportConfig)> {
        let import_config = self
            .imports
            .get(entity)
            .ok_or_else(|| ExportError::UnsupportedEntity(entity.to_string()))?;
        let export_config = self
            .exports
            .get(entity)
            .ok_or_else(|| ExportError::UnsupportedEntity(entity.to_string()))?;
        Ok((import_config, export_config))
    }

    /// 过滤条件 → 查询
    pub fn build_query(
        &self,
        entity: EntityKind,
        filters: &BTreeMap<String, String>,
    ) -> ExportResult<RecordQuery> {
        let (import_config, export_config) = self.configs(entity)?;

        let mut query = RecordQuery::new();
        let mut date_from = None;
        let mut date_to = None;

        for (key, raw) in filters {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            if DATE_FROM_KEYS.contains(&key.as_str()) {
                date_from = Some(parse_date_filter(key, raw)?);
                continue;
            }
            if DATE_TO_KEYS.contains(&key.as_str()) {
                date_to = Some(parse_date_filter(key, raw)?);
                continue;
            }

            let value = if key == "id" {
                raw.parse::<i64>()
                    .map(|id| TypedValue::Number(id as f64))
                    .map_err(|_| ExportError::InvalidFilter {
                        field: key.clone(),
                        message: format!("无效的 id: {}", raw),
                    })?
            } else {
                let field = import_config
                    .field(key)
                    .ok_or_else(|| ExportError::UnknownField {
                        entity: entity.to_string(),
                        field: key.clone(),
                    })?;
                match coerce_detailed(Some(raw), field.semantic_type) {
                    Coercion::Value(TypedValue::Text(text)) => TypedValue::Text(
                        field
                            .rule
                            .canonical_value(&text)
                            .map(|s| s.to_string())
                            .unwrap_or(text),
                    ),
                    Coercion::Value(value) => value,
                    Coercion::Missing => continue,
                    Coercion::Invalid { raw } => {
                        return Err(ExportError::InvalidFilter {
                            field: key.clone(),
                            message: format!("{} 不是有效的 {}", raw, field.semantic_type),
                        })
                    }
                }
            };
            query = query.with_equals(key, value);
        }

        let date_field = resolve_date_field(import_config, Some(export_config));
        Ok(query.with_date_range(&date_field, date_from, date_to))
    }

    /// 投影字段（空 → 默认字段；未知字段报错）
    pub fn resolve_fields(&self, entity: EntityKind, fields: &[String]) -> ExportResult<Vec<String>> {
        let (import_config, export_config) = self.configs(entity)?;
        if fields.is_empty() {
            return Ok(export_config.default_fields.clone());
        }
        fields
            .iter()
            .map(|field| {
                let field = field.trim();
                if import_config.has_field(field) || SYSTEM_FIELDS.contains(&field) {
                    Ok(field.to_string())
                } else {
                    Err(ExportError::UnknownField {
                        entity: entity.to_string(),
                        field: field.to_string(),
                    })
                }
            })
            .collect()
    }

    /// 导出实体记录为指定格式文件
    #[instrument(skip(self, job), fields(entity = %job.entity, format = %job.format))]
    pub async fn export_to_format(&self, job: &ExportJob) -> ExportResult<ExportArtifact> {
        let (_, export_config) = self.configs(job.entity)?;

        // === 步骤 1: 解析过滤条件与投影 ===
        debug!("步骤 1: 解析过滤条件与投影");
        let query = self.build_query(job.entity, &job.filters)?;
        let fields = self.resolve_fields(job.entity, &job.fields)?;

        // === 步骤 2: 查询记录 ===
        debug!("步骤 2: 查询记录");
        let records = self.repo.query_records(job.entity, &query).await?;

        // === 步骤 3: 映射为输出列 ===
        debug!("步骤 3: 映射为输出列");
        let mut table = ReportTable::new(export_config.labels_for(&fields));
        for record in &records {
            table.push_row(export_config.map_to_fields(record, &fields));
        }
        let document = ReportDocument::single_table(job.entity.display_name(), table);

        // === 步骤 4: 渲染并写出 ===
        debug!("步骤 4: 渲染并写出");
        let renderer = renderer_for(job.format);
        let prefix = format!("{}_export", job.entity.as_str());
        let (file_path, file_name) = self
            .artifacts
            .write_new(&prefix, job.format.extension(), |out| {
                renderer.render(&document, out)
            })?;

        info!(file = %file_name, record_count = records.len(), "导出完成");
        Ok(ExportArtifact {
            file_path,
            file_name,
            record_count: records.len(),
        })
    }
}
