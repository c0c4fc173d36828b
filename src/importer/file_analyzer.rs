// ==========================================
// 卫生机构数据交换引擎 - 上传文件分析
// ==========================================
// 职责: 导入前预览 → 表头 / 规范化表头 / 类型建议 / 实体建议 / 样例行
// 说明: 不做校验、不落库；分析结果仅供用户确认映射
// ==========================================

use crate::config::ImportConfigRegistry;
use crate::domain::{RawRow, SemanticType};
use crate::importer::coercion::infer_type_from_header;
use crate::importer::entity_matcher::{
    normalize_header, score_entities, suggest_entity_with_threshold, EntityScore,
};
use crate::importer::error::ImportOutcome;
use crate::importer::file_parser::{open_row_source, SourceOptions};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// 预览样例行数
pub const SAMPLE_ROW_LIMIT: usize = 5;

// ==========================================
// FileAnalysis - 分析结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    pub headers: Vec<String>,
    pub normalized_headers: Vec<String>,
    pub suggested_types: BTreeMap<String, SemanticType>, // 原始表头 → 建议类型
    pub suggested_entity: String,                        // 单数实体名或 "unknown"
    pub entity_scores: Vec<EntityScore>,
    pub suggested_mappings: BTreeMap<String, String>, // 原始表头 → 建议实体的同名字段
    pub sample_rows: Vec<RawRow>,
    pub row_count: usize,
}

pub struct FileAnalyzer {
    registry: Arc<ImportConfigRegistry>,
    match_threshold: f64,
}

impl FileAnalyzer {
    pub fn new(registry: Arc<ImportConfigRegistry>, match_threshold: f64) -> Self {
        Self {
            registry,
            match_threshold,
        }
    }

    /// 分析上传文件
    ///
    /// # 说明
    /// - 读取全部行以统计 row_count，仅保留前 SAMPLE_ROW_LIMIT 行样例
    /// - 分析不删除文件（文件随后由导入使用）
    #[instrument(skip(self, options), fields(path = %path.display()))]
    pub fn analyze(&self, path: &Path, options: &SourceOptions) -> ImportOutcome<FileAnalysis> {
        let mut source = open_row_source(path, options)?;
        let headers = source.headers().to_vec();

        let mut sample_rows = Vec::new();
        let mut row_count = 0;
        for row in source.as_mut() {
            let row = row?;
            row_count += 1;
            if sample_rows.len() < SAMPLE_ROW_LIMIT {
                sample_rows.push(row);
            }
        }

        let normalized_headers: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let header_set: HashSet<String> = normalized_headers.iter().cloned().collect();

        let suggested_types = headers
            .iter()
            .map(|h| (h.clone(), infer_type_from_header(h)))
            .collect();

        let suggestion = suggest_entity_with_threshold(&header_set, self.match_threshold);
        let suggested_mappings = suggestion
            .entity()
            .and_then(|entity| self.registry.get(entity))
            .map(|config| {
                headers
                    .iter()
                    .zip(&normalized_headers)
                    .filter(|(_, normalized)| config.has_field(normalized))
                    .map(|(header, normalized)| (header.clone(), normalized.clone()))
                    .collect()
            })
            .unwrap_or_default();

        info!(
            columns = headers.len(),
            row_count = row_count,
            suggested_entity = suggestion.as_str(),
            "文件分析完成"
        );

        Ok(FileAnalysis {
            headers,
            normalized_headers,
            suggested_types,
            suggested_entity: suggestion.as_str().to_string(),
            entity_scores: score_entities(&header_set),
            suggested_mappings,
            sample_rows,
            row_count,
        })
    }
}
