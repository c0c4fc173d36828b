// ==========================================
// 卫生机构数据交换引擎 - 导入API
// ==========================================
// 职责: 封装文件分析与实体导入，请求/响应为前端约定的 camelCase 结构
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{ImportResult, RowError};
use crate::importer::{FileAnalysis, FileAnalyzer, ImportOptions, RecordImporter, SourceOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn default_true() -> bool {
    true
}

/// 导入请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    /// 目标实体（复数或单数名）
    pub entity: String,
    /// 源列 → 目标字段
    #[serde(default)]
    pub mappings: HashMap<String, String>,
    /// 首行是否为表头（默认 true）
    #[serde(default = "default_true")]
    pub has_header_row: bool,
    /// 表头之前跳过的行数
    #[serde(default)]
    pub skip_lines: usize,
}

/// 导入API响应
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResponse {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub created: usize,
    pub errors: Vec<RowError>,
}

impl From<ImportResult> for ImportResponse {
    fn from(result: ImportResult) -> Self {
        Self {
            total: result.total,
            valid: result.valid_count,
            invalid: result.invalid_count,
            created: result.created_count,
            errors: result.errors,
        }
    }
}

/// 文件分析请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub file_path: String,
    #[serde(default = "default_true")]
    pub has_header_row: bool,
}

/// 导入API
pub struct ImportApi {
    importer: Arc<dyn RecordImporter>,
    analyzer: FileAnalyzer,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(importer: Arc<dyn RecordImporter>, analyzer: FileAnalyzer) -> Self {
        Self { importer, analyzer }
    }

    /// 导入上传文件
    ///
    /// # 参数
    /// - file_path: 上传文件路径（导入结束后删除）
    /// - request: 实体与列映射
    ///
    /// # 返回
    /// - Ok(ImportResponse): 含行级错误明细
    /// - Err(ApiError): 配置错误 / 文件错误 / 整批回滚
    pub async fn import_file(
        &self,
        file_path: &str,
        request: &ImportRequest,
    ) -> ApiResult<ImportResponse> {
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }
        if request.entity.trim().is_empty() {
            return Err(ApiError::InvalidInput("实体类型不能为空".to_string()));
        }

        let mut options = ImportOptions::new(request.entity.trim(), request.mappings.clone());
        options.has_header_row = request.has_header_row;
        options.skip_lines = request.skip_lines;

        let result = self.importer.import_file(Path::new(file_path), &options).await?;
        info!(
            entity = %request.entity,
            total = result.total,
            created = result.created_count,
            "导入请求完成"
        );
        Ok(result.into())
    }

    /// 分析上传文件（表头、类型建议、实体建议、样例行）
    pub async fn analyze_file(&self, request: &AnalyzeRequest) -> ApiResult<FileAnalysis> {
        if request.file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }
        let options = SourceOptions {
            has_header_row: request.has_header_row,
            skip_lines: 0,
        };
        Ok(self.analyzer.analyze(Path::new(&request.file_path), &options)?)
    }
}
