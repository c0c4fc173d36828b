// ==========================================
// 卫生机构数据交换引擎 - 导入/导出记录结构
// ==========================================
// 职责: 管道中流转的行结构、校验结果、导入汇总、导出任务
// 生命周期: RawRow/TransformedRow 仅存在于单次导入请求内
// ==========================================

use crate::domain::entity::EntityKind;
use crate::domain::types::{ExportFormat, TypedValue};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// 原始行（原始表头 → 字符串值）
pub type RawRow = HashMap<String, String>;

/// 字段值集合（目标字段 → 强类型值，None 为缺失）
pub type FieldValues = BTreeMap<String, Option<TypedValue>>;

// ==========================================
// TransformedRow - 映射 + 类型转换后的行
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRow {
    pub row_number: usize,                            // 1 起始的数据行序号
    pub values: FieldValues,                          // 目标字段 → 强类型值
    pub original: RawRow,                             // 原始行（预检降级时回填错误列表）
}

impl TransformedRow {
    pub fn get(&self, field: &str) -> Option<&TypedValue> {
        self.values.get(field).and_then(|v| v.as_ref())
    }
}

// ==========================================
// ValidationOutcome - 单行校验结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

// ==========================================
// RowError - 行级错误（校验失败或预检降级）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub original: RawRow,
    pub errors: Vec<String>,
}

// ==========================================
// ImportResult - 单次导入汇总
// ==========================================
// 不变量: valid_count + invalid_count == total（按行校验结果）
//         created_count <= valid_count（预检降级的行计入 valid，但进入 errors）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub total: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub created_count: usize,
    pub errors: Vec<RowError>,
}

// ==========================================
// StoredRecord - 已落库记录（导出/报表读取）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    pub values: FieldValues,
}

impl StoredRecord {
    pub fn get(&self, field: &str) -> Option<&TypedValue> {
        self.values.get(field).and_then(|v| v.as_ref())
    }

    /// 字段展示文本（缺失为空串）
    pub fn display(&self, field: &str) -> String {
        self.get(field).map(|v| v.to_string()).unwrap_or_default()
    }
}

// ==========================================
// ExportJob - 导出任务
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    pub entity: EntityKind,
    pub filters: BTreeMap<String, String>, // dateFrom/dateTo 为日期区间约定，其余为等值过滤
    pub fields: Vec<String>,               // 为空时使用实体默认投影
    pub format: ExportFormat,
}

// ==========================================
// 导出产物
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub file_path: PathBuf,
    pub file_name: String,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportArtifact {
    pub file_path: PathBuf,
    pub file_name: String,
    pub section_count: usize,
}
