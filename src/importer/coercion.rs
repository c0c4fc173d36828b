// ==========================================
// 卫生机构数据交换引擎 - 类型推断与转换
// ==========================================
// 职责: 原始单元格字符串 → 强类型值
// 缺失值策略: 空/空白/缺失输入对任何类型都是"缺失"而非错误；
//            无法解析的非空输入对导入同样落为 null，
//            但 Coercion::Invalid 保留该区别供行校验器生成类型错误
// ==========================================

use crate::domain::{SemanticType, TypedValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// 布尔词表（大小写不敏感）
const TRUTHY: &[&str] = &["true", "yes", "y", "1"];
const FALSY: &[&str] = &["false", "no", "n", "0"];

/// 纯日期格式（按顺序尝试）
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%m/%d/%Y", "%d.%m.%Y"];

/// 日期时间格式（取日期部分）
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

// ==========================================
// Coercion - 单值转换结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    /// 输入为空/空白/缺失
    Missing,
    /// 转换成功
    Value(TypedValue),
    /// 非空但无法按声明类型解析
    Invalid { raw: String },
}

impl Coercion {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Coercion::Invalid { .. })
    }
}

/// 转换并保留"缺失/非法"区别
pub fn coerce_detailed(raw: Option<&str>, semantic_type: SemanticType) -> Coercion {
    let trimmed = match raw.map(str::trim) {
        None | Some("") => return Coercion::Missing,
        Some(s) => s,
    };

    let parsed = match semantic_type {
        SemanticType::String => Some(TypedValue::Text(trimmed.to_string())),
        SemanticType::Number => parse_number(trimmed).map(TypedValue::Number),
        SemanticType::Date => parse_date(trimmed).map(TypedValue::Date),
        SemanticType::Boolean => parse_bool(trimmed).map(TypedValue::Bool),
    };

    match parsed {
        Some(value) => Coercion::Value(value),
        None => Coercion::Invalid {
            raw: trimmed.to_string(),
        },
    }
}

/// 缺失值策略: Missing 与 Invalid 一律落为 None
pub fn apply_missing_value_policy(coercion: Coercion) -> Option<TypedValue> {
    match coercion {
        Coercion::Value(value) => Some(value),
        Coercion::Missing | Coercion::Invalid { .. } => None,
    }
}

/// 导入转换入口
pub fn coerce(raw: Option<&str>, semantic_type: SemanticType) -> Option<TypedValue> {
    apply_missing_value_policy(coerce_detailed(raw, semantic_type))
}

/// 数字: 去除千分位逗号；拒绝 NaN/inf
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    let lowered = raw.trim().to_lowercase();
    if TRUTHY.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSY.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// 通用日期解析（日期时间取日期部分）
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

// ==========================================
// 表头类型推断（仅用于文件分析建议）
// ==========================================
// 按 "_" 分段匹配，phone_number / id_number 这类编号列保持 string

const NUMBER_HINTS: &[&str] = &[
    "age", "count", "weight", "amount", "quantity", "dose", "score", "weeks", "hemoglobin",
];

pub fn infer_type_from_header(header: &str) -> SemanticType {
    let normalized = crate::importer::entity_matcher::normalize_header(header);
    let segments: Vec<&str> = normalized.split('_').filter(|s| !s.is_empty()).collect();

    if segments.iter().any(|s| *s == "date" || *s == "dob") || normalized.contains("date") {
        return SemanticType::Date;
    }
    if normalized.starts_with("is_") || normalized.starts_with("has_") {
        return SemanticType::Boolean;
    }
    if segments.iter().any(|s| NUMBER_HINTS.contains(s)) {
        return SemanticType::Number;
    }
    SemanticType::String
}
