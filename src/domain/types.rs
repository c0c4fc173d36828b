// ==========================================
// 卫生机构数据交换引擎 - 领域类型定义
// ==========================================
// 职责: 语义类型 / 强类型单元格值 / 导出格式
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 语义类型 (Semantic Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Number,
    Date,
    Boolean,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::String => "string",
            SemanticType::Number => "number",
            SemanticType::Date => "date",
            SemanticType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 强类型值 (Typed Value)
// ==========================================
// 缺失值统一以 Option::None 表示，不在此枚举中
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

impl TypedValue {
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            TypedValue::Text(_) => SemanticType::String,
            TypedValue::Number(_) => SemanticType::Number,
            TypedValue::Date(_) => SemanticType::Date,
            TypedValue::Bool(_) => SemanticType::Boolean,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            TypedValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 比较键（用于唯一性/外键预检的去重与缓存）
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Text(s) => write!(f, "{}", s),
            TypedValue::Number(n) => {
                // 整数值不带小数点输出
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            TypedValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            TypedValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl Serialize for TypedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TypedValue::Text(s) => serializer.serialize_str(s),
            TypedValue::Number(n) => serializer.serialize_f64(*n),
            TypedValue::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            TypedValue::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

// ==========================================
// 导出格式 (Export Format)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Excel,
    Pdf,
}

impl ExportFormat {
    /// 产物文件扩展名（Excel 为 SpreadsheetML 2003，Excel 可直接打开）
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xls",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "excel",
            ExportFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xls" | "xlsx" => Ok(ExportFormat::Excel),
            "pdf" => Ok(ExportFormat::Pdf),
            _ => Err(s.to_string()),
        }
    }
}
