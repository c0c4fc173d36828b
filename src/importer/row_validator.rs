// ==========================================
// 卫生机构数据交换引擎 - 行校验器实现
// ==========================================
// 职责: 必填 → 类型 → 范围 → 枚举 → 格式
// 规则: 同一行的全部问题一次性返回（不短路）
//       必填检查先于规则检查，两轮都按字段声明顺序
// ==========================================

use crate::config::{EntityImportConfig, FieldDefinition};
use crate::domain::{RawRow, SemanticType, TypedValue, ValidationOutcome};
use crate::importer::coercion::{coerce_detailed, Coercion};
use crate::importer::importer_trait::RowValidator;

pub struct SchemaRowValidator;

impl RowValidator for SchemaRowValidator {
    fn validate(&self, row: &RawRow, config: &EntityImportConfig) -> ValidationOutcome {
        let mut errors = Vec::new();

        for field in config.fields().iter().filter(|f| f.required) {
            if value_of(row, &field.name).is_none() {
                errors.push(format!("{} is required", field.name));
            }
        }

        for field in config.fields() {
            if let Some(raw) = value_of(row, &field.name) {
                check_field(field, raw, &mut errors);
            }
        }

        ValidationOutcome::from_errors(errors)
    }
}

/// 非空（trim 后）值
fn value_of<'a>(row: &'a RawRow, field: &str) -> Option<&'a str> {
    row.get(field).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn check_field(field: &FieldDefinition, raw: &str, errors: &mut Vec<String>) {
    let name = &field.name;
    let value = match coerce_detailed(Some(raw), field.semantic_type) {
        Coercion::Value(value) => value,
        Coercion::Invalid { .. } => {
            errors.push(format!("{} must be a valid {}", name, field.semantic_type));
            return;
        }
        Coercion::Missing => return,
    };

    let rule = &field.rule;
    if field.semantic_type == SemanticType::Number {
        if let Some(n) = value.as_f64() {
            if let Some(min) = rule.min.filter(|min| n < *min) {
                errors.push(format!("{} must be at least {}", name, TypedValue::Number(min)));
            }
            if let Some(max) = rule.max.filter(|max| n > *max) {
                errors.push(format!("{} must be at most {}", name, TypedValue::Number(max)));
            }
        }
    }

    if let Some(allowed) = &rule.allowed_values {
        if rule.canonical_value(raw).is_none() {
            errors.push(format!("{} must be one of: {}", name, allowed.join(", ")));
        }
    }

    if let Some(pattern) = &rule.pattern {
        if !pattern.is_match(raw) {
            errors.push(format!("{} has an invalid format", name));
        }
    }
}
