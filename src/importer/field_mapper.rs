// ==========================================
// 卫生机构数据交换引擎 - 字段映射器实现
// ==========================================
// 职责: 源列 → 目标字段映射 + 类型转换
// 规则: 映射必须覆盖全部必填字段，目标字段必须属于实体
//       源列先按原样匹配表头，再按规范化表头匹配
//       多个源列映射到同一目标时取第一个非空值
// ==========================================

use crate::config::EntityImportConfig;
use crate::domain::{RawRow, TransformedRow, TypedValue};
use crate::importer::coercion::coerce;
use crate::importer::entity_matcher::normalize_header;
use crate::importer::error::{ImportError, ImportOutcome};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

// ==========================================
// FieldMapping - 用户提交的映射
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    entries: Vec<(String, String)>, // (源列, 目标字段)，按源列排序保证确定性
}

impl FieldMapping {
    /// 空目标视为"不导入该列"
    pub fn new(mappings: HashMap<String, String>) -> Self {
        let mut entries: Vec<(String, String)> = mappings
            .into_iter()
            .map(|(source, target)| (source.trim().to_string(), target.trim().to_string()))
            .filter(|(source, target)| !source.is_empty() && !target.is_empty())
            .collect();
        entries.sort();
        Self { entries }
    }

    /// 源列与目标字段同名（表头已是目标字段名时）
    pub fn identity<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::new(
            fields
                .into_iter()
                .map(|f| (f.to_string(), f.to_string()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, target)| target.as_str())
    }

    /// 映射覆盖检查（在打开文件之前调用）
    ///
    /// # 返回
    /// - Err(UnmappedRequiredFields): 必填字段未映射（按声明顺序列出）
    /// - Err(UnknownTargetField): 目标字段不属于实体
    pub fn ensure_covers(&self, config: &EntityImportConfig) -> ImportOutcome<()> {
        let unmapped: Vec<String> = config
            .required_fields()
            .filter(|field| !self.targets().any(|t| t == *field))
            .map(|field| field.to_string())
            .collect();
        if !unmapped.is_empty() {
            return Err(ImportError::UnmappedRequiredFields(unmapped));
        }

        if let Some(unknown) = self.targets().find(|t| !config.has_field(t)) {
            return Err(ImportError::UnknownTargetField {
                entity: config.entity.to_string(),
                field: unknown.to_string(),
            });
        }
        Ok(())
    }

    /// 绑定到实际表头
    pub fn resolve(&self, headers: &[String]) -> ResolvedMapping {
        let normalized: HashMap<String, &String> =
            headers.iter().map(|h| (normalize_header(h), h)).collect();

        let mut pairs = Vec::with_capacity(self.entries.len());
        for (source, target) in &self.entries {
            let header = headers
                .iter()
                .find(|h| *h == source)
                .or_else(|| normalized.get(&normalize_header(source)).copied());
            match header {
                Some(header) => pairs.push((header.clone(), target.clone())),
                None => warn!(source = %source, target = %target, "映射源列在文件中不存在"),
            }
        }
        ResolvedMapping { pairs }
    }
}

// ==========================================
// ResolvedMapping - 已绑定表头的映射
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMapping {
    pairs: Vec<(String, String)>, // (实际表头, 目标字段)
}

impl ResolvedMapping {
    /// 原始行 → 目标字段键的原始行（值仍为字符串）
    pub fn apply(&self, raw: &RawRow) -> RawRow {
        let mut mapped = RawRow::new();
        for (header, target) in &self.pairs {
            let value = raw.get(header).map(|v| v.trim()).unwrap_or("");
            let current_empty = mapped.get(target).map_or(true, |v: &String| v.is_empty());
            if current_empty {
                mapped.insert(target.clone(), value.to_string());
            }
        }
        mapped
    }

    /// 原始行 → 强类型行（枚举值统一为配置中的规范写法）
    pub fn transform(
        &self,
        raw: &RawRow,
        row_number: usize,
        config: &EntityImportConfig,
    ) -> TransformedRow {
        let mapped = self.apply(raw);
        let mut values = BTreeMap::new();

        for (target, value) in &mapped {
            let Some(field) = config.field(target) else {
                continue;
            };
            let typed = coerce(Some(value), field.semantic_type).map(|typed| match typed {
                TypedValue::Text(text) => {
                    let canonical = field.rule.canonical_value(&text).map(|s| s.to_string());
                    TypedValue::Text(canonical.unwrap_or(text))
                }
                other => other,
            });
            values.insert(target.clone(), typed);
        }

        TransformedRow {
            row_number,
            values,
            original: raw.clone(),
        }
    }
}
