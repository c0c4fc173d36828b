// ==========================================
// 卫生机构数据交换引擎 - 表头/实体匹配器
// ==========================================
// 职责: 规范化表头，按实体签名字段打分并建议目标实体
// 规则: 得分 = 命中签名字段数 / 签名字段总数
//       严格最高分胜出；平分时按签名表顺序取第一个
//       最高分低于阈值 → unknown
// 纯函数: 无副作用、无 I/O
// ==========================================

use crate::config::exchange_config::DEFAULT_MATCH_THRESHOLD;
use crate::domain::EntityKind;
use serde::Serialize;
use std::collections::HashSet;

/// 实体签名字段（顺序即 EntityKind::ALL 顺序）
pub fn signature_fields(entity: EntityKind) -> &'static [&'static str] {
    match entity {
        EntityKind::Patients => &["first_name", "last_name", "gender", "date_of_birth"],
        EntityKind::Births => &["mother_id", "birth_date", "gender", "weight"],
        EntityKind::Deaths => &["patient_id", "date_of_death", "cause_of_death"],
        EntityKind::Immunizations => &[
            "patient_id",
            "vaccine_type",
            "administration_date",
            "dose_number",
        ],
        EntityKind::AntenatalCare => &[
            "patient_id",
            "visit_date",
            "gestational_age_weeks",
            "visit_number",
        ],
        EntityKind::DiseaseSurveillance => {
            &["disease_name", "report_date", "status", "onset_date"]
        }
        EntityKind::FamilyPlanning => &["patient_id", "method", "start_date"],
        EntityKind::Facilities => &["facility_code", "name", "facility_type", "district"],
        EntityKind::Users => &["username", "email", "role"],
    }
}

/// 表头规范化: trim → 小写 → 空格/连字符/点 转 "_" → 合并连续 "_"
pub fn normalize_header(header: &str) -> String {
    let mapped: String = header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '-' | '.' | '\t' => '_',
            other => other,
        })
        .collect();

    let mut normalized = String::with_capacity(mapped.len());
    for c in mapped.chars() {
        if c == '_' && normalized.ends_with('_') {
            continue;
        }
        normalized.push(c);
    }
    normalized.trim_matches('_').to_string()
}

// ==========================================
// EntitySuggestion - 匹配结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntitySuggestion {
    Matched { entity: EntityKind, score: f64 },
    Unknown,
}

impl EntitySuggestion {
    /// 建议名（单数实体名或 "unknown"）
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitySuggestion::Matched { entity, .. } => entity.singular_name(),
            EntitySuggestion::Unknown => "unknown",
        }
    }

    pub fn entity(&self) -> Option<EntityKind> {
        match self {
            EntitySuggestion::Matched { entity, .. } => Some(*entity),
            EntitySuggestion::Unknown => None,
        }
    }
}

/// 单实体得分
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityScore {
    pub entity: EntityKind,
    pub score: f64,
}

/// 全部实体得分（签名表顺序）
pub fn score_entities(normalized_headers: &HashSet<String>) -> Vec<EntityScore> {
    EntityKind::ALL
        .iter()
        .map(|entity| {
            let signature = signature_fields(*entity);
            let hits = signature
                .iter()
                .filter(|field| normalized_headers.contains(**field))
                .count();
            EntityScore {
                entity: *entity,
                score: hits as f64 / signature.len() as f64,
            }
        })
        .collect()
}

/// 默认阈值下的实体建议
pub fn suggest_entity(normalized_headers: &HashSet<String>) -> EntitySuggestion {
    suggest_entity_with_threshold(normalized_headers, DEFAULT_MATCH_THRESHOLD)
}

pub fn suggest_entity_with_threshold(
    normalized_headers: &HashSet<String>,
    threshold: f64,
) -> EntitySuggestion {
    let mut best: Option<EntityScore> = None;
    for candidate in score_entities(normalized_headers) {
        // 严格大于才替换，保证平分时签名表靠前者胜出
        let better = match &best {
            Some(current) => candidate.score > current.score,
            None => true,
        };
        if better {
            best = Some(candidate);
        }
    }

    match best {
        Some(EntityScore { entity, score }) if score >= threshold && score > 0.0 => {
            EntitySuggestion::Matched { entity, score }
        }
        _ => EntitySuggestion::Unknown,
    }
}

/// 便捷入口: 原始表头 → 规范化集合
pub fn normalized_header_set<'a, I>(headers: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    headers.into_iter().map(|h| normalize_header(h)).collect()
}
