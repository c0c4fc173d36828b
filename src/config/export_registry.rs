// ==========================================
// 卫生机构数据交换引擎 - 导出配置注册表
// ==========================================
// 职责: 每个实体的默认导出字段、列标签、日期过滤字段
// 说明: 未声明标签的字段按 snake_case → Title Case 生成
// ==========================================

use crate::config::import_registry::ImportConfigRegistry;
use crate::domain::{EntityKind, StoredRecord};
use std::collections::HashMap;

/// 系统列（所有实体表都有）
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at"];

/// 日期过滤字段候选（按顺序取第一个存在于实体模式中的字段）
pub const DATE_FIELD_CANDIDATES: &[&str] = &[
    "date",
    "visit_date",
    "administration_date",
    "report_date",
    "birth_date",
    "date_of_death",
    "start_date",
    "created_at",
];

// ==========================================
// EntityExportConfig - 实体导出配置
// ==========================================
#[derive(Debug, Clone)]
pub struct EntityExportConfig {
    pub entity: EntityKind,
    pub default_fields: Vec<String>,
    pub labels: HashMap<String, String>,
    pub date_field: Option<String>, // 覆盖候选列表
}

impl EntityExportConfig {
    pub fn label_for(&self, field: &str) -> String {
        self.labels
            .get(field)
            .cloned()
            .unwrap_or_else(|| humanize_field(field))
    }

    pub fn labels_for(&self, fields: &[String]) -> Vec<String> {
        fields.iter().map(|f| self.label_for(f)).collect()
    }

    /// 记录 → 输出列（按 fields 顺序）
    pub fn map_to_fields(&self, record: &StoredRecord, fields: &[String]) -> Vec<String> {
        fields
            .iter()
            .map(|field| match field.as_str() {
                "id" => record.id.to_string(),
                _ => record.display(field),
            })
            .collect()
    }
}

/// "vaccine_type" → "Vaccine Type"
pub fn humanize_field(field: &str) -> String {
    field
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ==========================================
// ExportConfigRegistry - 导出配置注册表
// ==========================================
#[derive(Debug, Clone)]
pub struct ExportConfigRegistry {
    configs: HashMap<EntityKind, EntityExportConfig>,
}

impl ExportConfigRegistry {
    /// 基于导入注册表构建（默认投影 = id + 全部业务字段 + created_at）
    pub fn builtin(imports: &ImportConfigRegistry) -> Self {
        let configs = imports
            .iter()
            .map(|import_config| {
                let entity = import_config.entity;
                let mut default_fields = vec!["id".to_string()];
                default_fields.extend(import_config.field_names().map(|s| s.to_string()));
                default_fields.push("created_at".to_string());

                let labels = builtin_labels(entity)
                    .iter()
                    .map(|(field, label)| (field.to_string(), label.to_string()))
                    .collect();

                let config = EntityExportConfig {
                    entity,
                    default_fields,
                    labels,
                    date_field: date_field_override(entity).map(|s| s.to_string()),
                };
                (entity, config)
            })
            .collect();
        Self { configs }
    }

    pub fn get(&self, entity: EntityKind) -> Option<&EntityExportConfig> {
        self.configs.get(&entity)
    }
}

/// 需要区别于通用写法的列标签
fn builtin_labels(entity: EntityKind) -> &'static [(&'static str, &'static str)] {
    match entity {
        EntityKind::Patients => &[
            ("id", "Patient ID"),
            ("date_of_birth", "Date of Birth"),
            ("national_id", "National ID"),
            ("facility_id", "Facility ID"),
        ],
        EntityKind::Births => &[
            ("id", "Birth ID"),
            ("mother_id", "Mother ID"),
            ("weight", "Weight (kg)"),
            ("apgar_score", "APGAR Score"),
            ("facility_id", "Facility ID"),
        ],
        EntityKind::Deaths => &[
            ("id", "Death ID"),
            ("patient_id", "Patient ID"),
            ("date_of_death", "Date of Death"),
            ("cause_of_death", "Cause of Death"),
            ("place_of_death", "Place of Death"),
            ("facility_id", "Facility ID"),
        ],
        EntityKind::Immunizations => &[
            ("id", "Immunization ID"),
            ("patient_id", "Patient ID"),
            ("administration_date", "Date Administered"),
            ("facility_id", "Facility ID"),
        ],
        EntityKind::AntenatalCare => &[
            ("id", "Visit ID"),
            ("patient_id", "Patient ID"),
            ("gestational_age_weeks", "Gestational Age (weeks)"),
            ("weight", "Weight (kg)"),
            ("hemoglobin", "Hemoglobin (g/dL)"),
            ("hiv_status", "HIV Status"),
            ("facility_id", "Facility ID"),
        ],
        EntityKind::DiseaseSurveillance => &[
            ("id", "Case ID"),
            ("patient_id", "Patient ID"),
            ("facility_id", "Facility ID"),
        ],
        EntityKind::FamilyPlanning => &[
            ("id", "Record ID"),
            ("patient_id", "Patient ID"),
            ("method", "FP Method"),
            ("facility_id", "Facility ID"),
        ],
        EntityKind::Facilities => &[
            ("id", "Facility ID"),
            ("facility_code", "Facility Code"),
            ("name", "Facility Name"),
        ],
        EntityKind::Users => &[("id", "User ID"), ("facility_id", "Facility ID")],
    }
}

fn date_field_override(entity: EntityKind) -> Option<&'static str> {
    match entity {
        // 患者按登记时间过滤，而不是出生日期
        EntityKind::Patients => Some("created_at"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TypedValue;
    use std::collections::BTreeMap;

    fn registry() -> ExportConfigRegistry {
        ExportConfigRegistry::builtin(&ImportConfigRegistry::builtin().unwrap())
    }

    #[test]
    fn test_humanize_field() {
        assert_eq!(humanize_field("vaccine_type"), "Vaccine Type");
        assert_eq!(humanize_field("dose_number"), "Dose Number");
        assert_eq!(humanize_field("name"), "Name");
    }

    #[test]
    fn test_label_override_and_fallback() {
        let registry = registry();
        let config = registry.get(EntityKind::Immunizations).unwrap();
        assert_eq!(config.label_for("patient_id"), "Patient ID");
        assert_eq!(config.label_for("vaccine_type"), "Vaccine Type");
    }

    #[test]
    fn test_default_fields_wrap_business_columns() {
        let registry = registry();
        let config = registry.get(EntityKind::Deaths).unwrap();
        assert_eq!(config.default_fields.first().map(|s| s.as_str()), Some("id"));
        assert_eq!(
            config.default_fields.last().map(|s| s.as_str()),
            Some("created_at")
        );
        assert!(config.default_fields.contains(&"cause_of_death".to_string()));
    }

    #[test]
    fn test_map_to_fields() {
        let registry = registry();
        let config = registry.get(EntityKind::Immunizations).unwrap();
        let mut values = BTreeMap::new();
        values.insert(
            "vaccine_type".to_string(),
            Some(TypedValue::Text("BCG".to_string())),
        );
        values.insert("dose_number".to_string(), Some(TypedValue::Number(1.0)));
        values.insert("batch_number".to_string(), None);
        let record = StoredRecord { id: 7, values };

        let fields = vec![
            "id".to_string(),
            "vaccine_type".to_string(),
            "dose_number".to_string(),
            "batch_number".to_string(),
        ];
        assert_eq!(
            config.map_to_fields(&record, &fields),
            vec!["7", "BCG", "1", ""]
        );
    }
}
