// ==========================================
// 卫生机构数据交换引擎 - 导入配置注册表
// ==========================================
// 职责: 进程启动时构建一次的只读实体配置表，按引用注入管道与编排器
// 说明: 内置配置覆盖全部 EntityKind（穷尽 match 保证新增实体时编译期提示）
// ==========================================

use crate::config::entity_config::EntityImportConfig;
use crate::config::error::ConfigResult;
use crate::domain::{EntityKind, SemanticType};
use std::collections::HashMap;

/// 常用格式约束
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
const PHONE_PATTERN: &str = r"^\+?[0-9][0-9 \-]{6,19}$";
const BLOOD_PRESSURE_PATTERN: &str = r"^\d{2,3}/\d{2,3}$";
const CODE_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_\-/]*$";

const GENDERS: &[&str] = &["male", "female", "other"];

// ==========================================
// ImportConfigRegistry - 导入配置注册表
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportConfigRegistry {
    configs: HashMap<EntityKind, EntityImportConfig>,
}

impl ImportConfigRegistry {
    /// 构建内置注册表（全部实体）
    pub fn builtin() -> ConfigResult<Self> {
        let configs = EntityKind::ALL
            .iter()
            .map(|kind| builtin_config(*kind))
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self::from_configs(configs))
    }

    /// 由自定义配置构建（测试/扩展）
    pub fn from_configs(configs: Vec<EntityImportConfig>) -> Self {
        Self {
            configs: configs.into_iter().map(|c| (c.entity, c)).collect(),
        }
    }

    pub fn get(&self, entity: EntityKind) -> Option<&EntityImportConfig> {
        self.configs.get(&entity)
    }

    /// 按实体名字符串查找（未知名称返回 None）
    pub fn resolve(&self, entity_name: &str) -> Option<&EntityImportConfig> {
        entity_name
            .parse::<EntityKind>()
            .ok()
            .and_then(|kind| self.get(kind))
    }

    /// 按签名表顺序遍历已注册实体
    pub fn iter(&self) -> impl Iterator<Item = &EntityImportConfig> {
        EntityKind::ALL
            .iter()
            .filter_map(move |kind| self.configs.get(kind))
    }
}

/// 内置实体配置
fn builtin_config(entity: EntityKind) -> ConfigResult<EntityImportConfig> {
    use SemanticType::{Boolean, Date, Number, String as Text};

    let builder = EntityImportConfig::builder(entity);
    let builder = match entity {
        EntityKind::Facilities => builder
            .field("facility_code", Text).required().unique().pattern(CODE_PATTERN)
            .field("name", Text).required()
            .field("facility_type", Text).required()
            .allowed(&["hospital", "health_center", "clinic", "dispensary", "laboratory"])
            .field("ownership", Text).allowed(&["public", "private", "faith_based", "ngo"])
            .field("district", Text)
            .field("region", Text)
            .field("phone_number", Text).pattern(PHONE_PATTERN)
            .field("email", Text).pattern(EMAIL_PATTERN)
            .field("bed_count", Number).range(Some(0.0), Some(5000.0))
            .field("is_active", Boolean),

        EntityKind::Patients => builder
            .field("first_name", Text).required()
            .field("last_name", Text).required()
            .field("gender", Text).required().allowed(GENDERS)
            .field("date_of_birth", Date).required()
            .field("national_id", Text).unique()
            .field("phone_number", Text).pattern(PHONE_PATTERN)
            .field("address", Text)
            .field("marital_status", Text)
            .allowed(&["single", "married", "divorced", "widowed"])
            .field("blood_group", Text)
            .allowed(&["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"])
            .field("facility_id", Number).references(EntityKind::Facilities, "id"),

        EntityKind::Births => builder
            .field("mother_id", Number).required().references(EntityKind::Patients, "id")
            .field("birth_date", Date).required()
            .field("gender", Text).required().allowed(GENDERS)
            .field("weight", Number).range(Some(0.3), Some(7.0))
            .field("delivery_type", Text).allowed(&["normal", "caesarean", "assisted"])
            .field("birth_certificate_number", Text).unique()
            .field("apgar_score", Number).range(Some(0.0), Some(10.0))
            .field("is_live_birth", Boolean)
            .field("facility_id", Number).references(EntityKind::Facilities, "id"),

        EntityKind::Deaths => builder
            .field("patient_id", Number).required().references(EntityKind::Patients, "id")
            .field("date_of_death", Date).required()
            .field("cause_of_death", Text).required()
            .field("place_of_death", Text).allowed(&["hospital", "home", "other"])
            .field("age_at_death", Number).range(Some(0.0), Some(130.0))
            .field("death_certificate_number", Text).unique()
            .field("facility_id", Number).references(EntityKind::Facilities, "id"),

        EntityKind::Immunizations => builder
            .field("patient_id", Number).required().references(EntityKind::Patients, "id")
            .field("vaccine_type", Text).required()
            .field("administration_date", Date).required()
            .field("dose_number", Number).range(Some(1.0), Some(10.0))
            .field("batch_number", Text)
            .field("administered_by", Text)
            .field("next_dose_date", Date)
            .field("facility_id", Number).references(EntityKind::Facilities, "id"),

        EntityKind::AntenatalCare => builder
            .field("patient_id", Number).required().references(EntityKind::Patients, "id")
            .field("visit_date", Date).required()
            .field("visit_number", Number).range(Some(1.0), Some(20.0))
            .field("gestational_age_weeks", Number).range(Some(0.0), Some(45.0))
            .field("blood_pressure", Text).pattern(BLOOD_PRESSURE_PATTERN)
            .field("weight", Number).range(Some(20.0), Some(250.0))
            .field("hemoglobin", Number).range(Some(0.0), Some(25.0))
            .field("hiv_status", Text).allowed(&["positive", "negative", "unknown"])
            .field("next_visit_date", Date)
            .field("facility_id", Number).references(EntityKind::Facilities, "id"),

        EntityKind::DiseaseSurveillance => builder
            .field("disease_name", Text).required()
            .field("report_date", Date).required()
            .field("onset_date", Date)
            .field("status", Text).required().allowed(&["suspected", "probable", "confirmed", "ruled_out"])
            .field("outcome", Text).allowed(&["recovered", "deceased", "ongoing", "unknown"])
            .field("age", Number).range(Some(0.0), Some(130.0))
            .field("is_outbreak", Boolean)
            .field("patient_id", Number).references(EntityKind::Patients, "id")
            .field("facility_id", Number).references(EntityKind::Facilities, "id"),

        EntityKind::FamilyPlanning => builder
            .field("patient_id", Number).required().references(EntityKind::Patients, "id")
            .field("method", Text).required()
            .allowed(&["pill", "injection", "implant", "iud", "condom", "natural", "sterilization"])
            .field("start_date", Date).required()
            .field("end_date", Date)
            .field("is_new_client", Boolean)
            .field("facility_id", Number).references(EntityKind::Facilities, "id"),

        EntityKind::Users => builder
            .field("username", Text).required().unique().pattern(r"^[A-Za-z0-9_.\-]{3,50}$")
            .field("email", Text).required().unique().pattern(EMAIL_PATTERN)
            .field("first_name", Text)
            .field("last_name", Text)
            .field("role", Text).required()
            .allowed(&["admin", "doctor", "nurse", "midwife", "data_clerk", "viewer"])
            .field("phone_number", Text).pattern(PHONE_PATTERN)
            .field("is_active", Boolean)
            .field("facility_id", Number).references(EntityKind::Facilities, "id"),
    };
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_entity() {
        let registry = ImportConfigRegistry::builtin().unwrap();
        for kind in EntityKind::ALL {
            assert!(registry.get(kind).is_some(), "缺少实体配置: {}", kind);
        }
        assert_eq!(registry.iter().count(), EntityKind::ALL.len());
    }

    #[test]
    fn test_resolve_by_name() {
        let registry = ImportConfigRegistry::builtin().unwrap();
        let config = registry.resolve("patients").unwrap();
        let required: Vec<&str> = config.required_fields().collect();
        assert_eq!(
            required,
            vec!["first_name", "last_name", "gender", "date_of_birth"]
        );
        assert!(registry.resolve("invoices").is_none());
    }

    #[test]
    fn test_foreign_keys_reference_registered_entities() {
        let registry = ImportConfigRegistry::builtin().unwrap();
        for config in registry.iter() {
            for (_, fk) in config.foreign_keys() {
                assert!(registry.get(fk.referenced_entity).is_some());
                assert_eq!(fk.referenced_field, "id");
            }
        }
    }
}
