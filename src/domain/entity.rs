// ==========================================
// 卫生机构数据交换引擎 - 实体类型
// ==========================================
// 职责: 导入/导出目标实体的封闭枚举
// 约束: 所有按实体分派的逻辑使用穷尽 match，不做字符串反射查找
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// EntityKind - 实体类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Patients,
    Births,
    Deaths,
    Immunizations,
    AntenatalCare,
    DiseaseSurveillance,
    FamilyPlanning,
    Facilities,
    Users,
}

impl EntityKind {
    /// 全部实体（顺序即签名表顺序，也是实体匹配的平局裁决顺序）
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Patients,
        EntityKind::Births,
        EntityKind::Deaths,
        EntityKind::Immunizations,
        EntityKind::AntenatalCare,
        EntityKind::DiseaseSurveillance,
        EntityKind::FamilyPlanning,
        EntityKind::Facilities,
        EntityKind::Users,
    ];

    /// 实体标识（复数形式，同时作为表名）
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Patients => "patients",
            EntityKind::Births => "births",
            EntityKind::Deaths => "deaths",
            EntityKind::Immunizations => "immunizations",
            EntityKind::AntenatalCare => "antenatal_care",
            EntityKind::DiseaseSurveillance => "disease_surveillance",
            EntityKind::FamilyPlanning => "family_planning",
            EntityKind::Facilities => "facilities",
            EntityKind::Users => "users",
        }
    }

    /// 数据库表名
    pub fn table_name(&self) -> &'static str {
        self.as_str()
    }

    /// 单数形式（实体匹配器返回的建议名）
    pub fn singular_name(&self) -> &'static str {
        match self {
            EntityKind::Patients => "patient",
            EntityKind::Births => "birth",
            EntityKind::Deaths => "death",
            EntityKind::Immunizations => "immunization",
            EntityKind::AntenatalCare => "antenatal_care",
            EntityKind::DiseaseSurveillance => "disease_surveillance",
            EntityKind::FamilyPlanning => "family_planning",
            EntityKind::Facilities => "facility",
            EntityKind::Users => "user",
        }
    }

    /// 展示名称（导出文件标题）
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityKind::Patients => "Patients",
            EntityKind::Births => "Births",
            EntityKind::Deaths => "Deaths",
            EntityKind::Immunizations => "Immunizations",
            EntityKind::AntenatalCare => "Antenatal Care Visits",
            EntityKind::DiseaseSurveillance => "Disease Surveillance",
            EntityKind::FamilyPlanning => "Family Planning",
            EntityKind::Facilities => "Facilities",
            EntityKind::Users => "Users",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    /// 接受复数/单数/连字符/大小写混合的写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized || kind.singular_name() == normalized)
            .or(match normalized.as_str() {
                "antenatal" | "anc" => Some(EntityKind::AntenatalCare),
                "disease" | "diseases" => Some(EntityKind::DiseaseSurveillance),
                _ => None,
            })
            .ok_or_else(|| s.to_string())
    }
}
