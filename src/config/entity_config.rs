// ==========================================
// 卫生机构数据交换引擎 - 实体导入配置
// ==========================================
// 职责: 描述每个目标实体的字段、类型、校验规则、唯一键与外键
// 生命周期: 进程启动时构建一次，之后只读
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::domain::{EntityKind, SemanticType};
use regex::Regex;

// ==========================================
// FieldRule - 字段校验规则
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct FieldRule {
    pub allowed_values: Option<Vec<String>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<Regex>,
}

impl FieldRule {
    pub fn is_empty(&self) -> bool {
        self.allowed_values.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.pattern.is_none()
    }

    /// 大小写不敏感地匹配枚举值，返回规范写法
    pub fn canonical_value(&self, value: &str) -> Option<&str> {
        let needle = value.trim();
        self.allowed_values.as_ref().and_then(|values| {
            values
                .iter()
                .find(|allowed| allowed.eq_ignore_ascii_case(needle))
                .map(|s| s.as_str())
        })
    }
}

// ==========================================
// ForeignKeyRef - 外键引用
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRef {
    pub referenced_entity: EntityKind,
    pub referenced_field: String,
}

// ==========================================
// FieldDefinition - 字段定义
// ==========================================
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub semantic_type: SemanticType,
    pub required: bool,
    pub unique: bool,
    pub rule: FieldRule,
    pub foreign_key: Option<ForeignKeyRef>,
}

// ==========================================
// EntityImportConfig - 实体导入配置
// ==========================================
// 字段按声明顺序保存；校验错误也按此顺序输出
#[derive(Debug, Clone)]
pub struct EntityImportConfig {
    pub entity: EntityKind,
    fields: Vec<FieldDefinition>,
}

impl EntityImportConfig {
    pub fn builder(entity: EntityKind) -> EntityConfigBuilder {
        EntityConfigBuilder {
            entity,
            fields: Vec::new(),
            error: None,
        }
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn data_type(&self, name: &str) -> Option<SemanticType> {
        self.field(name).map(|f| f.semantic_type)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.unique)
            .map(|f| f.name.as_str())
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = (&str, &ForeignKeyRef)> {
        self.fields
            .iter()
            .filter_map(|f| f.foreign_key.as_ref().map(|fk| (f.name.as_str(), fk)))
    }
}

// ==========================================
// EntityConfigBuilder - 配置构建器
// ==========================================
// 修饰方法作用于最近一次 field() 声明的字段
pub struct EntityConfigBuilder {
    entity: EntityKind,
    fields: Vec<FieldDefinition>,
    error: Option<ConfigError>,
}

impl EntityConfigBuilder {
    pub fn field(mut self, name: &str, semantic_type: SemanticType) -> Self {
        if self.fields.iter().any(|f| f.name == name) {
            self.fail(format!("字段重复声明: {}", name));
        }
        self.fields.push(FieldDefinition {
            name: name.to_string(),
            semantic_type,
            required: false,
            unique: false,
            rule: FieldRule::default(),
            foreign_key: None,
        });
        self
    }

    pub fn required(mut self) -> Self {
        if let Some(f) = self.current() {
            f.required = true;
        }
        self
    }

    pub fn unique(mut self) -> Self {
        if let Some(f) = self.current() {
            f.unique = true;
        }
        self
    }

    pub fn allowed(mut self, values: &[&str]) -> Self {
        if let Some(f) = self.current() {
            f.rule.allowed_values = Some(values.iter().map(|v| v.to_string()).collect());
        }
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        let mut misuse = None;
        if let Some(f) = self.current() {
            if f.semantic_type != SemanticType::Number {
                misuse = Some(format!("范围规则仅适用于 number 字段: {}", f.name));
            }
            f.rule.min = min;
            f.rule.max = max;
        }
        if let Some(message) = misuse {
            self.fail(message);
        }
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        let entity = self.entity;
        let mut failure = None;
        if let Some(f) = self.current() {
            match Regex::new(pattern) {
                Ok(re) => f.rule.pattern = Some(re),
                Err(e) => {
                    failure = Some(ConfigError::InvalidPattern {
                        entity: entity.to_string(),
                        field: f.name.clone(),
                        message: e.to_string(),
                    })
                }
            }
        }
        if let Some(err) = failure {
            self.error.get_or_insert(err);
        }
        self
    }

    pub fn references(mut self, entity: EntityKind, field: &str) -> Self {
        if let Some(f) = self.current() {
            f.foreign_key = Some(ForeignKeyRef {
                referenced_entity: entity,
                referenced_field: field.to_string(),
            });
        }
        self
    }

    pub fn build(self) -> ConfigResult<EntityImportConfig> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.fields.is_empty() {
            return Err(ConfigError::InvalidDefinition {
                entity: self.entity.to_string(),
                message: "未声明任何字段".to_string(),
            });
        }
        Ok(EntityImportConfig {
            entity: self.entity,
            fields: self.fields,
        })
    }

    fn current(&mut self) -> Option<&mut FieldDefinition> {
        if self.fields.is_empty() {
            self.fail("修饰方法调用前未声明字段".to_string());
        }
        self.fields.last_mut()
    }

    fn fail(&mut self, message: String) {
        let entity = self.entity.to_string();
        self.error
            .get_or_insert(ConfigError::InvalidDefinition { entity, message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_declaration_order() {
        let config = EntityImportConfig::builder(EntityKind::Patients)
            .field("last_name", SemanticType::String)
            .required()
            .field("first_name", SemanticType::String)
            .required()
            .field("national_id", SemanticType::String)
            .unique()
            .build()
            .unwrap();

        let required: Vec<&str> = config.required_fields().collect();
        assert_eq!(required, vec!["last_name", "first_name"]);
        assert_eq!(config.unique_fields().collect::<Vec<_>>(), vec!["national_id"]);
    }

    #[test]
    fn test_builder_rejects_bad_pattern() {
        let result = EntityImportConfig::builder(EntityKind::Users)
            .field("email", SemanticType::String)
            .pattern("([a-z")
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_builder_rejects_range_on_string() {
        let result = EntityImportConfig::builder(EntityKind::Users)
            .field("username", SemanticType::String)
            .range(Some(1.0), None)
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_canonical_value_case_insensitive() {
        let rule = FieldRule {
            allowed_values: Some(vec!["male".to_string(), "female".to_string()]),
            ..Default::default()
        };
        assert_eq!(rule.canonical_value(" Female "), Some("female"));
        assert_eq!(rule.canonical_value("x"), None);
    }
}
