// ==========================================
// 卫生机构数据交换引擎 - 配置层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("字段格式正则无效 (实体 {entity}, 字段 {field}): {message}")]
    InvalidPattern {
        entity: String,
        field: String,
        message: String,
    },

    #[error("实体配置定义错误 (实体 {entity}): {message}")]
    InvalidDefinition { entity: String, message: String },

    #[error("环境变量值格式错误 (key: {key}, value: {value}): {message}")]
    InvalidEnvValue {
        key: String,
        value: String,
        message: String,
    },
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
