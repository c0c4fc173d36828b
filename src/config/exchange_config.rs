// ==========================================
// 卫生机构数据交换引擎 - 运行时配置
// ==========================================
// 来源: 环境变量覆写 → 用户数据目录默认值
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

pub mod env_keys {
    pub const DB_PATH: &str = "FACILITY_IO_DB_PATH";
    pub const EXPORT_DIR: &str = "FACILITY_IO_EXPORT_DIR";
    pub const DOWNLOAD_BASE_URL: &str = "FACILITY_IO_DOWNLOAD_BASE_URL";
    pub const MATCH_THRESHOLD: &str = "FACILITY_IO_MATCH_THRESHOLD";
}

/// 实体匹配默认阈值
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

/// 下载链接默认前缀
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "/downloads";

const APP_DIR_NAME: &str = "facility-data-io";
const DB_FILE_NAME: &str = "facility_data.db";

// ==========================================
// ExchangeConfig - 运行时配置
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeConfig {
    pub db_path: String,
    pub export_dir: PathBuf,
    pub download_base_url: String,
    pub entity_match_threshold: f64,
}

impl ExchangeConfig {
    /// 从环境变量读取（未设置时使用默认值）
    pub fn from_env() -> ConfigResult<Self> {
        let base_dir = default_base_dir();

        let db_path = read_env(env_keys::DB_PATH)
            .unwrap_or_else(|| base_dir.join(DB_FILE_NAME).to_string_lossy().to_string());
        let export_dir = read_env(env_keys::EXPORT_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join("exports"));
        let download_base_url = read_env(env_keys::DOWNLOAD_BASE_URL)
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_BASE_URL.to_string());

        let entity_match_threshold = match read_env(env_keys::MATCH_THRESHOLD) {
            Some(raw) => parse_threshold(&raw)?,
            None => DEFAULT_MATCH_THRESHOLD,
        };

        Ok(Self {
            db_path,
            export_dir,
            download_base_url,
            entity_match_threshold,
        })
    }

    /// 指定目录下的独立配置（测试/命令行工具）
    pub fn for_directory(dir: &Path) -> Self {
        Self {
            db_path: dir.join(DB_FILE_NAME).to_string_lossy().to_string(),
            export_dir: dir.join("exports"),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            entity_match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    /// 产物文件名 → 下载链接
    pub fn download_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.download_base_url.trim_end_matches('/'), file_name)
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_threshold(raw: &str) -> ConfigResult<f64> {
    let invalid = |message: &str| ConfigError::InvalidEnvValue {
        key: env_keys::MATCH_THRESHOLD.to_string(),
        value: raw.to_string(),
        message: message.to_string(),
    };
    let value: f64 = raw.parse().map_err(|_| invalid("不是有效数字"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid("取值范围为 [0, 1]"));
    }
    Ok(value)
}

/// 用户数据目录下的应用目录（不可用时回退当前目录）
fn default_base_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => data_dir.join(APP_DIR_NAME),
        None => PathBuf::from("."),
    }
}
