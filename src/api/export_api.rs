// ==========================================
// 卫生机构数据交换引擎 - 导出/报表API
// ==========================================
// 职责: 请求校验 → 导出/报表构建 → 产物文件名转换为下载链接
// 约定: 过滤值为 JSON 标量，统一转为字符串后交给导出构建器按字段类型解析
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ExchangeConfig;
use crate::domain::{EntityKind, ExportFormat, ExportJob};
use crate::exporter::{ExportBuilder, ReportBuilder, ReportOptions, ReportType};
use crate::importer::coercion::parse_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// 导出请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub entity: String,
    /// csv / excel / pdf（缺省 csv）
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub filters: serde_json::Map<String, Value>,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// 导出响应
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub download_url: String,
    pub file_name: String,
    pub record_count: usize,
}

/// 报表请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub report_type: String,
    #[serde(default)]
    pub facility_id: Option<i64>,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    /// csv / excel / pdf（缺省 pdf）
    #[serde(default)]
    pub format: Option<String>,
}

/// 报表响应
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub download_url: String,
    pub file_name: String,
}

fn parse_format(raw: Option<&str>, default: ExportFormat) -> ApiResult<ExportFormat> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<ExportFormat>()
            .map_err(|value| ApiError::InvalidInput(format!("不支持的导出格式: {}", value))),
        None => Ok(default),
    }
}

/// JSON 过滤值 → 字符串（null 视为未设置）
fn stringify_filters(filters: &serde_json::Map<String, Value>) -> ApiResult<BTreeMap<String, String>> {
    let mut result = BTreeMap::new();
    for (key, value) in filters {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ApiError::InvalidInput(format!(
                    "过滤条件 {} 只接受标量值",
                    key
                )))
            }
        };
        result.insert(key.clone(), text);
    }
    Ok(result)
}

fn parse_optional_date(key: &str, raw: Option<&str>) -> ApiResult<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_date(raw)
            .map(Some)
            .ok_or_else(|| ApiError::InvalidInput(format!("{} 不是有效日期: {}", key, raw))),
        None => Ok(None),
    }
}

/// 导出/报表API
pub struct ExportApi {
    config: Arc<ExchangeConfig>,
    export_builder: ExportBuilder,
    report_builder: ReportBuilder,
}

impl ExportApi {
    pub fn new(
        config: Arc<ExchangeConfig>,
        export_builder: ExportBuilder,
        report_builder: ReportBuilder,
    ) -> Self {
        Self {
            config,
            export_builder,
            report_builder,
        }
    }

    /// 导出实体记录
    pub async fn export_data(&self, request: &ExportRequest) -> ApiResult<ExportResponse> {
        let entity = request
            .entity
            .parse::<EntityKind>()
            .map_err(|name| ApiError::InvalidInput(format!("不支持的实体类型: {}", name)))?;

        let job = ExportJob {
            entity,
            filters: stringify_filters(&request.filters)?,
            fields: request.fields.clone(),
            format: parse_format(request.format.as_deref(), ExportFormat::Csv)?,
        };

        let artifact = self.export_builder.export_to_format(&job).await?;
        info!(entity = %entity, file = %artifact.file_name, "导出请求完成");

        Ok(ExportResponse {
            download_url: self.config.download_url(&artifact.file_name),
            file_name: artifact.file_name,
            record_count: artifact.record_count,
        })
    }

    /// 生成报表
    pub async fn generate_report(&self, request: &ReportRequest) -> ApiResult<ReportResponse> {
        let report_type = request.report_type.parse::<ReportType>()?;
        let options = ReportOptions {
            facility_id: request.facility_id,
            date_from: parse_optional_date("dateFrom", request.date_from.as_deref())?,
            date_to: parse_optional_date("dateTo", request.date_to.as_deref())?,
            format: parse_format(request.format.as_deref(), ExportFormat::Pdf)?,
        };

        let artifact = self
            .report_builder
            .generate_report(report_type, &options)
            .await?;
        info!(report = %report_type, file = %artifact.file_name, "报表请求完成");

        Ok(ReportResponse {
            download_url: self.config.download_url(&artifact.file_name),
            file_name: artifact.file_name,
        })
    }
}
