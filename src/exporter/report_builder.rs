// ==========================================
// 卫生机构数据交换引擎 - 报表构建器
// ==========================================
// 报表: facility_summary（需 facility_id）/ immunization_coverage / disease_surveillance
// 规则: 各节独立查询后组合为一个文档；日期区间作用于各实体的日期字段
//       引用的机构不存在 → 整个报表失败 (NotFound)
// ==========================================

use crate::config::{ExportConfigRegistry, ImportConfigRegistry};
use crate::domain::{EntityKind, ExportFormat, ReportArtifact, StoredRecord, TypedValue};
use crate::exporter::artifact::ArtifactWriter;
use crate::exporter::error::{ExportError, ExportResult};
use crate::exporter::export_builder::resolve_date_field;
use crate::exporter::renderer::{renderer_for, ReportDocument, ReportSection, ReportTable};
use crate::repository::{RecordQuery, RecordRepository};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// 分组键为空时的展示文本
const NOT_RECORDED: &str = "(not recorded)";

/// 机构汇总中统计的服务实体
const SERVICE_ENTITIES: [EntityKind; 7] = [
    EntityKind::Patients,
    EntityKind::Births,
    EntityKind::Deaths,
    EntityKind::Immunizations,
    EntityKind::AntenatalCare,
    EntityKind::DiseaseSurveillance,
    EntityKind::FamilyPlanning,
];

/// 病例列表字段
const CASE_LISTING_FIELDS: &[&str] = &[
    "id",
    "report_date",
    "disease_name",
    "status",
    "outcome",
    "facility_id",
];

// ==========================================
// ReportType - 报表类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    FacilitySummary,
    ImmunizationCoverage,
    DiseaseSurveillance,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::FacilitySummary => "facility_summary",
            ReportType::ImmunizationCoverage => "immunization_coverage",
            ReportType::DiseaseSurveillance => "disease_surveillance",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportType::FacilitySummary => "Facility Summary Report",
            ReportType::ImmunizationCoverage => "Immunization Coverage Report",
            ReportType::DiseaseSurveillance => "Disease Surveillance Report",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "facility_summary" => Ok(ReportType::FacilitySummary),
            "immunization_coverage" => Ok(ReportType::ImmunizationCoverage),
            "disease_surveillance" => Ok(ReportType::DiseaseSurveillance),
            _ => Err(ExportError::UnsupportedReport(s.to_string())),
        }
    }
}

// ==========================================
// ReportOptions - 报表参数
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub facility_id: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub format: ExportFormat,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            facility_id: None,
            date_from: None,
            date_to: None,
            format: ExportFormat::Pdf,
        }
    }
}

impl ReportOptions {
    fn period_label(&self) -> String {
        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) => format!("Period: {} to {}", from, to),
            (Some(from), None) => format!("Period: from {}", from),
            (None, Some(to)) => format!("Period: until {}", to),
            (None, None) => "Period: all dates".to_string(),
        }
    }
}

fn share(count: usize, total: usize) -> String {
    if total == 0 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", count as f64 * 100.0 / total as f64)
    }
}

fn group_label(key: String) -> String {
    if key.is_empty() {
        NOT_RECORDED.to_string()
    } else {
        key
    }
}

pub struct ReportBuilder {
    imports: Arc<ImportConfigRegistry>,
    exports: Arc<ExportConfigRegistry>,
    repo: Arc<dyn RecordRepository>,
    artifacts: ArtifactWriter,
}

impl ReportBuilder {
    pub fn new(
        imports: Arc<ImportConfigRegistry>,
        exports: Arc<ExportConfigRegistry>,
        repo: Arc<dyn RecordRepository>,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            imports,
            exports,
            repo,
            artifacts: ArtifactWriter::new(export_dir),
        }
    }

    /// 生成报表文件
    #[instrument(skip(self, options), fields(report = %report_type, format = %options.format))]
    pub async fn generate_report(
        &self,
        report_type: ReportType,
        options: &ReportOptions,
    ) -> ExportResult<ReportArtifact> {
        if let (Some(from), Some(to)) = (options.date_from, options.date_to) {
            if from > to {
                return Err(ExportError::InvalidFilter {
                    field: "dateFrom".to_string(),
                    message: format!("起始日期 {} 晚于结束日期 {}", from, to),
                });
            }
        }

        let document = match report_type {
            ReportType::FacilitySummary => self.facility_summary(options).await?,
            ReportType::ImmunizationCoverage => self.immunization_coverage(options).await?,
            ReportType::DiseaseSurveillance => self.disease_surveillance(options).await?,
        };

        let renderer = renderer_for(options.format);
        let prefix = format!("{}_report", report_type.as_str());
        let (file_path, file_name) = self
            .artifacts
            .write_new(&prefix, options.format.extension(), |out| {
                renderer.render(&document, out)
            })?;

        info!(file = %file_name, sections = document.sections.len(), "报表生成完成");
        Ok(ReportArtifact {
            file_path,
            file_name,
            section_count: document.sections.len(),
        })
    }

    /// 实体范围查询: 机构过滤 + 日期区间
    fn scoped_query(&self, entity: EntityKind, options: &ReportOptions) -> ExportResult<RecordQuery> {
        let import_config = self
            .imports
            .get(entity)
            .ok_or_else(|| ExportError::UnsupportedEntity(entity.to_string()))?;

        let mut query = RecordQuery::new();
        if let Some(facility_id) = options.facility_id {
            if import_config.has_field("facility_id") {
                query = query.with_equals("facility_id", TypedValue::Number(facility_id as f64));
            }
        }
        let date_field = resolve_date_field(import_config, self.exports.get(entity));
        Ok(query.with_date_range(&date_field, options.date_from, options.date_to))
    }

    /// 引用的机构必须存在
    async fn require_facility(&self, facility_id: i64) -> ExportResult<StoredRecord> {
        self.repo
            .find_by_id(EntityKind::Facilities, facility_id)
            .await?
            .ok_or_else(|| ExportError::NotFound {
                entity: EntityKind::Facilities.to_string(),
                id: facility_id.to_string(),
            })
    }

    /// 分组计数表: 分组值 | 数量 | 占比
    async fn grouped_table(
        &self,
        entity: EntityKind,
        field: &str,
        label: &str,
        count_label: &str,
        query: &RecordQuery,
    ) -> ExportResult<ReportTable> {
        let groups = self.repo.count_grouped(entity, field, query).await?;
        let total: usize = groups.iter().map(|(_, n)| n).sum();

        let mut table = ReportTable::new(vec![
            label.to_string(),
            count_label.to_string(),
            "Share".to_string(),
        ]);
        for (key, count) in groups {
            table.push_row(vec![group_label(key), count.to_string(), share(count, total)]);
        }
        Ok(table)
    }

    async fn facility_summary(&self, options: &ReportOptions) -> ExportResult<ReportDocument> {
        let facility_id = options
            .facility_id
            .ok_or_else(|| ExportError::MissingParameter("facilityId".to_string()))?;
        let facility = self.require_facility(facility_id).await?;

        let name = facility.display("name");
        let mut document = ReportDocument::new(&format!(
            "{} - {}",
            ReportType::FacilitySummary.title(),
            name
        ));

        // === 机构信息 ===
        let mut details = ReportSection::new("Facility Details")
            .paragraph(format!("Name: {}", name))
            .paragraph(format!("Code: {}", facility.display("facility_code")))
            .paragraph(format!("Type: {}", facility.display("facility_type")));
        for (field, label) in [("district", "District"), ("region", "Region")] {
            let value = facility.display(field);
            if !value.is_empty() {
                details = details.paragraph(format!("{}: {}", label, value));
            }
        }
        document.push_section(details.paragraph(options.period_label()));

        // === 服务量 ===
        debug!("统计服务量");
        let mut volumes = ReportTable::new(vec!["Service".to_string(), "Records".to_string()]);
        let mut total = 0;
        for entity in SERVICE_ENTITIES {
            let query = self.scoped_query(entity, options)?;
            let count = self.repo.count(entity, &query).await?;
            total += count;
            volumes.push_row(vec![entity.display_name().to_string(), count.to_string()]);
        }
        document.push_section(
            ReportSection::new("Service Volumes")
                .paragraph(format!("Total records: {}", total))
                .with_table(volumes),
        );

        // === 疫苗接种 / 疾病报告 ===
        let query = self.scoped_query(EntityKind::Immunizations, options)?;
        let vaccines = self
            .grouped_table(EntityKind::Immunizations, "vaccine_type", "Vaccine", "Doses", &query)
            .await?;
        document.push_section(ReportSection::new("Immunizations by Vaccine").with_table(vaccines));

        let query = self.scoped_query(EntityKind::DiseaseSurveillance, options)?;
        let diseases = self
            .grouped_table(
                EntityKind::DiseaseSurveillance,
                "disease_name",
                "Disease",
                "Cases",
                &query,
            )
            .await?;
        document.push_section(ReportSection::new("Reported Diseases").with_table(diseases));

        Ok(document)
    }

    async fn immunization_coverage(&self, options: &ReportOptions) -> ExportResult<ReportDocument> {
        let entity = EntityKind::Immunizations;
        let mut document = ReportDocument::new(ReportType::ImmunizationCoverage.title());

        let scope = match options.facility_id {
            Some(id) => {
                let facility = self.require_facility(id).await?;
                format!("Facility: {}", facility.display("name"))
            }
            None => "Facility: all facilities".to_string(),
        };

        let query = self.scoped_query(entity, options)?;
        let total = self.repo.count(entity, &query).await?;
        let individuals = self
            .repo
            .count_grouped(entity, "patient_id", &query)
            .await?
            .iter()
            .filter(|(key, _)| !key.is_empty())
            .count();

        document.push_section(
            ReportSection::new("Summary")
                .paragraph(scope)
                .paragraph(options.period_label())
                .paragraph(format!("Total doses administered: {}", total))
                .paragraph(format!("Individuals immunized: {}", individuals)),
        );

        let by_vaccine = self
            .grouped_table(entity, "vaccine_type", "Vaccine", "Doses", &query)
            .await?;
        document.push_section(ReportSection::new("Doses by Vaccine").with_table(by_vaccine));

        let by_dose = self
            .grouped_table(entity, "dose_number", "Dose Number", "Doses", &query)
            .await?;
        document.push_section(ReportSection::new("Doses by Dose Number").with_table(by_dose));

        if options.facility_id.is_none() {
            let by_facility = self
                .grouped_table(entity, "facility_id", "Facility ID", "Doses", &query)
                .await?;
            document.push_section(ReportSection::new("Doses by Facility").with_table(by_facility));
        }

        Ok(document)
    }

    async fn disease_surveillance(&self, options: &ReportOptions) -> ExportResult<ReportDocument> {
        let entity = EntityKind::DiseaseSurveillance;
        let mut document = ReportDocument::new(ReportType::DiseaseSurveillance.title());

        let scope = match options.facility_id {
            Some(id) => {
                let facility = self.require_facility(id).await?;
                format!("Facility: {}", facility.display("name"))
            }
            None => "Facility: all facilities".to_string(),
        };

        let query = self.scoped_query(entity, options)?;
        let total = self.repo.count(entity, &query).await?;
        let confirmed = self
            .repo
            .count(
                entity,
                &query
                    .clone()
                    .with_equals("status", TypedValue::Text("confirmed".to_string())),
            )
            .await?;
        let outbreaks = self
            .repo
            .count(
                entity,
                &query.clone().with_equals("is_outbreak", TypedValue::Bool(true)),
            )
            .await?;

        document.push_section(
            ReportSection::new("Summary")
                .paragraph(scope)
                .paragraph(options.period_label())
                .paragraph(format!("Total cases: {}", total))
                .paragraph(format!("Confirmed cases: {}", confirmed))
                .paragraph(format!("Outbreak-flagged cases: {}", outbreaks)),
        );

        for (field, heading, label) in [
            ("disease_name", "Cases by Disease", "Disease"),
            ("status", "Cases by Status", "Status"),
            ("outcome", "Cases by Outcome", "Outcome"),
        ] {
            let table = self
                .grouped_table(entity, field, label, "Cases", &query)
                .await?;
            document.push_section(ReportSection::new(heading).with_table(table));
        }

        // === 病例列表 ===
        let export_config = self
            .exports
            .get(entity)
            .ok_or_else(|| ExportError::UnsupportedEntity(entity.to_string()))?;
        let fields: Vec<String> = CASE_LISTING_FIELDS.iter().map(|f| f.to_string()).collect();
        let records = self.repo.query_records(entity, &query).await?;
        let mut listing = ReportTable::new(export_config.labels_for(&fields));
        for record in &records {
            listing.push_row(export_config.map_to_fields(record, &fields));
        }
        document.push_section(ReportSection::new("Case Listing").with_table(listing));

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_type_parse() {
        assert_eq!(
            "facility-summary".parse::<ReportType>().unwrap(),
            ReportType::FacilitySummary
        );
        assert_eq!(
            "IMMUNIZATION_COVERAGE".parse::<ReportType>().unwrap(),
            ReportType::ImmunizationCoverage
        );
        assert!(matches!(
            "monthly".parse::<ReportType>(),
            Err(ExportError::UnsupportedReport(_))
        ));
    }

    #[test]
    fn test_share_formatting() {
        assert_eq!(share(1, 3), "33.3%");
        assert_eq!(share(0, 0), "0.0%");
        assert_eq!(share(2, 2), "100.0%");
    }

    #[test]
    fn test_period_label() {
        let mut options = ReportOptions::default();
        assert_eq!(options.period_label(), "Period: all dates");
        options.date_from = NaiveDate::from_ymd_opt(2025, 1, 1);
        assert_eq!(options.period_label(), "Period: from 2025-01-01");
        options.date_to = NaiveDate::from_ymd_opt(2025, 3, 31);
        assert_eq!(options.period_label(), "Period: 2025-01-01 to 2025-03-31");
    }

    #[test]
    fn test_group_label_for_missing_values() {
        assert_eq!(group_label(String::new()), NOT_RECORDED);
        assert_eq!(group_label("BCG".to_string()), "BCG");
    }
}
