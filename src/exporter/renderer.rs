// ==========================================
// 卫生机构数据交换引擎 - 文档模型与渲染器接口
// ==========================================
// 职责: 导出/报表共用的中间文档 → 按格式渲染
// 结构: ReportDocument → ReportSection (标题 + 文本段落 + 可选表格)
// ==========================================

use crate::domain::ExportFormat;
use crate::exporter::csv_renderer::CsvRenderer;
use crate::exporter::error::ExportResult;
use crate::exporter::pdf_renderer::PdfRenderer;
use crate::exporter::spreadsheet_renderer::SpreadsheetRenderer;
use chrono::{Local, NaiveDateTime};
use std::io::Write;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSection {
    pub heading: String,
    pub paragraphs: Vec<String>,
    pub table: Option<ReportTable>,
}

impl ReportSection {
    pub fn new(heading: &str) -> Self {
        Self {
            heading: heading.to_string(),
            ..Default::default()
        }
    }

    pub fn paragraph(mut self, text: impl Into<String>) -> Self {
        self.paragraphs.push(text.into());
        self
    }

    pub fn with_table(mut self, table: ReportTable) -> Self {
        self.table = Some(table);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: NaiveDateTime,
    pub sections: Vec<ReportSection>,
}

impl ReportDocument {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            generated_at: Local::now().naive_local(),
            sections: Vec::new(),
        }
    }

    /// 实体导出: 单个无标题表格
    pub fn single_table(title: &str, table: ReportTable) -> Self {
        let mut document = Self::new(title);
        document.sections.push(ReportSection::default().with_table(table));
        document
    }

    pub fn push_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    /// 是否为纯表格文档（CSV 输出不带标题行）
    pub fn is_single_table(&self) -> bool {
        matches!(
            self.sections.as_slice(),
            [section] if section.heading.is_empty()
                && section.paragraphs.is_empty()
                && section.table.is_some()
        )
    }

    pub fn generated_label(&self) -> String {
        format!("Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"))
    }
}

// ==========================================
// TableRenderer Trait
// ==========================================
// 实现者: CsvRenderer / SpreadsheetRenderer / PdfRenderer
pub trait TableRenderer: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn render(&self, document: &ReportDocument, out: &mut dyn Write) -> ExportResult<()>;
}

/// 按格式选择渲染器
pub fn renderer_for(format: ExportFormat) -> Box<dyn TableRenderer> {
    match format {
        ExportFormat::Csv => Box::new(CsvRenderer),
        ExportFormat::Excel => Box::new(SpreadsheetRenderer),
        ExportFormat::Pdf => Box::new(PdfRenderer),
    }
}
