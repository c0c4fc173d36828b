// ==========================================
// 卫生机构数据交换引擎 - CSV 渲染器
// ==========================================
// 实体导出: 表头 + 数据行
// 报表: 标题 / 生成时间 / 各节标题、段落、表格，节之间空一行
// ==========================================

use crate::domain::ExportFormat;
use crate::exporter::error::ExportResult;
use crate::exporter::renderer::{ReportDocument, TableRenderer};
use csv::WriterBuilder;
use std::io::Write;

pub struct CsvRenderer;

impl TableRenderer for CsvRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn render(&self, document: &ReportDocument, out: &mut dyn Write) -> ExportResult<()> {
        let mut wtr = WriterBuilder::new().flexible(true).from_writer(out);

        if document.is_single_table() {
            if let Some(table) = document.sections.first().and_then(|s| s.table.as_ref()) {
                wtr.write_record(&table.headers)?;
                for row in &table.rows {
                    wtr.write_record(row)?;
                }
            }
            wtr.flush()?;
            return Ok(());
        }

        wtr.write_record([document.title.as_str()])?;
        wtr.write_record([document.generated_label()])?;

        for section in &document.sections {
            wtr.write_record([""])?;
            if !section.heading.is_empty() {
                wtr.write_record([section.heading.as_str()])?;
            }
            for paragraph in &section.paragraphs {
                wtr.write_record([paragraph.as_str()])?;
            }
            if let Some(table) = &section.table {
                wtr.write_record(&table.headers)?;
                for row in &table.rows {
                    wtr.write_record(row)?;
                }
            }
        }

        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::renderer::{ReportSection, ReportTable};

    fn render(document: &ReportDocument) -> String {
        let mut buffer = Vec::new();
        CsvRenderer.render(document, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_single_table_output() {
        let mut table = ReportTable::new(vec!["Patient ID".to_string(), "Vaccine Type".to_string()]);
        table.push_row(vec!["1".to_string(), "BCG, dose 1".to_string()]);

        let output = render(&ReportDocument::single_table("Immunizations", table));
        assert_eq!(output, "Patient ID,Vaccine Type\n1,\"BCG, dose 1\"\n");
    }

    #[test]
    fn test_report_output_has_sections() {
        let mut document = ReportDocument::new("Disease Surveillance Report");
        let mut table = ReportTable::new(vec!["Disease".to_string(), "Cases".to_string()]);
        table.push_row(vec!["Cholera".to_string(), "3".to_string()]);
        document.push_section(
            ReportSection::new("Cases by Disease")
                .paragraph("Total cases: 3")
                .with_table(table),
        );

        let output = render(&document);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "Disease Surveillance Report");
        assert!(lines[1].starts_with("Generated: "));
        assert!(lines.contains(&"Cases by Disease"));
        assert!(lines.contains(&"Cholera,3"));
    }
}
