// ==========================================
// 卫生机构数据交换引擎 - Excel 渲染器
// ==========================================
// 格式: SpreadsheetML 2003 (XML)，扩展名 .xls，Excel/LibreOffice 可直接打开
// 规则: 每节一个工作表；纯数字单元格写为 Number，其余为 String
//       工作表名 ≤ 31 字符，去除 []:*?/\ 并保证唯一
// ==========================================

use crate::domain::ExportFormat;
use crate::exporter::error::ExportResult;
use crate::exporter::renderer::{ReportDocument, ReportSection, TableRenderer};
use std::collections::HashSet;
use std::io::Write;

const MAX_SHEET_NAME: usize = 31;

pub struct SpreadsheetRenderer;

impl TableRenderer for SpreadsheetRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Excel
    }

    fn render(&self, document: &ReportDocument, out: &mut dyn Write) -> ExportResult<()> {
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(out, r#"<?mso-application progid="Excel.Sheet"?>"#)?;
        writeln!(
            out,
            r#"<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet" xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">"#
        )?;
        writeln!(out, " <Styles>")?;
        writeln!(out, r#"  <Style ss:ID="title"><Font ss:Bold="1" ss:Size="14"/></Style>"#)?;
        writeln!(
            out,
            r##"  <Style ss:ID="header"><Font ss:Bold="1"/><Interior ss:Color="#D9E1F2" ss:Pattern="Solid"/></Style>"##
        )?;
        writeln!(out, " </Styles>")?;

        let mut used_names = HashSet::new();
        if document.sections.is_empty() {
            let name = unique_sheet_name(&document.title, &mut used_names);
            write_sheet(out, &name, document, &ReportSection::default(), true)?;
        }
        for (idx, section) in document.sections.iter().enumerate() {
            let base = if section.heading.is_empty() {
                document.title.as_str()
            } else {
                section.heading.as_str()
            };
            let name = unique_sheet_name(base, &mut used_names);
            // 报表首个工作表带标题
            let with_title = idx == 0 && !document.is_single_table();
            write_sheet(out, &name, document, section, with_title)?;
        }

        writeln!(out, "</Workbook>")?;
        Ok(())
    }
}

fn write_sheet(
    out: &mut dyn Write,
    name: &str,
    document: &ReportDocument,
    section: &ReportSection,
    with_title: bool,
) -> ExportResult<()> {
    writeln!(out, r#" <Worksheet ss:Name="{}">"#, escape_xml(name))?;
    writeln!(out, "  <Table>")?;

    if with_title {
        write_row(out, &[document.title.as_str()], Some("title"))?;
        write_row(out, &[document.generated_label().as_str()], None)?;
        write_row(out, &[], None)?;
    }
    if !section.heading.is_empty() {
        write_row(out, &[section.heading.as_str()], Some("header"))?;
    }
    for paragraph in &section.paragraphs {
        write_row(out, &[paragraph.as_str()], None)?;
    }
    if let Some(table) = &section.table {
        if !section.paragraphs.is_empty() {
            write_row(out, &[], None)?;
        }
        let headers: Vec<&str> = table.headers.iter().map(String::as_str).collect();
        write_row(out, &headers, Some("header"))?;
        for row in &table.rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            write_row(out, &cells, None)?;
        }
    }

    writeln!(out, "  </Table>")?;
    writeln!(out, " </Worksheet>")?;
    Ok(())
}

fn write_row(out: &mut dyn Write, cells: &[&str], style: Option<&str>) -> ExportResult<()> {
    write!(out, "   <Row>")?;
    for cell in cells {
        let style_attr = style
            .map(|s| format!(r#" ss:StyleID="{}""#, s))
            .unwrap_or_default();
        let cell_type = if style.is_none() && is_numeric_cell(cell) {
            "Number"
        } else {
            "String"
        };
        write!(
            out,
            r#"<Cell{}><Data ss:Type="{}">{}</Data></Cell>"#,
            style_attr,
            cell_type,
            escape_xml(cell)
        )?;
    }
    writeln!(out, "</Row>")?;
    Ok(())
}

/// 纯数字（保留前导零编号为文本，如 "007"）
fn is_numeric_cell(value: &str) -> bool {
    if value.is_empty() || value.starts_with('+') {
        return false;
    }
    let digits = value.trim_start_matches('-');
    if digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.") {
        return false;
    }
    value.parse::<f64>().map(|n| n.is_finite()).unwrap_or(false)
}

/// XML 转义（去除 XML 1.0 不允许的控制字符）
fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            '\t' | '\r' => escaped.push(c),
            c if (c as u32) < 0x20 => {}
            c => escaped.push(c),
        }
    }
    escaped
}

fn unique_sheet_name(base: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = base
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(MAX_SHEET_NAME)
        .collect();
    let cleaned = if cleaned.trim().is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.trim().to_string()
    };

    let mut candidate = cleaned.clone();
    let mut counter = 2;
    while !used.insert(candidate.to_lowercase()) {
        let suffix = format!(" ({})", counter);
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
        candidate = format!("{}{}", cleaned.chars().take(keep).collect::<String>(), suffix);
        counter += 1;
    }
    candidate
}
