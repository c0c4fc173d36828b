// ==========================================
// 卫生机构数据交换引擎 - PDF 渲染器
// ==========================================
// 格式: PDF 1.4，横向 Letter (792 x 612)，内置 Courier 等宽字体
// 布局: 标题 → 生成时间 → 各节（标题/段落/列对齐表格）
//       表格跨页时在新页重复表头；页脚 "Page i of n"
// 限制: WinAnsi 之外的字符输出为 '?'
// 对象编号: 1 Catalog / 2 Pages / 3 Courier / 4 Courier-Bold
//           第 i 页 (0 起始) → 页面对象 5+2i，内容流 6+2i
// ==========================================

use crate::domain::ExportFormat;
use crate::exporter::error::ExportResult;
use crate::exporter::renderer::{ReportDocument, ReportTable, TableRenderer};
use std::io::Write;

const PAGE_WIDTH: u32 = 792;
const PAGE_HEIGHT: u32 = 612;
const MARGIN: u32 = 40;
const FONT_SIZE: u32 = 8;
const LEADING: u32 = 11;
const FOOTER_Y: u32 = 24;

/// Courier 字宽 0.6em → (792 - 2*40) / 4.8
const CHARS_PER_LINE: usize = 148;
/// (612 - 40 - 40 - 11) / 11 + 1
const LINES_PER_PAGE: usize = 48;

const COLUMN_GAP: usize = 2;
const MIN_COLUMN_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    bold: bool,
}

impl Line {
    fn normal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }

    fn blank() -> Self {
        Self::normal("")
    }
}

// ==========================================
// 分页
// ==========================================
struct Paginator {
    pages: Vec<Vec<Line>>,
    current: Vec<Line>,
}

impl Paginator {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
        }
    }

    fn remaining(&self) -> usize {
        LINES_PER_PAGE - self.current.len()
    }

    fn new_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
    }

    fn push(&mut self, line: Line) {
        if self.remaining() == 0 {
            self.new_page();
        }
        // 页首不留空行
        if self.current.is_empty() && line.text.is_empty() {
            return;
        }
        self.current.push(line);
    }

    /// 长文本按行宽折行
    fn push_wrapped(&mut self, text: &str, bold: bool) {
        for chunk in wrap(text, CHARS_PER_LINE) {
            self.push(Line { text: chunk, bold });
        }
    }

    fn push_table(&mut self, table: &ReportTable) {
        let widths = column_widths(table);
        let header = Line::bold(format_row(&table.headers, &widths));
        let rule = Line::normal(rule_line(&widths));

        // 表头后至少跟一行数据
        if self.remaining() < 3 {
            self.new_page();
        }
        self.push(header.clone());
        self.push(rule.clone());

        for row in &table.rows {
            if self.remaining() == 0 {
                self.new_page();
                self.push(header.clone());
                self.push(rule.clone());
            }
            self.push(Line::normal(format_row(row, &widths)));
        }
    }

    fn finish(mut self) -> Vec<Vec<Line>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.new_page();
        }
        self.pages
    }
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(width)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// 列宽: 按内容最大宽度，超出页宽时反复收窄最宽列
fn column_widths(table: &ReportTable) -> Vec<usize> {
    let columns = table
        .headers
        .len()
        .max(table.rows.iter().map(|r| r.len()).max().unwrap_or(0));
    let mut widths = vec![MIN_COLUMN_WIDTH; columns];

    for (idx, header) in table.headers.iter().enumerate() {
        widths[idx] = widths[idx].max(header.chars().count());
    }
    for row in &table.rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let available = CHARS_PER_LINE.saturating_sub(COLUMN_GAP * columns.saturating_sub(1));
    while widths.iter().sum::<usize>() > available {
        let Some((widest, width)) = widths
            .iter()
            .copied()
            .enumerate()
            .max_by_key(|(_, w)| *w)
        else {
            break;
        };
        if width <= MIN_COLUMN_WIDTH {
            break;
        }
        widths[widest] = width - 1;
    }
    widths
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            line.push_str(&" ".repeat(COLUMN_GAP));
        }
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        line.push_str(&fit(cell, *width));
    }
    line.trim_end().to_string()
}

/// 截断并右侧补空格到固定宽度
fn fit(cell: &str, width: usize) -> String {
    let count = cell.chars().count();
    if count <= width {
        format!("{}{}", cell, " ".repeat(width - count))
    } else if width > 3 {
        format!("{}...", cell.chars().take(width - 3).collect::<String>())
    } else {
        cell.chars().take(width).collect()
    }
}

fn rule_line(widths: &[usize]) -> String {
    widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join(&" ".repeat(COLUMN_GAP))
}

// ==========================================
// PDF 输出
// ==========================================

/// 字符串字面量转义 + WinAnsi 编码
fn encode_text(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                bytes.push(b'\\');
                bytes.push(c as u8);
            }
            c if (c as u32) < 0x20 => bytes.push(b' '),
            c if (c as u32) < 0x80 => bytes.push(c as u8),
            c if (0xA0..=0xFF).contains(&(c as u32)) => bytes.push(c as u32 as u8),
            _ => bytes.push(b'?'),
        }
    }
    bytes
}

fn content_stream(lines: &[Line], page_number: usize, page_count: usize) -> Vec<u8> {
    let mut stream = Vec::new();
    let top = PAGE_HEIGHT - MARGIN - FONT_SIZE;

    for (idx, line) in lines.iter().enumerate() {
        if line.text.is_empty() {
            continue;
        }
        let y = top - (idx as u32) * LEADING;
        let font = if line.bold { "F2" } else { "F1" };
        stream.extend_from_slice(
            format!("BT /{} {} Tf {} {} Td (", font, FONT_SIZE, MARGIN, y).as_bytes(),
        );
        stream.extend_from_slice(&encode_text(&line.text));
        stream.extend_from_slice(b") Tj ET\n");
    }

    let footer = format!("Page {} of {}", page_number, page_count);
    let footer_x = PAGE_WIDTH - MARGIN - (footer.len() as u32 * FONT_SIZE * 6 / 10);
    stream.extend_from_slice(
        format!(
            "BT /F1 {} Tf {} {} Td ({}) Tj ET\n",
            FONT_SIZE, footer_x, FOOTER_Y, footer
        )
        .as_bytes(),
    );
    stream
}

/// 组装完整 PDF 字节
fn build_pdf(pages: &[Vec<Line>]) -> Vec<u8> {
    let page_count = pages.len();
    let mut objects: Vec<Vec<u8>> = Vec::with_capacity(4 + 2 * page_count);

    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", 5 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
    objects.push(format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, page_count).into_bytes());
    objects.push(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Courier /Encoding /WinAnsiEncoding >>"
            .to_vec(),
    );
    objects.push(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Courier-Bold /Encoding /WinAnsiEncoding >>"
            .to_vec(),
    );

    for (i, lines) in pages.iter().enumerate() {
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH,
                PAGE_HEIGHT,
                6 + 2 * i
            )
            .into_bytes(),
        );
        let stream = content_stream(lines, i + 1, page_count);
        let mut content = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
        content.extend_from_slice(&stream);
        content.extend_from_slice(b"\nendstream");
        objects.push(content);
    }

    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (idx, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n", idx + 1).as_bytes());
        pdf.extend_from_slice(body);
        pdf.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

fn layout(document: &ReportDocument) -> Vec<Vec<Line>> {
    let mut paginator = Paginator::new();
    paginator.push_wrapped(&document.title, true);
    paginator.push(Line::normal(document.generated_label()));

    for section in &document.sections {
        paginator.push(Line::blank());
        if !section.heading.is_empty() {
            paginator.push_wrapped(&section.heading, true);
        }
        for paragraph in &section.paragraphs {
            paginator.push_wrapped(paragraph, false);
        }
        if let Some(table) = &section.table {
            paginator.push_table(table);
            if table.rows.is_empty() {
                paginator.push(Line::normal("(no records)"));
            }
        }
    }
    paginator.finish()
}

pub struct PdfRenderer;

impl TableRenderer for PdfRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn render(&self, document: &ReportDocument, out: &mut dyn Write) -> ExportResult<()> {
        let pages = layout(document);
        out.write_all(&build_pdf(&pages))?;
        Ok(())
    }
}
