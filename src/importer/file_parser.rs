// ==========================================
// 卫生机构数据交换引擎 - 文件行源
// ==========================================
// 职责: 把上传文件变成逐行产出的 RawRow 流
// 支持: CSV (.csv，流式) / Excel (.xlsx/.xls，calamine 读取首个工作表)
// 约定: 完全空白的行在计数前跳过；无表头时列名为 column_1..column_n
// ==========================================

use crate::domain::{RawRow, TypedValue};
use crate::importer::error::{ImportError, ImportOutcome};
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Days, NaiveDate};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

// ==========================================
// SourceOptions - 读取选项
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    pub has_header_row: bool,
    pub skip_lines: usize, // 表头之前丢弃的物理行数
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            has_header_row: true,
            skip_lines: 0,
        }
    }
}

// ==========================================
// RowSource Trait
// ==========================================
// 迭代过程中的 I/O / 解码错误以 Err 产出，调用方应整体失败
pub trait RowSource: Iterator<Item = ImportOutcome<RawRow>> + Send {
    /// 列名（无表头时为生成的 column_N）
    fn headers(&self) -> &[String];
}

/// 生成的列名
fn generated_column(idx: usize) -> String {
    format!("column_{}", idx + 1)
}

fn is_blank(row: &RawRow) -> bool {
    row.values().all(|v| v.trim().is_empty())
}

// ==========================================
// CsvRowSource - CSV 流式行源
// ==========================================
pub struct CsvRowSource {
    reader: csv::Reader<BufReader<File>>,
    headers: Vec<String>,
    has_header_row: bool,
    pending: Option<StringRecord>, // 无表头模式下用于确定列数而预读的首行
    finished: bool,
}

impl CsvRowSource {
    pub fn open(path: &Path, options: &SourceOptions) -> ImportOutcome<Self> {
        let file = File::open(path)?;
        let mut buffered = BufReader::new(file);

        // 丢弃表头之前的物理行
        let mut discard = String::new();
        for _ in 0..options.skip_lines {
            discard.clear();
            if buffered.read_line(&mut discard)? == 0 {
                break;
            }
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(buffered);

        let mut first = StringRecord::new();
        let has_first = reader.read_record(&mut first)?;

        let (headers, pending) = if !has_first {
            (Vec::new(), None)
        } else if options.has_header_row {
            let headers = first
                .iter()
                .enumerate()
                .map(|(idx, h)| {
                    let h = if idx == 0 { h.trim_start_matches('\u{feff}') } else { h };
                    h.trim().to_string()
                })
                .collect();
            (headers, None)
        } else {
            let headers = (0..first.len()).map(generated_column).collect();
            (headers, Some(first))
        };

        debug!(columns = headers.len(), path = %path.display(), "CSV 行源已打开");
        Ok(Self {
            reader,
            headers,
            has_header_row: options.has_header_row,
            pending,
            finished: false,
        })
    }

    fn to_row(&self, record: &StringRecord) -> RawRow {
        let mut row = RawRow::new();
        for (idx, value) in record.iter().enumerate() {
            if let Some(header) = self.headers.get(idx) {
                row.insert(header.clone(), value.trim().to_string());
            } else if !self.has_header_row {
                row.insert(generated_column(idx), value.trim().to_string());
            }
        }
        row
    }
}

impl Iterator for CsvRowSource {
    type Item = ImportOutcome<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let record = match self.pending.take() {
                Some(record) => record,
                None => {
                    let mut record = StringRecord::new();
                    match self.reader.read_record(&mut record) {
                        Ok(true) => record,
                        Ok(false) => {
                            self.finished = true;
                            return None;
                        }
                        Err(e) => {
                            self.finished = true;
                            return Some(Err(e.into()));
                        }
                    }
                }
            };

            let row = self.to_row(&record);
            // 跳过完全空白的行
            if is_blank(&row) {
                continue;
            }
            return Some(Ok(row));
        }
    }
}

impl RowSource for CsvRowSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }
}

// ==========================================
// ExcelRowSource - Excel 行源
// ==========================================
// calamine 一次读入整个工作表，这里按行索引逐行产出
pub struct ExcelRowSource {
    range: Range<Data>,
    headers: Vec<String>,
    has_header_row: bool,
    next_row: usize,
}

impl ExcelRowSource {
    pub fn open(path: &Path, options: &SourceOptions) -> ImportOutcome<Self> {
        let mut workbook = open_workbook_auto(path)?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut next_row = options.skip_lines.min(range.height());
        let headers = if options.has_header_row && next_row < range.height() {
            let headers = (0..range.width())
                .map(|col| {
                    range
                        .get((next_row, col))
                        .map(cell_to_string)
                        .unwrap_or_default()
                })
                .collect();
            next_row += 1;
            headers
        } else {
            (0..range.width()).map(generated_column).collect()
        };

        debug!(sheet = %sheet_name, rows = range.height(), "Excel 行源已打开");
        Ok(Self {
            range,
            headers,
            has_header_row: options.has_header_row,
            next_row,
        })
    }
}

impl Iterator for ExcelRowSource {
    type Item = ImportOutcome<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_row < self.range.height() {
            let row_idx = self.next_row;
            self.next_row += 1;

            let mut row = RawRow::new();
            for (col, header) in self.headers.iter().enumerate() {
                if header.is_empty() && self.has_header_row {
                    continue;
                }
                let value = self
                    .range
                    .get((row_idx, col))
                    .map(cell_to_string)
                    .unwrap_or_default();
                row.insert(header.clone(), value);
            }

            if is_blank(&row) {
                continue;
            }
            return Some(Ok(row));
        }
        None
    }
}

impl RowSource for ExcelRowSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }
}

/// 单元格 → 字符串（日期序列号转 YYYY-MM-DD）
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) => TypedValue::Number(*f).to_string(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        other => other.to_string().trim().to_string(),
    }
}

/// Excel 1900 日期系统序列号 → 日期
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

// ==========================================
// 按扩展名打开行源
// ==========================================
pub fn open_row_source(path: &Path, options: &SourceOptions) -> ImportOutcome<Box<dyn RowSource>> {
    // 检查文件存在
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => Ok(Box::new(CsvRowSource::open(path, options)?)),
        "xlsx" | "xls" => Ok(Box::new(ExcelRowSource::open(path, options)?)),
        _ => Err(ImportError::UnsupportedFormat(ext)),
    }
}
