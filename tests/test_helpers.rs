// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、CSV/XLSX 上传文件、种子数据等功能
// ==========================================

#![allow(dead_code)]

use facility_data_io::config::ImportConfigRegistry;
use facility_data_io::db::{init_schema, open_sqlite_connection};
use facility_data_io::domain::{EntityKind, FieldValues, TypedValue};
use facility_data_io::repository::{RecordRepository, SqliteRecordRepository};
use chrono::NaiveDate;
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn, &test_registry())?;

    Ok((temp_file, db_path))
}

/// 内置实体配置注册表
pub fn test_registry() -> Arc<ImportConfigRegistry> {
    Arc::new(ImportConfigRegistry::builtin().expect("builtin registry"))
}

/// 打开测试数据库上的记录仓储
pub fn open_repo(db_path: &str, registry: Arc<ImportConfigRegistry>) -> Arc<SqliteRecordRepository> {
    Arc::new(SqliteRecordRepository::new(db_path, registry).expect("open repository"))
}

/// 在目录下写一个 CSV 上传文件（导入结束后会被删除）
pub fn write_csv(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create csv");
    for line in lines {
        writeln!(file, "{}", line).expect("write csv line");
    }
    path
}

// ==========================================
// XLSX 上传文件
// ==========================================

/// 工作表单元格
#[derive(Debug, Clone, Copy)]
pub enum XlsxCell<'a> {
    Empty,
    Text(&'a str),
    Number(f64),
    /// Excel 日期序列号（套用内置日期格式 14）
    Date(f64),
}

fn column_letter(idx: usize) -> char {
    (b'A' + idx as u8) as char
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const XLSX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const XLSX_ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const XLSX_WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Register" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const XLSX_WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// 样式 0: 常规；样式 1: 内置日期格式 14
const XLSX_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14"/></cellXfs></styleSheet>"#;

/// 在目录下写一个单工作表的 .xlsx 上传文件（字符串走共享字符串表）
pub fn write_xlsx(dir: &Path, name: &str, rows: &[Vec<XlsxCell>]) -> PathBuf {
    let mut shared: Vec<String> = Vec::new();
    let mut sheet_rows = String::new();
    for (row_idx, cells) in rows.iter().enumerate() {
        let row_number = row_idx + 1;
        sheet_rows.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (col_idx, cell) in cells.iter().enumerate() {
            let reference = format!("{}{}", column_letter(col_idx), row_number);
            match cell {
                XlsxCell::Empty => {}
                XlsxCell::Text(value) => {
                    shared.push(xml_escape(value));
                    sheet_rows.push_str(&format!(
                        r#"<c r="{}" t="s"><v>{}</v></c>"#,
                        reference,
                        shared.len() - 1
                    ));
                }
                XlsxCell::Number(value) => sheet_rows.push_str(&format!(
                    r#"<c r="{}" t="n"><v>{}</v></c>"#,
                    reference, value
                )),
                XlsxCell::Date(serial) => sheet_rows.push_str(&format!(
                    r#"<c r="{}" s="1"><v>{}</v></c>"#,
                    reference, serial
                )),
            }
        }
        sheet_rows.push_str("</row>");
    }

    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
        sheet_rows
    );
    let strings = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{n}" uniqueCount="{n}">{}</sst>"#,
        shared
            .iter()
            .map(|s| format!("<si><t>{}</t></si>", s))
            .collect::<String>(),
        n = shared.len()
    );

    let path = dir.join(name);
    let file = std::fs::File::create(&path).expect("create xlsx");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    let parts = [
        ("[Content_Types].xml", XLSX_CONTENT_TYPES.to_string()),
        ("_rels/.rels", XLSX_ROOT_RELS.to_string()),
        ("xl/workbook.xml", XLSX_WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", XLSX_WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", XLSX_STYLES.to_string()),
        ("xl/sharedStrings.xml", strings),
        ("xl/worksheets/sheet1.xml", sheet),
    ];
    for (part, content) in parts {
        zip.start_file(part, options).expect("start xlsx part");
        zip.write_all(content.as_bytes()).expect("write xlsx part");
    }
    zip.finish().expect("finish xlsx");
    path
}

/// 源列 → 同名字段
pub fn identity_mappings(fields: &[&str]) -> std::collections::HashMap<String, String> {
    fields
        .iter()
        .map(|f| (f.to_string(), f.to_string()))
        .collect()
}

// ==========================================
// 种子数据
// ==========================================

pub fn text(value: &str) -> Option<TypedValue> {
    Some(TypedValue::Text(value.to_string()))
}

pub fn number(value: f64) -> Option<TypedValue> {
    Some(TypedValue::Number(value))
}

pub fn date(value: &str) -> Option<TypedValue> {
    Some(TypedValue::Date(
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid test date"),
    ))
}

pub fn row(pairs: Vec<(&str, Option<TypedValue>)>) -> FieldValues {
    pairs
        .into_iter()
        .map(|(field, value)| (field.to_string(), value))
        .collect()
}

/// 机构 id=1（Mnazi Mmoja）+ 患者 id=1,2
pub async fn seed_facility_and_patients(repo: &dyn RecordRepository) {
    repo.bulk_insert(
        EntityKind::Facilities,
        &[row(vec![
            ("facility_code", text("HF-001")),
            ("name", text("Mnazi Mmoja")),
            ("facility_type", text("hospital")),
            ("district", text("Urban")),
        ])],
    )
    .await
    .expect("seed facility");

    let patients: Vec<FieldValues> = [("Asha", "female", "1990-04-12"), ("Juma", "male", "1985-11-02")]
        .iter()
        .map(|(name, gender, dob)| {
            row(vec![
                ("first_name", text(name)),
                ("last_name", text("Said")),
                ("gender", text(gender)),
                ("date_of_birth", date(dob)),
                ("facility_id", number(1.0)),
            ])
        })
        .collect();
    repo.bulk_insert(EntityKind::Patients, &patients)
        .await
        .expect("seed patients");
}

/// 免疫记录: (患者, 疫苗, 接种日期, 剂次)
pub async fn seed_immunizations(repo: &dyn RecordRepository, records: &[(f64, &str, &str, f64)]) {
    let rows: Vec<FieldValues> = records
        .iter()
        .map(|(patient, vaccine, day, dose)| {
            row(vec![
                ("patient_id", number(*patient)),
                ("vaccine_type", text(vaccine)),
                ("administration_date", date(day)),
                ("dose_number", number(*dose)),
                ("facility_id", number(1.0)),
            ])
        })
        .collect();
    repo.bulk_insert(EntityKind::Immunizations, &rows)
        .await
        .expect("seed immunizations");
}
