// ==========================================
// 实体导入集成测试
// ==========================================
// 测试目标: 分析 → 映射检查 → 校验 → 预检 → 单事务落库 的完整流程
// ==========================================

mod test_helpers;

use async_trait::async_trait;
use facility_data_io::config::ImportConfigRegistry;
use facility_data_io::domain::{EntityKind, FieldValues, StoredRecord, TypedValue};
use facility_data_io::importer::{
    open_row_source, EntityImporter, FileAnalyzer, ImportError, ImportOptions, RecordImporter,
    SourceOptions,
};
use facility_data_io::logging;
use facility_data_io::repository::{RecordQuery, RecordRepository, RepositoryResult};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use std::path::{Path, PathBuf};
use test_helpers::{
    create_test_db, identity_mappings, open_repo, seed_facility_and_patients, test_registry,
    write_csv, write_xlsx, XlsxCell,
};

const PATIENT_FIELDS: &[&str] = &["first_name", "last_name", "gender", "date_of_birth"];

#[tokio::test]
async fn test_patient_file_analyzed_and_imported() {
    logging::init_test();
    let (_db, db_path) = create_test_db().unwrap();
    let registry = test_registry();
    let repo = open_repo(&db_path, registry.clone());
    let dir = TempDir::new().unwrap();
    let upload = write_csv(
        dir.path(),
        "patients.csv",
        &[
            "first_name,last_name,gender,date_of_birth",
            "Asha,Said,female,1990-04-12",
            "Juma,Ali,,1985-11-02",
            "Neema,Hassan,female,2001-07-30",
        ],
    );

    // 分析: 表头命中患者签名字段
    let analyzer = FileAnalyzer::new(registry.clone(), 0.5);
    let analysis = analyzer.analyze(&upload, &SourceOptions::default()).unwrap();
    assert_eq!(analysis.suggested_entity, "patient");
    assert_eq!(analysis.row_count, 3);
    assert!(upload.exists(), "分析不应删除上传文件");

    // 导入: 第 2 行 gender 为空
    let importer = EntityImporter::new(registry, repo.clone());
    let result = importer
        .import_file(
            &upload,
            &ImportOptions::new("patients", identity_mappings(PATIENT_FIELDS)),
        )
        .await
        .unwrap();

    assert_eq!(result.total, 3);
    assert_eq!(result.valid_count, 2);
    assert_eq!(result.invalid_count, 1);
    assert_eq!(result.created_count, 2);
    assert_eq!(result.errors[0].row, 2);
    assert!(result.errors[0]
        .errors
        .contains(&"gender is required".to_string()));
    assert_eq!(result.errors[0].original["first_name"], "Juma");
    assert!(!upload.exists(), "导入结束后上传文件应被删除");

    let stored = repo
        .count(EntityKind::Patients, &RecordQuery::new())
        .await
        .unwrap();
    assert_eq!(stored, 2);
}

#[tokio::test]
async fn test_missing_required_mapping_fails_before_reading_rows() {
    let (_db, db_path) = create_test_db().unwrap();
    let registry = test_registry();
    let repo = open_repo(&db_path, registry.clone());
    let dir = TempDir::new().unwrap();
    let upload = write_csv(
        dir.path(),
        "patients.csv",
        &[
            "first_name,last_name,gender,dob",
            "Asha,Said,female,1990-04-12",
        ],
    );

    let importer = EntityImporter::new(registry, repo.clone());
    let result = importer
        .import_file(
            &upload,
            &ImportOptions::new("patients", identity_mappings(&PATIENT_FIELDS[..3])),
        )
        .await;

    match result {
        Err(ImportError::UnmappedRequiredFields(fields)) => {
            assert_eq!(fields, vec!["date_of_birth".to_string()]);
        }
        other => panic!("Expected UnmappedRequiredFields, got {:?}", other),
    }
    assert_eq!(
        repo.count(EntityKind::Patients, &RecordQuery::new())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_mapped_headers_and_accumulated_errors() {
    let (_db, db_path) = create_test_db().unwrap();
    let registry = test_registry();
    let repo = open_repo(&db_path, registry.clone());
    let dir = TempDir::new().unwrap();
    let upload = write_csv(
        dir.path(),
        "register.csv",
        &[
            "Given Name,Surname,Sex,DOB",
            "Asha,Said,Female,12/04/1990",
            ",,unknown,1985-11-02",
        ],
    );

    let mappings: HashMap<String, String> = [
        ("Given Name", "first_name"),
        ("Surname", "last_name"),
        ("Sex", "gender"),
        ("DOB", "date_of_birth"),
    ]
    .iter()
    .map(|(s, t)| (s.to_string(), t.to_string()))
    .collect();

    let importer = EntityImporter::new(registry, repo.clone());
    let result = importer
        .import_file(&upload, &ImportOptions::new("patient", mappings))
        .await
        .unwrap();

    assert_eq!(result.created_count, 1);
    assert_eq!(result.invalid_count, 1);
    // 两个必填缺失 + 一个枚举违规，不短路
    assert!(result.errors[0].errors.len() >= 3, "{:?}", result.errors[0].errors);
    assert!(result.errors[0]
        .errors
        .contains(&"first_name is required".to_string()));
    assert!(result.errors[0]
        .errors
        .contains(&"last_name is required".to_string()));

    // 枚举值按规范写法落库
    let stored = repo
        .query_records(EntityKind::Patients, &RecordQuery::new())
        .await
        .unwrap();
    assert_eq!(stored[0].display("gender"), "female");
}

#[tokio::test]
async fn test_missing_parent_record_demoted() {
    let (_db, db_path) = create_test_db().unwrap();
    let registry = test_registry();
    let repo = open_repo(&db_path, registry.clone());
    seed_facility_and_patients(repo.as_ref()).await;
    let dir = TempDir::new().unwrap();
    let upload = write_csv(
        dir.path(),
        "immunizations.csv",
        &[
            "patient_id,vaccine_type,administration_date,dose_number",
            "1,BCG,2025-02-01,1",
            "99,OPV,2025-02-01,1",
            "2,OPV,2025-02-03,2",
        ],
    );

    let importer = EntityImporter::new(registry, repo.clone());
    let result = importer
        .import_file(
            &upload,
            &ImportOptions::new("immunizations", identity_mappings(IMMUNIZATION_FIELDS)),
        )
        .await
        .unwrap();

    // 三行均通过行校验；第 2 行在外键预检中降级，只进入 errors
    assert_eq!(result.total, 3);
    assert_eq!(result.valid_count, 3);
    assert_eq!(result.invalid_count, 0);
    assert_eq!(result.created_count, 2);
    assert!(result.created_count < result.valid_count);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 2);
    assert_eq!(
        result.errors[0].errors,
        vec!["patient_id references a non-existent patients.id (99)".to_string()]
    );
}

// ==========================================
// Excel 行源
// ==========================================

const IMMUNIZATION_FIELDS: &[&str] = &[
    "patient_id",
    "vaccine_type",
    "administration_date",
    "dose_number",
];

/// 标题行 + 表头（含一个空表头列）+ 两条数据，中间夹一空行
fn write_immunization_register(dir: &Path) -> PathBuf {
    use XlsxCell::{Date, Empty, Number, Text};
    write_xlsx(
        dir,
        "immunizations.xlsx",
        &[
            vec![Text("Zanzibar immunization register")],
            vec![
                Text("patient_id"),
                Text("vaccine_type"),
                Empty,
                Text("administration_date"),
                Text("dose_number"),
            ],
            vec![Number(1.0), Text("BCG"), Text("left arm"), Date(45689.0), Number(1.0)],
            vec![],
            vec![Number(2.0), Text("OPV"), Empty, Date(45691.0), Number(2.0)],
        ],
    )
}

#[test]
fn test_excel_row_source_skips_title_and_blank_rows() {
    let dir = TempDir::new().unwrap();
    let upload = write_immunization_register(dir.path());

    let options = SourceOptions {
        has_header_row: true,
        skip_lines: 1,
    };
    let source = open_row_source(&upload, &options).unwrap();
    assert_eq!(
        source.headers(),
        &[
            "patient_id",
            "vaccine_type",
            "",
            "administration_date",
            "dose_number"
        ]
    );

    let rows: Vec<_> = source.map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2, "空行不计入");

    // 数字不带小数点，日期序列号转 YYYY-MM-DD，空表头列不进入行
    assert_eq!(rows[0]["patient_id"], "1");
    assert_eq!(rows[0]["vaccine_type"], "BCG");
    assert_eq!(rows[0]["administration_date"], "2025-02-01");
    assert!(!rows[0].contains_key(""));
    assert_eq!(rows[1]["administration_date"], "2025-02-03");
    assert_eq!(rows[1]["dose_number"], "2");
}

#[test]
fn test_excel_row_source_without_header() {
    let dir = TempDir::new().unwrap();
    let upload = write_xlsx(
        dir.path(),
        "facilities.xlsx",
        &[
            vec![XlsxCell::Text("HF-010"), XlsxCell::Text("Kivunge")],
            vec![XlsxCell::Text("HF-011"), XlsxCell::Text("Makunduchi")],
        ],
    );

    let options = SourceOptions {
        has_header_row: false,
        skip_lines: 0,
    };
    let source = open_row_source(&upload, &options).unwrap();
    assert_eq!(source.headers(), &["column_1", "column_2"]);

    let rows: Vec<_> = source.map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["column_1"], "HF-010");
    assert_eq!(rows[1]["column_2"], "Makunduchi");
}

#[tokio::test]
async fn test_excel_file_imported() {
    let (_db, db_path) = create_test_db().unwrap();
    let registry = test_registry();
    let repo = open_repo(&db_path, registry.clone());
    seed_facility_and_patients(repo.as_ref()).await;
    let dir = TempDir::new().unwrap();
    let upload = write_immunization_register(dir.path());

    let mut options = ImportOptions::new("immunizations", identity_mappings(IMMUNIZATION_FIELDS));
    options.skip_lines = 1;

    let importer = EntityImporter::new(registry, repo.clone());
    let result = importer.import_file(&upload, &options).await.unwrap();

    assert_eq!(result.total, 2);
    assert_eq!(result.valid_count, 2);
    assert_eq!(result.created_count, 2);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(!upload.exists(), "导入结束后上传文件应被删除");

    let stored = repo
        .query_records(EntityKind::Immunizations, &RecordQuery::new())
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored
        .iter()
        .any(|r| r.display("administration_date") == "2025-02-01"));
}

// ==========================================
// 原子回滚: 唯一性预检看不到已有值，由数据库约束拦截
// ==========================================

/// 唯一性预检始终返回空（模拟并发导入间的竞争窗口）
struct BlindUniquenessRepository {
    inner: Arc<dyn RecordRepository>,
}

#[async_trait]
impl RecordRepository for BlindUniquenessRepository {
    async fn exists(
        &self,
        entity: EntityKind,
        field: &str,
        value: &TypedValue,
    ) -> RepositoryResult<bool> {
        self.inner.exists(entity, field, value).await
    }

    async fn find_existing_values(
        &self,
        _entity: EntityKind,
        _field: &str,
        _values: &[TypedValue],
    ) -> RepositoryResult<Vec<TypedValue>> {
        Ok(Vec::new())
    }

    async fn bulk_insert(
        &self,
        entity: EntityKind,
        rows: &[FieldValues],
    ) -> RepositoryResult<usize> {
        self.inner.bulk_insert(entity, rows).await
    }

    async fn query_records(
        &self,
        entity: EntityKind,
        query: &RecordQuery,
    ) -> RepositoryResult<Vec<StoredRecord>> {
        self.inner.query_records(entity, query).await
    }

    async fn count(&self, entity: EntityKind, query: &RecordQuery) -> RepositoryResult<usize> {
        self.inner.count(entity, query).await
    }

    async fn count_grouped(
        &self,
        entity: EntityKind,
        group_field: &str,
        query: &RecordQuery,
    ) -> RepositoryResult<Vec<(String, usize)>> {
        self.inner.count_grouped(entity, group_field, query).await
    }

    async fn find_by_id(
        &self,
        entity: EntityKind,
        id: i64,
    ) -> RepositoryResult<Option<StoredRecord>> {
        self.inner.find_by_id(entity, id).await
    }
}

#[tokio::test]
async fn test_unique_violation_rolls_back_whole_batch() {
    let (_db, db_path) = create_test_db().unwrap();
    let registry: Arc<ImportConfigRegistry> = test_registry();
    let repo = open_repo(&db_path, registry.clone());
    seed_facility_and_patients(repo.as_ref()).await;

    let blind: Arc<dyn RecordRepository> = Arc::new(BlindUniquenessRepository {
        inner: repo.clone(),
    });
    let dir = TempDir::new().unwrap();
    let upload = write_csv(
        dir.path(),
        "facilities.csv",
        &[
            "facility_code,name,facility_type",
            "HF-002,Kivunge,health_center",
            "HF-001,Mnazi Mmoja Annex,clinic",
        ],
    );

    let importer = EntityImporter::new(registry, blind);
    let result = importer
        .import_file(
            &upload,
            &ImportOptions::new(
                "facilities",
                identity_mappings(&["facility_code", "name", "facility_type"]),
            ),
        )
        .await;

    assert!(
        matches!(result, Err(ImportError::Persistence(_))),
        "Expected Persistence, got {:?}",
        result
    );
    // HF-002 也未落库
    assert_eq!(
        repo.count(EntityKind::Facilities, &RecordQuery::new())
            .await
            .unwrap(),
        1
    );
    assert!(!upload.exists());
}

#[tokio::test]
async fn test_unsupported_extension_rejected() {
    let (_db, db_path) = create_test_db().unwrap();
    let registry = test_registry();
    let repo = open_repo(&db_path, registry.clone());
    let dir = TempDir::new().unwrap();
    let upload = write_csv(dir.path(), "patients.txt", &["first_name", "Asha"]);

    let importer = EntityImporter::new(registry, repo);
    let result = importer
        .import_file(
            &upload,
            &ImportOptions::new("patients", identity_mappings(PATIENT_FIELDS)),
        )
        .await;
    assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
}
