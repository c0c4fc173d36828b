// ==========================================
// 卫生机构数据交换引擎 - 实体记录 Repository 实现
// ==========================================
// 职责: 基于 rusqlite 的通用实体表读写
// 约束: 列名只允许来自实体配置（防止拼接任意 SQL）
// ==========================================

use crate::config::ImportConfigRegistry;
use crate::db::open_sqlite_connection;
use crate::domain::{EntityKind, FieldValues, SemanticType, StoredRecord, TypedValue};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_repo::{RecordQuery, RecordRepository};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, ToSql};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// IN 查询单批参数上限（低于 SQLite 默认变量上限）
const IN_CHUNK_SIZE: usize = 500;

// ==========================================
// TypedValue ↔ SQLite 值
// ==========================================
// 日期以 YYYY-MM-DD 文本存储，布尔以 0/1 存储，整数值数字按 INTEGER 绑定

fn sql_value(value: &TypedValue) -> Value {
    match value {
        TypedValue::Text(s) => Value::Text(s.clone()),
        TypedValue::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Value::Integer(*n as i64),
        TypedValue::Number(n) => Value::Real(*n),
        TypedValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
        TypedValue::Bool(b) => Value::Integer(i64::from(*b)),
    }
}

impl ToSql for TypedValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(sql_value(self)))
    }
}

fn typed_from_sql(value: Value, semantic_type: SemanticType) -> Option<TypedValue> {
    match (value, semantic_type) {
        (Value::Null, _) | (Value::Blob(_), _) => None,
        (Value::Integer(i), SemanticType::Boolean) => Some(TypedValue::Bool(i != 0)),
        (Value::Integer(i), _) => Some(TypedValue::Number(i as f64)),
        (Value::Real(f), _) => Some(TypedValue::Number(f)),
        (Value::Text(s), SemanticType::Date) => {
            Some(match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                Ok(d) => TypedValue::Date(d),
                Err(_) => TypedValue::Text(s),
            })
        }
        (Value::Text(s), SemanticType::Number) => Some(match s.parse::<f64>() {
            Ok(n) => TypedValue::Number(n),
            Err(_) => TypedValue::Text(s),
        }),
        (Value::Text(s), _) => Some(TypedValue::Text(s)),
    }
}

// ==========================================
// SqliteRecordRepository
// ==========================================
pub struct SqliteRecordRepository {
    conn: Arc<Mutex<Connection>>,
    registry: Arc<ImportConfigRegistry>,
}

impl SqliteRecordRepository {
    /// 创建新的 Repository 实例
    pub fn new(db_path: &str, registry: Arc<ImportConfigRegistry>) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            registry,
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(
        conn: Arc<Mutex<Connection>>,
        registry: Arc<ImportConfigRegistry>,
    ) -> Self {
        Self { conn, registry }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 列名校验 + 语义类型（含 id / created_at 系统列）
    fn column_type(&self, entity: EntityKind, field: &str) -> RepositoryResult<SemanticType> {
        match field {
            "id" => Ok(SemanticType::Number),
            "created_at" => Ok(SemanticType::String),
            _ => self
                .registry
                .get(entity)
                .ok_or_else(|| RepositoryError::UnknownEntity(entity.to_string()))?
                .data_type(field)
                .ok_or_else(|| RepositoryError::UnknownField {
                    entity: entity.to_string(),
                    field: field.to_string(),
                }),
        }
    }

    /// 查询列（id + 业务列 + created_at）
    fn select_columns(&self, entity: EntityKind) -> RepositoryResult<Vec<(String, SemanticType)>> {
        let config = self
            .registry
            .get(entity)
            .ok_or_else(|| RepositoryError::UnknownEntity(entity.to_string()))?;
        let mut columns = vec![("id".to_string(), SemanticType::Number)];
        columns.extend(
            config
                .fields()
                .iter()
                .map(|f| (f.name.clone(), f.semantic_type)),
        );
        columns.push(("created_at".to_string(), SemanticType::String));
        Ok(columns)
    }

    /// WHERE 子句 + 绑定参数
    fn build_where(
        &self,
        entity: EntityKind,
        query: &RecordQuery,
    ) -> RepositoryResult<(String, Vec<Value>)> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for (field, value) in &query.equals {
            self.column_type(entity, field)?;
            clauses.push(format!("{} = ?", field));
            params.push(sql_value(value));
        }

        if let Some(range) = &query.date_range {
            self.column_type(entity, &range.field)?;
            if let Some(from) = range.from {
                clauses.push(format!("date({}) >= date(?)", range.field));
                params.push(Value::Text(from.format("%Y-%m-%d").to_string()));
            }
            if let Some(to) = range.to {
                clauses.push(format!("date({}) <= date(?)", range.field));
                params.push(Value::Text(to.format("%Y-%m-%d").to_string()));
            }
        }

        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        Ok((sql, params))
    }

    fn read_record(
        row: &rusqlite::Row<'_>,
        columns: &[(String, SemanticType)],
    ) -> rusqlite::Result<StoredRecord> {
        let id: i64 = row.get(0)?;
        let mut values = BTreeMap::new();
        for (idx, (name, semantic_type)) in columns.iter().enumerate().skip(1) {
            let raw: Value = row.get(idx)?;
            values.insert(name.clone(), typed_from_sql(raw, *semantic_type));
        }
        Ok(StoredRecord { id, values })
    }
}

#[async_trait]
impl RecordRepository for SqliteRecordRepository {
    async fn exists(
        &self,
        entity: EntityKind,
        field: &str,
        value: &TypedValue,
    ) -> RepositoryResult<bool> {
        self.column_type(entity, field)?;
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
            entity.table_name(),
            field
        );
        let found = conn
            .query_row(&sql, [value], |_row| Ok(true))
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    async fn find_existing_values(
        &self,
        entity: EntityKind,
        field: &str,
        values: &[TypedValue],
    ) -> RepositoryResult<Vec<TypedValue>> {
        let semantic_type = self.column_type(entity, field)?;
        let conn = self.get_conn()?;

        let mut found = Vec::new();
        for chunk in values.chunks(IN_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT DISTINCT {field} FROM {table} WHERE {field} IN ({placeholders})",
                field = field,
                table = entity.table_name(),
                placeholders = placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                row.get::<_, Value>(0)
            })?;
            for raw in rows {
                if let Some(value) = typed_from_sql(raw?, semantic_type) {
                    found.push(value);
                }
            }
        }
        Ok(found)
    }

    async fn bulk_insert(
        &self,
        entity: EntityKind,
        rows: &[FieldValues],
    ) -> RepositoryResult<usize> {
        // 先校验列名，避免事务开启后才失败
        for row in rows {
            for field in row.keys() {
                self.column_type(entity, field)?;
            }
        }

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for row in rows {
            let sql = if row.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", entity.table_name())
            } else {
                let columns: Vec<&str> = row.keys().map(|k| k.as_str()).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    entity.table_name(),
                    columns.join(", "),
                    vec!["?"; columns.len()].join(", ")
                )
            };
            let mut stmt = tx.prepare_cached(&sql)?;
            stmt.execute(params_from_iter(row.values()))?;
            count += 1;
        }

        tx.commit()?;
        debug!(entity = %entity, count = count, "批量插入完成");
        Ok(count)
    }

    async fn query_records(
        &self,
        entity: EntityKind,
        query: &RecordQuery,
    ) -> RepositoryResult<Vec<StoredRecord>> {
        let columns = self.select_columns(entity)?;
        let (where_sql, params) = self.build_where(entity, query)?;
        let column_list: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY id",
            column_list.join(", "),
            entity.table_name(),
            where_sql
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Self::read_record(row, &columns)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn count(&self, entity: EntityKind, query: &RecordQuery) -> RepositoryResult<usize> {
        let (where_sql, params) = self.build_where(entity, query)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", entity.table_name(), where_sql);

        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(n as usize)
    }

    async fn count_grouped(
        &self,
        entity: EntityKind,
        group_field: &str,
        query: &RecordQuery,
    ) -> RepositoryResult<Vec<(String, usize)>> {
        let semantic_type = self.column_type(entity, group_field)?;
        let (where_sql, params) = self.build_where(entity, query)?;
        let sql = format!(
            "SELECT {field}, COUNT(*) AS n FROM {table}{where_sql} GROUP BY {field} ORDER BY n DESC, {field}",
            field = group_field,
            table = entity.table_name(),
            where_sql = where_sql
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let groups = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let raw: Value = row.get(0)?;
                let n: i64 = row.get(1)?;
                let key = typed_from_sql(raw, semantic_type)
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                Ok((key, n as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    async fn find_by_id(
        &self,
        entity: EntityKind,
        id: i64,
    ) -> RepositoryResult<Option<StoredRecord>> {
        let columns = self.select_columns(entity)?;
        let column_list: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            column_list.join(", "),
            entity.table_name()
        );

        let conn = self.get_conn()?;
        let record = conn
            .query_row(&sql, [id], |row| Self::read_record(row, &columns))
            .optional()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> SqliteRecordRepository {
        let registry = Arc::new(ImportConfigRegistry::builtin().unwrap());
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn, &registry).unwrap();
        SqliteRecordRepository::from_connection(Arc::new(Mutex::new(conn)), registry)
    }

    fn facility(code: &str, name: &str) -> FieldValues {
        let mut row = FieldValues::new();
        row.insert(
            "facility_code".to_string(),
            Some(TypedValue::Text(code.to_string())),
        );
        row.insert("name".to_string(), Some(TypedValue::Text(name.to_string())));
        row.insert(
            "facility_type".to_string(),
            Some(TypedValue::Text("clinic".to_string())),
        );
        row.insert("is_active".to_string(), Some(TypedValue::Bool(true)));
        row
    }

    #[tokio::test]
    async fn test_bulk_insert_and_read_back() {
        let repo = setup();
        let inserted = repo
            .bulk_insert(
                EntityKind::Facilities,
                &[facility("F001", "Mwanza Clinic"), facility("F002", "Ilala HC")],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let records = repo
            .query_records(EntityKind::Facilities, &RecordQuery::new())
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].display("facility_code"), "F001");
        assert_eq!(records[0].get("is_active"), Some(&TypedValue::Bool(true)));
        assert!(records[0].get("created_at").is_some());
    }

    #[tokio::test]
    async fn test_bulk_insert_rolls_back_on_unique_violation() {
        let repo = setup();
        let result = repo
            .bulk_insert(
                EntityKind::Facilities,
                &[facility("F001", "A"), facility("F001", "B")],
            )
            .await;
        assert!(matches!(
            result,
            Err(RepositoryError::UniqueConstraintViolation(_))
        ));

        let count = repo
            .count(EntityKind::Facilities, &RecordQuery::new())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_exists_and_existing_values() {
        let repo = setup();
        repo.bulk_insert(EntityKind::Facilities, &[facility("F001", "A")])
            .await
            .unwrap();

        assert!(repo
            .exists(EntityKind::Facilities, "id", &TypedValue::Number(1.0))
            .await
            .unwrap());
        assert!(!repo
            .exists(EntityKind::Facilities, "id", &TypedValue::Number(2.0))
            .await
            .unwrap());

        let existing = repo
            .find_existing_values(
                EntityKind::Facilities,
                "facility_code",
                &[
                    TypedValue::Text("F001".to_string()),
                    TypedValue::Text("F009".to_string()),
                ],
            )
            .await
            .unwrap();
        assert_eq!(existing, vec![TypedValue::Text("F001".to_string())]);
    }

    #[tokio::test]
    async fn test_unknown_field_rejected() {
        let repo = setup();
        let result = repo
            .exists(
                EntityKind::Facilities,
                "name; DROP TABLE facilities",
                &TypedValue::Number(1.0),
            )
            .await;
        assert!(matches!(result, Err(RepositoryError::UnknownField { .. })));
    }

    #[tokio::test]
    async fn test_date_range_and_grouping() {
        let repo = setup();
        repo.bulk_insert(EntityKind::Facilities, &[facility("F001", "A")])
            .await
            .unwrap();

        let mut rows = Vec::new();
        for (vaccine, day) in [("BCG", 5), ("OPV", 12), ("BCG", 20)] {
            let mut patient = FieldValues::new();
            patient.insert("first_name".into(), Some(TypedValue::Text("Asha".into())));
            patient.insert("last_name".into(), Some(TypedValue::Text("Moshi".into())));
            patient.insert("gender".into(), Some(TypedValue::Text("female".into())));
            patient.insert(
                "date_of_birth".into(),
                Some(TypedValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())),
            );
            repo.bulk_insert(EntityKind::Patients, &[patient]).await.unwrap();

            let mut row = FieldValues::new();
            row.insert("patient_id".into(), Some(TypedValue::Number(1.0)));
            row.insert("vaccine_type".into(), Some(TypedValue::Text(vaccine.into())));
            row.insert(
                "administration_date".into(),
                Some(TypedValue::Date(NaiveDate::from_ymd_opt(2025, 3, day).unwrap())),
            );
            rows.push(row);
        }
        repo.bulk_insert(EntityKind::Immunizations, &rows).await.unwrap();

        let query = RecordQuery::new().with_date_range(
            "administration_date",
            NaiveDate::from_ymd_opt(2025, 3, 10),
            NaiveDate::from_ymd_opt(2025, 3, 31),
        );
        let records = repo
            .query_records(EntityKind::Immunizations, &query)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("administration_date"),
            Some(&TypedValue::Date(NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()))
        );

        let groups = repo
            .count_grouped(EntityKind::Immunizations, "vaccine_type", &RecordQuery::new())
            .await
            .unwrap();
        assert_eq!(groups, vec![("BCG".to_string(), 2), ("OPV".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let repo = setup();
        repo.bulk_insert(EntityKind::Facilities, &[facility("F001", "A")])
            .await
            .unwrap();
        let found = repo.find_by_id(EntityKind::Facilities, 1).await.unwrap();
        assert_eq!(found.map(|r| r.display("name")), Some("A".to_string()));
        assert!(repo
            .find_by_id(EntityKind::Facilities, 42)
            .await
            .unwrap()
            .is_none());
    }
}
