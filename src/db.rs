// ==========================================
// 卫生机构数据交换引擎 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 按实体配置生成表结构（一实体一表）
// ==========================================

use crate::config::{EntityImportConfig, FieldDefinition, ImportConfigRegistry};
use crate::domain::SemanticType;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;
use tracing::{debug, info};

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 按注册表建表（已存在的表保持不变）
pub fn init_schema(conn: &Connection, registry: &ImportConfigRegistry) -> rusqlite::Result<()> {
    let mut ddl = String::from(
        "CREATE TABLE IF NOT EXISTS schema_version (\n    version INTEGER NOT NULL,\n    applied_at TEXT NOT NULL DEFAULT (datetime('now'))\n);\n",
    );
    for config in registry.iter() {
        ddl.push_str(&create_table_sql(config));
        for field in config.foreign_keys().map(|(field, _)| field) {
            ddl.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{field} ON {table}({field});\n",
                table = config.entity.table_name(),
                field = field
            ));
        }
    }
    debug!(tables = registry.iter().count(), "执行建表语句");
    conn.execute_batch(&ddl)?;

    if read_schema_version(conn)?.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
        info!(version = CURRENT_SCHEMA_VERSION, "数据库初始化完成");
    }
    Ok(())
}

/// 单实体建表语句
pub fn create_table_sql(config: &EntityImportConfig) -> String {
    let mut columns = vec!["    id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    columns.extend(config.fields().iter().map(column_sql));
    columns.push("    created_at TEXT NOT NULL DEFAULT (datetime('now'))".to_string());

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n",
        config.entity.table_name(),
        columns.join(",\n")
    )
}

fn column_sql(field: &FieldDefinition) -> String {
    let affinity = match field.semantic_type {
        SemanticType::Number => "NUMERIC",
        SemanticType::Boolean => "INTEGER",
        SemanticType::String | SemanticType::Date => "TEXT",
    };
    let mut sql = format!("    {} {}", field.name, affinity);
    if field.required {
        sql.push_str(" NOT NULL");
    }
    if field.unique {
        sql.push_str(" UNIQUE");
    }
    if let Some(fk) = &field.foreign_key {
        sql.push_str(&format!(
            " REFERENCES {}({})",
            fk.referenced_entity.table_name(),
            fk.referenced_field
        ));
    }
    sql
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityKind;

    #[test]
    fn test_init_schema_creates_every_table() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        let registry = ImportConfigRegistry::builtin().unwrap();

        init_schema(&conn, &registry).unwrap();
        // 重复执行无副作用
        init_schema(&conn, &registry).unwrap();

        for kind in EntityKind::ALL {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [kind.table_name()],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "缺少表: {}", kind);
        }
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_create_table_sql_constraints() {
        let registry = ImportConfigRegistry::builtin().unwrap();
        let sql = create_table_sql(registry.get(EntityKind::Births).unwrap());
        assert!(sql.contains("mother_id NUMERIC NOT NULL REFERENCES patients(id)"));
        assert!(sql.contains("birth_certificate_number TEXT UNIQUE"));
        assert!(sql.contains("is_live_birth INTEGER"));
    }

    #[test]
    fn test_foreign_key_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn, &ImportConfigRegistry::builtin().unwrap()).unwrap();

        let result = conn.execute(
            "INSERT INTO deaths (patient_id, date_of_death, cause_of_death) VALUES (99, '2025-01-01', 'malaria')",
            [],
        );
        assert!(result.is_err());
    }
}
