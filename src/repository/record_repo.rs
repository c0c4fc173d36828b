// ==========================================
// 卫生机构数据交换引擎 - 实体记录 Repository Trait
// ==========================================
// 职责: 定义导入/导出共用的数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据读写
// ==========================================

use crate::domain::{EntityKind, FieldValues, StoredRecord, TypedValue};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDate;

// ==========================================
// 查询条件
// ==========================================

/// 日期区间（闭区间，按日期部分比较）
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub field: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// 记录查询条件（等值过滤 AND 日期区间）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub equals: Vec<(String, TypedValue)>,
    pub date_range: Option<DateRange>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_equals(mut self, field: &str, value: TypedValue) -> Self {
        self.equals.push((field.to_string(), value));
        self
    }

    pub fn with_date_range(
        mut self,
        field: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Self {
        if from.is_some() || to.is_some() {
            self.date_range = Some(DateRange {
                field: field.to_string(),
                from,
                to,
            });
        }
        self
    }
}

// ==========================================
// RecordRepository Trait
// ==========================================
// 实现者: SqliteRecordRepository
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// 是否存在 field = value 的记录（外键预检）
    async fn exists(
        &self,
        entity: EntityKind,
        field: &str,
        value: &TypedValue,
    ) -> RepositoryResult<bool>;

    /// 返回 values 中已存在于库中的值（唯一性预检）
    async fn find_existing_values(
        &self,
        entity: EntityKind,
        field: &str,
        values: &[TypedValue],
    ) -> RepositoryResult<Vec<TypedValue>>;

    /// 单事务批量插入
    ///
    /// # 返回
    /// - Ok(usize): 插入记录数
    /// - Err: 任意一行失败则整个事务回滚
    async fn bulk_insert(&self, entity: EntityKind, rows: &[FieldValues])
        -> RepositoryResult<usize>;

    /// 条件查询（按 id 升序）
    async fn query_records(
        &self,
        entity: EntityKind,
        query: &RecordQuery,
    ) -> RepositoryResult<Vec<StoredRecord>>;

    async fn count(&self, entity: EntityKind, query: &RecordQuery) -> RepositoryResult<usize>;

    /// 分组计数（按数量降序；空值分组的键为空串）
    async fn count_grouped(
        &self,
        entity: EntityKind,
        group_field: &str,
        query: &RecordQuery,
    ) -> RepositoryResult<Vec<(String, usize)>>;

    async fn find_by_id(
        &self,
        entity: EntityKind,
        id: i64,
    ) -> RepositoryResult<Option<StoredRecord>>;
}
