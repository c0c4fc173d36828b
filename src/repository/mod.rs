// ==========================================
// 卫生机构数据交换引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有值使用参数化绑定；列名只来自实体配置
// ==========================================

pub mod error;
pub mod record_repo;
pub mod record_repo_impl;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use record_repo::{DateRange, RecordQuery, RecordRepository};
pub use record_repo_impl::SqliteRecordRepository;
