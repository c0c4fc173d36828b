// ==========================================
// 卫生机构数据交换引擎 - 应用层
// ==========================================
// 职责: 组装注册表、仓储与 API 实例，供外层路由/命令行使用
// ==========================================

pub mod state;

// 重导出
pub use state::AppState;
