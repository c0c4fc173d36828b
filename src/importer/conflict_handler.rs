// ==========================================
// 卫生机构数据交换引擎 - 冲突处理器实现
// ==========================================
// 职责: 检测唯一字段的文件内重复 / 与库中已有值重复
// 比较键: TypedValue::key()（数字按整数输出，日期按 YYYY-MM-DD）
// ==========================================

use crate::domain::{TransformedRow, TypedValue};
use crate::importer::importer_trait::ConflictHandler as ConflictHandlerTrait;
use std::collections::{HashMap, HashSet};

pub struct ConflictHandler;

impl ConflictHandlerTrait for ConflictHandler {
    /// 检测同一文件内重复值
    ///
    /// # 返回
    /// - Vec<(行号, 值)>: 重复记录列表（不包括第一次出现）
    fn detect_duplicates(&self, rows: &[TransformedRow], field: &str) -> Vec<(usize, String)> {
        let mut first_occurrence: HashMap<String, usize> = HashMap::new();
        let mut duplicates = Vec::new();

        for row in rows {
            if let Some(value) = row.get(field) {
                let key = value.key();
                if first_occurrence.contains_key(&key) {
                    duplicates.push((row.row_number, key));
                } else {
                    first_occurrence.insert(key, row.row_number);
                }
            }
        }

        duplicates
    }

    /// 检测与库中已有值重复
    ///
    /// # 参数
    /// - existing: 库中已存在的值（由仓储按本批候选值查询）
    fn detect_cross_batch_duplicates(
        &self,
        rows: &[TransformedRow],
        field: &str,
        existing: &[TypedValue],
    ) -> Vec<(usize, String)> {
        let existing_set: HashSet<String> = existing.iter().map(|v| v.key()).collect();

        rows.iter()
            .filter_map(|row| {
                let key = row.get(field)?.key();
                existing_set
                    .contains(&key)
                    .then_some((row.row_number, key))
            })
            .collect()
    }
}
