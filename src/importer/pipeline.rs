// ==========================================
// 卫生机构数据交换引擎 - 流式行处理管道
// ==========================================
// 职责: 逐行 校验 → 分区 → 转换
// 规则: 无效行记录 {row, original, errors}，不执行转换
//       total 按到达顺序统计每个非空白行
//       读取中途的 I/O / 解码错误使整个调用失败（不返回部分结果）
// 不涉及: 持久化 / 事务
// ==========================================

use crate::domain::{RawRow, RowError, ValidationOutcome};
use crate::importer::error::ImportOutcome;
use crate::importer::file_parser::{open_row_source, RowSource, SourceOptions};
use std::path::Path;
use tracing::debug;

// ==========================================
// PipelineOutput - 分区结果
// ==========================================
// 不变量: valid.len() + invalid.len() == total
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput<T> {
    pub valid: Vec<T>,
    pub invalid: Vec<RowError>,
    pub total: usize,
}

impl<T> Default for PipelineOutput<T> {
    fn default() -> Self {
        Self {
            valid: Vec::new(),
            invalid: Vec::new(),
            total: 0,
        }
    }
}

/// 在已打开的行源上运行管道
///
/// # 参数
/// - validate_fn: 原始行 → 校验结果
/// - transform_fn: (原始行, 1 起始行号) → 输出行，仅对有效行调用
pub fn process_source<S, T, V, F>(
    source: &mut S,
    mut validate_fn: V,
    mut transform_fn: F,
) -> ImportOutcome<PipelineOutput<T>>
where
    S: RowSource + ?Sized,
    V: FnMut(&RawRow) -> ValidationOutcome,
    F: FnMut(&RawRow, usize) -> T,
{
    let mut output = PipelineOutput::default();

    for row in source {
        let raw = row?;
        output.total += 1;
        let row_number = output.total;

        let outcome = validate_fn(&raw);
        if outcome.valid {
            output.valid.push(transform_fn(&raw, row_number));
        } else {
            output.invalid.push(RowError {
                row: row_number,
                original: raw,
                errors: outcome.errors,
            });
        }
    }

    debug!(
        total = output.total,
        valid = output.valid.len(),
        invalid = output.invalid.len(),
        "管道处理完成"
    );
    Ok(output)
}

/// 打开文件并运行管道
pub fn process<T, V, F>(
    path: &Path,
    options: &SourceOptions,
    validate_fn: V,
    transform_fn: F,
) -> ImportOutcome<PipelineOutput<T>>
where
    V: FnMut(&RawRow) -> ValidationOutcome,
    F: FnMut(&RawRow, usize) -> T,
{
    let mut source = open_row_source(path, options)?;
    process_source(source.as_mut(), validate_fn, transform_fn)
}
