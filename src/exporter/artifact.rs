// ==========================================
// 卫生机构数据交换引擎 - 导出产物文件
// ==========================================
// 规则: 文件名 = 前缀_时间戳(毫秒)_随机后缀.扩展名
//       以 create_new 打开，已有文件永不覆盖
//       写出失败时删除不完整文件
// 说明: 核心不负责清理历史产物
// ==========================================

use crate::exporter::error::ExportResult;
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

pub struct ArtifactWriter {
    export_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// 生成唯一文件名
    pub fn unique_file_name(prefix: &str, extension: &str) -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}_{}_{}.{}", prefix, timestamp, &suffix[..8], extension)
    }

    /// 创建新文件并写入
    ///
    /// # 返回
    /// - Ok((文件路径, 文件名))
    pub fn write_new<F>(
        &self,
        prefix: &str,
        extension: &str,
        write_fn: F,
    ) -> ExportResult<(PathBuf, String)>
    where
        F: FnOnce(&mut dyn Write) -> ExportResult<()>,
    {
        fs::create_dir_all(&self.export_dir)?;

        let file_name = Self::unique_file_name(prefix, extension);
        let file_path = self.export_dir.join(&file_name);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)?;

        match write_into(file, write_fn) {
            Ok(()) => {
                debug!(path = %file_path.display(), "导出文件已写出");
                Ok((file_path, file_name))
            }
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&file_path) {
                    warn!(path = %file_path.display(), error = %remove_err, "不完整导出文件删除失败");
                }
                Err(e)
            }
        }
    }
}

fn write_into<F>(file: File, write_fn: F) -> ExportResult<()>
where
    F: FnOnce(&mut dyn Write) -> ExportResult<()>,
{
    let mut writer = BufWriter::new(file);
    write_fn(&mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::error::ExportError;
    use tempfile::TempDir;

    #[test]
    fn test_file_names_are_unique() {
        let a = ArtifactWriter::unique_file_name("patients_export", "csv");
        let b = ArtifactWriter::unique_file_name("patients_export", "csv");
        assert_ne!(a, b);
        assert!(a.starts_with("patients_export_"));
        assert!(a.ends_with(".csv"));
    }

    #[test]
    fn test_write_new_creates_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("exports"));

        let (path, name) = writer
            .write_new("births_export", "csv", |out| {
                out.write_all(b"a,b\n")?;
                Ok(())
            })
            .unwrap();

        assert!(path.exists());
        assert!(path.ends_with(&name));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n");
    }

    #[test]
    fn test_failed_write_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        let result = writer.write_new("deaths_export", "csv", |out| {
            out.write_all(b"partial")?;
            Err(ExportError::Csv("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
