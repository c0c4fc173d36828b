// 卫生机构数据交换引擎 - 命令行工具
//
// Usage:
//   facility-data-io analyze <file> [--no-header]
//   facility-data-io import <file> <entity> [--map "Source Column=field"]... [--no-header] [--skip N]
//   facility-data-io export <entity> [--format csv|excel|pdf] [--field name]... [key=value]...
//   facility-data-io report <report_type> [--facility ID] [--from DATE] [--to DATE] [--format F]
//
// 数据库/导出目录由 FACILITY_IO_* 环境变量配置；结果以 JSON 打印到 stdout。
// 注意: import 结束后上传文件会被删除。

use clap::{Parser, Subcommand};
use facility_data_io::api::{AnalyzeRequest, ExportRequest, ImportRequest, ReportRequest};
use facility_data_io::{logging, AppState, ExchangeConfig};
use serde::Serialize;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(author, version, about = "卫生机构数据交换引擎 - 表格导入/导出与报表", long_about = None)]
struct Cli {
    /// 以 JSON 行格式输出日志（stderr）
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 分析上传文件：表头、建议类型、建议实体与样例行
    Analyze {
        file: String,

        /// 首行不是表头（列名为 column_1..column_n）
        #[arg(long)]
        no_header: bool,
    },

    /// 导入文件到实体表（结束后删除上传文件）
    Import {
        file: String,
        entity: String,

        /// 列映射 "Source Column=field"，可重复
        #[arg(long = "map", value_name = "SOURCE=FIELD", value_parser = parse_pair)]
        mappings: Vec<(String, String)>,

        #[arg(long)]
        no_header: bool,

        /// 表头之前丢弃的行数
        #[arg(long, default_value_t = 0)]
        skip: usize,
    },

    /// 按过滤条件导出实体数据
    Export {
        entity: String,

        /// csv | excel | pdf（默认 csv）
        #[arg(long)]
        format: Option<String>,

        /// 导出字段，可重复（默认使用实体的导出字段）
        #[arg(long = "field")]
        fields: Vec<String>,

        /// 过滤条件 key=value（dateFrom/dateTo 为日期范围）
        #[arg(value_name = "KEY=VALUE", value_parser = parse_pair)]
        filters: Vec<(String, String)>,
    },

    /// 生成汇总报表
    Report {
        /// facility_summary | immunization_coverage | disease_surveillance
        report_type: String,

        #[arg(long)]
        facility: Option<i64>,

        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        /// csv | excel | pdf（默认 pdf）
        #[arg(long)]
        format: Option<String>,
    },
}

/// "Source Column=field" → (源列, 目标字段)
fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("格式应为 key=value: {}", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.json_logs {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("{} v{}", facility_data_io::APP_NAME, facility_data_io::VERSION);
    let state = AppState::new(ExchangeConfig::from_env()?)?;
    tracing::info!("使用数据库: {}", state.get_db_path());

    match cli.command {
        Command::Analyze { file, no_header } => {
            let request = AnalyzeRequest {
                file_path: file,
                has_header_row: !no_header,
            };
            print_json(&state.import_api.analyze_file(&request).await?)?;
        }
        Command::Import {
            file,
            entity,
            mappings,
            no_header,
            skip,
        } => {
            let request = ImportRequest {
                entity,
                mappings: mappings.into_iter().collect(),
                has_header_row: !no_header,
                skip_lines: skip,
            };
            print_json(&state.import_api.import_file(&file, &request).await?)?;
        }
        Command::Export {
            entity,
            format,
            fields,
            filters,
        } => {
            let request = ExportRequest {
                entity,
                format,
                filters: filters
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
                fields,
            };
            print_json(&state.export_api.export_data(&request).await?)?;
        }
        Command::Report {
            report_type,
            facility,
            from,
            to,
            format,
        } => {
            let request = ReportRequest {
                report_type,
                facility_id: facility,
                date_from: from,
                date_to: to,
                format,
            };
            print_json(&state.export_api.generate_report(&request).await?)?;
        }
    }

    Ok(())
}
