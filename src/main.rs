//! plan-crosscheck - 放疗计划参数交叉核对
//!
//! 读取宿主导出的计划快照（JSON），按本院规则审核并输出结果。
//! 任一计划出现 Error 时退出码非零。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plan_crosscheck::core::models::{PlanSnapshot, Severity};
use plan_crosscheck::core::report::ReviewReport;
use plan_crosscheck::core::rule_engine::RuleEngine;
use plan_crosscheck::logging;
use plan_crosscheck::storage::config::ConfigManager;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// 配置文件路径（默认使用用户配置目录）
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 审核计划快照文件或目录
    Review {
        /// 快照 JSON 文件，或递归查找 *.json 的目录
        #[clap(required = true)]
        paths: Vec<PathBuf>,

        /// 以 JSON 输出报告
        #[clap(long)]
        json: bool,
    },
    /// 配置文件管理
    Config {
        #[clap(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// 写入默认配置
    Init,
    /// 打印当前生效的配置
    Show,
}

fn main() -> Result<ExitCode> {
    logging::init();
    let args = Args::parse();
    let manager = ConfigManager::new(args.config.unwrap_or_else(ConfigManager::default_path));

    match args.cmd {
        Command::Review { paths, json } => review(&manager, &paths, json),
        Command::Config { action: ConfigAction::Init } => {
            manager.reset()?;
            println!("{}", manager.path().display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { action: ConfigAction::Show } => {
            println!("{}", serde_json::to_string_pretty(&manager.load()?)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// 展开参数中的目录，按路径排序
fn collect_snapshots(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path) {
                let entry = entry.with_context(|| format!("遍历目录失败: {}", path.display()))?;
                let is_json = entry.path().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                if entry.file_type().is_file() && is_json {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    Ok(files)
}

fn load_snapshot(path: &Path) -> Result<PlanSnapshot> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("读取计划快照失败: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("解析计划快照失败: {}", path.display()))
}

fn review(manager: &ConfigManager, paths: &[PathBuf], json: bool) -> Result<ExitCode> {
    let config = manager.load()?;
    let engine = RuleEngine::new(&config).context("构建规则树失败")?;

    let mut reports = Vec::new();
    for path in collect_snapshots(paths)? {
        let plan = load_snapshot(&path)?;
        let report = ReviewReport::generate(&engine, &plan)
            .with_context(|| format!("审核失败: {}", path.display()))?;
        tracing::info!(
            plan = %report.plan_id,
            errors = report.count(Severity::Error),
            warnings = report.count(Severity::Warning),
            "已审核 {}",
            path.display()
        );
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    let failed = reports
        .iter()
        .any(|r| r.worst_severity() == Some(Severity::Error));
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_report(report: &ReviewReport) {
    println!("== {} ({})", report.plan_id, report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for finding in &report.findings {
        println!("  [{:<7}] {:<36} {}", finding.severity, finding.category, finding.message);
    }
    println!(
        "  {} error(s), {} warning(s), digest {}",
        report.count(Severity::Error),
        report.count(Severity::Warning),
        report.digest.get(..12).unwrap_or(&report.digest)
    );
    println!();
}
