//! coursetree 命令行入口
//!
//! ```text
//! coursetree [--config PATH] import <courses.json> [--merge]
//! coursetree [--config PATH] validate
//! coursetree [--config PATH] show <CODE>
//! coursetree [--config PATH] resolve <CODE> [--completed A,B] [--in-progress C]
//! ```

use anyhow::Result;
use coursetree::core::catalog::CatalogSnapshot;
use coursetree::core::validator::ValidationOutcome;
use coursetree::storage::config::{AppConfig, ConfigManager};
use coursetree::storage::database::{CatalogStore, ImportMode};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "用法:
  coursetree [--config PATH] import <courses.json> [--merge]
  coursetree [--config PATH] validate
  coursetree [--config PATH] show <CODE>
  coursetree [--config PATH] resolve <CODE> [--completed A,B,...] [--in-progress C,...]";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Import { path: PathBuf, mode: ImportMode },
    Validate,
    Show { code: String },
    Resolve {
        code: String,
        completed: Vec<String>,
        in_progress: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cli {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Cli> {
    let mut args = args.into_iter();
    let mut config_path = None;

    let sub = loop {
        match args.next() {
            Some(flag) if flag == "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config 缺少路径"))?;
                config_path = Some(PathBuf::from(path));
            }
            Some(sub) => break sub,
            None => return Err(anyhow::anyhow!("缺少子命令")),
        }
    };

    let command = match sub.as_str() {
        "import" => {
            let mut path = None;
            let mut mode = ImportMode::Replace;
            for arg in args {
                match arg.as_str() {
                    "--merge" => mode = ImportMode::Merge,
                    _ if path.is_none() => path = Some(PathBuf::from(arg)),
                    _ => return Err(anyhow::anyhow!("多余的参数: {}", arg)),
                }
            }
            let path = path.ok_or_else(|| anyhow::anyhow!("import 缺少文件路径"))?;
            Command::Import { path, mode }
        }
        "validate" => Command::Validate,
        "show" => {
            let code = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("show 缺少课程代码"))?;
            Command::Show { code }
        }
        "resolve" => {
            let code = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("resolve 缺少课程代码"))?;
            let mut completed = Vec::new();
            let mut in_progress = Vec::new();
            while let Some(flag) = args.next() {
                let target = match flag.as_str() {
                    "--completed" => &mut completed,
                    "--in-progress" => &mut in_progress,
                    other => return Err(anyhow::anyhow!("未知参数: {}", other)),
                };
                let list = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{} 缺少课程列表", flag))?;
                target.extend(split_list(&list));
            }
            Command::Resolve {
                code,
                completed,
                in_progress,
            }
        }
        other => return Err(anyhow::anyhow!("未知子命令: {}", other)),
    };

    Ok(Cli {
        config_path,
        command,
    })
}

fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_snapshot(config: &AppConfig) -> Result<CatalogSnapshot> {
    let store = CatalogStore::open(&config.database_path())?;
    let report = store.load_graph(config.load_options())?;
    Ok(CatalogSnapshot::with_max_depth(
        report.graph,
        config.max_tree_depth,
    ))
}

/// 返回进程退出码：0 成功，1 发现先修环，2 课程不存在，3 需求树无法求值
fn run(command: Command, config: &AppConfig) -> Result<u8> {
    match command {
        Command::Import { path, mode } => {
            let mut store = CatalogStore::open(&config.database_path())?;
            let summary = store.import_json_file(&path, mode)?;
            println!(
                "已导入 {} 门课程（跳过 {}，重复 {}）",
                summary.imported, summary.skipped, summary.duplicates
            );
            Ok(0)
        }
        Command::Validate => {
            let snapshot = load_snapshot(config)?;
            let report = snapshot.report();
            println!("课程数: {}", snapshot.graph().len());
            println!("悬空引用: {}", report.dangling.len());
            for (course, relation) in &report.empty_alternatives {
                println!("无法满足的{}要求: {}", relation, course);
            }
            match &report.outcome {
                ValidationOutcome::Valid => {
                    println!("未发现先修环");
                    Ok(0)
                }
                ValidationOutcome::CycleDetected(cycle) => {
                    let names: Vec<&str> = cycle.iter().map(|c| c.as_str()).collect();
                    println!("先修环: {}", names.join(" -> "));
                    println!("位于环上的课程: {}", report.cyclic_courses.len());
                    Ok(1)
                }
            }
        }
        Command::Show { code } => {
            let snapshot = load_snapshot(config)?;
            match snapshot.get(&code) {
                Ok(course) => {
                    println!("{}", serde_json::to_string_pretty(course)?);
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("{}: {}", e.public_message(), code);
                    Ok(2)
                }
            }
        }
        Command::Resolve {
            code,
            completed,
            in_progress,
        } => {
            let snapshot = load_snapshot(config)?;
            match snapshot.resolve_codes(&code, &completed, &in_progress) {
                Ok(verdict) => {
                    println!("{}", serde_json::to_string_pretty(&verdict)?);
                    Ok(0)
                }
                Err(e) if e.is_not_found() => {
                    eprintln!("{}: {}", e.public_message(), code);
                    Ok(2)
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    eprintln!("{}", e.public_message());
                    Ok(3)
                }
            }
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return Ok(ExitCode::from(64));
        }
    };

    let config_path = cli
        .config_path
        .clone()
        .unwrap_or_else(ConfigManager::default_path);
    let config = ConfigManager::new(config_path).load()?;

    // 初始化日志
    init_tracing(&config.log_filter);
    tracing::debug!("数据库: {}", config.database_path().display());

    Ok(ExitCode::from(run(cli.command, &config)?))
}
