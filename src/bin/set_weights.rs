//! 更新单台主机的隧道权重
//!
//! 原子替换 `<weights_dir>/h<host>.txt`，供 steering agent 轮询读取。

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use wtunnels_rs::Error;
use wtunnels_rs::config::FabricConfig;
use wtunnels_rs::weights::{WeightConfig, WeightConfigWriter};

#[derive(Debug, Parser)]
#[command(name = "set-weights", about = "原子更新主机的隧道权重文件")]
struct Args {
    /// 源主机号
    #[arg(long)]
    host: usize,

    /// JSON 配置文件；给出时 hosts / weights_dir / 端口参数取自配置
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 2)]
    hosts: usize,

    #[arg(long)]
    weights_dir: Option<PathBuf>,

    #[command(flatten)]
    source: WeightSource,

    /// `--weights` 已包含本机占位行，不再插入
    #[arg(long, conflicts_with = "uniform")]
    no_self_row: bool,

    #[arg(long)]
    quiet: bool,
}

/// 权重来源，二选一
#[derive(Debug, clap::Args)]
#[group(required = true, multiple = false)]
struct WeightSource {
    /// 各目的主机的权重，行之间用 `;` 分隔、隧道之间用 `,` 分隔，例如 `5,6,7;2,3`
    #[arg(long)]
    weights: Option<String>,

    /// 每个目的主机的前 N 条隧道权重均为 1
    #[arg(long)]
    uniform: Option<usize>,
}

fn run(args: &Args) -> Result<PathBuf, Error> {
    let mut cfg = match &args.config {
        Some(path) => FabricConfig::from_path(path)?,
        None => FabricConfig::new(args.hosts, 1),
    };
    if let Some(dir) = &args.weights_dir {
        cfg.weights_dir = dir.clone();
    }
    let ports = cfg.ports.validate()?;
    fs::create_dir_all(&cfg.weights_dir)?;
    let writer = WeightConfigWriter::new(&cfg.weights_dir, ports, cfg.hosts);

    let path = match (&args.source.weights, args.source.uniform) {
        (Some(text), _) => {
            let rows = WeightConfig::parse(&text.replace(';', "\n"))?
                .rows()
                .to_vec();
            writer.write(args.host, rows, !args.no_self_row)?
        }
        (None, Some(tunnels)) => {
            let uniform = WeightConfig::uniform(args.host, cfg.hosts, tunnels);
            writer.write_config(args.host, &uniform)?
        }
        (None, None) => unreachable!("clap requires one of --weights / --uniform"),
    };
    Ok(path)
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if args.quiet {
            tracing_subscriber::EnvFilter::new("off")
        } else {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        })
        .with_writer(io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    match run(&args) {
        Ok(path) => {
            println!("wrote {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("set-weights: {e}");
            ExitCode::FAILURE
        }
    }
}
