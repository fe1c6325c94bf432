//! 生成隧道流表
//!
//! 按扇出拓扑生成全部隧道/回落/丢弃规则，输出为 `ovs-ofctl` 脚本或 JSON。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use wtunnels_rs::Error;
use wtunnels_rs::config::FabricConfig;
use wtunnels_rs::control::{FlowTable, OfctlScript, install_all, install_by_switch};
use wtunnels_rs::flow::{FlowRule, FlowRuleGenerator, RuleKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Ofctl,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "tunnel-rules", about = "扇出拓扑的加权隧道流表生成")]
struct Args {
    /// JSON 配置文件；给出时忽略下面的拓扑/端口参数
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 2)]
    hosts: usize,

    #[arg(long, default_value_t = 2)]
    central_switches: usize,

    #[arg(long)]
    recv_base: Option<u16>,

    #[arg(long)]
    send_base: Option<u16>,

    #[arg(long, value_enum, default_value_t = Format::Ofctl)]
    format: Format,

    /// 输出文件，缺省写到 stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// 先在内存流表里按交换机并发演练一次下发
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    quiet: bool,
}

fn load_config(args: &Args) -> Result<FabricConfig, Error> {
    let mut cfg = match &args.config {
        Some(path) => FabricConfig::from_path(path)?,
        None => FabricConfig::new(args.hosts, args.central_switches),
    };
    if args.config.is_none() {
        if let Some(base) = args.recv_base {
            cfg.ports.recv_base = base;
        }
        if let Some(base) = args.send_base {
            cfg.ports.send_base = base;
        }
    }
    Ok(cfg)
}

fn summarize(rules: &[FlowRule]) -> (usize, usize, usize) {
    rules.iter().fold((0, 0, 0), |(t, f, d), r| match r.kind {
        RuleKind::Tunnel { .. } => (t + 1, f, d),
        RuleKind::Fallback { .. } => (t, f + 1, d),
        RuleKind::Drop => (t, f, d + 1),
    })
}

fn run(args: &Args) -> Result<(), Error> {
    let cfg = load_config(args)?;
    let fabric = cfg.build()?;
    let rules = fabric.generate_rules()?;

    if args.dry_run {
        let table = FlowTable::new();
        let report = install_by_switch(&table, &rules)?;
        eprintln!(
            "dry run: installed={} switches={} table_entries={}",
            report.installed,
            report.switches,
            table.len()
        );
    }

    let out: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    match args.format {
        Format::Ofctl => {
            let script = OfctlScript::new(out);
            install_all(&script, &rules)?;
            script.into_inner().flush()?;
        }
        Format::Json => {
            let mut out = out;
            serde_json::to_writer_pretty(&mut out, &rules).map_err(io::Error::other)?;
            writeln!(out)?;
            out.flush()?;
        }
    }

    let (tunnel, fallback, drop) = summarize(&rules);
    eprintln!(
        "rules={} tunnel={} fallback={} drop={} expected={}",
        rules.len(),
        tunnel,
        fallback,
        drop,
        FlowRuleGenerator::rule_count(cfg.hosts, cfg.central_switches)
    );
    Ok(())
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
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tunnel-rules: {e}");
            ExitCode::FAILURE
        }
    }
}
