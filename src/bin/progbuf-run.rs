use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use riscv_progbuf::{access, Hart, HartConfig, Width};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run program buffer accesses against a simulated RISC-V hart"
)]
struct Opts {
    /// Hart configuration (JSON, see HartConfig)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Override xlen (32 or 64)
    #[arg(long)]
    xlen: Option<u32>,
    /// Override the number of program buffer slots
    #[arg(long)]
    progbuf_size: Option<usize>,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
    /// r<N>:ADDR, w<N>:ADDR=VALUE, csrr:CSR or csrw:CSR=VALUE (N in bytes)
    #[arg(value_name = "OP", required = true)]
    ops: Vec<Op>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Op {
    Read { width: Width, addr: u64 },
    Write { width: Width, addr: u64, value: u64 },
    CsrRead { csr: u16 },
    CsrWrite { csr: u16, value: u64 },
}

#[derive(Debug, Serialize)]
struct Record {
    #[serde(flatten)]
    op: Op,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<u64>,
}

fn parse_num(s: &str) -> Result<u64> {
    let t = s.trim();
    let v = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        t.parse::<u64>()
    };
    v.with_context(|| format!("bad number: {s}"))
}

fn parse_csr(s: &str) -> Result<u16> {
    let csr = parse_num(s)?;
    if csr > 0xFFF {
        return Err(anyhow!("csr {csr:#x} out of range"));
    }
    Ok(csr as u16)
}

fn parse_width(s: &str) -> Result<Width> {
    let bytes = s.parse::<usize>().with_context(|| format!("bad width: {s}"))?;
    Width::from_bytes(bytes).ok_or_else(|| anyhow!("width must be 1, 2, 4 or 8, not {bytes}"))
}

impl FromStr for Op {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (head, rest) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("expected <op>:<operand>, got {s}"))?;
        let assign = |rest: &str| -> Result<(u64, u64)> {
            let (lhs, rhs) = rest
                .split_once('=')
                .ok_or_else(|| anyhow!("expected <target>=<value>, got {rest}"))?;
            Ok((parse_num(lhs)?, parse_num(rhs)?))
        };
        match head {
            "csrr" => Ok(Op::CsrRead { csr: parse_csr(rest)? }),
            "csrw" => {
                let (lhs, rhs) = rest
                    .split_once('=')
                    .ok_or_else(|| anyhow!("expected <csr>=<value>, got {rest}"))?;
                Ok(Op::CsrWrite { csr: parse_csr(lhs)?, value: parse_num(rhs)? })
            }
            _ if head.starts_with('r') => Ok(Op::Read {
                width: parse_width(&head[1..])?,
                addr: parse_num(rest)?,
            }),
            _ if head.starts_with('w') => {
                let (addr, value) = assign(rest)?;
                Ok(Op::Write { width: parse_width(&head[1..])?, addr, value })
            }
            _ => Err(anyhow!("unknown operation {head}")),
        }
    }
}

fn load_config(opts: &Opts) -> Result<HartConfig> {
    let mut cfg = match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => HartConfig::default(),
    };
    if let Some(xlen) = opts.xlen {
        cfg.xlen = xlen;
    }
    if let Some(size) = opts.progbuf_size {
        cfg.progbuf_size = size;
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let mut hart = Hart::new(load_config(&opts)?);

    let mut records = Vec::with_capacity(opts.ops.len());
    for op in &opts.ops {
        let result = match *op {
            Op::Read { width, addr } => Some(access::read_memory(&mut hart, addr, width)?),
            Op::Write { width, addr, value } => {
                access::write_memory(&mut hart, addr, width, value)?;
                None
            }
            Op::CsrRead { csr } => Some(access::read_csr(&mut hart, csr)?),
            Op::CsrWrite { csr, value } => {
                access::write_csr(&mut hart, csr, value)?;
                None
            }
        };
        if !opts.json {
            match result {
                Some(v) => println!("{op:?} => {v:#x}"),
                None => println!("{op:?}"),
            }
        }
        records.push(Record { op: op.clone(), result });
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    }
    Ok(())
}
