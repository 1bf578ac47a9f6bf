//! 分页 SPI flash 读取工具库
pub mod const_values;
pub mod reader;
pub mod utils;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, info};

use const_values::{DEFAULT_ADDR, DEFAULT_LENG, ReaderConfig};
use reader::{Endpoint, LinkFactory, ReadPlan, ReadSummary, Window, read_range};
use utils::parse_u32;

/// 通过分页寄存器窗口读取 SPI flash 内容，结果以二进制写到标准输出
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// 目标端点 (sim:<镜像路径>, sim:pattern 或 <主机>[:端口])
    #[arg(short = 'a', long = "address", env = "ECUR_TARGET_IP")]
    pub address: String,

    /// SPI 控制器基址 [默认: 0x080000]
    #[arg(short = 'b', long, value_parser = parse_u32)]
    pub base: Option<u32>,

    /// SPI flash 起始地址
    #[arg(short = 'm', long = "mem", default_value_t = DEFAULT_ADDR, value_parser = parse_u32)]
    pub mem: u32,

    /// 读取长度（字节）
    #[arg(short = 'l', long = "len", default_value_t = DEFAULT_LENG, value_parser = parse_u32)]
    pub len: u32,

    /// 输出文件（默认写到标准输出）
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 配置文件地址
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 增加日志详细程度（可重复）
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// `-v` 次数对应的默认日志级别
pub fn verbosity_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

pub fn build_reader_run_blocking(args: Args) -> Result<ReadSummary> {
    let config = match &args.config {
        Some(path) => ReaderConfig::new(path)?,
        None => ReaderConfig::default(),
    };
    let mut controller = config.controller.clone();
    if let Some(base) = args.base {
        controller.base = base;
    }

    // 在与设备交互之前完成所有地址检查
    let window = Window::new(controller.base, controller.page_reg_offset)
        .context("控制器窗口配置无效")?;
    let plan = ReadPlan::build(window, args.mem, args.len)
        .with_context(|| format!("无法读取区间 {:#x}+{:#x}", args.mem, args.len))?;
    let endpoint = Endpoint::parse(&args.address, config.link.port)?;

    info!(
        endpoint = %args.address,
        base = %format!("{:#x}", controller.base),
        addr = %format!("{:#x}", args.mem),
        len = args.len,
        "开始读取"
    );
    let mut link = LinkFactory::open(&endpoint, &controller)
        .with_context(|| format!("无法打开链路 '{}'", args.address))?;

    // 链路打开成功后才创建输出文件，连接失败不会截断已有文件
    let mut sink: Box<dyn Write> = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("无法创建输出文件 '{}'", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    };

    let summary = read_range(link.as_mut(), &plan, &mut sink)
        .with_context(|| format!("读取 {:#x}+{:#x} 失败", args.mem, args.len))?;
    info!(
        bytes = summary.bytes,
        batches = summary.batches,
        page_selects = summary.page_selects,
        "读取结束"
    );
    Ok(summary)
}
