use std::process::ExitCode;

use clap::Parser;
use flash_reader::{Args, build_reader_run_blocking, verbosity_level};
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

fn main() -> ExitCode {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志，标准输出留给读出的数据
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(verbosity_level(args.verbose).into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false) // 不显示目标模块
        .with_file(true) // 显示文件名
        .with_line_number(true) // 显示行号
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "启动 SPI flash 读取工具");

    match build_reader_run_blocking(args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Errors were encountered -- '-v' may provide more details");
            ExitCode::FAILURE
        }
    }
}
