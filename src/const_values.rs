use anyhow::{self, Context};
use serde::Deserialize;
use std::path::Path;

/// 默认控制器基址
pub const DEFAULT_BASE: u32 = 0x08_0000;
/// 默认 flash 起始地址
pub const DEFAULT_ADDR: u32 = 0;
/// 默认读取长度
pub const DEFAULT_LENG: u32 = 4;
/// 页选择寄存器相对于窗口基址的默认偏移
pub const DEFAULT_PAGE_REG_OFFSET: u32 = 0x1_0000;
/// 远端目标的默认端口
pub const DEFAULT_PORT: u16 = 4096;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    #[serde(default = "default_base")]
    pub base: u32,
    #[serde(default = "default_page_reg_offset")]
    pub page_reg_offset: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            page_reg_offset: DEFAULT_PAGE_REG_OFFSET,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

fn default_base() -> u32 {
    DEFAULT_BASE
}

fn default_page_reg_offset() -> u32 {
    DEFAULT_PAGE_REG_OFFSET
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// 读取工具配置（来自 profile/config.toml），所有项均可省略
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub link: LinkConfig,
}

impl ReaderConfig {
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<ReaderConfig> {
        let toml_str = std::fs::read_to_string(&path)
            .with_context(|| format!("无法读取配置文件: {:?}", &path.as_ref().as_os_str()))?;
        let config: ReaderConfig = toml::from_str(&toml_str)
            .with_context(|| format!("无法解析配置文件: {:?}", &path.as_ref().as_os_str()))?;
        anyhow::Ok(config)
    }
}
