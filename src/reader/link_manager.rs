//! 链路管理模块
//! 负责根据端点字符串打开对应的寄存器访问链路

use std::path::PathBuf;

use link_trait::{DeviceLink, LinkError};
use sim_flash::{Backing, SimFlash};

use crate::const_values::ControllerConfig;

/// 模拟端点前缀
const SIM_SCHEME: &str = "sim:";
/// 确定性数据模式
const SIM_PATTERN: &str = "pattern";

/// 链路端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// 以镜像文件为内容的模拟 flash
    SimImage(PathBuf),
    /// 以确定性模式为内容的模拟 flash
    SimPattern,
    /// 远端目标
    Remote { host: String, port: u16 },
}

impl Endpoint {
    /// 解析端点字符串，远端目标未指定端口时使用 `default_port`
    pub fn parse(s: &str, default_port: u16) -> Result<Self, LinkError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LinkError::Connection("未指定目标端点".to_string()));
        }

        if let Some(rest) = s.strip_prefix(SIM_SCHEME) {
            return match rest {
                "" => Err(LinkError::Connection(
                    "模拟端点缺少镜像路径 (sim:<路径> 或 sim:pattern)".to_string(),
                )),
                SIM_PATTERN => Ok(Endpoint::SimPattern),
                path => Ok(Endpoint::SimImage(PathBuf::from(path))),
            };
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| LinkError::Connection(format!("无效的端口: '{}'", port)))?;
                if host.is_empty() {
                    return Err(LinkError::Connection(format!("无效的目标: '{}'", s)));
                }
                Ok(Endpoint::Remote {
                    host: host.to_string(),
                    port,
                })
            }
            _ => Ok(Endpoint::Remote {
                host: s.to_string(),
                port: default_port,
            }),
        }
    }
}

/// 链路工厂
pub struct LinkFactory;

impl LinkFactory {
    /// 根据端点创建链路
    pub fn open(
        endpoint: &Endpoint,
        controller: &ControllerConfig,
    ) -> Result<Box<dyn DeviceLink>, LinkError> {
        match endpoint {
            Endpoint::SimImage(path) => {
                let sim = SimFlash::from_image_file(
                    format!("sim:{}", path.display()),
                    path,
                    controller.base,
                    controller.page_reg_offset,
                )
                .map_err(|e| {
                    LinkError::Connection(format!("无法打开镜像 '{}': {}", path.display(), e))
                })?;
                tracing::info!(
                    "打开模拟链路: {} (窗口: {:#x}, 页寄存器偏移: {:#x})",
                    path.display(),
                    controller.base,
                    controller.page_reg_offset
                );
                Ok(Box::new(sim))
            }
            Endpoint::SimPattern => {
                let sim = SimFlash::with_page_reg(
                    "sim:pattern".to_string(),
                    Backing::Pattern,
                    controller.base,
                    controller.page_reg_offset,
                )?;
                tracing::info!("打开模拟链路: 确定性模式 (窗口: {:#x})", controller.base);
                Ok(Box::new(sim))
            }
            Endpoint::Remote { host, port } => Err(LinkError::Connection(format!(
                "无法连接 {}:{}: 未提供网络传输 (可用端点: sim:<镜像路径>, sim:pattern)",
                host, port
            ))),
        }
    }
}
