//! 寄存器访问链路 trait 定义

use thiserror::Error;

/// 单次字节突发读取的最大字节数
pub const MAX_BYTE_BURST: usize = 7;
/// 单次字突发读取的最大字数 (256 个 32 位字)
pub const MAX_WORD_BURST: usize = 256;
/// 单次字突发读取的最大字节数
pub const MAX_BURST_BYTES: usize = MAX_WORD_BURST * 4;

/// 链路错误类型
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("无法建立会话: {0}")]
    Connection(String),
    #[error("命令入队失败: {0}")]
    Queue(String),
    #[error("批次执行失败: {0}")]
    Execution(String),
}

/// 寄存器访问链路 trait
///
/// 所有操作先入队，直到调用 `execute` 才作为一个批次发往设备。
pub trait DeviceLink {
    /// 入队一次 32 位寄存器写
    ///
    /// # 参数
    /// - register: 寄存器的本地地址
    /// - value: 要写入的值
    fn queue_write_word(&mut self, register: u32, value: u32) -> Result<(), LinkError>;

    /// 入队一次字节突发读取
    ///
    /// # 参数
    /// - addr: 本地起始地址
    /// - count: 字节数，不超过 [`MAX_BYTE_BURST`]
    fn queue_read_bytes(&mut self, addr: u32, count: usize) -> Result<(), LinkError>;

    /// 入队一次 32 位字突发读取
    ///
    /// # 参数
    /// - addr: 本地起始地址，必须 4 字节对齐
    /// - words: 字数，不超过 [`MAX_WORD_BURST`]
    fn queue_read_words(&mut self, addr: u32, words: usize) -> Result<(), LinkError>;

    /// 执行所有已入队的操作
    ///
    /// 读取结果按入队顺序依次写入 `out`，每次读取内部按设备地址顺序排列。
    ///
    /// # 返回
    /// 写入 `out` 的字节数
    fn execute(&mut self, out: &mut [u8]) -> Result<usize, LinkError>;

    /// 关闭会话（可选）
    fn close(&mut self) {}

    /// 获取链路名称（用于调试）
    fn name(&self) -> &str {
        "unknown"
    }
}

impl<T: DeviceLink + ?Sized> DeviceLink for Box<T> {
    fn queue_write_word(&mut self, register: u32, value: u32) -> Result<(), LinkError> {
        (**self).queue_write_word(register, value)
    }

    fn queue_read_bytes(&mut self, addr: u32, count: usize) -> Result<(), LinkError> {
        (**self).queue_read_bytes(addr, count)
    }

    fn queue_read_words(&mut self, addr: u32, words: usize) -> Result<(), LinkError> {
        (**self).queue_read_words(addr, words)
    }

    fn execute(&mut self, out: &mut [u8]) -> Result<usize, LinkError> {
        (**self).execute(out)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
