//! 模拟 SPI flash 链路
//!
//! 地址映射（相对于控制器基址）:
//! - 0x00000..0x0FFFF: 当前页窗口，只读
//! - 0x10000: 页选择寄存器（默认偏移，写入页号，复位值为 0）
use std::fs;
use std::io;
use std::path::Path;

use link_trait::{DeviceLink, LinkError, MAX_BYTE_BURST, MAX_WORD_BURST};

/// 窗口大小（一页）
pub const WINDOW_SIZE: u32 = 1 << 16;
/// 页选择寄存器相对于窗口基址的默认偏移
pub const DEFAULT_PAGE_REG_OFFSET: u32 = 0x10000;
/// 擦除状态的 flash 字节
const ERASED: u8 = 0xff;

/// 由地址决定的确定性字节
pub fn pattern_byte(addr: u32) -> u8 {
    let mixed = addr.wrapping_mul(0x9e37_79b1);
    (mixed >> 24) as u8 ^ addr as u8
}

/// flash 内容来源
#[derive(Debug, Clone)]
pub enum Backing {
    /// 镜像内容，超出镜像的地址读出 0xff
    Image(Vec<u8>),
    /// 每个字节由 [`pattern_byte`] 生成
    Pattern,
}

impl Backing {
    fn byte_at(&self, addr: u32) -> u8 {
        match self {
            Backing::Image(data) => data.get(addr as usize).copied().unwrap_or(ERASED),
            Backing::Pattern => pattern_byte(addr),
        }
    }
}

/// 已入队（或已执行）的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// 写页选择寄存器
    SelectPage(u32),
    /// 字节突发读取（本地地址、字节数）
    ReadBytes { addr: u32, count: usize },
    /// 字突发读取（本地地址、字数）
    ReadWords { addr: u32, words: usize },
}

impl Op {
    fn read_len(&self) -> usize {
        match *self {
            Op::SelectPage(_) => 0,
            Op::ReadBytes { count, .. } => count,
            Op::ReadWords { words, .. } => words * 4,
        }
    }
}

/// 模拟的分页 flash 控制器
pub struct SimFlash {
    name: String,
    backing: Backing,
    window_base: u32,
    page_reg: u32,
    page: u32,
    queue: Vec<Op>,
    /// 已执行的批次（用于检查）
    batches: Vec<Vec<Op>>,
    executes: usize,
    queued: usize,
    closes: usize,
    fail_execute_at: Option<usize>,
    fail_queue_at: Option<usize>,
}

impl SimFlash {
    /// 创建新的模拟 flash，窗口基址为 `window_base`
    pub fn new(name: String, backing: Backing, window_base: u32) -> Result<Self, LinkError> {
        Self::with_page_reg(name, backing, window_base, DEFAULT_PAGE_REG_OFFSET)
    }

    /// 创建新的模拟 flash，并指定页选择寄存器偏移
    pub fn with_page_reg(
        name: String,
        backing: Backing,
        window_base: u32,
        page_reg_offset: u32,
    ) -> Result<Self, LinkError> {
        let page_reg = window_base.checked_add(page_reg_offset).ok_or_else(|| {
            LinkError::Connection(format!(
                "页选择寄存器地址溢出: 基址 {:#x} + 偏移 {:#x}",
                window_base, page_reg_offset
            ))
        })?;
        if window_base.checked_add(WINDOW_SIZE - 1).is_none() {
            return Err(LinkError::Connection(format!(
                "窗口超出 32 位地址空间: 基址 {:#x}",
                window_base
            )));
        }
        if page_reg_offset < WINDOW_SIZE {
            return Err(LinkError::Connection(format!(
                "页选择寄存器 {:#x} 与窗口重叠",
                page_reg
            )));
        }
        Ok(Self {
            name,
            backing,
            window_base,
            page_reg,
            page: 0,
            queue: Vec::new(),
            batches: Vec::new(),
            executes: 0,
            queued: 0,
            closes: 0,
            fail_execute_at: None,
            fail_queue_at: None,
        })
    }

    /// 从镜像文件创建
    pub fn from_image_file(
        name: String,
        path: impl AsRef<Path>,
        window_base: u32,
        page_reg_offset: u32,
    ) -> io::Result<Self> {
        let data = fs::read(path)?;
        Self::with_page_reg(name, Backing::Image(data), window_base, page_reg_offset)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))
    }

    /// 第 `n` 次 execute（从 1 开始计数）返回错误
    pub fn fail_on_execute(mut self, n: usize) -> Self {
        self.fail_execute_at = Some(n);
        self
    }

    /// 第 `n` 次入队（从 1 开始计数）返回错误
    pub fn fail_on_queue(mut self, n: usize) -> Self {
        self.fail_queue_at = Some(n);
        self
    }

    pub fn batches(&self) -> &[Vec<Op>] {
        &self.batches
    }

    pub fn execute_count(&self) -> usize {
        self.executes
    }

    pub fn close_count(&self) -> usize {
        self.closes
    }

    pub fn current_page(&self) -> u32 {
        self.page
    }

    /// 线性读取（参考值）
    pub fn read_linear(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.backing.byte_at(addr.wrapping_add(i as u32)))
            .collect()
    }

    fn push(&mut self, op: Op) -> Result<(), LinkError> {
        self.queued += 1;
        if self.fail_queue_at == Some(self.queued) {
            return Err(LinkError::Queue(format!("注入的入队故障 (第 {} 次)", self.queued)));
        }
        self.queue.push(op);
        Ok(())
    }

    /// 检查读取区间完全落在窗口内
    fn check_window(&self, addr: u32, len: usize) -> Result<(), LinkError> {
        let start = addr as u64;
        let end = start + len as u64;
        let window_start = self.window_base as u64;
        let window_end = window_start + WINDOW_SIZE as u64;
        if start < window_start || end > window_end {
            return Err(LinkError::Queue(format!(
                "读取超出窗口: 地址 {:#x}, 长度 {}",
                addr, len
            )));
        }
        Ok(())
    }

    fn copy_out(&self, addr: u32, out: &mut [u8]) {
        let base = (self.page << 16) | (addr - self.window_base);
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.backing.byte_at(base.wrapping_add(i as u32));
        }
    }
}

impl DeviceLink for SimFlash {
    fn queue_write_word(&mut self, register: u32, value: u32) -> Result<(), LinkError> {
        if register != self.page_reg {
            return Err(LinkError::Queue(format!(
                "不支持的寄存器写入: {:#x}",
                register
            )));
        }
        if value >= WINDOW_SIZE {
            return Err(LinkError::Queue(format!("页号超出范围: {:#x}", value)));
        }
        self.push(Op::SelectPage(value))
    }

    fn queue_read_bytes(&mut self, addr: u32, count: usize) -> Result<(), LinkError> {
        if count == 0 || count > MAX_BYTE_BURST {
            return Err(LinkError::Queue(format!(
                "字节突发长度非法: {} (最大 {})",
                count, MAX_BYTE_BURST
            )));
        }
        self.check_window(addr, count)?;
        self.push(Op::ReadBytes { addr, count })
    }

    fn queue_read_words(&mut self, addr: u32, words: usize) -> Result<(), LinkError> {
        if words == 0 || words > MAX_WORD_BURST {
            return Err(LinkError::Queue(format!(
                "字突发长度非法: {} (最大 {})",
                words, MAX_WORD_BURST
            )));
        }
        if addr % 4 != 0 {
            return Err(LinkError::Queue(format!("字突发地址未对齐: {:#x}", addr)));
        }
        self.check_window(addr, words * 4)?;
        self.push(Op::ReadWords { addr, words })
    }

    fn execute(&mut self, out: &mut [u8]) -> Result<usize, LinkError> {
        self.executes += 1;
        let ops = std::mem::take(&mut self.queue);
        if self.fail_execute_at == Some(self.executes) {
            return Err(LinkError::Execution(format!(
                "注入的执行故障 (第 {} 次)",
                self.executes
            )));
        }

        let total: usize = ops.iter().map(Op::read_len).sum();
        if total > out.len() {
            return Err(LinkError::Execution(format!(
                "输出缓冲区不足: 需要 {} 字节, 只有 {} 字节",
                total,
                out.len()
            )));
        }

        let mut filled = 0;
        for op in &ops {
            match *op {
                Op::SelectPage(page) => self.page = page,
                Op::ReadBytes { addr, .. } | Op::ReadWords { addr, .. } => {
                    let len = op.read_len();
                    self.copy_out(addr, &mut out[filled..filled + len]);
                    filled += len;
                }
            }
        }
        self.batches.push(ops);
        Ok(filled)
    }

    fn close(&mut self) {
        self.closes += 1;
        self.queue.clear();
    }

    fn name(&self) -> &str {
        &self.name
    }
}
