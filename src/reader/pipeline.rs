//! 执行流水线：按计划驱动链路，并按地址顺序输出数据

use std::io::{self, Write};

use link_trait::{DeviceLink, LinkError, MAX_BURST_BYTES};
use thiserror::Error;
use tracing::{debug, trace};

use super::address::{PageIndex, page_index};
use super::plan::{Burst, ReadPlan, Step, Width};
use super::session::Session;

/// 执行错误
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("链路错误: {0}")]
    Link(#[from] LinkError),
    #[error("无法写入输出数据: {0}")]
    Io(#[from] io::Error),
    #[error("传输长度不符: 地址 {addr:#x}, 期望 {expected} 字节, 实际 {actual} 字节")]
    ShortTransfer {
        addr: u32,
        expected: usize,
        actual: usize,
    },
}

/// 一次读取的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    /// 写入输出的字节数
    pub bytes: u64,
    /// 执行的批次数
    pub batches: usize,
    /// 发出的页选择次数
    pub page_selects: usize,
}

/// 执行流水线
///
/// 每个批次包含（可选的）一次页选择和它所控制的一次突发读取，
/// 批次执行完毕后立即把数据写入输出，再开始下一个批次。
pub struct Pipeline<'a, L: DeviceLink + ?Sized> {
    session: Session<'a, L>,
    current_page: Option<PageIndex>,
    /// 已入队但尚未执行的操作数
    queued: usize,
    scratch: [u8; MAX_BURST_BYTES],
    summary: ReadSummary,
}

impl<'a, L: DeviceLink + ?Sized> Pipeline<'a, L> {
    pub fn new(link: &'a mut L) -> Self {
        Self {
            session: Session::new(link),
            current_page: None,
            queued: 0,
            scratch: [0; MAX_BURST_BYTES],
            summary: ReadSummary::default(),
        }
    }

    /// 执行计划，遇到第一个错误即中止；之前已写出的数据保留在输出中
    pub fn run<W: Write + ?Sized>(
        mut self,
        plan: &ReadPlan,
        sink: &mut W,
    ) -> Result<ReadSummary, PipelineError> {
        let page_reg = plan.window().page_reg();
        for step in plan.steps() {
            match step {
                Step::SelectPage(page) => self.select_page(page_reg, page)?,
                Step::Burst(burst) => {
                    self.select_page(page_reg, page_index(burst.addr))?;
                    self.read_burst(&burst, sink)?;
                }
            }
        }
        // 没有读取跟随的页选择也要发出
        if self.queued > 0 {
            self.execute()?;
        }
        sink.flush()?;
        debug!(
            bytes = self.summary.bytes,
            batches = self.summary.batches,
            page_selects = self.summary.page_selects,
            "读取完成"
        );
        Ok(self.summary)
    }

    fn select_page(&mut self, page_reg: u32, page: PageIndex) -> Result<(), PipelineError> {
        if self.current_page == Some(page) {
            return Ok(());
        }
        self.session.link().queue_write_word(page_reg, page)?;
        self.queued += 1;
        self.current_page = Some(page);
        self.summary.page_selects += 1;
        Ok(())
    }

    fn read_burst<W: Write + ?Sized>(
        &mut self,
        burst: &Burst,
        sink: &mut W,
    ) -> Result<(), PipelineError> {
        debug_assert!(burst.len <= self.scratch.len());
        let link = self.session.link();
        match burst.width {
            Width::Byte => link.queue_read_bytes(burst.window_addr, burst.len)?,
            Width::Word => link.queue_read_words(burst.window_addr, burst.words())?,
        }
        self.queued += 1;

        let actual = self.execute()?;
        if actual != burst.len {
            return Err(PipelineError::ShortTransfer {
                addr: burst.addr,
                expected: burst.len,
                actual,
            });
        }

        // 只输出本批次实际填充的部分
        let data = &self.scratch[..actual];
        trace!(
            addr = %format!("{:#010x}", burst.addr),
            data = %hex::encode(data),
            "突发读取"
        );
        sink.write_all(data)?;
        self.summary.bytes += actual as u64;
        Ok(())
    }

    fn execute(&mut self) -> Result<usize, PipelineError> {
        let ops = self.queued;
        self.queued = 0;
        let transferred = self.session.link().execute(&mut self.scratch)?;
        self.summary.batches += 1;
        debug!(
            batch = self.summary.batches,
            ops,
            transferred,
            "批次执行完成"
        );
        Ok(transferred)
    }
}

/// 在链路上执行计划，结束时关闭会话
pub fn read_range<L, W>(link: &mut L, plan: &ReadPlan, sink: &mut W) -> Result<ReadSummary, PipelineError>
where
    L: DeviceLink + ?Sized,
    W: Write + ?Sized,
{
    Pipeline::new(link).run(plan, sink)
}
