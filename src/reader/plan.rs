//! 读取计划：把任意 (地址, 长度) 拆分为页选择与突发读取

use link_trait::MAX_BURST_BYTES;
use thiserror::Error;
use tracing::debug;

use super::address::{PageIndex, Window, next_page_boundary, page_index};

/// 计划生成错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("地址溢出: 起始地址 {addr:#x} + 长度 {len:#x} 超出 32 位地址空间")]
    AddressOverflow { addr: u32, len: u32 },
    #[error("地址溢出: 窗口基址 {base:#x} (页寄存器偏移 {offset:#x}) 超出 32 位地址空间")]
    WindowOverflow { base: u32, offset: u32 },
}

/// 突发读取宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
}

/// 一次突发读取
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    /// 设备地址
    pub addr: u32,
    /// 窗口本地地址
    pub window_addr: u32,
    /// 字节数
    pub len: usize,
    pub width: Width,
}

impl Burst {
    /// 最后一个字节之后的设备地址
    pub fn end(&self) -> u64 {
        self.addr as u64 + self.len as u64
    }

    pub fn words(&self) -> usize {
        self.len / 4
    }
}

/// 计划步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SelectPage(PageIndex),
    Burst(Burst),
}

/// 读取计划
///
/// 计划只保存请求本身，步骤在遍历时按需生成，
/// 因此整片 flash 的读取也只占用常量内存。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPlan {
    window: Window,
    addr: u32,
    len: u32,
}

/// 计划步骤迭代器，`selected` 记录最近一次选择的页，避免重复选页
#[derive(Debug, Clone)]
pub struct Steps {
    window: Window,
    // 游标用 u64，读取可以恰好结束在 2^32
    cursor: u64,
    end: u64,
    selected: Option<PageIndex>,
}

impl Steps {
    /// 游标处的下一次突发读取
    fn next_burst(&self) -> Burst {
        let addr = self.cursor as u32;
        let remaining = self.end - self.cursor;
        let (len, width) = if addr & 3 != 0 {
            // 头部：补齐到 4 字节边界
            (remaining.min(((4 - (addr & 3)) & 3) as u64), Width::Byte)
        } else if remaining >= 4 {
            let chunk = (remaining & !3)
                .min(MAX_BURST_BYTES as u64)
                .min(next_page_boundary(addr) - self.cursor);
            (chunk, Width::Word)
        } else {
            // 尾部
            (remaining, Width::Byte)
        };
        Burst {
            addr,
            window_addr: self.window.translate(addr),
            len: len as usize,
            width,
        }
    }
}

impl Iterator for Steps {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if self.cursor >= self.end {
            return None;
        }
        let page = page_index(self.cursor as u32);
        if self.selected != Some(page) {
            self.selected = Some(page);
            return Some(Step::SelectPage(page));
        }
        let burst = self.next_burst();
        self.cursor += burst.len as u64;
        Some(Step::Burst(burst))
    }
}

impl ReadPlan {
    /// 为 `[addr, addr + len)` 生成读取计划
    ///
    /// 非对齐的头部和尾部用字节突发读取，中间部分用不跨页、
    /// 不超过 256 字的字突发读取。
    pub fn build(window: Window, addr: u32, len: u32) -> Result<Self, SegmentError> {
        if addr as u64 + len as u64 > 1u64 << 32 {
            return Err(SegmentError::AddressOverflow { addr, len });
        }
        debug!(addr = %format!("{:#x}", addr), len, "生成读取计划");
        Ok(Self { window, addr, len })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn steps(&self) -> Steps {
        Steps {
            window: self.window,
            cursor: self.addr as u64,
            end: self.addr as u64 + self.len as u64,
            selected: None,
        }
    }

    pub fn bursts(&self) -> impl Iterator<Item = Burst> + use<> {
        self.steps().filter_map(|step| match step {
            Step::Burst(burst) => Some(burst),
            Step::SelectPage(_) => None,
        })
    }

    /// 计划读取的总字节数
    pub fn total_len(&self) -> u64 {
        self.len as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_trait::MAX_BYTE_BURST;

    const BASE: u32 = 0x08_0000;

    fn window() -> Window {
        Window::new(BASE, 0x1_0000).unwrap()
    }

    fn plan(addr: u32, len: u32) -> ReadPlan {
        ReadPlan::build(window(), addr, len).unwrap()
    }

    /// 检查计划的全部不变量
    fn check_plan(addr: u32, len: u32) {
        let plan = plan(addr, len);
        let mut selected: Option<PageIndex> = None;
        let mut expect = addr as u64;
        for step in plan.steps() {
            match step {
                Step::SelectPage(page) => {
                    assert_ne!(selected, Some(page), "重复选页 {:#x}+{:#x}", addr, len);
                    selected = Some(page);
                }
                Step::Burst(burst) => {
                    assert!(burst.len > 0);
                    assert_eq!(burst.addr as u64, expect, "字节不连续 {:#x}+{:#x}", addr, len);
                    let first = page_index(burst.addr);
                    let last = ((burst.end() - 1) >> 16) as u32;
                    assert_eq!(first, last, "突发跨页 {:#x}+{:#x}", addr, len);
                    assert_eq!(selected, Some(first), "突发前未选页");
                    assert_eq!(burst.window_addr, BASE + (burst.addr & 0xffff));
                    match burst.width {
                        Width::Word => {
                            assert_eq!(burst.len % 4, 0);
                            assert_eq!(burst.addr % 4, 0);
                            assert!(burst.len <= MAX_BURST_BYTES);
                        }
                        Width::Byte => assert!(burst.len <= MAX_BYTE_BURST),
                    }
                    expect = burst.end();
                }
            }
        }
        assert_eq!(expect, addr as u64 + len as u64);
        assert_eq!(plan.bursts().map(|b| b.len as u64).sum::<u64>(), len as u64);
        // 计划不以多余的选页结束
        if let Some(last) = plan.steps().last() {
            assert!(matches!(last, Step::Burst(_)));
        }
    }

    #[test]
    fn test_invariants_over_many_ranges() {
        let addrs = [
            0u32, 1, 2, 3, 4, 0xfffc, 0xfffd, 0xfffe, 0xffff, 0x1_0000, 0x1_0001, 0x2_fbff,
            0x12_3457, 0xfffe_fffd, 0xffff_0000, 0xffff_fbfe,
        ];
        let lens = [
            0u32, 1, 2, 3, 4, 5, 7, 8, 9, 1023, 1024, 1025, 1028, 4099, 0xffff, 0x1_0000,
            0x1_0003, 0x2_0005,
        ];
        for &addr in &addrs {
            for &len in &lens {
                if addr as u64 + len as u64 <= 1u64 << 32 {
                    check_plan(addr, len);
                }
            }
        }
    }

    #[test]
    fn test_top_of_address_space() {
        check_plan(0xffff_fffc, 4);
        check_plan(0xffff_fffd, 3);
        check_plan(0xffff_ff00, 0x100);
        check_plan(0xffff_0001, 0xffff);
    }

    #[test]
    fn test_address_overflow() {
        assert_eq!(
            ReadPlan::build(window(), 0xffff_fffc, 5).unwrap_err(),
            SegmentError::AddressOverflow {
                addr: 0xffff_fffc,
                len: 5
            }
        );
        assert!(ReadPlan::build(window(), 2, u32::MAX).is_err());
        // 恰好结束在 2^32 是合法的
        assert!(ReadPlan::build(window(), 1, u32::MAX).is_ok());
        assert!(ReadPlan::build(window(), 0xffff_0000, 0x1_0000).is_ok());
    }

    #[test]
    fn test_zero_length() {
        let plan = plan(0x1234, 0);
        assert!(plan.is_empty());
        assert_eq!(plan.bursts().count(), 0);
    }

    #[test]
    fn test_aligned_request_has_only_word_bursts() {
        for (addr, len) in [(0u32, 4u32), (0x100, 0x400), (0xfff0, 0x20), (0x4_0000, 0x2_0000)] {
            let plan = plan(addr, len);
            assert!(plan.bursts().all(|b| b.width == Width::Word));
        }
    }

    #[test]
    fn test_single_byte_before_boundary() {
        let plan = plan(0x0003, 1);
        assert_eq!(
            plan.steps().collect::<Vec<_>>(),
            vec![
                Step::SelectPage(0),
                Step::Burst(Burst {
                    addr: 3,
                    window_addr: BASE + 3,
                    len: 1,
                    width: Width::Byte
                }),
            ]
        );
    }

    #[test]
    fn test_short_misaligned_request_is_head_only() {
        let plan = plan(0x1001, 2);
        let bursts: Vec<_> = plan.bursts().collect();
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].len, 2);
        assert_eq!(bursts[0].width, Width::Byte);
    }

    #[test]
    fn test_page_crossing_request() {
        let plan = plan(0x0fffe, 8);
        let byte = |addr, len| {
            Step::Burst(Burst {
                addr,
                window_addr: BASE + (addr & 0xffff),
                len,
                width: Width::Byte,
            })
        };
        assert_eq!(
            plan.steps().collect::<Vec<_>>(),
            vec![
                Step::SelectPage(0),
                byte(0xfffe, 2),
                Step::SelectPage(1),
                Step::Burst(Burst {
                    addr: 0x1_0000,
                    window_addr: BASE,
                    len: 4,
                    width: Width::Word
                }),
                byte(0x1_0004, 2),
            ]
        );
    }

    #[test]
    fn test_head_in_same_page_has_single_select() {
        let plan = plan(0x0101, 0x800);
        let selects = plan
            .steps()
            .filter(|s| matches!(s, Step::SelectPage(_)))
            .count();
        assert_eq!(selects, 1);
    }

    #[test]
    fn test_ending_on_page_boundary_has_no_trailing_select() {
        let plan = plan(0xfc00, 0x400);
        let steps: Vec<_> = plan.steps().collect();
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[1], Step::Burst(_)));
    }

    #[test]
    fn test_full_device_read_is_lazy() {
        let plan = plan(1, u32::MAX);
        assert_eq!(plan.total_len(), u32::MAX as u64);
        let mut steps = plan.steps();
        assert_eq!(steps.next(), Some(Step::SelectPage(0)));
        assert!(matches!(steps.next(), Some(Step::Burst(b)) if b.len == 3 && b.width == Width::Byte));
        // 最后一步是到 0xffff_ffff 为止的字突发
        let last = plan.bursts().last().unwrap();
        assert_eq!(last.end(), 1u64 << 32);
        assert_eq!(last.width, Width::Word);
    }

    #[test]
    fn test_body_split_by_burst_limit() {
        let plan = plan(0, 0x1000);
        let lens: Vec<_> = plan.bursts().map(|b| b.len).collect();
        assert_eq!(lens, vec![1024; 4]);
    }
}
