//! 地址转换

use super::plan::SegmentError;

/// 页大小的对数
pub const PAGE_SHIFT: u32 = 16;
/// 页大小 (64 KiB)
pub const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;
/// 页内偏移掩码
pub const PAGE_MASK: u32 = PAGE_SIZE - 1;

/// 页号
pub type PageIndex = u32;

/// 设备地址所在的页号
#[inline(always)]
pub fn page_index(addr: u32) -> PageIndex {
    addr >> PAGE_SHIFT
}

/// 设备地址的页内偏移
#[inline(always)]
pub fn page_offset(addr: u32) -> u32 {
    addr & PAGE_MASK
}

/// 设备地址在窗口中的本地地址
#[inline(always)]
pub fn window_address(window_base: u32, addr: u32) -> u32 {
    window_base.wrapping_add(page_offset(addr))
}

/// 下一个页边界（最后一页的边界为 2^32，因此返回 u64）
#[inline(always)]
pub fn next_page_boundary(addr: u32) -> u64 {
    (addr & !PAGE_MASK) as u64 + PAGE_SIZE as u64
}

#[inline(always)]
pub fn is_word_aligned(addr: u32) -> bool {
    addr & 3 == 0
}

/// 控制器窗口：窗口基址与页选择寄存器地址
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    base: u32,
    page_reg: u32,
}

impl Window {
    /// 创建窗口，窗口末尾与页选择寄存器都必须落在 32 位地址空间内
    pub fn new(base: u32, page_reg_offset: u32) -> Result<Self, SegmentError> {
        let overflow = SegmentError::WindowOverflow {
            base,
            offset: page_reg_offset,
        };
        base.checked_add(PAGE_MASK).ok_or(overflow.clone())?;
        let page_reg = base.checked_add(page_reg_offset).ok_or(overflow)?;
        Ok(Self { base, page_reg })
    }

    #[inline(always)]
    pub fn base(&self) -> u32 {
        self.base
    }

    /// 页选择寄存器的本地地址
    #[inline(always)]
    pub fn page_reg(&self) -> u32 {
        self.page_reg
    }

    /// 设备地址 -> 窗口本地地址
    #[inline(always)]
    pub fn translate(&self, addr: u32) -> u32 {
        window_address(self.base, addr)
    }
}
