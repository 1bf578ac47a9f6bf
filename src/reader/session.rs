//! 链路会话，离开作用域时关闭链路

use link_trait::DeviceLink;
use tracing::info;

/// 会话守卫：无论成功还是出错，链路都只关闭一次
pub struct Session<'a, L: DeviceLink + ?Sized> {
    link: &'a mut L,
}

impl<'a, L: DeviceLink + ?Sized> Session<'a, L> {
    pub fn new(link: &'a mut L) -> Self {
        info!(link = link.name(), "打开会话");
        Self { link }
    }

    #[inline(always)]
    pub fn link(&mut self) -> &mut L {
        &mut *self.link
    }
}

impl<L: DeviceLink + ?Sized> Drop for Session<'_, L> {
    fn drop(&mut self) {
        info!(link = self.link.name(), "关闭会话");
        self.link.close();
    }
}
