// 领域模块 - 用于组织应用的业务逻辑
//
// 把采集核心、会话状态与远端分类服务组合成界面可直接调用的操作
// 包含4个领域:拍照、分类、回顾、登录

pub mod auth;
pub mod capture;
pub mod classify;
pub mod review;

pub use auth::{AuthDomain, AuthError};
pub use capture::CaptureDomain;
pub use classify::{ClassifyDomain, ClassifyError};
pub use review::{ReviewDomain, ReviewError};

use std::sync::atomic::{AtomicBool, Ordering};

/// 进行中标记，同一时刻只允许一个请求
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    busy: AtomicBool,
}

impl InFlight {
    /// 尝试占用，已被占用时返回 `None`
    pub(crate) fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { flag: &self.busy })
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// 作用域结束时自动释放占用
pub(crate) struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard() {
        let flag = InFlight::default();

        let guard = flag.try_begin();
        assert!(guard.is_some());
        assert!(flag.is_busy());
        assert!(flag.try_begin().is_none());

        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_begin().is_some());
    }
}
