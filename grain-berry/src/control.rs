//! 长时间运算的取消与完成状态.

use std::sync::atomic::{AtomicBool, Ordering};

/// 跨线程共享的取消标志.
///
/// 各算法只在安全点 (一个 feature 生长完毕, 一个合并簇处理之前,
/// 一轮修复完成之后) 检查该标志, 因此被取消时的部分结果仍然自洽.
#[derive(Debug, Default)]
pub struct Cancellation(AtomicBool);

impl Cancellation {
    /// 未取消状态.
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// 请求取消. 可以从任意线程调用.
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// 是否已被请求取消?
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// 永不取消的共享标志, 供不关心取消的调用者使用.
pub(crate) static NEVER: Cancellation = Cancellation::new();

/// 可取消运算的结果.
#[derive(Clone, Debug, PartialEq)]
pub enum Completion<T> {
    /// 运算完整结束.
    Done(T),

    /// 运算在某个安全点被取消. 内含到该点为止的自洽部分结果.
    Cancelled(T),
}

impl<T> Completion<T> {
    /// 是否完整结束?
    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(self, Completion::Done(_))
    }

    /// 是否被取消?
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled(_))
    }

    /// 取出结果, 不区分是否完整.
    #[inline]
    pub fn into_inner(self) -> T {
        match self {
            Completion::Done(t) | Completion::Cancelled(t) => t,
        }
    }

    /// 完整结束时返回 `Some`.
    #[inline]
    pub fn done(self) -> Option<T> {
        match self {
            Completion::Done(t) => Some(t),
            Completion::Cancelled(_) => None,
        }
    }

    /// 保持完成状态, 变换结果.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Completion<U> {
        match self {
            Completion::Done(t) => Completion::Done(f(t)),
            Completion::Cancelled(t) => Completion::Cancelled(f(t)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cancellation, Completion};

    #[test]
    fn test_cancellation_across_threads() {
        let flag = Cancellation::new();
        assert!(!flag.is_cancelled());
        std::thread::scope(|s| {
            s.spawn(|| flag.cancel());
        });
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_completion() {
        let c = Completion::Cancelled(3);
        assert!(c.is_cancelled());
        assert_eq!(c.clone().done(), None);
        assert_eq!(c.map(|v| v * 2).into_inner(), 6);
        assert_eq!(Completion::Done("ok").done(), Some("ok"));
    }
}
