//! 시각 포트.
//!
//! 큐가 전송 시점에 측정 시각을 찍을 때 사용한다.
//! 테스트에서는 `FixedClock` 으로 결정적인 시각을 주입한다.

use std::sync::atomic::{AtomicI64, Ordering};

/// 현재 시각 제공자
pub trait Clock: Send + Sync {
    /// 현재 시각 (epoch 초)
    fn now_epoch(&self) -> i64;
}

/// 시스템 시각
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// 고정 시각 — 수동으로만 진행한다
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(epoch_secs: i64) -> Self {
        Self {
            now: AtomicI64::new(epoch_secs),
        }
    }

    pub fn set(&self, epoch_secs: i64) {
        self.now.store(epoch_secs, Ordering::Relaxed);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::Relaxed);
    }
}

impl Clock for FixedClock {
    fn now_epoch(&self) -> i64 {
        self.now.load(Ordering::Relaxed)
    }
}
