use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

pub const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

impl Window {
    fn expired(&self, now: Instant, length: Duration) -> bool {
        now.saturating_duration_since(self.started) > length
    }
}

type Windows = Mutex<HashMap<IpAddr, Window>>;

/// Per-address request counter over a window that restarts at each address's first
/// request after expiry. In-memory and per-process only.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    windows: Arc<Windows>,
    limit: u32,
    length: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(limit: u32, length: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            limit,
            length,
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, WINDOW)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn allow(&self, addr: IpAddr) -> bool {
        self.allow_at(addr, Instant::now())
    }

    /// Count one request from `addr` at `now`. Rejected requests still count, so every
    /// later request in the same window is rejected as well.
    pub fn allow_at(&self, addr: IpAddr, now: Instant) -> bool {
        let mut windows = lock(&self.windows);
        let window = windows.entry(addr).or_insert(Window {
            count: 0,
            started: now,
        });
        if window.expired(now, self.length) {
            window.count = 0;
            window.started = now;
        }
        window.count = window.count.saturating_add(1);
        window.count <= self.limit
    }

    /// Remove every address whose window has already expired. Returns how many were dropped.
    pub fn sweep_at(&self, now: Instant) -> usize {
        sweep(&self.windows, now, self.length)
    }

    pub fn tracked(&self) -> usize {
        lock(&self.windows).len()
    }

    /// Sweep expired entries once per window length. The task ends on its own once every
    /// clone of this limiter is dropped.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let windows: Weak<Windows> = Arc::downgrade(&self.windows);
        let length = self.length;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + length, length);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(windows) = windows.upgrade() else {
                    break;
                };
                let removed = sweep(&windows, Instant::now(), length);
                if removed > 0 {
                    debug!(removed, "rate limiter swept expired windows");
                }
            }
        })
    }
}

fn lock(windows: &Windows) -> MutexGuard<'_, HashMap<IpAddr, Window>> {
    windows.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sweep(windows: &Windows, now: Instant, length: Duration) -> usize {
    let mut windows = lock(windows);
    let before = windows.len();
    windows.retain(|_, w| !w.expired(now, length));
    before - windows.len()
}
