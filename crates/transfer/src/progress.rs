use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: Duration = Duration::from_secs(5);
const DEFAULT_MAX_SAMPLES: usize = 100;

/// Transfer rate over a sliding time window.
pub struct ThroughputMeter {
    inner: Mutex<MeterInner>,
}

struct MeterInner {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    max_samples: usize,
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_SAMPLES)
    }
}

impl ThroughputMeter {
    pub fn new(window: Duration, max_samples: usize) -> Self {
        Self {
            inner: Mutex::new(MeterInner {
                samples: VecDeque::new(),
                window,
                max_samples: max_samples.max(2),
            }),
        }
    }

    /// Records `bytes` transferred now.
    pub fn record(&self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    fn record_at(&self, at: Instant, bytes: u64) {
        let Ok(mut m) = self.inner.lock() else {
            return;
        };
        m.samples.push_back((at, bytes));

        while let Some(&(oldest, _)) = m.samples.front() {
            if at.duration_since(oldest) > m.window || m.samples.len() > m.max_samples {
                m.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Average bytes/second across the window; 0.0 with fewer than two samples.
    pub fn bytes_per_second(&self) -> f64 {
        let Ok(m) = self.inner.lock() else {
            return 0.0;
        };
        let (Some(&(first, _)), Some(&(last, _))) = (m.samples.front(), m.samples.back()) else {
            return 0.0;
        };
        let elapsed = last.duration_since(first);
        if m.samples.len() < 2 || elapsed.is_zero() {
            return 0.0;
        }
        // The first sample marks the start of the interval.
        let bytes: u64 = m.samples.iter().skip(1).map(|&(_, b)| b).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Time left for `remaining` bytes at the current rate.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        (rate > 0.0).then(|| Duration::from_secs_f64(remaining as f64 / rate))
    }

    pub fn reset(&self) {
        if let Ok(mut m) = self.inner.lock() {
            m.samples.clear();
        }
    }
}
