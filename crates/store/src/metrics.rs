use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters exposed by every store backend (§4.7).
#[derive(Default)]
pub struct Metrics {
    total_pauses: AtomicU64,
    total_resumes: AtomicU64,
    total_expired: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_pauses: u64,
    pub total_resumes: u64,
    pub total_expired: u64,
}

impl MetricsSnapshot {
    /// Fraction of completed (non-expired) lifecycles that resumed to
    /// completion rather than still being paused; `None` until at least
    /// one resume or expiry has been observed.
    pub fn success_rate(&self) -> Option<f64> {
        let denom = self.total_resumes + self.total_expired;
        if denom == 0 {
            None
        } else {
            Some(self.total_resumes as f64 / denom as f64)
        }
    }

    /// Fraction of paused executions that expired before being resumed.
    pub fn expired_rate(&self) -> Option<f64> {
        if self.total_pauses == 0 {
            None
        } else {
            Some(self.total_expired as f64 / self.total_pauses as f64)
        }
    }
}

impl Metrics {
    pub fn record_pause(&self) {
        self.total_pauses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resume(&self) {
        self.total_resumes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.total_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_pauses: self.total_pauses.load(Ordering::Relaxed),
            total_resumes: self.total_resumes.load(Ordering::Relaxed),
            total_expired: self.total_expired.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = Metrics::default();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn record_methods_increment_independently() {
        let m = Metrics::default();
        m.record_pause();
        m.record_pause();
        m.record_resume();
        m.record_expired();
        let snap = m.snapshot();
        assert_eq!(snap.total_pauses, 2);
        assert_eq!(snap.total_resumes, 1);
        assert_eq!(snap.total_expired, 1);
    }

    #[test]
    fn success_and_expired_rate_are_none_without_data() {
        let snap = MetricsSnapshot::default();
        assert_eq!(snap.success_rate(), None);
        assert_eq!(snap.expired_rate(), None);
    }

    #[test]
    fn success_and_expired_rate_compute_fractions() {
        let m = Metrics::default();
        m.record_pause();
        m.record_pause();
        m.record_pause();
        m.record_resume();
        m.record_resume();
        m.record_expired();
        let snap = m.snapshot();
        assert_eq!(snap.success_rate(), Some(2.0 / 3.0));
        assert_eq!(snap.expired_rate(), Some(1.0 / 3.0));
    }
}
