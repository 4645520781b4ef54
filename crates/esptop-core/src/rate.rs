//! Link throughput estimation.
//!
//! Download rate is measured: the byte length of each successfully received
//! line divided by the wall-clock gap since the previous one. Upload rate is
//! whatever the device reports in `tx_rate`; its running total assumes every
//! record covers a fixed slice of time.

use std::time::Instant;

/// Smallest elapsed time used when dividing, in seconds.
pub const MIN_ELAPSED_SECS: f64 = 1e-6;

/// Seconds each upload sample is assumed to cover when accumulating totals.
pub const UPLOAD_TICK_SECS: f64 = 0.1;

/// Rates and running totals for both link directions. All values are KB/s or KiB.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    last_time: Instant,
    upload_tick_secs: f64,
    download_rate: f64,
    download_peak: f64,
    download_total_kb: f64,
    upload_rate: f64,
    upload_peak: f64,
    upload_total_kb: f64,
}

impl RateEstimator {
    /// Start measuring from `start`; the first line's rate is taken against it.
    pub fn new(start: Instant) -> Self {
        Self::with_upload_tick(start, UPLOAD_TICK_SECS)
    }

    pub fn with_upload_tick(start: Instant, upload_tick_secs: f64) -> Self {
        Self {
            last_time: start,
            upload_tick_secs,
            download_rate: 0.0,
            download_peak: 0.0,
            download_total_kb: 0.0,
            upload_rate: 0.0,
            upload_peak: 0.0,
            upload_total_kb: 0.0,
        }
    }

    /// Account for a line of `len` bytes received at `now`. Returns the new
    /// download rate in KB/s.
    ///
    /// `now` earlier than the previous call is treated as zero elapsed time.
    pub fn record_download(&mut self, len: usize, now: Instant) -> f64 {
        let elapsed = now
            .saturating_duration_since(self.last_time)
            .as_secs_f64()
            .max(MIN_ELAPSED_SECS);
        self.last_time = now;

        let kb = len as f64 / 1024.0;
        self.download_rate = kb / elapsed;
        self.download_peak = self.download_peak.max(self.download_rate);
        self.download_total_kb += kb;
        self.download_rate
    }

    /// Take the device-reported upload rate. Returns the rate actually stored
    /// (negative and non-finite reports count as zero).
    pub fn record_upload(&mut self, tx_rate: f64) -> f64 {
        let rate = if tx_rate.is_finite() {
            tx_rate.max(0.0)
        } else {
            0.0
        };
        self.upload_rate = rate;
        self.upload_peak = self.upload_peak.max(rate);
        self.upload_total_kb += rate * self.upload_tick_secs;
        rate
    }

    pub fn download_rate(&self) -> f64 {
        self.download_rate
    }
    pub fn download_peak(&self) -> f64 {
        self.download_peak
    }
    pub fn download_total_kb(&self) -> f64 {
        self.download_total_kb
    }
    pub fn upload_rate(&self) -> f64 {
        self.upload_rate
    }
    pub fn upload_peak(&self) -> f64 {
        self.upload_peak
    }
    pub fn upload_total_kb(&self) -> f64 {
        self.upload_total_kb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rate_is_length_over_elapsed() {
        let t0 = Instant::now();
        let mut est = RateEstimator::new(t0);
        let rate = est.record_download(4096, t0 + Duration::from_secs(2));
        assert!((rate - 2.0).abs() < 1e-9, "got {rate}");
        assert!((est.download_total_kb() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_is_finite() {
        let t0 = Instant::now();
        let mut est = RateEstimator::new(t0);
        let rate = est.record_download(1024, t0);
        assert!(rate.is_finite());
        assert!((rate - 1.0 / MIN_ELAPSED_SECS).abs() < 1e-3);
    }

    #[test]
    fn clock_going_backwards_is_treated_as_zero_elapsed() {
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(5);
        let mut est = RateEstimator::new(later);
        let rate = est.record_download(10, t0);
        assert!(rate.is_finite());
    }

    #[test]
    fn peak_tracks_maximum() {
        let t0 = Instant::now();
        let mut est = RateEstimator::new(t0);
        est.record_download(2048, t0 + Duration::from_secs(1));
        est.record_download(1024, t0 + Duration::from_secs(2));
        assert!((est.download_rate() - 1.0).abs() < 1e-9);
        assert!((est.download_peak() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn upload_accumulates_per_tick() {
        let mut est = RateEstimator::new(Instant::now());
        est.record_upload(10.0);
        est.record_upload(20.0);
        assert!((est.upload_total_kb() - 3.0).abs() < 1e-9);
        assert_eq!(est.upload_rate(), 20.0);
        assert_eq!(est.upload_peak(), 20.0);
    }

    #[test]
    fn bogus_upload_reports_count_as_zero() {
        let mut est = RateEstimator::new(Instant::now());
        assert_eq!(est.record_upload(-3.0), 0.0);
        assert_eq!(est.record_upload(f64::NAN), 0.0);
        assert_eq!(est.upload_total_kb(), 0.0);
    }
}
