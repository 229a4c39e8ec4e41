use std::time::{Duration, Instant};
use tracing::info;

/// Logs when a stage starts and how long it took when dropped.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("⏱  Finished: {} (took {:.2?})", self.label, self.elapsed());
    }
}

/// Two-decimal correlation, or a dash when undefined.
pub fn fmt_corr(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "—".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_corr() {
        assert_eq!(fmt_corr(Some(1.0)), "1.00");
        assert_eq!(fmt_corr(Some(-0.456)), "-0.46");
        assert_eq!(fmt_corr(None), "—");
    }
}
