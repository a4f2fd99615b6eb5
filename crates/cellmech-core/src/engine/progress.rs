use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// Simulated time reached so far and the requested horizon.
    TimeAdvanced { time: f64, horizon: f64 },

    /// Free-form notice, such as a relaxation that ran out of budget.
    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Optional observer of a running simulation.
///
/// Besides forwarding [`Progress`] events it can carry a shared flag that another thread
/// raises to stop the run between phases.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn report_forwards_events_to_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));
        reporter.report(Progress::PhaseStart { name: "relax" });
        reporter.report(Progress::PhaseFinish);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Progress::PhaseStart { name: "relax" }, Progress::PhaseFinish]
        );
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::Message("ignored".into()));
        assert!(!reporter.is_cancelled());
    }

    #[test]
    fn cancellation_flag_is_observed() {
        let flag = Arc::new(AtomicBool::new(false));
        let reporter = ProgressReporter::new().with_cancellation(Arc::clone(&flag));
        assert!(!reporter.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(reporter.is_cancelled());
    }
}
