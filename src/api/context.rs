use log::{error, warn};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::cache::ResponseCache;
use crate::error::{ErrorKind, RequestError};

/// Global busy indicator toggled on the 0→1 and 1→0 transitions of the
/// in-flight counter.
pub trait BusyIndicator: Send + Sync {
    fn show(&self);
    fn hide(&self);
}

/// Receives every request error that is not suppressed.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &RequestError);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndicator;

impl BusyIndicator for NoopIndicator {
    fn show(&self) {}
    fn hide(&self) {}
}

/// Default sink: writes errors to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, err: &RequestError) {
        match err.kind {
            ErrorKind::Unauthenticated => warn!("session is no longer authenticated: {}", err.details.url),
            _ => error!(
                "{:?} error from {} (status {:?}): {}",
                err.kind, err.details.url, err.details.status, err.message
            ),
        }
    }
}

/// Shared state of the request pipeline: in-flight counter, busy
/// indicator, error sink and response cache.
pub struct PipelineContext {
    in_flight: Mutex<InFlight>,
    indicator: RwLock<Arc<dyn BusyIndicator>>,
    error_sink: RwLock<Arc<dyn ErrorSink>>,
    cache: ResponseCache,
}

/// In-flight count plus the generation it belongs to. `reset` starts a new
/// generation so guards from before it no longer count.
#[derive(Debug, Default)]
struct InFlight {
    count: usize,
    generation: u64,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(InFlight::default()),
            indicator: RwLock::new(Arc::new(NoopIndicator)),
            error_sink: RwLock::new(Arc::new(LogErrorSink)),
            cache: ResponseCache::new(),
        }
    }

    /// Install the indicator and error sink.
    pub fn init(&self, indicator: Arc<dyn BusyIndicator>, error_sink: Arc<dyn ErrorSink>) {
        *self.indicator.write().unwrap_or_else(PoisonError::into_inner) = indicator;
        *self.error_sink.write().unwrap_or_else(PoisonError::into_inner) = error_sink;
    }

    /// Zero the counter (hiding the indicator if it was shown) and drop
    /// every cache entry. Guards still alive afterwards are ignored.
    pub fn reset(&self) {
        let mut state = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if state.count > 0 {
            self.indicator().hide();
        }
        state.count = 0;
        state.generation = state.generation.wrapping_add(1);
        drop(state);
        self.cache.clear();
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).count
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Count a request as in flight until the guard is dropped.
    pub fn begin(self: &Arc<Self>) -> InFlightGuard {
        let mut state = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        state.count += 1;
        if state.count == 1 {
            self.indicator().show();
        }
        InFlightGuard {
            context: Arc::clone(self),
            generation: state.generation,
        }
    }

    fn end(&self, generation: u64) {
        let mut state = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation || state.count == 0 {
            return;
        }
        state.count -= 1;
        if state.count == 0 {
            self.indicator().hide();
        }
    }

    /// Send `err` to the sink unless suppressed. Unauthenticated errors are
    /// always reported so the caller can redirect to login.
    pub fn dispatch(&self, err: &RequestError, ignore_errors: bool) {
        if !ignore_errors || err.is_unauthenticated() {
            self.error_sink().report(err);
        }
    }

    fn indicator(&self) -> Arc<dyn BusyIndicator> {
        self.indicator.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn error_sink(&self) -> Arc<dyn ErrorSink> {
        self.error_sink.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Decrements the in-flight counter on drop, whether the request succeeded,
/// failed or was cancelled.
#[must_use = "the request stops counting as in flight when the guard is dropped"]
pub struct InFlightGuard {
    context: Arc<PipelineContext>,
    generation: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.context.end(self.generation);
    }
}

static GLOBAL_CONTEXT: Lazy<Arc<PipelineContext>> = Lazy::new(|| Arc::new(PipelineContext::new()));

/// The process-wide context used by pipelines that are not given their own.
pub fn global_context() -> Arc<PipelineContext> {
    GLOBAL_CONTEXT.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingIndicator {
        shows: AtomicUsize,
        hides: AtomicUsize,
    }

    impl BusyIndicator for CountingIndicator {
        fn show(&self) {
            self.shows.fetch_add(1, Ordering::SeqCst);
        }
        fn hide(&self) {
            self.hides.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<ErrorKind>>);

    impl ErrorSink for RecordingSink {
        fn report(&self, err: &RequestError) {
            self.0.lock().unwrap().push(err.kind);
        }
    }

    fn context_with(indicator: Arc<CountingIndicator>) -> Arc<PipelineContext> {
        let context = Arc::new(PipelineContext::new());
        context.init(indicator, Arc::new(LogErrorSink));
        context
    }

    #[test]
    fn test_indicator_toggles_once_for_overlapping_requests() {
        let indicator = Arc::new(CountingIndicator::default());
        let context = context_with(indicator.clone());

        let first = context.begin();
        let second = context.begin();
        let third = context.begin();
        assert_eq!(context.in_flight(), 3);
        assert_eq!(indicator.shows.load(Ordering::SeqCst), 1);

        drop(second);
        drop(first);
        assert_eq!(indicator.hides.load(Ordering::SeqCst), 0);
        drop(third);

        assert_eq!(context.in_flight(), 0);
        assert_eq!(indicator.shows.load(Ordering::SeqCst), 1);
        assert_eq!(indicator.hides.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sequential_requests_toggle_each_time() {
        let indicator = Arc::new(CountingIndicator::default());
        let context = context_with(indicator.clone());
        drop(context.begin());
        drop(context.begin());
        assert_eq!(indicator.shows.load(Ordering::SeqCst), 2);
        assert_eq!(indicator.hides.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_hides_and_ignores_stale_guards() {
        let indicator = Arc::new(CountingIndicator::default());
        let context = context_with(indicator.clone());
        let guard = context.begin();
        context.reset();
        assert_eq!(context.in_flight(), 0);
        assert_eq!(indicator.hides.load(Ordering::SeqCst), 1);
        drop(guard);
        assert_eq!(context.in_flight(), 0);
        assert_eq!(indicator.hides.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_guard_does_not_end_newer_requests() {
        let indicator = Arc::new(CountingIndicator::default());
        let context = context_with(indicator.clone());

        let stale = context.begin();
        context.reset();
        let live = context.begin();
        drop(stale);

        assert_eq!(context.in_flight(), 1);
        assert_eq!(indicator.shows.load(Ordering::SeqCst), 2);
        assert_eq!(indicator.hides.load(Ordering::SeqCst), 1);

        drop(live);
        assert_eq!(context.in_flight(), 0);
        assert_eq!(indicator.hides.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unauthenticated_errors_bypass_ignore_errors() {
        let context = PipelineContext::new();
        let sink = Arc::new(RecordingSink::default());
        context.init(Arc::new(NoopIndicator), sink.clone());

        let forbidden = RequestError::from_response(
            "/api/x",
            None,
            403,
            Some(serde_json::json!({"detail": "no", "is_authenticated": false})),
            "",
        );
        let missing = RequestError::from_response("/api/x", None, 404, Some(serde_json::json!({"detail": "gone"})), "");

        context.dispatch(&missing, true);
        context.dispatch(&forbidden, true);
        context.dispatch(&missing, false);

        assert_eq!(
            *sink.0.lock().unwrap(),
            vec![ErrorKind::Unauthenticated, ErrorKind::NotFound]
        );
    }
}
