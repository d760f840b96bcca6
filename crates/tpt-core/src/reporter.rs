//! Decoupled progress reporting.
//!
//! `Handler`/`Resolver`/`Downloader` code only ever talks to a `dyn
//! Reporter`; it never touches a terminal, a progress bar widget, or any
//! other UI object. `tpt-cli` supplies the concrete line-printing impl,
//! `tpt-apply-updates` uses [`NullReporter`] since nothing is watching it
//! run interactively.

use std::sync::Arc;

pub trait Reporter: Send + Sync {
    fn info(&self, message: &str) {
        let _ = message;
    }
    fn warning(&self, message: &str) {
        let _ = message;
    }
    fn error(&self, message: &str) {
        let _ = message;
    }
    fn success(&self, message: &str) {
        let _ = message;
    }
    fn downloading(&self, name: &str, downloaded: u64, total: Option<u64>) {
        let _ = (name, downloaded, total);
    }
    fn installing(&self, name: &str) {
        let _ = name;
    }
    fn removing(&self, name: &str) {
        let _ = name;
    }
    fn done(&self, name: &str) {
        let _ = name;
    }
    fn failed(&self, name: &str, error: &str) {
        let _ = (name, error);
    }
}

impl<T: Reporter + ?Sized> Reporter for Arc<T> {
    fn info(&self, message: &str) {
        (**self).info(message);
    }
    fn warning(&self, message: &str) {
        (**self).warning(message);
    }
    fn error(&self, message: &str) {
        (**self).error(message);
    }
    fn success(&self, message: &str) {
        (**self).success(message);
    }
    fn downloading(&self, name: &str, downloaded: u64, total: Option<u64>) {
        (**self).downloading(name, downloaded, total);
    }
    fn installing(&self, name: &str) {
        (**self).installing(name);
    }
    fn removing(&self, name: &str) {
        (**self).removing(name);
    }
    fn done(&self, name: &str) {
        (**self).done(name);
    }
    fn failed(&self, name: &str, error: &str) {
        (**self).failed(name, error);
    }
}

/// A `Reporter` that discards everything, for non-interactive callers
/// (`tpt-apply-updates`, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingReporter {
        calls: AtomicUsize,
    }

    impl Reporter for CountingReporter {
        fn info(&self, _message: &str) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn arc_blanket_impl_forwards_calls() {
        let inner = Arc::new(CountingReporter { calls: AtomicUsize::new(0) });
        let reporter: Arc<dyn Reporter> = inner.clone();
        reporter.info("hello");
        reporter.warning("ignored by default");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn null_reporter_does_nothing_but_compiles() {
        let r = NullReporter;
        r.info("x");
        r.downloading("pkg", 10, Some(100));
    }
}
