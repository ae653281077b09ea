//! Line progress reporting for long imports (feature `progress`).
//!
//! Without the feature every method is a no-op, so the importer calls them unconditionally.

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) struct LineProgress {
    #[cfg(feature = "progress")]
    bar: Option<ProgressBar>,
}

impl LineProgress {
    #[cfg(feature = "progress")]
    pub(crate) fn new(total: u64, enabled: bool) -> Self {
        let bar = enabled.then(|| {
            let pb = ProgressBar::new(total.max(1));
            if let Ok(style) = ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} lines ({percent:>3}%) | ETA {eta_precise}",
            ) {
                pb.set_style(style);
            }
            pb
        });
        LineProgress { bar }
    }

    #[cfg(not(feature = "progress"))]
    pub(crate) fn new(_total: u64, _enabled: bool) -> Self {
        LineProgress {}
    }

    #[inline]
    pub(crate) fn inc(&self) {
        #[cfg(feature = "progress")]
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub(crate) fn finish(&self) {
        #[cfg(feature = "progress")]
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
