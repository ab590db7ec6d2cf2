//! Tick progress events.
//!
//! `linguist analyze` draws an `indicatif` bar with one step per selected
//! entity; the background scheduler reports into [`NoopReporter`].

use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressStyle};

use crate::types::EntityRef;

/// Receives events from a running tick.
pub trait ProgressReporter: Send + Sync {
    /// The tick selected `selected` stale entities for analysis.
    fn tick_started(&self, tick: u64, selected: usize);

    /// One entity was handled; `outcome` is a short label such as
    /// `stored` or `fetch_failed`.
    fn entity_finished(&self, entity_ref: &EntityRef, outcome: &str);

    /// The tick ended, whether completed or timed out.
    fn tick_finished(&self);
}

#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn tick_started(&self, _tick: u64, _selected: usize) {}
    fn entity_finished(&self, _entity_ref: &EntityRef, _outcome: &str) {}
    fn tick_finished(&self) {}
}

/// Progress bar on stderr. Entities that end in anything other than
/// `stored` are printed above the bar as they happen.
#[derive(Debug)]
pub struct IndicatifReporter {
    bar: ProgressBar,
    finished: AtomicUsize,
    failed: AtomicUsize,
}

impl Default for IndicatifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatifReporter {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// Counts events without drawing anything.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} tick #{prefix} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        Self {
            bar,
            finished: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Entities handled in the current tick.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::Relaxed)
    }

    /// Entities in the current tick that were not stored.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

impl ProgressReporter for IndicatifReporter {
    fn tick_started(&self, tick: u64, selected: usize) {
        self.finished.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.bar.reset();
        self.bar.set_length(selected as u64);
        self.bar.set_prefix(tick.to_string());
    }

    fn entity_finished(&self, entity_ref: &EntityRef, outcome: &str) {
        self.finished.fetch_add(1, Ordering::Relaxed);
        if outcome != "stored" {
            self.failed.fetch_add(1, Ordering::Relaxed);
            self.bar.println(format!("  {entity_ref}: {outcome}"));
        }
        self.bar.set_message(entity_ref.to_string());
        self.bar.inc(1);
    }

    fn tick_finished(&self) {
        self.bar.finish_and_clear();
    }
}
