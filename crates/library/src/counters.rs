//! Run-wide counters shared by every worker.

use derive_more::Display;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Scanned,
    Moved,
    Deleted,
    CreatedDirs,
    Kept,
    Skipped,
    Errors,
}

#[derive(Debug, Default)]
pub struct Counters {
    scanned: AtomicU64,
    moved: AtomicU64,
    deleted: AtomicU64,
    created_dirs: AtomicU64,
    kept: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Scanned => &self.scanned,
            Counter::Moved => &self.moved,
            Counter::Deleted => &self.deleted,
            Counter::CreatedDirs => &self.created_dirs,
            Counter::Kept => &self.kept,
            Counter::Skipped => &self.skipped,
            Counter::Errors => &self.errors,
        }
    }

    pub fn incr(&self, counter: Counter) {
        self.slot(counter).fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            scanned: self.get(Counter::Scanned),
            moved: self.get(Counter::Moved),
            deleted: self.get(Counter::Deleted),
            created_dirs: self.get(Counter::CreatedDirs),
            kept: self.get(Counter::Kept),
            skipped: self.get(Counter::Skipped),
            errors: self.get(Counter::Errors),
        }
    }
}

/// Point-in-time copy of [`Counters`], for progress reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[display(
    "scanned={scanned} moved={moved} deleted={deleted} created_dirs={created_dirs} kept={kept} skipped={skipped} errors={errors}"
)]
pub struct CounterSnapshot {
    pub scanned: u64,
    pub moved: u64,
    pub deleted: u64,
    pub created_dirs: u64,
    pub kept: u64,
    pub skipped: u64,
    pub errors: u64,
}
