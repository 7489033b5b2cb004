//! Render statistics.
//!
//! Counters are bumped on thread-local cells in the hot path. Each bucket
//! drains its thread's cells when it finishes, and the renderer sums the
//! per-bucket snapshots into one report.

use std::cell::Cell;
use std::fmt;
use std::ops::{Add, AddAssign};

/// Event counted during rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    PixelSamples,
    CameraRays,
    RaysTraced,
    NanSamples,
    SphereTests,
    SphereHits,
    QuadTests,
    QuadHits,
    TriangleTests,
    TriangleHits,
    BvhNodesVisited,
}

const COUNTER_COUNT: usize = 11;

impl Counter {
    pub const ALL: [Counter; COUNTER_COUNT] = [
        Counter::PixelSamples,
        Counter::CameraRays,
        Counter::RaysTraced,
        Counter::NanSamples,
        Counter::SphereTests,
        Counter::SphereHits,
        Counter::QuadTests,
        Counter::QuadHits,
        Counter::TriangleTests,
        Counter::TriangleHits,
        Counter::BvhNodesVisited,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Counter::PixelSamples => "Pixel samples",
            Counter::CameraRays => "Camera rays",
            Counter::RaysTraced => "Rays traced",
            Counter::NanSamples => "NaN/Inf samples",
            Counter::SphereTests => "Sphere tests",
            Counter::SphereHits => "Sphere hits",
            Counter::QuadTests => "Quad tests",
            Counter::QuadHits => "Quad hits",
            Counter::TriangleTests => "Triangle tests",
            Counter::TriangleHits => "Triangle hits",
            Counter::BvhNodesVisited => "BVH nodes visited",
        }
    }
}

thread_local! {
    static COUNTS: [Cell<u64>; COUNTER_COUNT] = Default::default();
}

/// Bump a counter on the current thread.
#[inline]
pub fn increment(counter: Counter) {
    add(counter, 1);
}

#[inline]
pub fn add(counter: Counter, amount: u64) {
    COUNTS.with(|counts| {
        let cell = &counts[counter as usize];
        cell.set(cell.get() + amount);
    });
}

/// Snapshot of the current thread's counters. Resets them to zero.
pub fn take_thread_stats() -> RenderStats {
    COUNTS.with(|counts| {
        let mut stats = RenderStats::default();
        for (total, cell) in stats.counts.iter_mut().zip(counts.iter()) {
            *total = cell.replace(0);
        }
        stats
    })
}

/// Merged counter totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    counts: [u64; COUNTER_COUNT],
}

impl RenderStats {
    pub fn get(&self, counter: Counter) -> u64 {
        self.counts[counter as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }
}

impl AddAssign for RenderStats {
    fn add_assign(&mut self, rhs: RenderStats) {
        for (a, b) in self.counts.iter_mut().zip(rhs.counts) {
            *a += b;
        }
    }
}

impl Add for RenderStats {
    type Output = RenderStats;

    fn add(mut self, rhs: RenderStats) -> RenderStats {
        self += rhs;
        self
    }
}

impl fmt::Display for RenderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Render statistics:")?;
        for counter in Counter::ALL {
            writeln!(f, "  {:<20} {:>14}", counter.label(), self.get(counter))?;
        }

        let ratios = [
            ("Sphere", Counter::SphereHits, Counter::SphereTests),
            ("Quad", Counter::QuadHits, Counter::QuadTests),
            ("Triangle", Counter::TriangleHits, Counter::TriangleTests),
        ];
        for (name, hits, tests) in ratios {
            let tests = self.get(tests);
            if tests > 0 {
                let ratio = 100.0 * self.get(hits) as f64 / tests as f64;
                writeln!(f, "  {:<20} {:>13.2}%", format!("{name} hit ratio"), ratio)?;
            }
        }

        let rays = self.get(Counter::RaysTraced);
        if rays > 0 {
            let per_ray = self.get(Counter::BvhNodesVisited) as f64 / rays as f64;
            write!(f, "  {:<20} {:>14.2}", "BVH nodes per ray", per_ray)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_resets_thread_counters() {
        take_thread_stats();
        increment(Counter::SphereTests);
        increment(Counter::SphereTests);
        add(Counter::BvhNodesVisited, 5);

        let stats = take_thread_stats();
        assert_eq!(stats.get(Counter::SphereTests), 2);
        assert_eq!(stats.get(Counter::BvhNodesVisited), 5);
        assert!(take_thread_stats().is_empty());
    }

    #[test]
    fn test_counters_are_per_thread() {
        take_thread_stats();
        increment(Counter::QuadTests);

        let other = std::thread::spawn(|| {
            increment(Counter::QuadTests);
            increment(Counter::QuadTests);
            take_thread_stats()
        })
        .join()
        .unwrap();

        let mine = take_thread_stats();
        assert_eq!(mine.get(Counter::QuadTests), 1);
        assert_eq!(other.get(Counter::QuadTests), 2);
        assert_eq!((mine + other).get(Counter::QuadTests), 3);
    }

    #[test]
    fn test_report_mentions_ratios() {
        take_thread_stats();
        add(Counter::TriangleTests, 4);
        add(Counter::TriangleHits, 1);
        add(Counter::RaysTraced, 2);
        let report = take_thread_stats().to_string();

        assert!(report.contains("Triangle hit ratio"));
        assert!(report.contains("25.00%"));
        assert!(report.contains("BVH nodes per ray"));
    }
}
