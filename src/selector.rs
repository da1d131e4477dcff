//! Per-run wallpaper selection.
//!
//! Rules:
//! - A path handed to one monitor is claimed for the rest of the run and is not
//!   offered to later monitors, unless that would leave a monitor with nothing.
//! - With tracking on and a usable prior record, walk the directory in sorted
//!   order starting after the last applied image, skipping claimed paths.
//! - Otherwise pick uniformly at random from the unclaimed candidates.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::debug;

use crate::error::NoCandidatesError;
use crate::resolver::MonitorId;
use crate::state::RotationRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub path: PathBuf,
    /// Record to persist if the wallpaper is applied.
    pub record: RotationRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    RoundRobin,
    Random,
}

pub struct Selector<R> {
    rng: R,
    tracking: bool,
    max_history: usize,
    claimed: HashSet<PathBuf>,
}

impl<R: Rng> Selector<R> {
    pub fn new(rng: R, tracking: bool, max_history: usize) -> Self {
        Self {
            rng,
            tracking,
            max_history: max_history.max(1),
            claimed: HashSet::new(),
        }
    }

    /// Paths already handed out during this run.
    #[cfg(test)]
    pub(crate) fn claimed(&self) -> &HashSet<PathBuf> {
        &self.claimed
    }

    /// Choose the next wallpaper for `monitor` from `candidates` (sorted by path).
    ///
    /// # Errors
    /// Returns [`NoCandidatesError`] when `candidates` is empty.
    pub fn select(
        &mut self,
        monitor: &MonitorId,
        candidates: &[PathBuf],
        prior: Option<&RotationRecord>,
        now: DateTime<Utc>,
    ) -> Result<Selection, NoCandidatesError> {
        if candidates.is_empty() {
            return Err(NoCandidatesError {
                monitor: monitor.clone(),
            });
        }

        let mut pool: Vec<usize> = (0..candidates.len())
            .filter(|&idx| !self.claimed.contains(&candidates[idx]))
            .collect();
        if pool.is_empty() {
            debug!(%monitor, "every candidate already used this run; allowing repeats");
            pool = (0..candidates.len()).collect();
        }

        let last_index = if self.tracking {
            prior.and_then(|record| position_of(candidates, &record.last_image))
        } else {
            None
        };
        if self.tracking && prior.is_some() && last_index.is_none() {
            debug!(%monitor, "last wallpaper no longer in directory; choosing at random");
        }

        let (chosen, strategy) = match last_index {
            Some(last) => (next_after(last, candidates.len(), &pool), Strategy::RoundRobin),
            None => (pool[self.rng.random_range(0..pool.len())], Strategy::Random),
        };
        let path = candidates[chosen].clone();
        debug!(
            %monitor,
            path = %path.display(),
            ?strategy,
            pool = pool.len(),
            "selected wallpaper"
        );

        self.claimed.insert(path.clone());
        let record = RotationRecord::advanced(prior, &path, now, self.max_history);
        Ok(Selection { path, record })
    }
}

fn position_of(candidates: &[PathBuf], path: &Path) -> Option<usize> {
    candidates.iter().position(|candidate| candidate == path)
}

/// First pool index strictly after `last`, wrapping around. `pool` is sorted.
fn next_after(last: usize, len: usize, pool: &[usize]) -> usize {
    (1..=len)
        .map(|step| (last + step) % len)
        .find(|idx| pool.binary_search(idx).is_ok())
        .unwrap_or(pool[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::{BTreeMap, HashMap};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 22, 10, 0, 0).unwrap()
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/w/{n}"))).collect()
    }

    fn prior(last: &str) -> RotationRecord {
        RotationRecord {
            last_image: PathBuf::from(format!("/w/{last}")),
            history: vec![PathBuf::from(format!("/w/{last}"))],
            updated_at: now(),
            extra: BTreeMap::new(),
        }
    }

    fn tracking(seed: u64) -> Selector<StdRng> {
        Selector::new(StdRng::seed_from_u64(seed), true, 10)
    }

    fn primary() -> MonitorId {
        MonitorId::new("primary")
    }

    #[test]
    fn round_robin_advances_and_wraps() {
        let candidates = paths(&["a.jpg", "b.jpg", "c.jpg"]);

        let mut run = tracking(1);
        let pick = run
            .select(&primary(), &candidates, Some(&prior("b.jpg")), now())
            .unwrap();
        assert_eq!(pick.path, PathBuf::from("/w/c.jpg"));

        let mut next_run = tracking(1);
        let pick = next_run
            .select(&primary(), &candidates, Some(&pick.record), now())
            .unwrap();
        assert_eq!(pick.path, PathBuf::from("/w/a.jpg"));
    }

    #[test]
    fn round_robin_covers_directory_without_repeats() {
        let candidates = paths(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]);
        let mut record = prior("c.jpg");
        let mut seen = Vec::new();
        for run in 0..candidates.len() {
            let mut selector = tracking(run as u64);
            let pick = selector
                .select(&primary(), &candidates, Some(&record), now())
                .unwrap();
            assert_ne!(pick.path, record.last_image);
            seen.push(pick.path.clone());
            record = pick.record;
        }
        seen.sort();
        assert_eq!(seen, candidates);
    }

    #[test]
    fn round_robin_never_repeats_when_alternatives_exist() {
        let candidates = paths(&["a.jpg", "b.jpg"]);
        for seed in 0..20 {
            let mut selector = tracking(seed);
            let pick = selector
                .select(&primary(), &candidates, Some(&prior("a.jpg")), now())
                .unwrap();
            assert_eq!(pick.path, PathBuf::from("/w/b.jpg"));
        }
    }

    #[test]
    fn claimed_paths_are_skipped_for_later_monitors() {
        let candidates = paths(&["a.jpg", "b.jpg", "c.jpg"]);
        let mut selector = tracking(7);
        let first = selector
            .select(&primary(), &candidates, Some(&prior("a.jpg")), now())
            .unwrap();
        assert_eq!(first.path, PathBuf::from("/w/b.jpg"));

        // The left monitor last showed `a`, so round robin would pick `b`;
        // `b` is taken, so it moves on to `c`.
        let second = selector
            .select(&MonitorId::new("left"), &candidates, Some(&prior("a.jpg")), now())
            .unwrap();
        assert_eq!(second.path, PathBuf::from("/w/c.jpg"));
        assert_eq!(selector.claimed().len(), 2);
    }

    #[test]
    fn exhausted_pool_falls_back_to_all_candidates() {
        let candidates = paths(&["only.jpg"]);
        let mut selector = Selector::new(StdRng::seed_from_u64(3), false, 10);
        let a = selector.select(&primary(), &candidates, None, now()).unwrap();
        let b = selector
            .select(&MonitorId::new("left"), &candidates, None, now())
            .unwrap();
        assert_eq!(a.path, b.path);
    }

    #[test]
    fn random_picks_are_distinct_while_pool_lasts() {
        let candidates = paths(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        for seed in 0..10 {
            let mut selector = Selector::new(StdRng::seed_from_u64(seed), false, 10);
            let picked: HashSet<PathBuf> = (0..4)
                .map(|slot| {
                    selector
                        .select(&MonitorId::for_slot(slot), &candidates, None, now())
                        .unwrap()
                        .path
                })
                .collect();
            assert_eq!(picked.len(), 4, "seed {seed}");
        }
    }

    #[test]
    fn random_selection_is_roughly_uniform() {
        let candidates = paths(&["a.jpg", "b.jpg", "c.jpg"]);
        let mut counts: HashMap<PathBuf, usize> = HashMap::new();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..3000 {
            let mut selector = Selector::new(&mut rng, false, 10);
            let pick = selector.select(&primary(), &candidates, None, now()).unwrap();
            *counts.entry(pick.path).or_default() += 1;
        }
        assert_eq!(counts.len(), 3);
        for count in counts.values() {
            assert!((800..1200).contains(count), "skewed count {count}");
        }
    }

    #[test]
    fn stale_last_image_selects_from_pool() {
        let candidates = paths(&["a.jpg", "b.jpg"]);
        let mut selector = tracking(5);
        let pick = selector
            .select(&primary(), &candidates, Some(&prior("deleted.jpg")), now())
            .unwrap();
        assert!(candidates.contains(&pick.path));
        assert_eq!(pick.record.last_image, pick.path);
        assert_eq!(
            pick.record.history,
            vec![PathBuf::from("/w/deleted.jpg"), pick.path.clone()]
        );
    }

    #[test]
    fn tracking_off_ignores_prior_record_for_choice() {
        let candidates = paths(&["a.jpg", "b.jpg", "c.jpg"]);
        let mut picks = HashSet::new();
        for seed in 0..30 {
            let mut selector = Selector::new(StdRng::seed_from_u64(seed), false, 10);
            let pick = selector
                .select(&primary(), &candidates, Some(&prior("a.jpg")), now())
                .unwrap();
            picks.insert(pick.path);
        }
        assert!(picks.contains(&PathBuf::from("/w/a.jpg")));
    }

    #[test]
    fn record_history_is_capped() {
        let candidates = paths(&["a.jpg", "b.jpg", "c.jpg"]);
        let mut record = prior("a.jpg");
        for seed in 0..5 {
            let mut selector = Selector::new(StdRng::seed_from_u64(seed), true, 2);
            record = selector
                .select(&primary(), &candidates, Some(&record), now())
                .unwrap()
                .record;
        }
        assert_eq!(record.history.len(), 2);
        assert_eq!(record.history.last(), Some(&record.last_image));
        assert_eq!(record.updated_at, now());
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let mut selector = tracking(0);
        let err = selector.select(&primary(), &[], None, now()).unwrap_err();
        assert_eq!(err.monitor, primary());
        assert!(selector.claimed().is_empty());
    }
}
