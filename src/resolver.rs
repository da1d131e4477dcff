//! Picks the wallpaper directory for every monitor slot.
//!
//! Tiers are consulted most specific first (time-based, then workday/holiday,
//! then basic) and each monitor walks them on its own, so a `left` monitor may
//! come from a lower tier than `primary` when the higher tier has no `left` key.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Configuration, DayContext, MonitorKey};
use crate::error::ConfigurationError;

/// Stable key of one monitor's wallpaper slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(String);

impl MonitorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `primary` for slot 0, `left` for slot 1, `monitor-<n>` afterwards.
    pub fn for_slot(index: usize) -> Self {
        match index {
            0 => Self::new("primary"),
            1 => Self::new("left"),
            n => Self(format!("monitor-{n}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Inverse of [`MonitorId::for_slot`]; `None` for ids not produced by it.
    pub fn slot_index(&self) -> Option<usize> {
        match self.0.as_str() {
            "primary" => Some(0),
            "left" => Some(1),
            other => other
                .strip_prefix("monitor-")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|&n| n >= 2),
        }
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for MonitorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    TimeBased,
    WorkHoliday,
    Basic,
    /// No key of its own; borrowed the directory resolved for `primary`.
    SharedPrimary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSlot {
    pub monitor: MonitorId,
    pub key: MonitorKey,
    pub directory: PathBuf,
    pub tier: Tier,
}

/// Key a slot looks up: even slots use `primary`, odd slots use `left`.
pub fn key_for_slot(index: usize) -> MonitorKey {
    if index % 2 == 1 {
        MonitorKey::Left
    } else {
        MonitorKey::Primary
    }
}

/// Resolve one directory per monitor for the moment `now`.
///
/// # Errors
/// Returns [`ConfigurationError::NoDirectories`] if no tier yields a directory
/// for any monitor.
pub fn resolve(
    config: &Configuration,
    now: NaiveDateTime,
    monitor_count: usize,
) -> Result<Vec<MonitorSlot>, ConfigurationError> {
    let context = config.schedule.context_at(now);
    info!(
        holiday = context.is_holiday,
        day = context.is_day,
        time = %now.format("%H:%M"),
        "schedule context"
    );

    let primary = lookup(config, MonitorKey::Primary, context);
    let left = lookup(config, MonitorKey::Left, context);
    if primary.is_none() && left.is_none() {
        return Err(ConfigurationError::NoDirectories);
    }

    let mut slots = Vec::with_capacity(monitor_count.max(1));
    for index in 0..monitor_count.max(1) {
        let key = key_for_slot(index);
        let resolved = match key {
            MonitorKey::Primary => primary,
            MonitorKey::Left => left.or(primary.map(|(dir, _)| (dir, Tier::SharedPrimary))),
        };
        let monitor = MonitorId::for_slot(index);
        match resolved {
            Some((directory, tier)) => {
                debug!(
                    %monitor,
                    directory = %directory.display(),
                    ?tier,
                    "resolved wallpaper directory"
                );
                slots.push(MonitorSlot {
                    monitor,
                    key,
                    directory: directory.to_path_buf(),
                    tier,
                });
            }
            None => {
                // Only reachable for primary slots when just `left` keys exist.
                debug!(%monitor, "no directory configured for monitor");
            }
        }
    }

    if slots.is_empty() {
        return Err(ConfigurationError::NoDirectories);
    }
    Ok(slots)
}

fn lookup(config: &Configuration, key: MonitorKey, context: DayContext) -> Option<(&Path, Tier)> {
    let dirs = &config.directories;
    if let Some(dir) = dirs.time_based_section(context).and_then(|s| s.get(key)) {
        return Some((dir, Tier::TimeBased));
    }
    if let Some(dir) = dirs.work_holiday_section(context).and_then(|s| s.get(key)) {
        return Some((dir, Tier::WorkHoliday));
    }
    dirs.basic(key, context).map(|dir| (dir, Tier::Basic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config(yaml: &str) -> Configuration {
        Configuration::from_yaml_str(yaml).unwrap()
    }

    // 2024-07-22 is a Monday, 2024-07-21 a Sunday.
    fn monday(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 22)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn sunday(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 21)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn dirs_of(slots: &[MonitorSlot]) -> Vec<(&str, &Path, Tier)> {
        slots
            .iter()
            .map(|s| (s.monitor.as_str(), s.directory.as_path(), s.tier))
            .collect()
    }

    const ALL_TIERS: &str = r#"
directories:
  primary: /basic/p
  left: /basic/l
  holiday-override: /basic/h
  workday:
    primary: /wh/work-p
    left: /wh/work-l
  holiday:
    primary: /wh/hol-p
  time-based:
    workday-light:
      primary: /tb/wl-p
    holiday-dark:
      primary: /tb/hd-p
      left: /tb/hd-l
"#;

    #[test]
    fn monitor_ids_follow_slot_positions() {
        assert_eq!(MonitorId::for_slot(0).as_str(), "primary");
        assert_eq!(MonitorId::for_slot(1).as_str(), "left");
        assert_eq!(MonitorId::for_slot(2).as_str(), "monitor-2");
        for index in 0..5 {
            assert_eq!(MonitorId::for_slot(index).slot_index(), Some(index));
        }
        assert_eq!(MonitorId::new("monitor-1").slot_index(), None);
        assert_eq!(MonitorId::new("HDMI-1").slot_index(), None);
    }

    #[test]
    fn time_based_wins_and_left_falls_through_per_monitor() {
        let cfg = config(ALL_TIERS);
        let slots = resolve(&cfg, monday(10), 2).unwrap();
        assert_eq!(
            dirs_of(&slots),
            vec![
                ("primary", Path::new("/tb/wl-p"), Tier::TimeBased),
                ("left", Path::new("/wh/work-l"), Tier::WorkHoliday),
            ]
        );
    }

    #[test]
    fn missing_time_section_falls_back_to_work_holiday() {
        let cfg = config(ALL_TIERS);
        let slots = resolve(&cfg, monday(22), 2).unwrap();
        assert_eq!(
            dirs_of(&slots),
            vec![
                ("primary", Path::new("/wh/work-p"), Tier::WorkHoliday),
                ("left", Path::new("/wh/work-l"), Tier::WorkHoliday),
            ]
        );
    }

    #[test]
    fn holiday_night_uses_time_based_holiday_dark() {
        let cfg = config(ALL_TIERS);
        let slots = resolve(&cfg, sunday(23), 2).unwrap();
        assert_eq!(
            dirs_of(&slots),
            vec![
                ("primary", Path::new("/tb/hd-p"), Tier::TimeBased),
                ("left", Path::new("/tb/hd-l"), Tier::TimeBased),
            ]
        );
    }

    #[test]
    fn holiday_day_left_reaches_basic_override() {
        let cfg = config(ALL_TIERS);
        let slots = resolve(&cfg, sunday(12), 2).unwrap();
        assert_eq!(
            dirs_of(&slots),
            vec![
                ("primary", Path::new("/wh/hol-p"), Tier::WorkHoliday),
                ("left", Path::new("/basic/h"), Tier::Basic),
            ]
        );
    }

    #[test]
    fn basic_only_configuration_resolves_to_basic_tier() {
        let cfg = config(
            r#"
directories:
  primary: /basic/p
  left: /basic/l
"#,
        );
        for now in [monday(3), monday(12), sunday(12), sunday(23)] {
            let slots = resolve(&cfg, now, 2).unwrap();
            assert!(slots.iter().all(|s| s.tier == Tier::Basic));
            assert_eq!(slots[0].directory, PathBuf::from("/basic/p"));
            assert_eq!(slots[1].directory, PathBuf::from("/basic/l"));
        }
    }

    #[test]
    fn basic_override_follows_configured_holiday_days() {
        let cfg = config(
            r#"
schedule:
  holiday-days: [Monday]
directories:
  primary: /basic/p
  sunday: /basic/h
"#,
        );
        let on_monday = resolve(&cfg, monday(12), 1).unwrap();
        assert_eq!(on_monday[0].directory, PathBuf::from("/basic/h"));
        let on_sunday = resolve(&cfg, sunday(12), 1).unwrap();
        assert_eq!(on_sunday[0].directory, PathBuf::from("/basic/p"));
    }

    #[test]
    fn extra_monitors_alternate_primary_and_left() {
        let cfg = config(
            r#"
directories:
  primary: /p
"#,
        );
        let slots = resolve(&cfg, monday(12), 3).unwrap();
        assert_eq!(
            dirs_of(&slots),
            vec![
                ("primary", Path::new("/p"), Tier::Basic),
                ("left", Path::new("/p"), Tier::SharedPrimary),
                ("monitor-2", Path::new("/p"), Tier::Basic),
            ]
        );
    }

    #[test]
    fn zero_monitors_resolves_one_slot() {
        let cfg = config("directories:\n  primary: /p\n");
        assert_eq!(resolve(&cfg, monday(12), 0).unwrap().len(), 1);
    }

    #[test]
    fn no_directory_for_context_is_a_configuration_error() {
        let cfg = config(
            r#"
directories:
  holiday:
    primary: /only-holidays
"#,
        );
        assert_eq!(
            resolve(&cfg, monday(12), 2),
            Err(ConfigurationError::NoDirectories)
        );
        assert!(resolve(&cfg, sunday(12), 2).is_ok());
    }

    #[test]
    fn left_only_configuration_skips_primary_slots() {
        let cfg = config("directories:\n  left: /l\n");
        let slots = resolve(&cfg, monday(12), 2).unwrap();
        assert_eq!(dirs_of(&slots), vec![("left", Path::new("/l"), Tier::Basic)]);
    }
}
