use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::Deserialize;
use serde::de::{self, Deserializer};

pub use directories::{DirectoryConfig, MonitorDirs, MonitorKey, TimeBasedDirs};
pub use schedule::{DayContext, ScheduleConfig};

mod schedule {
    use super::*;

    /// Holiday days and the day/night boundaries used to pick a wallpaper set.
    #[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct ScheduleConfig {
        #[serde(deserialize_with = "deserialize_weekdays")]
        holiday_days: Vec<Weekday>,
        #[serde(deserialize_with = "deserialize_time")]
        day_start_time: NaiveTime,
        #[serde(deserialize_with = "deserialize_time")]
        night_start_time: NaiveTime,
    }

    /// Snapshot of the schedule evaluated at one instant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DayContext {
        pub is_holiday: bool,
        pub is_day: bool,
    }

    impl Default for ScheduleConfig {
        fn default() -> Self {
            Self {
                holiday_days: vec![Weekday::Sun],
                day_start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
                night_start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            }
        }
    }

    impl ScheduleConfig {
        pub fn new(
            holiday_days: Vec<Weekday>,
            day_start_time: NaiveTime,
            night_start_time: NaiveTime,
        ) -> Self {
            Self {
                holiday_days,
                day_start_time,
                night_start_time,
            }
        }

        pub fn validate(&mut self) -> Result<()> {
            ensure!(
                self.day_start_time != self.night_start_time,
                "schedule.day-start-time and schedule.night-start-time must differ"
            );
            self.holiday_days
                .sort_unstable_by_key(|day| day.num_days_from_monday());
            self.holiday_days.dedup();
            Ok(())
        }

        pub fn holiday_days(&self) -> &[Weekday] {
            &self.holiday_days
        }

        pub fn day_start_time(&self) -> NaiveTime {
            self.day_start_time
        }

        pub fn night_start_time(&self) -> NaiveTime {
            self.night_start_time
        }

        pub fn is_holiday(&self, weekday: Weekday) -> bool {
            self.holiday_days.contains(&weekday)
        }

        /// `true` inside `[day-start, night-start)`. When night starts at or
        /// before day start the window wraps past midnight.
        pub fn is_daytime(&self, time: NaiveTime) -> bool {
            let day = self.day_start_time;
            let night = self.night_start_time;
            if day < night {
                day <= time && time < night
            } else {
                time >= day || time < night
            }
        }

        pub fn context_at(&self, now: NaiveDateTime) -> DayContext {
            // Sub-second precision never matters for the boundaries.
            let time = now.time().with_nanosecond(0).unwrap_or(now.time());
            DayContext {
                is_holiday: self.is_holiday(now.weekday()),
                is_day: self.is_daytime(time),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DayList {
        Joined(String),
        Listed(Vec<String>),
    }

    fn deserialize_weekdays<'de, D>(deserializer: D) -> Result<Vec<Weekday>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let names: Vec<String> = match DayList::deserialize(deserializer)? {
            DayList::Joined(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            DayList::Listed(names) => names,
        };
        names
            .iter()
            .map(|name| {
                name.trim().parse::<Weekday>().map_err(|_| {
                    de::Error::custom(format!(
                        "invalid holiday day '{name}'; expected a weekday name such as Sunday"
                    ))
                })
            })
            .collect()
    }

    fn deserialize_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let trimmed = raw.trim();
        for format in ["%H:%M:%S", "%H:%M"] {
            if let Ok(parsed) = NaiveTime::parse_from_str(trimmed, format) {
                return Ok(parsed);
            }
        }
        Err(de::Error::custom(format!(
            "invalid time literal '{raw}'; expected HH:MM"
        )))
    }
}

mod directories {
    use super::*;

    /// Which directory key a monitor slot looks up in each tier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum MonitorKey {
        Primary,
        Left,
    }

    impl MonitorKey {
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::Primary => "primary",
                Self::Left => "left",
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
    pub struct MonitorDirs {
        pub primary: Option<PathBuf>,
        pub left: Option<PathBuf>,
    }

    impl MonitorDirs {
        pub fn get(&self, key: MonitorKey) -> Option<&Path> {
            match key {
                MonitorKey::Primary => self.primary.as_deref(),
                MonitorKey::Left => self.left.as_deref(),
            }
        }

        pub fn is_empty(&self) -> bool {
            self.primary.is_none() && self.left.is_none()
        }

        fn labelled<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Path)>) {
            for key in [MonitorKey::Primary, MonitorKey::Left] {
                if let Some(path) = self.get(key) {
                    out.push((format!("{prefix}.{}", key.as_str()), path));
                }
            }
        }

        fn paths_mut<'a>(&'a mut self, out: &mut Vec<&'a mut PathBuf>) {
            out.extend(self.primary.as_mut());
            out.extend(self.left.as_mut());
        }
    }

    /// Workday/holiday crossed with light/dark sections.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
    pub struct TimeBasedDirs {
        pub workday_light: Option<MonitorDirs>,
        pub workday_dark: Option<MonitorDirs>,
        pub holiday_light: Option<MonitorDirs>,
        pub holiday_dark: Option<MonitorDirs>,
    }

    impl TimeBasedDirs {
        pub fn section(&self, context: DayContext) -> Option<&MonitorDirs> {
            match (context.is_holiday, context.is_day) {
                (false, true) => self.workday_light.as_ref(),
                (false, false) => self.workday_dark.as_ref(),
                (true, true) => self.holiday_light.as_ref(),
                (true, false) => self.holiday_dark.as_ref(),
            }
        }

        fn sections(&self) -> [(&'static str, Option<&MonitorDirs>); 4] {
            [
                ("workday-light", self.workday_light.as_ref()),
                ("workday-dark", self.workday_dark.as_ref()),
                ("holiday-light", self.holiday_light.as_ref()),
                ("holiday-dark", self.holiday_dark.as_ref()),
            ]
        }
    }

    /// Every wallpaper directory the user configured, grouped by tier.
    ///
    /// The basic tier lives at the top level (`primary`, `left`,
    /// `holiday-override`), the work/holiday tier under `workday` and
    /// `holiday`, and the time-based tier under `time-based`.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
    pub struct DirectoryConfig {
        pub primary: Option<PathBuf>,
        pub left: Option<PathBuf>,
        #[serde(alias = "sunday")]
        pub holiday_override: Option<PathBuf>,
        pub workday: Option<MonitorDirs>,
        pub holiday: Option<MonitorDirs>,
        pub time_based: Option<TimeBasedDirs>,
    }

    impl DirectoryConfig {
        pub fn time_based_section(&self, context: DayContext) -> Option<&MonitorDirs> {
            self.time_based.as_ref()?.section(context)
        }

        pub fn work_holiday_section(&self, context: DayContext) -> Option<&MonitorDirs> {
            if context.is_holiday {
                self.holiday.as_ref()
            } else {
                self.workday.as_ref()
            }
        }

        /// Basic tier lookup. On holidays the override, when configured,
        /// replaces the directory of every monitor.
        pub fn basic(&self, key: MonitorKey, context: DayContext) -> Option<&Path> {
            if context.is_holiday
                && let Some(dir) = self.holiday_override.as_deref()
            {
                return Some(dir);
            }
            match key {
                MonitorKey::Primary => self.primary.as_deref(),
                MonitorKey::Left => self.left.as_deref(),
            }
        }

        pub fn has_time_based(&self) -> bool {
            self.time_based.as_ref().is_some_and(|dirs| {
                dirs.sections()
                    .iter()
                    .any(|(_, section)| section.is_some_and(|s| !s.is_empty()))
            })
        }

        pub fn has_work_holiday(&self) -> bool {
            [&self.workday, &self.holiday]
                .iter()
                .any(|section| section.as_ref().is_some_and(|s| !s.is_empty()))
        }

        pub fn has_basic(&self) -> bool {
            self.primary.is_some() || self.left.is_some() || self.holiday_override.is_some()
        }

        pub fn is_empty(&self) -> bool {
            !(self.has_time_based() || self.has_work_holiday() || self.has_basic())
        }

        /// All configured directories with a dotted label naming their key.
        pub fn configured(&self) -> Vec<(String, &Path)> {
            let mut out = Vec::new();
            if let Some(time_based) = &self.time_based {
                for (name, section) in time_based.sections() {
                    if let Some(section) = section {
                        section.labelled(&format!("time-based.{name}"), &mut out);
                    }
                }
            }
            if let Some(section) = &self.workday {
                section.labelled("workday", &mut out);
            }
            if let Some(section) = &self.holiday {
                section.labelled("holiday", &mut out);
            }
            for (label, path) in [
                ("primary", &self.primary),
                ("left", &self.left),
                ("holiday-override", &self.holiday_override),
            ] {
                if let Some(path) = path {
                    out.push((label.to_string(), path.as_path()));
                }
            }
            out
        }

        pub fn paths_mut(&mut self) -> Vec<&mut PathBuf> {
            let mut out = Vec::new();
            if let Some(time_based) = self.time_based.as_mut() {
                for section in [
                    &mut time_based.workday_light,
                    &mut time_based.workday_dark,
                    &mut time_based.holiday_light,
                    &mut time_based.holiday_dark,
                ]
                .into_iter()
                .flatten()
                {
                    section.paths_mut(&mut out);
                }
            }
            for section in [&mut self.workday, &mut self.holiday].into_iter().flatten() {
                section.paths_mut(&mut out);
            }
            out.extend(self.primary.as_mut());
            out.extend(self.left.as_mut());
            out.extend(self.holiday_override.as_mut());
            out
        }
    }
}
