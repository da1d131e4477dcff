use chrono::{NaiveDate, NaiveTime, Weekday};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use wallpaper_rotator::config::{self, Configuration, MonitorKey};

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
schedule:
  holiday-days: "Saturday, Sunday"
  day-start-time: "07:30"
  night-start-time: "19:45:10"
directories:
  primary: /walls/p
  left: /walls/l
  sunday: /walls/weekend
state-tracking:
  enabled: true
  auto-cleanup: true
  max-history: 3
logging:
  level: debug
"#;
    let cfg = Configuration::from_yaml_str(yaml)
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.schedule.holiday_days(), &[Weekday::Sat, Weekday::Sun]);
    assert_eq!(
        cfg.schedule.day_start_time(),
        NaiveTime::from_hms_opt(7, 30, 0).unwrap()
    );
    assert_eq!(
        cfg.schedule.night_start_time(),
        NaiveTime::from_hms_opt(19, 45, 10).unwrap()
    );
    assert_eq!(
        cfg.directories.holiday_override,
        Some(PathBuf::from("/walls/weekend"))
    );
    assert!(cfg.state_tracking.enabled);
    assert!(cfg.state_tracking.auto_cleanup);
    assert_eq!(cfg.state_tracking.max_history, 3);
    assert_eq!(cfg.logging.level, "debug");
}

#[test]
fn holiday_override_applies_on_every_configured_holiday() {
    let cfg = Configuration::from_yaml_str(
        r#"
schedule:
  holiday-days: [Saturday, Sunday]
directories:
  primary: /walls/p
  holiday-override: /walls/weekend
"#,
    )
    .unwrap()
    .validated()
    .unwrap();

    // 2024-07-20 is a Saturday.
    let saturday = NaiveDate::from_ymd_opt(2024, 7, 20)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let friday = NaiveDate::from_ymd_opt(2024, 7, 19)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let on_saturday = cfg.schedule.context_at(saturday);
    let on_friday = cfg.schedule.context_at(friday);
    assert_eq!(
        cfg.directories.basic(MonitorKey::Primary, on_saturday),
        Some(Path::new("/walls/weekend"))
    );
    assert_eq!(
        cfg.directories.basic(MonitorKey::Primary, on_friday),
        Some(Path::new("/walls/p"))
    );
}

#[test]
fn home_relative_paths_are_expanded() {
    let Some(home) = dirs::home_dir() else {
        return;
    };
    let cfg = Configuration::from_yaml_str(
        r#"
directories:
  primary: ~/Pictures/walls
state-tracking:
  state-file: ~/.local/share/wallpaperchanger/state.json
"#,
    )
    .unwrap()
    .validated()
    .unwrap();
    assert_eq!(
        cfg.directories.primary,
        Some(home.join("Pictures").join("walls"))
    );
    assert!(cfg.state_tracking.state_file.starts_with(&home));
}

#[test]
fn identical_day_and_night_start_is_rejected() {
    let result = Configuration::from_yaml_str(
        r#"
schedule:
  day-start-time: "08:00"
  night-start-time: "08:00"
directories:
  primary: /walls
"#,
    )
    .unwrap()
    .validated();
    assert!(result.is_err());
}

#[test]
fn unknown_directory_keys_are_rejected() {
    let result = Configuration::from_yaml_str(
        r#"
directories:
  primray: /walls
"#,
    );
    assert!(result.is_err());
}

#[test]
fn init_template_round_trips_through_load() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("wallpaperchanger").join("config.yaml");
    config::write_default(&path, false).unwrap();
    let cfg = config::load(&path).unwrap();
    assert!(cfg.directories.has_time_based());
    assert_eq!(fs::read_to_string(&path).unwrap(), config::DEFAULT_TEMPLATE);
}
