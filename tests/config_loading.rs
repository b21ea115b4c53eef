use std::path::{Path, PathBuf};
use std::time::Duration;

use jobwrapper::config::{
    Config, RawConfig, RawDuration, load_and_validate, load_from_path, parse_duration,
};
use jobwrapper::errors::JobwrapperError;
use jobwrapper::fs::mock::MockFileSystem;
use jobwrapper::lock::LockContext;

type TestResult = anyhow::Result<()>;

const CONFIG_PATH: &str = "/etc/jobwrapper/jobwrapper.conf";
const HOME: &str = "/home/ops";

fn from_toml(toml_src: &str) -> Result<Config, JobwrapperError> {
    let raw: RawConfig = toml::from_str(toml_src)?;
    Config::from_raw(raw, Some(Path::new(HOME)))
}

#[test]
fn defaults_when_nothing_is_set() -> TestResult {
    let config = from_toml("")?;

    assert_eq!(config.lock_dir, PathBuf::from("/home/ops/.jobwrapper"));
    assert_eq!(config.timeout, Duration::from_secs(30 * 60));
    assert_eq!(config.lock_filename, ".lockfile");
    assert_eq!(config.history_lines, 5);
    Ok(())
}

#[test]
fn every_key_can_be_overridden() -> TestResult {
    let config = from_toml(
        r#"
        lock_dir = "/var/lib/jobwrapper"
        timeout = 90
        lock_filename = "job.lock"
        history_lines = 20
        "#,
    )?;

    assert_eq!(config.lock_dir, PathBuf::from("/var/lib/jobwrapper"));
    assert_eq!(config.timeout, Duration::from_secs(90));
    assert_eq!(config.lock_filename, "job.lock");
    assert_eq!(config.history_lines, 20);
    Ok(())
}

#[test]
fn timeout_accepts_duration_strings() -> TestResult {
    let config = from_toml(r#"timeout = "45m""#)?;
    assert_eq!(config.timeout, Duration::from_secs(45 * 60));

    let raw: RawConfig = toml::from_str(r#"timeout = "1500ms""#)?;
    assert_eq!(raw.timeout, Some(RawDuration::Text("1500ms".to_string())));
    Ok(())
}

#[test]
fn lock_dir_is_resolved_against_home() -> TestResult {
    let cases = [
        ("~", "/home/ops"),
        ("~/locks", "/home/ops/locks"),
        ("locks/jobs", "/home/ops/locks/jobs"),
        ("/srv/locks", "/srv/locks"),
    ];
    for (raw, expected) in cases {
        let config = from_toml(&format!("lock_dir = {raw:?}"))?;
        assert_eq!(config.lock_dir, PathBuf::from(expected), "lock_dir = {raw:?}");
    }
    Ok(())
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        "history_lines = 0",
        "timeout = 0",
        r#"timeout = "10x""#,
        r#"lock_filename = "a/b""#,
        r#"lock_filename = "..""#,
    ];
    for src in cases {
        let err = from_toml(src).unwrap_err();
        assert!(
            matches!(err, JobwrapperError::ConfigError(_)),
            "{src}: expected ConfigError, got {err:?}"
        );
    }
}

#[test]
fn missing_file_yields_defaults() -> TestResult {
    let fs = MockFileSystem::new();
    let config = load_and_validate(&fs, CONFIG_PATH)?;

    assert_eq!(config.history_lines, 5);
    assert_eq!(config.lock_filename, ".lockfile");
    Ok(())
}

#[test]
fn raw_config_keeps_unset_keys_empty() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(CONFIG_PATH, "history_lines = 9\n");

    let raw = load_from_path(&fs, CONFIG_PATH)?;
    assert_eq!(raw.history_lines, Some(9));
    assert!(raw.lock_dir.is_none());
    assert!(raw.timeout.is_none());
    Ok(())
}

#[test]
fn loads_file_through_filesystem() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(
        CONFIG_PATH,
        "lock_dir = \"/var/lock/jobs\"\ntimeout = \"2h\"\nhistory_lines = 3\n",
    );

    let config = load_and_validate(&fs, CONFIG_PATH)?;
    assert_eq!(config.lock_dir, PathBuf::from("/var/lock/jobs"));
    assert_eq!(config.timeout, Duration::from_secs(2 * 60 * 60));
    assert_eq!(config.history_lines, 3);
    Ok(())
}

#[test]
fn malformed_file_is_an_error_naming_the_path() {
    let fs = MockFileSystem::new();
    fs.add_file(CONFIG_PATH, "lock_dir = [unterminated");

    let err = load_and_validate(&fs, CONFIG_PATH).unwrap_err();
    match err {
        JobwrapperError::ConfigError(msg) => assert!(msg.contains(CONFIG_PATH), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn unknown_keys_are_rejected() {
    let fs = MockFileSystem::new();
    fs.add_file(CONFIG_PATH, "lockdir = \"/tmp\"\n");

    let err = load_and_validate(&fs, CONFIG_PATH).unwrap_err();
    assert!(matches!(err, JobwrapperError::ConfigError(_)));
}

#[test]
fn unreadable_file_is_an_error() {
    let fs = MockFileSystem::new();
    fs.add_file(CONFIG_PATH, "history_lines = 2\n");
    fs.deny(CONFIG_PATH);

    assert!(load_and_validate(&fs, CONFIG_PATH).is_err());
}

#[test]
fn parse_duration_units() {
    assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
    assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration(" 30m "), Ok(Duration::from_secs(1800)));
    assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("15").is_err());
    assert!(parse_duration("m").is_err());
    assert!(parse_duration("5d").is_err());
    assert!(parse_duration("6000000000000000h").is_err());
    assert!(parse_duration("18446744073709551615m").is_err());
    assert_eq!(
        parse_duration("18446744073709551615s"),
        Ok(Duration::from_secs(u64::MAX))
    );
}

#[test]
fn overflowing_timeout_string_is_a_config_error() {
    let err = from_toml(r#"timeout = "6000000000000000h""#).unwrap_err();
    match err {
        JobwrapperError::ConfigError(msg) => assert!(msg.contains("too large"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn huge_timeout_can_bound_a_lock_context() -> TestResult {
    let config = from_toml("timeout = 9223372036854775807")?;
    assert_eq!(config.timeout, Duration::from_secs(i64::MAX as u64));

    let ctx = LockContext::background().with_timeout(config.timeout);
    assert_eq!(ctx.check(), None);
    Ok(())
}
