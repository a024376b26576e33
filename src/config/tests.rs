use clap::Parser;
use serial_test::serial;

use super::*;

#[test]
fn defaults_are_memory_backend_with_day_long_ttls() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.backend, CacheBackend::Memory);
    assert_eq!(settings.cache.entity_ttl, Duration::from_secs(86_400));
    assert_eq!(settings.cache.index_ttl, Duration::from_secs(86_400));
    assert_eq!(settings.cache.list_ttl, Duration::from_secs(86_400));
    assert_eq!(settings.cache.operation_timeout, Duration::from_millis(2_000));
    assert_eq!(settings.cache.scan_batch_size.get(), 500);
    assert!(!settings.cache.background_maintenance);
}

#[test]
fn key_class_ttls_fall_back_to_shared_ttl() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(600);
    raw.cache.list_ttl_seconds = Some(30);

    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.cache.entity_ttl, Duration::from_secs(600));
    assert_eq!(settings.cache.index_ttl, Duration::from_secs(600));
    assert_eq!(settings.cache.list_ttl, Duration::from_secs(30));
}

#[test]
fn zero_durations_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.index_ttl_seconds = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.index_ttl_seconds",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.cache.operation_timeout_ms = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.operation_timeout_ms",
            ..
        })
    ));
}

#[test]
fn oversized_durations_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(u64::MAX / 2);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.ttl_seconds",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.cache.entity_ttl_seconds = Some(MAX_TTL_SECS + 1);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.entity_ttl_seconds",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.cache.list_ttl_seconds = Some(MAX_TTL_SECS);
    let settings = Settings::from_raw(raw).expect("a year is accepted");
    assert_eq!(settings.cache.list_ttl, Duration::from_secs(MAX_TTL_SECS));

    let mut raw = RawSettings::default();
    raw.cache.operation_timeout_ms = Some(u64::MAX);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.operation_timeout_ms",
            ..
        })
    ));
}

#[test]
fn redis_backend_requires_url() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some("redis".to_string());
    raw.cache.redis_url = Some("   ".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.redis_url",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.cache.backend = Some("Redis".to_string());
    raw.cache.redis_url = Some("redis://127.0.0.1:6379".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.backend, CacheBackend::Redis);
    assert_eq!(
        settings.cache.redis_url.as_deref(),
        Some("redis://127.0.0.1:6379")
    );
}

#[test]
fn unknown_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some("memcached".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.backend",
            ..
        })
    ));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.cache.ttl_seconds = Some(60);

    let overrides = Overrides {
        log_level: Some("debug".to_string()),
        log_json: Some(true),
        cache_ttl_seconds: Some(120),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert_eq!(settings.cache.entity_ttl, Duration::from_secs(120));
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    // SAFETY: serialized with the other environment tests.
    unsafe {
        std::env::set_var("STOA__CACHE__LIST_TTL_SECONDS", "45");
        std::env::set_var("STOA__CACHE__BACKGROUND_MAINTENANCE", "true");
    }

    let cli = CliArgs::parse_from(["stoa", "ping"]);
    let result = load(&cli);

    unsafe {
        std::env::remove_var("STOA__CACHE__LIST_TTL_SECONDS");
        std::env::remove_var("STOA__CACHE__BACKGROUND_MAINTENANCE");
    }

    let settings = result.expect("valid settings");
    assert_eq!(settings.cache.list_ttl, Duration::from_secs(45));
    assert!(settings.cache.background_maintenance);
}

#[test]
#[serial]
fn cli_beats_environment() {
    // SAFETY: serialized with the other environment tests.
    unsafe {
        std::env::set_var("STOA__CACHE__OPERATION_TIMEOUT_MS", "100");
    }

    let cli = CliArgs::parse_from(["stoa", "ping", "--cache-operation-timeout-ms", "250"]);
    let result = load(&cli);

    unsafe {
        std::env::remove_var("STOA__CACHE__OPERATION_TIMEOUT_MS");
    }

    let settings = result.expect("valid settings");
    assert_eq!(settings.cache.operation_timeout, Duration::from_millis(250));
}

#[test]
fn parse_inspect_arguments() {
    let args = CliArgs::parse_from([
        "stoa",
        "--cache-backend",
        "redis",
        "inspect",
        "questions:slug:intro-to-x",
    ]);

    assert_eq!(args.overrides.cache_backend.as_deref(), Some("redis"));
    match args.command {
        Command::Inspect(inspect) => assert_eq!(inspect.key, "questions:slug:intro-to-x"),
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_flush_and_purge_arguments() {
    let args = CliArgs::parse_from(["stoa", "flush", "answers"]);
    assert!(matches!(args.command, Command::Flush(ref flush) if flush.family == "answers"));

    let args = CliArgs::parse_from(["stoa", "purge", "questions:list:*"]);
    assert!(matches!(args.command, Command::Purge(ref purge) if purge.pattern == "questions:list:*"));
}
