use runpad::{config::GlobalConfig, AppError};

fn full_toml(working_dir: &str) -> String {
    format!(
        r#"
interpreter = '/usr/bin/python3'
working_dir = '{working_dir}'

[timeouts]
start_ms = 1000
graceful_stop_ms = 500
kill_ms = 750
version_probe_ms = 2000
first_prompt_ms = 20000

[run_env]
unbuffered = false
force_utf8 = true

[debug_env]
unbuffered = true
force_utf8 = false
disable_bytecode_cache = false

[debugger]
quit_on_program_end = false

[discovery]
extra_candidates = ["py -3.12", "/opt/python/bin/python3"]
probe_timeout_ms = 100
max_concurrent_probes = 2
"#
    )
}

#[test]
fn empty_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("empty config is valid");

    assert!(config.interpreter.is_none());
    assert!(config.working_dir.is_absolute());
    assert_eq!(config.timeouts.start_ms, 5_000);
    assert_eq!(config.timeouts.graceful_stop_ms, 2_000);
    assert_eq!(config.timeouts.kill_ms, 3_000);
    assert_eq!(config.timeouts.version_probe_ms, 5_000);
    assert_eq!(config.timeouts.first_prompt(), None);
    assert!(config.run_env.unbuffered);
    assert!(config.run_env.force_utf8);
    assert!(!config.run_env.disable_bytecode_cache);
    assert!(config.debug_env.disable_bytecode_cache);
    assert!(config.debugger.quit_on_program_end);
    assert_eq!(config.discovery.probe_timeout_ms, 8_000);
    assert_eq!(config.discovery.max_concurrent_probes, 8);
}

#[test]
fn full_config_parses_every_section() {
    let dir = tempfile::tempdir().unwrap();
    let config = GlobalConfig::from_toml_str(&full_toml(&dir.path().display().to_string()))
        .expect("full config is valid");

    assert_eq!(
        config.interpreter.as_deref(),
        Some(std::path::Path::new("/usr/bin/python3"))
    );
    assert_eq!(config.working_dir, dir.path().canonicalize().unwrap());
    assert_eq!(config.timeouts.start().as_millis(), 1_000);
    assert_eq!(config.timeouts.graceful_stop().as_millis(), 500);
    assert_eq!(config.timeouts.kill().as_millis(), 750);
    assert_eq!(config.timeouts.version_probe().as_millis(), 2_000);
    assert_eq!(
        config.timeouts.first_prompt().map(|d| d.as_millis()),
        Some(20_000)
    );
    assert!(!config.run_env.unbuffered);
    assert!(config.debug_env.unbuffered);
    assert!(!config.debug_env.force_utf8);
    assert!(!config.debugger.quit_on_program_end);
    assert_eq!(config.discovery.extra_candidates.len(), 2);
    assert_eq!(config.discovery.probe_timeout().as_millis(), 100);
}

#[test]
fn zero_timeout_is_rejected() {
    let err = GlobalConfig::from_toml_str("[timeouts]\nkill_ms = 0\n").unwrap_err();
    assert!(matches!(err, AppError::Config(msg) if msg.contains("kill_ms")));
}

#[test]
fn zero_first_prompt_bound_is_rejected() {
    let err = GlobalConfig::from_toml_str("[timeouts]\nfirst_prompt_ms = 0\n").unwrap_err();
    assert!(matches!(err, AppError::Config(msg) if msg.contains("first_prompt_ms")));
}

#[test]
fn zero_probe_concurrency_is_rejected() {
    let err =
        GlobalConfig::from_toml_str("[discovery]\nmax_concurrent_probes = 0\n").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn missing_working_dir_is_rejected() {
    let err = GlobalConfig::from_toml_str("working_dir = '/definitely/not/here'\n").unwrap_err();
    assert!(matches!(err, AppError::Config(msg) if msg.contains("working_dir")));
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = GlobalConfig::from_toml_str("[timeouts\nstart_ms = 1").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runpad.toml");
    std::fs::write(&path, full_toml(&dir.path().display().to_string())).unwrap();

    let config = GlobalConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.timeouts.start_ms, 1_000);
}

#[test]
fn load_from_missing_path_is_a_config_error() {
    let err = GlobalConfig::load_from_path("/definitely/not/runpad.toml").unwrap_err();
    assert!(matches!(err, AppError::Config(msg) if msg.contains("failed to read config")));
}
