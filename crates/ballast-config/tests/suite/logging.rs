use ballast_config::{init_tracing, LoggingConfig};

#[test]
fn tracing_is_installed_at_most_once() {
    let config = LoggingConfig {
        stderr: false,
        ..LoggingConfig::default()
    };

    // Another test in this binary may have won the first call already.
    let _ = init_tracing(&config);
    assert!(!init_tracing(&config));
    assert!(!init_tracing(&LoggingConfig::default()));
}

#[test]
fn default_level_scopes_ballast_targets() {
    let directives = LoggingConfig::default().directives();
    assert!(directives.starts_with("warn,"), "{directives}");
    assert!(directives.contains("ballast.memory=info"), "{directives}");
}
