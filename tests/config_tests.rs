use filedrop::config::Config;
use std::env;
use std::path::Path;

// helper to clear env vars
fn clear_env() {
    for key in [
        "HOST",
        "PORT",
        "BOSS_THREADS",
        "WORKER_THREADS",
        "BLOCKING_THREADS",
        "PATH_PARENT",
        "PATH_DIR",
        "URL_PARENT",
        "TEMP_DIR",
        "MAX_UPLOAD_SIZE",
        "HEADER_READ_TIMEOUT_SECS",
    ] {
        env::remove_var(key);
    }
}

#[test]
fn test_url_for() {
    let config = Config {
        url_parent: "https://cdn.example.com/?file=".to_string(),
        path_dir: "drop".to_string(),
        ..Config::default()
    };

    assert_eq!(
        config.url_for("cat_1700000000000.png"),
        "https://cdn.example.com/?file=drop/cat_1700000000000.png"
    );
    assert_eq!(config.upload_dir(), Path::new("./files").join("drop"));
}

#[test]
fn test_config_behavior() {
    // Run these sequentially to avoid race conditions with environment variables

    // 1. Test Defaults
    clear_env();

    let config = Config::from_env();

    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 8080);
    assert_eq!(config.boss_threads, 1);
    assert_eq!(config.worker_threads, 8);
    assert_eq!(config.blocking_threads, 4);
    assert_eq!(config.path_parent.to_str().unwrap(), "./files");
    assert_eq!(config.path_dir, "upload");
    assert_eq!(config.url_parent, "http://127.0.0.1:8080/?file=");
    assert_eq!(config.temp_dir, env::temp_dir());
    assert_eq!(config.max_upload_size, 100 * 1024 * 1024);
    assert_eq!(config.header_read_timeout_secs, 30);

    // 2. Test From Env
    clear_env();

    env::set_var("PORT", "9090");
    env::set_var("BOSS_THREADS", "0");
    env::set_var("WORKER_THREADS", "2");
    env::set_var("PATH_PARENT", "/srv/files");
    env::set_var("PATH_DIR", "/incoming/");
    env::set_var("URL_PARENT", "https://files.example.com/?file=");
    env::set_var("MAX_UPLOAD_SIZE", "not-a-number");

    let config = Config::from_env();

    assert_eq!(config.port, 9090);
    // thread counts never drop below one
    assert_eq!(config.boss_threads, 1);
    assert_eq!(config.worker_threads, 2);
    assert_eq!(config.path_parent.to_str().unwrap(), "/srv/files");
    assert_eq!(config.path_dir, "incoming");
    assert_eq!(
        config.url_for("a_1.txt"),
        "https://files.example.com/?file=incoming/a_1.txt"
    );
    // unparseable values keep the default
    assert_eq!(config.max_upload_size, 100 * 1024 * 1024);

    // Cleanup
    clear_env();
}
