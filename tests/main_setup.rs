use ftl_dispatch::{AppConfig, config::Env};
use serial_test::serial;
use std::path::PathBuf;
use std::{env, panic};

const CONFIG_VARS: [&str; 13] = [
    "APP_ENV",
    "JWT_SECRET",
    "BIND_ADDR",
    "MOUNT_PATH",
    "ROUTING_PARAM",
    "TEMPLATE_DIRS",
    "STATIC_DIR",
    "STATIC_PREFIX",
    "STATIC_CACHE_DAYS",
    "LOGIN_TEMPLATE",
    "LOGIN_URL",
    "LOGIN_ACCOUNTS",
    "SESSION_TTL_SECS",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with every configuration variable cleared, then restores the
/// original environment.
fn run_with_clean_env<T, R>(test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_app_config_production_fail_fast() {
    let result = panic::catch_unwind(|| {
        run_with_clean_env(|| {
            unsafe {
                env::set_var("APP_ENV", "production");
            }
            // JWT_SECRET is missing
            AppConfig::load()
        })
    });

    assert!(
        result.is_err(),
        "Production config loading should panic on a missing signing secret"
    );
}

#[test]
#[serial]
fn test_app_config_production_with_secret() {
    let config = run_with_clean_env(|| {
        unsafe {
            env::set_var("APP_ENV", "production");
            env::set_var("JWT_SECRET", "prod-secret");
        }
        AppConfig::load()
    });

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
}

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    let config = run_with_clean_env(|| {
        unsafe {
            env::set_var("APP_ENV", "local");
        }
        AppConfig::load()
    });

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.jwt_secret, "super-secure-test-secret-value-local");
    assert_eq!(config.bind_addr, "0.0.0.0:9988");
    assert_eq!(config.mount_path, "/hello");
    assert_eq!(config.routing_param, "action");
    assert_eq!(config.template_dirs, vec![PathBuf::from("templates")]);
    assert_eq!(config.static_prefix, "/res");
    assert_eq!(config.static_cache_days, -1);
    assert_eq!(config.login_template, "Login.ftl");
    assert_eq!(config.login_url, "/hello?ftl=Login.ftl");
    assert_eq!(config.login_accounts, "");
    assert_eq!(config.session_ttl_secs, 8 * 60 * 60);
}

#[test]
#[serial]
fn test_app_config_reads_overrides() {
    let config = run_with_clean_env(|| {
        unsafe {
            env::set_var("MOUNT_PATH", "/gui");
            env::set_var("TEMPLATE_DIRS", "app/templates:lib/templates:");
            env::set_var("STATIC_CACHE_DAYS", "7");
            env::set_var("LOGIN_TEMPLATE", "SignIn.ftl");
            env::set_var("SESSION_TTL_SECS", "900");
        }
        AppConfig::load()
    });

    assert_eq!(config.mount_path, "/gui");
    assert_eq!(
        config.template_dirs,
        vec![PathBuf::from("app/templates"), PathBuf::from("lib/templates")]
    );
    assert_eq!(config.static_cache_days, 7);
    // The login URL follows the mount point and login template.
    assert_eq!(config.login_url, "/gui?ftl=SignIn.ftl");
    assert_eq!(config.session_ttl_secs, 900);
}

#[test]
#[serial]
fn test_app_config_rejects_malformed_cache_days() {
    let result = panic::catch_unwind(|| {
        run_with_clean_env(|| {
            unsafe {
                env::set_var("STATIC_CACHE_DAYS", "a week");
            }
            AppConfig::load()
        })
    });

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_app_config_rejects_malformed_session_ttl() {
    let result = panic::catch_unwind(|| {
        run_with_clean_env(|| {
            unsafe {
                env::set_var("SESSION_TTL_SECS", "8h");
            }
            AppConfig::load()
        })
    });

    assert!(result.is_err());
}
