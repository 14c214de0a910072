// tests/config_load.rs
use nostrhitch::config::daemon::ENV_CONFIG_PATH;
use nostrhitch::error::ConfigError;
use nostrhitch::Config;
use std::{env, fs};

const FULL_TOML: &str = r#"
nsec = "nsec1example"
relays = ["wss://relay.one", "wss://relay.two"]
hw_interval = 600
languages = ["en", "de"]
snapshot_dir = "dumps"
metrics_addr = "127.0.0.1:9100"

[profile]
name = "nostrhitchbot"
nip05 = "nostrhitch@hitchwiki.org"
website = "https://hitchwiki.org/en/Hitchwiki:Nostrhitch"
"#;

#[test]
fn toml_file_with_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nostrhitch.toml");
    fs::write(&path, FULL_TOML).unwrap();

    let cfg = Config::load_from(&path).unwrap();
    assert_eq!(cfg.relays.len(), 2);
    assert_eq!(cfg.feed_interval().as_secs(), 600);
    assert_eq!(cfg.snapshot_interval().as_secs(), 86_400);
    assert_eq!(cfg.languages, vec!["en".to_string(), "de".to_string()]);
    assert_eq!(cfg.snapshot_dir, std::path::PathBuf::from("dumps"));
    assert_eq!(cfg.metrics_addr.map(|a| a.port()), Some(9100));

    let profile = cfg.profile.unwrap();
    assert_eq!(profile.name, "nostrhitchbot");
    assert_eq!(profile.nip05, "nostrhitch@hitchwiki.org");
    assert!(profile.about.is_empty());
}

#[test]
fn json_content_under_odd_extension_still_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.conf");
    fs::write(&path, r#"{"nsec": "nsec1example", "relays": ["wss://r"]}"#).unwrap();
    assert!(Config::load_from(&path).is_ok());
}

#[test]
fn invalid_settings_are_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let garbage = dir.path().join("broken.toml");
    fs::write(&garbage, "this is [not valid").unwrap();
    assert!(matches!(
        Config::load_from(&garbage),
        Err(ConfigError::Format(_))
    ));

    let zero = dir.path().join("zero.toml");
    fs::write(
        &zero,
        "nsec = \"nsec1example\"\nrelays = [\"wss://r\"]\nhw_interval = 0\n",
    )
    .unwrap();
    assert!(matches!(
        Config::load_from(&zero),
        Err(ConfigError::Invalid(_))
    ));

    assert!(matches!(
        Config::load_from(&dir.path().join("absent.toml")),
        Err(ConfigError::NotFound(_))
    ));
}

#[serial_test::serial]
#[test]
fn path_resolution_order() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // nothing anywhere
    assert!(matches!(
        Config::resolve_path(None),
        Err(ConfigError::NotFound(_))
    ));

    // legacy JSON next to the binary
    fs::write(tmp.path().join("config.json"), "{}").unwrap();
    assert_eq!(
        Config::resolve_path(None).unwrap(),
        std::path::PathBuf::from("config.json")
    );

    // TOML under config/ wins over the JSON
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/nostrhitch.toml"), FULL_TOML).unwrap();
    assert_eq!(
        Config::resolve_path(None).unwrap(),
        std::path::PathBuf::from("config/nostrhitch.toml")
    );

    // env beats the defaults (and must exist), CLI beats env
    let from_env = tmp.path().join("elsewhere.toml");
    env::set_var(ENV_CONFIG_PATH, &from_env);
    assert!(matches!(
        Config::resolve_path(None),
        Err(ConfigError::NotFound(_))
    ));
    fs::write(&from_env, FULL_TOML).unwrap();
    assert_eq!(Config::resolve_path(None).unwrap(), from_env);
    let cli = std::path::Path::new("cli.toml");
    assert_eq!(Config::resolve_path(Some(cli)).unwrap(), cli);

    env::remove_var(ENV_CONFIG_PATH);
    env::set_current_dir(old).unwrap();
}
