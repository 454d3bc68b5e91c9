use region_annotator::Config;

#[test]
fn partial_config_keeps_defaults() {
    let config: Config = serde_json::from_str(r#"{"max_undo": 5, "cut_width": 3}"#).unwrap();
    assert_eq!(config.max_undo, 5);
    assert_eq!(config.cut_width, 3);
    assert_eq!(config.min_region_area, Config::default().min_region_area);
    assert_eq!(config.refine_weights, [0.0, 1.0]);
}

#[test]
fn empty_config_is_default() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn config_survives_json() {
    let config = Config {
        snap_tolerance: 4.0,
        ..Config::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(serde_json::from_str::<Config>(&json).unwrap(), config);
}
