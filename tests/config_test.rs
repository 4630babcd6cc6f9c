//! Tests for layered Settings loading

use std::fs;

use orgtree::application::services::OrphanPolicy;
use orgtree::application::ApplicationError;
use orgtree::config::{local_config_path, merge_levels, Settings};
use orgtree::domain::OrgLevel;
use rstest::rstest;
use tempfile::TempDir;

#[test]
fn given_no_local_config_when_loading_then_defaults() {
    let temp = TempDir::new().unwrap();

    let settings = Settings::load(Some(temp.path())).unwrap();

    assert_eq!(settings.delete_policy, OrphanPolicy::ReparentToGrandparent);
    assert!(settings.guard_last_root);
    assert_eq!(
        settings.hierarchy.bsc_levels,
        vec![OrgLevel::Directorate, OrgLevel::Division, OrgLevel::Department]
    );
    assert!(settings.snapshot.ends_with("orgtree.json"));
}

#[test]
fn given_local_config_when_loading_then_overrides_and_merges_levels() {
    // Arrange
    let temp = TempDir::new().unwrap();
    fs::write(
        local_config_path(temp.path()),
        r#"
snapshot = "data/org.toml"
delete_policy = "cascade"
guard_last_root = false

[hierarchy]
bsc_levels = ["!department", "section"]

[hierarchy.level_names]
division = "Bidang"
"#,
    )
    .unwrap();

    // Act
    let settings = Settings::load(Some(temp.path())).unwrap();

    // Assert
    assert_eq!(settings.snapshot, temp.path().join("data/org.toml"));
    assert_eq!(settings.delete_policy, OrphanPolicy::Cascade);
    assert!(!settings.guard_last_root);
    // section is never BSC-capable, whatever the config says
    assert_eq!(
        settings.hierarchy.bsc_levels,
        vec![OrgLevel::Directorate, OrgLevel::Division]
    );
    assert_eq!(settings.hierarchy.level_name(OrgLevel::Division), "Bidang");
    assert_eq!(
        settings.hierarchy.level_name(OrgLevel::Directorate),
        "Directorate"
    );
}

#[test]
fn given_unknown_level_in_local_config_when_loading_then_config_error() {
    let temp = TempDir::new().unwrap();
    fs::write(
        local_config_path(temp.path()),
        "[hierarchy]\nbsc_levels = [\"branch\"]\n",
    )
    .unwrap();

    let result = Settings::load(Some(temp.path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_malformed_local_config_when_loading_then_config_error() {
    let temp = TempDir::new().unwrap();
    fs::write(local_config_path(temp.path()), "delete_policy = [").unwrap();

    let result = Settings::load(Some(temp.path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[rstest]
#[case::add(&["division"], vec![OrgLevel::Directorate, OrgLevel::Division])]
#[case::remove(&["!directorate"], vec![])]
#[case::add_and_remove(&["department", "!directorate"], vec![OrgLevel::Department])]
fn given_overlay_when_merging_levels_then_union_with_negation(
    #[case] overlay: &[&str],
    #[case] expected: Vec<OrgLevel>,
) {
    let overlay: Vec<String> = overlay.iter().map(|s| s.to_string()).collect();
    let merged = merge_levels(&[OrgLevel::Directorate], &overlay).unwrap();
    assert_eq!(merged, expected);
}

#[test]
fn given_template_when_parsing_then_yields_defaults() {
    let parsed: Settings = toml::from_str(&Settings::template()).unwrap();
    assert_eq!(parsed, Settings::default());
}

#[test]
fn given_settings_when_rendering_toml_then_parses_back() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::load(Some(temp.path())).unwrap();

    let rendered = settings.to_toml().unwrap();
    let parsed: Settings = toml::from_str(&rendered).unwrap();

    assert_eq!(parsed, settings);
    assert!(rendered.contains("delete_policy = \"reparent-to-grandparent\""));
}
