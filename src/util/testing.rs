//! Shared test support: logging setup and the reference trees.

use std::env;
use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{
    BscScope, CorporateEntity, EntityType, OrgHierarchyConfig, OrgLevel, OrgUnit, Snapshot,
    TreeStore, User,
};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "debug");
        }
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

pub fn entity(id: &str, entity_type: EntityType, parent: Option<&str>) -> CorporateEntity {
    CorporateEntity {
        id: id.into(),
        name: id.into(),
        code: id.to_ascii_uppercase(),
        entity_type,
        parent_entity_id: parent.map(String::from),
        display_order: 0,
        has_bsc: false,
        bsc_scope: BscScope::Standalone,
        is_active: true,
    }
}

pub fn unit(id: &str, level: OrgLevel, company: &str, parent: Option<&str>) -> OrgUnit {
    OrgUnit {
        id: id.into(),
        name: id.into(),
        code: id.to_ascii_uppercase(),
        level,
        company_id: company.into(),
        parent_id: parent.map(String::from),
        display_order: 0,
        has_bsc: false,
        inherit_bsc_from_id: None,
        is_active: true,
    }
}

/// Reference trees used across the test suites.
///
/// ```text
/// Corp-A (corporation)
/// ├── Hold-B (holding)
/// │   └── Co-C (company, BSC consolidated)
/// ├── Hold-D (holding)
/// └── Co-E (company)
///
/// Co-C:  D1 [BSC] ── V1 ── Dep1 ── S1
///                 ├─ V2 [BSC]
///                 └─ V3
///        D2
/// Co-E:  E1
/// ```
///
/// Users: `sys` (system admin) and `U` (no assignments).
pub fn sample_snapshot() -> Snapshot {
    let mut co_c = entity("Co-C", EntityType::Company, Some("Hold-B"));
    co_c.has_bsc = true;
    co_c.bsc_scope = BscScope::Consolidated;

    let mut hold_d = entity("Hold-D", EntityType::Holding, Some("Corp-A"));
    hold_d.display_order = 1;
    let mut co_e = entity("Co-E", EntityType::Company, Some("Corp-A"));
    co_e.display_order = 2;

    let mut d1 = unit("D1", OrgLevel::Directorate, "Co-C", None);
    d1.has_bsc = true;
    let mut d2 = unit("D2", OrgLevel::Directorate, "Co-C", None);
    d2.display_order = 1;
    let mut v2 = unit("V2", OrgLevel::Division, "Co-C", Some("D1"));
    v2.has_bsc = true;
    v2.display_order = 1;
    let mut v3 = unit("V3", OrgLevel::Division, "Co-C", Some("D1"));
    v3.display_order = 2;

    Snapshot {
        corporate_entities: vec![
            entity("Corp-A", EntityType::Corporation, None),
            entity("Hold-B", EntityType::Holding, Some("Corp-A")),
            co_c,
            hold_d,
            co_e,
        ],
        org_units: vec![
            d1,
            d2,
            unit("V1", OrgLevel::Division, "Co-C", Some("D1")),
            v2,
            v3,
            unit("Dep1", OrgLevel::Department, "Co-C", Some("V1")),
            unit("S1", OrgLevel::Section, "Co-C", Some("Dep1")),
            unit("E1", OrgLevel::Directorate, "Co-E", None),
        ],
        users: vec![
            User {
                id: "sys".into(),
                name: "System".into(),
                email: None,
                is_system_admin: true,
            },
            User {
                id: "U".into(),
                name: "User U".into(),
                email: Some("u@example.com".into()),
                is_system_admin: false,
            },
        ],
        assignments: Vec::new(),
    }
}

/// `sample_snapshot` loaded with the default hierarchy configuration.
pub fn sample_store() -> TreeStore {
    TreeStore::from_snapshot(sample_snapshot(), OrgHierarchyConfig::default())
        .expect("sample snapshot satisfies every structural rule")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_sample_snapshot_when_loading_then_builds() {
        init_test_setup();
        let store = sample_store();
        assert_eq!(store.entities().len(), 5);
        assert_eq!(store.units().len(), 8);
    }
}
