//! Loader and load unit tests
//!
//! Package loading, directory scans, version fallback and unit teardown.

mod common;
use common::*;

use module_host::module::registry::{ModuleDiscovery, ModuleRegistry, UNKNOWN_VERSION};
use module_host::module::{ConcurrentInitializer, LoadUnit, ModuleLoader};
use module_host::{ModuleError, ModuleInfo, ModuleState};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    log: EventLog,
    registry: Arc<ModuleRegistry>,
    loader: ModuleLoader,
}

impl Fixture {
    fn new() -> Self {
        let log = EventLog::new();
        let registry = Arc::new(ModuleRegistry::new(TestHost::new()));
        let loader = ModuleLoader::new(Arc::clone(&registry), Arc::new(recording_factory(&log)));
        Self {
            dir: TempDir::new().unwrap(),
            log,
            registry,
            loader,
        }
    }

    fn root(&self) -> &std::path::Path {
        self.dir.path()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scan_loads_valid_packages_and_skips_the_rest() {
    let fixture = Fixture::new();
    write_package(
        fixture.root(),
        "storage.module",
        &[declared("recording", ModuleInfo::new("storage"))],
    );
    write_package(
        fixture.root(),
        "chat.module",
        &[declared(
            "recording",
            ModuleInfo::new("chat").depends_on("storage"),
        )],
    );
    write_package(fixture.root(), "hollow.module", &[]);
    std::fs::create_dir(fixture.root().join("notes")).unwrap();

    let discovery = ModuleDiscovery::new(fixture.root());
    let report = fixture
        .loader
        .scan_location(&discovery, None, false)
        .await
        .unwrap();

    let mut loaded: Vec<_> = report
        .loaded
        .iter()
        .filter_map(|m| m.name().map(str::to_string))
        .collect();
    loaded.sort();
    assert_eq!(loaded, vec!["chat".to_string(), "storage".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(report.skipped[0].error, ModuleError::NotAModule(_)));

    let handle = ConcurrentInitializer::new(Arc::clone(&fixture.registry))
        .initialize_all()
        .await;
    assert!(handle.join(JOIN_TIMEOUT).await);
    assert_eq!(
        fixture.registry.state("chat").await,
        Some(ModuleState::Enabled)
    );
    assert!(fixture.log.position(&enabled("storage")) < fixture.log.position(&started("chat")));
}

#[tokio::test]
async fn test_scan_skips_package_without_manifest() {
    let fixture = Fixture::new();
    std::fs::create_dir(fixture.root().join("broken.module")).unwrap();
    write_package(
        fixture.root(),
        "storage.module",
        &[declared("recording", ModuleInfo::new("storage"))],
    );

    let report = fixture
        .loader
        .scan_location(&ModuleDiscovery::new(fixture.root()), None, true)
        .await
        .unwrap();

    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path.ends_with("broken.module"));
    assert!(matches!(
        report.skipped[0].error,
        ModuleError::InvalidDescriptor(_)
    ));
}

#[tokio::test]
async fn test_scan_of_file_fails() {
    let fixture = Fixture::new();
    let file = fixture.root().join("modules.txt");
    std::fs::write(&file, "not a directory").unwrap();

    let result = fixture
        .loader
        .scan_location(&ModuleDiscovery::new(&file), None, false)
        .await;

    assert!(matches!(result, Err(ModuleError::NotADirectory(_))));
    assert!(fixture.registry.list().await.is_empty());
}

#[tokio::test]
async fn test_unknown_type_keeps_earlier_siblings() {
    let fixture = Fixture::new();
    let package = write_package(
        fixture.root(),
        "mixed.module",
        &[
            declared("recording", ModuleInfo::new("storage")),
            declared("mystery", ModuleInfo::new("ghost")),
        ],
    );

    let result = fixture.loader.load(&package, None).await;

    assert!(matches!(result, Err(ModuleError::UnknownType(t)) if t == "mystery"));
    assert!(fixture.registry.contains("storage").await);
    assert!(!fixture.registry.contains("ghost").await);
    assert_eq!(fixture.registry.units().await.len(), 1);
}

#[tokio::test]
async fn test_failed_first_construction_leaves_no_unit() {
    let fixture = Fixture::new();
    let package = write_package(
        fixture.root(),
        "mystery.module",
        &[declared("mystery", ModuleInfo::new("ghost"))],
    );

    let result = fixture.loader.load(&package, None).await;

    assert!(matches!(result, Err(ModuleError::UnknownType(_))));
    assert!(fixture.registry.units().await.is_empty());
}

#[tokio::test]
async fn test_invalid_manifest_constructs_nothing() {
    let fixture = Fixture::new();
    let package = write_package(
        fixture.root(),
        "bad.module",
        &[
            declared("recording", ModuleInfo::new("storage")),
            declared("", ModuleInfo::new("typeless")),
        ],
    );

    let result = fixture.loader.load(&package, None).await;

    assert!(matches!(result, Err(ModuleError::InvalidDescriptor(_))));
    assert!(fixture.registry.list().await.is_empty());
    assert!(fixture.registry.units().await.is_empty());
}

#[tokio::test]
async fn test_blank_name_in_manifest_is_requirement_violation() {
    let fixture = Fixture::new();
    let package = write_package(
        fixture.root(),
        "blank.module",
        &[
            declared("recording", ModuleInfo::new("storage")),
            declared("recording", ModuleInfo::new("  ")),
        ],
    );

    let result = fixture.loader.load(&package, None).await;

    assert!(matches!(result, Err(ModuleError::RequirementViolation(_))));
    assert!(fixture.registry.list().await.is_empty());
    assert!(fixture.registry.units().await.is_empty());
}

#[tokio::test]
async fn test_free_form_names_load() {
    let fixture = Fixture::new();
    let long_name = "m".repeat(65);
    let package = write_package(
        fixture.root(),
        "names.module",
        &[
            declared("recording", ModuleInfo::new("Economy Plus")),
            declared(
                "recording",
                ModuleInfo::new("_internal").depends_on("Economy Plus"),
            ),
            declared("recording", ModuleInfo::new(long_name.as_str())),
        ],
    );

    let loaded = fixture.loader.load(&package, None).await.unwrap();

    assert_eq!(loaded.len(), 3);
    assert!(fixture.registry.contains("Economy Plus").await);
    assert!(fixture.registry.contains("_internal").await);
    assert!(fixture.registry.contains(&long_name).await);
}

#[tokio::test]
async fn test_duplicate_name_within_package_keeps_first() {
    let fixture = Fixture::new();
    let package = write_package(
        fixture.root(),
        "twins.module",
        &[
            declared("recording", ModuleInfo::new("storage")),
            declared("versioned", ModuleInfo::new("storage")),
        ],
    );

    let result = fixture.loader.load(&package, None).await;

    assert!(matches!(result, Err(ModuleError::AlreadyRegistered(_))));
    let first = fixture.registry.get("storage").await.unwrap();
    assert_eq!(
        first.descriptor().map(|d| d.version().to_string()).as_deref(),
        Some(UNKNOWN_VERSION)
    );
    assert_eq!(fixture.registry.units().await.len(), 1);
}

#[tokio::test]
async fn test_duplicate_name_across_packages() {
    let fixture = Fixture::new();
    let first = write_package(
        fixture.root(),
        "a.module",
        &[declared("recording", ModuleInfo::new("storage"))],
    );
    let second = write_package(
        fixture.root(),
        "b.module",
        &[declared("recording", ModuleInfo::new("storage"))],
    );

    fixture.loader.load(&first, None).await.unwrap();
    let result = fixture.loader.load(&second, None).await;

    assert!(matches!(result, Err(ModuleError::AlreadyRegistered(_))));
    assert_eq!(fixture.registry.list().await.len(), 1);
}

#[tokio::test]
async fn test_version_resolution_fallbacks() {
    let fixture = Fixture::new();
    let package = write_package(
        fixture.root(),
        "versions.module",
        &[
            declared("versioned", ModuleInfo::new("implied")),
            declared("versioned", ModuleInfo::new("explicit").with_version("1.0.0")),
            declared("recording", ModuleInfo::new("unknown")),
        ],
    );

    fixture.loader.load(&package, None).await.unwrap();

    let registry = &fixture.registry;
    assert_eq!(
        version_of(registry, "implied").await.as_deref(),
        Some(IMPLEMENTATION_VERSION)
    );
    assert_eq!(
        version_of(registry, "explicit").await.as_deref(),
        Some("1.0.0")
    );
    assert_eq!(
        version_of(registry, "unknown").await.as_deref(),
        Some(UNKNOWN_VERSION)
    );
}

#[tokio::test]
async fn test_entries_excluded_from_info_file_are_not_loaded() {
    let fixture = Fixture::new();
    let package = write_package(
        fixture.root(),
        "partial.module",
        &[
            declared("recording", ModuleInfo::new("storage")),
            declared(
                "recording",
                ModuleInfo::new("internal").excluded_from_info_file(),
            ),
        ],
    );

    let loaded = fixture.loader.load(&package, None).await.unwrap();

    assert_eq!(loaded.len(), 1);
    assert!(!fixture.registry.contains("internal").await);
}

#[tokio::test]
async fn test_units_chain_to_parent() {
    let fixture = Fixture::new();
    let base = write_package(
        fixture.root(),
        "base.module",
        &[declared("recording", ModuleInfo::new("storage"))],
    );
    let addon = write_package(
        fixture.root(),
        "addon.module",
        &[declared(
            "recording",
            ModuleInfo::new("chat").depends_on("storage"),
        )],
    );

    let base_instances = fixture.loader.load(&base, None).await.unwrap();
    let base_unit = unit_of(&fixture.registry, &base_instances[0]).await;

    let addon_instances = fixture
        .loader
        .load(&addon, Some(Arc::clone(&base_unit)))
        .await
        .unwrap();
    let addon_unit = unit_of(&fixture.registry, &addon_instances[0]).await;

    assert_eq!(addon_unit.depth(), 1);
    assert_eq!(addon_unit.parent().map(|p| p.id()), Some(base_unit.id()));
    assert!(addon_unit.source().ends_with("addon.module"));
}

#[tokio::test]
async fn test_teardown_removes_only_its_own_unit() {
    let fixture = Fixture::new();
    let first = write_package(
        fixture.root(),
        "first.module",
        &[
            declared("recording", ModuleInfo::new("alpha")),
            declared("recording", ModuleInfo::new("beta")),
        ],
    );
    let second = write_package(
        fixture.root(),
        "second.module",
        &[declared("recording", ModuleInfo::new("gamma"))],
    );

    let first_instances = fixture.loader.load(&first, None).await.unwrap();
    fixture.loader.load(&second, None).await.unwrap();
    let unit = unit_of(&fixture.registry, &first_instances[0]).await;
    assert_eq!(unit.members().len(), 2);

    fixture.registry.teardown(&unit).await.unwrap();

    assert!(!fixture.registry.contains("alpha").await);
    assert!(!fixture.registry.contains("beta").await);
    assert!(fixture.registry.contains("gamma").await);
    for instance in &first_instances {
        assert_eq!(instance.state(), ModuleState::Disabled);
    }
    // Members go in reverse construction order
    assert!(fixture.log.position(&disabled("beta")) < fixture.log.position(&disabled("alpha")));
    assert!(!fixture.log.contains(&disabled("gamma")));

    let units = fixture.registry.units().await;
    assert_eq!(units.len(), 1);
    assert!(units[0].source().ends_with("second.module"));
}

#[tokio::test]
async fn test_unregistering_last_member_releases_unit() {
    let fixture = Fixture::new();
    let package = write_package(
        fixture.root(),
        "solo.module",
        &[declared("recording", ModuleInfo::new("solo"))],
    );

    let instances = fixture.loader.load(&package, None).await.unwrap();
    assert_eq!(fixture.registry.units().await.len(), 1);

    fixture.registry.unregister(&instances[0]).await.unwrap();
    assert!(fixture.registry.units().await.is_empty());
}

async fn unit_of(
    registry: &ModuleRegistry,
    instance: &module_host::ModuleInstance,
) -> Arc<LoadUnit> {
    let id = instance.unit().expect("loaded instances belong to a unit");
    registry.unit(id).await.expect("unit is tracked while it has members")
}

async fn version_of(registry: &ModuleRegistry, name: &str) -> Option<String> {
    let instance = registry.get(name).await?;
    let version = instance.descriptor()?.version().to_string();
    Some(version)
}
