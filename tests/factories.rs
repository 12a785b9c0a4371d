use hydra::core::config::HydraConfig;
use hydra::core::db;
use hydra::core::error::HydraError;
use hydra::core::registry;
use hydra::core::store::Store;
use hydra::modules::{aao, factory};
use hydra::runtime::Runtime;
use tempfile::tempdir;

const DAY: u64 = 86_400;

fn bootstrap(root: &std::path::Path) -> Runtime {
    db::initialize_ledger_db(root).unwrap();
    let store = Store::new(root.to_path_buf());
    registry::initialize_registry(&store, "operator").unwrap();
    let rt = Runtime::open(store, &HydraConfig::default());
    rt.genesis_cut("operator").unwrap();
    rt
}

#[test]
fn test_create_macro_aao() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let id = factory::create_macro_aao(store, "owner", "Test Macro AAO", 30 * DAY).unwrap();
    let org = aao::get_aao(store, id).unwrap();
    assert_eq!(org.topic, "Test Macro AAO");
    assert_eq!(org.duration, 30 * DAY);
    assert_eq!(org.owner, "owner");
    assert!(org.active);
    assert!(org.is_macro);
}

#[test]
fn test_create_micro_aao_linked_to_macro() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let macro_id = factory::create_macro_aao(store, "owner", "Parent Macro AAO", 30 * DAY).unwrap();
    let micro_id =
        factory::create_micro_aao(store, "owner", "Child Micro AAO", 15 * DAY, macro_id).unwrap();

    let micro = aao::get_aao(store, micro_id).unwrap();
    assert_eq!(micro.topic, "Child Micro AAO");
    assert!(!micro.is_macro);
    assert_eq!(micro.parent_id, Some(macro_id));

    assert_eq!(aao::get_macro_aao_id(store, micro_id).unwrap(), macro_id);
}

#[test]
fn test_micro_requires_existing_macro_parent() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let err =
        factory::create_micro_aao(store, "owner", "Invalid Parent Micro AAO", 15 * DAY, 9999)
            .unwrap_err();
    assert!(matches!(err, HydraError::ParentMacroAAODoesNotExist));
    assert_eq!(aao::get_total_aao_count(store).unwrap(), 0);
}

#[test]
fn test_micro_cannot_nest_under_micro() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let macro_id = factory::create_macro_aao(store, "owner", "Parent Macro AAO", 30 * DAY).unwrap();
    let micro_id =
        factory::create_micro_aao(store, "owner", "First Micro AAO", 15 * DAY, macro_id).unwrap();

    let err = factory::create_micro_aao(store, "owner", "Second Micro AAO", 15 * DAY, micro_id)
        .unwrap_err();
    assert!(matches!(err, HydraError::ParentAAOMustBeAMacroAAO));
}

#[test]
fn test_factories_track_total_count() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    assert_eq!(aao::get_total_aao_count(store).unwrap(), 0);
    let macro_id = factory::create_macro_aao(store, "owner", "Count Test Macro AAO", 30 * DAY).unwrap();
    assert_eq!(aao::get_total_aao_count(store).unwrap(), 1);
    factory::create_micro_aao(store, "owner", "Count Test Micro AAO", 15 * DAY, macro_id).unwrap();
    assert_eq!(aao::get_total_aao_count(store).unwrap(), 2);
}

#[test]
fn test_aaos_by_creator_spans_factories() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    factory::create_macro_aao(store, "u1", "User1 AAO 1", 30 * DAY).unwrap();
    factory::create_macro_aao(store, "u1", "User1 AAO 2", 30 * DAY).unwrap();

    let owned = aao::get_aaos_by_creator(store, "u1").unwrap();
    assert_eq!(owned.len(), 2);
    for id in owned {
        assert_eq!(aao::get_aao(store, id).unwrap().owner, "u1");
    }
}

#[test]
fn test_macro_of_non_micro_fails() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let macro_id = factory::create_macro_aao(store, "owner", "Standalone", 30 * DAY).unwrap();
    let err = aao::get_macro_aao_id(store, macro_id).unwrap_err();
    assert!(matches!(err, HydraError::NotFound(_)));

    let err = aao::get_macro_aao_id(store, 777).unwrap_err();
    assert!(matches!(err, HydraError::NotFound(_)));
}

#[test]
fn test_factories_through_dispatcher() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());

    let result = rt
        .dispatch(
            "owner",
            "createMacroAAO",
            &serde_json::json!({ "topic": "Dispatched Macro", "duration": 30 * DAY }),
        )
        .unwrap();
    let macro_id = result["aao_id"].as_u64().unwrap();

    let result = rt
        .dispatch(
            "owner",
            "createMicroAAO",
            &serde_json::json!({
                "topic": "Dispatched Micro",
                "duration": 15 * DAY,
                "macro_id": macro_id,
            }),
        )
        .unwrap();
    let micro_id = result["aao_id"].as_u64().unwrap();

    let result = rt
        .dispatch(
            "hydra",
            "getMacroAAOId",
            &serde_json::json!({ "aao_id": micro_id }),
        )
        .unwrap();
    assert_eq!(result["macro_id"], macro_id);
}
