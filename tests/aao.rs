use hydra::core::config::{HydraConfig, QuorumRule};
use hydra::core::db;
use hydra::core::error::HydraError;
use hydra::core::registry;
use hydra::core::store::Store;
use hydra::modules::aao::{self, ProposalStatus};
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
fn test_create_and_get_aao() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let id = aao::create_aao(store, "owner", "Test Macro AAO", 30 * DAY, None).unwrap();
    assert_eq!(id, 0);

    let org = aao::get_aao(store, 0).unwrap();
    assert_eq!(org.topic, "Test Macro AAO");
    assert_eq!(org.owner, "owner");
    assert_eq!(org.duration, 30 * DAY);
    assert!(org.active);
    assert!(org.is_macro);
    assert_eq!(org.parent_id, None);

    // Identical state, identical result.
    let again = aao::get_aao(store, 0).unwrap();
    assert_eq!(org.topic, again.topic);
    assert_eq!(org.active, again.active);
}

#[test]
fn test_get_unknown_aao_fails() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());

    let err = aao::get_aao(rt.store(), 42).unwrap_err();
    assert!(matches!(err, HydraError::NotFound(_)));
}

#[test]
fn test_modify_aao_owner_only() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let id = aao::create_aao(store, "owner", "Original Topic", DAY, None).unwrap();

    aao::modify_aao(store, "owner", id, "Updated Topic", 2 * DAY).unwrap();
    let org = aao::get_aao(store, id).unwrap();
    assert_eq!(org.topic, "Updated Topic");
    assert_eq!(org.duration, 2 * DAY);

    let err = aao::modify_aao(store, "intruder", id, "Hijacked", DAY).unwrap_err();
    assert!(matches!(err, HydraError::NotOwner));
}

#[test]
fn test_terminate_is_terminal() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let id = aao::create_aao(store, "owner", "Doomed AAO", DAY, None).unwrap();
    aao::join_aao(store, "u1", id).unwrap();

    let err = aao::terminate_aao(store, "u1", id).unwrap_err();
    assert!(matches!(err, HydraError::NotOwner));

    aao::terminate_aao(store, "owner", id).unwrap();
    let org = aao::get_aao(store, id).unwrap();
    assert!(!org.active);

    // Second terminate fails rather than silently succeeding.
    let err = aao::terminate_aao(store, "owner", id).unwrap_err();
    assert!(matches!(err, HydraError::AlreadyTerminated));

    // No mutation is accepted for a terminated organization.
    let err = aao::join_aao(store, "u2", id).unwrap_err();
    assert!(matches!(err, HydraError::OrganizationInactive));
    let err = aao::modify_aao(store, "owner", id, "Too late", DAY).unwrap_err();
    assert!(matches!(err, HydraError::OrganizationInactive));
    let err = aao::submit_proposal(store, "u1", id, "Too late").unwrap_err();
    assert!(matches!(err, HydraError::OrganizationInactive));

    // Historical queries still serve.
    assert!(aao::is_member(store, id, "u1").unwrap());
    assert_eq!(aao::get_members_count(store, id).unwrap(), 2);
}

#[test]
fn test_membership_lifecycle() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let id = aao::create_aao(store, "owner", "Membership Test AAO", DAY, None).unwrap();

    // Owner is an implicit member from creation.
    assert!(aao::is_member(store, id, "owner").unwrap());
    assert_eq!(aao::get_members_count(store, id).unwrap(), 1);

    aao::join_aao(store, "u1", id).unwrap();
    assert!(aao::is_member(store, id, "u1").unwrap());
    assert_eq!(aao::get_members_count(store, id).unwrap(), 2);

    let err = aao::join_aao(store, "u1", id).unwrap_err();
    assert!(matches!(err, HydraError::AlreadyMember));

    aao::leave_aao(store, "u1", id).unwrap();
    assert!(!aao::is_member(store, id, "u1").unwrap());

    let err = aao::leave_aao(store, "u1", id).unwrap_err();
    assert!(matches!(err, HydraError::NotMember));

    // The owner cannot vacate.
    let err = aao::leave_aao(store, "owner", id).unwrap_err();
    assert!(matches!(err, HydraError::ValidationError(_)));
    assert!(aao::is_member(store, id, "owner").unwrap());
}

#[test]
fn test_membership_listings() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let a = aao::create_aao(store, "alice", "Alpha", DAY, None).unwrap();
    let b = aao::create_aao(store, "bob", "Beta", DAY, None).unwrap();
    aao::join_aao(store, "alice", b).unwrap();

    assert_eq!(aao::get_aaos_by_creator(store, "alice").unwrap(), vec![a]);
    assert_eq!(aao::get_aaos_by_member(store, "alice").unwrap(), vec![a, b]);
    assert_eq!(aao::get_total_aao_count(store).unwrap(), 2);
}

#[test]
fn test_admin_role_round_trip() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let id = aao::create_aao(store, "owner", "Admin Test AAO", DAY, None).unwrap();
    aao::join_aao(store, "u1", id).unwrap();

    aao::assign_admin_role(store, "owner", id, "u1").unwrap();
    assert!(aao::is_admin(store, id, "u1").unwrap());

    // An admin may promote another address; only the owner may revoke.
    aao::assign_admin_role(store, "u1", id, "u2").unwrap();
    assert!(aao::is_admin(store, id, "u2").unwrap());

    let err = aao::revoke_admin_role(store, "u1", id, "u2").unwrap_err();
    assert!(matches!(err, HydraError::NotOwner));

    aao::revoke_admin_role(store, "owner", id, "u2").unwrap();
    assert!(!aao::is_admin(store, id, "u2").unwrap());

    // Plain members cannot assign.
    aao::join_aao(store, "u3", id).unwrap();
    let err = aao::assign_admin_role(store, "u3", id, "u3").unwrap_err();
    assert!(matches!(err, HydraError::NotAdmin));

    // The owner's privileges are implicit, not a revocable role.
    let err = aao::revoke_admin_role(store, "owner", id, "owner").unwrap_err();
    assert!(matches!(err, HydraError::ValidationError(_)));
}

#[test]
fn test_proposal_voting_scenario() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let id = aao::create_aao(store, "owner", "Test Macro AAO", 30 * DAY, None).unwrap();
    assert_eq!(id, 0);
    for user in ["u1", "u2", "u3"] {
        aao::join_aao(store, user, id).unwrap();
    }

    let pid = aao::submit_proposal(store, "u1", id, "Proposal to add a new feature").unwrap();
    assert_eq!(pid, 0);

    let proposal = aao::get_proposal(store, pid).unwrap();
    assert_eq!(proposal.text, "Proposal to add a new feature");
    assert_eq!(proposal.proposer, "u1");
    assert_eq!(proposal.aao_id, id);
    assert_eq!(proposal.status, ProposalStatus::Active);
    assert_eq!(proposal.for_votes, 0);
    assert_eq!(proposal.against_votes, 0);

    aao::vote(store, "u1", pid, true).unwrap();
    aao::vote(store, "u2", pid, false).unwrap();
    aao::vote(store, "u3", pid, true).unwrap();

    let proposal = aao::get_proposal(store, pid).unwrap();
    assert_eq!(proposal.for_votes, 2);
    assert_eq!(proposal.against_votes, 1);

    // A second vote fails and leaves the tallies unchanged.
    let err = aao::vote(store, "u1", pid, false).unwrap_err();
    assert!(matches!(err, HydraError::AlreadyVoted));
    let proposal = aao::get_proposal(store, pid).unwrap();
    assert_eq!(proposal.for_votes, 2);
    assert_eq!(proposal.against_votes, 1);

    // 2 for / 1 against passes the simple majority.
    let status = aao::execute_proposal(store, "u1", pid, QuorumRule::SimpleMajority).unwrap();
    assert_eq!(status, ProposalStatus::Executed);
    let proposal = aao::get_proposal(store, pid).unwrap();
    assert_eq!(proposal.status, ProposalStatus::Executed);

    // Terminal: no re-execution, no late votes.
    let err = aao::execute_proposal(store, "u1", pid, QuorumRule::SimpleMajority).unwrap_err();
    assert!(matches!(err, HydraError::ValidationError(_)));
    let err = aao::vote(store, "u2", pid, true).unwrap_err();
    assert!(matches!(err, HydraError::ValidationError(_)));
}

#[test]
fn test_proposal_requires_membership() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let id = aao::create_aao(store, "owner", "Governance Test AAO", DAY, None).unwrap();
    aao::join_aao(store, "u1", id).unwrap();
    let pid = aao::submit_proposal(store, "u1", id, "Test Proposal").unwrap();

    let err = aao::submit_proposal(store, "outsider", id, "Nope").unwrap_err();
    assert!(matches!(err, HydraError::NotMember));

    let err = aao::vote(store, "outsider", pid, true).unwrap_err();
    assert!(matches!(err, HydraError::NotMember));

    let err = aao::execute_proposal(store, "outsider", pid, QuorumRule::Permissive).unwrap_err();
    assert!(matches!(err, HydraError::NotMember));

    let err = aao::get_proposal(store, 999).unwrap_err();
    assert!(matches!(err, HydraError::NotFound(_)));
}

#[test]
fn test_proposal_ids_are_globally_dense() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let macro_id = aao::create_aao(store, "owner", "Test Macro AAO", 30 * DAY, None).unwrap();
    let micro_id = aao::create_aao(store, "owner", "Test Micro AAO", 7 * DAY, None).unwrap();
    aao::join_aao(store, "u1", macro_id).unwrap();
    aao::join_aao(store, "u1", micro_id).unwrap();

    // One global counter across organizations, 0, 1, 2, …
    assert_eq!(
        aao::submit_proposal(store, "u1", macro_id, "First").unwrap(),
        0
    );
    assert_eq!(
        aao::submit_proposal(store, "u1", micro_id, "Micro AAO Proposal").unwrap(),
        1
    );
    assert_eq!(
        aao::submit_proposal(store, "u1", macro_id, "Third").unwrap(),
        2
    );

    let second = aao::get_proposal(store, 1).unwrap();
    assert_eq!(second.aao_id, micro_id);
    assert_eq!(second.text, "Micro AAO Proposal");
}

#[test]
fn test_failing_majority_rejects_proposal() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let id = aao::create_aao(store, "owner", "Contested AAO", DAY, None).unwrap();
    aao::join_aao(store, "u1", id).unwrap();
    aao::join_aao(store, "u2", id).unwrap();

    let pid = aao::submit_proposal(store, "u1", id, "Contested").unwrap();
    aao::vote(store, "u1", pid, true).unwrap();
    aao::vote(store, "u2", pid, false).unwrap();

    // 1-1 tie fails the simple majority: Active -> Rejected.
    let status = aao::execute_proposal(store, "u1", pid, QuorumRule::SimpleMajority).unwrap();
    assert_eq!(status, ProposalStatus::Rejected);
    let proposal = aao::get_proposal(store, pid).unwrap();
    assert_eq!(proposal.status, ProposalStatus::Rejected);

    let err = aao::execute_proposal(store, "u1", pid, QuorumRule::SimpleMajority).unwrap_err();
    assert!(matches!(err, HydraError::ValidationError(_)));
}

#[test]
fn test_permissive_quorum_executes_without_votes() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    let id = aao::create_aao(store, "owner", "Permissive AAO", DAY, None).unwrap();
    let pid = aao::submit_proposal(store, "owner", id, "Unvoted").unwrap();

    let status = aao::execute_proposal(store, "owner", pid, QuorumRule::Permissive).unwrap();
    assert_eq!(status, ProposalStatus::Executed);
}

#[test]
fn test_governance_through_dispatcher() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());

    let result = rt
        .dispatch(
            "owner",
            "createAAO",
            &serde_json::json!({ "topic": "Dispatched AAO", "duration": DAY }),
        )
        .unwrap();
    assert_eq!(result["aao_id"], 0);

    rt.dispatch("u1", "joinAAO", &serde_json::json!({ "aao_id": 0 }))
        .unwrap();
    let result = rt
        .dispatch(
            "hydra",
            "isMember",
            &serde_json::json!({ "aao_id": 0, "address": "u1" }),
        )
        .unwrap();
    assert_eq!(result["is_member"], true);

    let result = rt
        .dispatch(
            "u1",
            "submitProposal",
            &serde_json::json!({ "aao_id": 0, "text": "Via dispatch" }),
        )
        .unwrap();
    assert_eq!(result["proposal_id"], 0);

    let result = rt
        .dispatch("hydra", "getAAO", &serde_json::json!({ "aao_id": 0 }))
        .unwrap();
    assert_eq!(result["topic"], "Dispatched AAO");
    assert_eq!(result["active"], true);
}

#[test]
fn test_mutations_emit_ledger_events() {
    let tmp = tempdir().unwrap();
    let rt = bootstrap(tmp.path());
    let store = rt.store();

    aao::create_aao(store, "owner", "Event Test AAO", DAY, None).unwrap();
    aao::join_aao(store, "u1", 0).unwrap();

    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy()).unwrap();
    let created: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM ledger_events WHERE event_type = 'AAOCreated'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(created, 1);

    let joined: String = conn
        .query_row(
            "SELECT payload FROM ledger_events WHERE event_type = 'AAOMemberJoined'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    let payload: serde_json::Value = serde_json::from_str(&joined).unwrap();
    assert_eq!(payload["member"], "u1");
}
