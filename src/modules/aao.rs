//! The AAO ledger: organizations, membership, admin roles, proposals,
//! votes, and bounty tasks.
//!
//! Every entity lives in tables this module owns inside the shared
//! ledger; entry points are reachable through the selector table or as
//! the typed functions below (the `Module` impl maps one onto the
//! other). All mutations run on one broker transaction and either
//! commit fully or leave no trace.
//!
//! ACCESS ROLES POLICY: the owner is implicitly privileged above admin
//! and can never be revoked or removed from membership. Admin roles may
//! be ASSIGNED by the owner or by any current admin; they may be
//! REVOKED only by the owner. Admin status and membership are
//! independent relations: assignment does not require the target to be
//! a member.

use crate::core::broker::DbBroker;
use crate::core::config::QuorumRule;
use crate::core::db;
use crate::core::error::HydraError;
use crate::core::store::Store;
use crate::core::time;
use crate::modules::{decode, CallContext, Module};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const MODULE_ADDRESS: &str = "aao/v1";

const NEXT_AAO_ID: &str = "next_aao_id";
const NEXT_PROPOSAL_ID: &str = "next_proposal_id";
const NEXT_TASK_ID: &str = "next_task_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aao {
    pub id: u64,
    pub topic: String,
    pub owner: String,
    pub duration: u64,
    pub created_at: String,
    pub active: bool,
    pub is_macro: bool,
    pub parent_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Active,
    Executed,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Active => "active",
            ProposalStatus::Executed => "executed",
            ProposalStatus::Rejected => "rejected",
        }
    }

    fn parse(s: &str) -> Result<Self, HydraError> {
        match s {
            "active" => Ok(ProposalStatus::Active),
            "executed" => Ok(ProposalStatus::Executed),
            "rejected" => Ok(ProposalStatus::Rejected),
            other => Err(HydraError::ValidationError(format!(
                "unknown proposal status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub aao_id: u64,
    pub proposer: String,
    pub text: String,
    pub for_votes: u64,
    pub against_votes: u64,
    pub status: ProposalStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Assigned,
    Completed,
    Verified,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Completed => "completed",
            TaskStatus::Verified => "verified",
        }
    }

    fn parse(s: &str) -> Result<Self, HydraError> {
        match s {
            "open" => Ok(TaskStatus::Open),
            "assigned" => Ok(TaskStatus::Assigned),
            "completed" => Ok(TaskStatus::Completed),
            "verified" => Ok(TaskStatus::Verified),
            other => Err(HydraError::ValidationError(format!(
                "unknown task status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub aao_id: u64,
    pub description: String,
    pub reward: u64,
    pub assignee: Option<String>,
    pub status: TaskStatus,
}

// --- Organization lifecycle ---

/// Create an organization. The creator becomes owner and an implicit
/// member. `parent_id` makes it a Micro AAO and must reference an
/// existing Macro AAO.
pub fn create_aao(
    store: &Store,
    caller: &str,
    topic: &str,
    duration: u64,
    parent_id: Option<u64>,
) -> Result<u64, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.create", |conn| {
        if let Some(pid) = parent_id {
            let parent = fetch_aao(conn, pid)?.ok_or(HydraError::ParentMacroAAODoesNotExist)?;
            if !parent.is_macro {
                return Err(HydraError::ParentAAOMustBeAMacroAAO);
            }
        }

        let id = db::next_counter(conn, NEXT_AAO_ID)?;
        let now = time::now_epoch_z();
        let is_macro = parent_id.is_none();
        conn.execute(
            "INSERT INTO aaos(id, topic, owner, duration, created_at, active, is_macro, parent_id)
             VALUES(?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
            params![
                id as i64,
                topic,
                caller,
                duration as i64,
                now,
                is_macro,
                parent_id.map(|p| p as i64)
            ],
        )?;
        // Owner membership is part of creation, not a separate join.
        conn.execute(
            "INSERT INTO aao_members(aao_id, address, joined_at) VALUES(?1, ?2, ?3)",
            params![id as i64, caller, now],
        )?;

        db::record_event(
            conn,
            "AAOCreated",
            Some(&id.to_string()),
            &serde_json::json!({
                "creator": caller,
                "topic": topic,
                "aao_id": id,
                "is_macro": is_macro,
            }),
            caller,
        )?;
        Ok(id)
    })
}

/// Change topic and duration. Owner-only; terminated organizations
/// accept no further mutation.
pub fn modify_aao(
    store: &Store,
    caller: &str,
    aao_id: u64,
    new_topic: &str,
    new_duration: u64,
) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.modify", |conn| {
        let aao = require_aao(conn, aao_id)?;
        if caller != aao.owner {
            return Err(HydraError::NotOwner);
        }
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        conn.execute(
            "UPDATE aaos SET topic = ?2, duration = ?3 WHERE id = ?1",
            params![aao_id as i64, new_topic, new_duration as i64],
        )?;
        db::record_event(
            conn,
            "AAOModified",
            Some(&aao_id.to_string()),
            &serde_json::json!({ "aao_id": aao_id, "topic": new_topic, "duration": new_duration }),
            caller,
        )?;
        Ok(())
    })
}

/// Flip the organization to its terminal state. A second call fails so
/// the terminal transition stays observable.
pub fn terminate_aao(store: &Store, caller: &str, aao_id: u64) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.terminate", |conn| {
        let aao = require_aao(conn, aao_id)?;
        if caller != aao.owner {
            return Err(HydraError::NotOwner);
        }
        if !aao.active {
            return Err(HydraError::AlreadyTerminated);
        }
        conn.execute(
            "UPDATE aaos SET active = 0 WHERE id = ?1",
            params![aao_id as i64],
        )?;
        db::record_event(
            conn,
            "AAOTerminated",
            Some(&aao_id.to_string()),
            &serde_json::json!({ "aao_id": aao_id }),
            caller,
        )?;
        Ok(())
    })
}

// --- Membership ---

pub fn join_aao(store: &Store, caller: &str, aao_id: u64) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.join", |conn| {
        let aao = require_aao(conn, aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if member_exists(conn, aao_id, caller)? {
            return Err(HydraError::AlreadyMember);
        }
        conn.execute(
            "INSERT INTO aao_members(aao_id, address, joined_at) VALUES(?1, ?2, ?3)",
            params![aao_id as i64, caller, time::now_epoch_z()],
        )?;
        db::record_event(
            conn,
            "AAOMemberJoined",
            Some(&aao_id.to_string()),
            &serde_json::json!({ "aao_id": aao_id, "member": caller }),
            caller,
        )?;
        Ok(())
    })
}

pub fn leave_aao(store: &Store, caller: &str, aao_id: u64) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.leave", |conn| {
        let aao = require_aao(conn, aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if caller == aao.owner {
            return Err(HydraError::ValidationError(
                "Owner cannot leave the AAO".to_string(),
            ));
        }
        if !member_exists(conn, aao_id, caller)? {
            return Err(HydraError::NotMember);
        }
        conn.execute(
            "DELETE FROM aao_members WHERE aao_id = ?1 AND address = ?2",
            params![aao_id as i64, caller],
        )?;
        db::record_event(
            conn,
            "AAOMemberLeft",
            Some(&aao_id.to_string()),
            &serde_json::json!({ "aao_id": aao_id, "member": caller }),
            caller,
        )?;
        Ok(())
    })
}

// --- Admin roles ---

/// Grant an admin role. Owner or any current admin may assign; see the
/// module-level access policy.
pub fn assign_admin_role(
    store: &Store,
    caller: &str,
    aao_id: u64,
    address: &str,
) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.assign_admin", |conn| {
        let aao = require_aao(conn, aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if caller != aao.owner && !admin_exists(conn, aao_id, caller)? {
            return Err(HydraError::NotAdmin);
        }
        if admin_exists(conn, aao_id, address)? {
            return Err(HydraError::ValidationError(
                "Already an admin of this AAO".to_string(),
            ));
        }
        conn.execute(
            "INSERT INTO aao_admins(aao_id, address, assigned_at) VALUES(?1, ?2, ?3)",
            params![aao_id as i64, address, time::now_epoch_z()],
        )?;
        db::record_event(
            conn,
            "AAOAdminAssigned",
            Some(&aao_id.to_string()),
            &serde_json::json!({ "aao_id": aao_id, "admin": address }),
            caller,
        )?;
        Ok(())
    })
}

/// Revoke an admin role. Owner-only; the owner's own privileges are
/// implicit and not revocable.
pub fn revoke_admin_role(
    store: &Store,
    caller: &str,
    aao_id: u64,
    address: &str,
) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.revoke_admin", |conn| {
        let aao = require_aao(conn, aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if caller != aao.owner {
            return Err(HydraError::NotOwner);
        }
        if address == aao.owner {
            return Err(HydraError::ValidationError(
                "Owner privileges cannot be revoked".to_string(),
            ));
        }
        if !admin_exists(conn, aao_id, address)? {
            return Err(HydraError::ValidationError(
                "Not an admin of this AAO".to_string(),
            ));
        }
        conn.execute(
            "DELETE FROM aao_admins WHERE aao_id = ?1 AND address = ?2",
            params![aao_id as i64, address],
        )?;
        db::record_event(
            conn,
            "AAOAdminRevoked",
            Some(&aao_id.to_string()),
            &serde_json::json!({ "aao_id": aao_id, "admin": address }),
            caller,
        )?;
        Ok(())
    })
}

// --- Proposals & voting ---

/// Submit a proposal. Proposal ids are dense and global across all
/// organizations, in creation order.
pub fn submit_proposal(
    store: &Store,
    caller: &str,
    aao_id: u64,
    text: &str,
) -> Result<u64, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.submit_proposal", |conn| {
        let aao = require_aao(conn, aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if !member_exists(conn, aao_id, caller)? {
            return Err(HydraError::NotMember);
        }
        let id = db::next_counter(conn, NEXT_PROPOSAL_ID)?;
        conn.execute(
            "INSERT INTO proposals(id, aao_id, proposer, text, for_votes, against_votes, status, created_at)
             VALUES(?1, ?2, ?3, ?4, 0, 0, 'active', ?5)",
            params![id as i64, aao_id as i64, caller, text, time::now_epoch_z()],
        )?;
        db::record_event(
            conn,
            "ProposalSubmitted",
            Some(&id.to_string()),
            &serde_json::json!({ "proposal_id": id, "aao_id": aao_id, "proposer": caller }),
            caller,
        )?;
        Ok(id)
    })
}

/// Cast a vote. One vote per (proposal, voter); members of the
/// proposal's organization only.
pub fn vote(
    store: &Store,
    caller: &str,
    proposal_id: u64,
    support: bool,
) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.vote", |conn| {
        let proposal = require_proposal(conn, proposal_id)?;
        let aao = require_aao(conn, proposal.aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if proposal.status != ProposalStatus::Active {
            return Err(HydraError::ValidationError(
                "Proposal is not active".to_string(),
            ));
        }
        if !member_exists(conn, proposal.aao_id, caller)? {
            return Err(HydraError::NotMember);
        }
        let already: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM votes WHERE proposal_id = ?1 AND voter = ?2",
                params![proposal_id as i64, caller],
                |row| row.get(0),
            )
            .optional()?;
        if already.is_some() {
            return Err(HydraError::AlreadyVoted);
        }
        conn.execute(
            "INSERT INTO votes(proposal_id, voter, support, cast_at) VALUES(?1, ?2, ?3, ?4)",
            params![proposal_id as i64, caller, support, time::now_epoch_z()],
        )?;
        let column = if support { "for_votes" } else { "against_votes" };
        conn.execute(
            &format!("UPDATE proposals SET {} = {} + 1 WHERE id = ?1", column, column),
            params![proposal_id as i64],
        )?;
        db::record_event(
            conn,
            "VoteCast",
            Some(&proposal_id.to_string()),
            &serde_json::json!({ "proposal_id": proposal_id, "voter": caller, "support": support }),
            caller,
        )?;
        Ok(())
    })
}

/// Close out an Active proposal under the configured threshold policy.
///
/// Under `SimpleMajority` a tally with for_votes > against_votes
/// executes; anything else rejects. Under `Permissive` any call
/// executes. Both outcomes are terminal and emit their own record; the
/// returned status tells the caller which one happened.
pub fn execute_proposal(
    store: &Store,
    caller: &str,
    proposal_id: u64,
    quorum: QuorumRule,
) -> Result<ProposalStatus, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.execute_proposal", |conn| {
        let proposal = require_proposal(conn, proposal_id)?;
        let aao = require_aao(conn, proposal.aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if proposal.status != ProposalStatus::Active {
            return Err(HydraError::ValidationError(
                "Proposal is not active".to_string(),
            ));
        }
        if !member_exists(conn, proposal.aao_id, caller)? {
            return Err(HydraError::NotMember);
        }

        let outcome = match quorum {
            QuorumRule::Permissive => ProposalStatus::Executed,
            QuorumRule::SimpleMajority => {
                if proposal.for_votes > proposal.against_votes {
                    ProposalStatus::Executed
                } else {
                    ProposalStatus::Rejected
                }
            }
        };
        conn.execute(
            "UPDATE proposals SET status = ?2 WHERE id = ?1",
            params![proposal_id as i64, outcome.as_str()],
        )?;
        let event_type = match outcome {
            ProposalStatus::Executed => "ProposalExecuted",
            _ => "ProposalRejected",
        };
        db::record_event(
            conn,
            event_type,
            Some(&proposal_id.to_string()),
            &serde_json::json!({ "proposal_id": proposal_id }),
            caller,
        )?;
        Ok(outcome)
    })
}

// --- Tasks / bounties ---

/// Post a reward-bearing task. Owner/admin only.
pub fn create_bounty(
    store: &Store,
    caller: &str,
    aao_id: u64,
    description: &str,
    reward: u64,
) -> Result<u64, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.create_bounty", |conn| {
        let aao = require_aao(conn, aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if caller != aao.owner && !admin_exists(conn, aao_id, caller)? {
            return Err(HydraError::NotAdmin);
        }
        let id = db::next_counter(conn, NEXT_TASK_ID)?;
        let now = time::now_epoch_z();
        conn.execute(
            "INSERT INTO tasks(id, aao_id, description, reward, assignee, status, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, NULL, 'open', ?5, ?5)",
            params![id as i64, aao_id as i64, description, reward as i64, now],
        )?;
        db::record_event(
            conn,
            "BountyCreated",
            Some(&id.to_string()),
            &serde_json::json!({ "task_id": id, "aao_id": aao_id, "reward": reward }),
            caller,
        )?;
        Ok(id)
    })
}

/// Member self-service claim of an Open task.
pub fn assign_task(store: &Store, caller: &str, task_id: u64) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.assign_task", |conn| {
        let task = require_task(conn, task_id)?;
        let aao = require_aao(conn, task.aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if task.status != TaskStatus::Open {
            return Err(HydraError::ValidationError("Task is not open".to_string()));
        }
        if !member_exists(conn, task.aao_id, caller)? {
            return Err(HydraError::NotMember);
        }
        set_task_state(conn, task_id, TaskStatus::Assigned, Some(caller))?;
        db::record_event(
            conn,
            "TaskAssigned",
            Some(&task_id.to_string()),
            &serde_json::json!({ "task_id": task_id, "assignee": caller }),
            caller,
        )?;
        Ok(())
    })
}

/// Assignee marks their Assigned task done.
pub fn complete_task(store: &Store, caller: &str, task_id: u64) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.complete_task", |conn| {
        let task = require_task(conn, task_id)?;
        let aao = require_aao(conn, task.aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if task.status != TaskStatus::Assigned {
            return Err(HydraError::ValidationError(
                "Task is not assigned".to_string(),
            ));
        }
        if task.assignee.as_deref() != Some(caller) {
            return Err(HydraError::ValidationError(
                "Only the assignee can complete this task".to_string(),
            ));
        }
        set_task_state(conn, task_id, TaskStatus::Completed, task.assignee.as_deref())?;
        db::record_event(
            conn,
            "TaskCompleted",
            Some(&task_id.to_string()),
            &serde_json::json!({ "task_id": task_id }),
            caller,
        )?;
        Ok(())
    })
}

/// Owner/admin reviews a Completed task. Approval verifies it;
/// rejection returns it to Assigned so the assignee can rework.
pub fn verify_task(
    store: &Store,
    caller: &str,
    task_id: u64,
    approved: bool,
) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "aao.verify_task", |conn| {
        let task = require_task(conn, task_id)?;
        let aao = require_aao(conn, task.aao_id)?;
        if !aao.active {
            return Err(HydraError::OrganizationInactive);
        }
        if task.status != TaskStatus::Completed {
            return Err(HydraError::ValidationError(
                "Task is not completed".to_string(),
            ));
        }
        if caller != aao.owner && !admin_exists(conn, task.aao_id, caller)? {
            return Err(HydraError::NotAdmin);
        }
        let next = if approved {
            TaskStatus::Verified
        } else {
            TaskStatus::Assigned
        };
        set_task_state(conn, task_id, next, task.assignee.as_deref())?;
        db::record_event(
            conn,
            "TaskVerified",
            Some(&task_id.to_string()),
            &serde_json::json!({ "task_id": task_id, "approved": approved }),
            caller,
        )?;
        Ok(())
    })
}

// --- Queries ---

pub fn get_aao(store: &Store, aao_id: u64) -> Result<Aao, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "aao.get", |conn| require_aao(conn, aao_id))
}

pub fn is_member(store: &Store, aao_id: u64, address: &str) -> Result<bool, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "aao.is_member", |conn| {
        member_exists(conn, aao_id, address)
    })
}

pub fn is_admin(store: &Store, aao_id: u64, address: &str) -> Result<bool, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "aao.is_admin", |conn| {
        admin_exists(conn, aao_id, address)
    })
}

pub fn get_members_count(store: &Store, aao_id: u64) -> Result<u64, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "aao.members_count", |conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM aao_members WHERE aao_id = ?1",
            params![aao_id as i64],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    })
}

pub fn get_proposal(store: &Store, proposal_id: u64) -> Result<Proposal, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "aao.get_proposal", |conn| {
        require_proposal(conn, proposal_id)
    })
}

pub fn get_task(store: &Store, task_id: u64) -> Result<Task, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "aao.get_task", |conn| {
        require_task(conn, task_id)
    })
}

pub fn get_aaos_by_creator(store: &Store, address: &str) -> Result<Vec<u64>, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "aao.by_creator", |conn| {
        let mut stmt = conn.prepare("SELECT id FROM aaos WHERE owner = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![address], |row| row.get::<_, i64>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r? as u64);
        }
        Ok(out)
    })
}

pub fn get_aaos_by_member(store: &Store, address: &str) -> Result<Vec<u64>, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "aao.by_member", |conn| {
        let mut stmt =
            conn.prepare("SELECT aao_id FROM aao_members WHERE address = ?1 ORDER BY aao_id")?;
        let rows = stmt.query_map(params![address], |row| row.get::<_, i64>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r? as u64);
        }
        Ok(out)
    })
}

pub fn get_total_aao_count(store: &Store) -> Result<u64, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "aao.total_count", |conn| {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM aaos", [], |row| row.get(0))?;
        Ok(count as u64)
    })
}

/// Parent Macro id of a Micro AAO. Errors for unknown ids and for
/// organizations that have no parent.
pub fn get_macro_aao_id(store: &Store, micro_id: u64) -> Result<u64, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "aao.macro_of", |conn| {
        let aao = require_aao(conn, micro_id)?;
        aao.parent_id
            .ok_or_else(|| HydraError::NotFound(format!("AAO {} is not a Micro AAO", micro_id)))
    })
}

// --- Row helpers ---

fn fetch_aao(conn: &Connection, aao_id: u64) -> Result<Option<Aao>, HydraError> {
    Ok(conn
        .query_row(
            "SELECT id, topic, owner, duration, created_at, active, is_macro, parent_id
             FROM aaos WHERE id = ?1",
            params![aao_id as i64],
            |row| {
                Ok(Aao {
                    id: row.get::<_, i64>(0)? as u64,
                    topic: row.get(1)?,
                    owner: row.get(2)?,
                    duration: row.get::<_, i64>(3)? as u64,
                    created_at: row.get(4)?,
                    active: row.get(5)?,
                    is_macro: row.get(6)?,
                    parent_id: row.get::<_, Option<i64>>(7)?.map(|p| p as u64),
                })
            },
        )
        .optional()?)
}

fn require_aao(conn: &Connection, aao_id: u64) -> Result<Aao, HydraError> {
    fetch_aao(conn, aao_id)?.ok_or_else(|| HydraError::NotFound(format!("AAO {} not found", aao_id)))
}

fn require_proposal(conn: &Connection, proposal_id: u64) -> Result<Proposal, HydraError> {
    let row = conn
        .query_row(
            "SELECT id, aao_id, proposer, text, for_votes, against_votes, status
             FROM proposals WHERE id = ?1",
            params![proposal_id as i64],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;
    let (id, aao_id, proposer, text, for_votes, against_votes, status) = row
        .ok_or_else(|| HydraError::NotFound(format!("Proposal {} not found", proposal_id)))?;
    Ok(Proposal {
        id: id as u64,
        aao_id: aao_id as u64,
        proposer,
        text,
        for_votes: for_votes as u64,
        against_votes: against_votes as u64,
        status: ProposalStatus::parse(&status)?,
    })
}

fn require_task(conn: &Connection, task_id: u64) -> Result<Task, HydraError> {
    let row = conn
        .query_row(
            "SELECT id, aao_id, description, reward, assignee, status FROM tasks WHERE id = ?1",
            params![task_id as i64],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;
    let (id, aao_id, description, reward, assignee, status) =
        row.ok_or_else(|| HydraError::NotFound(format!("Task {} not found", task_id)))?;
    Ok(Task {
        id: id as u64,
        aao_id: aao_id as u64,
        description,
        reward: reward as u64,
        assignee,
        status: TaskStatus::parse(&status)?,
    })
}

fn member_exists(conn: &Connection, aao_id: u64, address: &str) -> Result<bool, HydraError> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM aao_members WHERE aao_id = ?1 AND address = ?2",
            params![aao_id as i64, address],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

fn admin_exists(conn: &Connection, aao_id: u64, address: &str) -> Result<bool, HydraError> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM aao_admins WHERE aao_id = ?1 AND address = ?2",
            params![aao_id as i64, address],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

fn set_task_state(
    conn: &Connection,
    task_id: u64,
    status: TaskStatus,
    assignee: Option<&str>,
) -> Result<(), HydraError> {
    conn.execute(
        "UPDATE tasks SET status = ?2, assignee = ?3, updated_at = ?4 WHERE id = ?1",
        params![
            task_id as i64,
            status.as_str(),
            assignee,
            time::now_epoch_z()
        ],
    )?;
    Ok(())
}

// --- Dispatch surface ---

pub struct AaoModule {
    quorum: QuorumRule,
}

impl AaoModule {
    pub fn new(quorum: QuorumRule) -> Self {
        Self { quorum }
    }
}

const OPERATIONS: &[&str] = &[
    "createAAO",
    "modifyAAO",
    "terminateAAO",
    "joinAAO",
    "leaveAAO",
    "assignAdminRole",
    "revokeAdminRole",
    "submitProposal",
    "vote",
    "executeProposal",
    "createBounty",
    "assignTask",
    "completeTask",
    "verifyTask",
    "getAAO",
    "isMember",
    "isAdmin",
    "getMembersCount",
    "getProposal",
    "getTask",
    "getAAOsByCreator",
    "getAAOsByMember",
    "getTotalAAOCount",
    "getMacroAAOId",
];

#[derive(Deserialize)]
struct CreateAaoParams {
    topic: String,
    duration: u64,
    #[serde(default)]
    parent_id: Option<u64>,
}

#[derive(Deserialize)]
struct ModifyAaoParams {
    aao_id: u64,
    topic: String,
    duration: u64,
}

#[derive(Deserialize)]
struct AaoIdParams {
    aao_id: u64,
}

#[derive(Deserialize)]
struct AdminRoleParams {
    aao_id: u64,
    address: String,
}

#[derive(Deserialize)]
struct SubmitProposalParams {
    aao_id: u64,
    text: String,
}

#[derive(Deserialize)]
struct VoteParams {
    proposal_id: u64,
    support: bool,
}

#[derive(Deserialize)]
struct ProposalIdParams {
    proposal_id: u64,
}

#[derive(Deserialize)]
struct CreateBountyParams {
    aao_id: u64,
    description: String,
    reward: u64,
}

#[derive(Deserialize)]
struct TaskIdParams {
    task_id: u64,
}

#[derive(Deserialize)]
struct VerifyTaskParams {
    task_id: u64,
    approved: bool,
}

#[derive(Deserialize)]
struct AddressParams {
    address: String,
}

impl Module for AaoModule {
    fn address(&self) -> &'static str {
        MODULE_ADDRESS
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    fn call(
        &self,
        store: &Store,
        ctx: &CallContext,
        operation: &str,
        payload: &JsonValue,
    ) -> Result<JsonValue, HydraError> {
        let caller = ctx.caller.as_str();
        match operation {
            "createAAO" => {
                let p: CreateAaoParams = decode(payload)?;
                let id = create_aao(store, caller, &p.topic, p.duration, p.parent_id)?;
                Ok(serde_json::json!({ "aao_id": id }))
            }
            "modifyAAO" => {
                let p: ModifyAaoParams = decode(payload)?;
                modify_aao(store, caller, p.aao_id, &p.topic, p.duration)?;
                Ok(serde_json::json!({ "aao_id": p.aao_id }))
            }
            "terminateAAO" => {
                let p: AaoIdParams = decode(payload)?;
                terminate_aao(store, caller, p.aao_id)?;
                Ok(serde_json::json!({ "aao_id": p.aao_id }))
            }
            "joinAAO" => {
                let p: AaoIdParams = decode(payload)?;
                join_aao(store, caller, p.aao_id)?;
                Ok(serde_json::json!({ "aao_id": p.aao_id, "member": caller }))
            }
            "leaveAAO" => {
                let p: AaoIdParams = decode(payload)?;
                leave_aao(store, caller, p.aao_id)?;
                Ok(serde_json::json!({ "aao_id": p.aao_id, "member": caller }))
            }
            "assignAdminRole" => {
                let p: AdminRoleParams = decode(payload)?;
                assign_admin_role(store, caller, p.aao_id, &p.address)?;
                Ok(serde_json::json!({ "aao_id": p.aao_id, "admin": p.address }))
            }
            "revokeAdminRole" => {
                let p: AdminRoleParams = decode(payload)?;
                revoke_admin_role(store, caller, p.aao_id, &p.address)?;
                Ok(serde_json::json!({ "aao_id": p.aao_id, "admin": p.address }))
            }
            "submitProposal" => {
                let p: SubmitProposalParams = decode(payload)?;
                let id = submit_proposal(store, caller, p.aao_id, &p.text)?;
                Ok(serde_json::json!({ "proposal_id": id }))
            }
            "vote" => {
                let p: VoteParams = decode(payload)?;
                vote(store, caller, p.proposal_id, p.support)?;
                Ok(serde_json::json!({ "proposal_id": p.proposal_id, "support": p.support }))
            }
            "executeProposal" => {
                let p: ProposalIdParams = decode(payload)?;
                let status = execute_proposal(store, caller, p.proposal_id, self.quorum)?;
                Ok(serde_json::json!({ "proposal_id": p.proposal_id, "status": status }))
            }
            "createBounty" => {
                let p: CreateBountyParams = decode(payload)?;
                let id = create_bounty(store, caller, p.aao_id, &p.description, p.reward)?;
                Ok(serde_json::json!({ "task_id": id }))
            }
            "assignTask" => {
                let p: TaskIdParams = decode(payload)?;
                assign_task(store, caller, p.task_id)?;
                Ok(serde_json::json!({ "task_id": p.task_id, "assignee": caller }))
            }
            "completeTask" => {
                let p: TaskIdParams = decode(payload)?;
                complete_task(store, caller, p.task_id)?;
                Ok(serde_json::json!({ "task_id": p.task_id }))
            }
            "verifyTask" => {
                let p: VerifyTaskParams = decode(payload)?;
                verify_task(store, caller, p.task_id, p.approved)?;
                Ok(serde_json::json!({ "task_id": p.task_id, "approved": p.approved }))
            }
            "getAAO" => {
                let p: AaoIdParams = decode(payload)?;
                let aao = get_aao(store, p.aao_id)?;
                Ok(serde_json::to_value(aao).unwrap_or_default())
            }
            "isMember" => {
                let p: AdminRoleParams = decode(payload)?;
                Ok(serde_json::json!({ "is_member": is_member(store, p.aao_id, &p.address)? }))
            }
            "isAdmin" => {
                let p: AdminRoleParams = decode(payload)?;
                Ok(serde_json::json!({ "is_admin": is_admin(store, p.aao_id, &p.address)? }))
            }
            "getMembersCount" => {
                let p: AaoIdParams = decode(payload)?;
                Ok(serde_json::json!({ "count": get_members_count(store, p.aao_id)? }))
            }
            "getProposal" => {
                let p: ProposalIdParams = decode(payload)?;
                let proposal = get_proposal(store, p.proposal_id)?;
                Ok(serde_json::to_value(proposal).unwrap_or_default())
            }
            "getTask" => {
                let p: TaskIdParams = decode(payload)?;
                let task = get_task(store, p.task_id)?;
                Ok(serde_json::to_value(task).unwrap_or_default())
            }
            "getAAOsByCreator" => {
                let p: AddressParams = decode(payload)?;
                Ok(serde_json::json!({ "aao_ids": get_aaos_by_creator(store, &p.address)? }))
            }
            "getAAOsByMember" => {
                let p: AddressParams = decode(payload)?;
                Ok(serde_json::json!({ "aao_ids": get_aaos_by_member(store, &p.address)? }))
            }
            "getTotalAAOCount" => {
                Ok(serde_json::json!({ "count": get_total_aao_count(store)? }))
            }
            "getMacroAAOId" => {
                let p: AaoIdParams = decode(payload)?;
                Ok(serde_json::json!({ "macro_id": get_macro_aao_id(store, p.aao_id)? }))
            }
            other => Err(HydraError::FunctionNotFound(other.to_string())),
        }
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "aao",
        "version": "0.1.0",
        "description": "Organization ledger: lifecycle, membership, proposals, bounties",
        "storage": ["ledger.db"]
    })
}
