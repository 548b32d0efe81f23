// bifrost-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Runechain Store Integration Tests
// Description: Exercises the crate's public API end-to-end: durability
//              across reopen, chain verification, and receipt export.
// ============================================================================

#![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
#![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]

use std::collections::BTreeMap;

use bifrost_core::identifiers::SessionId;
use bifrost_core::interfaces::RunechainStore;
use bifrost_core::model::ToolCallContext;
use bifrost_core::model::WardDecision;
use bifrost_core::model::WardEvaluation;
use bifrost_store_sqlite::SqliteRunechainStore;
use bifrost_store_sqlite::SqliteStoreConfig;

fn ctx(tool: &str, session: &str) -> ToolCallContext {
    ToolCallContext {
        tool_name: tool.to_string(),
        arguments: BTreeMap::new(),
        session_id: SessionId::new(session),
        agent_id: None,
        server_id: None,
    }
}

fn pass_eval() -> WardEvaluation {
    WardEvaluation {
        decision: WardDecision::Pass,
        matched_wards: Vec::new(),
        ward_chain: Vec::new(),
        rationale: "no wards matched".to_string(),
        reshaped_arguments: None,
        evaluation_duration_ms: 0,
    }
}

#[test]
fn chain_survives_process_restart_and_still_verifies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("runechain.db");

    let public_key = {
        let store = SqliteRunechainStore::new(SqliteStoreConfig {
            path: path.clone(),
            busy_timeout_ms: 5_000,
            journal_mode: bifrost_store_sqlite::SqliteStoreMode::default(),
            sync_mode: bifrost_store_sqlite::SqliteSyncMode::default(),
        })
        .expect("open store");
        for index in 0..5 {
            store
                .inscribe(&ctx("read_file", "sess-a"), &pass_eval(), Some(format!("result-{index}")), Some(3), None)
                .expect("inscribe");
        }
        store.get_public_key().expect("signed")
    };

    let reopened = SqliteRunechainStore::new(SqliteStoreConfig {
        path,
        busy_timeout_ms: 5_000,
        journal_mode: bifrost_store_sqlite::SqliteStoreMode::default(),
        sync_mode: bifrost_store_sqlite::SqliteSyncMode::default(),
    })
    .expect("reopen store");

    assert_eq!(reopened.get_public_key(), Some(public_key));
    let result = reopened.verify_chain().expect("verify");
    assert!(result.valid);
    assert_eq!(result.total_runes, 5);
    assert_eq!(reopened.get_last_sequence().expect("last"), Some(5));

    let receipt = reopened.export_receipt(3).expect("export").expect("present");
    assert_eq!(receipt.rune.sequence, 3);
    assert_eq!(receipt.chain_position.chain_length, 5);
}

#[test]
fn recent_call_count_respects_the_window_and_tool_filter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("runechain.db");
    let store = SqliteRunechainStore::new(SqliteStoreConfig {
        path,
        busy_timeout_ms: 5_000,
        journal_mode: bifrost_store_sqlite::SqliteStoreMode::default(),
        sync_mode: bifrost_store_sqlite::SqliteSyncMode::default(),
    })
    .expect("open store");

    store.inscribe(&ctx("read_file", "sess-a"), &pass_eval(), None, None, None).expect("inscribe");
    store.inscribe(&ctx("write_file", "sess-a"), &pass_eval(), None, None, None).expect("inscribe");
    store.inscribe(&ctx("read_file", "sess-b"), &pass_eval(), None, None, None).expect("inscribe");

    let session_a = SessionId::new("sess-a");
    assert_eq!(store.get_recent_call_count(&session_a, "read_file", 60_000).expect("count"), 1);
    assert_eq!(store.get_recent_call_count(&session_a, "*", 60_000).expect("count"), 2);
}
