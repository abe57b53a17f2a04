//! Tests for the command ledger.

use super::*;
use crate::ChannelId;

fn invocation(command: &str, username: &str) -> CommandInvocation {
    CommandInvocation {
        command_name: command.to_string(),
        username: Username::new(username).unwrap(),
        user_id: Some("u1".to_string()),
        channel_id: ChannelId::new("c1").ok(),
    }
}

#[test]
fn test_new_ledger_is_empty() {
    let ledger = CommandLedger::new();
    assert!(ledger.is_empty());
    assert_eq!(ledger.len(), 0);
}

#[test]
fn test_record_and_fetch_round_trip() {
    let ledger = CommandLedger::new();
    let alice = Username::new("alice").unwrap();

    ledger.record(invocation("buy", "alice"));

    let entry = ledger.last_for(&alice).unwrap();
    assert_eq!(entry.command_name, "buy");
    assert_eq!(entry.username, alice);
}

#[test]
fn test_last_write_wins_per_username() {
    let ledger = CommandLedger::new();
    let alice = Username::new("alice").unwrap();

    ledger.record(invocation("buy", "alice"));
    ledger.record(invocation("menu", "alice"));

    let entry = ledger.last_for(&alice).unwrap();
    assert_eq!(entry.command_name, "menu");
    assert_eq!(ledger.len(), 1);
}

#[test]
fn test_entries_are_keyed_by_username() {
    let ledger = CommandLedger::new();

    ledger.record(invocation("buy", "alice"));
    ledger.record(invocation("menu", "bob"));

    assert_eq!(ledger.len(), 2);
    let bob = Username::new("bob").unwrap();
    assert_eq!(ledger.last_for(&bob).unwrap().command_name, "menu");
}

#[test]
fn test_unknown_username_has_no_entry() {
    let ledger = CommandLedger::new();
    ledger.record(invocation("buy", "alice"));

    let carol = Username::new("carol").unwrap();
    assert!(ledger.last_for(&carol).is_none());
}
