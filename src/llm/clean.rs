//! History cleaning: enforce message-history invariants on a raw message
//! list before the iteration loop trusts it.
//!
//! Grounded in the iteration loop's `clean(initial_messages)` entry step:
//! drop any `assistant` with `tool_calls` that never got matching `tool`
//! responses, drop orphan `tool` messages, and drop `assistant` messages
//! that precede an unresolved-tool-calls assistant without intervening
//! resolution. Idempotent: running `clean` twice yields the same result as
//! running it once.

use super::{Message, Role};
use std::collections::HashSet;

/// Enforce history invariants on `messages`, dropping whatever violates them.
///
/// At most one `system` message, and it must be first if present. Every
/// `tool` message's `tool_call_id` matches an id in the immediately-
/// preceding tool-bearing assistant turn, and every id in that turn has a
/// matching `tool` response before the next non-tool message. No `user`
/// message appears while a prior assistant's tool_calls are still
/// unresolved.
pub fn clean(messages: Vec<Message>) -> Vec<Message> {
    let messages = drop_extra_system_messages(messages);
    let messages = drop_orphan_tool_messages(messages);
    drop_unresolved_tool_turns(messages)
}

fn drop_extra_system_messages(messages: Vec<Message>) -> Vec<Message> {
    let mut seen_system = false;
    let mut out = Vec::with_capacity(messages.len());
    for (idx, msg) in messages.into_iter().enumerate() {
        if matches!(msg.role, Role::System) {
            if seen_system || idx != 0 {
                continue;
            }
            seen_system = true;
        }
        out.push(msg);
    }
    out
}

/// Remove `tool` messages whose `tool_call_id` does not belong to the set of
/// ids requested by the nearest preceding tool-bearing assistant message.
fn drop_orphan_tool_messages(messages: Vec<Message>) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    let mut pending_ids: HashSet<String> = HashSet::new();

    for msg in messages {
        match msg.role {
            Role::Assistant => {
                pending_ids.clear();
                if let Some(calls) = &msg.tool_calls {
                    for call in calls {
                        pending_ids.insert(call.id.clone());
                    }
                }
                out.push(msg);
            }
            Role::Tool => {
                let belongs = msg
                    .tool_call_id
                    .as_ref()
                    .is_some_and(|id| pending_ids.contains(id));
                if belongs {
                    if let Some(id) = &msg.tool_call_id {
                        pending_ids.remove(id);
                    }
                    out.push(msg);
                }
                // orphan tool message: dropped
            }
            Role::User | Role::System => {
                pending_ids.clear();
                out.push(msg);
            }
        }
    }
    out
}

/// Drop any tool-bearing assistant turn that never receives responses for
/// all of its tool_calls, together with whatever partial tool responses it
/// did accumulate (since those are now orphans too).
fn drop_unresolved_tool_turns(messages: Vec<Message>) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    let mut i = 0;
    while i < messages.len() {
        let msg = &messages[i];
        if matches!(msg.role, Role::Assistant) && msg.tool_calls.as_ref().is_some_and(|c| !c.is_empty()) {
            let required: HashSet<String> = msg
                .tool_calls
                .as_ref()
                .unwrap()
                .iter()
                .map(|c| c.id.clone())
                .collect();
            let mut satisfied: HashSet<String> = HashSet::new();
            let mut j = i + 1;
            while j < messages.len() && matches!(messages[j].role, Role::Tool) {
                if let Some(id) = &messages[j].tool_call_id {
                    satisfied.insert(id.clone());
                }
                j += 1;
            }
            if satisfied.is_superset(&required) {
                out.extend(messages[i..j].iter().cloned());
            }
            // else: whole turn (assistant + its partial tool responses) dropped
            i = j;
        } else {
            out.push(messages[i].clone());
            i += 1;
        }
    }
    out
}

/// True if `messages` already honors the history invariants above (used by
/// tests and by the pruner's post-removal revalidation step).
pub fn is_valid(messages: &[Message]) -> bool {
    let mut seen_system = false;
    let mut pending: HashSet<String> = HashSet::new();
    for (idx, msg) in messages.iter().enumerate() {
        match msg.role {
            Role::System => {
                if seen_system || idx != 0 {
                    return false;
                }
                seen_system = true;
            }
            Role::User => {
                if !pending.is_empty() {
                    return false;
                }
            }
            Role::Assistant => {
                if let Some(calls) = &msg.tool_calls {
                    if !pending.is_empty() {
                        return false;
                    }
                    pending = calls.iter().map(|c| c.id.clone()).collect();
                } else if !pending.is_empty() {
                    return false;
                }
            }
            Role::Tool => {
                let Some(id) = &msg.tool_call_id else {
                    return false;
                };
                if !pending.remove(id) {
                    return false;
                }
            }
        }
    }
    pending.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;
    use serde_json::json;

    fn tc(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "list_processors".to_string(),
            arguments: json!({}),
        }
    }

    #[test]
    fn drops_extra_system_messages() {
        let messages = vec![
            Message::system("first"),
            Message::user("hi"),
            Message::system("second"),
        ];
        let cleaned = clean(messages);
        assert_eq!(cleaned.iter().filter(|m| matches!(m.role, Role::System)).count(), 1);
        assert!(is_valid(&cleaned));
    }

    #[test]
    fn drops_orphan_tool_message() {
        let messages = vec![
            Message::user("hi"),
            Message::tool_result("nonexistent", "{}"),
        ];
        let cleaned = clean(messages);
        assert_eq!(cleaned.len(), 1);
        assert!(is_valid(&cleaned));
    }

    #[test]
    fn drops_unresolved_tool_turn() {
        let messages = vec![
            Message::user("hi"),
            Message::assistant_tool_calls("", vec![tc("t1"), tc("t2")]),
            Message::tool_result("t1", "{}"),
            // t2 never resolved
        ];
        let cleaned = clean(messages);
        assert_eq!(cleaned.len(), 1);
        assert!(is_valid(&cleaned));
    }

    #[test]
    fn keeps_fully_resolved_turn() {
        let messages = vec![
            Message::system("sys"),
            Message::user("hi"),
            Message::assistant_tool_calls("", vec![tc("t1"), tc("t2")]),
            Message::tool_result("t1", "{}"),
            Message::tool_result("t2", "{}"),
            Message::assistant("done"),
        ];
        let cleaned = clean(messages.clone());
        assert_eq!(cleaned.len(), messages.len());
        assert!(is_valid(&cleaned));
    }

    #[test]
    fn is_idempotent() {
        let messages = vec![
            Message::user("hi"),
            Message::assistant_tool_calls("", vec![tc("t1")]),
            Message::tool_result("wrong-id", "{}"),
            Message::assistant("done"),
        ];
        let once = clean(messages);
        let twice = clean(once.clone());
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.content, b.content);
            assert_eq!(a.role, b.role);
        }
    }
}
