//! Context pruner: drop the oldest complete turn groups until
//! the history fits `max_tokens`, preserving the history invariants and the
//! most recent turns.
//!
//! Grounded in the turn-group pruning strategy: a turn group starts at a
//! `user` message and runs up to (but not including) the next `user`
//! message, bundling any assistant/tool messages in between as a unit. Groups
//! are removed oldest-first, one at a time, recomputing tokens after each
//! removal and revalidating structure; a failed revalidation restores the
//! group and aborts with the list as it stood before that removal. The most
//! recent `K` turns are never touched, where `K = 1` once the starting
//! context exceeds twice the budget, else `K = 2`.

use super::clean;
use super::tokenizer::calculate_input_tokens;
use super::{Message, ProviderKind, Role, Tool};

/// `prune(messages, max_tokens, provider, model, tools) -> messages'`.
///
/// Returns the original list unchanged if it already fits, if there are no
/// removable groups, or if a revalidation failure forces an early abort.
pub fn prune(
    messages: Vec<Message>,
    max_tokens: u32,
    provider: ProviderKind,
    model: &str,
    tools: &[Tool],
) -> Vec<Message> {
    let initial_tokens = calculate_input_tokens(&messages, provider, model, tools);
    if initial_tokens <= max_tokens {
        return messages;
    }

    let keep_recent = if initial_tokens > max_tokens.saturating_mul(2) {
        1
    } else {
        2
    };

    let mut groups = split_into_groups(messages);
    let system_offset = if groups.first().is_some_and(|g| is_system_only_group(g)) {
        1
    } else {
        0
    };

    let removable_end = groups.len().saturating_sub(keep_recent);
    let removable_start = system_offset;

    while removable_start < removable_end && removable_start < groups.len() {
        let candidate: Vec<Message> = groups[..removable_start]
            .iter()
            .chain(groups[removable_start + 1..].iter())
            .flatten()
            .cloned()
            .collect();

        let tokens = calculate_input_tokens(&candidate, provider, model, tools);

        if !clean::is_valid(&candidate) {
            // Revalidation failed: stop pruning, keep what we had before this attempt.
            break;
        }

        let removed = groups.remove(removable_start);
        drop(removed);

        if tokens <= max_tokens {
            return groups.into_iter().flatten().collect();
        }
        // loop again from the same index (the next oldest group shifted into place)
    }

    groups.into_iter().flatten().collect()
}

fn is_system_only_group(group: &[Message]) -> bool {
    group.len() == 1 && matches!(group[0].role, Role::System)
}

/// Split a message list into turn groups: a leading lone `system` message
/// (if present) is its own group, then each `user` message starts a new
/// group that absorbs everything up to the next `user` message.
fn split_into_groups(messages: Vec<Message>) -> Vec<Vec<Message>> {
    let mut groups: Vec<Vec<Message>> = Vec::new();

    for msg in messages {
        let starts_new_group = matches!(msg.role, Role::User) || groups.is_empty();
        if starts_new_group && !(groups.is_empty() && matches!(msg.role, Role::System)) {
            groups.push(vec![msg]);
        } else if matches!(msg.role, Role::System) && groups.is_empty() {
            groups.push(vec![msg]);
        } else {
            groups.last_mut().unwrap().push(msg);
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    fn tc(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "list_processors".to_string(),
            arguments: serde_json::json!({}),
        }
    }

    fn six_turn_history() -> Vec<Message> {
        vec![
            Message::system("sys"),
            Message::user("turn 1"),
            Message::assistant("reply 1"),
            Message::user("turn 2"),
            Message::assistant("reply 2"),
            Message::user("turn 3"),
            Message::assistant_tool_calls("", vec![tc("t1"), tc("t2")]),
            Message::tool_result("t1", "{}"),
            Message::tool_result("t2", "{}"),
            Message::user("turn 4"),
            Message::assistant("reply 4"),
            Message::user("turn 5"),
            Message::assistant("reply 5"),
            Message::user("turn 6"),
            Message::assistant("reply 6"),
        ]
    }

    #[test]
    fn returns_unchanged_when_already_under_budget() {
        let messages = vec![Message::user("hi")];
        let pruned = prune(messages.clone(), 10_000, ProviderKind::OpenAi, "gpt-4o", &[]);
        assert_eq!(pruned.len(), messages.len());
    }

    #[test]
    fn drops_oldest_turns_and_keeps_grouped_tool_turn_intact() {
        let messages = six_turn_history();
        let budget = calculate_input_tokens(&messages, ProviderKind::OpenAi, "gpt-4o", &[]) / 3;
        let pruned = prune(messages, budget, ProviderKind::OpenAi, "gpt-4o", &[]);

        assert!(matches!(pruned[0].role, Role::System));
        assert!(clean::is_valid(&pruned));

        let tool_turn_present = pruned.iter().any(|m| m.content == "turn 3");
        if tool_turn_present {
            let assistant_idx = pruned
                .iter()
                .position(|m| m.tool_calls.as_ref().is_some_and(|c| c.len() == 2))
                .unwrap();
            assert!(matches!(pruned[assistant_idx + 1].role, Role::Tool));
            assert!(matches!(pruned[assistant_idx + 2].role, Role::Tool));
        }
    }

    #[test]
    fn never_drops_final_turn() {
        let messages = six_turn_history();
        let pruned = prune(messages, 1, ProviderKind::OpenAi, "gpt-4o", &[]);
        assert!(pruned.iter().any(|m| m.content == "turn 6"));
    }
}
