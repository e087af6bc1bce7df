//! Field conventions for workflow and agent entities.
//!
//! Workflows are edited as opaque [`Entity`] values; this module names the
//! fields the console touches directly and builds the change sets for edits
//! that depend on the current value (such as adding a tool).

use serde_json::Value;

use crate::{ChangeSet, Entity};

pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const TOOLS: &str = "tools";
pub const ENV: &str = "env";
pub const PARAMS: &str = "params";
pub const STEPS: &str = "steps";

/// Tool names attached to a workflow or agent, in stored order.
///
/// Non-string entries are skipped; a missing or non-array `tools` field yields an empty list.
pub fn tools(entity: &Entity) -> Vec<String> {
    entity
        .get(TOOLS)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Change set that appends `tool` to the entity's tools.
///
/// Returns `None` when the tool is already attached, so callers can skip the save entirely.
pub fn add_tool_change(entity: &Entity, tool: &str) -> Option<ChangeSet> {
    let existing = entity.get(TOOLS).and_then(Value::as_array).cloned().unwrap_or_default();
    if existing.iter().any(|item| item.as_str() == Some(tool)) {
        return None;
    }
    let mut updated = existing;
    updated.push(Value::String(tool.to_string()));
    Some(ChangeSet::new().set(TOOLS, Value::Array(updated)))
}

/// Change set that removes `tool`, or `None` when it is not attached.
pub fn remove_tool_change(entity: &Entity, tool: &str) -> Option<ChangeSet> {
    let existing = entity.get(TOOLS).and_then(Value::as_array)?;
    if !existing.iter().any(|item| item.as_str() == Some(tool)) {
        return None;
    }
    let remaining: Vec<Value> = existing.iter().filter(|item| item.as_str() != Some(tool)).cloned().collect();
    Some(ChangeSet::new().set(TOOLS, Value::Array(remaining)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workflow(value: Value) -> Entity {
        Entity::from_json(value).unwrap()
    }

    #[test]
    fn add_tool_appends_to_existing_tools() {
        let entity = workflow(json!({"id": "w1", "tools": ["search"]}));
        let change = add_tool_change(&entity, "files").expect("tool should be added");
        assert_eq!(change.get(TOOLS), Some(&json!(["search", "files"])));
    }

    #[test]
    fn add_tool_starts_a_list_when_missing() {
        let entity = workflow(json!({"id": "w1"}));
        let change = add_tool_change(&entity, "files").unwrap();
        assert_eq!(change.get(TOOLS), Some(&json!(["files"])));
    }

    #[test]
    fn add_tool_skips_duplicates() {
        let entity = workflow(json!({"id": "w1", "tools": ["files"]}));
        assert!(add_tool_change(&entity, "files").is_none());
    }

    #[test]
    fn remove_tool_only_when_present() {
        let entity = workflow(json!({"id": "w1", "tools": ["files", "search"]}));
        assert_eq!(remove_tool_change(&entity, "files").unwrap().get(TOOLS), Some(&json!(["search"])));
        assert!(remove_tool_change(&entity, "browser").is_none());
    }

    #[test]
    fn tools_ignores_non_string_entries() {
        let entity = workflow(json!({"id": "w1", "tools": ["files", 3, null]}));
        assert_eq!(tools(&entity), vec!["files".to_string()]);
    }
}
