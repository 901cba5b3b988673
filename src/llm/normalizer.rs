//! Tool-schema normalizer: rewrite a canonical MCP tool
//! catalog into whatever JSON-Schema dialect a given provider accepts.
//!
//! Grounded in `get_formatted_tool_definitions` / `clean_gemini_schema` /
//! `_infer_property_type` / `_force_type_correction`: the common cleanups
//! (strip `additionalProperties`, coerce empty/non-object property values to
//! `{type:"string"}`, the `update_nifi_processor_config.update_data` special
//! case) run first and apply to every provider; Gemini then gets a second,
//! recursive pass that uppercases types, forces `OBJECT`/`ARRAY` based on
//! structural hints, fills in missing `items`, and corrects known-wrong
//! property types via a name-based lookup table.

use super::{ProviderKind, Tool};
use serde_json::{json, Value};

/// `normalize(canonical_tools, provider) -> provider_tool_list`.
///
/// Idempotent per provider: the output of normalizing an already-normalized
/// catalog equals the input.
pub fn normalize(tools: &[Tool], provider: ProviderKind) -> Vec<Value> {
    tools
        .iter()
        .filter_map(|tool| normalize_one(tool, provider))
        .collect()
}

fn normalize_one(tool: &Tool, provider: ProviderKind) -> Option<Value> {
    let mut parameters = common_cleanup(tool.parameters.clone(), &tool.name);

    if matches!(provider, ProviderKind::Gemini) {
        // A top-level tool schema is always an object by MCP convention, even
        // when it declares no properties; check this before the recursive
        // cleanup runs its generic scalar-node fallback (which would
        // otherwise stamp a bare `{}` schema as `{"type":"STRING"}`).
        let had_no_properties = !parameters.get("properties").is_some();
        parameters = clean_gemini_schema(parameters, None);
        if had_no_properties {
            parameters = json!({"type": "OBJECT", "properties": {}});
        }
    }

    match provider {
        ProviderKind::OpenAi | ProviderKind::Perplexity => Some(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": parameters,
            }
        })),
        ProviderKind::Anthropic => Some(json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": parameters,
        })),
        ProviderKind::Gemini => Some(json!({
            "name": tool.name,
            "description": tool.description,
            "parameters": parameters,
        })),
    }
}

/// Strip `additionalProperties` everywhere, replace non-object/empty
/// property schemas with `{type:"string"}`, and apply the one known
/// hard-coded repackaging (`update_nifi_processor_config.update_data`).
fn common_cleanup(mut schema: Value, tool_name: &str) -> Value {
    strip_additional_properties(&mut schema);
    normalize_empty_properties(&mut schema);

    if tool_name == "update_nifi_processor_config" {
        if let Some(props) = schema.get_mut("properties").and_then(|p| p.as_object_mut()) {
            props.insert(
                "update_data".to_string(),
                json!({
                    "anyOf": [
                        {"type": "object"},
                        {"type": "array", "items": {"type": "string"}}
                    ]
                }),
            );
        }
    }

    schema
}

fn strip_additional_properties(node: &mut Value) {
    match node {
        Value::Object(map) => {
            map.remove("additionalProperties");
            if let Some(props) = map.get_mut("properties").and_then(|p| p.as_object_mut()) {
                for (_, v) in props.iter_mut() {
                    strip_additional_properties(v);
                }
            }
            if let Some(items) = map.get_mut("items") {
                strip_additional_properties(items);
            }
        }
        _ => {}
    }
}

fn normalize_empty_properties(node: &mut Value) {
    if let Some(props) = node.get_mut("properties").and_then(|p| p.as_object_mut()) {
        for (_, v) in props.iter_mut() {
            let is_usable_object = v.is_object() && !v.as_object().unwrap().is_empty();
            if !is_usable_object {
                *v = json!({"type": "string"});
            } else {
                normalize_empty_properties(v);
            }
        }
    }
    if let Some(items) = node.get_mut("items") {
        if items.is_object() && !items.as_object().unwrap().is_empty() {
            normalize_empty_properties(items);
        }
    }
}

// ---------------------------------------------------------------------
// Gemini-specific recursive cleanup
// ---------------------------------------------------------------------

/// Batch-operation-like array property names whose missing `items` infer to
/// `{type: OBJECT}` rather than the scalar-list default.
const OBJECT_ITEM_ARRAY_NAMES: &[&str] = &[
    "operations",
    "objects",
    "updates",
    "processors",
    "ports",
    "connections",
    "controller_services",
    "nifi_objects",
];

/// Scalar-list array property names whose missing `items` infer to
/// `{type: STRING}`.
const STRING_ITEM_ARRAY_NAMES: &[&str] = &[
    "relationships",
    "auto_terminated_relationships",
    "property_names_to_delete",
];

/// Property names always forced to STRING regardless of any other signal
/// (enum-like, even when `enum` isn't explicit in the schema).
const ENUM_LIKE_FIELDS: &[&str] = &[
    "object_type",
    "search_scope",
    "target_type",
    "filter_object_type",
    "service_type",
    "processor_type",
];

/// Explicit per-field type corrections, applied ahead of the generic
/// keyword-pattern fallback.
fn specific_correction(prop_name_lower: &str) -> Option<&'static str> {
    Some(match prop_name_lower {
        "object_id" | "query" | "filter_process_group_id" | "process_group_id"
        | "processor_id" | "connection_id" | "target_id" | "source_id" | "service_id"
        | "port_id" | "controller_service_id" | "parent_process_group_id"
        | "starting_processor_id" | "url" | "name" | "bundle_artifact_filter"
        | "processor_name" | "service_name" | "question" => "STRING",

        "timeout_seconds" | "polling_timeout" => "NUMBER",
        "bulletin_limit" | "max_content_bytes" | "event_id" | "position_x" | "position_y"
        | "width" | "height" => "INTEGER",

        "include_bulletins" | "include_suggestions" | "recursive" | "enabled" | "disabled"
        | "active" | "required" | "optional" => "BOOLEAN",

        "properties" | "config" | "configuration" | "settings" | "options" | "parameters"
        | "headers" | "payload" => "OBJECT",

        "operations" | "objects" | "updates" | "processors" | "ports" | "connections"
        | "controller_services" | "nifi_objects" | "relationships"
        | "auto_terminated_relationships" | "property_names_to_delete" => "ARRAY",

        _ => return None,
    })
}

fn default_items_for(prop_name_lower: &str) -> Value {
    if OBJECT_ITEM_ARRAY_NAMES.contains(&prop_name_lower) {
        json!({"type": "OBJECT"})
    } else if STRING_ITEM_ARRAY_NAMES.contains(&prop_name_lower) {
        json!({"type": "STRING"})
    } else {
        json!({"type": "OBJECT"})
    }
}

/// Infer a type for a property that declared none at all.
fn infer_property_type(prop_name: &str, schema: &Value) -> &'static str {
    let name = prop_name.to_ascii_lowercase();
    let description = schema
        .get("description")
        .and_then(|d| d.as_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    const NUMERIC_NAME_HINTS: &[&str] = &[
        "timeout", "limit", "count", "size", "max", "min", "port", "seconds", "minutes",
        "hours", "days", "bytes", "kb", "mb", "gb", "id", "num", "number", "index", "position",
        "width", "height", "x", "y", "z",
    ];
    if NUMERIC_NAME_HINTS.iter().any(|k| name.contains(k)) {
        if ["integer", "whole", "count"].iter().any(|k| description.contains(k)) {
            return "INTEGER";
        }
        return "NUMBER";
    }

    const BOOLEAN_NAME_HINTS: &[&str] = &[
        "is_", "has_", "can_", "should_", "enabled", "disabled", "active", "inactive",
        "include", "exclude", "allow", "deny", "required", "optional",
    ];
    if BOOLEAN_NAME_HINTS.iter().any(|k| name.contains(k)) {
        return "BOOLEAN";
    }

    const OBJECT_DESC_HINTS: &[&str] = &[
        "dictionary", "object", "map", "properties", "configuration", "config", "settings",
        "options", "parameters", "attrs", "attributes",
    ];
    if OBJECT_DESC_HINTS.iter().any(|k| description.contains(k)) {
        return "OBJECT";
    }

    const ARRAY_DESC_HINTS: &[&str] = &[
        "list", "array", "collection", "items", "elements", "values", "names", "ids", "uuids",
        "entries",
    ];
    if ARRAY_DESC_HINTS.iter().any(|k| description.contains(k)) {
        return "ARRAY";
    }

    "STRING"
}

/// Correct a declared-but-possibly-wrong type for a named property.
fn force_type_correction(prop_name: &str, existing_type_lower: &str, schema: &Value) -> String {
    let name = prop_name.to_ascii_lowercase();

    if schema.get("enum").is_some() || ENUM_LIKE_FIELDS.contains(&name.as_str()) {
        return "STRING".to_string();
    }

    if let Some(corrected) = specific_correction(&name) {
        return corrected.to_string();
    }

    let description = schema
        .get("description")
        .and_then(|d| d.as_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if existing_type_lower == "string" {
        const NUMERIC_NAME_HINTS: &[&str] = &[
            "timeout", "limit", "count", "size", "max", "min", "seconds", "minutes", "hours",
            "days", "bytes", "port", "position", "width", "height", "x", "y", "z",
        ];
        if NUMERIC_NAME_HINTS.iter().any(|k| name.contains(k)) {
            if ["integer", "whole", "count"].iter().any(|k| description.contains(k)) {
                return "INTEGER".to_string();
            }
            return "NUMBER".to_string();
        }

        const BOOLEAN_NAME_HINTS: &[&str] =
            &["include", "exclude", "enabled", "disabled", "active", "required", "optional"];
        if BOOLEAN_NAME_HINTS.iter().any(|k| name.contains(k)) {
            return "BOOLEAN".to_string();
        }

        const OBJECT_NAMES: &[&str] =
            &["properties", "config", "configuration", "settings", "options", "parameters", "headers"];
        if OBJECT_NAMES.contains(&name.as_str())
            || ["dictionary", "object", "map", "properties"].iter().any(|k| description.contains(k))
        {
            return "OBJECT".to_string();
        }

        const ARRAY_DESC_HINTS: &[&str] = &["list", "array", "collection", "items", "elements"];
        if ARRAY_DESC_HINTS.iter().any(|k| description.contains(k)) {
            return "ARRAY".to_string();
        }
    }

    existing_type_lower.to_ascii_uppercase()
}

/// Recursively clean a Gemini schema node: strip `additionalProperties`
/// (already done by `common_cleanup`, repeated here as it is idempotent),
/// force `OBJECT`/`ARRAY` typing based on structure, infer or correct
/// property types, uppercase every type, and ensure `ARRAY` nodes have
/// `items`. `prop_name` is the name this node was reached under, if any
/// (used for array-items inference).
fn clean_gemini_schema(mut node: Value, prop_name: Option<&str>) -> Value {
    if !node.is_object() {
        return node;
    }

    if let Some(map) = node.as_object_mut() {
        map.remove("additionalProperties");
    }

    if node.get("properties").is_some() {
        node.as_object_mut()
            .unwrap()
            .insert("type".to_string(), json!("OBJECT"));

        let prop_names: Vec<String> = node["properties"]
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();

        for name in prop_names {
            let child = node["properties"][&name].clone();
            if !child.is_object() {
                node["properties"][&name] = json!({"type": "STRING"});
                continue;
            }

            let mut cleaned_child = clean_gemini_schema(child.clone(), Some(&name));

            let declared_type = cleaned_child
                .get("type")
                .and_then(|t| t.as_str())
                .map(|s| s.to_string());

            let final_type = match declared_type {
                None => {
                    if cleaned_child.get("properties").is_some() {
                        "OBJECT".to_string()
                    } else if cleaned_child.get("items").is_some() {
                        "ARRAY".to_string()
                    } else {
                        infer_property_type(&name, &cleaned_child).to_string()
                    }
                }
                Some(existing) => force_type_correction(&name, &existing.to_ascii_lowercase(), &cleaned_child),
            };

            if final_type == "ARRAY"
                && cleaned_child.get("items").is_none()
            {
                cleaned_child["items"] = default_items_for(&name.to_ascii_lowercase());
            }

            cleaned_child["type"] = json!(final_type.to_ascii_uppercase());
            node["properties"][&name] = cleaned_child;
        }
    }

    if node.get("items").is_some() {
        node.as_object_mut()
            .unwrap()
            .insert("type".to_string(), json!("ARRAY"));
        let items = node["items"].clone();
        if items.is_object() {
            node["items"] = clean_gemini_schema(items, None);
        }
    }

    if node.get("type").and_then(|t| t.as_str()) == Some("ARRAY") && node.get("items").is_none() {
        let key = prop_name.unwrap_or("").to_ascii_lowercase();
        node["items"] = default_items_for(&key);
    }

    if let Some(t) = node.get("type").and_then(|t| t.as_str()) {
        node["type"] = json!(t.to_ascii_uppercase());
    } else if node.get("properties").is_none() && node.get("items").is_none() && node.get("enum").is_none() {
        node["type"] = json!("STRING");
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, parameters: Value) -> Tool {
        Tool {
            name: name.to_string(),
            description: "a tool".to_string(),
            parameters,
            full_description: None,
        }
    }

    #[test]
    fn strips_additional_properties_everywhere() {
        let t = tool(
            "t",
            json!({"type": "object", "additionalProperties": false, "properties": {
                "a": {"type": "string", "additionalProperties": false}
            }}),
        );
        let out = normalize(&[t], ProviderKind::OpenAi);
        let params = &out[0]["function"]["parameters"];
        assert!(params.get("additionalProperties").is_none());
        assert!(params["properties"]["a"].get("additionalProperties").is_none());
    }

    #[test]
    fn empty_property_becomes_string() {
        let t = tool("t", json!({"type": "object", "properties": {"a": {}}}));
        let out = normalize(&[t], ProviderKind::OpenAi);
        assert_eq!(out[0]["function"]["parameters"]["properties"]["a"]["type"], "string");
    }

    #[test]
    fn anthropic_repackages_to_input_schema() {
        let t = tool("t", json!({"type": "object", "properties": {}}));
        let out = normalize(&[t], ProviderKind::Anthropic);
        assert!(out[0].get("input_schema").is_some());
        assert!(out[0].get("parameters").is_none());
    }

    #[test]
    fn gemini_uppercases_and_infers_missing_type() {
        let t = tool(
            "t",
            json!({"type": "object", "properties": {
                "max_results": {"description": "max count of results"}
            }}),
        );
        let out = normalize(&[t], ProviderKind::Gemini);
        let prop = &out[0]["parameters"]["properties"]["max_results"];
        assert_eq!(prop["type"], "INTEGER");
    }

    #[test]
    fn gemini_forces_object_without_properties() {
        let t = tool(
            "t",
            json!({"type": "object", "properties": {
                "config": {"type": "object"}
            }}),
        );
        let out = normalize(&[t], ProviderKind::Gemini);
        assert_eq!(out[0]["parameters"]["properties"]["config"]["type"], "OBJECT");
    }

    #[test]
    fn gemini_array_without_items_gets_default() {
        let t = tool(
            "t",
            json!({"type": "object", "properties": {
                "relationships": {"type": "array"}
            }}),
        );
        let out = normalize(&[t], ProviderKind::Gemini);
        let prop = &out[0]["parameters"]["properties"]["relationships"];
        assert_eq!(prop["type"], "ARRAY");
        assert_eq!(prop["items"]["type"], "STRING");
    }

    #[test]
    fn gemini_preserves_enum_as_string() {
        let t = tool(
            "t",
            json!({"type": "object", "properties": {
                "object_type": {"type": "object", "enum": ["a", "b"]}
            }}),
        );
        let out = normalize(&[t], ProviderKind::Gemini);
        assert_eq!(out[0]["parameters"]["properties"]["object_type"]["type"], "STRING");
    }

    #[test]
    fn gemini_specific_correction_overrides_wrong_type() {
        let t = tool(
            "t",
            json!({"type": "object", "properties": {
                "object_id": {"type": "object"}
            }}),
        );
        let out = normalize(&[t], ProviderKind::Gemini);
        assert_eq!(out[0]["parameters"]["properties"]["object_id"]["type"], "STRING");
    }

    #[test]
    fn normalize_is_idempotent_for_gemini() {
        let t = tool(
            "t",
            json!({"type": "object", "properties": {
                "relationships": {"type": "string"},
                "max_count": {}
            }}),
        );
        let once = normalize(std::slice::from_ref(&t), ProviderKind::Gemini);
        let once_as_tools: Vec<Tool> = once
            .iter()
            .map(|v| Tool {
                name: v["name"].as_str().unwrap().to_string(),
                description: v["description"].as_str().unwrap().to_string(),
                parameters: v["parameters"].clone(),
                full_description: None,
            })
            .collect();
        let twice = normalize(&once_as_tools, ProviderKind::Gemini);
        assert_eq!(once[0]["parameters"], twice[0]["parameters"]);
    }

    #[test]
    fn update_nifi_processor_config_gets_anyof() {
        let t = tool(
            "update_nifi_processor_config",
            json!({"type": "object", "properties": {"update_data": {"type": "string"}}}),
        );
        let out = normalize(&[t], ProviderKind::OpenAi);
        let update_data = &out[0]["function"]["parameters"]["properties"]["update_data"];
        assert!(update_data.get("anyOf").is_some());
    }

    #[test]
    fn bare_empty_schema_becomes_gemini_object_with_no_properties() {
        let t = tool("list_processors", json!({}));
        let out = normalize(&[t], ProviderKind::Gemini);
        assert_eq!(
            out[0]["parameters"],
            json!({"type": "OBJECT", "properties": {}})
        );
    }
}
