//! Structural schema for a project's config entry
//!
//! The check runs on the raw project entry before it is merged with the
//! defaults, so every key the user wrote is either known or reported.

use crate::core::error::SchemaViolation;
use serde_json::Value;

/// Expected shape of a config value
#[derive(Debug, Clone, Copy)]
enum Kind {
    Bool,
    String,
    Port,
    Integer,
    StringList,
    Enum(&'static [&'static str]),
    Object(&'static [Field]),
    /// `null` or an external command object
    Tool,
}

#[derive(Debug, Clone, Copy)]
struct Field {
    name: &'static str,
    kind: Kind,
}

const fn field(name: &'static str, kind: Kind) -> Field {
    Field { name, kind }
}

const TOGGLE: &[Field] = &[field("enabled", Kind::Bool)];

const PREPROCESSOR: &[Field] = &[
    field("enabled", Kind::Bool),
    field("includePath", Kind::String),
];

const CONCAT: &[Field] = &[
    field("enabled", Kind::Bool),
    field("finalName", Kind::String),
];

const HEADER: &[Field] = &[
    field("enabled", Kind::Bool),
    field("packageJsonPath", Kind::String),
];

const BROWSERSYNC: &[Field] = &[
    field("enabled", Kind::Bool),
    field("port", Kind::Port),
    field("notify", Kind::Bool),
    field("uiPort", Kind::Port),
    field("weinrePort", Kind::Port),
];

const IMAGE_OPTIMIZATION: &[Field] = &[
    field("enabled", Kind::Bool),
    field("mode", Kind::Enum(&["lossless", "lossy"])),
];

const THEMEROLLER: &[Field] = &[
    field("enabled", Kind::Bool),
    field("files", Kind::StringList),
    field("finalName", Kind::String),
];

const WATCH: &[Field] = &[field("debounceMs", Kind::Integer)];

const TOOL: &[Field] = &[
    field("program", Kind::String),
    field("args", Kind::StringList),
];

const TOOLS: &[Field] = &[
    field("sass", Kind::Tool),
    field("less", Kind::Tool),
    field("jsLint", Kind::Tool),
    field("jsMinify", Kind::Tool),
    field("cssAutoprefix", Kind::Tool),
    field("cssMinify", Kind::Tool),
    field("imageOptimize", Kind::Tool),
    field("rtl", Kind::Tool),
];

const PROJECT: &[Field] = &[
    field("srcFolder", Kind::String),
    field("distFolder", Kind::String),
    field("appURL", Kind::String),
    field("sass", Kind::Object(PREPROCESSOR)),
    field("less", Kind::Object(PREPROCESSOR)),
    field("jsConcat", Kind::Object(CONCAT)),
    field("cssConcat", Kind::Object(CONCAT)),
    field("minify", Kind::Object(TOGGLE)),
    field("header", Kind::Object(HEADER)),
    field("browsersync", Kind::Object(BROWSERSYNC)),
    field("rtl", Kind::Object(TOGGLE)),
    field("imageOptimization", Kind::Object(IMAGE_OPTIMIZATION)),
    field("themeroller", Kind::Object(THEMEROLLER)),
    field("watch", Kind::Object(WATCH)),
    field("tools", Kind::Object(TOOLS)),
];

/// Check a raw project entry against the schema, collecting every violation
pub fn check_project_entry(entry: &Value) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();
    check_value(entry, Kind::Object(PROJECT), "", &mut violations);
    violations
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn check_value(value: &Value, kind: Kind, path: &str, out: &mut Vec<SchemaViolation>) {
    match kind {
        Kind::Bool => {
            if !value.is_boolean() {
                out.push(SchemaViolation::new(path, "is not of type boolean"));
            }
        }
        Kind::String => {
            if !value.is_string() {
                out.push(SchemaViolation::new(path, "is not of type string"));
            }
        }
        Kind::Integer => {
            if !value.is_u64() {
                out.push(SchemaViolation::new(path, "is not a non-negative integer"));
            }
        }
        Kind::Port => match value.as_u64() {
            Some(port) if port <= u64::from(u16::MAX) => {}
            _ => out.push(SchemaViolation::new(
                path,
                "is not a valid port number (0-65535)",
            )),
        },
        Kind::StringList => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        out.push(SchemaViolation::new(
                            format!("{}[{}]", path, i),
                            "is not of type string",
                        ));
                    }
                }
            }
            None => out.push(SchemaViolation::new(path, "is not an array of strings")),
        },
        Kind::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            _ => out.push(SchemaViolation::new(
                path,
                format!("is not one of enum values: {}", allowed.join(",")),
            )),
        },
        Kind::Object(fields) => check_object(value, fields, path, out),
        Kind::Tool => {
            if value.is_null() {
                return;
            }
            check_object(value, TOOL, path, out);
            if value.is_object() && value.get("program").is_none() {
                out.push(SchemaViolation::new(
                    join(path, "program"),
                    "is required",
                ));
            }
        }
    }
}

fn check_object(value: &Value, fields: &[Field], path: &str, out: &mut Vec<SchemaViolation>) {
    let Some(map) = value.as_object() else {
        let at = if path.is_empty() { "project entry" } else { path };
        out.push(SchemaViolation::new(at, "is not of type object"));
        return;
    };

    for (key, child) in map {
        let child_path = join(path, key);
        match fields.iter().find(|f| f.name == key) {
            Some(f) => check_value(child, f.kind, &child_path, out),
            None => out.push(SchemaViolation::new(child_path, "is not an allowed property")),
        }
    }
}
