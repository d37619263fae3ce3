//! Schema compatibility checking for protocol evolution.
//!
//! Fields are matched by tag, which is the only identity the wire carries.
//! Compatibility rules:
//! - Removing a field is tolerated (readers skip tags they do not declare)
//! - Adding a field is breaking: streams written before it lack the record,
//!   and a decode that ends before every declared field is rejected as
//!   truncated
//! - Renaming a field while keeping its tag and type is tolerated
//! - Changing the type behind a tag is breaking (`bytes` and `string` share an
//!   encoding and may be swapped)
//! - Adding a message is tolerated; removing one is breaking

use crate::schema::{FieldType, MessageSchema, Schema};
use std::collections::HashMap;
use std::fmt;

/// Types of compatibility between schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibilityLevel {
    /// No differences on the wire
    FullyCompatible,
    /// Only differences the skip rule absorbs
    ForwardCompatible,
    /// Breaking changes detected
    Incompatible,
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompatibilityLevel::FullyCompatible => "fully compatible",
            CompatibilityLevel::ForwardCompatible => "forward compatible",
            CompatibilityLevel::Incompatible => "incompatible",
        })
    }
}

/// Specific compatibility issue found during checking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompatibilityIssue {
    /// Message was removed
    MessageRemoved { name: String },
    /// Field the old schema never wrote
    FieldAdded {
        message: String,
        tag: u32,
        field: String,
    },
    /// Tag now decodes as a different type
    FieldTypeChanged {
        message: String,
        tag: u32,
        field: String,
        old_type: FieldType,
        new_type: FieldType,
    },
}

impl fmt::Display for CompatibilityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatibilityIssue::MessageRemoved { name } => {
                write!(f, "message '{name}' removed")
            }
            CompatibilityIssue::FieldAdded {
                message,
                tag,
                field,
            } => write!(
                f,
                "field '{field}' (tag {tag}) added to message '{message}'; older streams lack it"
            ),
            CompatibilityIssue::FieldTypeChanged {
                message,
                tag,
                field,
                old_type,
                new_type,
            } => write!(
                f,
                "field '{field}' (tag {tag}) in message '{message}' changed type from {old_type} to {new_type}"
            ),
        }
    }
}

/// Result of compatibility check
#[derive(Debug)]
pub struct CompatibilityReport {
    pub level: CompatibilityLevel,
    pub issues: Vec<CompatibilityIssue>,
    pub warnings: Vec<String>,
}

impl CompatibilityReport {
    /// Creates a fully compatible report
    pub fn compatible() -> Self {
        Self {
            level: CompatibilityLevel::FullyCompatible,
            issues: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Checks if schemas are compatible (not incompatible)
    pub fn is_compatible(&self) -> bool {
        self.level != CompatibilityLevel::Incompatible
    }

    /// Adds a breaking issue
    pub fn add_issue(&mut self, issue: CompatibilityIssue) {
        self.level = CompatibilityLevel::Incompatible;
        self.issues.push(issue);
    }

    /// Adds a warning (non-breaking)
    pub fn add_warning(&mut self, warning: String) {
        if self.level == CompatibilityLevel::FullyCompatible {
            self.level = CompatibilityLevel::ForwardCompatible;
        }
        self.warnings.push(warning);
    }
}

/// Checks whether data written with `old` stays readable with `new`
pub fn check_compatibility(old: &Schema, new: &Schema) -> CompatibilityReport {
    let mut report = CompatibilityReport::compatible();

    for old_msg in old.messages() {
        match new.message(&old_msg.name) {
            Some(new_msg) => check_message_compatibility(&mut report, old_msg, new_msg),
            None => report.add_issue(CompatibilityIssue::MessageRemoved {
                name: old_msg.name.clone(),
            }),
        }
    }

    for new_msg in new.messages() {
        if old.message(&new_msg.name).is_none() {
            report.add_warning(format!("New message type added: {}", new_msg.name));
        }
    }

    tracing::debug!(
        level = %report.level,
        issues = report.issues.len(),
        warnings = report.warnings.len(),
        "schema compatibility checked"
    );
    report
}

/// Checks compatibility between two versions of one message
fn check_message_compatibility(
    report: &mut CompatibilityReport,
    old_msg: &MessageSchema,
    new_msg: &MessageSchema,
) {
    let msg_name = &old_msg.name;
    let new_fields: HashMap<u32, _> = new_msg.fields.iter().map(|f| (f.tag, f)).collect();

    for old_field in &old_msg.fields {
        let Some(new_field) = new_fields.get(&old_field.tag) else {
            report.add_warning(format!(
                "Field '{}' (tag {}) removed from message '{}'",
                old_field.name, old_field.tag, msg_name
            ));
            continue;
        };

        if !old_field.field_type.same_encoding(&new_field.field_type) {
            report.add_issue(CompatibilityIssue::FieldTypeChanged {
                message: msg_name.clone(),
                tag: old_field.tag,
                field: old_field.name.clone(),
                old_type: old_field.field_type.clone(),
                new_type: new_field.field_type.clone(),
            });
        } else if old_field.field_type != new_field.field_type {
            report.add_warning(format!(
                "Field '{}' in message '{}' changed from {} to {}",
                old_field.name, msg_name, old_field.field_type, new_field.field_type
            ));
        }

        if old_field.name != new_field.name {
            report.add_warning(format!(
                "Field tag {} in message '{}' renamed from '{}' to '{}'",
                old_field.tag, msg_name, old_field.name, new_field.name
            ));
        }
    }

    for new_field in &new_msg.fields {
        if old_msg.field(new_field.tag).is_none() {
            report.add_issue(CompatibilityIssue::FieldAdded {
                message: msg_name.clone(),
                tag: new_field.tag,
                field: new_field.name.clone(),
            });
        }
    }
}
