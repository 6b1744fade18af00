//! Import helpers for simplifying resource import implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::schema::AttributeType;
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Copies the import ID verbatim into a single state attribute.
///
/// Example: ID "vm-123" -> state.id = "vm-123"
pub fn import_state_passthrough_id(
    _ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::object();

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!("Could not set attribute '{}' to value '{}'", attr_path, request.id),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private: Vec::new(),
    });
}

/// Splits a `:`-separated import ID into several attributes.
///
/// Example: with fields `project_id` (number), `region_id` (number), `id`
/// (string), the ID "1:76:abc" sets all three.
pub fn import_state_composite_id(
    _ctx: &Context,
    fields: &[(&str, AttributeType)],
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let expected = fields
        .iter()
        .map(|(name, _)| format!("<{}>", name))
        .collect::<Vec<_>>()
        .join(":");
    let parts: Vec<&str> = request.id.split(':').collect();

    if parts.len() != fields.len() || parts.iter().any(|p| p.is_empty()) {
        response.diagnostics.push(Diagnostic::error(
            "Unexpected import identifier",
            format!("Expected import identifier in the form {}, got '{}'", expected, request.id),
        ));
        return;
    }

    let mut state = DynamicValue::object();
    for ((name, ty), raw) in fields.iter().zip(parts) {
        let path = AttributePath::new(name);
        let result = match ty {
            AttributeType::Number => match raw.parse::<f64>() {
                Ok(n) => state.set_number(&path, n),
                Err(_) => {
                    response.diagnostics.push(
                        Diagnostic::error(
                            "Unexpected import identifier",
                            format!("'{}' must be a number, got '{}'", name, raw),
                        )
                        .with_attribute(path),
                    );
                    return;
                }
            },
            _ => state.set_string(&path, raw.to_string()),
        };
        if let Err(e) = result {
            response
                .diagnostics
                .push(Diagnostic::error("Failed to set import ID", e.to_string()));
            return;
        }
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private: Vec::new(),
    });
}
