//! Helpers shared by every resource: provider data wiring, diagnostics,
//! timeouts, import ids and conversions between Terraform values and the
//! JSON shapes the Gcore APIs speak.

use crate::api::tasks::{wait_for_task, wait_task_and_return_result};
use crate::api::{ApiError, Client, TaskResults};
use crate::GcoreProviderData;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{ImportResourceStateRequest, ImportResourceStateResponse};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::timeouts::Timeouts;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::import_state_composite_id;

/// Stores the provider data handed to a resource or data source.
pub fn configure_provider_data(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
    target: &mut Option<GcoreProviderData>,
) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];

    if let Some(data) = provider_data {
        if let Some(provider_data) = data.downcast_ref::<GcoreProviderData>() {
            *target = Some(provider_data.clone());
        } else {
            diagnostics.push(Diagnostic::error(
                "Invalid provider data",
                "Failed to extract GcoreProviderData from provider data",
            ));
        }
    } else {
        diagnostics.push(Diagnostic::error(
            "No provider data",
            "No provider data was provided to the resource",
        ));
    }

    diagnostics
}

pub fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

pub fn api_error(summary: &str, error: &ApiError) -> Diagnostic {
    tracing::warn!(%error, "{}", summary);
    Diagnostic::error(summary, format!("API error: {}", error))
}

/// A create or update step that failed. `state` is set once the backend
/// object exists or has changed, so the caller records it instead of
/// dropping it.
#[derive(Debug)]
pub struct ApplyError {
    pub diagnostic: Diagnostic,
    pub state: Option<DynamicValue>,
}

impl ApplyError {
    pub fn partial(diagnostic: Diagnostic, state: &DynamicValue) -> Self {
        Self {
            diagnostic,
            state: Some(state.without_unknowns()),
        }
    }

    /// The state to return, falling back to `unchanged` when nothing was applied
    pub fn into_response(self, unchanged: DynamicValue) -> (DynamicValue, Vec<Diagnostic>) {
        (self.state.unwrap_or(unchanged), vec![self.diagnostic])
    }
}

impl From<Diagnostic> for ApplyError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostic,
            state: None,
        }
    }
}

/// Copies attribute `name` from `from` into `state`
pub fn copy_attribute(state: &mut DynamicValue, from: &DynamicValue, name: &str) {
    let path = AttributePath::new(name);
    let value = from.get(&path).cloned().unwrap_or(Dynamic::Null);
    let _ = state.set(&path, value);
}

/// Races `future` against cancellation of the request context
pub async fn run_cancellable<T, F>(ctx: &Context, future: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::select! {
        result = future => result,
        _ = ctx.cancelled() => Err(ApiError::Cancelled),
    }
}

/// Waits for the task behind `results` and returns the id of the `kind`
/// object it created
pub async fn wait_created(
    ctx: &Context,
    client: &Client,
    results: &TaskResults,
    kind: &str,
    timeout: Duration,
) -> Result<String, ApiError> {
    let task_id = results.task_id()?;
    tracing::info!(task_id, kind, "waiting for task");
    run_cancellable(
        ctx,
        wait_task_and_return_result(client, task_id, true, timeout, move |task| async move {
            task.created_id(kind)
        }),
    )
    .await?
    .ok_or_else(|| ApiError::MissingTaskResult(task_id.to_string()))
}

/// Waits for the task behind `results` to finish
pub async fn wait_finished(
    ctx: &Context,
    client: &Client,
    results: &TaskResults,
    timeout: Duration,
) -> Result<(), ApiError> {
    let task_id = results.task_id()?;
    run_cancellable(ctx, wait_for_task(client, task_id, timeout))
        .await
        .map(|_| ())
}

pub fn id_attribute(description: &str) -> Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description(description)
        .computed()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

pub fn project_id_attribute() -> Attribute {
    AttributeBuilder::new("project_id", AttributeType::Number)
        .description("Project ID")
        .required()
        .plan_modifier(RequiresReplaceIfChanged::create())
        .build()
}

pub fn region_id_attribute() -> Attribute {
    AttributeBuilder::new("region_id", AttributeType::Number)
        .description("Region ID")
        .required()
        .plan_modifier(RequiresReplaceIfChanged::create())
        .build()
}

/// Reads `project_id` and `region_id` from config or state
pub fn cloud_location(value: &DynamicValue) -> Result<(i64, i64), Diagnostic> {
    let project_id = required_i64(value, "project_id")?;
    let region_id = required_i64(value, "region_id")?;
    Ok((project_id, region_id))
}

pub fn required_string(value: &DynamicValue, name: &str) -> Result<String, Diagnostic> {
    value.get_string(&AttributePath::new(name)).map_err(|e| {
        Diagnostic::error(format!("Missing {}", name), e.to_string())
            .with_attribute(AttributePath::new(name))
    })
}

pub fn required_i64(value: &DynamicValue, name: &str) -> Result<i64, Diagnostic> {
    value.get_i64(&AttributePath::new(name)).map_err(|e| {
        Diagnostic::error(format!("Missing {}", name), e.to_string())
            .with_attribute(AttributePath::new(name))
    })
}

/// Parses the string `id` attribute of resources whose backend ids are numbers
pub fn numeric_id(value: &DynamicValue) -> Result<i64, Diagnostic> {
    let raw = required_string(value, "id")?;
    raw.parse::<i64>().map_err(|_| {
        Diagnostic::error("Invalid id", format!("expected a numeric id, got '{}'", raw))
            .with_attribute(AttributePath::new("id"))
    })
}

pub fn optional_string(value: &DynamicValue, name: &str) -> Option<String> {
    value.get_string(&AttributePath::new(name)).ok()
}

pub fn optional_i64(value: &DynamicValue, name: &str) -> Option<i64> {
    value.get_i64(&AttributePath::new(name)).ok()
}

pub fn optional_bool(value: &DynamicValue, name: &str) -> Option<bool> {
    value.get_bool(&AttributePath::new(name)).ok()
}

/// A string map attribute; null or unknown reads as empty
pub fn string_map(value: &DynamicValue, name: &str) -> HashMap<String, String> {
    value
        .get_string_map(&AttributePath::new(name))
        .unwrap_or_default()
}

pub fn string_list(value: &DynamicValue, name: &str) -> Vec<String> {
    value
        .get_string_list(&AttributePath::new(name))
        .unwrap_or_default()
}

pub fn set_string(state: &mut DynamicValue, name: &str, value: impl Into<String>) {
    let _ = state.set_string(&AttributePath::new(name), value.into());
}

pub fn set_optional_string(state: &mut DynamicValue, name: &str, value: Option<String>) {
    let path = AttributePath::new(name);
    let _ = match value {
        Some(value) => state.set_string(&path, value),
        None => state.set_null(&path),
    };
}

pub fn set_number(state: &mut DynamicValue, name: &str, value: i64) {
    let _ = state.set_number(&AttributePath::new(name), value as f64);
}

pub fn set_bool(state: &mut DynamicValue, name: &str, value: bool) {
    let _ = state.set_bool(&AttributePath::new(name), value);
}

/// Writes a string map; an empty map from the API keeps a null config value null
pub fn set_string_map(state: &mut DynamicValue, name: &str, value: &HashMap<String, String>) {
    let path = AttributePath::new(name);
    let was_null = state.get(&path).map(Dynamic::is_null).unwrap_or(true);
    let _ = if value.is_empty() && was_null {
        state.set_null(&path)
    } else {
        state.set_map(&path, string_map_to_dynamic(value))
    };
}

pub fn string_map_to_dynamic(map: &HashMap<String, String>) -> HashMap<String, Dynamic> {
    map.iter()
        .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
        .collect()
}

pub fn strings_to_dynamic(values: &[String]) -> Vec<Dynamic> {
    values.iter().cloned().map(Dynamic::String).collect()
}

/// Resolves the `timeouts` block against per-resource defaults
pub fn resolve_timeouts(value: &DynamicValue, defaults: Timeouts) -> Result<Timeouts, Diagnostic> {
    Timeouts::from_value(value, defaults).map_err(|e| {
        Diagnostic::error("Invalid timeouts", e.to_string())
            .with_attribute(AttributePath::new(tfplug::timeouts::TIMEOUTS_BLOCK))
    })
}

pub fn empty_import_response() -> ImportResourceStateResponse {
    ImportResourceStateResponse {
        imported_resources: vec![],
        diagnostics: vec![],
        deferred: None,
    }
}

/// Imports cloud resources addressed as `<project_id>:<region_id>:<id>`
pub fn import_cloud_id(
    ctx: &Context,
    request: &ImportResourceStateRequest,
) -> ImportResourceStateResponse {
    let mut response = empty_import_response();
    import_state_composite_id(
        ctx,
        &[
            ("project_id", AttributeType::Number),
            ("region_id", AttributeType::Number),
            ("id", AttributeType::String),
        ],
        request,
        &mut response,
    );
    response
}

/// Terraform value to JSON. Whole numbers become JSON integers, unknown
/// becomes null.
pub fn dynamic_to_json(value: &Dynamic) -> serde_json::Value {
    match value {
        Dynamic::Null | Dynamic::Unknown => serde_json::Value::Null,
        Dynamic::Bool(b) => serde_json::Value::Bool(*b),
        Dynamic::Number(n) => {
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                serde_json::Value::from(*n as i64)
            } else {
                serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Dynamic::String(s) => serde_json::Value::String(s.clone()),
        Dynamic::List(items) => serde_json::Value::Array(items.iter().map(dynamic_to_json).collect()),
        Dynamic::Map(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), dynamic_to_json(v)))
                .collect(),
        ),
    }
}

pub fn json_to_dynamic(value: &serde_json::Value) -> Dynamic {
    match value {
        serde_json::Value::Null => Dynamic::Null,
        serde_json::Value::Bool(b) => Dynamic::Bool(*b),
        serde_json::Value::Number(n) => n.as_f64().map(Dynamic::Number).unwrap_or(Dynamic::Null),
        serde_json::Value::String(s) => Dynamic::String(s.clone()),
        serde_json::Value::Array(items) => Dynamic::List(items.iter().map(json_to_dynamic).collect()),
        serde_json::Value::Object(fields) => Dynamic::Map(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), json_to_dynamic(v)))
                .collect(),
        ),
    }
}

/// A JSON object without its null members, the shape of a nested block
/// whose optional attributes were left unset
pub fn object_without_nulls(value: &Dynamic) -> serde_json::Map<String, serde_json::Value> {
    match value {
        Dynamic::Map(fields) => fields
            .iter()
            .filter(|(_, v)| !v.is_null() && !v.is_unknown())
            .map(|(k, v)| (k.clone(), dynamic_to_json(v)))
            .collect(),
        _ => serde_json::Map::new(),
    }
}

/// The single element of a nested block in Single or List mode with
/// `max_items(1)`
pub fn single_block<'a>(value: &'a DynamicValue, name: &str) -> Option<&'a Dynamic> {
    match value.get(&AttributePath::new(name))? {
        Dynamic::List(items) => items.first(),
        Dynamic::Null | Dynamic::Unknown => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use serde_json::json;
    use mockito::Server;
    use tfplug::types::ClientCapabilities;

    fn state(fields: &[(&str, Dynamic)]) -> DynamicValue {
        DynamicValue::new(Dynamic::Map(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ))
    }

    #[test]
    fn partial_apply_error_reports_state_without_unknowns() {
        let planned = state(&[("id", Dynamic::from("i-1")), ("status", Dynamic::Unknown)]);
        let error = ApplyError::partial(Diagnostic::error("boom", "detail"), &planned);
        let (new_state, diagnostics) = error.into_response(DynamicValue::null());

        assert_eq!(new_state.get_string(&AttributePath::new("id")).unwrap(), "i-1");
        assert!(new_state.get(&AttributePath::new("status")).unwrap().is_null());
        assert_eq!(diagnostics.len(), 1);

        let error = ApplyError::from(Diagnostic::error("boom", "detail"));
        let (new_state, _) = error.into_response(planned.clone());
        assert_eq!(new_state, planned);
    }

    #[test]
    fn configure_accepts_gcore_provider_data() {
        let data = GcoreProviderData::new(create_test_client("http://localhost"));
        let mut target = None;
        let diags = configure_provider_data(Some(Arc::new(data)), &mut target);
        assert!(diags.is_empty());
        assert!(target.is_some());
    }

    #[test]
    fn configure_rejects_foreign_provider_data() {
        let mut target = None;
        let diags = configure_provider_data(Some(Arc::new("nope")), &mut target);
        assert_eq!(diags[0].summary, "Invalid provider data");
        assert!(target.is_none());

        let diags = configure_provider_data(None, &mut target);
        assert_eq!(diags[0].summary, "No provider data");
    }

    #[test]
    fn reads_cloud_location() {
        let value = state(&[
            ("project_id", Dynamic::Number(1.0)),
            ("region_id", Dynamic::Number(76.0)),
        ]);
        assert_eq!(cloud_location(&value).unwrap(), (1, 76));

        let missing = state(&[("project_id", Dynamic::Number(1.0))]);
        let diag = cloud_location(&missing).unwrap_err();
        assert_eq!(diag.summary, "Missing region_id");
    }

    #[test]
    fn numeric_id_rejects_garbage() {
        assert_eq!(numeric_id(&state(&[("id", Dynamic::from("41"))])).unwrap(), 41);
        assert_eq!(
            numeric_id(&state(&[("id", Dynamic::from("abc"))]))
                .unwrap_err()
                .summary,
            "Invalid id"
        );
    }

    #[test]
    fn json_conversion_keeps_integers() {
        let value = Dynamic::Map(HashMap::from([
            ("status_code".to_string(), Dynamic::Number(403.0)),
            ("ratio".to_string(), Dynamic::Number(0.5)),
            ("tags".to_string(), Dynamic::List(vec![Dynamic::from("a")])),
            ("gone".to_string(), Dynamic::Unknown),
        ]));
        assert_eq!(
            dynamic_to_json(&value),
            json!({"status_code": 403, "ratio": 0.5, "tags": ["a"], "gone": null})
        );
        assert_eq!(
            json_to_dynamic(&json!({"enabled": true, "limit": 10})),
            Dynamic::Map(HashMap::from([
                ("enabled".to_string(), Dynamic::Bool(true)),
                ("limit".to_string(), Dynamic::Number(10.0)),
            ]))
        );
    }

    #[test]
    fn object_without_nulls_drops_unset_members() {
        let block = Dynamic::Map(HashMap::from([
            ("status_code".to_string(), Dynamic::Number(403.0)),
            ("action_duration".to_string(), Dynamic::Null),
        ]));
        assert_eq!(
            serde_json::Value::Object(object_without_nulls(&block)),
            json!({"status_code": 403})
        );
    }

    #[test]
    fn set_string_map_keeps_null_for_empty_api_map() {
        let mut value = state(&[("metadata", Dynamic::Null)]);
        set_string_map(&mut value, "metadata", &HashMap::new());
        assert!(value.get(&AttributePath::new("metadata")).unwrap().is_null());

        let mut value = state(&[("metadata", Dynamic::Map(HashMap::new()))]);
        set_string_map(&mut value, "metadata", &HashMap::new());
        assert_eq!(
            value.get(&AttributePath::new("metadata")),
            Some(&Dynamic::Map(HashMap::new()))
        );
    }

    #[test]
    fn timeouts_fall_back_to_defaults() {
        let defaults = Timeouts::uniform(Duration::from_secs(1200));
        let value = state(&[(
            "timeouts",
            Dynamic::Map(HashMap::from([("create".to_string(), Dynamic::from("40m"))])),
        )]);
        let timeouts = resolve_timeouts(&value, defaults).unwrap();
        assert_eq!(timeouts.create, Duration::from_secs(2400));
        assert_eq!(timeouts.delete, Duration::from_secs(1200));

        let bad = state(&[(
            "timeouts",
            Dynamic::Map(HashMap::from([("create".to_string(), Dynamic::from("soon"))])),
        )]);
        assert_eq!(
            resolve_timeouts(&bad, defaults).unwrap_err().summary,
            "Invalid timeouts"
        );
    }

    #[test]
    fn imports_cloud_id() {
        let request = ImportResourceStateRequest {
            type_name: "gcore_network".to_string(),
            id: "1:76:3f0c".to_string(),
            client_capabilities: ClientCapabilities::default(),
        };
        let response = import_cloud_id(&Context::new(), &request);
        let imported = &response.imported_resources[0].state;
        assert_eq!(cloud_location(imported).unwrap(), (1, 76));
        assert_eq!(required_string(imported, "id").unwrap(), "3f0c");
    }

    #[tokio::test]
    async fn wait_created_reads_created_resource() {
        let mut server = Server::new_async().await;
        let _task = server
            .mock("GET", "/v1/tasks/t-9")
            .with_body(
                r#"{"id":"t-9","state":"FINISHED","created_resources":{"networks":["net-1"]}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let results = TaskResults {
            tasks: vec!["t-9".to_string()],
        };
        let id = wait_created(&Context::new(), &client, &results, "networks", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(id, "net-1");

        let missing = wait_created(&Context::new(), &client, &results, "routers", Duration::from_secs(5)).await;
        assert!(matches!(missing, Err(ApiError::MissingTaskResult(_))));
    }

    #[tokio::test]
    async fn cancellation_interrupts_waits() {
        let ctx = Context::new();
        ctx.cancel();
        let result = run_cancellable(&ctx, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, ApiError>(())
        })
        .await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }
}
