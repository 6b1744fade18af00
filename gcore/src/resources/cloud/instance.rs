//! Compute instance resource

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::plan_modifier::{values_equal, RequiresReplaceIfChanged};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ModifyPlanRequest,
    ModifyPlanResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, ResourceWithModifyPlan, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, SchemaBuilder};
use tfplug::timeouts::{timeouts_block, TimeoutOperation, Timeouts};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{StringLengthValidator, StringOneOfValidator};

use crate::api::cloud::{
    CreateInstanceRequest, Instance, InstanceInterface, InstanceVolume, InstancesApi,
};
use crate::resources::common::{
    api_error, cloud_location, configure_provider_data, copy_attribute, id_attribute,
    import_cloud_id, not_configured, optional_string, project_id_attribute, region_id_attribute,
    required_string, resolve_timeouts, set_optional_string, set_string, set_string_map,
    string_map, strings_to_dynamic, wait_created, wait_finished, ApplyError,
};

const VOLUME_SOURCES: [&str; 4] = ["image", "new-volume", "existing-volume", "snapshot"];
const INTERFACE_TYPES: [&str; 4] = ["external", "subnet", "any_subnet", "reserved_fixed_ip"];
const DEFAULT_TIMEOUTS: Timeouts = Timeouts::uniform(Duration::from_secs(20 * 60));

#[derive(Default)]
pub struct InstanceResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl InstanceResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn extract_create_request(config: &DynamicValue) -> Result<CreateInstanceRequest, Diagnostic> {
        let volumes = config
            .get_list(&AttributePath::new("volume"))
            .unwrap_or_default()
            .iter()
            .map(volume_from_block)
            .collect();
        let interfaces = config
            .get_list(&AttributePath::new("interface"))
            .unwrap_or_default()
            .iter()
            .map(interface_from_block)
            .collect();

        Ok(CreateInstanceRequest {
            names: vec![required_string(config, "name")?],
            flavor: required_string(config, "flavor_id")?,
            keypair_name: optional_string(config, "keypair_name"),
            volumes,
            interfaces,
            metadata: string_map(config, "metadata"),
            user_data: optional_string(config, "user_data"),
        })
    }

    async fn create_instance(
        &self,
        ctx: &Context,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, ApplyError> {
        let (project_id, region_id) = cloud_location(planned)?;
        let timeouts = resolve_timeouts(planned, DEFAULT_TIMEOUTS)?;
        let request = Self::extract_create_request(planned)?;
        let api = data.client.cloud().instances(project_id, region_id);

        let results = api
            .create(&request)
            .await
            .map_err(|e| api_error("Failed to create instance", &e))?;
        let instance_id = wait_created(ctx, &data.client, &results, "instances", timeouts.create)
            .await
            .map_err(|e| api_error("Failed to create instance", &e))?;

        let mut state = planned.clone();
        set_string(&mut state, "id", instance_id.clone());

        let instance = api.get(&instance_id).await.map_err(|e| {
            ApplyError::partial(api_error("Failed to read created instance", &e), &state)
        })?;
        apply_computed(&mut state, &instance);
        Ok(state)
    }

    /// Each completed step is written to the returned state, so a failure
    /// midway still records what the backend already changed.
    async fn update_instance(
        &self,
        ctx: &Context,
        data: &crate::GcoreProviderData,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, ApplyError> {
        let (project_id, region_id) = cloud_location(planned)?;
        let timeouts = resolve_timeouts(planned, DEFAULT_TIMEOUTS)?;
        let id = required_string(prior, "id")?;
        let api = data.client.cloud().instances(project_id, region_id);
        let mut state = prior.clone();

        let name = required_string(planned, "name")?;
        if optional_string(prior, "name").as_deref() != Some(name.as_str()) {
            api.rename(&id, &name).await.map_err(|e| {
                ApplyError::partial(api_error("Failed to rename instance", &e), &state)
            })?;
            set_string(&mut state, "name", name);
        }

        let flavor_id = required_string(planned, "flavor_id")?;
        if optional_string(prior, "flavor_id").as_deref() != Some(flavor_id.as_str()) {
            tracing::info!(instance_id = %id, %flavor_id, "resizing instance");
            let results = api.change_flavor(&id, &flavor_id).await.map_err(|e| {
                ApplyError::partial(api_error("Failed to change instance flavor", &e), &state)
            })?;
            wait_finished(ctx, &data.client, &results, timeouts.update)
                .await
                .map_err(|e| {
                    ApplyError::partial(api_error("Failed to change instance flavor", &e), &state)
                })?;
            set_string(&mut state, "flavor_id", flavor_id);
        }

        let (set, remove) = metadata_diff(&string_map(prior, "metadata"), &string_map(planned, "metadata"));
        if !set.is_empty() || !remove.is_empty() {
            api.update_metadata(&id, &set, &remove).await.map_err(|e| {
                ApplyError::partial(api_error("Failed to update instance metadata", &e), &state)
            })?;
            copy_attribute(&mut state, planned, "metadata");
        }

        let instance = api.get(&id).await.map_err(|e| {
            ApplyError::partial(api_error("Failed to read instance", &e), &state)
        })?;
        let mut state = planned.clone();
        apply_computed(&mut state, &instance);
        Ok(state)
    }

    async fn delete_instance(
        &self,
        ctx: &Context,
        api: InstancesApi<'_>,
        data: &crate::GcoreProviderData,
        id: &str,
        timeout: Duration,
    ) -> Result<(), Diagnostic> {
        let results = match api.delete(id).await {
            Ok(results) => results,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(api_error("Failed to delete instance", &e)),
        };
        wait_finished(ctx, &data.client, &results, timeout)
            .await
            .map_err(|e| api_error("Failed to delete instance", &e))?;
        tracing::info!(instance_id = %id, "instance deleted");
        Ok(())
    }
}

fn volume_from_block(block: &Dynamic) -> InstanceVolume {
    let string = |name: &str| block.field(name).and_then(Dynamic::as_str).map(str::to_string);
    let number = |name: &str| block.field(name).and_then(Dynamic::as_i64);
    InstanceVolume {
        source: string("source").unwrap_or_default(),
        image_id: string("image_id"),
        volume_id: string("volume_id"),
        size: number("size"),
        type_name: string("type_name"),
        boot_index: number("boot_index"),
        name: string("name"),
    }
}

fn interface_from_block(block: &Dynamic) -> InstanceInterface {
    let string = |name: &str| block.field(name).and_then(Dynamic::as_str).map(str::to_string);
    InstanceInterface {
        type_: string("type").unwrap_or_default(),
        network_id: string("network_id"),
        subnet_id: string("subnet_id"),
        port_id: string("port_id"),
    }
}

/// Keys to set (new or changed values) and keys to remove
fn metadata_diff(
    prior: &HashMap<String, String>,
    planned: &HashMap<String, String>,
) -> (HashMap<String, String>, Vec<String>) {
    let set = planned
        .iter()
        .filter(|(k, v)| prior.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let mut remove: Vec<String> = prior
        .keys()
        .filter(|k| !planned.contains_key(*k))
        .cloned()
        .collect();
    remove.sort();
    (set, remove)
}

/// Writes the values only the backend knows
fn apply_computed(state: &mut DynamicValue, instance: &Instance) {
    set_string(state, "status", instance.status.clone());
    set_optional_string(state, "vm_state", instance.vm_state.clone());
    let _ = state.set_list(
        &AttributePath::new("ip_addresses"),
        strings_to_dynamic(&instance.ip_addresses()),
    );
}

fn apply_instance(state: &mut DynamicValue, instance: &Instance) {
    set_string(state, "name", instance.name.clone());
    if let Some(flavor) = &instance.flavor {
        set_string(state, "flavor_id", flavor.flavor_id.clone());
    }
    if instance.keypair_name.is_some() {
        set_optional_string(state, "keypair_name", instance.keypair_name.clone());
    }
    set_string_map(state, "metadata", &instance.metadata);
    apply_computed(state, instance);
}

#[async_trait]
impl Resource for InstanceResource {
    fn type_name(&self) -> &str {
        "gcore_instance"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let volume = NestedBlockBuilder::new("volume", NestingMode::List)
            .description("Volumes attached at boot. Changing volumes forces a new instance")
            .attribute(
                AttributeBuilder::new("source", AttributeType::String)
                    .description("One of image, new-volume, existing-volume, snapshot")
                    .required()
                    .validator(StringOneOfValidator::create(&VOLUME_SOURCES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("image_id", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("volume_id", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("size", AttributeType::Number)
                    .description("Size in GiB")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type_name", AttributeType::String)
                    .description("Volume type, e.g. standard or ssd_hiiops")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("boot_index", AttributeType::Number)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .optional()
                    .build(),
            )
            .min_items(1)
            .build();

        let interface = NestedBlockBuilder::new("interface", NestingMode::List)
            .description("Network interfaces. Changing interfaces forces a new instance")
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("One of external, subnet, any_subnet, reserved_fixed_ip")
                    .required()
                    .validator(StringOneOfValidator::create(&INTERFACE_TYPES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("network_id", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subnet_id", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("port_id", AttributeType::String)
                    .optional()
                    .build(),
            )
            .min_items(1)
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a Gcore cloud compute instance")
            .attribute(id_attribute("Instance ID"))
            .attribute(project_id_attribute())
            .attribute(region_id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Instance name")
                    .required()
                    .validator(StringLengthValidator::between(1, 63))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("flavor_id", AttributeType::String)
                    .description("Flavor; changing it resizes the instance")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("keypair_name", AttributeType::String)
                    .description("SSH keypair injected at boot")
                    .optional()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("user_data", AttributeType::String)
                    .description("Cloud-init user data")
                    .optional()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("metadata", AttributeType::map(AttributeType::String))
                    .description("Instance metadata")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vm_state", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ip_addresses", AttributeType::list(AttributeType::String))
                    .description("Addresses across all interfaces")
                    .computed()
                    .build(),
            )
            .block(volume)
            .block(interface)
            .block(timeouts_block(&[
                TimeoutOperation::Create,
                TimeoutOperation::Update,
                TimeoutOperation::Delete,
            ]))
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        let volumes = request
            .config
            .get_list(&AttributePath::new("volume"))
            .unwrap_or_default();
        for (i, block) in volumes.iter().enumerate() {
            let volume = volume_from_block(block);
            let path = AttributePath::new("volume").index(i as i64);
            let missing = match volume.source.as_str() {
                "image" if volume.image_id.is_none() => Some("image_id"),
                "existing-volume" if volume.volume_id.is_none() => Some("volume_id"),
                "new-volume" | "image" if volume.size.is_none() => Some("size"),
                _ => None,
            };
            // unknown values are not known to be missing yet
            let unknown = missing
                .and_then(|name| block.field(name))
                .map(Dynamic::is_unknown)
                .unwrap_or(false);
            if let Some(name) = missing.filter(|_| !unknown) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Missing {}", name),
                        format!("volume source '{}' requires {}", volume.source, name),
                    )
                    .with_attribute(path.attribute(name)),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        match self.create_instance(&ctx, data, &request.planned_state).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(e) => {
                let (new_state, diagnostics) = e.into_response(request.planned_state);
                CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
                private: request.private,
                deferred: None,
            };
        };

        let location = cloud_location(&request.current_state);
        let id = required_string(&request.current_state, "id");
        let (project_id, region_id, id) = match (location, id) {
            (Ok((p, r)), Ok(id)) => (p, r, id),
            (Err(diag), _) | (_, Err(diag)) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                    private: request.private,
                    deferred: None,
                }
            }
        };

        match data.client.cloud().instances(project_id, region_id).get(&id).await {
            Ok(instance) => {
                let mut new_state = request.current_state.clone();
                apply_instance(&mut new_state, &instance);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(instance_id = %id, "instance not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read instance", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        match self
            .update_instance(&ctx, data, &request.prior_state, &request.planned_state)
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(e) => {
                let (new_state, diagnostics) = e.into_response(request.prior_state);
                UpdateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let prior = &request.prior_state;
        let result = match (
            cloud_location(prior),
            required_string(prior, "id"),
            resolve_timeouts(prior, DEFAULT_TIMEOUTS),
        ) {
            (Ok((project_id, region_id)), Ok(id), Ok(timeouts)) => {
                let api = data.client.cloud().instances(project_id, region_id);
                self.delete_instance(&ctx, api, data, &id, timeouts.delete)
                    .await
            }
            (Err(diag), _, _) | (_, Err(diag), _) | (_, _, Err(diag)) => Err(diag),
        };

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }

    fn as_modify_plan(&self) -> Option<&dyn ResourceWithModifyPlan> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for InstanceResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        ConfigureResourceResponse {
            diagnostics: configure_provider_data(request.provider_data, &mut self.provider_data),
        }
    }
}

#[async_trait]
impl ResourceWithModifyPlan for InstanceResource {
    /// Volumes and interfaces are create-time only
    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        let mut requires_replace = vec![];
        if !request.prior_state.is_null() && !request.planned_state.is_null() {
            for block in ["volume", "interface"] {
                let path = AttributePath::new(block);
                let prior = request.prior_state.get(&path).unwrap_or(&Dynamic::Null);
                let planned = request.planned_state.get(&path).unwrap_or(&Dynamic::Null);
                // imported state never carries these blocks
                if is_absent(prior) {
                    continue;
                }
                if !planned.contains_unknown() && !values_equal(prior, planned) {
                    requires_replace.push(path);
                }
            }
        }

        ModifyPlanResponse {
            planned_state: request.planned_state,
            requires_replace,
            planned_private: request.prior_private,
            diagnostics: vec![],
        }
    }
}

fn is_absent(value: &Dynamic) -> bool {
    match value {
        Dynamic::Null => true,
        Dynamic::List(items) => items.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl ResourceWithImportState for InstanceResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_cloud_id(&ctx, &request)
    }
}

#[cfg(test)]
#[path = "./instance_test.rs"]
mod instance_test;
