use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

use crate::api::iam::{InviteUserRequest, UpdateUserRequest, User, UserGroup};
use crate::resources::common::{
    api_error, configure_provider_data, empty_import_response, id_attribute, not_configured,
    numeric_id, optional_i64, optional_string, required_string, set_bool, set_number,
    set_optional_string, set_string, ApplyError,
};

const LANGUAGES: [&str; 5] = ["de", "en", "ru", "zh", "az"];

/// A user invited into the account
#[derive(Default)]
pub struct IamUserResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl IamUserResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// The account to invite into: config, then provider, then the token's own
    async fn resolve_client_id(
        &self,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<i64, Diagnostic> {
        if let Some(id) = optional_i64(planned, "client_id").or(data.client_id) {
            return Ok(id);
        }
        let account = data
            .client
            .iam()
            .me()
            .await
            .map_err(|e| api_error("Failed to look up the current account", &e))?;
        tracing::debug!(client_id = account.id, "resolved account from token");
        Ok(account.id)
    }

    async fn invite(
        &self,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, ApplyError> {
        let client_id = self.resolve_client_id(data, planned).await?;
        let groups = group_ids(planned);
        let Some(&first_group) = groups.first() else {
            return Err(Diagnostic::error("Missing groups", "at least one group is required")
                .with_attribute(AttributePath::new("groups"))
                .into());
        };

        let request = InviteUserRequest {
            client_id,
            email: required_string(planned, "email")?,
            name: optional_string(planned, "name"),
            lang: optional_string(planned, "lang").unwrap_or_else(|| "en".to_string()),
            user_role: UserGroup {
                id: first_group,
                name: None,
            },
        };
        let iam = data.client.iam();
        let invited = iam
            .invite_user(&request)
            .await
            .map_err(|e| api_error("Failed to invite user", &e))?;
        tracing::info!(user_id = invited.user_id, client_id, "user invited");

        let mut state = planned.clone();
        set_string(&mut state, "id", invited.user_id.to_string());
        set_number(&mut state, "client_id", client_id);
        let _ = state.set_list(
            &AttributePath::new("groups"),
            vec![Dynamic::Number(first_group as f64)],
        );

        // an invitation carries a single role; the rest plus profile fields follow
        let update = UpdateUserRequest {
            groups: (groups.len() > 1).then(|| to_groups(&groups)),
            company: optional_string(planned, "company"),
            phone: optional_string(planned, "phone"),
            ..Default::default()
        };
        let needs_update =
            update.groups.is_some() || update.company.is_some() || update.phone.is_some();
        let result = if needs_update {
            iam.update_user(invited.user_id, &update).await
        } else {
            iam.get_user(invited.user_id).await
        };
        let user = result.map_err(|e| {
            ApplyError::partial(api_error("Failed to finish setting up invited user", &e), &state)
        })?;

        apply_user(&mut state, &user);
        Ok(state)
    }

    async fn update_user(
        &self,
        data: &crate::GcoreProviderData,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let user_id = numeric_id(prior)?;
        let changed = |name: &str| optional_string(prior, name) != optional_string(planned, name);
        let changed_string = |name: &str| {
            changed(name).then(|| optional_string(planned, name).unwrap_or_default())
        };
        let groups = group_ids(planned);
        let request = UpdateUserRequest {
            name: changed_string("name"),
            lang: changed_string("lang"),
            groups: (group_ids(prior) != groups).then(|| to_groups(&groups)),
            company: changed_string("company"),
            phone: changed_string("phone"),
        };
        let user = data
            .client
            .iam()
            .update_user(user_id, &request)
            .await
            .map_err(|e| api_error("Failed to update user", &e))?;

        let mut state = planned.clone();
        apply_user(&mut state, &user);
        Ok(state)
    }
}

/// Sorted group ids of the `groups` set
fn group_ids(value: &DynamicValue) -> Vec<i64> {
    let mut ids: Vec<i64> = value
        .get_list(&AttributePath::new("groups"))
        .unwrap_or_default()
        .iter()
        .filter_map(Dynamic::as_i64)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn to_groups(ids: &[i64]) -> Vec<UserGroup> {
    ids.iter().map(|&id| UserGroup { id, name: None }).collect()
}

fn apply_user(state: &mut DynamicValue, user: &User) {
    set_string(state, "email", user.email.clone());
    for (name, value) in [
        ("name", &user.name),
        ("company", &user.company),
        ("phone", &user.phone),
    ] {
        let known = optional_string(state, name).is_some();
        if known || value.as_deref().is_some_and(|v| !v.is_empty()) {
            set_optional_string(state, name, value.clone());
        }
    }
    if let Some(lang) = &user.lang {
        set_string(state, "lang", lang.clone());
    }
    if !user.groups.is_empty() {
        let mut ids: Vec<i64> = user.groups.iter().map(|g| g.id).collect();
        ids.sort_unstable();
        let _ = state.set_list(
            &AttributePath::new("groups"),
            ids.into_iter().map(|id| Dynamic::Number(id as f64)).collect(),
        );
    }
    if let Some(client_id) = user.client {
        set_number(state, "client_id", client_id);
    }
    set_bool(state, "activated", user.activated);
}

#[async_trait]
impl Resource for IamUserResource {
    fn type_name(&self) -> &str {
        "gcore_iam_user"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Invites a user into the account and manages their groups and profile")
            .attribute(id_attribute("User ID"))
            .attribute(
                AttributeBuilder::new("email", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("client_id", AttributeType::Number)
                    .description("Account to invite into. Defaults to the provider's gcore_client_id, then the token's account")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("groups", AttributeType::set(AttributeType::Number))
                    .description("Group (role) ids")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("lang", AttributeType::String)
                    .optional()
                    .computed()
                    .default(StaticDefault::string("en"))
                    .validator(StringOneOfValidator::create(&LANGUAGES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("company", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("phone", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("activated", AttributeType::Bool)
                    .description("Whether the invitation was accepted")
                    .computed()
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        match self.invite(data, &request.planned_state).await {
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

        let user_id = match numeric_id(&request.current_state) {
            Ok(id) => id,
            Err(diag) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                    private: request.private,
                    deferred: None,
                }
            }
        };

        match data.client.iam().get_user(user_id).await {
            Ok(user) if user.deleted => {
                tracing::warn!(user_id, "user was deleted, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Ok(user) => {
                let mut new_state = request.current_state.clone();
                apply_user(&mut new_state, &user);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(user_id, "user not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read user", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        match self
            .update_user(data, &request.prior_state, &request.planned_state)
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    /// Removes the user from the account
    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let ids = numeric_id(&request.prior_state).and_then(|user_id| {
            let client_id = optional_i64(&request.prior_state, "client_id")
                .or(data.client_id)
                .ok_or_else(|| {
                    Diagnostic::error("Missing client_id", "the user's account id is unknown")
                        .with_attribute(AttributePath::new("client_id"))
                })?;
            Ok((client_id, user_id))
        });
        let diagnostics = match ids {
            Ok((client_id, user_id)) => match data.client.iam().delete_user(client_id, user_id).await {
                Ok(()) => vec![],
                Err(e) if e.is_not_found() => vec![],
                Err(e) => vec![api_error("Failed to remove user from account", &e)],
            },
            Err(diag) => vec![diag],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for IamUserResource {
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
impl ResourceWithImportState for IamUserResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = empty_import_response();
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}
