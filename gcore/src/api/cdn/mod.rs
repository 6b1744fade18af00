//! Gcore CDN API

use crate::api::client::Client;

mod logs_uploader;
mod presets;
mod resources;

pub use logs_uploader::{
    CreateLogsTargetRequest, LogsTarget, LogsTargetsApi, UpdateLogsTargetRequest,
};
pub use presets::{AppliedPreset, PresetsApi};
pub use resources::{CdnResource, CdnResourceRequest, CdnResourcesApi};

pub struct CdnApi<'a> {
    client: &'a Client,
}

impl<'a> CdnApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn resources(&self) -> CdnResourcesApi<'a> {
        CdnResourcesApi::new(self.client)
    }

    pub fn presets(&self) -> PresetsApi<'a> {
        PresetsApi::new(self.client)
    }

    pub fn logs_targets(&self) -> LogsTargetsApi<'a> {
        LogsTargetsApi::new(self.client)
    }
}
