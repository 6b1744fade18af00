//! CDN resources, presets and log upload targets

mod logs_target;
mod preset;
mod resource;

pub use logs_target::LogsUploaderTargetResource;
pub use preset::CdnPresetResource;
pub use resource::CdnResourceResource;
