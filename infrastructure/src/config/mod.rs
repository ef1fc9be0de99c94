//! Configuration file loading.
//!
//! Both descriptors are single JSON files, loaded directly with
//! `serde_json` rather than through a layered merge — there's nothing to
//! merge, just one resolved path per descriptor and a fallback chain for
//! finding it.

mod providers_file;
mod server_launch;

pub use providers_file::{load_provider_config, resolve_provider_config_path, ProviderConfigLoadError};
pub use server_launch::{load_server_launch_descriptor, resolve_server_launch_path, ConfigLoadError};
