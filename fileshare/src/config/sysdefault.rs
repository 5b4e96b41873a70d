//! System default configuration provider
// (c) 2026 fileshare contributors

use super::Configuration;
use figment::{Metadata, Provider, providers::Serialized};

/// Supplies [`Configuration::system_default`] as the lowest configuration layer
pub(super) struct SystemDefault;

impl Provider for SystemDefault {
    fn metadata(&self) -> Metadata {
        Metadata::named("built-in default")
    }

    fn data(
        &self,
    ) -> std::result::Result<
        figment::value::Map<figment::Profile, figment::value::Dict>,
        figment::Error,
    > {
        Serialized::defaults(Configuration::system_default()).data()
    }
}
