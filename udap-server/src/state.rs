// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{sync::Arc, time::Duration};

use bh_uri_utils::UriPathExtensions as _;
use bherror::traits::{ErrorContext as _, PropagateError as _};
use reqwest::Url;
use udap_metadata::{InMemorySigningKeyStore, MetadataBuilder, ServerMetadataConfig};
use udap_trust::{JsonFileRepository, TrustGraphStore};

use crate::{Error, Result, ServerConfig};

/// Path of the discovery endpoint, relative to the base URL.
pub const WELL_KNOWN_UDAP_PATH: &str = "/.well-known/udap";

/// Shared state of the HTTP handlers.
pub struct AppState {
    /// Builds and signs the discovery documents.
    pub metadata: MetadataBuilder<InMemorySigningKeyStore>,
    /// The public base URL of the server.
    pub base_url: Url,
    /// The public URL of the discovery endpoint.
    pub metadata_url: Url,
    /// Deadline of a single signing operation.
    pub signing_timeout: Duration,
}

impl AppState {
    /// Assemble the state from already loaded parts.
    pub fn new(
        store: Arc<TrustGraphStore>,
        metadata_config: ServerMetadataConfig,
        keys: InMemorySigningKeyStore,
        base_url: Url,
        signing_timeout: Duration,
    ) -> Result<Self> {
        let metadata_url = base_url
            .clone()
            .add_path_suffix(WELL_KNOWN_UDAP_PATH)
            .with_err(|| Error::Configuration)
            .ctx(|| format!("unable to derive the discovery URL from {base_url}"))?;

        Ok(Self {
            metadata: MetadataBuilder::new(store, metadata_config, keys),
            base_url,
            metadata_url,
            signing_timeout,
        })
    }

    /// Load the trust graph, the metadata configuration and the signing keys named by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let store = match &config.trust_graph_path {
            Some(path) => TrustGraphStore::load(&JsonFileRepository::new(path))
                .with_err(|| Error::Configuration)
                .ctx(|| format!("unable to load the trust graph from {}", path.display()))?,
            None => {
                tracing::warn!("No trust graph configured, starting with an empty trust graph");
                TrustGraphStore::new()
            }
        };

        let metadata_config = match &config.metadata_config_path {
            Some(path) => ServerMetadataConfig::from_file(path)
                .with_err(|| Error::Configuration)
                .ctx(|| format!("unable to load the metadata from {}", path.display()))?,
            None => ServerMetadataConfig::default(),
        };

        let keys = match &config.signing_keys_path {
            Some(path) => InMemorySigningKeyStore::from_config_file(path)
                .with_err(|| Error::Configuration)
                .ctx(|| format!("unable to load the signing keys from {}", path.display()))?,
            None => {
                tracing::warn!("No signing keys configured, metadata can not be signed");
                InMemorySigningKeyStore::new()
            }
        };

        Self::new(
            Arc::new(store),
            metadata_config,
            keys,
            config.base_url.clone(),
            config.signing_timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use assert_matches::assert_matches;
    use tracing::Level;
    use udap_trust::{NewCommunity, TrustGraphRepository as _};

    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            port: 8080,
            base_url: Url::parse("https://fhirlabs.net/fhir/r4/").unwrap(),
            trust_graph_path: None,
            metadata_config_path: None,
            signing_keys_path: None,
            signing_timeout: Duration::from_secs(1),
            log_level: Level::INFO,
        }
    }

    #[test]
    fn test_metadata_url() {
        let state = AppState::from_config(&config()).unwrap();

        assert_eq!(
            state.metadata_url.as_str(),
            "https://fhirlabs.net/fhir/r4/.well-known/udap"
        );
        assert!(state.metadata.communities().is_empty());
    }

    #[test]
    fn test_loads_trust_graph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust-graph.json");
        let store = TrustGraphStore::new();
        store
            .add_community(NewCommunity::new("udap://fhirlabs.net").as_default())
            .unwrap();
        store.save(&JsonFileRepository::new(&path)).unwrap();

        let state = AppState::from_config(&ServerConfig {
            trust_graph_path: Some(path.clone()),
            ..config()
        })
        .unwrap();

        assert_eq!(state.metadata.communities().len(), 1);
        assert!(JsonFileRepository::new(&path).load().is_ok());
    }

    #[test]
    fn test_missing_files() {
        for config in [
            ServerConfig {
                trust_graph_path: Some(PathBuf::from("/nonexistent/trust-graph.json")),
                ..config()
            },
            ServerConfig {
                metadata_config_path: Some(PathBuf::from("/nonexistent/metadata.json")),
                ..config()
            },
            ServerConfig {
                signing_keys_path: Some(PathBuf::from("/nonexistent/signing-keys.json")),
                ..config()
            },
        ] {
            let err = AppState::from_config(&config).err().unwrap();
            assert_matches!(err.error, Error::Configuration);
        }
    }
}
