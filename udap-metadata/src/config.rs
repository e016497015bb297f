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

use std::path::Path;

use bh_uri_utils::UriPathExtensions as _;
use bherror::traits::{ErrorContext as _, ForeignError as _, PropagateError as _};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use udap_jws::SigningAlgorithm;

use crate::{Error, Result};

/// Lifetime of the `signed_metadata` JWT when not configured, one hour.
pub const DEFAULT_SIGNED_METADATA_LIFETIME_SECS: u64 = 60 * 60;

/// Upper bound of the `signed_metadata` lifetime allowed by UDAP, one year.
pub const MAX_SIGNED_METADATA_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

/// Static part of the discovery metadata, shared by every community.
///
/// Every member has a UDAP conformant default, so a configuration file only needs to list what
/// differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerMetadataConfig {
    /// Values of `udap_versions_supported`.
    pub udap_versions_supported: Vec<String>,
    /// Values of `udap_profiles_supported`.
    pub udap_profiles_supported: Vec<String>,
    /// Values of `udap_authorization_extensions_supported`.
    pub udap_authorization_extensions_supported: Vec<String>,
    /// Values of `udap_authorization_extensions_required`, omitted from the metadata when empty.
    pub udap_authorization_extensions_required: Vec<String>,
    /// Values of `grant_types_supported`.
    pub grant_types_supported: Vec<String>,
    /// Values of `scopes_supported`.
    pub scopes_supported: Vec<String>,
    /// Values of `token_endpoint_auth_methods_supported`.
    pub token_endpoint_auth_methods_supported: Vec<String>,
    /// Values of `token_endpoint_auth_signing_alg_values_supported`.
    pub token_endpoint_auth_signing_alg_values_supported: Vec<SigningAlgorithm>,
    /// Values of `registration_endpoint_jwt_signing_alg_values_supported`.
    pub registration_endpoint_jwt_signing_alg_values_supported: Vec<SigningAlgorithm>,
    /// Path of the authorization endpoint, relative to the base URL.
    pub authorization_endpoint_path: String,
    /// Path of the token endpoint, relative to the base URL.
    pub token_endpoint_path: String,
    /// Path of the registration endpoint, relative to the base URL.
    pub registration_endpoint_path: String,
    /// Lifetime of the `signed_metadata` JWT, in seconds.
    pub signed_metadata_lifetime_secs: u64,
}

impl Default for ServerMetadataConfig {
    fn default() -> Self {
        Self {
            udap_versions_supported: strings(&["1"]),
            udap_profiles_supported: strings(&["udap_dcr", "udap_authn", "udap_authz", "udap_to"]),
            udap_authorization_extensions_supported: strings(&["hl7-b2b"]),
            udap_authorization_extensions_required: Vec::new(),
            grant_types_supported: strings(&[
                "authorization_code",
                "refresh_token",
                "client_credentials",
            ]),
            scopes_supported: strings(&[
                "openid",
                "system/*.read",
                "user/*.read",
                "patient/*.read",
            ]),
            token_endpoint_auth_methods_supported: strings(&["private_key_jwt"]),
            token_endpoint_auth_signing_alg_values_supported: SigningAlgorithm::ALL.to_vec(),
            registration_endpoint_jwt_signing_alg_values_supported: SigningAlgorithm::ALL.to_vec(),
            authorization_endpoint_path: "/connect/authorize".to_owned(),
            token_endpoint_path: "/connect/token".to_owned(),
            registration_endpoint_path: "/connect/register".to_owned(),
            signed_metadata_lifetime_secs: DEFAULT_SIGNED_METADATA_LIFETIME_SECS,
        }
    }
}

/// Absolute endpoint URLs derived from a base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// The authorization endpoint.
    pub authorization: Url,
    /// The token endpoint.
    pub token: Url,
    /// The registration endpoint.
    pub registration: Url,
}

impl ServerMetadataConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .foreign_err(|| Error::InvalidConfiguration)
            .ctx(|| "server metadata configuration is not valid JSON")?;

        config.validate()?;

        Ok(config)
    }

    /// Read and parse the JSON configuration document at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .foreign_err(|| Error::InvalidConfiguration)
            .ctx(|| format!("unable to read {}", path.display()))?;

        Self::from_json(&json)
    }

    /// Check the values which can not be expressed by the types alone.
    pub fn validate(&self) -> Result<()> {
        if self.signed_metadata_lifetime_secs == 0
            || self.signed_metadata_lifetime_secs > MAX_SIGNED_METADATA_LIFETIME_SECS
        {
            return Err(bherror::Error::root(Error::InvalidConfiguration).ctx(format!(
                "signed metadata lifetime of {}s is out of range",
                self.signed_metadata_lifetime_secs
            )));
        }

        if self.token_endpoint_auth_signing_alg_values_supported.is_empty() {
            return Err(bherror::Error::root(Error::InvalidConfiguration)
                .ctx("no token endpoint signing algorithm is supported"));
        }

        // the endpoint paths are checked against a placeholder base URL
        let placeholder =
            Url::parse("https://localhost").foreign_err(|| Error::InvalidConfiguration)?;
        self.endpoints(&placeholder)?;

        Ok(())
    }

    /// The endpoint URLs of a server published at `base_url`.
    pub fn endpoints(&self, base_url: &Url) -> Result<Endpoints> {
        Ok(Endpoints {
            authorization: endpoint(base_url, &self.authorization_endpoint_path)?,
            token: endpoint(base_url, &self.token_endpoint_path)?,
            registration: endpoint(base_url, &self.registration_endpoint_path)?,
        })
    }
}

fn endpoint(base_url: &Url, path: &str) -> Result<Url> {
    base_url
        .clone()
        .add_path_suffix(path)
        .with_err(|| Error::InvalidConfiguration)
        .ctx(|| format!("invalid endpoint path {path:?}"))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}
