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

use serde::{Deserialize, Serialize};
use udap_jws::{jwt, SigningAlgorithm};
use udap_trust::{Certification, Community, CommunityId};
use udap_x5chain::JwtX5Chain;

use crate::{Endpoints, ServerMetadataConfig};

/// The UDAP discovery document served at `/.well-known/udap`.
///
/// See [UDAP Server Metadata][1].
///
/// [1]: <https://hl7.org/fhir/us/udap-security/discovery.html#required-udap-metadata>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdapMetadata {
    /// Supported UDAP versions.
    pub udap_versions_supported: Vec<String>,
    /// Supported UDAP profiles.
    pub udap_profiles_supported: Vec<String>,
    /// Supported authorization extension objects.
    pub udap_authorization_extensions_supported: Vec<String>,
    /// Required authorization extension objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udap_authorization_extensions_required: Option<Vec<String>>,
    /// Certifications recognized by the community; always present, possibly empty.
    pub udap_certifications_supported: Vec<String>,
    /// Certifications a client must hold.
    ///
    /// Present only when the community recognizes at least one certification; it is never
    /// serialized as `null` or `[]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udap_certifications_required: Option<Vec<String>>,
    /// Supported OAuth grant types.
    pub grant_types_supported: Vec<String>,
    /// Supported scopes.
    pub scopes_supported: Vec<String>,
    /// The authorization endpoint.
    pub authorization_endpoint: String,
    /// The token endpoint.
    pub token_endpoint: String,
    /// Supported token endpoint client authentication methods.
    pub token_endpoint_auth_methods_supported: Vec<String>,
    /// Algorithms accepted for client assertions.
    pub token_endpoint_auth_signing_alg_values_supported: Vec<SigningAlgorithm>,
    /// The registration endpoint.
    pub registration_endpoint: String,
    /// Algorithms accepted for software statements.
    pub registration_endpoint_jwt_signing_alg_values_supported: Vec<SigningAlgorithm>,
    /// The JWT binding the endpoints to the server certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_metadata: Option<String>,
}

impl UdapMetadata {
    /// Assemble the unsigned metadata of one community.
    pub fn new(
        config: &ServerMetadataConfig,
        endpoints: &Endpoints,
        certifications: &[&Certification],
    ) -> Self {
        let udap_certifications_supported: Vec<String> = certifications
            .iter()
            .map(|certification| certification.name.clone())
            .collect();

        let udap_certifications_required = non_empty(udap_certifications_supported.clone());

        Self {
            udap_versions_supported: config.udap_versions_supported.clone(),
            udap_profiles_supported: config.udap_profiles_supported.clone(),
            udap_authorization_extensions_supported: config
                .udap_authorization_extensions_supported
                .clone(),
            udap_authorization_extensions_required: non_empty(
                config.udap_authorization_extensions_required.clone(),
            ),
            udap_certifications_supported,
            udap_certifications_required,
            grant_types_supported: config.grant_types_supported.clone(),
            scopes_supported: config.scopes_supported.clone(),
            authorization_endpoint: endpoints.authorization.to_string(),
            token_endpoint: endpoints.token.to_string(),
            token_endpoint_auth_methods_supported: config
                .token_endpoint_auth_methods_supported
                .clone(),
            token_endpoint_auth_signing_alg_values_supported: config
                .token_endpoint_auth_signing_alg_values_supported
                .clone(),
            registration_endpoint: endpoints.registration.to_string(),
            registration_endpoint_jwt_signing_alg_values_supported: config
                .registration_endpoint_jwt_signing_alg_values_supported
                .clone(),
            signed_metadata: None,
        }
    }
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

/// Header of the `signed_metadata` JWT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedMetadataHeader {
    /// The signing algorithm.
    pub alg: SigningAlgorithm,
    /// The certificate chain of the signing key, leaf first.
    pub x5c: JwtX5Chain,
}

impl jwt::JoseHeader for SignedMetadataHeader {
    fn algorithm_type(&self) -> jwt::AlgorithmType {
        self.alg.into()
    }
}

/// Claims of the `signed_metadata` JWT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedMetadataClaims {
    /// The base URL of the server.
    pub iss: String,
    /// The base URL of the server, same as `iss`.
    pub sub: String,
    /// Issued at, in seconds since the UNIX epoch.
    pub iat: i64,
    /// Expires at, in seconds since the UNIX epoch.
    pub exp: i64,
    /// Unique token identifier.
    pub jti: String,
    /// The authorization endpoint, same as in the metadata.
    pub authorization_endpoint: String,
    /// The token endpoint, same as in the metadata.
    pub token_endpoint: String,
    /// The registration endpoint, same as in the metadata.
    pub registration_endpoint: String,
}

/// The discovery projection of a [`Community`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunitySummary {
    /// The community id.
    pub id: CommunityId,
    /// The community name.
    pub name: String,
}

impl From<&Community> for CommunitySummary {
    fn from(community: &Community) -> Self {
        Self {
            id: community.id,
            name: community.name.clone(),
        }
    }
}
