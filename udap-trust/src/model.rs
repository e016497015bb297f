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

use std::fmt;

use chrono::{DateTime, Utc};

/// Identifier of a [`Community`].
pub type CommunityId = i64;
/// Identifier of an [`Anchor`].
pub type AnchorId = i64;
/// Identifier of a [`Certification`].
pub type CertificationId = i64;
/// Identifier of a [`TieredClient`].
pub type TieredClientId = i64;

/// A named trust domain sharing a set of trust anchors and certification requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Community {
    /// Unique identifier.
    pub id: CommunityId,
    /// Unique name, typically a URI such as `udap://fhirlabs.net`.
    pub name: String,
    /// Disabled communities are kept but excluded from discovery and resolution.
    pub enabled: bool,
    /// Whether this community answers discovery requests without a `community` parameter.
    pub is_default: bool,
}

/// Input of [`TrustGraphStore::add_community`][crate::TrustGraphStore::add_community].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommunity {
    /// Name of the community.
    pub name: String,
    /// Initial enabled flag, `true` by default.
    pub enabled: bool,
    /// Initial default flag, `false` by default.
    pub is_default: bool,
}

impl NewCommunity {
    /// An enabled, non-default community called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            is_default: false,
        }
    }

    /// Mark the community as the default one.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Create the community disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A trusted root or intermediate certificate belonging to one community.
///
/// A community may hold several active anchors at once, e.g. during a rollover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Unique identifier.
    pub id: AnchorId,
    /// The owning community.
    pub community_id: CommunityId,
    /// Display name.
    pub name: String,
    /// PEM encoded certificate.
    pub certificate: String,
    /// SHA-256 thumbprint of the DER encoded certificate, as lowercase hex.
    pub thumbprint: String,
    /// Disabled anchors are never returned as active.
    pub enabled: bool,
    /// The anchor is not active before this instant.
    pub begin_date: Option<DateTime<Utc>>,
    /// The anchor is not active from this instant on.
    pub end_date: Option<DateTime<Utc>>,
}

impl Anchor {
    /// Whether the anchor itself is enabled and within its validity window at `now`.
    ///
    /// This does not look at the owning community.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.begin_date.map_or(true, |begin| begin <= now)
            && self.end_date.map_or(true, |end| now < end)
    }
}

/// Input of [`TrustGraphStore::add_anchor`][crate::TrustGraphStore::add_anchor].
///
/// The thumbprint is computed by the store from the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnchor {
    /// The owning community.
    pub community_id: CommunityId,
    /// Display name.
    pub name: String,
    /// PEM encoded certificate.
    pub certificate: String,
    /// Initial enabled flag, `true` by default.
    pub enabled: bool,
    /// Start of the validity window.
    pub begin_date: Option<DateTime<Utc>>,
    /// End of the validity window.
    pub end_date: Option<DateTime<Utc>>,
}

impl NewAnchor {
    /// An enabled anchor without a validity window.
    pub fn new(
        community_id: CommunityId,
        name: impl Into<String>,
        certificate: impl Into<String>,
    ) -> Self {
        Self {
            community_id,
            name: name.into(),
            certificate: certificate.into(),
            enabled: true,
            begin_date: None,
            end_date: None,
        }
    }

    /// Restrict the anchor to the `[begin, end)` window.
    pub fn valid_between(
        mut self,
        begin: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.begin_date = begin;
        self.end_date = end;
        self
    }

    /// Create the anchor disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A named certification program, e.g. a UDAP trust framework profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certification {
    /// Unique identifier.
    pub id: CertificationId,
    /// Unique name.
    pub name: String,
}

/// An upstream identity provider client used for tiered OAuth within a community.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TieredClient {
    /// Unique identifier.
    pub id: TieredClientId,
    /// Human-readable client name.
    pub client_name: String,
    /// The client id issued by the identity provider.
    pub client_id: String,
    /// Base URL of the identity provider.
    pub idp_base_url: String,
    /// Redirect URI registered with the identity provider.
    pub redirect_uri: String,
    /// URI subject alternative name of the client certificate.
    pub client_uri_san: String,
    /// The community the client was registered in.
    pub community_id: CommunityId,
    /// Disabled clients are never resolved.
    pub enabled: bool,
    /// Token endpoint of the identity provider.
    pub token_endpoint: String,
}

/// Input of [`TrustGraphStore::upsert_tiered_client`][crate::TrustGraphStore::upsert_tiered_client].
///
/// A registration is keyed by `(community_id, client_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TieredClientRegistration {
    /// Human-readable client name.
    pub client_name: String,
    /// The client id issued by the identity provider.
    pub client_id: String,
    /// Base URL of the identity provider.
    pub idp_base_url: String,
    /// Redirect URI registered with the identity provider.
    pub redirect_uri: String,
    /// URI subject alternative name of the client certificate.
    pub client_uri_san: String,
    /// The community the client is registered in.
    pub community_id: CommunityId,
    /// Enabled flag.
    pub enabled: bool,
    /// Token endpoint of the identity provider.
    pub token_endpoint: String,
}

impl TieredClientRegistration {
    pub(crate) fn into_tiered_client(self, id: TieredClientId) -> TieredClient {
        TieredClient {
            id,
            client_name: self.client_name,
            client_id: self.client_id,
            idp_base_url: self.idp_base_url,
            redirect_uri: self.redirect_uri,
            client_uri_san: self.client_uri_san,
            community_id: self.community_id,
            enabled: self.enabled,
            token_endpoint: self.token_endpoint,
        }
    }
}

/// Selects a community either by id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommunitySelector {
    /// Select by [`Community::id`].
    Id(CommunityId),
    /// Select by [`Community::name`].
    Name(String),
}

impl CommunitySelector {
    /// Interpret a `community` request parameter.
    ///
    /// A non-empty string of ASCII digits that fits an id selects by id, anything else selects by
    /// name.
    pub fn parse(value: &str) -> Self {
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = value.parse() {
                return Self::Id(id);
            }
        }

        Self::Name(value.to_owned())
    }

    /// Whether `community` is the one selected.
    pub fn matches(&self, community: &Community) -> bool {
        match self {
            Self::Id(id) => community.id == *id,
            Self::Name(name) => community.name == *name,
        }
    }
}

impl From<&str> for CommunitySelector {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl fmt::Display for CommunitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Which communities a read should see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Every stored community, including the disabled ones.
    #[default]
    Administrative,
    /// Only the enabled communities.
    Discovery,
}

impl ReadMode {
    /// Whether `community` is visible in this mode.
    pub fn includes(self, community: &Community) -> bool {
        match self {
            Self::Administrative => true,
            Self::Discovery => community.enabled,
        }
    }
}
