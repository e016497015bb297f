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

use std::collections::{btree_map::Entry, BTreeMap};

use bherror::traits::{ErrorContext as _, PropagateError as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use udap_x5chain::pem_certificate_thumbprint;

use crate::{
    Anchor, AnchorId, Certification, CertificationId, Community, CommunityId, Error, IdSequences,
    Result, TieredClient, TieredClientId, TrustGraph,
};

/// The persisted shape of the whole [`TrustGraph`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustGraphRecords {
    /// Community rows.
    #[serde(default)]
    pub communities: Vec<CommunityEntity>,
    /// Anchor rows.
    #[serde(default)]
    pub anchors: Vec<AnchorEntity>,
    /// Certification rows.
    #[serde(default)]
    pub certifications: Vec<CertificationEntity>,
    /// Community to certification association rows.
    #[serde(default)]
    pub community_certifications: Vec<CommunityCertificationEntity>,
    /// Anchor to certification association rows.
    #[serde(default)]
    pub anchor_certifications: Vec<AnchorCertificationEntity>,
    /// Tiered client rows.
    #[serde(default)]
    pub tiered_clients: Vec<TieredClientEntity>,
    /// Last id handed out per entity kind.
    #[serde(default)]
    pub sequences: IdSequences,
}

/// Persisted [`Community`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityEntity {
    /// Primary key.
    pub id: CommunityId,
    /// Unique name.
    pub name: String,
    /// Enabled flag.
    pub enabled: bool,
    /// Default flag.
    #[serde(default)]
    pub default: bool,
}

/// Persisted [`Anchor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorEntity {
    /// Primary key.
    pub id: AnchorId,
    /// Foreign key of the owning community.
    pub community_id: CommunityId,
    /// Display name.
    pub name: String,
    /// PEM encoded certificate.
    pub x509_certificate: String,
    /// Hex SHA-256 thumbprint of the certificate.
    pub thumbprint: String,
    /// Enabled flag.
    pub enabled: bool,
    /// Start of the validity window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_date: Option<DateTime<Utc>>,
    /// End of the validity window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

/// Persisted [`Certification`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationEntity {
    /// Primary key.
    pub id: CertificationId,
    /// Unique name.
    pub name: String,
}

/// Persisted community to certification association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityCertificationEntity {
    /// Foreign key of the community.
    pub community_id: CommunityId,
    /// Foreign key of the certification.
    pub certification_id: CertificationId,
}

/// Persisted anchor to certification association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorCertificationEntity {
    /// Foreign key of the anchor.
    pub anchor_id: AnchorId,
    /// Foreign key of the certification.
    pub certification_id: CertificationId,
}

/// Persisted [`TieredClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredClientEntity {
    /// Primary key.
    pub id: TieredClientId,
    /// Human-readable client name.
    pub client_name: String,
    /// Client id issued by the identity provider.
    pub client_id: String,
    /// Base URL of the identity provider.
    pub idp_base_url: String,
    /// Registered redirect URI.
    pub redirect_uri: String,
    /// URI SAN of the client certificate.
    pub client_uri_san: String,
    /// Foreign key of the community.
    pub community_id: CommunityId,
    /// Enabled flag.
    pub enabled: bool,
    /// Token endpoint of the identity provider.
    pub token_endpoint: String,
}

impl From<&Community> for CommunityEntity {
    fn from(community: &Community) -> Self {
        Self {
            id: community.id,
            name: community.name.clone(),
            enabled: community.enabled,
            default: community.is_default,
        }
    }
}

impl TryFrom<CommunityEntity> for Community {
    type Error = bherror::Error<Error>;

    fn try_from(entity: CommunityEntity) -> Result<Self> {
        ensure_not_blank(&entity.name, || format!("community {} has no name", entity.id))?;

        Ok(Self {
            id: entity.id,
            name: entity.name,
            enabled: entity.enabled,
            is_default: entity.default,
        })
    }
}

impl From<&Anchor> for AnchorEntity {
    fn from(anchor: &Anchor) -> Self {
        Self {
            id: anchor.id,
            community_id: anchor.community_id,
            name: anchor.name.clone(),
            x509_certificate: anchor.certificate.clone(),
            thumbprint: anchor.thumbprint.clone(),
            enabled: anchor.enabled,
            begin_date: anchor.begin_date,
            end_date: anchor.end_date,
        }
    }
}

impl TryFrom<AnchorEntity> for Anchor {
    type Error = bherror::Error<Error>;

    /// Fails if the certificate is not valid PEM or does not match the stored thumbprint.
    fn try_from(entity: AnchorEntity) -> Result<Self> {
        let thumbprint = pem_certificate_thumbprint(&entity.x509_certificate)
            .with_err(|| Error::InvalidRecord)
            .ctx(|| format!("anchor {} holds an invalid certificate", entity.id))?;

        if !thumbprint.eq_ignore_ascii_case(&entity.thumbprint) {
            return Err(bherror::Error::root(Error::InvalidRecord).ctx(format!(
                "thumbprint of anchor {} does not match its certificate",
                entity.id
            )));
        }

        Ok(Self {
            id: entity.id,
            community_id: entity.community_id,
            name: entity.name,
            certificate: entity.x509_certificate,
            thumbprint,
            enabled: entity.enabled,
            begin_date: entity.begin_date,
            end_date: entity.end_date,
        })
    }
}

impl From<&Certification> for CertificationEntity {
    fn from(certification: &Certification) -> Self {
        Self {
            id: certification.id,
            name: certification.name.clone(),
        }
    }
}

impl TryFrom<CertificationEntity> for Certification {
    type Error = bherror::Error<Error>;

    fn try_from(entity: CertificationEntity) -> Result<Self> {
        ensure_not_blank(&entity.name, || {
            format!("certification {} has no name", entity.id)
        })?;

        Ok(Self {
            id: entity.id,
            name: entity.name,
        })
    }
}

impl From<&TieredClient> for TieredClientEntity {
    fn from(client: &TieredClient) -> Self {
        Self {
            id: client.id,
            client_name: client.client_name.clone(),
            client_id: client.client_id.clone(),
            idp_base_url: client.idp_base_url.clone(),
            redirect_uri: client.redirect_uri.clone(),
            client_uri_san: client.client_uri_san.clone(),
            community_id: client.community_id,
            enabled: client.enabled,
            token_endpoint: client.token_endpoint.clone(),
        }
    }
}

impl TryFrom<TieredClientEntity> for TieredClient {
    type Error = bherror::Error<Error>;

    fn try_from(entity: TieredClientEntity) -> Result<Self> {
        ensure_not_blank(&entity.client_id, || {
            format!("tiered client {} has no client id", entity.id)
        })?;

        Ok(Self {
            id: entity.id,
            client_name: entity.client_name,
            client_id: entity.client_id,
            idp_base_url: entity.idp_base_url,
            redirect_uri: entity.redirect_uri,
            client_uri_san: entity.client_uri_san,
            community_id: entity.community_id,
            enabled: entity.enabled,
            token_endpoint: entity.token_endpoint,
        })
    }
}

impl From<&TrustGraph> for TrustGraphRecords {
    fn from(graph: &TrustGraph) -> Self {
        Self {
            communities: graph.communities.values().map(Into::into).collect(),
            anchors: graph.anchors.values().map(Into::into).collect(),
            certifications: graph.certifications.values().map(Into::into).collect(),
            community_certifications: graph
                .community_certifications
                .iter()
                .map(|&(community_id, certification_id)| CommunityCertificationEntity {
                    community_id,
                    certification_id,
                })
                .collect(),
            anchor_certifications: graph
                .anchor_certifications
                .iter()
                .map(|&(anchor_id, certification_id)| AnchorCertificationEntity {
                    anchor_id,
                    certification_id,
                })
                .collect(),
            tiered_clients: graph.tiered_clients.values().map(Into::into).collect(),
            sequences: graph.sequences,
        }
    }
}

impl TryFrom<TrustGraphRecords> for TrustGraph {
    type Error = bherror::Error<Error>;

    /// Rebuild the graph, rejecting duplicate primary keys and any broken invariant.
    fn try_from(records: TrustGraphRecords) -> Result<Self> {
        let mut graph = TrustGraph::default();

        for entity in records.communities {
            let community = Community::try_from(entity)?;
            insert_unique(&mut graph.communities, community.id, community, "community")?;
        }
        for entity in records.anchors {
            let anchor = Anchor::try_from(entity)?;
            insert_unique(&mut graph.anchors, anchor.id, anchor, "anchor")?;
        }
        for entity in records.certifications {
            let certification = Certification::try_from(entity)?;
            insert_unique(
                &mut graph.certifications,
                certification.id,
                certification,
                "certification",
            )?;
        }
        for entity in records.tiered_clients {
            let client = TieredClient::try_from(entity)?;
            insert_unique(&mut graph.tiered_clients, client.id, client, "tiered client")?;
        }

        graph.community_certifications = records
            .community_certifications
            .into_iter()
            .map(|row| (row.community_id, row.certification_id))
            .collect();
        graph.anchor_certifications = records
            .anchor_certifications
            .into_iter()
            .map(|row| (row.anchor_id, row.certification_id))
            .collect();
        graph.sequences = records.sequences.cover(&graph);

        graph.validate()?;

        Ok(graph)
    }
}

fn ensure_not_blank(value: &str, message: impl FnOnce() -> String) -> Result<()> {
    if value.trim().is_empty() {
        return Err(bherror::Error::root(Error::InvalidRecord).ctx(message()));
    }
    Ok(())
}

fn insert_unique<V>(
    rows: &mut BTreeMap<i64, V>,
    id: i64,
    value: V,
    kind: &str,
) -> Result<()> {
    if id < 1 {
        return Err(bherror::Error::root(Error::InvalidRecord).ctx(format!("{kind} id {id}")));
    }

    match rows.entry(id) {
        Entry::Vacant(entry) => {
            entry.insert(value);
            Ok(())
        }
        Entry::Occupied(_) => Err(bherror::Error::root(Error::InvalidRecord)
            .ctx(format!("duplicate {kind} id {id}"))),
    }
}
