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

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::{
    Anchor, AnchorId, Certification, CertificationId, Community, CommunityId, CommunitySelector,
    NewAnchor, NewCommunity, ReadMode, Result, TieredClient, TieredClientId,
    TieredClientRegistration, TrustGraph,
};

/// The _Trust Graph Store_.
///
/// Holds the current [`TrustGraph`] snapshot.  Reads are lock-free apart from cloning the
/// snapshot [`Arc`]; writes are serialized and copy-on-write.
#[derive(Debug, Default)]
pub struct TrustGraphStore {
    current: RwLock<Arc<TrustGraph>>,
    writer: Mutex<()>,
}

impl TrustGraphStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding `graph`, after checking its invariants.
    pub fn from_graph(graph: TrustGraph) -> Result<Self> {
        graph.validate()?;

        Ok(Self {
            current: RwLock::new(Arc::new(graph)),
            writer: Mutex::new(()),
        })
    }

    /// The current snapshot.
    ///
    /// The snapshot never changes; later mutations publish a new one.
    pub fn snapshot(&self) -> Arc<TrustGraph> {
        // the lock only guards a pointer swap, so a poisoned lock still holds a whole snapshot
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `mutate` to a copy of the current graph and publish the result.
    ///
    /// Nothing is published if `mutate` fails or the resulting graph breaks an invariant.
    fn update<T>(&self, mutate: impl FnOnce(&mut TrustGraph) -> Result<T>) -> Result<T> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut graph = TrustGraph::clone(&self.snapshot());
        let value = mutate(&mut graph)?;
        graph.validate()?;

        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(graph);

        Ok(value)
    }

    /// All communities visible in `mode`, ordered by id.
    pub fn get_communities(&self, mode: ReadMode) -> Vec<Community> {
        self.snapshot().communities(mode).cloned().collect()
    }

    /// The community picked by `selector`, regardless of its enabled flag.
    pub fn get_community(&self, selector: &CommunitySelector) -> Option<Community> {
        self.snapshot().community(selector).cloned()
    }

    /// The default community, if one is set.
    pub fn default_community(&self) -> Option<Community> {
        self.snapshot().default_community().cloned()
    }

    /// The anchors of the community which are active now.
    ///
    /// See [`TrustGraph::active_anchors_at`].
    pub fn get_anchors(&self, community_id: CommunityId) -> Vec<Anchor> {
        self.get_anchors_at(community_id, Utc::now())
    }

    /// The anchors of the community which are active at `now`.
    pub fn get_anchors_at(&self, community_id: CommunityId, now: DateTime<Utc>) -> Vec<Anchor> {
        self.snapshot()
            .active_anchors_at(community_id, now)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The certifications associated with the community.
    pub fn get_certifications(&self, community_id: CommunityId) -> Vec<Certification> {
        self.snapshot()
            .certifications(community_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The certifications associated with the anchor.
    pub fn get_anchor_certifications(&self, anchor_id: AnchorId) -> Vec<Certification> {
        self.snapshot()
            .anchor_certifications(anchor_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Look up an anchor by certificate thumbprint.
    pub fn find_anchor_by_thumbprint(&self, thumbprint: &str) -> Option<Anchor> {
        self.snapshot().find_anchor_by_thumbprint(thumbprint).cloned()
    }

    /// The enabled tiered client `client_id` of an enabled community.
    pub fn resolve_tiered_client(
        &self,
        community_id: CommunityId,
        client_id: &str,
    ) -> Option<TieredClient> {
        self.snapshot()
            .resolve_tiered_client(community_id, client_id)
            .cloned()
    }

    /// Add a community.
    ///
    /// Fails with [`Error::ConflictingDefaultCommunity`][crate::Error::ConflictingDefaultCommunity]
    /// if it is flagged default while another community already is.
    pub fn add_community(&self, new: NewCommunity) -> Result<Community> {
        let community = self.update(|graph| graph.insert_community(new))?;
        tracing::info!(
            community_id = community.id,
            name = %community.name,
            is_default = community.is_default,
            "Added community"
        );
        Ok(community)
    }

    /// Remove a community together with its anchors, tiered clients and associations.
    pub fn remove_community(&self, id: CommunityId) -> Result<Community> {
        let community = self.update(|graph| graph.remove_community(id))?;
        tracing::info!(community_id = id, name = %community.name, "Removed community");
        Ok(community)
    }

    /// Enable or disable a community.
    pub fn set_community_enabled(&self, id: CommunityId, enabled: bool) -> Result<Community> {
        let community = self.update(|graph| graph.set_community_enabled(id, enabled))?;
        tracing::info!(community_id = id, enabled, "Changed community state");
        Ok(community)
    }

    /// Make the community the default one.
    ///
    /// Setting the current default again is a no-op; setting a second default fails with
    /// [`Error::ConflictingDefaultCommunity`][crate::Error::ConflictingDefaultCommunity] and
    /// commits nothing.  Use [`Self::clear_default_community`] first to move the default.
    pub fn set_default_community(&self, id: CommunityId) -> Result<Community> {
        let community = self.update(|graph| graph.set_default_community(id))?;
        tracing::info!(community_id = id, "Set default community");
        Ok(community)
    }

    /// Unmark the default community, returning its id if there was one.
    pub fn clear_default_community(&self) -> Result<Option<CommunityId>> {
        let cleared = self.update(|graph| Ok(graph.clear_default_community()))?;
        if let Some(community_id) = cleared {
            tracing::info!(community_id, "Cleared default community");
        }
        Ok(cleared)
    }

    /// Add a trust anchor to a community.
    pub fn add_anchor(&self, new: NewAnchor) -> Result<Anchor> {
        let anchor = self.update(|graph| graph.insert_anchor(new))?;
        tracing::info!(
            anchor_id = anchor.id,
            community_id = anchor.community_id,
            thumbprint = %anchor.thumbprint,
            "Added anchor"
        );
        Ok(anchor)
    }

    /// Remove an anchor and its certification associations.
    pub fn remove_anchor(&self, id: AnchorId) -> Result<Anchor> {
        let anchor = self.update(|graph| graph.remove_anchor(id))?;
        tracing::info!(anchor_id = id, thumbprint = %anchor.thumbprint, "Removed anchor");
        Ok(anchor)
    }

    /// Enable or disable an anchor.
    pub fn set_anchor_enabled(&self, id: AnchorId, enabled: bool) -> Result<Anchor> {
        let anchor = self.update(|graph| graph.set_anchor_enabled(id, enabled))?;
        tracing::info!(anchor_id = id, enabled, "Changed anchor state");
        Ok(anchor)
    }

    /// Add a certification.
    pub fn add_certification(&self, name: impl Into<String>) -> Result<Certification> {
        let name = name.into();
        let certification = self.update(|graph| graph.insert_certification(name))?;
        tracing::info!(
            certification_id = certification.id,
            name = %certification.name,
            "Added certification"
        );
        Ok(certification)
    }

    /// Remove a certification and every association to it.
    pub fn remove_certification(&self, id: CertificationId) -> Result<Certification> {
        let certification = self.update(|graph| graph.remove_certification(id))?;
        tracing::info!(certification_id = id, "Removed certification");
        Ok(certification)
    }

    /// Associate a certification with a community.
    ///
    /// Returns `false` if the association already existed.
    pub fn associate_community_certification(
        &self,
        community_id: CommunityId,
        certification_id: CertificationId,
    ) -> Result<bool> {
        self.update(|graph| graph.associate_community_certification(community_id, certification_id))
    }

    /// Remove the association between a certification and a community.
    ///
    /// Returns `false` if there was no such association.
    pub fn dissociate_community_certification(
        &self,
        community_id: CommunityId,
        certification_id: CertificationId,
    ) -> Result<bool> {
        self.update(|graph| {
            graph.dissociate_community_certification(community_id, certification_id)
        })
    }

    /// Associate a certification with an anchor.
    pub fn associate_anchor_certification(
        &self,
        anchor_id: AnchorId,
        certification_id: CertificationId,
    ) -> Result<bool> {
        self.update(|graph| graph.associate_anchor_certification(anchor_id, certification_id))
    }

    /// Remove the association between a certification and an anchor.
    pub fn dissociate_anchor_certification(
        &self,
        anchor_id: AnchorId,
        certification_id: CertificationId,
    ) -> Result<bool> {
        self.update(|graph| graph.dissociate_anchor_certification(anchor_id, certification_id))
    }

    /// Create or update the tiered client keyed by `(community_id, client_id)`.
    pub fn upsert_tiered_client(
        &self,
        registration: TieredClientRegistration,
    ) -> Result<TieredClient> {
        let client = self.update(|graph| graph.upsert_tiered_client(registration))?;
        tracing::info!(
            tiered_client_id = client.id,
            community_id = client.community_id,
            client_id = %client.client_id,
            "Stored tiered client"
        );
        Ok(client)
    }

    /// Remove a tiered client.
    pub fn remove_tiered_client(&self, id: TieredClientId) -> Result<TieredClient> {
        let client = self.update(|graph| graph.remove_tiered_client(id))?;
        tracing::info!(tiered_client_id = id, "Removed tiered client");
        Ok(client)
    }
}
