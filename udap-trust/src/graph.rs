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

use std::collections::{BTreeMap, BTreeSet};

use bherror::traits::{ErrorContext as _, PropagateError as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use udap_x5chain::{pem_certificate_thumbprint, X509Trust};

use crate::{
    Anchor, AnchorId, Certification, CertificationId, Community, CommunityId, CommunitySelector,
    Error, NewAnchor, NewCommunity, ReadMode, Result, TieredClient, TieredClientId,
    TieredClientRegistration,
};

/// An immutable view of the whole trust graph.
///
/// Entities are kept in id order and all list queries return them ordered by id.  The two
/// association tables are plain sets of id pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustGraph {
    pub(crate) communities: BTreeMap<CommunityId, Community>,
    pub(crate) anchors: BTreeMap<AnchorId, Anchor>,
    pub(crate) certifications: BTreeMap<CertificationId, Certification>,
    pub(crate) community_certifications: BTreeSet<(CommunityId, CertificationId)>,
    pub(crate) anchor_certifications: BTreeSet<(AnchorId, CertificationId)>,
    pub(crate) tiered_clients: BTreeMap<TieredClientId, TieredClient>,
    pub(crate) sequences: IdSequences,
}

/// The last id handed out for each entity kind.
///
/// Ids are never reused, not even after the entity holding the highest id is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdSequences {
    /// Last community id.
    #[serde(default)]
    pub community: CommunityId,
    /// Last anchor id.
    #[serde(default)]
    pub anchor: AnchorId,
    /// Last certification id.
    #[serde(default)]
    pub certification: CertificationId,
    /// Last tiered client id.
    #[serde(default)]
    pub tiered_client: TieredClientId,
}

impl IdSequences {
    /// Raise every sequence to at least the highest id present in `graph`.
    pub(crate) fn cover(self, graph: &TrustGraph) -> Self {
        fn highest<V>(rows: &BTreeMap<i64, V>) -> i64 {
            rows.keys().next_back().copied().unwrap_or_default()
        }

        Self {
            community: self.community.max(highest(&graph.communities)),
            anchor: self.anchor.max(highest(&graph.anchors)),
            certification: self.certification.max(highest(&graph.certifications)),
            tiered_client: self.tiered_client.max(highest(&graph.tiered_clients)),
        }
    }
}

impl TrustGraph {
    /// All communities visible in `mode`.
    pub fn communities(&self, mode: ReadMode) -> impl Iterator<Item = &Community> {
        self.communities
            .values()
            .filter(move |community| mode.includes(community))
    }

    /// The community picked by `selector`, regardless of its enabled flag.
    pub fn community(&self, selector: &CommunitySelector) -> Option<&Community> {
        match selector {
            CommunitySelector::Id(id) => self.communities.get(id),
            CommunitySelector::Name(_) => self
                .communities
                .values()
                .find(|community| selector.matches(community)),
        }
    }

    /// The community marked as default, if any.
    pub fn default_community(&self) -> Option<&Community> {
        self.communities
            .values()
            .find(|community| community.is_default)
    }

    /// The anchor with the given id.
    pub fn anchor(&self, id: AnchorId) -> Option<&Anchor> {
        self.anchors.get(&id)
    }

    /// Every anchor of the community, active or not.
    pub fn anchors(&self, community_id: CommunityId) -> impl Iterator<Item = &Anchor> {
        self.anchors
            .values()
            .filter(move |anchor| anchor.community_id == community_id)
    }

    /// The anchors of an enabled community which are active at `now`.
    pub fn active_anchors_at(
        &self,
        community_id: CommunityId,
        now: DateTime<Utc>,
    ) -> Vec<&Anchor> {
        match self.communities.get(&community_id) {
            Some(community) if community.enabled => self
                .anchors(community_id)
                .filter(|anchor| anchor.is_active_at(now))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The trust store made of the anchors returned by [`Self::active_anchors_at`].
    pub fn trusted_anchors_at(
        &self,
        community_id: CommunityId,
        now: DateTime<Utc>,
    ) -> Result<X509Trust> {
        let anchors = self.active_anchors_at(community_id, now);

        X509Trust::from_pem_certificates(anchors.iter().map(|anchor| anchor.certificate.as_str()))
            .with_err(|| Error::InvalidRecord)
            .ctx(|| format!("anchors of community {community_id} are not valid PEM"))
    }

    /// The certifications associated with the community.
    pub fn certifications(&self, community_id: CommunityId) -> Vec<&Certification> {
        self.community_certifications
            .range((community_id, CertificationId::MIN)..=(community_id, CertificationId::MAX))
            .filter_map(|(_, certification_id)| self.certifications.get(certification_id))
            .collect()
    }

    /// The certifications associated with the anchor.
    pub fn anchor_certifications(&self, anchor_id: AnchorId) -> Vec<&Certification> {
        self.anchor_certifications
            .range((anchor_id, CertificationId::MIN)..=(anchor_id, CertificationId::MAX))
            .filter_map(|(_, certification_id)| self.certifications.get(certification_id))
            .collect()
    }

    /// Look up an anchor by the SHA-256 thumbprint of its certificate.
    ///
    /// The comparison ignores the case of the hex digits.
    pub fn find_anchor_by_thumbprint(&self, thumbprint: &str) -> Option<&Anchor> {
        self.anchors
            .values()
            .find(|anchor| anchor.thumbprint.eq_ignore_ascii_case(thumbprint))
    }

    /// The tiered clients registered in the community.
    pub fn tiered_clients(&self, community_id: CommunityId) -> impl Iterator<Item = &TieredClient> {
        self.tiered_clients
            .values()
            .filter(move |client| client.community_id == community_id)
    }

    /// The enabled tiered client `client_id` of an enabled community.
    pub fn resolve_tiered_client(
        &self,
        community_id: CommunityId,
        client_id: &str,
    ) -> Option<&TieredClient> {
        if !self.communities.get(&community_id)?.enabled {
            return None;
        }

        self.tiered_clients(community_id)
            .find(|client| client.enabled && client.client_id == client_id)
    }

    /// Check every invariant of the graph.
    ///
    /// - at most one community is the default,
    /// - community and certification names are unique,
    /// - anchors, tiered clients and associations only refer to existing entities.
    pub fn validate(&self) -> Result<()> {
        let defaults = self
            .communities
            .values()
            .filter(|community| community.is_default)
            .count();
        if defaults > 1 {
            return Err(bherror::Error::root(Error::ConflictingDefaultCommunity)
                .ctx(format!("{defaults} communities are marked as default")));
        }

        ensure_unique_names(self.communities.values().map(|c| c.name.as_str()))?;
        ensure_unique_names(self.certifications.values().map(|c| c.name.as_str()))?;

        for anchor in self.anchors.values() {
            self.ensure_community(anchor.community_id)
                .ctx(|| format!("anchor {}", anchor.id))?;
        }

        for client in self.tiered_clients.values() {
            self.ensure_community(client.community_id)
                .ctx(|| format!("tiered client {}", client.id))?;
        }

        for (community_id, certification_id) in &self.community_certifications {
            self.ensure_community(*community_id)?;
            self.ensure_certification(*certification_id)?;
        }

        for (anchor_id, certification_id) in &self.anchor_certifications {
            self.ensure_anchor(*anchor_id)?;
            self.ensure_certification(*certification_id)?;
        }

        Ok(())
    }

    pub(crate) fn insert_community(&mut self, new: NewCommunity) -> Result<Community> {
        self.ensure_community_name_free(&new.name)?;

        if new.is_default {
            self.ensure_no_other_default(None)?;
        }

        let id = next_id(&mut self.sequences.community, "community")?;
        let community = Community {
            id,
            name: new.name,
            enabled: new.enabled,
            is_default: new.is_default,
        };
        self.communities.insert(community.id, community.clone());

        Ok(community)
    }

    pub(crate) fn remove_community(&mut self, id: CommunityId) -> Result<Community> {
        let community = self
            .communities
            .remove(&id)
            .ok_or_else(|| bherror::Error::root(Error::UnknownCommunity(id)))?;

        let anchor_ids: Vec<AnchorId> = self.anchors(id).map(|anchor| anchor.id).collect();
        for anchor_id in anchor_ids {
            self.remove_anchor(anchor_id)?;
        }

        self.community_certifications
            .retain(|(community_id, _)| *community_id != id);
        self.tiered_clients
            .retain(|_, client| client.community_id != id);

        Ok(community)
    }

    pub(crate) fn set_community_enabled(
        &mut self,
        id: CommunityId,
        enabled: bool,
    ) -> Result<Community> {
        let community = self.community_mut(id)?;
        community.enabled = enabled;

        Ok(community.clone())
    }

    pub(crate) fn set_default_community(&mut self, id: CommunityId) -> Result<Community> {
        self.ensure_community(id)?;
        self.ensure_no_other_default(Some(id))?;

        let community = self.community_mut(id)?;
        community.is_default = true;

        Ok(community.clone())
    }

    pub(crate) fn clear_default_community(&mut self) -> Option<CommunityId> {
        let community = self
            .communities
            .values_mut()
            .find(|community| community.is_default)?;
        community.is_default = false;

        Some(community.id)
    }

    pub(crate) fn insert_anchor(&mut self, new: NewAnchor) -> Result<Anchor> {
        self.ensure_community(new.community_id)?;

        let thumbprint = pem_certificate_thumbprint(&new.certificate)
            .with_err(|| Error::InvalidRecord)
            .ctx(|| format!("certificate of anchor {:?}", new.name))?;

        let id = next_id(&mut self.sequences.anchor, "anchor")?;
        let anchor = Anchor {
            id,
            community_id: new.community_id,
            name: new.name,
            certificate: new.certificate,
            thumbprint,
            enabled: new.enabled,
            begin_date: new.begin_date,
            end_date: new.end_date,
        };
        self.anchors.insert(anchor.id, anchor.clone());

        Ok(anchor)
    }

    pub(crate) fn remove_anchor(&mut self, id: AnchorId) -> Result<Anchor> {
        let anchor = self
            .anchors
            .remove(&id)
            .ok_or_else(|| bherror::Error::root(Error::UnknownAnchor(id)))?;

        self.anchor_certifications
            .retain(|(anchor_id, _)| *anchor_id != id);

        Ok(anchor)
    }

    pub(crate) fn set_anchor_enabled(&mut self, id: AnchorId, enabled: bool) -> Result<Anchor> {
        let anchor = self
            .anchors
            .get_mut(&id)
            .ok_or_else(|| bherror::Error::root(Error::UnknownAnchor(id)))?;
        anchor.enabled = enabled;

        Ok(anchor.clone())
    }

    pub(crate) fn insert_certification(&mut self, name: String) -> Result<Certification> {
        if self.certifications.values().any(|c| c.name == name) {
            return Err(bherror::Error::root(Error::DuplicateName(name)));
        }

        let id = next_id(&mut self.sequences.certification, "certification")?;
        let certification = Certification {
            id,
            name,
        };
        self.certifications
            .insert(certification.id, certification.clone());

        Ok(certification)
    }

    pub(crate) fn remove_certification(&mut self, id: CertificationId) -> Result<Certification> {
        let certification = self
            .certifications
            .remove(&id)
            .ok_or_else(|| bherror::Error::root(Error::UnknownCertification(id)))?;

        self.community_certifications
            .retain(|(_, certification_id)| *certification_id != id);
        self.anchor_certifications
            .retain(|(_, certification_id)| *certification_id != id);

        Ok(certification)
    }

    pub(crate) fn associate_community_certification(
        &mut self,
        community_id: CommunityId,
        certification_id: CertificationId,
    ) -> Result<bool> {
        self.ensure_community(community_id)?;
        self.ensure_certification(certification_id)?;

        Ok(self
            .community_certifications
            .insert((community_id, certification_id)))
    }

    pub(crate) fn dissociate_community_certification(
        &mut self,
        community_id: CommunityId,
        certification_id: CertificationId,
    ) -> Result<bool> {
        self.ensure_community(community_id)?;
        self.ensure_certification(certification_id)?;

        Ok(self
            .community_certifications
            .remove(&(community_id, certification_id)))
    }

    pub(crate) fn associate_anchor_certification(
        &mut self,
        anchor_id: AnchorId,
        certification_id: CertificationId,
    ) -> Result<bool> {
        self.ensure_anchor(anchor_id)?;
        self.ensure_certification(certification_id)?;

        Ok(self
            .anchor_certifications
            .insert((anchor_id, certification_id)))
    }

    pub(crate) fn dissociate_anchor_certification(
        &mut self,
        anchor_id: AnchorId,
        certification_id: CertificationId,
    ) -> Result<bool> {
        self.ensure_anchor(anchor_id)?;
        self.ensure_certification(certification_id)?;

        Ok(self
            .anchor_certifications
            .remove(&(anchor_id, certification_id)))
    }

    pub(crate) fn upsert_tiered_client(
        &mut self,
        registration: TieredClientRegistration,
    ) -> Result<TieredClient> {
        self.ensure_community(registration.community_id)?;

        let existing = self
            .tiered_clients(registration.community_id)
            .find(|client| client.client_id == registration.client_id)
            .map(|client| client.id);
        let id = match existing {
            Some(id) => id,
            None => next_id(&mut self.sequences.tiered_client, "tiered client")?,
        };

        let client = registration.into_tiered_client(id);
        self.tiered_clients.insert(id, client.clone());

        Ok(client)
    }

    pub(crate) fn remove_tiered_client(&mut self, id: TieredClientId) -> Result<TieredClient> {
        self.tiered_clients
            .remove(&id)
            .ok_or_else(|| bherror::Error::root(Error::UnknownTieredClient(id)))
    }

    fn community_mut(&mut self, id: CommunityId) -> Result<&mut Community> {
        self.communities
            .get_mut(&id)
            .ok_or_else(|| bherror::Error::root(Error::UnknownCommunity(id)))
    }

    fn ensure_community(&self, id: CommunityId) -> Result<()> {
        if !self.communities.contains_key(&id) {
            return Err(bherror::Error::root(Error::UnknownCommunity(id)));
        }
        Ok(())
    }

    fn ensure_anchor(&self, id: AnchorId) -> Result<()> {
        if !self.anchors.contains_key(&id) {
            return Err(bherror::Error::root(Error::UnknownAnchor(id)));
        }
        Ok(())
    }

    fn ensure_certification(&self, id: CertificationId) -> Result<()> {
        if !self.certifications.contains_key(&id) {
            return Err(bherror::Error::root(Error::UnknownCertification(id)));
        }
        Ok(())
    }

    fn ensure_community_name_free(&self, name: &str) -> Result<()> {
        if self.communities.values().any(|c| c.name == name) {
            return Err(bherror::Error::root(Error::DuplicateName(name.to_owned())));
        }
        Ok(())
    }

    /// Fails if a community other than `except` is already the default.
    fn ensure_no_other_default(&self, except: Option<CommunityId>) -> Result<()> {
        match self.default_community() {
            Some(current) if Some(current.id) != except => {
                Err(bherror::Error::root(Error::ConflictingDefaultCommunity)
                    .ctx(format!("community {} is the default", current.id)))
            }
            _ => Ok(()),
        }
    }
}

fn next_id(last: &mut i64, kind: &str) -> Result<i64> {
    let id = last
        .checked_add(1)
        .ok_or_else(|| bherror::Error::root(Error::InvalidRecord))
        .ctx(|| format!("{kind} ids are exhausted"))?;
    *last = id;

    Ok(id)
}

fn ensure_unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(bherror::Error::root(Error::DuplicateName(name.to_owned())));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration;
    use udap_x5chain::{Builder, KeyAlgorithmFamily};

    use super::*;

    fn anchor_pem(common_name: &str) -> String {
        let anchor = Builder::generate_anchor(KeyAlgorithmFamily::Ec, common_name).unwrap();
        String::from_utf8(anchor.certificate().to_pem().unwrap()).unwrap()
    }

    fn graph_with_community() -> (TrustGraph, Community) {
        let mut graph = TrustGraph::default();
        let community = graph
            .insert_community(NewCommunity::new("udap://community1"))
            .unwrap();
        (graph, community)
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut graph = TrustGraph::default();

        let first = graph.insert_community(NewCommunity::new("a")).unwrap();
        let second = graph.insert_community(NewCommunity::new("b")).unwrap();

        assert_eq!((first.id, second.id), (1, 2));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut graph = TrustGraph::default();
        graph.insert_community(NewCommunity::new("a")).unwrap();
        let b = graph.insert_community(NewCommunity::new("b")).unwrap();
        graph.remove_community(b.id).unwrap();

        let c = graph.insert_community(NewCommunity::new("c")).unwrap();

        assert_eq!(c.id, 3);
        assert_eq!(graph.sequences.community, 3);
    }

    #[test]
    fn test_exhausted_ids() {
        let mut graph = TrustGraph::default();
        graph.sequences.certification = i64::MAX;

        let err = graph.insert_certification("cert".to_owned()).unwrap_err();

        assert_matches!(err.error, Error::InvalidRecord);
        assert_eq!(graph.sequences.certification, i64::MAX);
        assert!(graph.certifications.is_empty());
    }

    #[test]
    fn test_second_default_is_rejected() {
        let mut graph = TrustGraph::default();
        graph
            .insert_community(NewCommunity::new("a").as_default())
            .unwrap();
        let b = graph.insert_community(NewCommunity::new("b")).unwrap();

        let err = graph
            .insert_community(NewCommunity::new("c").as_default())
            .unwrap_err();
        assert_matches!(err.error, Error::ConflictingDefaultCommunity);

        let err = graph.set_default_community(b.id).unwrap_err();
        assert_matches!(err.error, Error::ConflictingDefaultCommunity);

        // re-setting the current default is fine
        graph.set_default_community(1).unwrap();
        assert_eq!(graph.default_community().unwrap().id, 1);
    }

    #[test]
    fn test_duplicate_names() {
        let (mut graph, community) = graph_with_community();

        let err = graph
            .insert_community(NewCommunity::new(community.name.clone()))
            .unwrap_err();
        assert_eq!(err.error, Error::DuplicateName(community.name));

        graph.insert_certification("cert".to_owned()).unwrap();
        let err = graph.insert_certification("cert".to_owned()).unwrap_err();
        assert_eq!(err.error, Error::DuplicateName("cert".to_owned()));
    }

    #[test]
    fn test_active_anchors() {
        let (mut graph, community) = graph_with_community();
        let now = Utc::now();
        let day = Duration::days(1);

        let active = graph
            .insert_anchor(NewAnchor::new(community.id, "active", anchor_pem("a")))
            .unwrap();
        let rollover = graph
            .insert_anchor(
                NewAnchor::new(community.id, "rollover", anchor_pem("b"))
                    .valid_between(Some(now - day), Some(now + day)),
            )
            .unwrap();
        graph
            .insert_anchor(
                NewAnchor::new(community.id, "expired", anchor_pem("c"))
                    .valid_between(None, Some(now - day)),
            )
            .unwrap();
        graph
            .insert_anchor(NewAnchor::new(community.id, "disabled", anchor_pem("d")).disabled())
            .unwrap();

        let anchors = graph.active_anchors_at(community.id, now);
        assert_eq!(anchors, vec![&active, &rollover]);

        let trust = graph.trusted_anchors_at(community.id, now).unwrap();
        assert_eq!(trust.certificates().len(), 2);

        graph.set_community_enabled(community.id, false).unwrap();
        assert!(graph.active_anchors_at(community.id, now).is_empty());
        assert!(graph.trusted_anchors_at(community.id, now).unwrap().is_empty());

        assert!(graph.active_anchors_at(42, now).is_empty());
    }

    #[test]
    fn test_anchor_thumbprint() {
        let (mut graph, community) = graph_with_community();
        let pem = anchor_pem("anchor");

        let anchor = graph
            .insert_anchor(NewAnchor::new(community.id, "anchor", pem.clone()))
            .unwrap();

        assert_eq!(anchor.thumbprint, pem_certificate_thumbprint(&pem).unwrap());
        assert_eq!(
            graph.find_anchor_by_thumbprint(&anchor.thumbprint.to_uppercase()),
            Some(&anchor)
        );
        assert_eq!(graph.find_anchor_by_thumbprint("00"), None);
    }

    #[test]
    fn test_anchor_requires_certificate_and_community() {
        let (mut graph, community) = graph_with_community();

        let err = graph
            .insert_anchor(NewAnchor::new(community.id, "bad", "not a certificate"))
            .unwrap_err();
        assert_matches!(err.error, Error::InvalidRecord);

        let err = graph
            .insert_anchor(NewAnchor::new(7, "orphan", anchor_pem("orphan")))
            .unwrap_err();
        assert_eq!(err.error, Error::UnknownCommunity(7));
    }

    #[test]
    fn test_certifications_through_associations() {
        let (mut graph, community) = graph_with_community();
        let first = graph.insert_certification("first".to_owned()).unwrap();
        let second = graph.insert_certification("second".to_owned()).unwrap();
        graph.insert_certification("unused".to_owned()).unwrap();

        assert!(graph
            .associate_community_certification(community.id, second.id)
            .unwrap());
        assert!(graph
            .associate_community_certification(community.id, first.id)
            .unwrap());
        // already associated
        assert!(!graph
            .associate_community_certification(community.id, first.id)
            .unwrap());

        assert_eq!(graph.certifications(community.id), vec![&first, &second]);

        assert!(graph
            .dissociate_community_certification(community.id, first.id)
            .unwrap());
        assert_eq!(graph.certifications(community.id), vec![&second]);

        let err = graph
            .associate_community_certification(community.id, 99)
            .unwrap_err();
        assert_eq!(err.error, Error::UnknownCertification(99));
    }

    #[test]
    fn test_removals_cascade() {
        let (mut graph, community) = graph_with_community();
        let anchor = graph
            .insert_anchor(NewAnchor::new(community.id, "anchor", anchor_pem("a")))
            .unwrap();
        let certification = graph.insert_certification("cert".to_owned()).unwrap();
        graph
            .associate_community_certification(community.id, certification.id)
            .unwrap();
        graph
            .associate_anchor_certification(anchor.id, certification.id)
            .unwrap();
        assert_eq!(graph.anchor_certifications(anchor.id), vec![&certification]);

        graph.remove_certification(certification.id).unwrap();
        assert!(graph.certifications(community.id).is_empty());
        assert!(graph.anchor_certifications(anchor.id).is_empty());

        graph.remove_community(community.id).unwrap();
        assert_eq!(graph.anchor(anchor.id), None);
        assert_eq!(graph.communities(ReadMode::Administrative).count(), 0);
        graph.validate().unwrap();

        let err = graph.remove_community(community.id).unwrap_err();
        assert_eq!(err.error, Error::UnknownCommunity(community.id));
    }

    #[test]
    fn test_tiered_client_upsert_and_resolve() {
        let (mut graph, community) = graph_with_community();
        let registration = TieredClientRegistration {
            client_name: "IdP client".to_owned(),
            client_id: "client-1".to_owned(),
            idp_base_url: "https://idp.example.com".to_owned(),
            redirect_uri: "https://server.example.com/redirect".to_owned(),
            client_uri_san: "https://server.example.com".to_owned(),
            community_id: community.id,
            enabled: true,
            token_endpoint: "https://idp.example.com/token".to_owned(),
        };

        let created = graph.upsert_tiered_client(registration.clone()).unwrap();
        let updated = graph
            .upsert_tiered_client(TieredClientRegistration {
                token_endpoint: "https://idp.example.com/v2/token".to_owned(),
                ..registration.clone()
            })
            .unwrap();

        assert_eq!(created.id, updated.id);
        assert_eq!(graph.tiered_clients(community.id).count(), 1);
        assert_eq!(
            graph
                .resolve_tiered_client(community.id, "client-1")
                .unwrap()
                .token_endpoint,
            "https://idp.example.com/v2/token"
        );
        assert_eq!(graph.resolve_tiered_client(community.id, "client-2"), None);

        graph.set_community_enabled(community.id, false).unwrap();
        assert_eq!(graph.resolve_tiered_client(community.id, "client-1"), None);

        graph.remove_tiered_client(created.id).unwrap();
        let err = graph.remove_tiered_client(created.id).unwrap_err();
        assert_eq!(err.error, Error::UnknownTieredClient(created.id));
    }

    #[test]
    fn test_community_lookup() {
        let (mut graph, community) = graph_with_community();
        let disabled = graph
            .insert_community(NewCommunity::new("udap://disabled").disabled())
            .unwrap();

        assert_eq!(
            graph.community(&CommunitySelector::Id(community.id)),
            Some(&community)
        );
        assert_eq!(
            graph.community(&CommunitySelector::parse("udap://disabled")),
            Some(&disabled)
        );
        assert_eq!(graph.community(&CommunitySelector::Id(9)), None);

        let discovered: Vec<_> = graph.communities(ReadMode::Discovery).collect();
        assert_eq!(discovered, vec![&community]);
        assert_eq!(graph.communities(ReadMode::Administrative).count(), 2);
    }

    #[test]
    fn test_validate_detects_broken_references() {
        let (mut graph, community) = graph_with_community();
        graph.community_certifications.insert((community.id, 5));

        let err = graph.validate().unwrap_err();
        assert_eq!(err.error, Error::UnknownCertification(5));
    }
}
