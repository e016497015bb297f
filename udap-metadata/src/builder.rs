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

use bherror::traits::{
    ErrorContext as _, ForeignBoxed as _, ForeignError as _, PropagateError as _,
};
use chrono::Utc;
use reqwest::Url;
use udap_jws::{jwt, HasX5Chain, JwtSigner};
use udap_trust::{Community, CommunitySelector, ReadMode, TrustGraph, TrustGraphStore};
use udap_x5chain::JwtX5Chain;

use crate::{
    render_communities_html, CommunitySummary, Error, Result, ServerMetadataConfig,
    SignedMetadataClaims, SignedMetadataHeader, SigningKeyStore, UdapMetadata,
};

/// The _Metadata Builder & Signer_.
///
/// Every call reads the current snapshot of the trust graph; nothing is cached between calls.
pub struct MetadataBuilder<K> {
    store: Arc<TrustGraphStore>,
    config: ServerMetadataConfig,
    keys: K,
}

impl<K: SigningKeyStore> MetadataBuilder<K> {
    /// Create a builder over `store`, signing with keys from `keys`.
    pub fn new(store: Arc<TrustGraphStore>, config: ServerMetadataConfig, keys: K) -> Self {
        Self {
            store,
            config,
            keys,
        }
    }

    /// The static metadata configuration.
    pub fn config(&self) -> &ServerMetadataConfig {
        &self.config
    }

    /// The trust graph store.
    pub fn store(&self) -> &Arc<TrustGraphStore> {
        &self.store
    }

    /// Build the metadata of a community without signing it.
    ///
    /// With a `selector` the selected community is used, otherwise the default community.
    /// Returns `Ok(None)` if that community does not exist or is disabled; an unknown selector
    /// never falls back to the default community.
    pub fn unsigned_metadata(
        &self,
        selector: Option<&CommunitySelector>,
        base_url: &Url,
    ) -> Result<Option<UdapMetadata>> {
        Ok(self
            .prepare(selector, base_url)?
            .map(|(_, metadata)| metadata))
    }

    /// Build the metadata of a community, including its `signed_metadata`.
    ///
    /// Community resolution works as in [`Self::unsigned_metadata`].  Acquiring the signing key
    /// and signing must complete within `timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::SigningKeyUnavailable`] if the community has no usable signing key,
    /// - [`Error::SigningFailed`] if the signing backend fails,
    /// - [`Error::SigningCancelled`] if the deadline passes first,
    /// - [`Error::InvalidConfiguration`] if the endpoints can not be derived from `base_url`.
    ///
    /// No document is returned on error; the signing key is released on every path.
    pub async fn metadata(
        &self,
        selector: Option<&CommunitySelector>,
        base_url: &Url,
        timeout: Duration,
    ) -> Result<Option<UdapMetadata>> {
        let Some((community, mut metadata)) = self.prepare(selector, base_url)? else {
            return Ok(None);
        };

        let claims = self.claims(base_url, &metadata);
        let signed = match tokio::time::timeout(timeout, self.sign(&community, claims)).await {
            Ok(signed) => signed,
            Err(_) => Err(bherror::Error::root(Error::SigningCancelled)
                .ctx(format!("signing took longer than {timeout:?}"))),
        };

        match signed {
            Ok(signed) => {
                metadata.signed_metadata = Some(signed);
                tracing::debug!(community_id = community.id, "Signed community metadata");
                Ok(Some(metadata))
            }
            Err(error) => {
                tracing::error!(
                    community_id = community.id,
                    community = %community.name,
                    error = %error.error,
                    "Unable to sign community metadata"
                );
                Err(error)
            }
        }
    }

    /// The enabled communities, ordered by id.
    pub fn communities(&self) -> Vec<CommunitySummary> {
        self.store
            .get_communities(ReadMode::Discovery)
            .iter()
            .map(CommunitySummary::from)
            .collect()
    }

    /// An HTML listing of [`Self::communities`], each linking to
    /// `metadata_url?community=<name>`.
    pub fn communities_html(&self, metadata_url: &Url) -> String {
        render_communities_html(&self.communities(), metadata_url)
    }

    fn prepare(
        &self,
        selector: Option<&CommunitySelector>,
        base_url: &Url,
    ) -> Result<Option<(Community, UdapMetadata)>> {
        let graph = self.store.snapshot();

        let Some(community) = resolve_community(&graph, selector) else {
            tracing::info!(
                community = %selector.map_or_else(|| "<default>".to_owned(), ToString::to_string),
                "No metadata for unknown or disabled community"
            );
            return Ok(None);
        };

        let endpoints = self.config.endpoints(base_url)?;
        let certifications = graph.certifications(community.id);
        let metadata = UdapMetadata::new(&self.config, &endpoints, &certifications);

        Ok(Some((community.clone(), metadata)))
    }

    fn claims(&self, base_url: &Url, metadata: &UdapMetadata) -> SignedMetadataClaims {
        let iat = Utc::now().timestamp();
        // the lifetime is validated to be at most a year
        let lifetime = i64::try_from(self.config.signed_metadata_lifetime_secs).unwrap_or(i64::MAX);

        SignedMetadataClaims {
            iss: base_url.to_string(),
            sub: base_url.to_string(),
            iat,
            exp: iat.saturating_add(lifetime),
            jti: hex::encode(rand::random::<[u8; 16]>()),
            authorization_endpoint: metadata.authorization_endpoint.clone(),
            token_endpoint: metadata.token_endpoint.clone(),
            registration_endpoint: metadata.registration_endpoint.clone(),
        }
    }

    /// Signing runs on the blocking pool.  When the timeout fires first, the result is
    /// discarded and the key is released once the signer returns.
    async fn sign(&self, community: &Community, claims: SignedMetadataClaims) -> Result<String> {
        let handle = self.keys.acquire(community).await?;

        tokio::task::spawn_blocking(move || sign_metadata(&*handle, claims))
            .await
            .foreign_err(|| Error::SigningFailed)
            .ctx(|| "signing task did not complete")?
    }
}

/// Pick the community whose metadata is served.
///
/// An explicit selector is never replaced by the default community, and disabled communities
/// are never picked.
pub fn resolve_community<'a>(
    graph: &'a TrustGraph,
    selector: Option<&CommunitySelector>,
) -> Option<&'a Community> {
    let community = match selector {
        Some(selector) => graph.community(selector),
        None => graph.default_community(),
    }?;

    community.enabled.then_some(community)
}

/// Sign the `signed_metadata` JWT, publishing the chain of `signer` in the `x5c` header.
pub fn sign_metadata<S>(signer: &S, claims: SignedMetadataClaims) -> Result<String>
where
    S: JwtSigner + HasX5Chain + ?Sized,
{
    let x5c = JwtX5Chain::try_from(signer.x5chain()).with_err(|| Error::SigningFailed)?;
    let header = SignedMetadataHeader {
        alg: signer.algorithm(),
        x5c,
    };

    let token: jwt::Token<_, _, jwt::token::Signed> = signer
        .sign_jwt(jwt::Token::new(header, claims))
        .foreign_boxed_err(|| Error::SigningFailed)
        .ctx(|| "unable to sign metadata")?;

    Ok(token.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use assert_matches::assert_matches;
    use serde_json::Value;
    use tokio::sync::Mutex;
    use udap_jws::{
        BoxError, JwtVerifier as _, PkeySigner, PkeySignerWithChain, PkeyVerifier, Signer,
        SigningAlgorithm,
    };
    use udap_trust::{NewAnchor, NewCommunity};
    use udap_x5chain::{resolve_keys, Builder, KeyAlgorithmFamily, PublicJwk, X5Chain};

    use super::*;
    use crate::{InMemorySigningKeyStore, SigningKeyHandle};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn base_url() -> Url {
        Url::parse("https://fhirlabs.net/fhir/r4").unwrap()
    }

    fn server_signer(algorithm: SigningAlgorithm) -> PkeySignerWithChain {
        let anchor = Builder::generate_anchor(algorithm.key_family(), "anchor").unwrap();
        let signer = PkeySigner::generate(algorithm).unwrap();
        let x5chain = anchor
            .generate_x5chain(signer.private_key(), "server", None)
            .unwrap();

        PkeySignerWithChain::new(signer, x5chain).unwrap()
    }

    /// The trust graph of a single default community with one anchor and a signing key.
    fn test_builder() -> MetadataBuilder<InMemorySigningKeyStore> {
        let store = Arc::new(TrustGraphStore::new());
        let community = store
            .add_community(NewCommunity::new("TestCommunity").as_default())
            .unwrap();
        assert_eq!(community.id, 1);

        let anchor = Builder::generate_anchor(KeyAlgorithmFamily::Rsa, "anchor").unwrap();
        let pem = String::from_utf8(anchor.certificate().to_pem().unwrap()).unwrap();
        store
            .add_anchor(NewAnchor::new(community.id, "anchor", pem))
            .unwrap();

        let mut keys = InMemorySigningKeyStore::new();
        keys.insert("TestCommunity", server_signer(SigningAlgorithm::Es256));

        MetadataBuilder::new(store, ServerMetadataConfig::default(), keys)
    }

    fn as_json(metadata: &UdapMetadata) -> Value {
        serde_json::to_value(metadata).unwrap()
    }

    #[tokio::test]
    async fn test_certifications_required_follows_supported() {
        let builder = test_builder();

        let metadata = builder.metadata(None, &base_url(), TIMEOUT).await.unwrap().unwrap();
        let json = as_json(&metadata);
        assert_eq!(json["udap_certifications_supported"], serde_json::json!([]));
        assert!(json.get("udap_certifications_required").is_none());

        let store = builder.store();
        let certification = store.add_certification("HL7v2").unwrap();
        store
            .associate_community_certification(1, certification.id)
            .unwrap();

        let metadata = builder.metadata(None, &base_url(), TIMEOUT).await.unwrap().unwrap();
        assert_eq!(metadata.udap_certifications_supported, ["HL7v2"]);
        assert_eq!(
            metadata.udap_certifications_required,
            Some(vec!["HL7v2".to_owned()])
        );
    }

    #[tokio::test]
    async fn test_signed_metadata_verifies() {
        let builder = test_builder();

        let metadata = builder
            .metadata(
                Some(&CommunitySelector::parse("TestCommunity")),
                &base_url(),
                TIMEOUT,
            )
            .await
            .unwrap()
            .unwrap();
        let token = metadata.signed_metadata.as_deref().unwrap();

        let keys = resolve_keys(token).unwrap();
        assert_eq!(keys.len(), 1);
        let jwk: PublicJwk = keys[0].to_jwk().unwrap();

        let verified: jwt::Token<SignedMetadataHeader, SignedMetadataClaims, jwt::token::Verified> =
            PkeyVerifier::new(SigningAlgorithm::Es256)
                .verify_jwt_signature(token, &jwk)
                .unwrap();

        let claims = verified.claims();
        assert_eq!(claims.iss, "https://fhirlabs.net/fhir/r4");
        assert_eq!(claims.sub, claims.iss);
        assert_eq!(claims.token_endpoint, metadata.token_endpoint);
        assert_eq!(claims.registration_endpoint, metadata.registration_endpoint);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.jti.len(), 32);
        assert_eq!(verified.header().alg, SigningAlgorithm::Es256);
    }

    #[tokio::test]
    async fn test_unknown_community_is_not_found() {
        let builder = test_builder();

        for selector in ["NoSuchCommunity", "42"] {
            let metadata = builder
                .metadata(Some(&CommunitySelector::parse(selector)), &base_url(), TIMEOUT)
                .await
                .unwrap();
            assert_eq!(metadata, None, "selector: {selector}");
        }
    }

    #[tokio::test]
    async fn test_disabled_community_is_not_found() {
        let builder = test_builder();
        builder.store().set_community_enabled(1, false).unwrap();

        assert_eq!(
            builder.metadata(None, &base_url(), TIMEOUT).await.unwrap(),
            None
        );
        assert_eq!(
            builder
                .unsigned_metadata(Some(&CommunitySelector::Id(1)), &base_url())
                .unwrap(),
            None
        );
        assert!(builder.communities().is_empty());
    }

    #[tokio::test]
    async fn test_no_default_community() {
        let builder = test_builder();
        builder.store().clear_default_community().unwrap();

        assert_eq!(
            builder.metadata(None, &base_url(), TIMEOUT).await.unwrap(),
            None
        );
        assert!(builder
            .unsigned_metadata(Some(&CommunitySelector::Id(1)), &base_url())
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_missing_signing_key() {
        let builder = test_builder();
        builder
            .store()
            .add_community(NewCommunity::new("udap://unsigned"))
            .unwrap();

        let err = builder
            .metadata(
                Some(&CommunitySelector::parse("udap://unsigned")),
                &base_url(),
                TIMEOUT,
            )
            .await
            .unwrap_err();
        assert_matches!(err.error, Error::SigningKeyUnavailable);
    }

    #[tokio::test]
    async fn test_signing_times_out_and_releases() {
        let builder = test_builder();
        let community = builder.store().default_community().unwrap();

        let held = builder.keys.acquire(&community).await.unwrap();
        let err = builder
            .metadata(None, &base_url(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_matches!(err.error, Error::SigningCancelled);

        drop(held);
        let metadata = builder.metadata(None, &base_url(), TIMEOUT).await.unwrap();
        assert!(metadata.unwrap().signed_metadata.is_some());
    }

    struct FailingSigner {
        x5chain: X5Chain,
        delay: Duration,
    }

    impl Signer for FailingSigner {
        fn algorithm(&self) -> SigningAlgorithm {
            SigningAlgorithm::Es256
        }

        fn sign(&self, _message: &[u8]) -> std::result::Result<Vec<u8>, BoxError> {
            std::thread::sleep(self.delay);
            Err("signing backend is offline".into())
        }

        fn public_jwk(&self) -> std::result::Result<PublicJwk, BoxError> {
            Err("signing backend is offline".into())
        }
    }

    impl HasX5Chain for FailingSigner {
        fn x5chain(&self) -> &X5Chain {
            &self.x5chain
        }
    }

    struct FailingKeyStore(Arc<Mutex<FailingSigner>>);

    impl SigningKeyStore for FailingKeyStore {
        type Signer = FailingSigner;

        fn acquire(
            &self,
            community: &Community,
        ) -> impl Future<Output = Result<SigningKeyHandle<FailingSigner>>> + Send {
            let key = self.0.clone();
            let name = community.name.clone();

            async move { Ok(SigningKeyHandle::new(name, key.lock_owned().await)) }
        }
    }

    fn failing_builder(
        delay: Duration,
    ) -> (MetadataBuilder<FailingKeyStore>, Arc<Mutex<FailingSigner>>) {
        let signer = server_signer(SigningAlgorithm::Es256);
        let key = Arc::new(Mutex::new(FailingSigner {
            x5chain: signer.x5chain().clone(),
            delay,
        }));
        let store = test_builder().store().clone();
        let builder = MetadataBuilder::new(
            store,
            ServerMetadataConfig::default(),
            FailingKeyStore(key.clone()),
        );

        (builder, key)
    }

    #[tokio::test]
    async fn test_signing_failure() {
        let (builder, key) = failing_builder(Duration::ZERO);

        let err = builder
            .metadata(None, &base_url(), TIMEOUT)
            .await
            .unwrap_err();

        assert_matches!(err.error, Error::SigningFailed);
        assert!(key.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_slow_signer_is_cancelled() {
        let (builder, key) = failing_builder(Duration::from_millis(500));

        let err = builder
            .metadata(None, &base_url(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_matches!(err.error, Error::SigningCancelled);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(key.try_lock().is_ok());
    }

    #[test]
    fn test_communities_projection() {
        let builder = test_builder();
        builder
            .store()
            .add_community(NewCommunity::new("udap://disabled").disabled())
            .unwrap();
        builder
            .store()
            .add_community(NewCommunity::new("udap://second"))
            .unwrap();

        let communities = builder.communities();

        assert_eq!(
            communities,
            [
                CommunitySummary {
                    id: 1,
                    name: "TestCommunity".to_owned()
                },
                CommunitySummary {
                    id: 3,
                    name: "udap://second".to_owned()
                },
            ]
        );

        let html = builder.communities_html(
            &Url::parse("https://fhirlabs.net/fhir/r4/.well-known/udap").unwrap(),
        );
        assert!(html.contains("?community=TestCommunity\">TestCommunity</a>"));
        assert!(!html.contains("disabled"));
    }
}
