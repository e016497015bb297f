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

use std::sync::Arc;

use bherror::traits::{ErrorContext as _, ForeignBoxed as _, PropagateError as _};
use chrono::Utc;
use openssl::x509::X509;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use udap_jws::{jwt, JwtVerifier as _, PkeyVerifier, SigningAlgorithm};
use udap_metadata::resolve_community;
use udap_trust::{Anchor, Community, CommunitySelector, TrustGraphStore};
use udap_x5chain::{
    certificate_thumbprint, decode_protected_header, resolve_keys, JwtX5Chain, X5Chain,
};

use crate::{Error, Result};

/// Protected header of a client assertion or software statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionHeader {
    /// The signing algorithm.
    pub alg: SigningAlgorithm,
    /// The certificate chain of the client, leaf first.
    pub x5c: JwtX5Chain,
}

impl jwt::JoseHeader for AssertionHeader {
    fn algorithm_type(&self) -> jwt::AlgorithmType {
        self.alg.into()
    }
}

/// A client whose assertion verified against an anchor of its community.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedClient {
    /// The community the client authenticated in.
    pub community: Community,
    /// The active anchor the client certificate chain leads to.
    pub anchor: Anchor,
    /// The algorithm of the assertion.
    pub algorithm: SigningAlgorithm,
    /// Subject name of the leaf certificate.
    pub subject_name: String,
    /// Issuer name of the leaf certificate.
    pub issuer_name: String,
    /// SHA-256 thumbprint of the leaf certificate.
    pub thumbprint: String,
    /// The verified claims of the assertion.
    pub claims: Map<String, Value>,
}

/// Authenticates clients by the `x5c` chain of their signed assertions.
///
/// The public key is taken from the leaf certificate of the presented chain; no certificate
/// store other than the anchors of the community takes part.
#[derive(Debug, Clone)]
pub struct ClientAssertionAuthenticator {
    store: Arc<TrustGraphStore>,
}

impl ClientAssertionAuthenticator {
    /// Create an authenticator over the communities of `store`.
    pub fn new(store: Arc<TrustGraphStore>) -> Self {
        Self { store }
    }

    /// Authenticate a compact JWS `assertion` in the selected (or the default) community.
    ///
    /// # Errors
    ///
    /// - [`Error::CommunityNotFound`] if the community does not exist or is disabled,
    /// - [`Error::MalformedAssertion`] if the assertion, its `alg` or its `x5c` can not be used,
    /// - [`Error::InvalidSignature`] if `alg` does not fit the leaf key or the signature does
    ///   not verify,
    /// - [`Error::UntrustedClient`] if the chain does not lead to an active anchor,
    /// - [`Error::TrustGraph`] if an anchor of the community is not a valid certificate.
    pub fn authenticate(
        &self,
        assertion: &str,
        selector: Option<&CommunitySelector>,
    ) -> Result<AuthenticatedClient> {
        let graph = self.store.snapshot();
        let community = resolve_community(&graph, selector)
            .ok_or_else(|| bherror::Error::root(Error::CommunityNotFound))?;

        let keys = resolve_keys(assertion).with_err(|| Error::MalformedAssertion)?;
        let Some(leaf) = keys.first() else {
            return Err(bherror::Error::root(Error::MalformedAssertion)
                .ctx("assertion carries no x5c chain"));
        };

        let algorithm = decode_protected_header(assertion)
            .with_err(|| Error::MalformedAssertion)?
            .get("alg")
            .and_then(Value::as_str)
            .and_then(|alg| alg.parse::<SigningAlgorithm>().ok())
            .ok_or_else(|| bherror::Error::root(Error::MalformedAssertion))
            .ctx(|| "missing or unsupported alg")?;

        if algorithm.key_family() != leaf.algorithm_family() {
            return Err(bherror::Error::root(Error::InvalidSignature).ctx(format!(
                "{algorithm} does not fit the {} leaf key",
                leaf.algorithm_family()
            )));
        }

        let jwk = leaf.to_jwk().with_err(|| Error::MalformedAssertion)?;
        let verified: jwt::Token<AssertionHeader, Map<String, Value>, jwt::token::Verified> =
            PkeyVerifier::new(algorithm)
                .verify_jwt_signature(assertion, &jwk)
                .foreign_boxed_err(|| Error::InvalidSignature)?;

        let chain = X5Chain::try_from(verified.header().x5c.clone())
            .with_err(|| Error::MalformedAssertion)?;
        let anchor = self.trusted_anchor(&graph, community, &chain)?;

        let thumbprint = leaf.thumbprint().with_err(|| Error::MalformedAssertion)?;
        tracing::info!(
            community_id = community.id,
            anchor_id = anchor.id,
            thumbprint = %thumbprint,
            "Authenticated client assertion"
        );

        Ok(AuthenticatedClient {
            community: community.clone(),
            anchor,
            algorithm,
            subject_name: leaf.subject_name(),
            issuer_name: leaf.issuer_name(),
            thumbprint,
            claims: verified.claims().clone(),
        })
    }

    fn trusted_anchor(
        &self,
        graph: &udap_trust::TrustGraph,
        community: &Community,
        chain: &X5Chain,
    ) -> Result<Anchor> {
        let now = Utc::now();
        let anchors = graph.active_anchors_at(community.id, now);
        let trust = graph
            .trusted_anchors_at(community.id, now)
            .with_err(|| Error::TrustGraph)?;

        if trust.is_empty() {
            return Err(bherror::Error::root(Error::UntrustedClient)
                .ctx(format!("community {} has no active anchors", community.id)));
        }

        chain
            .verify_against_trusted_roots(&trust)
            .with_err(|| Error::UntrustedClient)?;

        anchors
            .into_iter()
            .zip(trust.certificates())
            .find(|(anchor, certificate)| leads_to(chain, anchor, certificate))
            .map(|(anchor, _)| anchor.clone())
            .ok_or_else(|| bherror::Error::root(Error::UntrustedClient))
            .ctx(|| "no single anchor issued the chain")
    }
}

/// Whether `anchor` is part of `chain` or issued one of its certificates.
fn leads_to(chain: &X5Chain, anchor: &Anchor, anchor_certificate: &X509) -> bool {
    let Ok(anchor_key) = anchor_certificate.public_key() else {
        return false;
    };

    chain.certificates().any(|certificate| {
        certificate_thumbprint(certificate)
            .is_ok_and(|thumbprint| thumbprint.eq_ignore_ascii_case(&anchor.thumbprint))
            || certificate.verify(&anchor_key).unwrap_or(false)
    })
}
