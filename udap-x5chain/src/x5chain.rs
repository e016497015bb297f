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

use bherror::traits::{ErrorContext as _, ForeignError as _, PropagateError as _};
use openssl::{
    error::ErrorStack,
    pkey::{PKey, Public},
    stack::Stack,
    x509::{
        store::{X509Store, X509StoreBuilder},
        verify::X509VerifyFlags,
        X509StoreContext, X509,
    },
};

use crate::{Error, JwtX5Chain, Result};

/// An ordered X.509 certificate chain, as carried in the `x5c` header parameter.
///
/// The certificates are ordered starting with the certificate containing the end-entity key
/// followed by the certificate that signed it, and so on.
///
/// All methods of this type that return an [`Error`] do so in case the chain is invalid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct X5Chain {
    leaf: X509,
    intermediates: Vec<X509>,
}

impl X5Chain {
    /// Create a new [`X5Chain`].
    ///
    /// The chain **MUST BE** ordered in such a way that the leaf certificate is at first place,
    /// then goes its parent, and so on.
    ///
    /// # Warning
    ///
    /// The chain is at this point **NOT VALIDATED** against any community anchor.  In order to
    /// do so, use the [`X5Chain::verify_against_trusted_roots`] method.
    pub fn new(chain: Vec<X509>) -> Result<Self> {
        validate_chain_order(&chain)?;

        let mut chain = chain.into_iter();
        let Some(leaf) = chain.next() else {
            // `validate_chain_order` rejects empty chains
            return Err(bherror::Error::root(Error::X5Chain).ctx("chain is empty"));
        };
        let intermediates = chain.collect();

        Ok(Self {
            leaf,
            intermediates,
        })
    }

    /// Constructs a [`X5Chain`] from DER encoded certificates, leaf first.
    pub fn from_raw_bytes(bytes: &[Vec<u8>]) -> Result<Self> {
        let certs = bytes
            .iter()
            .enumerate()
            .map(|(i, der)| X509::from_der(der).foreign_err(|| Error::X5Chain).ctx(|| i))
            .collect::<Result<_>>()
            .ctx(|| "invalid X509 certificate")?;

        Self::new(certs)
    }

    /// Verify the [`X5Chain`] against trusted anchor certificates.
    ///
    /// Anchors may be self-signed roots or intermediates; a chain is trusted as soon as it
    /// reaches any certificate contained in `trust`.
    pub fn verify_against_trusted_roots(&self, trust: &X509Trust) -> Result<()> {
        let intermediates = chain_to_stack(self.intermediates.iter().cloned())?;
        let store = certs_to_store(trust.0.iter().cloned())?;

        // The context uses the chain only as a pool of untrusted helpers for building the path
        // from the leaf to an anchor, so a leaf repeated in the pool does no harm.
        let mut context = X509StoreContext::new().foreign_err(|| Error::X5Chain)?;
        let is_valid = context
            .init(&store, &self.leaf, &intermediates, |ctx| {
                clean_up_after_openssl(|| ctx.verify_cert())
            })
            .foreign_err(|| Error::X5Chain)?;

        if !is_valid {
            return Err(bherror::Error::root(Error::UntrustedX5Chain)
                .ctx("Chain validation against community anchors failed")
                .ctx(format!(
                    "OpenSSL error on depth {}: {}",
                    context.error_depth(),
                    context.error()
                )));
        };

        Ok(())
    }

    /// Convert the chain into a list of DER encoded certificates.
    pub fn as_bytes(&self) -> Result<Vec<Vec<u8>>> {
        self.certificates()
            .map(|cert| cert.to_der().foreign_err(|| Error::X5Chain))
            .collect()
    }

    /// Iterate over all certificates of the chain, leaf first.
    pub fn certificates(&self) -> impl Iterator<Item = &X509> {
        std::iter::once(&self.leaf).chain(self.intermediates.iter())
    }

    /// Returns the public key from the leaf certificate.
    pub fn leaf_certificate_key(&self) -> Result<PKey<Public>> {
        self.leaf_certificate()
            .public_key()
            .foreign_err(|| Error::X5Chain)
            .ctx(|| "Failed to access X509 public key")
    }

    /// Returns the leaf certificate.
    pub fn leaf_certificate(&self) -> &X509 {
        &self.leaf
    }
}

/// A collection of [`X509`] anchor certificates of a community.
///
/// This is used to verify the authenticity of the [`X5Chain`].
#[derive(Debug, Clone, Default)]
pub struct X509Trust(Vec<X509>);

impl X509Trust {
    /// Create a new [`X509Trust`].
    pub fn new(trust: Vec<X509>) -> Self {
        Self(trust)
    }

    /// Create a new [`X509Trust`] out of PEM encoded anchor certificates.
    pub fn from_pem_certificates<'a>(pems: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let certs = pems
            .into_iter()
            .enumerate()
            .map(|(i, pem)| {
                X509::from_pem(pem.as_bytes())
                    .foreign_err(|| Error::X5Chain)
                    .ctx(|| format!("invalid anchor certificate #{i}"))
            })
            .collect::<Result<_>>()?;

        Ok(Self(certs))
    }

    /// Returns `true` if there are no anchors to trust.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the anchor certificates.
    pub fn certificates(&self) -> &[X509] {
        &self.0
    }
}

/// Helper method for converting certificates to `Stack<x509>`.
fn chain_to_stack(chain: impl IntoIterator<Item = X509>) -> Result<Stack<X509>> {
    let mut intermediates = Stack::new().foreign_err(|| Error::X5Chain)?;

    for cert in chain {
        intermediates.push(cert).foreign_err(|| Error::X5Chain)?;
    }

    Ok(intermediates)
}

/// Helper method for converting anchors to `X509Store`.
///
/// `PARTIAL_CHAIN` lets an intermediate anchor terminate the path, which communities rely on
/// when they anchor trust below the root.
fn certs_to_store(certificates: impl IntoIterator<Item = X509>) -> Result<X509Store> {
    let mut builder = X509StoreBuilder::new().foreign_err(|| Error::X5Chain)?;
    builder
        .set_flags(
            X509VerifyFlags::X509_STRICT
                | X509VerifyFlags::CHECK_SS_SIGNATURE
                | X509VerifyFlags::PARTIAL_CHAIN,
        )
        .foreign_err(|| Error::X5Chain)?;

    for cert in certificates {
        builder.add_cert(cert).foreign_err(|| Error::X5Chain)?;
    }

    Ok(builder.build())
}

/// Validates that the certificates in a chain are in order.
///
/// The chain must be ordered in such a way that the leaf certificate is at the
/// first place, then goes its parent, and so on.
///
/// # Note
///
/// This check is not provided through [`X509StoreContext`]. Without this check,
/// chains in reversed order would seem valid, even though they are not.
fn validate_chain_order(chain: &[X509]) -> Result<()> {
    if chain.is_empty() {
        return Err(bherror::Error::root(Error::X5Chain).ctx("chain is empty"));
    }

    for (i, pair) in chain.windows(2).enumerate() {
        let (child, parent) = (&pair[0], &pair[1]);

        let is_child = clean_up_after_openssl(|| child.verify(parent.public_key()?.as_ref()))
            .foreign_err(|| Error::X5Chain)?;

        if !is_child {
            return Err(bherror::Error::root(Error::X5Chain)
                .ctx(format!("certificate #{i} is not signed by certificate #{}", i + 1)));
        }
    }

    Ok(())
}

impl TryFrom<JwtX5Chain> for X5Chain {
    type Error = bherror::Error<Error>;

    fn try_from(jwt_x5chain: JwtX5Chain) -> Result<Self> {
        let der_certs = jwt_x5chain
            .decode_ders()
            .with_err(|| Error::X5Chain)?;

        X5Chain::from_raw_bytes(&der_certs)
    }
}

/// Wrap a closure calling OpenSSL with low-level cleanup to make it safer in an async context.
///
/// Usage: wrap an `openssl` call in a closure and call this function with it.
/// Try to make the closure as small as possible.
pub(crate) fn clean_up_after_openssl<T>(
    f: impl FnOnce() -> std::result::Result<T, ErrorStack>,
) -> std::result::Result<T, ErrorStack> {
    let return_value = f()?;

    // The call succeeded, so anything left on the thread-local error queue is stale.
    drop(ErrorStack::get());

    Ok(return_value)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{Builder, KeyAlgorithmFamily};

    /// Root anchor, intermediate anchor issued by it and a leaf issued by the intermediate.
    fn get_certs() -> (Builder, Builder, X509) {
        let root = Builder::generate_anchor(KeyAlgorithmFamily::Rsa, "community root").unwrap();
        let intermediate = root
            .generate_intermediate(KeyAlgorithmFamily::Ec, "community intermediate")
            .unwrap();
        let leaf_key = Builder::generate_private_key(KeyAlgorithmFamily::Ec).unwrap();
        let leaf = intermediate
            .issue_certificate(&leaf_key, "client", None)
            .unwrap();

        (root, intermediate, leaf)
    }

    fn assert_empty_error_stack() {
        let errors = ErrorStack::get();
        assert!(
            errors.errors().is_empty(),
            "Error stack was non-empty: {:?}",
            errors
        );
    }

    #[test]
    fn test_validate_chain_order() {
        let (root, intermediate, leaf) = get_certs();
        let root = root.certificate().clone();
        let intermediate = intermediate.certificate().clone();

        validate_chain_order(&[leaf.clone(), intermediate.clone(), root.clone()]).unwrap();

        let err = validate_chain_order(&[intermediate, leaf]).unwrap_err();
        assert_matches!(err.error, Error::X5Chain);
        assert_empty_error_stack();

        let err = validate_chain_order(&[]).unwrap_err();
        assert_matches!(err.error, Error::X5Chain);

        validate_chain_order(&[root]).unwrap();
    }

    #[test]
    fn test_from_raw_bytes() {
        let (_, intermediate, leaf) = get_certs();
        let leaf = leaf.to_der().unwrap();
        let intermediate = intermediate.certificate().to_der().unwrap();

        X5Chain::from_raw_bytes(&[leaf, intermediate]).unwrap();

        let err = X5Chain::from_raw_bytes(&[]).unwrap_err();
        assert_matches!(err.error, Error::X5Chain);

        let err = X5Chain::from_raw_bytes(&[vec![0u8, 1u8], vec![2u8]]).unwrap_err();
        assert_matches!(err.error, Error::X5Chain);
        assert_empty_error_stack();
    }

    #[test]
    fn test_verify_against_trusted_roots() {
        let (root, intermediate, leaf) = get_certs();
        let root = root.certificate().clone();
        let intermediate = intermediate.certificate().clone();

        let chain = X5Chain::new(vec![leaf.clone(), intermediate.clone()]).unwrap();

        // trusted through the root anchor
        chain
            .verify_against_trusted_roots(&X509Trust::new(vec![root.clone()]))
            .unwrap();

        // trusted through an intermediate anchor
        chain
            .verify_against_trusted_roots(&X509Trust::new(vec![intermediate.clone()]))
            .unwrap();

        // a leaf alone cannot reach the root
        let leaf_only = X5Chain::new(vec![leaf]).unwrap();
        let err = leaf_only
            .verify_against_trusted_roots(&X509Trust::new(vec![root.clone()]))
            .unwrap_err();
        assert_matches!(err.error, Error::UntrustedX5Chain);
        assert_empty_error_stack();

        // nothing is trusted by an empty anchor set
        let err = chain
            .verify_against_trusted_roots(&X509Trust::default())
            .unwrap_err();
        assert_matches!(err.error, Error::UntrustedX5Chain);

        // an unrelated community anchor does not help
        let other = Builder::generate_anchor(KeyAlgorithmFamily::Ec, "other").unwrap();
        let err = chain
            .verify_against_trusted_roots(&X509Trust::new(vec![other.certificate().clone()]))
            .unwrap_err();
        assert_matches!(err.error, Error::UntrustedX5Chain);
    }

    #[test]
    fn test_trust_from_pem_certificates() {
        let (root, _, _) = get_certs();
        let pem = String::from_utf8(root.certificate().to_pem().unwrap()).unwrap();

        let trust = X509Trust::from_pem_certificates([pem.as_str()]).unwrap();
        assert_eq!(trust.certificates().len(), 1);

        let err = X509Trust::from_pem_certificates(["garbage"]).unwrap_err();
        assert_matches!(err.error, Error::X5Chain);
    }
}
