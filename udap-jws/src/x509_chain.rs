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


use bherror::traits::{ForeignBoxed as _, PropagateError as _};
use udap_x5chain::{JwtX5Chain, PublicJwk, X5Chain};

use crate::{
    public_key_from_jwk, BoxError, CryptoError, HasX5Chain, PkeySigner, Signer, SigningAlgorithm,
};

/// A [`Signer`] paired with the certificate chain of its key.
///
/// UDAP servers and clients publish their chain in the `x5c` header parameter of everything
/// they sign, so the recipient can resolve the key and establish trust through a community
/// anchor.
#[derive(Debug)]
pub struct SignerWithChain<S> {
    signer: S,
    x5chain: X5Chain,
}

/// [`SignerWithChain`] backed by an [`openssl`] private key.
pub type PkeySignerWithChain = SignerWithChain<PkeySigner>;

impl<S: Signer> SignerWithChain<S> {
    /// Construct a new instance by pairing up a [`Signer`] with the [`X5Chain`]
    /// for its public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the public keys of the [`Signer`] and [`X5Chain`]'s
    /// leaf certificate do not match.
    pub fn new(signer: S, x5chain: X5Chain) -> bherror::Result<Self, CryptoError> {
        public_key_matches(&signer, &x5chain)?;

        Ok(Self { signer, x5chain })
    }

    /// The chain in the `x5c` header parameter representation.
    pub fn x5c(&self) -> bherror::Result<JwtX5Chain, CryptoError> {
        JwtX5Chain::try_from(&self.x5chain).with_err(|| CryptoError::InvalidX5Chain)
    }
}

fn public_key_matches<S: Signer>(
    signer: &S,
    x5chain: &X5Chain,
) -> bherror::Result<(), CryptoError> {
    let signer_public_jwk = signer
        .public_jwk()
        .map_err(|boxed_error| downcast_or_chain(boxed_error, || CryptoError::CryptoBackend))?;
    let signer_public_key =
        public_key_from_jwk(&signer_public_jwk).with_err(|| CryptoError::InvalidPublicKey)?;

    let leaf_public_key = x5chain
        .leaf_certificate_key()
        .with_err(|| CryptoError::InvalidX5Chain)?;

    if !leaf_public_key.public_eq(&signer_public_key) {
        return Err(bherror::Error::root(CryptoError::PublicKeyMismatch));
    }

    Ok(())
}

fn downcast_or_chain<E, F>(boxed_error: BoxError, f: F) -> bherror::Error<E>
where
    E: bherror::BhError,
    F: FnOnce() -> E,
{
    match boxed_error.downcast::<bherror::Error<E>>() {
        Ok(boxed_downcast_error) => *boxed_downcast_error,
        Err(original_error) => match Err::<(), _>(original_error).foreign_boxed_err(f) {
            Err(error) => error,
            Ok(()) => unreachable!("mapping an `Err` yields an `Err`"),
        },
    }
}

impl<S: Signer> Signer for SignerWithChain<S> {
    fn algorithm(&self) -> SigningAlgorithm {
        self.signer.algorithm()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, BoxError> {
        self.signer.sign(message)
    }

    fn public_jwk(&self) -> Result<PublicJwk, BoxError> {
        self.signer.public_jwk()
    }
}

impl<S: Signer> HasX5Chain for SignerWithChain<S> {
    fn x5chain(&self) -> &X5Chain {
        &self.x5chain
    }
}
