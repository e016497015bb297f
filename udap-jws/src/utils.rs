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


use std::cell::Cell;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use udap_x5chain::PublicJwk;

use crate::{SignatureVerifier, Signer};

/// Type alias for a boxed error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Decodes the given `payload` as the `base64url`-encoded string **without
/// padding** into bytes.
pub fn base64_url_decode<T: AsRef<[u8]>>(payload: T) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(payload)
}

/// The JWS signing input `<header>.<claims>` of [RFC 7515][1].
///
/// [1]: <https://www.rfc-editor.org/rfc/rfc7515.html#section-5.1>
fn signing_input(header: &str, claims: &str) -> String {
    format!("{header}.{claims}")
}

pub(crate) fn sign_jwt<UnsignedJwt, SignedJwt, S>(
    unsigned_jwt: UnsignedJwt,
    signer: &S,
) -> Result<SignedJwt, BoxError>
where
    UnsignedJwt: jwt::SignWithKey<SignedJwt>,
    S: Signer + ?Sized,
{
    let adapter = SignerAdapter {
        signer,
        failure: BackendFailure::default(),
    };

    unsigned_jwt
        .sign_with_key(&adapter)
        .map_err(|error| adapter.failure.into_error(error))
}

pub(crate) fn verify_jwt_signature<UnverifiedJwt, VerifiedJwt, V>(
    unverified_jwt: UnverifiedJwt,
    verifier: &V,
    public_key: &PublicJwk,
) -> Result<VerifiedJwt, BoxError>
where
    UnverifiedJwt: jwt::VerifyWithKey<VerifiedJwt>,
    V: SignatureVerifier + ?Sized,
{
    let adapter = VerifierAdapter {
        verifier,
        public_key,
        failure: BackendFailure::default(),
    };

    unverified_jwt
        .verify_with_key(&adapter)
        .map_err(|error| adapter.failure.into_error(error))
}

/// A [`Signer`] seen as a [`jwt::SigningAlgorithm`].
struct SignerAdapter<'a, S: ?Sized> {
    signer: &'a S,
    failure: BackendFailure,
}

impl<S: Signer + ?Sized> jwt::SigningAlgorithm for SignerAdapter<'_, S> {
    fn algorithm_type(&self) -> jwt::AlgorithmType {
        self.signer.algorithm().into()
    }

    fn sign(&self, header: &str, claims: &str) -> Result<String, jwt::Error> {
        self.signer
            .sign(signing_input(header, claims).as_bytes())
            .map(|signature| URL_SAFE_NO_PAD.encode(signature))
            .map_err(|error| self.failure.record(error))
    }
}

/// A [`SignatureVerifier`] bound to one public key, seen as a [`jwt::VerifyingAlgorithm`].
struct VerifierAdapter<'a, V: ?Sized> {
    verifier: &'a V,
    public_key: &'a PublicJwk,
    failure: BackendFailure,
}

impl<V: SignatureVerifier + ?Sized> jwt::VerifyingAlgorithm for VerifierAdapter<'_, V> {
    fn algorithm_type(&self) -> jwt::AlgorithmType {
        self.verifier.algorithm().into()
    }

    fn verify_bytes(
        &self,
        header: &str,
        claims: &str,
        signature: &[u8],
    ) -> Result<bool, jwt::Error> {
        self.verifier
            .verify(
                signing_input(header, claims).as_bytes(),
                signature,
                self.public_key,
            )
            .map_err(|error| self.failure.record(error))
    }
}

/// The error of a signing or verifying backend, which `jwt::Error` can not carry.
#[derive(Default)]
struct BackendFailure(Cell<Option<BoxError>>);

impl BackendFailure {
    /// Keep `error` and hand `jwt` a placeholder in its place.
    fn record(&self, error: BoxError) -> jwt::Error {
        let previous = self.0.replace(Some(error));
        debug_assert!(previous.is_none());

        jwt::Error::InvalidSignature
    }

    /// The recorded backend error, or `jwt_error` if the backend did not fail.
    fn into_error(self, jwt_error: jwt::Error) -> BoxError {
        match self.0.into_inner() {
            Some(backend_error) => backend_error,
            None => Box::new(jwt_error),
        }
    }
}
