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


use std::str::FromStr;

use bherror::Error;
use serde::{Deserialize, Serialize};
use udap_x5chain::{KeyAlgorithmFamily, PublicJwk, X5Chain};

use crate::{error::SignatureError, utils::BoxError};

/// Signature algorithms used by UDAP for client assertions, software statements and signed
/// metadata.
///
/// `RS256` is mandatory to support; `RS384`, `ES256` and `ES384` are optional.  See the
/// [UDAP JWT-Based Client Authentication][1] profile and [RFC 7518][2].
///
/// [1]: https://www.udap.org/udap-jwt-client-auth.html
/// [2]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SigningAlgorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256
    Rs256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    Rs384,
    /// ECDSA over P-256 with SHA-256
    Es256,
    /// ECDSA over P-384 with SHA-384
    Es384,
}

/// JWS `"alg"` header parameter value for **RSASSA-PKCS1-v1_5 using SHA-256**.
pub const SIGNING_ALG_RS256: &str = "RS256";
/// JWS `"alg"` header parameter value for **RSASSA-PKCS1-v1_5 using SHA-384**.
pub const SIGNING_ALG_RS384: &str = "RS384";
/// JWS `"alg"` header parameter value for **ECDSA using P-256 and SHA-256**.
pub const SIGNING_ALG_ES256: &str = "ES256";
/// JWS `"alg"` header parameter value for **ECDSA using P-384 and SHA-384**.
pub const SIGNING_ALG_ES384: &str = "ES384";

impl SigningAlgorithm {
    /// All supported algorithms, in order of preference.
    pub const ALL: [SigningAlgorithm; 4] = [Self::Rs256, Self::Rs384, Self::Es256, Self::Es384];

    /// The family of keys this algorithm signs with.
    pub fn key_family(&self) -> KeyAlgorithmFamily {
        match self {
            Self::Rs256 | Self::Rs384 => KeyAlgorithmFamily::Rsa,
            Self::Es256 | Self::Es384 => KeyAlgorithmFamily::Ec,
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = Error<SignatureError>;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            SIGNING_ALG_RS256 => Ok(SigningAlgorithm::Rs256),
            SIGNING_ALG_RS384 => Ok(SigningAlgorithm::Rs384),
            SIGNING_ALG_ES256 => Ok(SigningAlgorithm::Es256),
            SIGNING_ALG_ES384 => Ok(SigningAlgorithm::Es384),
            _ => Err(Error::root(SignatureError::InvalidSigningAlgorithm(
                value.to_string(),
            ))),
        }
    }
}

impl std::fmt::Display for SigningAlgorithm {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let message = match self {
            Self::Rs256 => SIGNING_ALG_RS256,
            Self::Rs384 => SIGNING_ALG_RS384,
            Self::Es256 => SIGNING_ALG_ES256,
            Self::Es384 => SIGNING_ALG_ES384,
        };
        write!(f, "{}", message)
    }
}

impl From<SigningAlgorithm> for jwt::AlgorithmType {
    fn from(value: SigningAlgorithm) -> Self {
        match value {
            SigningAlgorithm::Rs256 => Self::Rs256,
            SigningAlgorithm::Rs384 => Self::Rs384,
            SigningAlgorithm::Es256 => Self::Es256,
            SigningAlgorithm::Es384 => Self::Es384,
        }
    }
}

impl TryFrom<jwt::AlgorithmType> for SigningAlgorithm {
    type Error = Error<SignatureError>;

    fn try_from(value: jwt::AlgorithmType) -> Result<Self, Self::Error> {
        match value {
            jwt::AlgorithmType::Rs256 => Ok(Self::Rs256),
            jwt::AlgorithmType::Rs384 => Ok(Self::Rs384),
            jwt::AlgorithmType::Es256 => Ok(Self::Es256),
            jwt::AlgorithmType::Es384 => Ok(Self::Es384),
            other => Err(Error::root(SignatureError::InvalidSigningAlgorithm(
                format!("{other:?}"),
            ))),
        }
    }
}

/// An external signing backend, to be used for computing a JWS signature.
///
/// The output of the signer, regardless of the algorithm, must be a valid **JWS signature**.
/// See step 5 in [section 5.1 of RFC7515](https://www.rfc-editor.org/rfc/rfc7515.html#section-5.1)
/// for more information.
pub trait Signer {
    /// The algorithm this signer uses. Must be a constant function.
    fn algorithm(&self) -> SigningAlgorithm;

    /// Produce a JWS signature as a byte array, not yet base64url-encoded.
    ///
    /// The `message` is guaranteed to be a valid JWS signing input.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, BoxError>;

    /// Get the public key of the signer in JWK format.
    fn public_jwk(&self) -> Result<PublicJwk, BoxError>;
}

/// Subtrait for [`Signer`]-s which have an associated `x5chain`, published in the `x5c` header
/// parameter of everything they sign.
pub trait HasX5Chain: Signer {
    /// Return the certificate chain of the signer, leaf first.
    fn x5chain(&self) -> &X5Chain;
}

/// An external backend for signature verification, to be used for verifying
/// JWS signatures.
pub trait SignatureVerifier: Sync {
    /// The algorithm used for the signature verification.
    fn algorithm(&self) -> SigningAlgorithm;

    /// Verifies the signature of the message, against the provided public key.
    ///
    /// The algorithm used to verify the signature must be the one returned by
    /// [`SignatureVerifier::algorithm`].
    ///
    /// # Return
    /// Method returns `Ok(true)` if the signature if valid for the given
    /// message, `Ok(false)` if it isn't (but there was no issue with the
    /// verifier itself), and `Err(_)` when the verifier itself encounters an
    /// error for any other reason.
    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &PublicJwk,
    ) -> Result<bool, BoxError>;
}

/// An external backend capable of signing JWTs.
///
/// This is an extension trait over [`Signer`]; prefer depending on this trait
/// when writing code which handles JWTs. It is however not object safe; depend
/// on [`Signer`] directly if you need that.
pub trait JwtSigner: Signer {
    /// Utility function that delegates to [`jwt::SignWithKey`] while allowing
    /// proper propagation of errors from both the foreign trait and the [`Signer`].
    fn sign_jwt<UnsignedJwt, SignedJwt>(
        &self,
        unsigned_jwt: UnsignedJwt,
    ) -> Result<SignedJwt, BoxError>
    where
        UnsignedJwt: jwt::SignWithKey<SignedJwt>;
}

impl<S: Signer + ?Sized> JwtSigner for S {
    fn sign_jwt<UnsignedJwt, SignedJwt>(
        &self,
        unsigned_jwt: UnsignedJwt,
    ) -> Result<SignedJwt, BoxError>
    where
        UnsignedJwt: jwt::SignWithKey<SignedJwt>,
    {
        crate::utils::sign_jwt(unsigned_jwt, self)
    }
}

/// An external backend capable of verifying the signatures of JWTs.
///
/// This is an extension trait over [`SignatureVerifier`]; prefer depending on
/// this trait when writing code which handles JWTs. It is however not object
/// safe; depend on [`SignatureVerifier`] directly if you need that.
pub trait JwtVerifier: SignatureVerifier {
    /// Utility function that delegates to [`jwt::VerifyWithKey`] while allowing
    /// proper propagation of errors from both the foreign trait and the
    /// [`SignatureVerifier`].
    fn verify_jwt_signature<UnverifiedJwt, VerifiedJwt>(
        &self,
        unverified_jwt: UnverifiedJwt,
        public_key: &PublicJwk,
    ) -> Result<VerifiedJwt, BoxError>
    where
        UnverifiedJwt: jwt::VerifyWithKey<VerifiedJwt>;
}

impl<V: SignatureVerifier + ?Sized> JwtVerifier for V {
    fn verify_jwt_signature<UnverifiedJwt, VerifiedJwt>(
        &self,
        unverified_jwt: UnverifiedJwt,
        public_key: &PublicJwk,
    ) -> Result<VerifiedJwt, BoxError>
    where
        UnverifiedJwt: jwt::VerifyWithKey<VerifiedJwt>,
    {
        crate::utils::verify_jwt_signature(unverified_jwt, self, public_key)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn signing_algorithms_serialize_correctly() {
        struct TestCase<'a> {
            alg: SigningAlgorithm,
            alg_str: &'a str,
            family: KeyAlgorithmFamily,
        }

        let test_cases: &[TestCase] = &[
            TestCase {
                alg: SigningAlgorithm::Rs256,
                alg_str: SIGNING_ALG_RS256,
                family: KeyAlgorithmFamily::Rsa,
            },
            TestCase {
                alg: SigningAlgorithm::Rs384,
                alg_str: SIGNING_ALG_RS384,
                family: KeyAlgorithmFamily::Rsa,
            },
            TestCase {
                alg: SigningAlgorithm::Es256,
                alg_str: SIGNING_ALG_ES256,
                family: KeyAlgorithmFamily::Ec,
            },
            TestCase {
                alg: SigningAlgorithm::Es384,
                alg_str: SIGNING_ALG_ES384,
                family: KeyAlgorithmFamily::Ec,
            },
        ];

        for TestCase {
            alg,
            alg_str,
            family,
        } in test_cases
        {
            let serialized = serde_json::to_string(alg).unwrap();
            let expected = format!("\"{}\"", alg_str);
            assert_eq!(expected, serialized);

            let deserialized_serde: SigningAlgorithm = serde_json::from_str(&expected).unwrap();
            assert_eq!(alg, &deserialized_serde);

            let deserialized_str = SigningAlgorithm::from_str(alg_str).unwrap();
            assert_eq!(alg, &deserialized_str);

            assert_eq!(*alg, SigningAlgorithm::from_str(&alg.to_string()).unwrap());
            assert_eq!(alg.key_family(), *family);

            let jwt_alg = jwt::AlgorithmType::from(*alg);
            assert_eq!(*alg, SigningAlgorithm::try_from(jwt_alg).unwrap());
        }
    }

    #[test]
    fn unsupported_algorithms_are_rejected() {
        for alg in ["PS256", "HS256", "none", "rs256"] {
            let err = SigningAlgorithm::from_str(alg).unwrap_err();
            assert_eq!(
                err.error,
                SignatureError::InvalidSigningAlgorithm(alg.to_owned())
            );
        }

        assert!(SigningAlgorithm::try_from(jwt::AlgorithmType::Hs256).is_err());
    }
}
