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


use std::result::Result as StdResult;

use bherror::{
    traits::{ErrorContext as _, ForeignError as _},
    Error, Result,
};
use openssl::{
    bn::BigNum,
    ec::{EcGroup, EcKey},
    ecdsa::EcdsaSig,
    hash::{hash, MessageDigest},
    nid::Nid,
    pkey::{HasPublic, Id, PKey, PKeyRef, Private, Public},
    rsa::{Padding, Rsa},
};
use udap_x5chain::{jwk_curve_nid, public_key_to_jwk, PublicJwk};

use crate::{
    base64_url_decode,
    error::{CryptoError, FormatError},
    BoxError, SignatureVerifier, Signer, SigningAlgorithm,
};

/// Minimum RSA modulus size accepted for signing and verification.
const MIN_RSA_KEY_BITS: u32 = 2048;

/// Parameters of an algorithm: hash function, and for ECDSA the curve with its coordinate size.
fn algorithm_parameters(algorithm: SigningAlgorithm) -> (MessageDigest, Option<(Nid, usize)>) {
    match algorithm {
        SigningAlgorithm::Rs256 => (MessageDigest::sha256(), None),
        SigningAlgorithm::Rs384 => (MessageDigest::sha384(), None),
        SigningAlgorithm::Es256 => (MessageDigest::sha256(), Some((Nid::X9_62_PRIME256V1, 32))),
        SigningAlgorithm::Es384 => (MessageDigest::sha384(), Some((Nid::SECP384R1, 48))),
    }
}

/// Pick the default UDAP signing algorithm for the given key: `RS256` for RSA keys, and the
/// ECDSA variant matching the curve for EC keys.
pub fn default_algorithm_for_key<T: HasPublic>(
    key: &PKeyRef<T>,
) -> Result<SigningAlgorithm, CryptoError> {
    match key.id() {
        Id::RSA => Ok(SigningAlgorithm::Rs256),
        Id::EC => {
            let curve = key
                .ec_key()
                .foreign_err(|| CryptoError::CryptoBackend)?
                .group()
                .curve_name();
            match curve {
                Some(Nid::X9_62_PRIME256V1) => Ok(SigningAlgorithm::Es256),
                Some(Nid::SECP384R1) => Ok(SigningAlgorithm::Es384),
                _ => Err(Error::root(CryptoError::Unsupported(format!(
                    "elliptic curve {curve:?}"
                )))),
            }
        }
        other => Err(Error::root(CryptoError::Unsupported(format!(
            "key type {other:?}"
        )))),
    }
}

/// Check that `key` can be used with `algorithm`.
fn check_key_fits<T: HasPublic>(
    algorithm: SigningAlgorithm,
    key: &PKeyRef<T>,
) -> Result<(), CryptoError> {
    let (_, curve) = algorithm_parameters(algorithm);

    let fits = match (curve, key.id()) {
        (None, Id::RSA) => key.bits() >= MIN_RSA_KEY_BITS,
        (Some((expected, _)), Id::EC) => {
            let ec_key = key.ec_key().foreign_err(|| CryptoError::CryptoBackend)?;
            ec_key.group().curve_name() == Some(expected)
        }
        _ => false,
    };

    if !fits {
        return Err(Error::root(CryptoError::Unsupported(format!(
            "{:?} key of {} bits can not be used with {algorithm}",
            key.id(),
            key.bits()
        ))));
    }

    Ok(())
}

/// [`Signer`] backed by an [`openssl`] private key.
pub struct PkeySigner {
    algorithm: SigningAlgorithm,
    private_key: PKey<Private>,
}

impl std::fmt::Debug for PkeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkeySigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl PkeySigner {
    /// Create a signer for `algorithm` using `private_key`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Unsupported`] if the key does not fit the algorithm, e.g. an EC
    /// key for `RS256` or a P-256 key for `ES384`.
    pub fn new(
        algorithm: SigningAlgorithm,
        private_key: PKey<Private>,
    ) -> Result<Self, CryptoError> {
        check_key_fits(algorithm, &private_key)?;

        Ok(Self {
            algorithm,
            private_key,
        })
    }

    /// Create a signer with the [default algorithm](default_algorithm_for_key) of the key.
    pub fn with_default_algorithm(private_key: PKey<Private>) -> Result<Self, CryptoError> {
        let algorithm = default_algorithm_for_key(&private_key)?;

        Self::new(algorithm, private_key)
    }

    /// Generate a fresh key suitable for `algorithm`.
    pub fn generate(algorithm: SigningAlgorithm) -> Result<Self, CryptoError> {
        let private_key = match algorithm_parameters(algorithm) {
            (_, None) => {
                let rsa = Rsa::generate(MIN_RSA_KEY_BITS)
                    .foreign_err(|| CryptoError::KeyGenerationFailed)?;
                PKey::from_rsa(rsa).foreign_err(|| CryptoError::CryptoBackend)?
            }
            (_, Some((curve, _))) => {
                let group =
                    EcGroup::from_curve_name(curve).foreign_err(|| CryptoError::CryptoBackend)?;
                let ec_key =
                    EcKey::generate(&group).foreign_err(|| CryptoError::KeyGenerationFailed)?;
                PKey::from_ec_key(ec_key).foreign_err(|| CryptoError::CryptoBackend)?
            }
        };

        Self::new(algorithm, private_key)
    }

    /// The private key of this signer.
    pub fn private_key(&self) -> &PKeyRef<Private> {
        &self.private_key
    }

    /// The public counterpart of the signing key.
    pub fn public_key(&self) -> Result<PKey<Public>, CryptoError> {
        let der = self
            .private_key
            .public_key_to_der()
            .foreign_err(|| CryptoError::CryptoBackend)?;

        PKey::public_key_from_der(&der).foreign_err(|| CryptoError::CryptoBackend)
    }
}

impl Signer for PkeySigner {
    fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    fn sign(&self, message: &[u8]) -> StdResult<Vec<u8>, BoxError> {
        let (digest, curve) = algorithm_parameters(self.algorithm);

        let Some((_, size)) = curve else {
            let mut signer = openssl::sign::Signer::new(digest, &self.private_key)?;
            signer.set_rsa_padding(Padding::PKCS1)?;
            signer.update(message)?;
            return Ok(signer.sign_to_vec()?);
        };

        let digest = hash(digest, message)?;
        let signature = EcdsaSig::sign(&digest, self.private_key.ec_key()?.as_ref())?;

        let size = size as i32;
        let mut jws = signature.r().to_vec_padded(size)?;
        jws.extend(signature.s().to_vec_padded(size)?);
        Ok(jws)
    }

    fn public_jwk(&self) -> StdResult<PublicJwk, BoxError> {
        let public_key = self.public_key()?;

        Ok(public_key_to_jwk(&public_key)?)
    }
}

/// [`SignatureVerifier`] for one [`SigningAlgorithm`], backed by [`openssl`].
#[derive(Debug, Clone, Copy)]
pub struct PkeyVerifier {
    algorithm: SigningAlgorithm,
}

impl PkeyVerifier {
    /// Create a verifier for `algorithm`.
    pub fn new(algorithm: SigningAlgorithm) -> Self {
        Self { algorithm }
    }
}

impl SignatureVerifier for PkeyVerifier {
    fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &PublicJwk,
    ) -> StdResult<bool, BoxError> {
        let public_key = public_key_from_jwk(public_key)?;
        check_key_fits(self.algorithm, &public_key)?;

        let (digest, curve) = algorithm_parameters(self.algorithm);

        let Some((_, size)) = curve else {
            let mut verifier = openssl::sign::Verifier::new(digest, &public_key)?;
            verifier.set_rsa_padding(Padding::PKCS1)?;
            verifier.update(message)?;
            return Ok(verifier.verify(signature)?);
        };

        if signature.len() != 2 * size {
            return Err(Box::new(
                Error::root(FormatError::InvalidSignatureEncoding)
                    .ctx(format!("expected {} bytes, got {}", 2 * size, signature.len())),
            ));
        }
        let (r, s) = signature.split_at(size);
        let ecdsa_sig =
            EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?;

        let digest = hash(digest, message)?;

        Ok(ecdsa_sig.verify(&digest, public_key.ec_key()?.as_ref())?)
    }
}

/// Parse an RSA or EC public JWK into an [`openssl`] public key.
pub fn public_key_from_jwk(jwk: &PublicJwk) -> Result<PKey<Public>, FormatError> {
    match jwk_str(jwk, "kty")? {
        "RSA" => {
            let n = jwk_big_num(jwk, "n")?;
            let e = jwk_big_num(jwk, "e")?;
            let rsa = Rsa::from_public_components(n, e)
                .foreign_err(|| jwk_error("invalid RSA components"))?;
            PKey::from_rsa(rsa).foreign_err(|| jwk_error("invalid RSA key"))
        }
        "EC" => {
            let crv = jwk_str(jwk, "crv")?;
            let (nid, size) = jwk_curve_nid(crv)
                .ok_or_else(|| Error::root(jwk_error("unsupported curve")))
                .ctx(|| format!("curve {crv}"))?;

            let x = jwk_coordinate(jwk, "x", size)?;
            let y = jwk_coordinate(jwk, "y", size)?;

            let group = EcGroup::from_curve_name(nid)
                .foreign_err(|| jwk_error("unsupported curve"))?;
            let ec_key = EcKey::from_public_key_affine_coordinates(&group, &x, &y)
                .foreign_err(|| jwk_error("coordinate construction failed"))?;
            PKey::from_ec_key(ec_key).foreign_err(|| jwk_error("invalid EC key"))
        }
        other => Err(Error::root(jwk_error("unsupported \"kty\" value")))
            .ctx(|| format!("kty {other}")),
    }
}

fn jwk_error(message: &str) -> FormatError {
    FormatError::JwkParsingFailed(message.to_owned())
}

fn jwk_str<'a>(jwk: &'a PublicJwk, field: &str) -> Result<&'a str, FormatError> {
    jwk.get(field).and_then(|value| value.as_str()).ok_or_else(|| {
        Error::root(FormatError::JwkParsingFailed(format!(
            "missing \"{field}\" field"
        )))
    })
}

fn jwk_bytes(jwk: &PublicJwk, field: &str) -> Result<Vec<u8>, FormatError> {
    let value = jwk_str(jwk, field)?;

    base64_url_decode(value)
        .foreign_err(|| FormatError::JwkParsingFailed(format!("decoding \"{field}\" failed")))
}

fn jwk_big_num(jwk: &PublicJwk, field: &str) -> Result<BigNum, FormatError> {
    BigNum::from_slice(&jwk_bytes(jwk, field)?)
        .foreign_err(|| jwk_error("Failed to construct BigNum"))
}

fn jwk_coordinate(jwk: &PublicJwk, field: &str, size: i32) -> Result<BigNum, FormatError> {
    let bytes = jwk_bytes(jwk, field)?;

    if bytes.len() != size as usize {
        return Err(Error::root(FormatError::JwkParsingFailed(format!(
            "\"{field}\" has {} bytes, expected {size}",
            bytes.len()
        ))));
    }

    BigNum::from_slice(&bytes).foreign_err(|| jwk_error("Failed to construct BigNum"))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use super::*;
    use crate::{json_object, JwtSigner as _, JwtVerifier as _};

    const MESSAGE: &[u8] = b"Test message to be signed";

    fn simple_verify_setup(algorithm: SigningAlgorithm) -> (PublicJwk, Vec<u8>) {
        let signer = PkeySigner::generate(algorithm).unwrap();
        let public_jwk = signer.public_jwk().unwrap();

        let signature = signer.sign(MESSAGE).unwrap();

        (public_jwk, signature)
    }

    #[test]
    fn sign_verify_bytes() {
        for algorithm in SigningAlgorithm::ALL {
            let (public_jwk, signature) = simple_verify_setup(algorithm);
            let verifier = PkeyVerifier::new(algorithm);

            assert!(verifier.verify(MESSAGE, &signature, &public_jwk).unwrap());
            assert!(!verifier
                .verify(b"Some other message", &signature, &public_jwk)
                .unwrap());
        }
    }

    #[test]
    fn ecdsa_signature_has_fixed_size() {
        let (_, signature) = simple_verify_setup(SigningAlgorithm::Es256);
        assert_eq!(signature.len(), 64);

        let (_, signature) = simple_verify_setup(SigningAlgorithm::Es384);
        assert_eq!(signature.len(), 96);
    }

    #[test]
    fn verifier_rejects_wrong_signature_length() {
        let (public_jwk, mut signature) = simple_verify_setup(SigningAlgorithm::Es256);
        signature.pop();

        let error = PkeyVerifier::new(SigningAlgorithm::Es256)
            .verify(MESSAGE, &signature, &public_jwk)
            .unwrap_err();

        assert_eq!(
            error.downcast::<Error<FormatError>>().unwrap().error,
            FormatError::InvalidSignatureEncoding
        );
    }

    #[test]
    fn verifier_rejects_key_of_other_family() {
        let (rsa_jwk, signature) = simple_verify_setup(SigningAlgorithm::Rs256);

        let error = PkeyVerifier::new(SigningAlgorithm::Es256)
            .verify(MESSAGE, &signature, &rsa_jwk)
            .unwrap_err();

        assert_matches!(
            error.downcast::<Error<CryptoError>>().unwrap().error,
            CryptoError::Unsupported(_)
        );
    }

    #[test]
    fn signer_rejects_unfit_key() {
        let p256 = PkeySigner::generate(SigningAlgorithm::Es256).unwrap();

        let err = PkeySigner::new(SigningAlgorithm::Es384, p256.private_key().to_owned())
            .unwrap_err();
        assert_matches!(err.error, CryptoError::Unsupported(_));

        let err = PkeySigner::new(SigningAlgorithm::Rs256, p256.private_key().to_owned())
            .unwrap_err();
        assert_matches!(err.error, CryptoError::Unsupported(_));

        let small_rsa = PKey::from_rsa(Rsa::generate(1024).unwrap()).unwrap();
        let err = PkeySigner::new(SigningAlgorithm::Rs256, small_rsa).unwrap_err();
        assert_matches!(err.error, CryptoError::Unsupported(_));
    }

    #[test]
    fn default_algorithm_follows_key() {
        for algorithm in SigningAlgorithm::ALL {
            let signer = PkeySigner::generate(algorithm).unwrap();
            let expected = match algorithm {
                SigningAlgorithm::Rs384 => SigningAlgorithm::Rs256,
                other => other,
            };

            assert_eq!(default_algorithm_for_key(signer.private_key()).unwrap(), expected);
        }
    }

    #[test]
    fn invalid_jwk_missing_field() {
        let (mut public_jwk, signature) = simple_verify_setup(SigningAlgorithm::Rs256);
        public_jwk.remove("n");

        let error = PkeyVerifier::new(SigningAlgorithm::Rs256)
            .verify(MESSAGE, &signature, &public_jwk)
            .unwrap_err();

        assert_eq!(
            error.downcast::<Error<FormatError>>().unwrap().error,
            FormatError::JwkParsingFailed("missing \"n\" field".to_string())
        );
    }

    #[test]
    fn jwk_round_trip_keeps_key() {
        for algorithm in SigningAlgorithm::ALL {
            let signer = PkeySigner::generate(algorithm).unwrap();
            let jwk = signer.public_jwk().unwrap();

            let parsed = public_key_from_jwk(&jwk).unwrap();

            assert!(parsed.public_eq(signer.private_key()));
            assert_eq!(public_key_to_jwk(&parsed).unwrap(), jwk);
        }

        let err = public_key_from_jwk(&json_object!({ "kty": "oct", "k": "AAAA" })).unwrap_err();
        assert_matches!(err.error, FormatError::JwkParsingFailed(_));
    }

    #[test]
    fn sign_and_verify_jwt() {
        #[derive(Debug, Serialize, Deserialize)]
        struct MinimalHeader {
            alg: jwt::AlgorithmType,
        }
        impl jwt::JoseHeader for MinimalHeader {
            fn algorithm_type(&self) -> jwt::AlgorithmType {
                self.alg
            }
        }

        let signer = PkeySigner::generate(SigningAlgorithm::Es384).unwrap();
        let header = MinimalHeader {
            alg: jwt::AlgorithmType::Es384,
        };
        let claims = json_object!({ "iss": "https://client.example.com" });

        let signed: jwt::Token<_, _, jwt::token::Signed> =
            signer.sign_jwt(jwt::Token::new(header, claims)).unwrap();

        let public_jwk = signer.public_jwk().unwrap();
        let verified: jwt::Token<MinimalHeader, Value, _> =
            PkeyVerifier::new(SigningAlgorithm::Es384)
                .verify_jwt_signature(signed.as_str(), &public_jwk)
                .unwrap();
        assert_eq!(verified.claims()["iss"], "https://client.example.com");

        // the algorithm in the header must match the verifier
        let result: StdResult<jwt::Token<MinimalHeader, Value, jwt::Verified>, _> =
            PkeyVerifier::new(SigningAlgorithm::Es256)
                .verify_jwt_signature(signed.as_str(), &public_jwk);
        assert!(result.is_err());
    }
}
