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

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bherror::traits::{ErrorContext as _, ForeignError as _};
use openssl::{
    hash::MessageDigest,
    pkey::{Id, PKey, PKeyRef, Public},
    x509::{X509NameRef, X509},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{decode_protected_header, Error, ProtectedHeader, Result, X5C_HEADER_PARAMETER};

/// The family of the public key found in a certificate.
#[derive(
    strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyAlgorithmFamily {
    /// RSA public key.
    #[strum(to_string = "RSA")]
    Rsa,
    /// Elliptic-curve public key.
    #[strum(to_string = "EC")]
    Ec,
}

/// A public key extracted from one certificate of an `x5c` chain.
///
/// Resolved keys are ephemeral: they are produced per request and never persisted.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    algorithm_family: KeyAlgorithmFamily,
    public_key: PKey<Public>,
    source_certificate_index: usize,
    certificate: X509,
}

impl ResolvedKey {
    /// The family of the resolved key.
    pub fn algorithm_family(&self) -> KeyAlgorithmFamily {
        self.algorithm_family
    }

    /// The resolved public key.
    pub fn public_key(&self) -> &PKeyRef<Public> {
        &self.public_key
    }

    /// Index of the source certificate within the `x5c` array.
    pub fn source_certificate_index(&self) -> usize {
        self.source_certificate_index
    }

    /// The certificate the key was taken from.
    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// SHA-256 thumbprint of the DER encoded source certificate, as lowercase hex.
    ///
    /// This is the value stored on community anchors, so it can be used to correlate a presented
    /// certificate with an anchor.
    pub fn thumbprint(&self) -> Result<String> {
        certificate_thumbprint(&self.certificate)
    }

    /// Human-readable subject distinguished name of the source certificate.
    pub fn subject_name(&self) -> String {
        render_name(self.certificate.subject_name())
    }

    /// Human-readable issuer distinguished name of the source certificate.
    pub fn issuer_name(&self) -> String {
        render_name(self.certificate.issuer_name())
    }
}

/// The _Certificate Chain Key Resolver_.
///
/// Reads the protected header of the compact JWS `token` without verifying it and resolves one
/// public key per certificate found in its `x5c` parameter, preserving the order of the array
/// (leaf first, as supplied by the client).
///
/// Returns an empty list when the header carries no `x5c` parameter, or when the parameter is
/// not an array; callers may then fall back to other client secret types.
///
/// # Errors
///
/// - [`Error::MalformedToken`] if the protected header can not be decoded,
/// - [`Error::MalformedCertificateChain`] if any entry is not a base64 encoded DER certificate,
/// - [`Error::UnsupportedKeyAlgorithm`] if any certificate carries neither an RSA nor an EC key.
///
/// The chain is accepted or rejected as a whole: on error no key is returned.
pub fn resolve_keys(token: &str) -> Result<Vec<ResolvedKey>> {
    let header = decode_protected_header(token)?;

    resolve_keys_from_header(&header)
}

/// Same as [`resolve_keys`], for a protected header that has already been decoded.
pub fn resolve_keys_from_header(header: &ProtectedHeader) -> Result<Vec<ResolvedKey>> {
    let Some(Value::Array(entries)) = header.get(X5C_HEADER_PARAMETER) else {
        return Ok(Vec::new());
    };

    let certificates = decode_certificates(entries)?;

    certificates
        .into_iter()
        .enumerate()
        .map(|(index, certificate)| resolve_key(index, certificate))
        .collect()
}

/// SHA-256 thumbprint of a DER encoded certificate, as lowercase hex.
pub fn certificate_thumbprint(certificate: &X509) -> Result<String> {
    let digest = certificate
        .digest(MessageDigest::sha256())
        .foreign_err(|| Error::X5Chain)
        .ctx(|| "unable to compute certificate thumbprint")?;

    Ok(hex::encode(digest))
}

/// SHA-256 thumbprint of a PEM encoded certificate, as lowercase hex.
pub fn pem_certificate_thumbprint(pem: &str) -> Result<String> {
    let certificate = X509::from_pem(pem.as_bytes())
        .foreign_err(|| Error::X5Chain)
        .ctx(|| "invalid PEM certificate")?;

    certificate_thumbprint(&certificate)
}

fn decode_certificates(entries: &[Value]) -> Result<Vec<X509>> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let Some(base64_der) = entry.as_str() else {
                return Err(bherror::Error::root(Error::MalformedCertificateChain)
                    .ctx(format!("x5c[{i}] is not a string")));
            };

            let der = STANDARD
                .decode(base64_der)
                .foreign_err(|| Error::MalformedCertificateChain)
                .ctx(|| format!("x5c[{i}] is not valid base64"))?;

            X509::from_der(&der)
                .foreign_err(|| Error::MalformedCertificateChain)
                .ctx(|| format!("x5c[{i}] is not a DER encoded X.509 certificate"))
        })
        .collect()
}

fn resolve_key(index: usize, certificate: X509) -> Result<ResolvedKey> {
    let public_key = certificate
        .public_key()
        .foreign_err(|| Error::UnsupportedKeyAlgorithm)
        .ctx(|| format!("unable to extract the public key of x5c[{index}]"))?;

    let algorithm_family = match public_key.id() {
        Id::RSA => KeyAlgorithmFamily::Rsa,
        Id::EC => KeyAlgorithmFamily::Ec,
        other => {
            return Err(bherror::Error::root(Error::UnsupportedKeyAlgorithm)
                .ctx(format!("x5c[{index}] carries a key of type {other:?}")))
        }
    };

    Ok(ResolvedKey {
        algorithm_family,
        public_key,
        source_certificate_index: index,
        certificate,
    })
}

fn render_name(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let field = entry.object().nid().short_name().unwrap_or("?");
            let value = entry
                .data()
                .as_utf8()
                .map(|value| value.to_string())
                .unwrap_or_default();
            format!("{field}={value}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use openssl::pkey::Private;
    use serde_json::json;

    use super::*;
    use crate::Builder;

    fn token_with_header(header: Value) -> String {
        format!(
            "{}.{}.c2lnbmF0dXJl",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap()),
            URL_SAFE_NO_PAD.encode(b"{\"iss\":\"client\"}"),
        )
    }

    fn base64_der(certificate: &X509) -> String {
        STANDARD.encode(certificate.to_der().unwrap())
    }

    fn issue(anchor: &Builder, family: KeyAlgorithmFamily) -> (PKey<Private>, X509) {
        let key = Builder::generate_private_key(family).unwrap();
        let cert = anchor.issue_certificate(&key, "client", None).unwrap();
        (key, cert)
    }

    #[test]
    fn test_single_rsa_certificate() {
        let anchor = Builder::generate_anchor(KeyAlgorithmFamily::Rsa, "anchor").unwrap();
        let (key, cert) = issue(&anchor, KeyAlgorithmFamily::Rsa);

        let token = token_with_header(json!({ "alg": "RS256", "x5c": [base64_der(&cert)] }));
        let keys = resolve_keys(&token).unwrap();

        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].algorithm_family(), KeyAlgorithmFamily::Rsa);
        assert_eq!(keys[0].source_certificate_index(), 0);
        assert!(keys[0].public_key().public_eq(&key));
        assert_eq!(keys[0].subject_name(), "CN=client");
        assert_eq!(keys[0].issuer_name(), "CN=anchor");
    }

    #[test]
    fn test_keys_follow_input_order() {
        let anchor = Builder::generate_anchor(KeyAlgorithmFamily::Ec, "anchor").unwrap();
        let (_, ec_cert) = issue(&anchor, KeyAlgorithmFamily::Ec);
        let (_, rsa_cert) = issue(&anchor, KeyAlgorithmFamily::Rsa);

        let token = token_with_header(json!({
            "alg": "ES256",
            "x5c": [
                base64_der(&ec_cert),
                base64_der(&rsa_cert),
                base64_der(anchor.certificate()),
            ],
        }));
        let keys = resolve_keys(&token).unwrap();

        let families: Vec<_> = keys.iter().map(ResolvedKey::algorithm_family).collect();
        assert_eq!(
            families,
            [
                KeyAlgorithmFamily::Ec,
                KeyAlgorithmFamily::Rsa,
                KeyAlgorithmFamily::Ec,
            ]
        );
        let indices: Vec<_> = keys.iter().map(ResolvedKey::source_certificate_index).collect();
        assert_eq!(indices, [0, 1, 2]);
        assert_eq!(
            keys[2].thumbprint().unwrap(),
            certificate_thumbprint(anchor.certificate()).unwrap()
        );

        let anchor_pem = String::from_utf8(anchor.certificate().to_pem().unwrap()).unwrap();
        assert_eq!(
            pem_certificate_thumbprint(&anchor_pem).unwrap(),
            keys[2].thumbprint().unwrap()
        );
        assert_eq!(keys[2].thumbprint().unwrap().len(), 64);
    }

    #[test]
    fn test_missing_or_non_array_x5c_yields_no_keys() {
        for header in [
            json!({ "alg": "RS256" }),
            json!({ "alg": "RS256", "x5c": "MIIB" }),
            json!({ "alg": "RS256", "x5c": { "0": "MIIB" } }),
            json!({ "alg": "RS256", "x5c": null }),
            json!({ "alg": "RS256", "x5c": [] }),
        ] {
            let keys = resolve_keys(&token_with_header(header.clone())).unwrap();
            assert!(keys.is_empty(), "header: {header}");
        }
    }

    #[test]
    fn test_truncated_certificate_rejects_whole_chain() {
        let anchor = Builder::generate_anchor(KeyAlgorithmFamily::Rsa, "anchor").unwrap();
        let (_, cert) = issue(&anchor, KeyAlgorithmFamily::Rsa);
        let valid = base64_der(&cert);

        // valid base64, but only the first part of the DER structure
        let truncated = valid[..valid.len() / 2 / 4 * 4].to_owned();

        for x5c in [
            json!([truncated]),
            json!([valid.clone(), truncated]),
            json!([valid.clone(), "!!not base64!!"]),
            json!([valid.clone(), 42]),
        ] {
            let token = token_with_header(json!({ "alg": "RS256", "x5c": x5c.clone() }));
            let err = resolve_keys(&token).unwrap_err();
            assert_matches!(err.error, Error::MalformedCertificateChain, "x5c: {x5c}");
        }
    }

    #[test]
    fn test_unsupported_key_algorithm() {
        let anchor = Builder::generate_anchor(KeyAlgorithmFamily::Rsa, "anchor").unwrap();
        let ed25519 = PKey::generate_ed25519().unwrap();
        let cert = anchor.issue_certificate(&ed25519, "client", None).unwrap();

        let token = token_with_header(json!({ "alg": "EdDSA", "x5c": [base64_der(&cert)] }));
        let err = resolve_keys(&token).unwrap_err();

        assert_matches!(err.error, Error::UnsupportedKeyAlgorithm);
    }

    #[test]
    fn test_malformed_token() {
        let err = resolve_keys("definitely not a token").unwrap_err();
        assert_matches!(err.error, Error::MalformedToken);
    }
}
