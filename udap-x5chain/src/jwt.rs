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

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use bherror::traits::{ErrorContext as _, ForeignError as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result, X5Chain};

/// Name of the JWS header parameter carrying the certificate chain.
pub const X5C_HEADER_PARAMETER: &str = "x5c";

/// Decoded JWS protected header, kept as a generic JSON object.
pub type ProtectedHeader = Map<String, Value>;

/// [`X5Chain`] helper struct for working with JSON Web Token (JWT).
///
/// The inner certificates are in base64-DER format (standard alphabet, padded).  This struct does
/// not contain the usual PEM begin/end header/footer!
///
/// See [JWS RFC 7515][1] for details on `x5c`.
///
/// NOTE: All chain manipulation should be done through [`X5Chain`]!  There are [`TryFrom`]
/// implementations to convert between the two structures.
///
/// [1]: <https://datatracker.ietf.org/doc/html/rfc7515#section-4.1.6>
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtX5Chain(Vec<String>);

impl JwtX5Chain {
    /// Wrap a list of base64-DER certificates, leaf first.
    pub fn new(base64_ders: Vec<String>) -> Self {
        Self(base64_ders)
    }

    /// Convert the chain to a list of base64-DER certificates.
    pub fn into_base64_ders(self) -> Vec<String> {
        self.0
    }

    /// Borrow the base64-DER certificates.
    pub fn as_base64_ders(&self) -> &[String] {
        &self.0
    }

    /// Decode every entry into DER bytes.
    ///
    /// Fails with [`Error::MalformedCertificateChain`] on the first entry which is not valid
    /// base64.
    pub fn decode_ders(&self) -> Result<Vec<Vec<u8>>> {
        self.0
            .iter()
            .enumerate()
            .map(|(i, base64_der)| {
                STANDARD
                    .decode(base64_der)
                    .foreign_err(|| Error::MalformedCertificateChain)
                    .ctx(|| format!("x5c[{i}] is not valid base64"))
            })
            .collect()
    }
}

impl TryFrom<&X5Chain> for JwtX5Chain {
    type Error = bherror::Error<Error>;

    fn try_from(x5chain: &X5Chain) -> Result<Self> {
        let base64_ders = x5chain
            .as_bytes()?
            .iter()
            .map(|der| STANDARD.encode(der))
            .collect();

        Ok(JwtX5Chain(base64_ders))
    }
}

/// Decode the protected header of a compact JWS **without** verifying the signature.
///
/// Only the first segment of the token is read.  The payload and the signature are neither
/// decoded nor inspected, so a token with an arbitrary payload can still have its header read.
///
/// # Errors
///
/// Returns [`Error::MalformedToken`] if the token does not have the compact `header.payload...`
/// shape, or the header is not a base64url-encoded JSON object.
pub fn decode_protected_header(token: &str) -> Result<ProtectedHeader> {
    let mut segments = token.trim().split('.');

    let header = match (segments.next(), segments.next()) {
        (Some(header), Some(_)) if !header.is_empty() => header,
        _ => {
            return Err(bherror::Error::root(Error::MalformedToken)
                .ctx("token is not in the JWS compact serialization"))
        }
    };

    let header = URL_SAFE_NO_PAD
        .decode(header)
        .foreign_err(|| Error::MalformedToken)
        .ctx(|| "protected header is not valid base64url")?;

    match serde_json::from_slice(&header)
        .foreign_err(|| Error::MalformedToken)
        .ctx(|| "protected header is not valid JSON")?
    {
        Value::Object(header) => Ok(header),
        _ => Err(bherror::Error::root(Error::MalformedToken)
            .ctx("protected header is not a JSON object")),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::{Builder, KeyAlgorithmFamily};

    fn encode_segment(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    #[test]
    fn test_decode_protected_header_ignores_payload() {
        let token = format!(
            "{}.{}.c2lnbmF0dXJl",
            encode_segment(&json!({ "alg": "RS256", "x5c": ["AAAA"] })),
            "this is not base64 at all!"
        );

        let header = decode_protected_header(&token).unwrap();

        assert_eq!(header["alg"], "RS256");
        assert_eq!(header[X5C_HEADER_PARAMETER], json!(["AAAA"]));
    }

    #[test]
    fn test_decode_protected_header_rejects_garbage() {
        for token in ["", "no-dots", ".payload.signature", "%%%.payload.signature"] {
            let err = decode_protected_header(token).unwrap_err();
            assert_matches!(err.error, Error::MalformedToken, "token: {token:?}");
        }

        let not_an_object = format!("{}.e30.", encode_segment(&json!(["alg"])));
        let err = decode_protected_header(&not_an_object).unwrap_err();
        assert_matches!(err.error, Error::MalformedToken);
    }

    #[test]
    fn test_from_x5chain_to_jwtx5chain_and_back() {
        let anchor = Builder::generate_anchor(KeyAlgorithmFamily::Ec, "anchor").unwrap();
        let client = Builder::generate_private_key(KeyAlgorithmFamily::Rsa).unwrap();
        let x5chain = anchor.generate_x5chain(&client, "client", None).unwrap();

        let jwt_x5chain = JwtX5Chain::try_from(&x5chain).unwrap();
        assert_eq!(jwt_x5chain.as_base64_ders().len(), 1);

        let received: X5Chain = jwt_x5chain.try_into().unwrap();
        assert_eq!(received, x5chain);
    }

    #[test]
    fn test_decode_ders_rejects_invalid_base64() {
        let chain = JwtX5Chain::new(vec!["not base64!".to_owned()]);

        let err = chain.decode_ders().unwrap_err();
        assert_matches!(err.error, Error::MalformedCertificateChain);
    }
}
