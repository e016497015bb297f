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

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bherror::traits::{ErrorContext as _, ForeignError as _};
use openssl::{
    bn::{BigNum, BigNumContext},
    nid::Nid,
    pkey::{Id, PKeyRef, Public},
};
use serde_json::{Map, Value};

use crate::{Error, ResolvedKey, Result};

/// JSON Web Key holding only public parameters.
pub type PublicJwk = Map<String, Value>;

/// Names and coordinate sizes (in bytes) of the supported elliptic curves.
const CURVES: &[(Nid, &str, i32)] = &[
    (Nid::X9_62_PRIME256V1, "P-256", 32),
    (Nid::SECP384R1, "P-384", 48),
    (Nid::SECP521R1, "P-521", 66),
];

/// Look up the JWK `crv` name and coordinate size of a named curve.
pub fn jwk_curve(nid: Nid) -> Option<(&'static str, i32)> {
    CURVES
        .iter()
        .find(|(curve, _, _)| *curve == nid)
        .map(|(_, name, size)| (*name, *size))
}

/// Look up a named curve by its JWK `crv` name.
pub fn jwk_curve_nid(crv: &str) -> Option<(Nid, i32)> {
    CURVES
        .iter()
        .find(|(_, name, _)| *name == crv)
        .map(|(nid, _, size)| (*nid, *size))
}

/// Export an RSA or EC public key as a [RFC 7517][1] JWK.
///
/// [1]: <https://datatracker.ietf.org/doc/html/rfc7517>
pub fn public_key_to_jwk(key: &PKeyRef<Public>) -> Result<PublicJwk> {
    let mut jwk = Map::new();

    match key.id() {
        Id::RSA => {
            let rsa = key.rsa().foreign_err(|| Error::UnsupportedKeyAlgorithm)?;
            jwk.insert("kty".to_owned(), "RSA".into());
            jwk.insert("n".to_owned(), URL_SAFE_NO_PAD.encode(rsa.n().to_vec()).into());
            jwk.insert("e".to_owned(), URL_SAFE_NO_PAD.encode(rsa.e().to_vec()).into());
        }
        Id::EC => {
            let ec = key.ec_key().foreign_err(|| Error::UnsupportedKeyAlgorithm)?;
            let (crv, size) = ec
                .group()
                .curve_name()
                .and_then(jwk_curve)
                .ok_or_else(|| bherror::Error::root(Error::UnsupportedKeyAlgorithm))
                .ctx(|| "unsupported elliptic curve")?;

            let mut x = BigNum::new().foreign_err(|| Error::X5Chain)?;
            let mut y = BigNum::new().foreign_err(|| Error::X5Chain)?;
            let mut ctx = BigNumContext::new().foreign_err(|| Error::X5Chain)?;
            ec.public_key()
                .affine_coordinates(ec.group(), &mut x, &mut y, &mut ctx)
                .foreign_err(|| Error::X5Chain)
                .ctx(|| "unable to read EC point coordinates")?;

            let x = x.to_vec_padded(size).foreign_err(|| Error::X5Chain)?;
            let y = y.to_vec_padded(size).foreign_err(|| Error::X5Chain)?;

            jwk.insert("kty".to_owned(), "EC".into());
            jwk.insert("crv".to_owned(), crv.into());
            jwk.insert("x".to_owned(), URL_SAFE_NO_PAD.encode(x).into());
            jwk.insert("y".to_owned(), URL_SAFE_NO_PAD.encode(y).into());
        }
        other => {
            return Err(bherror::Error::root(Error::UnsupportedKeyAlgorithm))
                .ctx(|| format!("key type {other:?} can not be exported as JWK"))
        }
    }

    Ok(jwk)
}

impl ResolvedKey {
    /// Export the resolved public key as a JWK.
    pub fn to_jwk(&self) -> Result<PublicJwk> {
        public_key_to_jwk(self.public_key())
    }
}
