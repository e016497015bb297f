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

use bherror::traits::{ErrorContext as _, ForeignError as _};
use iref::UriBuf;
use openssl::{
    asn1::{Asn1Integer, Asn1Time},
    bn::BigNum,
    ec::{EcGroup, EcKey},
    hash::MessageDigest,
    nid::Nid,
    pkey::{HasPublic, PKey, PKeyRef, Private},
    rsa::Rsa,
    x509::{
        extension::{
            AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectAlternativeName,
            SubjectKeyIdentifier,
        },
        X509Builder, X509Name, X509NameBuilder, X509NameRef, X509VerifyResult, X509,
    },
};
use rand::RngCore as _;

use crate::{Error, KeyAlgorithmFamily, Result, X5Chain};

/// X.509v3
///
/// See [RFC 5280 - section 4.1.2.1](https://datatracker.ietf.org/doc/html/rfc5280#section-4.1.2.1)
const VERSION: i32 = 2;

/// Length of the certificate serial number in bytes.
///
/// See [RFC 5280 - section 4.1.2.2](https://datatracker.ietf.org/doc/html/rfc5280#section-4.1.2.2).
const SERIAL_NUMBER_BYTES: usize = 20;

/// Hardcoded duration of the validity period of issued certificates.
const VALIDITY_PERIOD_IN_DAYS: u32 = 365 * 10;

const RSA_KEY_BITS: u32 = 2048;

/// What an issued certificate may be used for.
#[derive(Clone, Copy)]
enum Profile {
    CertificateAuthority,
    EndEntity,
}

/// A lightweight certificate authority.
///
/// The builder holds a CA certificate with its private key and can:
///
/// - create a self-signed community anchor ([`Builder::generate_anchor`]),
/// - create subordinate intermediates ([`Builder::generate_intermediate`]),
/// - issue end-entity certificates for UDAP clients and servers, optionally with a URI Subject
///   Alternative Name ([`Builder::issue_certificate`], [`Builder::generate_x5chain`]).
///
/// # Use case
///
/// The primary use cases are tests or demo software - this is not a production-grade CA
/// implementation.  Customization of the issued certificates is mostly unsupported.
#[derive(Debug, Clone)]
pub struct Builder {
    certificate: X509,
    private_key: PKey<Private>,
    /// Certificates appended after the leaf when building a chain: this CA (unless self-signed)
    /// followed by its non-root issuers.
    chain: Vec<X509>,
}

impl Builder {
    /// Constructor of [`Builder`] from a CA private key and certificate, both in PEM format.
    ///
    /// A self-signed certificate is treated as an anchor and is never included in generated
    /// chains.
    pub fn new(private_key: &str, certificate: &str) -> Result<Self> {
        let private_key = PKey::private_key_from_pem(private_key.as_bytes())
            .foreign_err(|| Error::Builder)
            .ctx(|| "couldn't load private key")?;

        let certificate = X509::from_pem(certificate.as_bytes())
            .foreign_err(|| Error::Builder)
            .ctx(|| "couldn't load certificate")?;

        let certificate_key = certificate
            .public_key()
            .foreign_err(|| Error::Builder)
            .ctx(|| "couldn't read certificate public key")?;
        if !certificate_key.public_eq(&private_key) {
            return Err(bherror::Error::root(Error::Builder))
                .ctx(|| "private key does not match the certificate");
        }

        let chain = if certificate.issued(&certificate) == X509VerifyResult::OK {
            Vec::new()
        } else {
            vec![certificate.clone()]
        };

        Ok(Self {
            certificate,
            private_key,
            chain,
        })
    }

    /// Generate a fresh private key of the given family: RSA 2048 or EC P-256.
    pub fn generate_private_key(family: KeyAlgorithmFamily) -> Result<PKey<Private>> {
        match family {
            KeyAlgorithmFamily::Rsa => {
                let rsa = Rsa::generate(RSA_KEY_BITS)
                    .foreign_err(|| Error::Builder)
                    .ctx(|| "couldn't generate RSA key")?;
                PKey::from_rsa(rsa).foreign_err(|| Error::Builder)
            }
            KeyAlgorithmFamily::Ec => {
                let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)
                    .foreign_err(|| Error::Builder)?;
                let ec = EcKey::generate(&group)
                    .foreign_err(|| Error::Builder)
                    .ctx(|| "couldn't generate EC key")?;
                PKey::from_ec_key(ec).foreign_err(|| Error::Builder)
            }
        }
    }

    /// Generate a self-signed community anchor with a fresh key of the given family.
    pub fn generate_anchor(family: KeyAlgorithmFamily, common_name: &str) -> Result<Self> {
        let private_key = Self::generate_private_key(family)?;
        let subject_name = common_name_to_x509_name(common_name)?;

        let mut cert_builder = new_cert_builder(&private_key, &subject_name, &subject_name)?;
        append_extensions(&mut cert_builder, Profile::CertificateAuthority, None, None)?;
        cert_builder
            .sign(&private_key, MessageDigest::sha256())
            .foreign_err(|| Error::Builder)
            .ctx(|| "Cannot sign anchor certificate")?;

        Ok(Self {
            certificate: cert_builder.build(),
            private_key,
            chain: Vec::new(),
        })
    }

    /// Generate an intermediate CA issued by this builder, with a fresh key of the given family.
    pub fn generate_intermediate(
        &self,
        family: KeyAlgorithmFamily,
        common_name: &str,
    ) -> Result<Self> {
        let private_key = Self::generate_private_key(family)?;
        let subject_name = common_name_to_x509_name(common_name)?;

        let certificate = self
            .issue(&private_key, &subject_name, Profile::CertificateAuthority, None)
            .ctx(|| "couldn't issue intermediate certificate")?;

        let mut chain = vec![certificate.clone()];
        chain.extend(self.chain.iter().cloned());

        Ok(Self {
            certificate,
            private_key,
            chain,
        })
    }

    /// The CA certificate of this builder.
    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// The CA private key of this builder.
    pub fn private_key(&self) -> &PKeyRef<Private> {
        &self.private_key
    }

    /// Issue an end-entity certificate for `subject_key`, suitable for signing client assertions
    /// and metadata.
    ///
    /// If `san` is not [`None`], it is added as a URI Subject Alternative Name, as required for
    /// UDAP client and server certificates.
    pub fn issue_certificate<T: HasPublic>(
        &self,
        subject_key: &PKeyRef<T>,
        common_name: &str,
        san: Option<&UriBuf>,
    ) -> Result<X509> {
        let subject_name = common_name_to_x509_name(common_name)?;

        self.issue(subject_key, &subject_name, Profile::EndEntity, san)
            .ctx(|| "couldn't issue leaf certificate")
    }

    /// Create an [`X5Chain`] with a fresh leaf certificate for `subject_key`, followed by the
    /// certificates of this CA up to (but excluding) the self-signed anchor.
    pub fn generate_x5chain<T: HasPublic>(
        &self,
        subject_key: &PKeyRef<T>,
        common_name: &str,
        san: Option<&UriBuf>,
    ) -> Result<X5Chain> {
        let leaf = self.issue_certificate(subject_key, common_name, san)?;

        let mut chain = vec![leaf];
        chain.extend(self.chain.iter().cloned());

        X5Chain::new(chain)
    }

    /// Constructor of a test anchor [`Builder`] with an EC key.
    ///
    /// Do NOT use this method for production code, but only tests.
    #[cfg(any(feature = "test-utils", test))]
    pub fn dummy() -> Self {
        Self::generate_anchor(KeyAlgorithmFamily::Ec, "dummy-anchor").unwrap()
    }

    fn issue<T: HasPublic>(
        &self,
        subject_key: &PKeyRef<T>,
        subject_name: &X509Name,
        profile: Profile,
        san: Option<&UriBuf>,
    ) -> Result<X509> {
        let mut cert_builder =
            new_cert_builder(subject_key, subject_name, self.certificate.subject_name())?;
        append_extensions(&mut cert_builder, profile, Some(&self.certificate), san)?;
        cert_builder
            .sign(&self.private_key, MessageDigest::sha256())
            .foreign_err(|| Error::Builder)
            .ctx(|| "Cannot sign certificate")?;

        Ok(cert_builder.build())
    }
}

fn common_name_to_x509_name(common_name: &str) -> Result<X509Name> {
    let mut name = X509NameBuilder::new()
        .foreign_err(|| Error::Builder)
        .ctx(|| "couldn't create subject name")?;
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)
        .foreign_err(|| Error::Builder)
        .ctx(|| "couldn't append entry to subject name")?;

    Ok(name.build())
}

fn generate_random_serial_number() -> Result<Asn1Integer> {
    let mut bytes = [0u8; SERIAL_NUMBER_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    // positive and nonzero
    bytes[0] &= 0x7f;
    bytes[SERIAL_NUMBER_BYTES - 1] |= 0x01;

    BigNum::from_slice(&bytes)
        .and_then(|serial| serial.to_asn1_integer())
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot create serial number")
}

fn new_cert_builder<T: HasPublic>(
    subject_key: &PKeyRef<T>,
    subject_name: &X509Name,
    issuer_name: &X509NameRef,
) -> Result<X509Builder> {
    let mut cert_builder = X509::builder()
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot create cert builder")?;
    cert_builder
        .set_version(VERSION)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot set cert version")?;

    let serial_number = generate_random_serial_number()?;
    cert_builder
        .set_serial_number(&serial_number)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot set serial number")?;

    cert_builder
        .set_pubkey(subject_key)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot set public key")?;
    cert_builder
        .set_subject_name(subject_name)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot set subject name")?;
    cert_builder
        .set_issuer_name(issuer_name)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot set issuer name")?;

    let not_before = Asn1Time::days_from_now(0)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot create `not_before` time")?;
    cert_builder
        .set_not_before(&not_before)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot set `not_before` time")?;
    let not_after = Asn1Time::days_from_now(VALIDITY_PERIOD_IN_DAYS)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot create `not_after` time")?;
    cert_builder
        .set_not_after(&not_after)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot set `not_after` time")?;

    Ok(cert_builder)
}

/// Appends the extensions of the given profile.  `issuer` is [`None`] for self-signed
/// certificates, which get no authority key identifier.
fn append_extensions(
    cert_builder: &mut X509Builder,
    profile: Profile,
    issuer: Option<&X509>,
    san: Option<&UriBuf>,
) -> Result<()> {
    let (basic_constraints, key_usage) = match profile {
        Profile::CertificateAuthority => (
            BasicConstraints::new().critical().ca().build(),
            KeyUsage::new().critical().key_cert_sign().crl_sign().build(),
        ),
        Profile::EndEntity => (
            BasicConstraints::new().build(),
            KeyUsage::new().critical().digital_signature().build(),
        ),
    };

    let basic_constraints = basic_constraints
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot create basic constraints")?;
    cert_builder
        .append_extension(basic_constraints)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot append basic constraints")?;

    let key_usage = key_usage
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot create key usage")?;
    cert_builder
        .append_extension(key_usage)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot append key usage")?;

    let subject_key_identifier = SubjectKeyIdentifier::new()
        .build(&cert_builder.x509v3_context(issuer.map(|issuer| &**issuer), None))
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot create subject key identifier")?;
    cert_builder
        .append_extension(subject_key_identifier)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot append subject key identifier")?;

    if let Some(issuer) = issuer {
        let authority_key_identifier = AuthorityKeyIdentifier::new()
            .keyid(true)
            .build(&cert_builder.x509v3_context(Some(&**issuer), None))
            .foreign_err(|| Error::Builder)
            .ctx(|| "Cannot create authority key identifier")?;
        cert_builder
            .append_extension(authority_key_identifier)
            .foreign_err(|| Error::Builder)
            .ctx(|| "Cannot append authority key identifier")?;
    }

    if let Some(san) = san {
        let subject_alternative_name = SubjectAlternativeName::new()
            .uri(san.as_str())
            .build(&cert_builder.x509v3_context(issuer.map(|issuer| &**issuer), None))
            .foreign_err(|| Error::Builder)
            .ctx(|| "Cannot create subject alternative name")?;
        cert_builder
            .append_extension(subject_alternative_name)
            .foreign_err(|| Error::Builder)
            .ctx(|| "Cannot append subject alternative name")?;
    }

    Ok(())
}
