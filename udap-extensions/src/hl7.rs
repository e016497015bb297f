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

use crate::{DeclaredField, ExtensionEnvelope, ExtensionShape};

/// Declared members of the `hl7-b2b` authorization extension object.
///
/// See the [HL7 UDAP Security IG][1].
///
/// [1]: <https://hl7.org/fhir/us/udap-security/b2b.html#b2b-authorization-extension-object>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hl7B2b {
    /// Purposes of use of the requested data.
    pub purpose_of_use: Option<Vec<String>>,
    /// Consent policies the request is made under.
    pub consent_policy: Option<Vec<String>>,
    /// References to consent documents.
    pub consent_reference: Option<Vec<String>>,
}

impl ExtensionShape for Hl7B2b {
    const KEY: &'static str = "hl7-b2b";

    const FIELDS: &'static [DeclaredField<Self>] = &[
        DeclaredField {
            wire_name: "purpose_of_use",
            get: |b2b| b2b.purpose_of_use.as_deref(),
            set: |b2b, values| b2b.purpose_of_use = Some(values),
        },
        DeclaredField {
            wire_name: "consent_policy",
            get: |b2b| b2b.consent_policy.as_deref(),
            set: |b2b, values| b2b.consent_policy = Some(values),
        },
        DeclaredField {
            wire_name: "consent_reference",
            get: |b2b| b2b.consent_reference.as_deref(),
            set: |b2b, values| b2b.consent_reference = Some(values),
        },
    ];
}

impl ExtensionEnvelope<Hl7B2b> {
    /// The `version` member.
    pub fn version(&self) -> Option<&str> {
        self.additional_str("version")
    }

    /// The `subject_name` member.
    pub fn subject_name(&self) -> Option<&str> {
        self.additional_str("subject_name")
    }

    /// The `subject_id` member.
    pub fn subject_id(&self) -> Option<&str> {
        self.additional_str("subject_id")
    }

    /// The `subject_role` member.
    pub fn subject_role(&self) -> Option<&str> {
        self.additional_str("subject_role")
    }

    /// The `organization_name` member.
    pub fn organization_name(&self) -> Option<&str> {
        self.additional_str("organization_name")
    }

    /// The `organization_id` member.
    pub fn organization_id(&self) -> Option<&str> {
        self.additional_str("organization_id")
    }
}

/// Declared members of the `hl7-b2b-user` authorization extension object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hl7B2bUser {
    /// Purposes of use of the requested data.
    pub purpose_of_use: Option<Vec<String>>,
    /// Consent policies the request is made under.
    pub consent_policy: Option<Vec<String>>,
    /// References to consent documents.
    pub consent_reference: Option<Vec<String>>,
}

impl ExtensionShape for Hl7B2bUser {
    const KEY: &'static str = "hl7-b2b-user";

    const FIELDS: &'static [DeclaredField<Self>] = &[
        DeclaredField {
            wire_name: "purpose_of_use",
            get: |user| user.purpose_of_use.as_deref(),
            set: |user, values| user.purpose_of_use = Some(values),
        },
        DeclaredField {
            wire_name: "consent_policy",
            get: |user| user.consent_policy.as_deref(),
            set: |user, values| user.consent_policy = Some(values),
        },
        DeclaredField {
            wire_name: "consent_reference",
            get: |user| user.consent_reference.as_deref(),
            set: |user, values| user.consent_reference = Some(values),
        },
    ];
}

impl ExtensionEnvelope<Hl7B2bUser> {
    /// The `version` member.
    pub fn version(&self) -> Option<&str> {
        self.additional_str("version")
    }

    /// The `user_person` member, an opaque FHIR Person resource.
    pub fn user_person(&self) -> Option<&serde_json::Value> {
        self.additional().get("user_person")
    }
}
