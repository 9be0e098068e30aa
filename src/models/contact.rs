// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Syncable contact records and their normalized remote representation.
//!
//! Client contacts and vendor contacts are separate ERP tables with
//! slightly different fields. Both implement [`SyncableEntity`], so the
//! reconciler only ever sees the trait.

use crate::error::SyncError;
use crate::models::link::LinkState;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

/// Value of the `source` provenance tag on every mirrored contact.
pub const PROVENANCE_SOURCE: &str = "construction-erp";

/// A local record eligible for mirroring into the remote directory.
pub trait SyncableEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Audit and provenance type name, e.g. `client_contact`.
    const ENTITY_TYPE: &'static str;
    /// Store collection.
    const COLLECTION: &'static str;
    /// Plural label for summaries shown to users.
    const LABEL: &'static str;

    fn id(&self) -> &str;
    fn owner_id(&self) -> &str;
    fn representation(&self) -> Result<ContactRepresentation, SyncError>;
    fn link(&self) -> &LinkState;
    fn link_mut(&mut self) -> &mut LinkState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneKind {
    Work,
    Mobile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    pub value: String,
    pub kind: PhoneKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub name: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceTag {
    pub key: String,
    pub value: String,
}

/// Provider-neutral contact shape pushed to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRepresentation {
    pub display_name: String,
    pub given_name: String,
    pub family_name: Option<String>,
    pub phones: Vec<PhoneNumber>,
    pub email: Option<String>,
    pub organization: Option<Organization>,
    pub note: Option<String>,
    /// Tags that let a remote contact be traced back to its local row.
    pub provenance: Vec<ProvenanceTag>,
}

/// Raw local fields; [`ContactRepresentation::build`] normalizes them.
#[derive(Debug, Default)]
pub struct ContactFields<'a> {
    pub full_name: &'a str,
    pub work_phone: Option<&'a str>,
    pub mobile_phone: Option<&'a str>,
    pub email: Option<&'a str>,
    pub organization: Option<&'a str>,
    pub title: Option<&'a str>,
    pub note: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ContactRepresentation {
    pub fn build(
        fields: ContactFields<'_>,
        entity_type: &str,
        local_id: &str,
    ) -> Result<Self, SyncError> {
        let display_name = fields.full_name.split_whitespace().collect::<Vec<_>>().join(" ");
        if display_name.is_empty() {
            return Err(SyncError::Validation("contact name is empty".to_string()));
        }

        let (given_name, family_name) = match display_name.split_once(' ') {
            Some((given, family)) => (given.to_string(), Some(family.to_string())),
            None => (display_name.clone(), None),
        };

        let phones = [
            (fields.work_phone, PhoneKind::Work),
            (fields.mobile_phone, PhoneKind::Mobile),
        ]
        .into_iter()
        .filter_map(|(value, kind)| non_blank(value).map(|value| PhoneNumber { value, kind }))
        .collect();

        let email = non_blank(fields.email);
        if let Some(email) = &email {
            if !email.validate_email() {
                return Err(SyncError::Validation(format!(
                    "invalid email address: {}",
                    email
                )));
            }
        }

        let organization = non_blank(fields.organization).map(|name| Organization {
            name,
            title: non_blank(fields.title),
        });

        let provenance = vec![
            ProvenanceTag {
                key: "source".to_string(),
                value: PROVENANCE_SOURCE.to_string(),
            },
            ProvenanceTag {
                key: "local_type".to_string(),
                value: entity_type.to_string(),
            },
            ProvenanceTag {
                key: "local_id".to_string(),
                value: local_id.to_string(),
            },
        ];

        Ok(Self {
            display_name,
            given_name,
            family_name,
            phones,
            email,
            organization,
            note: non_blank(fields.note.as_deref()),
            provenance,
        })
    }
}

// ─── Client Contacts ────────────────────────────────────────────

/// Contact person at a client company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientContact {
    /// Local ID (also used as document ID)
    pub id: String,
    /// Principal whose Google account holds the mirror
    pub owner_id: String,
    pub client_id: String,
    pub client_name: String,
    pub full_name: String,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub link: LinkState,
    pub updated_at: DateTime<Utc>,
}

impl ClientContact {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        client_name: impl Into<String>,
        full_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            client_id: String::new(),
            client_name: client_name.into(),
            full_name: full_name.into(),
            job_title: None,
            phone: None,
            mobile: None,
            email: None,
            notes: None,
            link: LinkState::default(),
            updated_at: Utc::now(),
        }
    }
}

impl SyncableEntity for ClientContact {
    const ENTITY_TYPE: &'static str = "client_contact";
    const COLLECTION: &'static str = crate::db::collections::CLIENT_CONTACTS;
    const LABEL: &'static str = "client contacts";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn representation(&self) -> Result<ContactRepresentation, SyncError> {
        ContactRepresentation::build(
            ContactFields {
                full_name: &self.full_name,
                work_phone: self.phone.as_deref(),
                mobile_phone: self.mobile.as_deref(),
                email: self.email.as_deref(),
                organization: Some(self.client_name.as_str()),
                title: self.job_title.as_deref(),
                note: self.notes.clone(),
            },
            Self::ENTITY_TYPE,
            &self.id,
        )
    }

    fn link(&self) -> &LinkState {
        &self.link
    }

    fn link_mut(&mut self) -> &mut LinkState {
        &mut self.link
    }
}

// ─── Vendor Contacts ────────────────────────────────────────────

/// Contact person at a vendor or subcontractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorContact {
    /// Local ID (also used as document ID)
    pub id: String,
    /// Principal whose Google account holds the mirror
    pub owner_id: String,
    pub vendor_id: String,
    pub vendor_name: String,
    pub contact_name: String,
    /// Trade or supply category, e.g. "Electrical"
    #[serde(default)]
    pub trade: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub link: LinkState,
    pub updated_at: DateTime<Utc>,
}

impl VendorContact {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        vendor_name: impl Into<String>,
        contact_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            vendor_id: String::new(),
            vendor_name: vendor_name.into(),
            contact_name: contact_name.into(),
            trade: None,
            phone: None,
            mobile: None,
            email: None,
            notes: None,
            link: LinkState::default(),
            updated_at: Utc::now(),
        }
    }

    fn note(&self) -> Option<String> {
        let trade = non_blank(self.trade.as_deref()).map(|t| format!("Trade: {}", t));
        let notes = non_blank(self.notes.as_deref());
        match (trade, notes) {
            (Some(trade), Some(notes)) => Some(format!("{}\n{}", trade, notes)),
            (trade, notes) => trade.or(notes),
        }
    }
}

impl SyncableEntity for VendorContact {
    const ENTITY_TYPE: &'static str = "vendor_contact";
    const COLLECTION: &'static str = crate::db::collections::VENDOR_CONTACTS;
    const LABEL: &'static str = "vendor contacts";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn representation(&self) -> Result<ContactRepresentation, SyncError> {
        ContactRepresentation::build(
            ContactFields {
                full_name: &self.contact_name,
                work_phone: self.phone.as_deref(),
                mobile_phone: self.mobile.as_deref(),
                email: self.email.as_deref(),
                organization: Some(self.vendor_name.as_str()),
                title: None,
                note: self.note(),
            },
            Self::ENTITY_TYPE,
            &self.id,
        )
    }

    fn link(&self) -> &LinkState {
        &self.link
    }

    fn link_mut(&mut self) -> &mut LinkState {
        &mut self.link
    }
}
