// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google People API client for mirrored contacts.
//!
//! Handles:
//! - Contact create / update / delete
//! - Etag preconditions on update (stale etag → `RemotePreconditionFailed`)
//! - Rate limit and token rejection detection

use crate::error::SyncError;
use crate::models::contact::{PhoneKind, ProvenanceTag};
use crate::models::{AccessToken, ContactRepresentation};
use crate::services::directory::{RemoteContact, RemoteDirectoryClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const PEOPLE_API_BASE: &str = "https://people.googleapis.com/v1";

/// Fields written on update. Must cover everything [`Person::from_representation`] sets.
const UPDATE_PERSON_FIELDS: &str =
    "names,phoneNumbers,emailAddresses,organizations,biographies,clientData";

/// Fields read back; only the resource name and etag are needed.
const READ_PERSON_FIELDS: &str = "metadata";

/// Google People API client.
#[derive(Clone)]
pub struct PeopleClient {
    http: reqwest::Client,
    base_url: String,
}

impl PeopleClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, PEOPLE_API_BASE)
    }

    /// Point the client at another host (tests use a local mock server).
    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Map a non-success response to the sync taxonomy.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            // People API reports a stale etag as 400 FAILED_PRECONDITION.
            412 => Err(SyncError::RemotePreconditionFailed),
            400 if body.contains("FAILED_PRECONDITION") => Err(SyncError::RemotePreconditionFailed),
            404 => Err(SyncError::RemoteNotFound(body)),
            429 => {
                tracing::warn!("Google People API rate limit hit (429)");
                Err(SyncError::RemoteApi(
                    "Google rate limit exceeded, retry later".to_string(),
                ))
            }
            401 => Err(SyncError::RemoteApi(
                "Google rejected the access token".to_string(),
            )),
            _ => Err(SyncError::RemoteApi(format!("HTTP {}: {}", status, body))),
        }
    }

    async fn parse_person(response: reqwest::Response) -> Result<RemoteContact, SyncError> {
        let person: PersonResponse = Self::check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::RemoteApi(format!("JSON parse error: {}", e)))?;

        Ok(RemoteContact {
            resource_id: person.resource_name,
            etag: person.etag,
        })
    }
}

fn transport_error(e: reqwest::Error) -> SyncError {
    SyncError::RemoteApi(e.to_string())
}

#[async_trait]
impl RemoteDirectoryClient for PeopleClient {
    async fn get(
        &self,
        token: &AccessToken,
        resource_id: &str,
    ) -> Result<RemoteContact, SyncError> {
        let url = format!("{}/{}", self.base_url, resource_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token.secret())
            .query(&[("personFields", READ_PERSON_FIELDS)])
            .send()
            .await
            .map_err(transport_error)?;

        Self::parse_person(response).await
    }

    async fn create(
        &self,
        token: &AccessToken,
        contact: &ContactRepresentation,
    ) -> Result<RemoteContact, SyncError> {
        let url = format!("{}/people:createContact", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token.secret())
            .query(&[("personFields", READ_PERSON_FIELDS)])
            .json(&Person::from_representation(contact, None))
            .send()
            .await
            .map_err(transport_error)?;

        Self::parse_person(response).await
    }

    async fn update(
        &self,
        token: &AccessToken,
        resource_id: &str,
        contact: &ContactRepresentation,
        etag: &str,
    ) -> Result<RemoteContact, SyncError> {
        let url = format!("{}/{}:updateContact", self.base_url, resource_id);

        let response = self
            .http
            .patch(&url)
            .bearer_auth(token.secret())
            .query(&[
                ("updatePersonFields", UPDATE_PERSON_FIELDS),
                ("personFields", READ_PERSON_FIELDS),
            ])
            .json(&Person::from_representation(contact, Some(etag)))
            .send()
            .await
            .map_err(transport_error)?;

        Self::parse_person(response).await
    }

    async fn delete(&self, token: &AccessToken, resource_id: &str) -> Result<(), SyncError> {
        let url = format!("{}/{}:deleteContact", self.base_url, resource_id);

        let response = self
            .http
            .delete(&url)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(transport_error)?;

        Self::check_response(response).await?;
        Ok(())
    }
}

// ─── Wire Types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonResponse {
    resource_name: String,
    #[serde(default)]
    etag: String,
}

/// Person body for `createContact` / `updateContact`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    names: Vec<Name>,
    phone_numbers: Vec<TypedValue>,
    email_addresses: Vec<TypedValue>,
    organizations: Vec<OrganizationBody>,
    biographies: Vec<Biography>,
    client_data: Vec<ClientData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Name {
    given_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    family_name: Option<String>,
    unstructured_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TypedValue {
    value: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrganizationBody {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Biography {
    value: String,
    content_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ClientData {
    key: String,
    value: String,
}

impl Person {
    /// Empty lists are sent on purpose: with `updatePersonFields` they clear
    /// values removed locally.
    fn from_representation(contact: &ContactRepresentation, etag: Option<&str>) -> Self {
        Self {
            etag: etag.map(str::to_string),
            names: vec![Name {
                given_name: contact.given_name.clone(),
                family_name: contact.family_name.clone(),
                unstructured_name: contact.display_name.clone(),
            }],
            phone_numbers: contact
                .phones
                .iter()
                .map(|phone| TypedValue {
                    value: phone.value.clone(),
                    kind: match phone.kind {
                        PhoneKind::Work => "work",
                        PhoneKind::Mobile => "mobile",
                    },
                })
                .collect(),
            email_addresses: contact
                .email
                .iter()
                .map(|email| TypedValue {
                    value: email.clone(),
                    kind: "work",
                })
                .collect(),
            organizations: contact
                .organization
                .iter()
                .map(|org| OrganizationBody {
                    name: org.name.clone(),
                    title: org.title.clone(),
                })
                .collect(),
            biographies: contact
                .note
                .iter()
                .map(|note| Biography {
                    value: note.clone(),
                    content_type: "TEXT_PLAIN",
                })
                .collect(),
            client_data: contact
                .provenance
                .iter()
                .map(|ProvenanceTag { key, value }| ClientData {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contact::ContactFields;

    #[test]
    fn test_person_body_shape() {
        let rep = ContactRepresentation::build(
            ContactFields {
                full_name: "Ana Ruiz",
                work_phone: Some("555-0100"),
                mobile_phone: Some("555-0101"),
                organization: Some("Harbor Builders"),
                ..Default::default()
            },
            "client_contact",
            "c1",
        )
        .unwrap();

        let body = serde_json::to_value(Person::from_representation(&rep, Some("etag-1"))).unwrap();

        assert_eq!(body["etag"], "etag-1");
        assert_eq!(body["names"][0]["givenName"], "Ana");
        assert_eq!(body["names"][0]["familyName"], "Ruiz");
        assert_eq!(body["phoneNumbers"][0]["type"], "work");
        assert_eq!(body["phoneNumbers"][1]["type"], "mobile");
        assert_eq!(body["organizations"][0]["name"], "Harbor Builders");
        assert_eq!(body["emailAddresses"], serde_json::json!([]));
        assert_eq!(body["clientData"][2]["key"], "local_id");
        assert_eq!(body["clientData"][2]["value"], "c1");
    }

    #[test]
    fn test_create_body_has_no_etag() {
        let rep = ContactRepresentation::build(
            ContactFields {
                full_name: "Sam",
                ..Default::default()
            },
            "vendor_contact",
            "v1",
        )
        .unwrap();

        let body = serde_json::to_value(Person::from_representation(&rep, None)).unwrap();
        assert!(body.get("etag").is_none());
    }
}
