use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{error, info};

use super::remote::RemoteContent;
use super::sections::{
    fallback_stats, AboutHero, CtaSection, EventsSection, ImpactSection, TeamSection, TeamSettings,
};
use super::{Section, SectionKind};
use crate::error::StoreError;
use crate::executor::Executor;
use crate::response::{ApiResponse, ErrorResponse, WriteEnvelope};
use crate::store::{merge_documents, DocumentStore};

// ============================================================================
// Constants
// ============================================================================

pub const CTA_COLLECTION: &str = "cta_sections";
pub const CTA_ID: &str = "main-cta";
pub const CTA_CACHE_KEY: &str = "cta_main";
pub const CTA_CACHE_TTL: Duration = Duration::from_millis(300_000);

pub const ABOUT_HERO_COLLECTION: &str = "about_hero";
pub const TEAM_COLLECTION: &str = "about_team";

/// Singleton documents (hero, team) live under this id.
const SINGLETON_ID: &str = "main";

async fn find_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>, StoreError> {
    match store.find_one(collection, id).await? {
        Some(document) => Ok(Some(serde_json::from_value(document)?)),
        None => Ok(None),
    }
}

/// Load the team document, creating an empty one on first use.
async fn team_document(store: &dyn DocumentStore) -> Result<Value, StoreError> {
    if let Some(document) = store.find_one(TEAM_COLLECTION, SINGLETON_ID).await? {
        return Ok(document);
    }
    let empty = serde_json::to_value(TeamSection::empty())?;
    match store.insert(TEAM_COLLECTION, SINGLETON_ID, empty).await {
        // Created by a concurrent request
        Err(StoreError::DuplicateKey(_)) => store
            .find_one(TEAM_COLLECTION, SINGLETON_ID)
            .await?
            .ok_or_else(|| StoreError::Query("team document disappeared".to_string())),
        result => result,
    }
}

/// Stored CTA fields laid over the defaults, so documents written with only
/// some fields still read as a complete section.
fn cta_document(stored: Option<Value>) -> Result<Value, StoreError> {
    let defaults = serde_json::to_value(CtaSection::default())?;
    Ok(match stored {
        Some(document) => merge_documents(defaults, document),
        None => defaults,
    })
}

async fn find_cta(store: &dyn DocumentStore) -> Result<Option<CtaSection>, StoreError> {
    match store.find_one(CTA_COLLECTION, CTA_ID).await? {
        Some(document) => Ok(Some(serde_json::from_value(cta_document(Some(document))?)?)),
        None => Ok(None),
    }
}

/// Apply `changes` to the CTA document `id` and store the complete result.
/// Rejects changes that would not read back as a `CtaSection`.
async fn write_cta(store: &dyn DocumentStore, id: &str, changes: Value) -> Result<Value, StoreError> {
    let existing = store.find_one(CTA_COLLECTION, id).await?;
    let is_new = existing.is_none();

    let mut document = merge_documents(cta_document(existing)?, changes);
    if let Value::Object(fields) = &mut document {
        fields.insert("id".into(), Value::String(id.to_string()));
    }
    if let Err(e) = serde_json::from_value::<CtaSection>(document.clone()) {
        return Err(StoreError::validation(e.to_string()));
    }

    if is_new {
        store.insert(CTA_COLLECTION, id, document).await
    } else {
        store.upsert(CTA_COLLECTION, id, document).await
    }
}

/// Rejected writes get the matching client error; anything else is reported
/// with the operation's generic `message`.
fn write_error(err: &StoreError, message: &str) -> ErrorResponse {
    match err {
        StoreError::Validation(_) | StoreError::DuplicateKey(_) | StoreError::InvalidId(_) => {
            ErrorResponse::from_store_error(err)
        }
        _ => ErrorResponse::server_error(message),
    }
}

fn members_of(document: &Value) -> Vec<Value> {
    document
        .get("members")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Site content operations on top of the executor. Reads always answer;
/// writes report failures as `ErrorResponse`s.
#[derive(Clone)]
pub struct ContentService {
    executor: Executor,
    remote: Option<RemoteContent>,
}

impl ContentService {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            remote: None,
        }
    }

    /// Serve the API-backed sections through `remote`. Without it they
    /// always get their defaults.
    pub fn with_remote(mut self, remote: RemoteContent) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn remote(&self) -> Option<&RemoteContent> {
        self.remote.as_ref()
    }

    /// Any section, with its default when the source is unavailable.
    pub async fn get_section(&self, kind: SectionKind) -> Section {
        match kind {
            SectionKind::Cta => Section::Cta(self.get_cta().await.data),
            SectionKind::AboutHero => Section::AboutHero(self.get_about_hero().await),
            SectionKind::Team => Section::Team(self.get_team().await),
            SectionKind::Stats => Section::Stats(match &self.remote {
                Some(remote) => remote
                    .load_stats()
                    .await
                    .current()
                    .into_data()
                    .unwrap_or_else(fallback_stats),
                None => fallback_stats(),
            }),
            SectionKind::Events => Section::Events(match &self.remote {
                Some(remote) => remote.load_events().await.current().into_data().unwrap_or_default(),
                None => EventsSection::default(),
            }),
            SectionKind::Impact => Section::Impact(match &self.remote {
                Some(remote) => remote.load_impact().await.current().into_data().unwrap_or_default(),
                None => ImpactSection::default(),
            }),
        }
    }

    // ===== Call to action =====

    /// Cached for five minutes; a missing document yields the default.
    pub async fn get_cta(&self) -> ApiResponse<CtaSection> {
        let cta = self
            .executor
            .get_data_with_cache(
                |store| async move { find_cta(store.as_ref()).await },
                None,
                Some(CTA_CACHE_KEY),
                Some(CTA_CACHE_TTL),
            )
            .await;
        ApiResponse::ok(cta.unwrap_or_default())
    }

    /// Create or update a CTA document. `body` must carry a non-empty `id`;
    /// fields it leaves out keep their stored (or default) values.
    pub async fn save_cta(&self, body: Value) -> Result<WriteEnvelope<Value>, ErrorResponse> {
        let id = match body.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(ErrorResponse::bad_request("Missing required fields")),
        };

        let document = body.clone();
        let result = self
            .executor
            .save_data_with_queue(
                "CTA Section",
                move |store| async move { write_cta(store.as_ref(), &id, document).await },
                body,
            )
            .await;

        match result {
            Ok(outcome) => {
                if !outcome.is_simulated() {
                    self.executor.invalidate(CTA_CACHE_KEY);
                }
                Ok(WriteEnvelope::new("CTA saved successfully", outcome.into_data()))
            }
            Err(e) => {
                error!(error = %e, "Error saving CTA");
                Err(write_error(&e, "Internal server error"))
            }
        }
    }

    /// Merge `body` into the CTA document `id`, creating it if absent.
    pub async fn update_cta(&self, id: &str, body: Value) -> Result<WriteEnvelope<Value>, ErrorResponse> {
        let owned_id = id.to_string();
        let document = body.clone();
        let result = self
            .executor
            .save_data_with_queue(
                "CTA Section Update",
                move |store| async move { write_cta(store.as_ref(), &owned_id, document).await },
                body,
            )
            .await;

        match result {
            Ok(outcome) => {
                if !outcome.is_simulated() {
                    self.executor.invalidate(CTA_CACHE_KEY);
                }
                Ok(WriteEnvelope::new(
                    "CTA section updated successfully",
                    outcome.into_data(),
                ))
            }
            Err(e) => {
                error!(id, error = %e, "Error updating CTA");
                Err(write_error(&e, "Server error"))
            }
        }
    }

    // ===== About hero =====

    pub async fn get_about_hero(&self) -> AboutHero {
        self.executor
            .execute_with_fallback(
                "Get About Hero",
                |store| async move {
                    find_typed::<AboutHero>(store.as_ref(), ABOUT_HERO_COLLECTION, SINGLETON_ID)
                        .await
                        .map(Option::unwrap_or_default)
                },
                AboutHero::default(),
            )
            .await
    }

    /// Replace the hero section. Failures are masked; `data` is then null.
    pub async fn save_about_hero(&self, body: Value) -> Value {
        let saved = self
            .executor
            .execute_with_fallback(
                "Save About Hero",
                move |store| async move {
                    store
                        .upsert(ABOUT_HERO_COLLECTION, SINGLETON_ID, body)
                        .await
                        .map(Some)
                },
                None,
            )
            .await;
        json!({
            "message": "About Hero section saved successfully",
            "data": saved,
        })
    }

    // ===== Team =====

    pub async fn get_team(&self) -> TeamSection {
        self.executor
            .execute_with_fallback(
                "Get or Create Team",
                |store| async move {
                    let document = team_document(store.as_ref()).await?;
                    Ok::<_, StoreError>(serde_json::from_value::<TeamSection>(document)?)
                },
                TeamSection::default(),
            )
            .await
    }

    /// Add a member (no `id`) or merge fields into the member with that id.
    /// Returns the resulting member list, or an empty list if the store
    /// could not be updated.
    pub async fn save_member(&self, body: Value) -> Vec<Value> {
        let fields = match body {
            Value::Object(fields) => fields,
            _ => serde_json::Map::new(),
        };
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        self.executor
            .execute_with_fallback(
                "Save Member",
                move |store| async move {
                    let document = team_document(store.as_ref()).await?;
                    let mut members = members_of(&document);
                    match id {
                        Some(id) => {
                            for member in members.iter_mut() {
                                if member.get("id").and_then(Value::as_str) == Some(id.as_str()) {
                                    if let Value::Object(existing) = member {
                                        existing.extend(fields.clone());
                                    }
                                }
                            }
                        }
                        None => {
                            let mut member = fields;
                            member.insert(
                                "id".into(),
                                Value::String(Utc::now().timestamp_millis().to_string()),
                            );
                            members.push(Value::Object(member));
                        }
                    }
                    let stored = store
                        .upsert(TEAM_COLLECTION, SINGLETON_ID, json!({ "members": members }))
                        .await?;
                    Ok::<_, StoreError>(members_of(&stored))
                },
                Vec::new(),
            )
            .await
    }

    /// Remove a member. Reports success even when masked.
    pub async fn delete_member(&self, id: &str) -> bool {
        let id = id.to_string();
        self.executor
            .execute_with_fallback(
                "Delete Member",
                move |store| async move {
                    let document = team_document(store.as_ref()).await?;
                    let members: Vec<Value> = members_of(&document)
                        .into_iter()
                        .filter(|m| m.get("id").and_then(Value::as_str) != Some(id.as_str()))
                        .collect();
                    store
                        .upsert(TEAM_COLLECTION, SINGLETON_ID, json!({ "members": members }))
                        .await?;
                    info!(id = %id, "Deleted team member");
                    Ok::<_, StoreError>(true)
                },
                true,
            )
            .await
    }

    /// Replace the team section settings. Masked failures echo the input.
    pub async fn save_team_settings(&self, settings: TeamSettings) -> TeamSettings {
        let submitted = settings.clone();
        self.executor
            .execute_with_fallback(
                "Save Settings",
                move |store| async move {
                    team_document(store.as_ref()).await?;
                    let stored = store
                        .upsert(
                            TEAM_COLLECTION,
                            SINGLETON_ID,
                            json!({ "sectionSettings": serde_json::to_value(&settings)? }),
                        )
                        .await?;
                    let saved = stored.get("sectionSettings").cloned().unwrap_or(Value::Null);
                    Ok::<_, StoreError>(serde_json::from_value::<TeamSettings>(saved)?)
                },
                submitted,
            )
            .await
    }
}
