//! Supabase (PostgREST) storage implementation.
//!
//! Rows use the column layout of the `ezynotify` table:
//!
//! ```text
//! id, url, keywords {"keywords": [..]}, telegramID, reference, isUpdated,
//! foundKeyword [{keyword, foundAt}], shouldContinueCheck,
//! Updates [{change, action, context, time}], shouldSendDetailedUpdates,
//! checkUpdates, completed
//! ```
//!
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS` strings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    Change, ChangeAction, FoundKeyword, MonitoredResource, ResourceUpdate, StoreConfig,
};
use crate::storage::ResourceStore;
use crate::utils::{http, parse_http_url};

const SELECT_COLUMNS: &str = "id,url,keywords,telegramID,reference,isUpdated,foundKeyword,\
     shouldContinueCheck,Updates,shouldSendDetailedUpdates,checkUpdates,completed";

const API_TIMEOUT_SECS: u64 = 30;

/// PostgREST-backed resource store.
pub struct SupabaseStore {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SupabaseStore {
    /// Create a store for `table` on the Supabase project at `base_url`.
    pub fn new(base_url: &str, api_key: impl Into<String>, table: &str) -> Result<Self> {
        let base = parse_http_url(base_url)?;
        Ok(Self {
            client: http::create_api_client(API_TIMEOUT_SECS)?,
            endpoint: format!(
                "{}/rest/v1/{}",
                base.as_str().trim_end_matches('/'),
                table
            ),
            api_key: api_key.into(),
        })
    }

    /// Create a store from the `[store]` configuration section.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let url = config
            .supabase_url
            .as_deref()
            .ok_or_else(|| AppError::config("store.supabase_url (SUPABASE_URL) is not set"))?;
        let key = config
            .supabase_key
            .as_deref()
            .ok_or_else(|| AppError::config("store.supabase_key (SUPABASE_KEY) is not set"))?;
        Self::new(url, key, &config.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl ResourceStore for SupabaseStore {
    async fn list_active_resources(&self) -> Result<Vec<MonitoredResource>> {
        let response = self
            .authorized(self.client.get(&self.endpoint))
            .query(&[("select", SELECT_COLUMNS)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::store(
                "list_active_resources",
                format!("status {status}: {body}"),
            ));
        }

        let rows: Vec<Value> = response.json().await?;
        Ok(decode_rows(rows))
    }

    async fn update_resource(&self, id: &str, update: &ResourceUpdate) -> Result<()> {
        let body = RowUpdate::from(update);
        let response = self
            .authorized(self.client.patch(&self.endpoint))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::store(
                "update_resource",
                format!("row {id}: status {status}: {body}"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeywordColumn {
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FoundKeywordRow {
    keyword: String,
    #[serde(rename = "foundAt", with = "row_time")]
    found_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChangeRow {
    change: String,
    action: ChangeAction,
    #[serde(default)]
    context: String,
    #[serde(with = "row_time")]
    time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ResourceRow {
    id: Value,
    url: Option<String>,
    #[serde(default)]
    keywords: Option<KeywordColumn>,
    #[serde(rename = "telegramID", default)]
    telegram_id: Option<Value>,
    #[serde(default)]
    reference: Option<String>,
    #[serde(rename = "isUpdated", default)]
    is_updated: Option<bool>,
    #[serde(rename = "foundKeyword", default)]
    found_keyword: Option<Vec<FoundKeywordRow>>,
    #[serde(rename = "shouldContinueCheck", default)]
    should_continue_check: Option<bool>,
    #[serde(rename = "Updates", default)]
    updates: Option<Vec<ChangeRow>>,
    #[serde(rename = "shouldSendDetailedUpdates", default)]
    should_send_detailed_updates: Option<bool>,
    #[serde(rename = "checkUpdates", default)]
    check_updates: Option<bool>,
    #[serde(default)]
    completed: Option<bool>,
}

/// Decode rows one at a time; a malformed row is logged and skipped.
fn decode_rows(rows: Vec<Value>) -> Vec<MonitoredResource> {
    rows.into_iter()
        .filter_map(|raw| {
            let id = raw.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<ResourceRow>(raw) {
                Ok(row) => row.into_resource(),
                Err(e) => {
                    log::warn!("Skipping undecodable row {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

impl ResourceRow {
    fn into_resource(self) -> Option<MonitoredResource> {
        let Some(id) = value_to_string(&self.id) else {
            log::warn!("Skipping row without an id (url: {:?})", self.url);
            return None;
        };
        let Some(url) = self.url.filter(|u| !u.trim().is_empty()) else {
            log::warn!("Skipping row {} without a URL", id);
            return None;
        };

        Some(MonitoredResource {
            id,
            url,
            pending_keywords: self.keywords.unwrap_or_default().keywords,
            found_keywords: self
                .found_keyword
                .unwrap_or_default()
                .into_iter()
                .map(|f| FoundKeyword {
                    keyword: f.keyword,
                    found_at: f.found_at,
                })
                .collect(),
            reference_text: self.reference.unwrap_or_default(),
            update_log: self
                .updates
                .unwrap_or_default()
                .into_iter()
                .map(|c| Change {
                    changed_text: c.change,
                    action: c.action,
                    context: c.context,
                    observed_at: c.time,
                })
                .collect(),
            recipient_id: self.telegram_id.as_ref().and_then(value_to_string),
            send_detailed_updates: self.should_send_detailed_updates.unwrap_or(false),
            check_updates: self.check_updates.unwrap_or(false),
            continue_after_all_found: self.should_continue_check.unwrap_or(true),
            is_updated: self.is_updated.unwrap_or(false),
            completed: self.completed.unwrap_or(false),
        })
    }
}

#[derive(Debug, Default, Serialize)]
struct RowUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keywords: Option<KeywordColumn>,
    #[serde(rename = "foundKeyword", skip_serializing_if = "Option::is_none")]
    found_keyword: Option<Vec<FoundKeywordRow>>,
    #[serde(rename = "Updates", skip_serializing_if = "Option::is_none")]
    updates: Option<Vec<ChangeRow>>,
    #[serde(rename = "isUpdated", skip_serializing_if = "Option::is_none")]
    is_updated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
}

impl From<&ResourceUpdate> for RowUpdate {
    fn from(update: &ResourceUpdate) -> Self {
        Self {
            reference: update.reference_text.clone(),
            keywords: update.pending_keywords.as_ref().map(|keywords| KeywordColumn {
                keywords: keywords.clone(),
            }),
            found_keyword: update.found_keywords.as_ref().map(|found| {
                found
                    .iter()
                    .map(|f| FoundKeywordRow {
                        keyword: f.keyword.clone(),
                        found_at: f.found_at,
                    })
                    .collect()
            }),
            updates: update.update_log.as_ref().map(|log| {
                log.iter()
                    .map(|c| ChangeRow {
                        change: c.changed_text.clone(),
                        action: c.action,
                        context: c.context.clone(),
                        time: c.observed_at,
                    })
                    .collect()
            }),
            is_updated: update.is_updated,
            // completion is one-way; never write a false
            completed: update.completed.filter(|completed| *completed),
        }
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `YYYY-MM-DD HH:MM:SS` timestamps, with RFC 3339 accepted on input.
mod row_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(raw.trim(), FORMAT)
            .map(|naive| naive.and_utc())
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw.trim())
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_row_maps_to_resource() {
        let row: ResourceRow = serde_json::from_value(json!({
            "id": 17,
            "url": "https://example.com/shop",
            "keywords": { "keywords": ["sale", "promo"] },
            "telegramID": 123456789,
            "reference": "old text.",
            "isUpdated": null,
            "foundKeyword": [{ "keyword": "new", "foundAt": "2025-03-01 10:00:00" }],
            "shouldContinueCheck": false,
            "Updates": [{
                "change": "15",
                "action": "added",
                "context": "price is <b>15</b>",
                "time": "2025-03-02 11:30:00"
            }],
            "shouldSendDetailedUpdates": true,
            "checkUpdates": true,
            "completed": false
        }))
        .unwrap();

        let resource = row.into_resource().unwrap();
        assert_eq!(resource.id, "17");
        assert_eq!(resource.recipient_id.as_deref(), Some("123456789"));
        assert_eq!(resource.pending_keywords, vec!["sale", "promo"]);
        assert_eq!(resource.found_keywords[0].keyword, "new");
        assert_eq!(
            resource.found_keywords[0].found_at,
            Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(resource.update_log[0].changed_text, "15");
        assert_eq!(resource.update_log[0].action, ChangeAction::Added);
        assert!(!resource.continue_after_all_found);
        assert!(resource.send_detailed_updates);
        assert!(resource.check_updates);
        assert!(!resource.is_updated);
    }

    #[test]
    fn test_sparse_row_uses_defaults() {
        let row: ResourceRow = serde_json::from_value(json!({
            "id": "abc",
            "url": "https://example.com"
        }))
        .unwrap();

        let resource = row.into_resource().unwrap();
        assert!(resource.pending_keywords.is_empty());
        assert!(resource.reference_text.is_empty());
        assert!(resource.recipient_id.is_none());
        assert!(resource.continue_after_all_found);
        assert!(!resource.check_updates);
    }

    #[test]
    fn test_row_without_url_is_skipped() {
        let row: ResourceRow = serde_json::from_value(json!({ "id": 1, "url": null })).unwrap();
        assert!(row.into_resource().is_none());
    }

    #[test]
    fn test_row_without_id_is_skipped() {
        let row: ResourceRow =
            serde_json::from_value(json!({ "id": " ", "url": "https://example.com" })).unwrap();
        assert!(row.into_resource().is_none());
    }

    #[test]
    fn test_malformed_row_does_not_hide_others() {
        let resources = decode_rows(vec![
            json!({ "id": 1, "url": "https://example.com/good", "keywords": { "keywords": ["sale"] } }),
            json!({
                "id": 2,
                "url": "https://example.com/bad",
                "foundKeyword": [{ "keyword": "x", "foundAt": "01/03/2025" }]
            }),
            json!({
                "id": 3,
                "url": "https://example.com/odd-action",
                "Updates": [{ "change": "x", "action": "moved", "time": "2025-03-01 10:00:00" }]
            }),
            json!({ "id": 4, "url": "https://example.com/also-good" }),
        ]);

        let ids: Vec<&str> = resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4"]);
        assert_eq!(resources[0].pending_keywords, vec!["sale"]);
    }

    #[test]
    fn test_update_body_uses_table_columns() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let update = ResourceUpdate {
            pending_keywords: Some(vec![]),
            found_keywords: Some(vec![FoundKeyword {
                keyword: "sale".into(),
                found_at: at,
            }]),
            completed: Some(true),
            ..ResourceUpdate::default()
        };

        let body = serde_json::to_value(RowUpdate::from(&update)).unwrap();
        assert_eq!(
            body,
            json!({
                "keywords": { "keywords": [] },
                "foundKeyword": [{ "keyword": "sale", "foundAt": "2025-03-01 10:00:00" }],
                "completed": true
            })
        );
    }

    #[test]
    fn test_update_body_never_clears_completed() {
        let update = ResourceUpdate {
            completed: Some(false),
            ..ResourceUpdate::default()
        };
        let body = serde_json::to_value(RowUpdate::from(&update)).unwrap();
        assert_eq!(body, json!({}));
    }

    #[test]
    fn test_row_time_accepts_rfc3339() {
        assert_eq!(
            row_time::parse("2025-03-01T10:00:00Z"),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap())
        );
        assert!(row_time::parse("yesterday").is_none());
    }

    #[test]
    fn test_new_builds_rest_endpoint() {
        let store = SupabaseStore::new("https://project.supabase.co/", "key", "ezynotify").unwrap();
        assert_eq!(store.endpoint, "https://project.supabase.co/rest/v1/ezynotify");
    }
}
