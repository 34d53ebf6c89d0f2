//! Calendar events client (Google Calendar v3)

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use super::http::send_json;
use crate::adapters::{Configurable, LiveReadable, SnapshotCapturable};
use crate::error::AdapterError;
use crate::types::{services, CalendarConfig};

pub const KEY_UPCOMING: &str = "calendar.upcoming";

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
const UPCOMING_LIMIT: &str = "25";

pub struct CalendarClient {
    client: reqwest::Client,
    config: CalendarConfig,
    base_url: String,
    timeout: Duration,
}

impl CalendarClient {
    pub fn new(config: CalendarConfig, timeout: Duration) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            client: reqwest::Client::new(),
            config,
            base_url,
            timeout,
        }
    }

    /// Next events from now, soonest first
    pub async fn upcoming(&self) -> Result<Value, AdapterError> {
        let token = self
            .config
            .access_token
            .as_deref()
            .ok_or_else(|| AdapterError::NotConfigured(services::CALENDAR.to_string()))?;

        let time_min = Utc::now().to_rfc3339();
        let request = self
            .client
            .get(format!("{}/calendars/{}/events", self.base_url, self.config.calendar_id))
            .bearer_auth(token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("maxResults", UPCOMING_LIMIT),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ]);
        let body = send_json(services::CALENDAR, request, self.timeout).await?;

        let events: Vec<Value> = body
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(event_summary).collect())
            .unwrap_or_default();
        Ok(Value::Array(events))
    }
}

/// Keep the fields the dashboard shows
fn event_summary(event: &Value) -> Value {
    let when = |field: &str| {
        event
            .get(field)
            .and_then(|t| t.get("dateTime").or_else(|| t.get("date")))
            .cloned()
            .unwrap_or(Value::Null)
    };
    json!({
        "id": event.get("id"),
        "summary": event.get("summary"),
        "location": event.get("location"),
        "start": when("start"),
        "end": when("end"),
        "allDay": event.pointer("/start/date").is_some(),
    })
}

impl Configurable for CalendarClient {
    fn service_name(&self) -> &str {
        services::CALENDAR
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn requires_interactive_auth(&self) -> bool {
        true
    }
}

#[async_trait]
impl LiveReadable for CalendarClient {
    fn keys(&self) -> Vec<String> {
        vec![KEY_UPCOMING.to_string()]
    }

    async fn read_live(&self, key: &str) -> Result<Value, AdapterError> {
        match key {
            KEY_UPCOMING => self.upcoming().await,
            other => Err(AdapterError::NoData(format!("calendar has no key {}", other))),
        }
    }
}

#[async_trait]
impl SnapshotCapturable for CalendarClient {
    async fn capture_live(&self) -> Result<Vec<(String, Value)>, AdapterError> {
        Ok(vec![(KEY_UPCOMING.to_string(), self.upcoming().await?)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_day_and_timed_events() {
        let timed = event_summary(&json!({
            "id": "a",
            "summary": "Standup",
            "start": {"dateTime": "2026-03-02T09:00:00-06:00"},
            "end": {"dateTime": "2026-03-02T09:15:00-06:00"}
        }));
        assert_eq!(timed["start"], "2026-03-02T09:00:00-06:00");
        assert_eq!(timed["allDay"], false);

        let all_day = event_summary(&json!({
            "id": "b",
            "summary": "Holiday",
            "start": {"date": "2026-03-03"},
            "end": {"date": "2026-03-04"}
        }));
        assert_eq!(all_day["start"], "2026-03-03");
        assert_eq!(all_day["allDay"], true);
    }

    #[test]
    fn test_interactive_and_unconfigured_by_default() {
        let client = CalendarClient::new(CalendarConfig::default(), Duration::from_secs(1));
        assert!(client.requires_interactive_auth());
        assert!(!client.is_configured());
    }
}
