use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Complaint, ComplaintType};

#[derive(Debug, Serialize)]
pub struct ComplaintFiledNotification {
    pub complaint_id: Uuid,
    pub business_id: Uuid,
    pub business_name: String,
    pub owner_user_id: Option<Uuid>,
    pub complaint_type: ComplaintType,
    pub complaint_summary: String,
    pub filed_at: DateTime<Utc>,
}

impl ComplaintFiledNotification {
    pub fn new(complaint: &Complaint, business_name: String, owner_user_id: Option<Uuid>) -> Self {
        Self {
            complaint_id: complaint.id,
            business_id: complaint.business_id,
            business_name,
            owner_user_id,
            complaint_type: complaint.complaint_type,
            complaint_summary: complaint.complaint_summary.clone(),
            filed_at: complaint.created_at,
        }
    }
}

/// Client for the notifications service that emails business owners.
#[derive(Clone)]
pub struct NotificationsClient {
    client: reqwest::Client,
    base_url: String,
}

impl NotificationsClient {
    pub fn new(base_url: String) -> Self {
        let normalized = normalize_base_url(&base_url);
        Self {
            client: reqwest::Client::new(),
            base_url: normalized,
        }
    }

    pub async fn complaint_filed(
        &self,
        notification: ComplaintFiledNotification,
    ) -> Result<(), String> {
        let url = format!("{}/notifications/complaint-filed", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&notification)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("Notification rejected ({status}): {text}"));
        }

        Ok(())
    }
}

fn normalize_base_url(value: &str) -> String {
    let trimmed = value.trim_end_matches('/');
    if trimmed.ends_with("/api/v1") {
        trimmed.to_string()
    } else {
        format!("{}/api/v1", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_api_prefix_once() {
        assert_eq!(
            normalize_base_url("http://localhost:8090/"),
            "http://localhost:8090/api/v1"
        );
        assert_eq!(
            normalize_base_url("http://notify.internal/api/v1/"),
            "http://notify.internal/api/v1"
        );
    }
}
