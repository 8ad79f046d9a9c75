//! Data models for Mail.tm API responses and request bodies.

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};

/// A Mail.tm account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Unique account identifier.
    pub id: String,
    /// Full email address of the account.
    pub address: String,
    /// Storage quota in bytes.
    #[serde(rename = "quota")]
    pub quota_limit: u64,
    /// Storage used in bytes.
    #[serde(rename = "used")]
    pub quota_used: u64,
    pub is_disabled: bool,
    pub is_deleted: bool,
    #[serde(with = "crate::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether the account has used its whole quota.
    pub fn is_quota_limit_reached(&self) -> bool {
        self.quota_used >= self.quota_limit
    }

    /// Fraction of the quota in use, capped at `1.0`.
    pub fn quota_used_percentage(&self) -> f32 {
        if self.quota_limit == 0 {
            return 1.0;
        }
        (self.quota_used as f32 / self.quota_limit as f32).min(1.0)
    }
}

/// A domain that accepts Mail.tm addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: String,
    /// Domain name, e.g. `example.com`.
    pub domain: String,
    pub is_active: bool,
    pub is_private: bool,
    #[serde(with = "crate::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Sender or recipient of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageUser {
    pub address: String,
    #[serde(default)]
    pub name: String,
}

/// A message attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub disposition: String,
    pub transfer_encoding: String,
    pub related: bool,
    pub size: u64,
    /// Relative download path for the attachment.
    pub download_url: String,
}

/// A message in the inbox.
///
/// List responses omit the body fields, so `text`, `html`, `cc`, `bcc` and
/// `attachments` default to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    /// RFC 5322 `Message-ID`.
    pub msgid: String,
    pub from: MessageUser,
    pub to: Vec<MessageUser>,
    #[serde(default)]
    pub cc: Vec<MessageUser>,
    #[serde(default)]
    pub bcc: Vec<MessageUser>,
    pub subject: String,
    pub seen: bool,
    pub flagged: bool,
    pub is_deleted: bool,
    pub retention: bool,
    #[serde(with = "crate::datetime")]
    pub retention_date: DateTime<Utc>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: Vec<String>,
    pub has_attachments: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub size: u64,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(with = "crate::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Raw RFC 822 source of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSource {
    pub id: String,
    pub download_url: String,
    /// Full message source.
    pub data: String,
}

/// Credentials used to create an account or request a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub address: String,
    pub password: String,
}

impl Auth {
    /// Create credentials from an address and password.
    pub fn new(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
        }
    }

    /// Generate throwaway credentials on `domain`.
    ///
    /// The local part is 10 lowercase alphanumerics and the password 16
    /// mixed-case alphanumerics.
    ///
    /// # Examples
    /// ```
    /// # use mailtm_client::Auth;
    /// let auth = Auth::random("example.com");
    /// assert!(auth.address.ends_with("@example.com"));
    /// ```
    pub fn random(domain: &str) -> Self {
        let mut rng = rand::rng();
        let local: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        let password: String = rng
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        Self {
            address: format!("{local}@{domain}"),
            password,
        }
    }
}

/// JWT issued by the `token` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    /// Account id the token belongs to.
    #[serde(default)]
    pub id: Option<String>,
}

/// Decoded form of an empty success response.
///
/// Empty bodies are decoded as `{}`, and any other JSON object is accepted
/// as well.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResult {}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT_JSON: &str = r#"{
        "@context": "/contexts/Account",
        "@id": "/accounts/6149f0d5c5f6e1a0b8a0e9a1",
        "@type": "Account",
        "id": "6149f0d5c5f6e1a0b8a0e9a1",
        "address": "user@example.com",
        "quota": 40000000,
        "used": 10000000,
        "isDisabled": false,
        "isDeleted": false,
        "createdAt": "2021-09-21T14:45:09+00:00",
        "updatedAt": "2021-09-21T14:45:09+0000"
    }"#;

    #[test]
    fn account_maps_quota_fields() {
        let account: Account = serde_json::from_str(ACCOUNT_JSON).unwrap();
        assert_eq!(account.id, "6149f0d5c5f6e1a0b8a0e9a1");
        assert_eq!(account.quota_limit, 40_000_000);
        assert_eq!(account.quota_used, 10_000_000);
        assert!(!account.is_quota_limit_reached());
        assert!((account.quota_used_percentage() - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn quota_percentage_is_capped() {
        let mut account: Account = serde_json::from_str(ACCOUNT_JSON).unwrap();
        account.quota_used = 50_000_000;
        assert!(account.is_quota_limit_reached());
        assert_eq!(account.quota_used_percentage(), 1.0);
    }

    #[test]
    fn account_serializes_dates_in_fixed_format() {
        let account: Account = serde_json::from_str(ACCOUNT_JSON).unwrap();
        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value["createdAt"], "2021-09-21T14:45:09+0000");
        assert_eq!(value["quota"], 40_000_000);
    }

    #[test]
    fn list_message_without_body_fields_decodes() {
        let json = r#"{
            "id": "m1",
            "msgid": "<abc@example.com>",
            "from": {"address": "sender@example.com", "name": "Sender"},
            "to": [{"address": "user@example.com", "name": ""}],
            "subject": "Hello",
            "seen": false,
            "flagged": false,
            "isDeleted": false,
            "retention": true,
            "retentionDate": "2021-09-28T14:45:09+00:00",
            "hasAttachments": false,
            "size": 1024,
            "downloadUrl": "/messages/m1/download",
            "createdAt": "2021-09-21T14:45:09+00:00",
            "updatedAt": "2021-09-21T14:45:09+00:00"
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.from.name, "Sender");
        assert!(message.html.is_empty());
        assert!(message.attachments.is_empty());
        assert_eq!(message.download_url.as_deref(), Some("/messages/m1/download"));
    }

    #[test]
    fn empty_result_accepts_empty_object() {
        let empty: EmptyResult = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, EmptyResult {});
    }

    #[test]
    fn random_auth_uses_domain() {
        let auth = Auth::random("example.com");
        let (local, domain) = auth.address.split_once('@').unwrap();
        assert_eq!(domain, "example.com");
        assert_eq!(local.len(), 10);
        assert!(local.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(auth.password.len(), 16);
    }
}
