use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Public view of an account. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    /// Stored trimmed and lower-cased. Never changes after registration.
    pub email: String,
    pub card_number: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub profile_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account row as persisted, including the password hash.
///
/// Only the storage snapshot ever serializes this type; responses use `Account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAccount {
    #[serde(flatten)]
    pub account: Account,
    pub(crate) password_hash: String,
}

impl StoredAccount {
    pub(crate) fn new(account: Account, password_hash: String) -> Self {
        Self { account, password_hash }
    }

    pub fn id(&self) -> &str { &self.account.id }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    Aadhar,
    #[serde(rename = "PAN")]
    Pan,
    #[serde(rename = "Driving License")]
    DrivingLicense,
    #[serde(rename = "Voter ID")]
    VoterId,
    Passport,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        DocumentType::Aadhar,
        DocumentType::Pan,
        DocumentType::DrivingLicense,
        DocumentType::VoterId,
        DocumentType::Passport,
        DocumentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Aadhar => "Aadhar",
            DocumentType::Pan => "PAN",
            DocumentType::DrivingLicense => "Driving License",
            DocumentType::VoterId => "Voter ID",
            DocumentType::Passport => "Passport",
            DocumentType::Other => "Other",
        }
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        DocumentType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| s.to_string())
    }
}

/// MIME types accepted for uploads, with the file extension used in blob refs.
pub const ALLOWED_FILE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("application/pdf", "pdf"),
];

pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let mime = mime.trim().to_ascii_lowercase();
    ALLOWED_FILE_TYPES.iter().find(|(m, _)| *m == mime).map(|(_, ext)| *ext)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub document_name: String,
    pub document_type: DocumentType,
    pub file_type: String,
    pub file_size: u64,
    pub storage_ref: String,
    pub upload_date: DateTime<Utc>,
    pub is_verified: bool,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    pub is_encrypted: bool,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}
