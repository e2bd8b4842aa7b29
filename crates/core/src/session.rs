//! Device session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Placeholder for any field a best-effort lookup could not fill.
pub const UNKNOWN: &str = "Unknown";

/// Default heartbeat interval (5 minutes).
pub const HEARTBEAT_INTERVAL_SECS: u64 = 300;

/// Registry-assigned record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generates a fresh random record id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owning account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-generated token naming "this client's session".
///
/// Distinct from [`RecordId`]: it exists before the record is written and is
/// what the demotion sweep compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Device class of the client that signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Mobile,
    #[serde(rename = "Mobile App")]
    MobileApp,
    Tablet,
    Desktop,
    #[serde(rename = "Desktop App")]
    DesktopApp,
    #[serde(rename = "Smart TV")]
    SmartTv,
    Smartwatch,
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "Mobile",
            Self::MobileApp => "Mobile App",
            Self::Tablet => "Tablet",
            Self::Desktop => "Desktop",
            Self::DesktopApp => "Desktop App",
            Self::SmartTv => "Smart TV",
            Self::Smartwatch => "Smartwatch",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed browser identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserInfo {
    pub name: String,
    pub version: String,
    pub engine: String,
}

impl Default for BrowserInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
            engine: UNKNOWN.to_string(),
        }
    }
}

/// Parsed operating system identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
    pub platform: String,
}

impl Default for OsInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
            platform: UNKNOWN.to_string(),
        }
    }
}

/// Best-effort geolocation of the network address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

impl Location {
    /// Location used when the lookup fails.
    pub fn unknown() -> Self {
        Self {
            city: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            timezone: UNKNOWN.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.city == UNKNOWN && self.country == UNKNOWN && self.latitude == 0.0 && self.longitude == 0.0
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Advisory security classification. Never blocks sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityFlags {
    #[serde(rename = "isVPN")]
    pub is_vpn: bool,
    pub is_proxy: bool,
    pub is_tor: bool,
    pub is_incognito: bool,
    pub is_suspicious: bool,
    pub last_security_check: DateTime<Utc>,
}

impl SecurityFlags {
    /// Combines individual signals; `is_suspicious` is derived from the network flags only.
    pub fn new(is_vpn: bool, is_proxy: bool, is_tor: bool, is_incognito: bool) -> Self {
        Self {
            is_vpn,
            is_proxy,
            is_tor,
            is_incognito,
            is_suspicious: is_vpn || is_proxy || is_tor,
            last_security_check: Utc::now(),
        }
    }

    /// All network flags false, check time recorded.
    pub fn fail_open(is_incognito: bool) -> Self {
        Self::new(false, false, false, is_incognito)
    }
}

/// A persisted device session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: RecordId,
    pub session_id: SessionToken,
    pub user_id: AccountId,
    pub device_type: DeviceType,
    pub browser: BrowserInfo,
    pub os: OsInfo,
    pub network_address: String,
    pub location: Location,
    pub user_agent: String,
    pub screen_resolution: String,
    pub language: String,
    pub security: SecurityFlags,
    pub last_active: DateTime<Utc>,
    /// Set at creation and never cleared; termination deletes the record.
    pub is_active: bool,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Materializes a draft under a registry-assigned id.
    pub fn from_draft(id: RecordId, draft: SessionDraft) -> Self {
        Self {
            id,
            session_id: draft.session_id,
            user_id: draft.user_id,
            device_type: draft.device_type,
            browser: draft.browser,
            os: draft.os,
            network_address: draft.network_address,
            location: draft.location,
            user_agent: draft.user_agent,
            screen_resolution: draft.screen_resolution,
            language: draft.language,
            security: draft.security,
            last_active: draft.created_at,
            is_active: true,
            is_current: true,
            created_at: draft.created_at,
        }
    }

    /// Applies a patch. `last_active` only ever moves forward.
    pub fn apply(&mut self, patch: &SessionPatch) {
        if let Some(at) = patch.last_active {
            if at > self.last_active {
                self.last_active = at;
            }
        }
        if let Some(current) = patch.is_current {
            self.is_current = current;
        }
    }

    pub fn is_owned_by(&self, account: &AccountId) -> bool {
        &self.user_id == account
    }
}

/// A session record before the registry assigns it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    pub session_id: SessionToken,
    pub user_id: AccountId,
    pub device_type: DeviceType,
    pub browser: BrowserInfo,
    pub os: OsInfo,
    pub network_address: String,
    pub location: Location,
    pub user_agent: String,
    pub screen_resolution: String,
    pub language: String,
    pub security: SecurityFlags,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a session record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
}

impl SessionPatch {
    /// Heartbeat refresh.
    pub fn touch(at: DateTime<Utc>) -> Self {
        Self {
            last_active: Some(at),
            ..Default::default()
        }
    }

    /// Demotion sweep write.
    pub fn demote() -> Self {
        Self {
            is_current: Some(false),
            ..Default::default()
        }
    }
}

/// Query predicate over session records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFilter {
    pub user_id: AccountId,
    pub is_current: Option<bool>,
    pub is_active: Option<bool>,
}

impl SessionFilter {
    /// All sessions of an account.
    pub fn account(user_id: AccountId) -> Self {
        Self {
            user_id,
            is_current: None,
            is_active: None,
        }
    }

    pub fn current(mut self, is_current: bool) -> Self {
        self.is_current = Some(is_current);
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn matches(&self, session: &Session) -> bool {
        session.user_id == self.user_id
            && self.is_current.map_or(true, |c| session.is_current == c)
            && self.is_active.map_or(true, |a| session.is_active == a)
    }
}

/// Sessions of one account split for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionList {
    pub current: Option<Session>,
    pub others: Vec<Session>,
}

impl SessionList {
    /// Splits by `is_current`. If a login race left several current records,
    /// the newest one is shown as current and the rest as others.
    pub fn partition(mut sessions: Vec<Session>) -> Self {
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut current = None;
        let mut others = Vec::with_capacity(sessions.len());
        for session in sessions {
            if current.is_none() && session.is_current {
                current = Some(session);
            } else {
                others.push(session);
            }
        }

        Self { current, others }
    }

    pub fn len(&self) -> usize {
        self.others.len() + usize::from(self.current.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
