//! Test fixtures: accounts, user agents, and device environments.

use fingerprint::GeoRecord;
use session_core::{ClientEnvironment, Location};
use std::future::Future;
use std::time::Duration;

pub const STAFF_IDENTITY: &str = "m.osei@school.test";
pub const STAFF_ACCOUNT: &str = "acct-osei";
pub const STAFF_PASSWORD: &str = "chalk-and-slate-42";

pub const REGISTRAR_IDENTITY: &str = "registrar@school.test";
pub const REGISTRAR_ACCOUNT: &str = "acct-registrar";
pub const REGISTRAR_PASSWORD: &str = "enrolment-2026";

pub const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const IPHONE_SAFARI_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
pub const IPAD_SAFARI_UA: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";

/// Desktop browser on a school network.
pub fn desktop_env() -> ClientEnvironment {
    ClientEnvironment {
        screen_resolution: Some("1920x1080".to_string()),
        language: Some("en-GB".to_string()),
        timezone: Some("Africa/Accra".to_string()),
        ..ClientEnvironment::with_user_agent(DESKTOP_CHROME_UA)
    }
    .with_client_ip("203.0.113.10".parse().ok())
}

/// Phone on a mobile carrier.
pub fn phone_env() -> ClientEnvironment {
    ClientEnvironment {
        screen_resolution: Some("390x844".to_string()),
        language: Some("en-US".to_string()),
        max_touch_points: Some(5),
        ..ClientEnvironment::with_user_agent(IPHONE_SAFARI_UA)
    }
    .with_client_ip("198.51.100.77".parse().ok())
}

/// Tablet with no reported address.
pub fn tablet_env() -> ClientEnvironment {
    ClientEnvironment {
        max_touch_points: Some(5),
        ..ClientEnvironment::with_user_agent(IPAD_SAFARI_UA)
    }
}

pub fn accra_geo() -> GeoRecord {
    GeoRecord {
        ip: "203.0.113.10".parse().ok(),
        location: Location {
            city: "Accra".to_string(),
            country: "Ghana".to_string(),
            region: "Greater Accra".to_string(),
            latitude: 5.6037,
            longitude: -0.187,
            timezone: "Africa/Accra".to_string(),
        },
    }
}

/// JSON body for `POST /auth/sign-in`.
pub fn sign_in_body(identity: &str, secret: &str) -> serde_json::Value {
    serde_json::json!({
        "identity": identity,
        "secret": secret,
        "device": {
            "screenResolution": "1366x768",
            "timezone": "Africa/Accra",
            "storage": { "localStorage": true, "indexedDb": true }
        }
    })
}

pub fn password_body(password: &str) -> serde_json::Value {
    serde_json::json!({ "password": password })
}

/// Polls `check` until it returns true or `within` elapses.
pub async fn eventually<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
