//! Device class heuristics.

use regex::Regex;
use session_core::DeviceType;
use std::sync::LazyLock;

static SMART_TV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)smart-?tv|googletv|appletv|hbbtv|netcast|roku|crkey|bravia|web0s|tizen.*\btv\b|\baft[bmst]\b")
        .expect("smart tv pattern compiles")
});

static SMARTWATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bwatch\b|wear ?os|\bsm-r\d{3}").expect("smartwatch pattern compiles")
});

static TABLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ipad|tablet|kindle|\bsilk\b|playbook").expect("tablet pattern compiles"));

/// Device signals available at sign-in.
#[derive(Debug, Clone, Copy)]
pub struct DeviceHints<'a> {
    pub user_agent: &'a str,
    /// woothee category for the same user agent
    pub category: &'a str,
    pub max_touch_points: Option<u32>,
    pub standalone: bool,
}

/// Classifies the device. First match wins.
pub fn classify(hints: DeviceHints<'_>) -> DeviceType {
    let ua = hints.user_agent;

    if SMART_TV.is_match(ua) {
        return DeviceType::SmartTv;
    }
    if SMARTWATCH.is_match(ua) {
        return DeviceType::Smartwatch;
    }

    let base = if is_tablet(ua, hints.max_touch_points) {
        DeviceType::Tablet
    } else {
        match hints.category {
            "smartphone" | "mobilephone" => DeviceType::Mobile,
            "pc" => DeviceType::Desktop,
            _ => DeviceType::Unknown,
        }
    };

    if !hints.standalone {
        return base;
    }
    match base {
        DeviceType::Mobile | DeviceType::Tablet => DeviceType::MobileApp,
        DeviceType::Desktop => DeviceType::DesktopApp,
        other => other,
    }
}

fn is_tablet(ua: &str, max_touch_points: Option<u32>) -> bool {
    if TABLET.is_match(ua) {
        return true;
    }
    let lower = ua.to_ascii_lowercase();
    if lower.contains("android") && !lower.contains("mobile") {
        return true;
    }
    // iPadOS reports a desktop Safari UA
    ua.contains("Macintosh") && max_touch_points.is_some_and(|points| points > 1)
}
