//! Browser and OS parsing.
//!
//! woothee identifies the browser, OS and coarse device category; the
//! rendering engine and platform family are read from UA tokens.

use session_core::{BrowserInfo, OsInfo, UNKNOWN};
use woothee::parser::Parser;

/// Result of parsing one user agent string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAgent {
    pub browser: BrowserInfo,
    pub os: OsInfo,
    /// woothee category: pc, smartphone, mobilephone, crawler, appliance, misc
    pub category: String,
}

impl Default for ParsedAgent {
    fn default() -> Self {
        Self {
            browser: BrowserInfo::default(),
            os: OsInfo::default(),
            category: UNKNOWN.to_string(),
        }
    }
}

pub struct UserAgentParser {
    parser: Parser,
}

impl UserAgentParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    pub fn parse(&self, user_agent: &str) -> ParsedAgent {
        if user_agent.trim().is_empty() {
            return ParsedAgent::default();
        }

        let mut parsed = ParsedAgent::default();
        parsed.browser.engine = detect_engine(user_agent).to_string();
        parsed.os.platform = detect_platform(user_agent).to_string();

        if let Some(result) = self.parser.parse(user_agent) {
            parsed.browser.name = known_or_unknown(result.name);
            parsed.browser.version = known_or_unknown(result.version);
            parsed.os.name = known_or_unknown(result.os);
            parsed.os.version = known_or_unknown(&result.os_version);
            parsed.category = known_or_unknown(result.category);
        }

        parsed
    }
}

impl Default for UserAgentParser {
    fn default() -> Self {
        Self::new()
    }
}

fn known_or_unknown(value: &str) -> String {
    if value.is_empty() || value.eq_ignore_ascii_case("UNKNOWN") {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

/// Rendering engine from UA tokens. Order matters: Blink and EdgeHTML UAs
/// also carry the WebKit token.
pub fn detect_engine(ua: &str) -> &'static str {
    if ua.contains("Edge/") {
        "EdgeHTML"
    } else if ua.contains("Trident/") || ua.contains("MSIE ") {
        "Trident"
    } else if ua.contains("Presto/") {
        "Presto"
    } else if ua.contains("AppleWebKit/")
        && (ua.contains("Chrome/") || ua.contains("Chromium/"))
    {
        "Blink"
    } else if ua.contains("AppleWebKit/") {
        "WebKit"
    } else if ua.contains("Gecko/") || ua.contains("rv:") {
        "Gecko"
    } else {
        UNKNOWN
    }
}

/// Operating system family. iOS and Android are checked before the
/// desktop families whose tokens they also carry.
pub fn detect_platform(ua: &str) -> &'static str {
    if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        "iOS"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("CrOS") {
        "Chrome OS"
    } else if ua.contains("Macintosh") || ua.contains("Mac OS X") {
        "macOS"
    } else if ua.contains("Linux") || ua.contains("X11") {
        "Linux"
    } else {
        UNKNOWN
    }
}
