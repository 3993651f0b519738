//! Canonical record types for the P2PQuake v2 JSON API.
//!
//! These mirror the upstream wire format exactly; everything that arrives on
//! the history endpoint or the WebSocket feed decodes into [`QuakeEvent`].
//! Records are immutable once constructed. Unknown depth/magnitude are
//! reported upstream as `-1` and kept verbatim here.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Notification code for full earthquake information. The only code this
/// engine retains; everything else (notably 552, tsunami-only updates) is
/// dropped at the stream boundary.
pub const CODE_EARTHQUAKE: i64 = 551;

/// One seismic event notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuakeEvent {
    pub id: String,
    pub code: i64,
    /// Receipt timestamp assigned by the relay network. Not used for
    /// ordering or dedup.
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub issue: QuakeIssue,
    pub earthquake: Earthquake,
    #[serde(default)]
    pub points: Vec<ObservationPoint>,
}

impl QuakeEvent {
    /// Origin time of the physical event, parsed from `earthquake.time`.
    ///
    /// Returns None when the upstream string does not parse; the reconciler
    /// orders such records after all parseable ones.
    pub fn occurred_at(&self) -> Option<NaiveDateTime> {
        parse_quake_time(&self.earthquake.time)
    }
}

/// Issuer metadata attached to a notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuakeIssue {
    #[serde(default)]
    pub time: String,
    #[serde(default, rename = "eventId")]
    pub event_id: String,
    #[serde(default, rename = "type")]
    pub issue_type: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Earthquake {
    /// Origin time, `YYYY/MM/DD HH:MM:SS` (occasionally with fractional
    /// seconds). Kept as the raw string; see [`QuakeEvent::occurred_at`].
    pub time: String,
    pub hypocenter: Hypocenter,
    #[serde(rename = "maxScale")]
    pub max_scale: i32,
    #[serde(rename = "domesticTsunami")]
    pub domestic_tsunami: DomesticTsunami,
}

/// Physical origin point. `depth` (km) and `magnitude` use `-1` as the
/// upstream "unknown" sentinel and must never be substituted with defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypocenter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default = "unknown_sentinel")]
    pub depth: f64,
    #[serde(default = "unknown_sentinel")]
    pub magnitude: f64,
}

fn unknown_sentinel() -> f64 {
    -1.0
}

/// One reporting location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationPoint {
    pub pref: String,
    pub addr: String,
    #[serde(rename = "isArea")]
    pub is_area: bool,
    pub scale: i32,
}

/// Domestic tsunami advisory level tied to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomesticTsunami {
    None,
    Checking,
    NonEffective,
    Watch,
    Warning,
    MajorWarning,
    /// Upstream occasionally extends this set; tolerate rather than fail.
    #[serde(other)]
    Unknown,
}

impl DomesticTsunami {
    /// Japanese advisory label, as presented to the public.
    pub fn label_ja(&self) -> &'static str {
        match self {
            DomesticTsunami::None => "津波の心配なし",
            DomesticTsunami::Checking => "津波の有無を調査中",
            DomesticTsunami::NonEffective => "若干の海面変動あり（被害なし）",
            DomesticTsunami::Watch => "津波注意報",
            DomesticTsunami::Warning => "津波警報",
            DomesticTsunami::MajorWarning => "大津波警報",
            DomesticTsunami::Unknown => "情報なし",
        }
    }
}

/// JMA seismic intensity (shindo). A discrete, non-contiguous enumeration;
/// levels 5 and 6 split into minus/plus sub-levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JmaIntensity {
    Shindo1 = 10,
    Shindo2 = 20,
    Shindo3 = 30,
    Shindo4 = 40,
    Shindo5Minus = 45,
    Shindo5Plus = 50,
    Shindo6Minus = 55,
    Shindo6Plus = 60,
    Shindo7 = 70,
}

impl JmaIntensity {
    pub fn from_scale(scale: i32) -> Option<Self> {
        match scale {
            10 => Some(Self::Shindo1),
            20 => Some(Self::Shindo2),
            30 => Some(Self::Shindo3),
            40 => Some(Self::Shindo4),
            45 => Some(Self::Shindo5Minus),
            50 => Some(Self::Shindo5Plus),
            55 => Some(Self::Shindo6Minus),
            60 => Some(Self::Shindo6Plus),
            70 => Some(Self::Shindo7),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Shindo1 => "1",
            Self::Shindo2 => "2",
            Self::Shindo3 => "3",
            Self::Shindo4 => "4",
            Self::Shindo5Minus => "5-",
            Self::Shindo5Plus => "5+",
            Self::Shindo6Minus => "6-",
            Self::Shindo6Plus => "6+",
            Self::Shindo7 => "7",
        }
    }
}

/// Display label for a raw scale value, `?` for anything outside the set.
pub fn shindo_label(scale: i32) -> &'static str {
    JmaIntensity::from_scale(scale).map_or("?", |s| s.label())
}

/// Parse the upstream `YYYY/MM/DD HH:MM:SS[.fff]` timestamp format.
pub fn parse_quake_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y/%m/%d %H:%M:%S%.f").ok()
}
