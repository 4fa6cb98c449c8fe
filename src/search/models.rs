//! Search filters and related data models

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Safe search level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    Off,
    #[default]
    Moderate,
    Strict,
}

impl SafeSearch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Moderate => "moderate",
            Self::Strict => "strict",
        }
    }
}

impl FromStr for SafeSearch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Ok(Self::Off),
            "moderate" | "1" => Ok(Self::Moderate),
            "strict" | "2" => Ok(Self::Strict),
            other => Err(format!("unknown safe search level '{}'", other)),
        }
    }
}

/// Kind of results requested; selects which providers are asked
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Web,
    News,
    Images,
    Academic,
    Shopping,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        Self::Web,
        Self::News,
        Self::Images,
        Self::Academic,
        Self::Shopping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::News => "news",
            Self::Images => "images",
            Self::Academic => "academic",
            Self::Shopping => "shopping",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "web" | "any" => Ok(Self::Web),
            "news" => Ok(Self::News),
            "images" | "image" => Ok(Self::Images),
            "academic" => Ok(Self::Academic),
            "shopping" => Ok(Self::Shopping),
            other => Err(format!("unknown content type '{}'", other)),
        }
    }
}

/// Relative time span shortcut
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    fn days(&self) -> i64 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
            Self::Year => 365,
        }
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(format!("unknown time range '{}'", other)),
        }
    }
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Range ending today and spanning the given time range
    pub fn last(range: TimeRange) -> Self {
        let end = Utc::now().date_naive();
        Self::new(end - Duration::days(range.days()), end)
    }

    /// The coarsest [`TimeRange`] covering this range, for providers that
    /// only understand relative spans
    pub fn as_time_range(&self) -> TimeRange {
        let days = (self.end - self.start).num_days();
        match days {
            d if d <= 1 => TimeRange::Day,
            d if d <= 7 => TimeRange::Week,
            d if d <= 31 => TimeRange::Month,
            _ => TimeRange::Year,
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Search filters. Immutable value combined with the query to form the
/// cache key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct Filters {
    pub safe_search: SafeSearch,
    pub language: Option<String>,
    pub region: Option<String>,
    pub date_range: Option<DateRange>,
    pub content_type: ContentType,
}

impl Filters {
    /// Named presets
    pub fn preset(name: &str) -> Option<Self> {
        let filters = match name {
            "default" => Self::default(),
            "recent" => Self::default().with_date_range(DateRange::last(TimeRange::Week)),
            "news" => Self::default()
                .with_content_type(ContentType::News)
                .with_date_range(DateRange::last(TimeRange::Week)),
            "images" => Self::default().with_content_type(ContentType::Images),
            "academic" => Self::default().with_content_type(ContentType::Academic),
            "safe" => Self::default().with_safe_search(SafeSearch::Strict),
            "local" => Self::default().with_language("en").with_region("us"),
            _ => return None,
        };
        Some(filters)
    }

    pub fn preset_names() -> &'static [&'static str] {
        &["default", "recent", "news", "images", "academic", "safe", "local"]
    }

    pub fn with_safe_search(mut self, level: SafeSearch) -> Self {
        self.safe_search = level;
        self
    }

    pub fn with_language(mut self, lang: impl Into<String>) -> Self {
        self.language = non_empty(lang.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = non_empty(region.into());
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn without_date_range(mut self) -> Self {
        self.date_range = None;
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Check if anything differs from the defaults
    pub fn is_active(&self) -> bool {
        self != &Self::default()
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("type={}", self.content_type),
            format!("safe={}", self.safe_search.as_str()),
        ];
        if let Some(ref lang) = self.language {
            parts.push(format!("lang={}", lang));
        }
        if let Some(ref region) = self.region {
            parts.push(format!("region={}", region));
        }
        if let Some(ref range) = self.date_range {
            parts.push(format!("date={}", range));
        }
        parts.join(" ")
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    if value.is_empty() || value == "any" {
        None
    } else {
        Some(value)
    }
}
