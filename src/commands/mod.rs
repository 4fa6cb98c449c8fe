//! Console commands
//!
//! A line is a command only when it matches one of the forms below
//! exactly; anything else is submitted as a search. `open source` is a
//! search, `open 3` opens the third result.

mod bookmarks;
mod opener;
mod renderer;
mod repl;

pub use bookmarks::{Bookmark, BookmarkStore, JsonBookmarkStore, MemoryBookmarkStore};
pub use opener::{Opener, SystemOpener};
pub use renderer::{PlainRenderer, Renderer};
pub use repl::{Console, Flow};

use crate::search::{ContentType, DateRange, Filters, SafeSearch, TimeRange};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static INDEXED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(page|o|open|s|save)\s+(-?\d+)$").expect("valid indexed command pattern")
});

static FILTER_EDIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(?:f|filter|filters)\s+(safe|lang|language|region|type|date|preset|clear)(?:\s+(.+))?$")
        .expect("valid filter command pattern")
});

/// Malformed command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Change to the session filters
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEdit {
    Safe(SafeSearch),
    Language(Option<String>),
    Region(Option<String>),
    Type(ContentType),
    Date(Option<DateRange>),
    Preset(Filters),
    Clear,
}

impl FilterEdit {
    pub fn apply(self, filters: &Filters) -> Filters {
        let current = filters.clone();
        match self {
            Self::Safe(level) => current.with_safe_search(level),
            Self::Language(Some(lang)) => current.with_language(lang),
            Self::Language(None) => Filters {
                language: None,
                ..current
            },
            Self::Region(Some(region)) => current.with_region(region),
            Self::Region(None) => Filters {
                region: None,
                ..current
            },
            Self::Type(content_type) => current.with_content_type(content_type),
            Self::Date(Some(range)) => current.with_date_range(range),
            Self::Date(None) => current.without_date_range(),
            Self::Preset(preset) => preset,
            Self::Clear => Filters::default(),
        }
    }

    fn parse(key: &str, value: Option<&str>) -> Result<Self, CommandError> {
        let key = key.to_lowercase();
        if key == "clear" {
            return Ok(Self::Clear);
        }
        let value = value.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(CommandError::Usage("f <safe|lang|region|type|date|preset|clear> <value>"));
        }

        match key.as_str() {
            "safe" => value
                .parse()
                .map(Self::Safe)
                .map_err(|reason| invalid("safe", reason)),
            "lang" | "language" => Ok(Self::Language(optional(value))),
            "region" => Ok(Self::Region(optional(value))),
            "type" => value
                .parse()
                .map(Self::Type)
                .map_err(|reason| invalid("type", reason)),
            "date" => match value {
                "any" | "none" => Ok(Self::Date(None)),
                _ => value
                    .parse::<TimeRange>()
                    .map(|range| Self::Date(Some(DateRange::last(range))))
                    .map_err(|reason| invalid("date", reason)),
            },
            "preset" => Filters::preset(value).map(Self::Preset).ok_or_else(|| {
                invalid(
                    "preset",
                    format!("expected one of {}", Filters::preset_names().join(", ")),
                )
            }),
            _ => Err(CommandError::Usage("f <safe|lang|region|type|date|preset|clear> <value>")),
        }
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> CommandError {
    CommandError::InvalidValue {
        key,
        reason: reason.into(),
    }
}

fn optional(value: &str) -> Option<String> {
    match value {
        "any" | "none" => None,
        v => Some(v.to_string()),
    }
}

/// One line of console input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    Next,
    Prev,
    First,
    Last,
    Page(i64),
    /// Open result `k` (1-based) of the current page
    Open(i64),
    ShowFilters,
    EditFilters(FilterEdit),
    History,
    /// Bookmark result `k` (1-based) of the current page
    Save(i64),
    Bookmarks,
    Refresh,
    Stats,
    /// Show the effective configuration
    Settings,
    Help,
    Exit,
}

impl Command {
    /// Parse a line of input; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let command = match line.to_lowercase().as_str() {
            "n" | "next" => Self::Next,
            "p" | "prev" | "previous" => Self::Prev,
            "first" => Self::First,
            "last" => Self::Last,
            "f" | "filter" | "filters" => Self::ShowFilters,
            "h" | "history" => Self::History,
            "bookmarks" => Self::Bookmarks,
            "r" | "refresh" => Self::Refresh,
            "stats" => Self::Stats,
            "settings" | "config" => Self::Settings,
            "?" | "help" => Self::Help,
            "exit" | "quit" | "q" => Self::Exit,
            "page" => return Err(CommandError::Usage("page <number>")),
            "o" | "open" => return Err(CommandError::Usage("o <result number>")),
            "s" | "save" => return Err(CommandError::Usage("s <result number>")),
            _ => return Self::parse_with_args(line).map(Some),
        };
        Ok(Some(command))
    }

    fn parse_with_args(line: &str) -> Result<Self, CommandError> {
        if let Some(caps) = INDEXED.captures(line) {
            let number: i64 = caps[2]
                .parse()
                .map_err(|_| invalid("number", format!("'{}' is out of range", &caps[2])))?;
            return Ok(match caps[1].to_lowercase().as_str() {
                "page" => Self::Page(number),
                "o" | "open" => Self::Open(number),
                _ => Self::Save(number),
            });
        }

        if let Some(caps) = FILTER_EDIT.captures(line) {
            let value = caps.get(2).map(|m| m.as_str());
            return FilterEdit::parse(&caps[1], value).map(Self::EditFilters);
        }

        Ok(Self::Search(line.to_string()))
    }
}

/// Text shown by `help`
pub const HELP: &str = "\
<text>            search (\"phrase\", +required, -excluded, site:domain)
n, next           next page
p, prev           previous page
first, last       first or last page
page <k>          go to page k
o <k>, open <k>   open result k in the browser
s <k>, save <k>   bookmark result k
bookmarks         list bookmarks
f, filter         show filters
f <key> <value>   set filter: safe, lang, region, type, date, preset
f clear           reset filters
h, history        list recent searches
r, refresh        run the current search again
stats             session statistics
settings          effective configuration
?, help           this help
q, quit, exit     leave";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(parse("n"), Command::Next);
        assert_eq!(parse("  PREV "), Command::Prev);
        assert_eq!(parse("q"), Command::Exit);
        assert_eq!(parse("?"), Command::Help);
        assert_eq!(parse("f"), Command::ShowFilters);
        assert_eq!(parse("Settings"), Command::Settings);
        assert_eq!(parse("config"), Command::Settings);
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_indexed_commands() {
        assert_eq!(parse("page 3"), Command::Page(3));
        assert_eq!(parse("page -1"), Command::Page(-1));
        assert_eq!(parse("o 2"), Command::Open(2));
        assert_eq!(parse("open 10"), Command::Open(10));
        assert_eq!(parse("s 1"), Command::Save(1));
        assert_eq!(
            Command::parse("page").unwrap_err(),
            CommandError::Usage("page <number>")
        );
    }

    #[test]
    fn test_text_that_looks_like_commands_is_a_search() {
        assert_eq!(parse("open source"), Command::Search("open source".into()));
        assert_eq!(parse("next generation"), Command::Search("next generation".into()));
        assert_eq!(parse("page rank algorithm"), Command::Search("page rank algorithm".into()));
        assert_eq!(parse("filter bubble"), Command::Search("filter bubble".into()));
    }

    #[test]
    fn test_filter_edits() {
        let base = Filters::default();

        let Command::EditFilters(edit) = parse("f lang de") else {
            panic!("expected filter edit");
        };
        assert_eq!(edit.apply(&base).language.as_deref(), Some("de"));

        let Command::EditFilters(edit) = parse("filter type news") else {
            panic!("expected filter edit");
        };
        assert_eq!(edit.apply(&base).content_type, ContentType::News);

        let Command::EditFilters(edit) = parse("f date week") else {
            panic!("expected filter edit");
        };
        let range = edit.apply(&base).date_range.unwrap();
        assert_eq!((range.end - range.start).num_days(), 7);

        let Command::EditFilters(edit) = parse("f preset safe") else {
            panic!("expected filter edit");
        };
        assert_eq!(edit.apply(&base).safe_search, SafeSearch::Strict);

        let narrowed = base.clone().with_language("fr");
        assert_eq!(FilterEdit::Clear.apply(&narrowed), Filters::default());
        assert_eq!(
            FilterEdit::Language(None).apply(&narrowed).language,
            None
        );
    }

    #[test]
    fn test_filter_edit_errors() {
        assert!(matches!(
            Command::parse("f type movies"),
            Err(CommandError::InvalidValue { key: "type", .. })
        ));
        assert!(matches!(
            Command::parse("f preset nope"),
            Err(CommandError::InvalidValue { key: "preset", .. })
        ));
        assert!(matches!(Command::parse("f lang"), Err(CommandError::Usage(_))));
    }
}
