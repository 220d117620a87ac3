//! Single-line parsing of the editable journal format.
//!
//! Line grammar:
//! - `── text ──` or `-- text` is a header.
//! - `<indent><symbol> [!|!!|!!!] <content>` is an entry; two spaces or one
//!   tab per level.
//! - `<indent>>[<date>] <symbol> <content>` is a migration directive.

use super::date::DateParser;
use super::{
    MSG_CONTENT_REQUIRED, MSG_INVALID_MIGRATION_DATE, MSG_MIGRATION_DATE_REQUIRED,
    MSG_UNCLOSED_MIGRATION, MSG_UNKNOWN_TYPE,
};
use crate::model::entity_id::EntityId;
use crate::model::entry::{EntryType, Priority};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const HEADER_PREFIXES: [&str; 2] = ["──", "--"];

/// Parse result for one line of an editable document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLine {
    /// 1-based position in the document.
    pub line_number: usize,
    pub raw: String,
    pub depth: u32,
    /// Symbol as typed, which may be a display-form symbol.
    pub symbol: Option<char>,
    pub kind: Option<EntryType>,
    pub priority: Priority,
    pub content: String,
    pub migration_target: Option<NaiveDate>,
    /// Out-of-band identity of the entry this line was rendered from.
    pub entity_id: Option<EntityId>,
    pub is_header: bool,
    pub is_valid: bool,
    pub error_message: Option<String>,
}

impl ParsedLine {
    fn blank(line_number: usize, raw: &str) -> Self {
        Self {
            line_number,
            raw: raw.to_string(),
            depth: 0,
            symbol: None,
            kind: None,
            priority: Priority::None,
            content: String::new(),
            migration_target: None,
            entity_id: None,
            is_header: false,
            is_valid: false,
            error_message: None,
        }
    }

    fn invalid(mut self, message: impl Into<String>) -> Self {
        self.is_valid = false;
        self.error_message = Some(message.into());
        self
    }

    /// Whether the line is blank (invalid but not an error).
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Whether the line describes an entry (valid and not a header).
    pub fn is_entry(&self) -> bool {
        self.is_valid && !self.is_header && self.kind.is_some()
    }

    /// Canonical editable rendering of this line.
    ///
    /// Headers and invalid lines are returned verbatim.
    pub fn canonical(&self) -> String {
        let Some(kind) = self.kind.filter(|_| self.is_entry()) else {
            return self.raw.clone();
        };
        let mut out = "  ".repeat(self.depth as usize);
        if let Some(target) = self.migration_target {
            out.push_str(&format!(">[{}] ", target.format("%Y-%m-%d")));
        }
        out.push(kind.symbol());
        out.push(' ');
        if self.priority.is_set() {
            out.push_str(self.priority.marker());
            out.push(' ');
        }
        out.push_str(&self.content);
        out
    }
}

/// Parses one raw line (without its newline).
pub fn parse_line(raw: &str, line_number: usize, dates: &dyn DateParser) -> ParsedLine {
    let mut line = ParsedLine::blank(line_number, raw);

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return line;
    }

    if HEADER_PREFIXES
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
    {
        line.is_header = true;
        line.is_valid = true;
        return line;
    }

    let (depth, rest) = split_indent(raw);
    line.depth = depth;
    let rest = rest.trim_end();

    let body = if let Some(directive) = rest.strip_prefix(">[") {
        let Some(close) = directive.find(']') else {
            return line.invalid(MSG_UNCLOSED_MIGRATION);
        };
        let date_text = directive[..close].trim();
        if date_text.is_empty() {
            return line.invalid(MSG_MIGRATION_DATE_REQUIRED);
        }
        match dates.parse_date(date_text) {
            Ok(date) => line.migration_target = Some(date),
            Err(err) => {
                return line.invalid(format!("{MSG_INVALID_MIGRATION_DATE} `{date_text}`: {err}"))
            }
        }
        directive[close + 1..].trim_start()
    } else {
        rest
    };

    let mut chars = body.chars();
    let Some(symbol) = chars.next() else {
        return line.invalid(MSG_CONTENT_REQUIRED);
    };
    let remainder = chars.as_str();
    let kind = match EntryType::from_symbol(symbol) {
        Some(kind) if remainder.is_empty() || remainder.starts_with(char::is_whitespace) => kind,
        _ => return line.invalid(format!("{MSG_UNKNOWN_TYPE} `{symbol}`")),
    };
    line.symbol = Some(symbol);
    line.kind = Some(kind);

    let remainder = remainder.trim_start();
    if remainder.is_empty() {
        return line.invalid(MSG_CONTENT_REQUIRED);
    }

    let (priority, content) = strip_priority(remainder);
    if content.is_empty() {
        return line.invalid(MSG_CONTENT_REQUIRED);
    }
    line.priority = priority;
    line.content = content.to_string();
    line.is_valid = true;
    line
}

/// Splits leading indentation into a depth. Spaces count 1, tabs 2, two
/// units per level.
pub(crate) fn split_indent(raw: &str) -> (u32, &str) {
    let mut units = 0u32;
    let mut offset = raw.len();
    for (index, ch) in raw.char_indices() {
        match ch {
            ' ' => units += 1,
            '\t' => units += 2,
            _ => {
                offset = index;
                break;
            }
        }
    }
    (units / 2, &raw[offset..])
}

/// Strips a leading priority marker.
///
/// One to three `!` followed by whitespace set the priority. Four or more
/// collapse to high and the extra `!` stay in the content. Anything else is
/// literal content.
pub(crate) fn strip_priority(text: &str) -> (Priority, &str) {
    let bangs = text.chars().take_while(|ch| *ch == '!').count();
    match bangs {
        0 => (Priority::None, text),
        1..=3 => {
            let after = &text[bangs..];
            if !after.starts_with(char::is_whitespace) {
                return (Priority::None, text);
            }
            let priority = match bangs {
                1 => Priority::Low,
                2 => Priority::Medium,
                _ => Priority::High,
            };
            (priority, after.trim_start())
        }
        _ => (Priority::High, text[3..].trim_start()),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_line, split_indent, strip_priority};
    use crate::document::date::RelativeDateParser;
    use crate::document::MSG_UNKNOWN_TYPE;
    use crate::model::entry::{EntryType, Priority};
    use chrono::NaiveDate;

    #[test]
    fn indent_counts_tabs_as_two_spaces() {
        assert_eq!(split_indent("\t. a"), (1, ". a"));
        assert_eq!(split_indent("   . a"), (1, ". a"));
        assert_eq!(split_indent("\t  . a"), (2, ". a"));
    }

    #[test]
    fn priority_requires_trailing_whitespace() {
        assert_eq!(strip_priority("!! call"), (Priority::Medium, "call"));
        assert_eq!(strip_priority("!wow"), (Priority::None, "!wow"));
        assert_eq!(strip_priority("!!!"), (Priority::None, "!!!"));
    }

    #[test]
    fn four_bangs_collapse_to_high() {
        assert_eq!(strip_priority("!!!! fire"), (Priority::High, "! fire"));
        assert_eq!(strip_priority("!!!!!x"), (Priority::High, "!!x"));
    }

    #[test]
    fn symbol_needs_a_following_space() {
        let dates = RelativeDateParser::new(NaiveDate::from_ymd_opt(2026, 1, 20).unwrap());

        let glued = parse_line(".foo", 1, &dates);
        assert!(!glued.is_valid);
        assert!(glued
            .error_message
            .as_deref()
            .is_some_and(|message| message.starts_with(MSG_UNKNOWN_TYPE)));

        let spaced = parse_line(". foo", 2, &dates);
        assert_eq!(spaced.kind, Some(EntryType::Task));
        assert_eq!(spaced.content, "foo");
    }
}
