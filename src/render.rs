use serde::Serialize;

use crate::types::{Category, Item, Snapshot};

/// Phrase in an item message that marks a volume spike.
pub const VOLUME_SPIKE_MARKER: &str = "爆量";

/// Entries on the board for at most this long count as newly listed.
pub const NEW_LISTING_MINUTES: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum BadgeSegment {
    Plain(String),
    Spike(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElapsedBadge {
    pub text: String,
    pub newly_listed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub name: String,
    pub message: Vec<BadgeSegment>,
    pub score: String,
    pub elapsed: Option<ElapsedBadge>,
}

impl Entry {
    /// Single-line text form used by the terminal.
    pub fn line(&self) -> String {
        let message: String = self
            .message
            .iter()
            .map(|s| match s {
                BadgeSegment::Plain(t) => t.clone(),
                BadgeSegment::Spike(t) => format!("🔥{t}"),
            })
            .collect();
        let mut line = format!("{}  [{}]  {}", self.name, message, self.score);
        if let Some(badge) = &self.elapsed {
            if badge.newly_listed {
                line.push_str(&format!("  (new {})", badge.text));
            } else {
                line.push_str(&format!("  ({})", badge.text));
            }
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub category: Category,
    pub title: &'static str,
    pub icon: &'static str,
    pub entries: Vec<Entry>,
}

impl Section {
    pub fn heading(&self) -> String {
        format!("{} {}", self.icon, self.title)
    }
}

fn section_meta(category: Category) -> (&'static str, &'static str) {
    match category {
        Category::Bull => ("Bullish anomalies", "🚀"),
        Category::Bear => ("Bearish anomalies", "📉"),
        Category::Neut => ("Awaiting breakout", "⚖️"),
    }
}

/// Bull, bear and neutral sections for a snapshot.
pub fn render(snapshot: &Snapshot) -> Vec<Section> {
    Category::ALL
        .into_iter()
        .map(|category| {
            let (title, icon) = section_meta(category);
            Section {
                category,
                title,
                icon,
                entries: snapshot.items(category).iter().map(render_item).collect(),
            }
        })
        .collect()
}

fn render_item(item: &Item) -> Entry {
    Entry {
        name: item.name.clone(),
        message: split_spike(&item.msg),
        score: format_score(item.score),
        elapsed: item.time_on_board.as_deref().map(elapsed_badge),
    }
}

/// Split a message around the first volume-spike marker.
pub fn split_spike(msg: &str) -> Vec<BadgeSegment> {
    let Some(pos) = msg.find(VOLUME_SPIKE_MARKER) else {
        return vec![BadgeSegment::Plain(msg.to_string())];
    };
    let mut segments = Vec::with_capacity(3);
    if pos > 0 {
        segments.push(BadgeSegment::Plain(msg[..pos].to_string()));
    }
    segments.push(BadgeSegment::Spike(VOLUME_SPIKE_MARKER.to_string()));
    let rest = &msg[pos + VOLUME_SPIKE_MARKER.len()..];
    if !rest.is_empty() {
        segments.push(BadgeSegment::Plain(rest.to_string()));
    }
    segments
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.abs() < 1e15 {
        format!("{}", score as i64)
    } else {
        format!("{score:.2}")
    }
}

fn elapsed_badge(raw: &str) -> ElapsedBadge {
    let text = raw.trim().to_string();
    let newly_listed = text.eq_ignore_ascii_case("new")
        || parse_minutes(&text).is_some_and(|m| m <= NEW_LISTING_MINUTES);
    ElapsedBadge { text, newly_listed }
}

/// Minutes in a duration label such as `5m`, `12 min`, `1h20m` or `90s`.
///
/// A bare number is read as minutes. Returns `None` for anything else.
pub fn parse_minutes(label: &str) -> Option<u64> {
    let label = label.trim().to_ascii_lowercase();
    if label.is_empty() {
        return None;
    }
    if let Ok(n) = label.parse::<u64>() {
        return Some(n);
    }

    let mut total_secs: u64 = 0;
    let mut digits = String::new();
    let mut chars = label.chars().peekable();
    let mut matched = false;

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c.is_whitespace() {
            continue;
        }
        let value: u64 = digits.parse().ok()?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        // Swallow the rest of the unit word ("min", "hours", "sec").
        while chars.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            chars.next();
        }
        total_secs = total_secs.checked_add(value.checked_mul(unit)?)?;
        matched = true;
    }

    if !digits.is_empty() || !matched {
        return None;
    }
    Some(total_secs / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, msg: &str, score: f64, tob: Option<&str>) -> Item {
        Item {
            name: name.to_string(),
            msg: msg.to_string(),
            score,
            time_on_board: tob.map(str::to_string),
        }
    }

    #[test]
    fn three_sections_in_order() {
        let snap = Snapshot {
            bull: vec![item("BTC", "breakout", 92.0, None)],
            bear: vec![],
            neut: vec![item("ADA", "range", 50.5, None)],
        };
        let sections = render(&snap);
        let cats: Vec<Category> = sections.iter().map(|s| s.category).collect();
        assert_eq!(cats, vec![Category::Bull, Category::Bear, Category::Neut]);
        assert_eq!(sections[0].entries[0].score, "92");
        assert!(sections[1].entries.is_empty());
        assert_eq!(sections[2].entries[0].score, "50.50");
        assert_eq!(sections[0].heading(), "🚀 Bullish anomalies");
    }

    #[test]
    fn spike_marker_highlighted_once() {
        let segs = split_spike("4h 爆量 breakout 爆量");
        assert_eq!(
            segs,
            vec![
                BadgeSegment::Plain("4h ".to_string()),
                BadgeSegment::Spike("爆量".to_string()),
                BadgeSegment::Plain(" breakout 爆量".to_string()),
            ]
        );
    }

    #[test]
    fn message_without_marker_is_plain() {
        assert_eq!(
            split_spike("trend"),
            vec![BadgeSegment::Plain("trend".to_string())]
        );
    }

    #[test]
    fn entry_line_format() {
        let snap = Snapshot {
            bull: vec![item("SOL", "爆量", 7.0, Some("3m"))],
            bear: vec![item("XRP", "dump", 3.0, Some("2h"))],
            neut: vec![],
        };
        let sections = render(&snap);
        assert_eq!(sections[0].entries[0].line(), "SOL  [🔥爆量]  7  (new 3m)");
        assert_eq!(sections[1].entries[0].line(), "XRP  [dump]  3  (2h)");
    }

    #[test]
    fn parse_minutes_formats() {
        assert_eq!(parse_minutes("5m"), Some(5));
        assert_eq!(parse_minutes("12 min"), Some(12));
        assert_eq!(parse_minutes("1h20m"), Some(80));
        assert_eq!(parse_minutes("2 hours"), Some(120));
        assert_eq!(parse_minutes("90s"), Some(1));
        assert_eq!(parse_minutes("7"), Some(7));
        assert_eq!(parse_minutes(""), None);
        assert_eq!(parse_minutes("soon"), None);
        assert_eq!(parse_minutes("5x"), None);
    }

    #[test]
    fn newly_listed_threshold() {
        assert!(elapsed_badge("10m").newly_listed);
        assert!(!elapsed_badge("11m").newly_listed);
        assert!(elapsed_badge("NEW").newly_listed);
        assert!(!elapsed_badge("yesterday").newly_listed);
    }

    #[test]
    fn oversized_duration_is_unparsed() {
        assert_eq!(parse_minutes("6000000000000000h"), None);
        assert_eq!(parse_minutes("5000000000000000000h1m"), None);
        assert_eq!(parse_minutes("99999999999999999999m"), None);

        let snap = Snapshot {
            bull: vec![item("SOL", "pump", 7.0, Some("6000000000000000h"))],
            bear: vec![],
            neut: vec![],
        };
        let sections = render(&snap);
        let badge = sections[0].entries[0].elapsed.as_ref().unwrap();
        assert_eq!(badge.text, "6000000000000000h");
        assert!(!badge.newly_listed);
    }
}
