use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three lists published by the signal server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bull,
    Bear,
    Neut,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Bull, Category::Bear, Category::Neut];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Bull => "bull",
            Category::Bear => "bear",
            Category::Neut => "neut",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single asset on one of the lists. Identity is `name` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, alias = "timeOnBoard", skip_serializing_if = "Option::is_none")]
    pub time_on_board: Option<String>,
}

/// Categorized item lists from one successful poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub bull: Vec<Item>,
    #[serde(default)]
    pub bear: Vec<Item>,
    #[serde(default)]
    pub neut: Vec<Item>,
}

impl Snapshot {
    pub fn items(&self, category: Category) -> &[Item] {
        match category {
            Category::Bull => &self.bull,
            Category::Bear => &self.bear,
            Category::Neut => &self.neut,
        }
    }

    /// Item names of a category, in list order.
    pub fn names(&self, category: Category) -> Vec<String> {
        self.items(category).iter().map(|i| i.name.clone()).collect()
    }
}

/// User filter restricting which categories can trigger an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    All,
    Bull,
    Bear,
}

impl Direction {
    /// Whether changes in `category` may trigger a notification.
    ///
    /// The neutral list has no direction and is never watched.
    pub fn watches(self, category: Category) -> bool {
        matches!(
            (self, category),
            (Direction::All | Direction::Bull, Category::Bull)
                | (Direction::All | Direction::Bear, Category::Bear)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::All => "all",
            Direction::Bull => "bull",
            Direction::Bear => "bear",
        }
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Direction::All),
            "bull" => Ok(Direction::Bull),
            "bear" => Ok(Direction::Bear),
            other => anyhow::bail!("unknown direction {other:?} (expected all, bull or bear)"),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account tier reported by the server. Anything but `Premium` is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountTier {
    Premium,
    Free,
}

impl AccountTier {
    pub fn from_wire(kind: Option<&str>) -> Self {
        match kind {
            Some("Premium") => AccountTier::Premium,
            _ => AccountTier::Free,
        }
    }
}

/// Raw body of a results response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsResponse {
    pub status: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<Snapshot>,
}

/// Body of an HTTP 409 response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConflictBody {
    #[serde(default)]
    pub detail: Option<String>,
}

/// A `status: success` response after interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessPayload {
    pub user: Option<String>,
    pub tier: AccountTier,
    pub timestamp: String,
    pub data: Snapshot,
    /// Set when the server rejected the access key and fell back to the free tier.
    pub error: Option<String>,
}

/// Why a poll ended in the error state.
#[derive(Debug, Clone, PartialEq)]
pub enum PollFailure {
    /// Transport failure or an unreadable body.
    Network(String),
    /// The server answered with a status other than success/waiting.
    Server(String),
}

/// Classified result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Success(SuccessPayload),
    Waiting,
    Error(PollFailure),
    Conflict { detail: String },
}

impl PollOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Success(_) => "success",
            PollOutcome::Waiting => "waiting",
            PollOutcome::Error(_) => "error",
            PollOutcome::Conflict { .. } => "conflict",
        }
    }
}

/// Membership change of one category between two polls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Delta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Overall classification of an alert, also used as the toast style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Bull,
    Bear,
    Mixed,
}

/// Colour of the connection indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLight {
    Green,
    Gold,
    Orange,
    Red,
}

/// Text and indicator colour of the status display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub text: String,
    pub light: StatusLight,
}

/// State of the configured access key as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Free,
    Verifying,
    Invalid,
}

impl KeyStatus {
    pub fn message(self) -> &'static str {
        match self {
            KeyStatus::Free => "Free tier (30 min delay)",
            KeyStatus::Verifying => "Key saved (verifying...)",
            KeyStatus::Invalid => "Invalid key, switched to free tier",
        }
    }
}
