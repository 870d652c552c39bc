/// Message module for the shieldwatch attack monitor
///
/// This module defines the data structures passed between components: the
/// provider's attack listings and details, and the events the watcher emits.
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One entry of the provider's current attack listing.
///
/// # Fields
/// * `id` - Provider-assigned attack id, unique within a snapshot
/// * `target` - Attacked address
/// * `description` - Attack category as reported by the provider
/// * `mbps` / `pps` - Peak magnitude
/// * `ended` - Whether the provider already flags the attack as finished
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttackSummary {
    pub id: u64,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mbps: u64,
    #[serde(default)]
    pub pps: u64,
    #[serde(default)]
    pub ended: bool,
}

/// A point-in-time attack listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub attacks: Vec<AttackSummary>,
}

impl Snapshot {
    pub fn new(attacks: Vec<AttackSummary>) -> Self {
        Self { attacks }
    }

    /// Ids of attacks not yet flagged as ended, in listing order.
    pub fn active_ids(&self) -> Vec<u64> {
        self.attacks
            .iter()
            .filter(|a| !a.ended)
            .map(|a| a.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.attacks.len()
    }
}

/// Full attack record returned by the detail endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attack {
    pub id: u64,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mbps: u64,
    #[serde(default)]
    pub pps: u64,
    #[serde(default)]
    pub ended: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Total duration in seconds, only reported once the attack ended.
    #[serde(default)]
    pub total_duration: Option<u64>,
    /// Total volume in megabits, only reported once the attack ended.
    #[serde(default)]
    pub total_volume: Option<u64>,
}

/// A named bucket of a categorized breakdown.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bucket {
    pub name: String,
    #[serde(default)]
    pub value: f64,
}

impl Bucket {
    pub fn is_other(&self) -> bool {
        self.name == "other"
    }
}

/// Categorized breakdown of an attack's traffic.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AttackInfo {
    #[serde(default)]
    pub destination_ports: Vec<Bucket>,
    #[serde(default)]
    pub source_ports: Vec<Bucket>,
    #[serde(default)]
    pub protocols: Vec<Bucket>,
    #[serde(default)]
    pub packets: Vec<Bucket>,
    #[serde(default)]
    pub source_ips: Vec<Bucket>,
    #[serde(default)]
    pub source_asns: Vec<Bucket>,
    #[serde(default)]
    pub source_countries: Vec<Bucket>,
}

/// Attack record plus its breakdown, fetched on demand for one id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttackDetail {
    pub attack: Attack,
    #[serde(default)]
    pub info: AttackInfo,
}

impl AttackDetail {
    pub fn id(&self) -> u64 {
        self.attack.id
    }

    pub fn has_ended(&self) -> bool {
        self.attack.ended
    }
}

/// A detected start or end of a single attack.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Started(AttackDetail),
    Ended(AttackDetail),
}

impl Transition {
    pub fn detail(&self) -> &AttackDetail {
        match self {
            Transition::Started(detail) | Transition::Ended(detail) => detail,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Transition::Started(_) => "started",
            Transition::Ended(_) => "ended",
        }
    }
}

/// Everything a single watcher tick can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Refreshed(Snapshot),
    Transition(Transition),
}
