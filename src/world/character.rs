//! Characters and their talents.
//!
//! A character belongs to exactly one player and carries five integer
//! stats. Only the turn pipeline mutates `alive` and the stats.

use serde::{Deserialize, Serialize};

use super::ids::{CharacterId, PlayerId};
use super::region::Region;

/// One of the five character talents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Martial,
    Intrigue,
    Control,
    Finance,
    Charisma,
}

/// All stats in display order.
pub const ALL_STATS: [Stat; 5] = [
    Stat::Martial,
    Stat::Intrigue,
    Stat::Control,
    Stat::Finance,
    Stat::Charisma,
];

/// A character's talent values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub martial: i32,
    #[serde(default)]
    pub intrigue: i32,
    #[serde(default)]
    pub control: i32,
    #[serde(default)]
    pub finance: i32,
    #[serde(default)]
    pub charisma: i32,
}

impl Stats {
    pub const fn new(martial: i32, intrigue: i32, control: i32, finance: i32, charisma: i32) -> Self {
        Stats { martial, intrigue, control, finance, charisma }
    }

    pub const fn get(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Martial => self.martial,
            Stat::Intrigue => self.intrigue,
            Stat::Control => self.control,
            Stat::Finance => self.finance,
            Stat::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, stat: Stat, value: i32) {
        match stat {
            Stat::Martial => self.martial = value,
            Stat::Intrigue => self.intrigue = value,
            Stat::Control => self.control = value,
            Stat::Finance => self.finance = value,
            Stat::Charisma => self.charisma = value,
        }
    }

    /// Every stat limited to `0..=max`.
    pub fn clamped(self, max: i32) -> Stats {
        let c = |v: i32| v.clamp(0, max.max(0));
        Stats::new(c(self.martial), c(self.intrigue), c(self.control), c(self.finance), c(self.charisma))
    }
}

/// A character in play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub player: PlayerId,
    pub name: String,
    #[serde(default)]
    pub race: String,
    #[serde(default = "default_alive")]
    pub alive: bool,
    #[serde(default)]
    pub stats: Stats,
    /// Region the character currently stands in, if any.
    #[serde(default)]
    pub location: Option<Region>,
}

fn default_alive() -> bool {
    true
}

impl Character {
    /// Creates a living character with zeroed stats and no location.
    pub fn new(id: CharacterId, player: PlayerId, name: impl Into<String>) -> Self {
        Character {
            id,
            player,
            name: name.into(),
            race: String::new(),
            alive: true,
            stats: Stats::default(),
            location: None,
        }
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = stats;
        self
    }

    pub fn at(mut self, region: Region) -> Self {
        self.location = Some(region);
        self
    }
}
