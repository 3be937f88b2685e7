use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A votable entry with independent flavor and looks counters.
///
/// Field names follow the shared store's document layout (`imageUrl`, `flavorVotes`, ...),
/// so the same type travels through SQLite rows, the REST API and the TUI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub flavor_votes: u32,
    #[serde(default)]
    pub looks_votes: u32,
}

impl Competitor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: image_url.into(),
            flavor_votes: 0,
            looks_votes: 0,
        }
    }

    /// Builder: start with existing tallies
    pub fn with_votes(mut self, flavor_votes: u32, looks_votes: u32) -> Self {
        self.flavor_votes = flavor_votes;
        self.looks_votes = looks_votes;
        self
    }

    pub fn votes(&self, counter: CounterName) -> u32 {
        match counter {
            CounterName::FlavorVotes => self.flavor_votes,
            CounterName::LooksVotes => self.looks_votes,
        }
    }
}

/// Independent voting dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Flavor,
    Looks,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Flavor, Category::Looks];

    /// The counter a selection in this category increments.
    pub fn counter(&self) -> CounterName {
        match self {
            Category::Flavor => CounterName::FlavorVotes,
            Category::Looks => CounterName::LooksVotes,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Category::Flavor => "Flavor",
            Category::Looks => "Looks",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Named counter on a competitor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterName {
    #[serde(rename = "flavorVotes")]
    FlavorVotes,
    #[serde(rename = "looksVotes")]
    LooksVotes,
}

impl CounterName {
    /// Field name as exposed to clients
    pub fn field(&self) -> &'static str {
        match self {
            CounterName::FlavorVotes => "flavorVotes",
            CounterName::LooksVotes => "looksVotes",
        }
    }

    /// Column name in the `competitors` table
    pub(crate) fn column(&self) -> &'static str {
        match self {
            CounterName::FlavorVotes => "flavor_votes",
            CounterName::LooksVotes => "looks_votes",
        }
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for CounterName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flavorVotes" => Ok(CounterName::FlavorVotes),
            "looksVotes" => Ok(CounterName::LooksVotes),
            other => Err(format!("unknown counter: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_competitor_json_uses_document_field_names() {
        let competitor = Competitor::new("a", "Snickerdoodle", "https://img/a.png").with_votes(3, 1);
        let json = serde_json::to_value(&competitor).unwrap();

        assert_eq!(json["imageUrl"], "https://img/a.png");
        assert_eq!(json["flavorVotes"], 3);
        assert_eq!(json["looksVotes"], 1);
    }

    #[test]
    fn test_missing_counters_default_to_zero() {
        let competitor: Competitor =
            serde_json::from_str(r#"{"id":"b","name":"Oatmeal Raisin"}"#).unwrap();

        assert_eq!(competitor.flavor_votes, 0);
        assert_eq!(competitor.looks_votes, 0);
        assert_eq!(competitor.image_url, "");
    }

    #[test]
    fn test_category_maps_to_its_counter() {
        let competitor = Competitor::new("c", "Ginger Snap", "").with_votes(5, 2);

        assert_eq!(competitor.votes(Category::Flavor.counter()), 5);
        assert_eq!(competitor.votes(Category::Looks.counter()), 2);
        assert_eq!("looksVotes".parse::<CounterName>(), Ok(CounterName::LooksVotes));
        assert!("tasteVotes".parse::<CounterName>().is_err());
    }
}
