use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{MetaKey, Rule, RuleEntry};

#[derive(Serialize, Deserialize)]
struct RuleRepr {
    full_extent: bool,
    entries: Vec<(MetaKey, RuleEntry)>,
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RuleRepr {
            full_extent: self.full_extent(),
            entries: self.iter().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = RuleRepr::deserialize(deserializer)?;
        Rule::from_entries(repr.full_extent, repr.entries).map_err(D::Error::custom)
    }
}
