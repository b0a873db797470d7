//! Keyword fallback: an ordered rule table, first match wins.

use serde::{Deserialize, Serialize};

/// What a fallback reply is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Temperature,
    Humidity,
    Soil,
    DataCollection,
    Help,
    General,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Temperature => "temperature",
            Topic::Humidity => "humidity",
            Topic::Soil => "soil",
            Topic::DataCollection => "data_collection",
            Topic::Help => "help",
            Topic::General => "general",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A canned reply and the keywords that select it.
#[derive(Debug)]
pub struct Rule {
    pub topic: Topic,
    /// Lowercase substrings; any one selects the rule.
    pub keywords: &'static [&'static str],
    pub response: &'static str,
}

impl Rule {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

/// Evaluated top to bottom.
pub const RULES: &[Rule] = &[
    Rule {
        topic: Topic::Temperature,
        keywords: &["temperature"],
        response: "For temperature readings, calibrate your sensors against a reference \
thermometer before each field session and record whether you measured air or soil. \
Most crops germinate best with soil temperatures between 18°C and 24°C (65°F to 75°F); \
readings below 10°C usually mean slowed growth.",
    },
    Rule {
        topic: Topic::Humidity,
        keywords: &["humidity"],
        response: "Relative humidity between 40% and 70% suits most crops. Sustained \
readings above 80% raise the risk of fungal disease, while readings below 30% can \
cause water stress. Take humidity measurements at the same time of day so trends stay \
comparable.",
    },
    Rule {
        topic: Topic::Soil,
        keywords: &["soil", "ph"],
        response: "Most crops do well in soil with a pH between 6.0 and 7.0. Below 6.0, \
consider adding agricultural lime; above 7.5, sulfur or organic matter such as compost \
can bring it down. Sample from several spots at the same depth and average the results.",
    },
    Rule {
        topic: Topic::DataCollection,
        keywords: &["data", "record"],
        response: "Good field data comes from consistency: use the same field names for \
the same measurements, note units with every value, capture precise locations \
(coordinates when possible), and record observations at regular intervals.",
    },
    Rule {
        topic: Topic::Help,
        keywords: &["help", "how"],
        response: "I can help with field data collection, measurement techniques, sensor \
calibration, and interpreting environmental readings such as temperature, humidity, and \
soil pH. What would you like to know?",
    },
];

/// Reply when no rule matches.
pub static CLOSING: Rule = Rule {
    topic: Topic::General,
    keywords: &[],
    response: "Thanks for your question. For reliable field data, collect measurements \
at consistent times, add detailed notes about each location, and consult an agronomist \
or other specialist for technical questions about your readings.",
};

/// Pick the canned reply for `message`. Stateless; case-insensitive.
pub fn classify(message: &str) -> &'static Rule {
    let lowered = message.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .unwrap_or(&CLOSING)
}
