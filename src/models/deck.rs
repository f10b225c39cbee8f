//! Deck is a named set of card contents, the catalog's import/export unit.
use serde::{Deserialize, Serialize};

/// Card text before the catalog has assigned it an id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContent {
    pub front: String,
    pub back: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub name: String,
    pub cards: Vec<CardContent>,
}

impl Deck {
    pub fn with_cards<I, F, B>(name: impl Into<String>, cards: I) -> Self
    where
        I: IntoIterator<Item = (F, B)>,
        F: Into<String>,
        B: Into<String>,
    {
        Self {
            name: name.into(),
            cards: cards
                .into_iter()
                .map(|(front, back)| CardContent {
                    front: front.into(),
                    back: back.into(),
                })
                .collect(),
        }
    }
}
