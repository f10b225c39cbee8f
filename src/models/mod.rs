pub mod card;
pub mod deck;
pub mod quality;
pub mod review_state;
pub mod sm2;

pub use card::{Card, CardId, UserId};
pub use deck::{CardContent, Deck};
pub use quality::Quality;
pub use review_state::{DueCard, ReviewRecord, ReviewState};
pub use sm2::{PreviewEntry, ReviewTime};
