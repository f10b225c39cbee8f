pub mod json;

pub use json::{
    ReviewSnapshot, SnapshotEntry, export_deck_to_path, export_review_states, import_deck,
    restore_review_states,
};
