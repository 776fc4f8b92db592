//! Client-side state for the flashcard views: the drag-to-reorder board of
//! the deck editor, the study session, and the action layer they call.

pub mod actions;
pub mod error;
pub mod reorder;
pub mod study;

pub use actions::{DeckActions, HttpDeckActions};
pub use error::ClientError;
pub use reorder::{derive_orders, move_card, persist_order, Mutation, ReorderBoard, ReorderTicket};
pub use study::{Advance, SessionStats, StudyCommand, StudyMode, StudySession, FLIP_TRANSITION};
