//! Draft marketplace listings from a short product description and highlight
//! SEO keywords in the result.
//!
//! The pieces fit together like this: a [`ListingGateway`] turns a
//! description into [`ListingData`] through a [`ListingBackend`] (Gemini in
//! production), a [`ListingSession`] holds the editable draft and save state,
//! and [`annotate`] splits text into plain and keyword segments for display.

pub mod annotate;
pub mod config;
pub mod gateway;
pub mod gemini;
pub mod listing;
pub mod session;
#[cfg(feature = "web")]
pub mod web;

pub use annotate::{KeywordMatcher, Segment, SegmentKind, annotate, keywords_in_text};
pub use config::{ConfigError, GeminiConfig};
pub use gateway::{
    BackendError, GENERATION_FAILED_MESSAGE, GenerateError, GenerationRequest, ListingBackend,
    ListingGateway,
};
pub use gemini::GeminiBackend;
pub use listing::{CharBadge, KeywordVolume, ListingData, ListingDraft};
pub use session::{ListingSession, SaveState, SaveTiming, SessionError, SessionView};
