//! Per-user listing session.
//!
//! Everything one editing session needs lives in [`ListingSession`]: the
//! description being typed, the canonical listing, the editable draft and the
//! save-state machine. Every change goes through a transition method so the
//! same rules hold for the web front end, the CLI and tests.

use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::annotate::{Segment, annotate, keywords_in_text};
use crate::gateway::{GenerateError, ListingGateway};
use crate::listing::{CharBadge, KeywordVolume, ListingData, ListingDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    Saved,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("product description is empty")]
    EmptyInput,
    #[error("a listing is already being generated")]
    GenerationInFlight,
    #[error("no listing has been generated yet")]
    NoListing,
    #[error("there are no unsaved changes")]
    NothingToSave,
    #[error("the listing is being saved")]
    SaveInProgress,
    #[error("keyword {index} does not exist (listing has {len})")]
    KeywordOutOfRange { index: usize, len: usize },
}

/// Latency of the simulated save and how long the "saved" state is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTiming {
    pub latency: Duration,
    pub saved_display: Duration,
}

impl Default for SaveTiming {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(500),
            saved_display: Duration::from_secs(2),
        }
    }
}

impl SaveTiming {
    pub fn immediate() -> Self {
        Self {
            latency: Duration::ZERO,
            saved_display: Duration::ZERO,
        }
    }

    /// Resolves once the simulated save round-trip is over.
    pub async fn commit_delay(&self) {
        tokio::time::sleep(self.latency).await;
    }

    /// Resolves once the "saved" confirmation should be cleared.
    pub async fn reset_delay(&self) {
        tokio::time::sleep(self.saved_display).await;
    }
}

/// Proof that a save was started; hands the draft snapshot to
/// [`ListingSession::complete_save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    seq: u64,
    draft: ListingDraft,
}

impl SaveTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListingSession {
    input: String,
    listing: Option<ListingData>,
    draft: Option<ListingDraft>,
    loading: bool,
    error: Option<String>,
    save_state: SaveState,
    unsaved: bool,
    save_seq: u64,
}

impl ListingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn listing(&self) -> Option<&ListingData> {
        self.listing.as_ref()
    }

    pub fn draft(&self) -> Option<&ListingDraft> {
        self.draft.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn save_state(&self) -> SaveState {
        self.save_state
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Starts a generation for the current input. Clears the previous
    /// listing and error so a failure ends in an empty result, not a stale one.
    pub fn begin_generation(&mut self) -> Result<String, SessionError> {
        if self.loading {
            return Err(SessionError::GenerationInFlight);
        }
        if self.input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        self.loading = true;
        self.error = None;
        self.listing = None;
        self.draft = None;
        self.unsaved = false;
        self.save_state = SaveState::Idle;
        Ok(self.input.clone())
    }

    pub fn finish_generation(&mut self, result: Result<ListingData, GenerateError>) {
        self.loading = false;
        match result {
            Ok(listing) => {
                self.draft = Some(ListingDraft::from(&listing));
                self.listing = Some(listing);
                self.unsaved = false;
                self.save_state = SaveState::Idle;
            }
            Err(GenerateError::EmptyInput) => {}
            Err(err) => {
                self.listing = None;
                self.draft = None;
                self.error = Some(err.user_message().to_string());
            }
        }
    }

    /// Runs a whole generation against `gateway`.
    pub async fn generate(&mut self, gateway: &ListingGateway) -> Result<(), SessionError> {
        let description = self.begin_generation()?;
        let result = gateway.generate(&description).await;
        self.finish_generation(result);
        Ok(())
    }

    pub fn edit_title(&mut self, title: impl Into<String>) -> Result<(), SessionError> {
        self.editable_draft()?.title = title.into();
        self.unsaved = true;
        Ok(())
    }

    pub fn edit_description(&mut self, description: impl Into<String>) -> Result<(), SessionError> {
        self.editable_draft()?.description = description.into();
        self.unsaved = true;
        Ok(())
    }

    pub fn edit_keyword(
        &mut self,
        index: usize,
        keyword: impl Into<String>,
    ) -> Result<(), SessionError> {
        let draft = self.editable_draft()?;
        let len = draft.keywords.len();
        let slot = draft
            .keywords
            .get_mut(index)
            .ok_or(SessionError::KeywordOutOfRange { index, len })?;
        *slot = keyword.into();
        self.unsaved = true;
        Ok(())
    }

    /// Applies a full draft at once, as submitted by a form. Marks the
    /// session dirty only when something actually changed.
    pub fn replace_draft(&mut self, next: ListingDraft) -> Result<bool, SessionError> {
        let draft = self.editable_draft()?;
        if next.keywords.len() != draft.keywords.len() {
            return Err(SessionError::KeywordOutOfRange {
                index: next.keywords.len().max(draft.keywords.len()) - 1,
                len: draft.keywords.len(),
            });
        }
        if *draft == next {
            return Ok(false);
        }
        *draft = next;
        self.unsaved = true;
        Ok(true)
    }

    fn editable_draft(&mut self) -> Result<&mut ListingDraft, SessionError> {
        if self.save_state == SaveState::Saving {
            return Err(SessionError::SaveInProgress);
        }
        self.draft.as_mut().ok_or(SessionError::NoListing)
    }

    /// Moves to `Saving` and snapshots the draft.
    pub fn begin_save(&mut self) -> Result<SaveTicket, SessionError> {
        if self.listing.is_none() {
            return Err(SessionError::NoListing);
        }
        if self.save_state == SaveState::Saving {
            return Err(SessionError::SaveInProgress);
        }
        if !self.unsaved {
            return Err(SessionError::NothingToSave);
        }
        let draft = self.draft.clone().ok_or(SessionError::NoListing)?;
        self.save_seq += 1;
        self.save_state = SaveState::Saving;
        Ok(SaveTicket {
            seq: self.save_seq,
            draft,
        })
    }

    /// Commits the ticket's draft into the canonical listing in one step.
    /// Returns false if the ticket is stale (a newer generation or save
    /// superseded it).
    pub fn complete_save(&mut self, ticket: SaveTicket) -> bool {
        if ticket.seq != self.save_seq || self.save_state != SaveState::Saving {
            warn!(ticket = ticket.seq, current = self.save_seq, "dropping stale save");
            return false;
        }
        let Some(listing) = self.listing.as_ref() else {
            return false;
        };
        self.listing = Some(listing.with_draft(&ticket.draft));
        self.unsaved = false;
        self.save_state = SaveState::Saved;
        true
    }

    /// Clears the "saved" confirmation unless new edits arrived since.
    pub fn reset_saved(&mut self, seq: u64) -> bool {
        if seq == self.save_seq && self.save_state == SaveState::Saved && !self.unsaved {
            self.save_state = SaveState::Idle;
            true
        } else {
            false
        }
    }

    /// Full save for a session owned by a single task: begin, wait, commit.
    pub async fn save(&mut self, timing: &SaveTiming) -> Result<u64, SessionError> {
        let ticket = self.begin_save()?;
        let seq = ticket.seq();
        timing.commit_delay().await;
        self.complete_save(ticket);
        Ok(seq)
    }

    pub fn save_button(&self) -> SaveButton {
        SaveButton::for_state(self.save_state, self.unsaved)
    }

    /// Keywords of the draft that appear in the draft title.
    pub fn keywords_in_title(&self) -> Vec<String> {
        self.draft
            .as_ref()
            .map(|draft| keywords_in_text(&draft.title, &draft.keywords))
            .unwrap_or_default()
    }

    /// Everything a renderer needs for the current draft.
    pub fn draft_view(&self) -> Option<DraftView> {
        let draft = self.draft.as_ref()?;
        let in_title = keywords_in_text(&draft.title, &draft.keywords);
        let keywords = draft
            .keywords
            .iter()
            .enumerate()
            .map(|(index, keyword)| KeywordView {
                index,
                keyword: keyword.clone(),
                volume: KeywordVolume::for_index(index),
                badge: CharBadge::new(keyword, crate::listing::KEYWORD_CHAR_LIMIT),
                in_title: in_title.iter().any(|k| k == keyword),
            })
            .collect();
        Some(DraftView {
            title_segments: annotate(&draft.title, &in_title),
            description_segments: annotate(&draft.description, &draft.keywords),
            title_badge: draft.title_badge(),
            description_badge: draft.description_badge(),
            keywords,
            keywords_in_title: in_title,
            save_button: self.save_button(),
        })
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            input: self.input.clone(),
            loading: self.loading,
            error: self.error.clone(),
            listing: self.listing.clone(),
            draft: self.draft.clone(),
            save_state: self.save_state,
            unsaved: self.unsaved,
            view: self.draft_view(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveButton {
    pub enabled: bool,
    pub label: &'static str,
}

impl SaveButton {
    fn for_state(state: SaveState, unsaved: bool) -> Self {
        if unsaved && state != SaveState::Saving {
            return Self {
                enabled: true,
                label: "Save listing",
            };
        }
        match state {
            SaveState::Saving => Self {
                enabled: false,
                label: "Saving…",
            },
            SaveState::Saved => Self {
                enabled: false,
                label: "Saved!",
            },
            SaveState::Idle => Self {
                enabled: false,
                label: "Save listing",
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordView {
    pub index: usize,
    pub keyword: String,
    pub volume: KeywordVolume,
    pub badge: CharBadge,
    pub in_title: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftView {
    pub title_segments: Vec<Segment>,
    pub description_segments: Vec<Segment>,
    pub title_badge: CharBadge,
    pub description_badge: CharBadge,
    pub keywords: Vec<KeywordView>,
    pub keywords_in_title: Vec<String>,
    pub save_button: SaveButton,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub input: String,
    pub loading: bool,
    pub error: Option<String>,
    pub listing: Option<ListingData>,
    pub draft: Option<ListingDraft>,
    pub save_state: SaveState,
    pub unsaved: bool,
    pub view: Option<DraftView>,
}
