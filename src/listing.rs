use serde::{Deserialize, Serialize};
use std::fmt;

pub const TITLE_CHAR_LIMIT: usize = 140;
pub const DESCRIPTION_CHAR_LIMIT: usize = 500;
pub const KEYWORD_CHAR_LIMIT: usize = 20;
pub const TARGET_KEYWORD_COUNT: usize = 13;
pub const TARGET_MATERIAL_COUNT: usize = 13;

/// Keywords at these leading positions are treated as high search volume.
const HIGH_VOLUME_LAST_INDEX: usize = 3;
/// Keywords up to this position (after the high tier) are medium volume.
const MEDIUM_VOLUME_LAST_INDEX: usize = 8;

/// A generated marketplace listing as returned by the generation service.
///
/// Length and count limits are hints given to the generator; nothing here
/// enforces them. Use [`CharBadge`] to flag fields that run over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingData {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub category: String,
    pub materials: Vec<String>,
}

impl ListingData {
    pub fn title_badge(&self) -> CharBadge {
        CharBadge::new(&self.title, TITLE_CHAR_LIMIT)
    }

    pub fn description_badge(&self) -> CharBadge {
        CharBadge::new(&self.description, DESCRIPTION_CHAR_LIMIT)
    }

    /// Returns a copy carrying the draft's editable fields. Category and
    /// materials are never edited and carry over unchanged.
    pub fn with_draft(&self, draft: &ListingDraft) -> Self {
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            keywords: draft.keywords.clone(),
            category: self.category.clone(),
            materials: self.materials.clone(),
        }
    }
}

/// The user-editable subset of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

impl From<&ListingData> for ListingDraft {
    fn from(listing: &ListingData) -> Self {
        Self {
            title: listing.title.clone(),
            description: listing.description.clone(),
            keywords: listing.keywords.clone(),
        }
    }
}

impl ListingDraft {
    pub fn title_badge(&self) -> CharBadge {
        CharBadge::new(&self.title, TITLE_CHAR_LIMIT)
    }

    pub fn description_badge(&self) -> CharBadge {
        CharBadge::new(&self.description, DESCRIPTION_CHAR_LIMIT)
    }

    pub fn keyword_badges(&self) -> Vec<CharBadge> {
        self.keywords
            .iter()
            .map(|keyword| CharBadge::new(keyword, KEYWORD_CHAR_LIMIT))
            .collect()
    }
}

/// Character counter shown next to a field, e.g. `152 / 140`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharBadge {
    pub count: usize,
    pub limit: usize,
    pub over_limit: bool,
}

impl CharBadge {
    pub fn new(text: &str, limit: usize) -> Self {
        let count = text.chars().count();
        Self {
            count,
            limit,
            over_limit: count > limit,
        }
    }
}

impl fmt::Display for CharBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.count, self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordVolume {
    High,
    Medium,
    Low,
}

impl KeywordVolume {
    /// Classifies a keyword by its position in the generated list.
    pub fn for_index(index: usize) -> Self {
        if index <= HIGH_VOLUME_LAST_INDEX {
            KeywordVolume::High
        } else if index <= MEDIUM_VOLUME_LAST_INDEX {
            KeywordVolume::Medium
        } else {
            KeywordVolume::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            KeywordVolume::High => "High search volume",
            KeywordVolume::Medium => "Medium search volume",
            KeywordVolume::Low => "Low search volume",
        }
    }

    pub fn query_value(&self) -> &'static str {
        match self {
            KeywordVolume::High => "high",
            KeywordVolume::Medium => "medium",
            KeywordVolume::Low => "low",
        }
    }
}

impl fmt::Display for KeywordVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ListingData {
        ListingData {
            title: "Leather Tote Bag".to_string(),
            description: "A handmade leather tote.".to_string(),
            keywords: vec!["leather tote".to_string(), "brass fittings".to_string()],
            category: "Bags & Purses".to_string(),
            materials: vec!["leather".to_string(), "brass".to_string()],
        }
    }

    #[test]
    fn volume_tiers_follow_position() {
        let tiers: Vec<_> = (0..13).map(KeywordVolume::for_index).collect();
        assert!(tiers[..4].iter().all(|t| *t == KeywordVolume::High));
        assert!(tiers[4..9].iter().all(|t| *t == KeywordVolume::Medium));
        assert!(tiers[9..].iter().all(|t| *t == KeywordVolume::Low));
    }

    #[test]
    fn badge_counts_characters_not_bytes() {
        let badge = CharBadge::new("حقيبة جلدية", 10);
        assert_eq!(badge.count, 11);
        assert!(badge.over_limit);
        assert_eq!(badge.to_string(), "11 / 10");
    }

    #[test]
    fn badge_at_limit_is_not_over() {
        let title = "a".repeat(TITLE_CHAR_LIMIT);
        let badge = CharBadge::new(&title, TITLE_CHAR_LIMIT);
        assert!(!badge.over_limit);
    }

    #[test]
    fn with_draft_keeps_category_and_materials() {
        let listing = sample();
        let draft = ListingDraft {
            title: "New title".to_string(),
            description: "New description".to_string(),
            keywords: vec!["new keyword".to_string()],
        };
        let merged = listing.with_draft(&draft);
        assert_eq!(merged.title, "New title");
        assert_eq!(merged.description, "New description");
        assert_eq!(merged.keywords, vec!["new keyword".to_string()]);
        assert_eq!(merged.category, listing.category);
        assert_eq!(merged.materials, listing.materials);
    }

    #[test]
    fn keyword_badges_flag_long_keywords() {
        let draft = ListingDraft {
            keywords: vec![
                "tote bag".to_string(),
                "extra large leather weekender".to_string(),
            ],
            ..ListingDraft::default()
        };
        let badges = draft.keyword_badges();
        assert!(!badges[0].over_limit);
        assert!(badges[1].over_limit);
    }
}
