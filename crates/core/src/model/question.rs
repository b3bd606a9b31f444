use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// Answer cardinality of a question.
///
/// Wire names follow the assessment service: `single_select_mcq` and
/// `multiple_select_mcq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    #[serde(rename = "single_select_mcq")]
    SingleChoice,
    #[serde(rename = "multiple_select_mcq")]
    MultiChoice,
}

/// One selectable answer option. Options keep their load order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    id: OptionId,
    label: String,
}

impl QuestionOption {
    #[must_use]
    pub fn new(id: OptionId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> OptionId {
        self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question has no options")]
    NoOptions,

    #[error("question points must be positive")]
    ZeroPoints,

    #[error("duplicate option id {0} in question")]
    DuplicateOption(OptionId),

    #[error("option {option} does not belong to question {question}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("single-choice question cannot carry {0} selections")]
    TooManySelections(usize),
}

/// A quiz question together with the test-taker's current selection.
///
/// The option list is immutable once loaded; only `selected` changes, and only
/// through [`Question::set_option`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    points: u32,
    kind: QuestionKind,
    options: Vec<QuestionOption>,
    selected: BTreeSet<OptionId>,
}

impl Question {
    /// Create a question with an empty selection.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::ZeroPoints` for non-positive points,
    /// `QuestionError::NoOptions` for an empty option list, and
    /// `QuestionError::DuplicateOption` when two options share an id.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        points: u32,
        kind: QuestionKind,
        options: Vec<QuestionOption>,
    ) -> Result<Self, QuestionError> {
        Self::from_persisted(id, text, points, kind, options, BTreeSet::new())
    }

    /// Rehydrate a question from persisted storage, selection included.
    ///
    /// # Errors
    ///
    /// In addition to the [`Question::new`] checks, returns
    /// `QuestionError::UnknownOption` when a selected id is not one of the
    /// question's options, and `QuestionError::TooManySelections` when a
    /// single-choice question carries more than one selection.
    pub fn from_persisted(
        id: QuestionId,
        text: impl Into<String>,
        points: u32,
        kind: QuestionKind,
        options: Vec<QuestionOption>,
        selected: BTreeSet<OptionId>,
    ) -> Result<Self, QuestionError> {
        if points == 0 {
            return Err(QuestionError::ZeroPoints);
        }
        if options.is_empty() {
            return Err(QuestionError::NoOptions);
        }

        let mut seen = BTreeSet::new();
        for option in &options {
            if !seen.insert(option.id) {
                return Err(QuestionError::DuplicateOption(option.id));
            }
        }

        for selected_id in &selected {
            if !seen.contains(selected_id) {
                return Err(QuestionError::UnknownOption {
                    question: id,
                    option: *selected_id,
                });
            }
        }
        if kind == QuestionKind::SingleChoice && selected.len() > 1 {
            return Err(QuestionError::TooManySelections(selected.len()));
        }

        Ok(Self {
            id,
            text: text.into(),
            points,
            kind,
            options,
            selected,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    #[must_use]
    pub fn selected(&self) -> &BTreeSet<OptionId> {
        &self.selected
    }

    /// Selected option ids in ascending order, as sent to the service.
    /// An unanswered question yields an empty list, which is legal.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<OptionId> {
        self.selected.iter().copied().collect()
    }

    /// Mark an option selected or deselected.
    ///
    /// Single-choice questions follow radio semantics: selecting an option
    /// replaces the whole selection. Multi-choice questions follow checkbox
    /// semantics: options accumulate and are removed independently.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::UnknownOption` when the id is not one of this
    /// question's options; the selection is left untouched.
    pub fn set_option(&mut self, option_id: OptionId, selected: bool) -> Result<(), QuestionError> {
        if !self.options.iter().any(|o| o.id == option_id) {
            return Err(QuestionError::UnknownOption {
                question: self.id,
                option: option_id,
            });
        }

        match (self.kind, selected) {
            (QuestionKind::SingleChoice, true) => {
                self.selected.clear();
                self.selected.insert(option_id);
            }
            (QuestionKind::SingleChoice, false) => {
                self.selected.remove(&option_id);
            }
            (QuestionKind::MultiChoice, true) => {
                self.selected.insert(option_id);
            }
            (QuestionKind::MultiChoice, false) => {
                self.selected.remove(&option_id);
            }
        }

        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
