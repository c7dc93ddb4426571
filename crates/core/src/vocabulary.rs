//! Step and status vocabulary for the applicant journey.
//!
//! A journey walks through four administrative steps in a fixed order. Each
//! step carries a local [`JourneyStatus`], and the dossier backing the step
//! on Démarches Simplifiées carries a [`DsStatus`]. [`DsStatus::to_journey_status`]
//! is the single mapping between the two vocabularies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Step
// ──────────────────────────────────────────────

/// One of the four sequential steps of a parcours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Eligibility,
    Diagnostic,
    Quote,
    Invoices,
}

impl Step {
    /// All steps, in journey order.
    pub const ALL: [Step; 4] = [
        Step::Eligibility,
        Step::Diagnostic,
        Step::Quote,
        Step::Invoices,
    ];

    /// The step that follows this one, or `None` for the last step.
    pub fn next(self) -> Option<Step> {
        match self {
            Step::Eligibility => Some(Step::Diagnostic),
            Step::Diagnostic => Some(Step::Quote),
            Step::Quote => Some(Step::Invoices),
            Step::Invoices => None,
        }
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Eligibility => "ELIGIBILITY",
            Step::Diagnostic => "DIAGNOSTIC",
            Step::Quote => "QUOTE",
            Step::Invoices => "INVOICES",
        }
    }

    /// Path segment used in URLs and configuration keys.
    pub fn slug(self) -> &'static str {
        match self {
            Step::Eligibility => "eligibilite",
            Step::Diagnostic => "diagnostic",
            Step::Quote => "devis",
            Step::Invoices => "factures",
        }
    }

    /// Label shown to applicants.
    pub fn label(self) -> &'static str {
        match self {
            Step::Eligibility => "Éligibilité",
            Step::Diagnostic => "Diagnostic",
            Step::Quote => "Devis",
            Step::Invoices => "Factures",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = VocabularyError;

    /// Accepts either the canonical name (`QUOTE`) or the slug (`devis`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str().eq_ignore_ascii_case(s) || step.slug() == s)
            .ok_or_else(|| VocabularyError::UnknownStep(s.to_string()))
    }
}

// ──────────────────────────────────────────────
// JourneyStatus
// ──────────────────────────────────────────────

/// Local status of the journey's current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JourneyStatus {
    Todo,
    UnderReview,
    Validated,
}

impl JourneyStatus {
    pub const ALL: [JourneyStatus; 3] = [
        JourneyStatus::Todo,
        JourneyStatus::UnderReview,
        JourneyStatus::Validated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JourneyStatus::Todo => "TODO",
            JourneyStatus::UnderReview => "UNDER_REVIEW",
            JourneyStatus::Validated => "VALIDATED",
        }
    }
}

impl fmt::Display for JourneyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JourneyStatus {
    type Err = VocabularyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JourneyStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| VocabularyError::UnknownJourneyStatus(s.to_string()))
    }
}

// ──────────────────────────────────────────────
// DsStatus
// ──────────────────────────────────────────────

/// Status of a dossier on Démarches Simplifiées.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DsStatus {
    /// `en_construction`: filed but still editable by the applicant.
    Draft,
    /// `en_instruction`: under review by an instructor.
    UnderReview,
    /// `accepte`
    Approved,
    /// `refuse`
    Rejected,
    /// `sans_suite`
    ClassifiedWithoutAction,
}

impl DsStatus {
    pub const ALL: [DsStatus; 5] = [
        DsStatus::Draft,
        DsStatus::UnderReview,
        DsStatus::Approved,
        DsStatus::Rejected,
        DsStatus::ClassifiedWithoutAction,
    ];

    /// Map a DS status onto the local journey vocabulary.
    ///
    /// Rejected and classified dossiers send the step back to `Todo`: the
    /// applicant has to file again.
    pub fn to_journey_status(self) -> JourneyStatus {
        match self {
            DsStatus::Draft | DsStatus::UnderReview => JourneyStatus::UnderReview,
            DsStatus::Approved => JourneyStatus::Validated,
            DsStatus::Rejected | DsStatus::ClassifiedWithoutAction => JourneyStatus::Todo,
        }
    }

    pub fn is_draft(self) -> bool {
        self == DsStatus::Draft
    }

    pub fn is_approved(self) -> bool {
        self == DsStatus::Approved
    }

    /// True once DS will not move the dossier any further.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DsStatus::Approved | DsStatus::Rejected | DsStatus::ClassifiedWithoutAction
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DsStatus::Draft => "DRAFT",
            DsStatus::UnderReview => "UNDER_REVIEW",
            DsStatus::Approved => "APPROVED",
            DsStatus::Rejected => "REJECTED",
            DsStatus::ClassifiedWithoutAction => "CLASSIFIED_WITHOUT_ACTION",
        }
    }

    /// State name used by the DS GraphQL API.
    pub fn ds_state(self) -> &'static str {
        match self {
            DsStatus::Draft => "en_construction",
            DsStatus::UnderReview => "en_instruction",
            DsStatus::Approved => "accepte",
            DsStatus::Rejected => "refuse",
            DsStatus::ClassifiedWithoutAction => "sans_suite",
        }
    }

    /// Parse a DS GraphQL state name (`en_instruction`, `accepte`, ...).
    pub fn from_ds_state(state: &str) -> Result<DsStatus, VocabularyError> {
        DsStatus::ALL
            .into_iter()
            .find(|status| status.ds_state() == state)
            .ok_or_else(|| VocabularyError::UnknownDsState(state.to_string()))
    }
}

impl fmt::Display for DsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DsStatus {
    type Err = VocabularyError;

    /// Accepts the canonical name or the DS wire name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DsStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .map_or_else(|| DsStatus::from_ds_state(s), Ok)
    }
}

// ──────────────────────────────────────────────
// VocabularyError
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VocabularyError {
    #[error("unknown step '{0}'")]
    UnknownStep(String),
    #[error("unknown journey status '{0}'")]
    UnknownJourneyStatus(String),
    #[error("unknown DS state '{0}'")]
    UnknownDsState(String),
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
