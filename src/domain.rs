//! Shared request/response value types for the generation pipeline.
//!
//! These are the enums and small structs case attributes are normalized
//! into before they reach the selector, prompt builder, or LLM client.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseTier {
    Express,
    Mild,
    Moderate,
    Complex,
}

impl CaseTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseTier::Express => "express",
            CaseTier::Mild => "mild",
            CaseTier::Moderate => "moderate",
            CaseTier::Complex => "complex",
        }
    }
}

/// Insurance requests collapse `express|mild` into one bucket for rule
/// lookup; this is the pre-collapsed wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceTier {
    ExpressMild,
    Moderate,
    Complex,
}

impl InsuranceTier {
    /// Maps to the internal rule-table tier used for lookup.
    pub fn as_case_tier(&self) -> CaseTier {
        match self {
            InsuranceTier::ExpressMild => CaseTier::Express,
            InsuranceTier::Moderate => CaseTier::Moderate,
            InsuranceTier::Complex => CaseTier::Complex,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Adolescent,
    Adult,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Adolescent => "adolescent",
            AgeGroup::Adult => "adult",
        }
    }

    /// `<18 -> adolescent`, `>=18 -> adult` (spec.md §3, boundary cases in §8).
    pub fn from_age(patient_age: u32) -> Self {
        if patient_age < 18 {
            AgeGroup::Adolescent
        } else {
            AgeGroup::Adult
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiagnosticAssets {
    #[serde(default)]
    pub intraoral_photos: bool,
    #[serde(default)]
    pub panoramic_xray: bool,
    #[serde(default)]
    pub fmx: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Patient,
    Internal,
}

impl Default for Audience {
    fn default() -> Self {
        Audience::Patient
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Concise,
    Casual,
    Reassuring,
    Clinical,
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Reassuring
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchArea {
    Upper,
    Lower,
    Both,
}

impl Default for ArchArea {
    fn default() -> Self {
        ArchArea::Both
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseDifficulty {
    Simple,
    Moderate,
    Complex,
}

impl CaseDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseDifficulty::Simple => "simple",
            CaseDifficulty::Moderate => "moderate",
            CaseDifficulty::Complex => "complex",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringApproach {
    Remote,
    Mixed,
    #[serde(rename = "in-clinic")]
    InClinic,
}

impl MonitoringApproach {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringApproach::Remote => "remote",
            MonitoringApproach::Mixed => "mixed",
            MonitoringApproach::InClinic => "in-clinic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentsLevel {
    None,
    Some,
    Extensive,
}

impl AttachmentsLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentsLevel::None => "none",
            AttachmentsLevel::Some => "some",
            AttachmentsLevel::Extensive => "extensive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    TreatmentSummary,
    InsuranceSummary,
    ProgressNotes,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::TreatmentSummary => "treatment_summary",
            DocumentKind::InsuranceSummary => "insurance_summary",
            DocumentKind::ProgressNotes => "progress_notes",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_group_boundaries() {
        assert_eq!(AgeGroup::from_age(0), AgeGroup::Adolescent);
        assert_eq!(AgeGroup::from_age(17), AgeGroup::Adolescent);
        assert_eq!(AgeGroup::from_age(18), AgeGroup::Adult);
        assert_eq!(AgeGroup::from_age(120), AgeGroup::Adult);
    }

    #[test]
    fn insurance_tier_collapses_to_express() {
        assert_eq!(InsuranceTier::ExpressMild.as_case_tier().as_str(), "express");
    }
}
