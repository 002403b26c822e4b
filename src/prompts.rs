//! Pure prompt construction for the LLM client (spec.md §4.2).
//!
//! System prompts are loaded once as `&'static str` constants; the user
//! prompt is assembled deterministically from request fields with a
//! `push_str` builder, mirroring the conditional-field document builders
//! elsewhere in this codebase.

use crate::domain::{ArchArea, Audience, Tone};

pub const TREATMENT_SUMMARY_SYSTEM_PROMPT: &str = "\
You are generating a treatment summary document for an orthodontic case. \
Follow these rules strictly:
- Do not state or imply a diagnosis.
- Do not guarantee treatment outcomes.
- Do not mention pricing, billing, or insurance coverage.
- Do not introduce clinical facts beyond what is provided in the input.
- Clinical facts must remain identical regardless of the requested tone.
- When the target audience is the patient: avoid clinical jargon, write in \
an explanatory rather than directive voice, and do not describe appliance \
mechanics unless explicitly provided in the input.
Return a JSON object with exactly two string fields: \"title\" and \"summary\". \
Both fields are required and must be non-empty.";

pub const INSURANCE_SUMMARY_SYSTEM_PROMPT: &str = "\
You are generating an insurance summary document for an orthodontic case. \
Use conservative, administrative language suitable for a claims reviewer. \
Do not speculate about coverage decisions or reimbursement amounts. \
Return a JSON object with exactly two string fields: \"insurance_summary\" \
and \"disclaimer\". The \"disclaimer\" field must equal the following text \
byte-for-byte: \"This summary is provided for administrative purposes only \
and does not constitute a coverage determination.\"";

pub const INSURANCE_DISCLAIMER: &str =
    "This summary is provided for administrative purposes only and does not constitute a coverage determination.";

fn arch_area_str(area: ArchArea) -> &'static str {
    match area {
        ArchArea::Upper => "upper",
        ArchArea::Lower => "lower",
        ArchArea::Both => "both",
    }
}

/// Also used by the coordinator to render response metadata.
pub(crate) fn audience_str(audience: Audience) -> &'static str {
    match audience {
        Audience::Patient => "patient",
        Audience::Internal => "internal",
    }
}

pub(crate) fn tone_str(tone: Tone) -> &'static str {
    match tone {
        Tone::Concise => "concise",
        Tone::Casual => "casual",
        Tone::Reassuring => "reassuring",
        Tone::Clinical => "clinical",
    }
}

/// Fields for the treatment-summary user prompt. Optional fields that are
/// `None` are omitted from the rendered block entirely (spec.md §4.2).
#[derive(Debug, Clone, Default)]
pub struct TreatmentPromptFields {
    pub patient_age: Option<u32>,
    pub age_group: Option<&'static str>,
    pub patient_name: Option<String>,
    pub practice_name: Option<String>,
    pub treatment_type: String,
    pub area_treated: ArchArea,
    pub duration_range: String,
    pub case_difficulty: Option<String>,
    pub monitoring_approach: Option<String>,
    pub attachments: Option<String>,
    pub whitening_included: Option<bool>,
    pub dentist_note: Option<String>,
    pub audience: Audience,
    pub tone: Tone,
}

/// Builds the treatment-summary user prompt. Deterministic: identical
/// fields always render the identical string.
pub fn build_treatment_user_prompt(fields: &TreatmentPromptFields) -> String {
    let mut out = String::new();

    if let (Some(age), Some(age_group)) = (fields.patient_age, fields.age_group) {
        out.push_str(&format!("Patient Age: {age} ({age_group})\n"));
    }
    if let Some(name) = &fields.patient_name {
        out.push_str(&format!("**Patient Name:** {name}\n"));
    }
    if let Some(practice) = &fields.practice_name {
        out.push_str(&format!("**Practice Name:** {practice}\n"));
    }
    out.push_str(&format!("**Treatment Type:** {}\n", fields.treatment_type));
    out.push_str(&format!(
        "**Area Treated:** {}\n",
        arch_area_str(fields.area_treated)
    ));
    out.push_str(&format!("**Duration Range:** {}\n", fields.duration_range));
    if let Some(difficulty) = &fields.case_difficulty {
        out.push_str(&format!("**Case Difficulty:** {difficulty}\n"));
    }
    if let Some(approach) = &fields.monitoring_approach {
        out.push_str(&format!("**Monitoring Approach:** {approach}\n"));
    }
    if let Some(attachments) = &fields.attachments {
        out.push_str(&format!("**Attachments:** {attachments}\n"));
    }
    if let Some(whitening) = fields.whitening_included {
        out.push_str(&format!("**Whitening Included:** {whitening}\n"));
    }
    if let Some(note) = &fields.dentist_note {
        out.push_str(&format!("**Dentist Note:** {note}\n"));
    }

    out.push_str(&format!(
        "Target Audience: {}\nDesired Tone: {}",
        audience_str(fields.audience),
        tone_str(fields.tone)
    ));

    out
}

#[derive(Debug, Clone, Default)]
pub struct InsurancePromptFields {
    pub tier: String,
    pub age_group: String,
    pub arches: Option<ArchArea>,
    pub retainers_included: Option<bool>,
    pub monitoring_approach: Option<String>,
    pub notes: Option<String>,
}

/// Builds the insurance-summary user prompt, same determinism guarantee.
pub fn build_insurance_user_prompt(fields: &InsurancePromptFields) -> String {
    let mut out = String::new();

    out.push_str(&format!("**Case Tier:** {}\n", fields.tier));
    out.push_str(&format!("**Age Group:** {}\n", fields.age_group));
    if let Some(arches) = fields.arches {
        out.push_str(&format!("**Arches:** {}\n", arch_area_str(arches)));
    }
    if let Some(retainers) = fields.retainers_included {
        out.push_str(&format!("**Retainers Included:** {retainers}\n"));
    }
    if let Some(approach) = &fields.monitoring_approach {
        out.push_str(&format!("**Monitoring Approach:** {approach}\n"));
    }
    if let Some(notes) = &fields.notes {
        out.push_str(&format!("**Notes:** {notes}\n"));
    }

    out.push_str("Target Audience: internal\nDesired Tone: clinical");

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn treatment_prompt_is_deterministic() {
        let fields = TreatmentPromptFields {
            patient_age: Some(15),
            age_group: Some("adolescent"),
            treatment_type: "clear aligners".to_string(),
            area_treated: ArchArea::Both,
            duration_range: "4-6 months".to_string(),
            audience: Audience::Patient,
            tone: Tone::Reassuring,
            ..Default::default()
        };
        let a = build_treatment_user_prompt(&fields);
        let b = build_treatment_user_prompt(&fields);
        assert_eq!(a, b);
        assert!(a.starts_with("Patient Age: 15 (adolescent)\n"));
        assert!(a.contains("Target Audience: patient\nDesired Tone: reassuring"));
    }

    #[test]
    fn absent_optional_fields_are_omitted_not_null() {
        let fields = TreatmentPromptFields {
            treatment_type: "clear aligners".to_string(),
            duration_range: "4-6 months".to_string(),
            ..Default::default()
        };
        let prompt = build_treatment_user_prompt(&fields);
        assert!(!prompt.contains("null"));
        assert!(!prompt.contains("Patient Name"));
    }

    #[test]
    fn insurance_disclaimer_is_stable() {
        assert!(INSURANCE_SUMMARY_SYSTEM_PROMPT.contains(INSURANCE_DISCLAIMER));
    }
}
