//! Static document-kind -> schema version mapping (spec.md §2 item 12).

use crate::domain::DocumentKind;

/// The schema version attached to every generation for `kind`, carried
/// into the resulting `AuditRecord` and `ConfirmationRecord`.
pub fn version_for(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::TreatmentSummary => "v1",
        DocumentKind::InsuranceSummary => "v1",
        DocumentKind::ProgressNotes => "v1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_kinds_resolve_to_a_version() {
        assert_eq!(version_for(DocumentKind::TreatmentSummary), "v1");
        assert_eq!(version_for(DocumentKind::InsuranceSummary), "v1");
    }
}
