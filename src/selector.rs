//! Deterministic CDT code selection from case attributes (spec.md §4.1).

use serde::Serialize;

use crate::code_store::CodeStore;
use crate::domain::DiagnosticAssets;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct AddOnCode {
    pub code: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionResult {
    pub primary_code: String,
    pub primary_description: String,
    pub primary_category: String,
    pub add_ons: Vec<AddOnCode>,
    pub notes: String,
}

/// `diagnostic_assets -> add-on code`, in the fixed order spec.md §4.1/§8
/// requires (`intraoral_photos, panoramic_xray, fmx`, each independent).
const ADD_ON_RULES: &[(&str, &str)] = &[
    ("intraoral_photos", "D0350"),
    ("panoramic_xray", "D0330"),
    ("fmx", "D0210"),
];

/// Selects the primary code for `(tier, age_group)` and, if `assets` is
/// given, appends insurance add-on codes. `tier` and `age_group` must
/// already be normalized lowercase enum strings (`"express"`, `"adult"`, …).
pub async fn select(
    store: &CodeStore,
    tier: &str,
    age_group: &str,
    assets: Option<&DiagnosticAssets>,
) -> AppResult<SelectionResult> {
    let rules = store.active_rules_for(tier, age_group).await?;
    let rule = rules.into_iter().next().ok_or_else(|| AppError::RuleNotFound {
        tier: tier.to_string(),
        age_group: age_group.to_string(),
    })?;

    let code_row = store
        .get_code(&rule.code)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::CodeInactive(rule.code.clone()))?;

    let mut add_ons = Vec::new();
    if let Some(assets) = assets {
        let flags = [
            ("intraoral_photos", assets.intraoral_photos),
            ("panoramic_xray", assets.panoramic_xray),
            ("fmx", assets.fmx),
        ];
        for (asset_name, code) in ADD_ON_RULES {
            let flagged = flags.iter().any(|(n, v)| n == asset_name && *v);
            if flagged {
                if let Some(row) = store.get_code(code).await? {
                    add_ons.push(AddOnCode {
                        code: row.code,
                        description: row.description,
                        category: row.category,
                    });
                }
            }
        }
    }

    Ok(SelectionResult {
        primary_code: code_row.code,
        primary_description: code_row.description,
        primary_category: code_row.category,
        add_ons,
        notes: format!("Selected based on tier={tier}, age_group={age_group}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn store() -> CodeStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        CodeStore::new(db.pool().clone())
    }

    #[tokio::test]
    async fn selector_scenarios_from_spec() {
        let store = store().await;
        for (tier, age_group, expected) in [
            ("express", "adolescent", "D8010"),
            ("mild", "adult", "D8010"),
            ("moderate", "adolescent", "D8080"),
            ("moderate", "adult", "D8090"),
            ("complex", "adult", "D8090"),
        ] {
            let result = select(&store, tier, age_group, None).await.unwrap();
            assert_eq!(result.primary_code, expected, "{tier}/{age_group}");
        }
    }

    #[tokio::test]
    async fn unknown_pair_fails_with_rule_not_found() {
        let store = store().await;
        let err = select(&store, "express", "nonbinary", None).await.unwrap_err();
        assert!(matches!(err, AppError::RuleNotFound { .. }));
    }

    #[tokio::test]
    async fn insurance_add_ons_follow_fixed_order_and_skip_false_flags() {
        let store = store().await;
        let assets = DiagnosticAssets {
            intraoral_photos: true,
            panoramic_xray: true,
            fmx: false,
        };
        let result = select(&store, "moderate", "adult", Some(&assets))
            .await
            .unwrap();
        let codes: Vec<_> = result.add_ons.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes, vec!["D0350", "D0330"]);
    }
}
