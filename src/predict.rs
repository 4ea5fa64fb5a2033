//! Inverse lookup: from an observed membrane voltage back to the
//! morphological outcomes whose target state contains it.

use crate::store::SubroutineStore;
use itertools::Itertools;
use morpho_protocol::Subroutine;
use serde::Serialize;

pub const NO_MATCH_MESSAGE: &str = "No matching morphological outcomes found for this pattern.";

/// Loose spatial-domain match: either string contains the other, ignoring case.
///
/// Domain vocabularies differ in granularity ("ectoderm" vs
/// "ventral_ectoderm"); stricter taxonomies replace this function only.
pub fn domain_matches(query: &str, record_domain: &str) -> bool {
    let query = query.to_lowercase();
    let record_domain = record_domain.to_lowercase();
    query.contains(&record_domain) || record_domain.contains(&query)
}

/// A blank species filter counts as absent.
fn species_matches(sub: &Subroutine, species: Option<&str>) -> bool {
    match species.map(str::trim).filter(|s| !s.is_empty()) {
        Some(species) => sub.species().to_lowercase() == species.to_lowercase(),
        None => true,
    }
}

/// All records consistent with `vmem` observed in `spatial_domain`, in store order.
pub fn predict<'a>(
    store: &'a SubroutineStore,
    vmem: f64,
    spatial_domain: &str,
    species: Option<&str>,
) -> Vec<&'a Subroutine> {
    store
        .iter()
        .filter(|sub| species_matches(sub, species))
        .filter(|sub| domain_matches(spatial_domain, &sub.bioelectric_state.spatial_domain))
        .filter(|sub| sub.bioelectric_state.target_vmem_range.contains(vmem))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub subroutine_id: String,
    pub action: String,
    pub organ: String,
    pub species: String,
    pub mechanism: Option<String>,
    pub target_vmem_range: [f64; 2],
    pub verifier_genes: Vec<String>,
}

impl From<&Subroutine> for Prediction {
    fn from(sub: &Subroutine) -> Self {
        Self {
            subroutine_id: sub.id.clone(),
            action: sub.target_morphology.action.clone(),
            organ: sub.organ().to_string(),
            species: sub.species().to_string(),
            mechanism: sub.bioelectric_state.notes.clone(),
            target_vmem_range: sub.bioelectric_state.target_vmem_range.raw(),
            verifier_genes: sub.biomarker_genes().into_iter().map(str::to_string).collect(),
        }
    }
}

pub fn render_prediction_report(matches: &[&Subroutine]) -> String {
    if matches.is_empty() {
        return NO_MATCH_MESSAGE.to_string();
    }
    let mut report = vec![
        "=".repeat(60),
        "BIOELECTRIC PATTERN DECODER REPORT".to_string(),
        format!("Matches Found: {}", matches.len()),
        "=".repeat(60),
    ];
    for (i, sub) in matches.iter().enumerate() {
        let state = &sub.bioelectric_state;
        report.push(format!(
            "\nPREDICTION #{}: {} {}",
            i + 1,
            sub.target_morphology.action.to_uppercase(),
            sub.organ().to_uppercase()
        ));
        report.push(format!("  Species:    {}", sub.species()));
        report.push(format!(
            "  Mechanism:  {}",
            state.notes.as_deref().unwrap_or("not documented")
        ));
        report.push(format!(
            "  Confidence: High (Voltage matches target range {} mV)",
            state.target_vmem_range
        ));
        let genes = sub.biomarker_genes();
        if !genes.is_empty() {
            report.push(format!(
                "  Verifiers:  Check for expression of {}",
                genes.iter().join(", ")
            ));
        }
    }
    report.push("-".repeat(60));
    report.join("\n")
}
