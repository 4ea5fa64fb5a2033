//! Delivery-versus-target compatibility rule.

use morpho_protocol::{DeliveryMethod, SpatialRestriction};
use serde::Serialize;

/// Domain keywords naming a spatially confined intervention target.
pub const LOCAL_DOMAIN_MARKERS: &[&str] = &[
    "amputation_stump",
    "regeneration_bud",
    "blastema",
    "ventral_ectoderm",
    "wound_epidermis",
    "eye_field",
    "limb_bud",
];

pub const GLOBAL_REMODELING_WARNING: &str = "WARNING: GLOBAL REMODELING RISK";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpatialRiskWarning {
    pub spatial_domain: String,
    pub matched_marker: String,
    pub delivery_type: String,
}

impl SpatialRiskWarning {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("(!) {GLOBAL_REMODELING_WARNING}"),
            format!(
                "    Target domain '{}' is local ({}), but delivery '{}' is systemic.",
                self.spatial_domain, self.matched_marker, self.delivery_type
            ),
            "    Systemic exposure can shift Vmem outside the target domain and remodel".to_string(),
            "    non-target tissue. Prefer a locally restricted delivery method.".to_string(),
        ]
    }
}

fn local_marker_in(spatial_domain: &str) -> Option<&'static str> {
    let domain = spatial_domain.to_lowercase();
    LOCAL_DOMAIN_MARKERS
        .iter()
        .copied()
        .find(|marker| domain.contains(marker))
}

/// Flags a local target paired with systemic delivery. Every other
/// combination, and a missing delivery method, is accepted.
pub fn analyze_spatial_risk(
    spatial_domain: &str,
    delivery: Option<&DeliveryMethod>,
) -> Option<SpatialRiskWarning> {
    let delivery = delivery?;
    if delivery.restriction() != SpatialRestriction::Systemic {
        return None;
    }
    let marker = local_marker_in(spatial_domain)?;
    Some(SpatialRiskWarning {
        spatial_domain: spatial_domain.to_string(),
        matched_marker: marker.to_string(),
        delivery_type: delivery.method_type.clone(),
    })
}
