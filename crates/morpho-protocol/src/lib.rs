//! Shared machine-readable MorphoLang contracts.
//!
//! These types describe one "subroutine" record of the bioelectric database:
//! the morphological goal, the membrane-voltage state that drives it and the
//! interventions that can instantiate that state. Optional sections stay
//! `Option` so that consumers decide per section what an absent block means.

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use std::fmt;

pub type SubroutineId = String;

/// Stage and timing labels are free-form; curated files write them either as
/// strings ("stage 10", "24h") or as bare numbers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or a number, got {other}"
        ))),
    }
}

/// Morphogenetic goal of a subroutine, e.g. "induce eye in Xenopus laevis".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMorphology {
    pub organ: String,
    pub species: String,
    pub action: String,
}

/// Target membrane-voltage window in mV.
///
/// Records store the two bounds in authoring order, which is not necessarily
/// ascending (`[-30, -50]` is common). Use [`VmemRange::sorted`] before
/// interpreting the pair as `(min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VmemRange(pub [f64; 2]);

impl VmemRange {
    pub fn new(a: f64, b: f64) -> Self {
        Self([a, b])
    }

    pub fn raw(&self) -> [f64; 2] {
        self.0
    }

    pub fn sorted(&self) -> (f64, f64) {
        let [a, b] = self.0;
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn midpoint(&self) -> f64 {
        let (lo, hi) = self.sorted();
        (lo + hi) / 2.0
    }

    /// Inclusive on both ends.
    pub fn contains(&self, vmem: f64) -> bool {
        let (lo, hi) = self.sorted();
        lo <= vmem && vmem <= hi
    }

    /// Distance from the nearest bound, 0.0 when inside.
    pub fn deviation(&self, vmem: f64) -> f64 {
        let (lo, hi) = self.sorted();
        if vmem < lo {
            lo - vmem
        } else if vmem > hi {
            vmem - hi
        } else {
            0.0
        }
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl fmt::Display for VmemRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.0[0], self.0[1])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BioelectricState {
    pub spatial_domain: String,
    pub target_vmem_range: VmemRange,
    pub duration_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One intervention able to instantiate the bioelectric state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareDriver {
    pub name: String,
    #[serde(rename = "type")]
    pub driver_type: String,
    pub mechanism_of_action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevelopmentalContext {
    #[serde(deserialize_with = "string_or_number")]
    pub stage_start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_end: Option<String>,
    pub reference_system: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackMechanism {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_vmem_drifts_above: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_vmem_drifts_below: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrective_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationCriteria {
    pub max_duration_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anatomical_marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bioelectric_marker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlLoop {
    pub monitoring_frequency: String,
    #[serde(default)]
    pub feedback_mechanism: FeedbackMechanism,
    pub termination_criteria: TerminationCriteria,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SpatialRestriction {
    Local,
    Systemic,
    Other,
}

impl SpatialRestriction {
    /// Exact, case-sensitive vocabulary match.
    pub fn parse(text: &str) -> Self {
        match text {
            "local" => Self::Local,
            "systemic" => Self::Systemic,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMethod {
    #[serde(rename = "type")]
    pub method_type: String,
    pub spatial_restriction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DeliveryMethod {
    pub fn restriction(&self) -> SpatialRestriction {
        SpatialRestriction::parse(&self.spatial_restriction)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Biomarker {
    pub gene: String,
    pub expected_expression: String,
    #[serde(deserialize_with = "string_or_number")]
    pub check_time: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One declarative entry of the bioelectric database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subroutine {
    pub id: SubroutineId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub target_morphology: TargetMorphology,
    pub bioelectric_state: BioelectricState,
    pub hardware_drivers: Vec<HardwareDriver>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developmental_context: Option<DevelopmentalContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_loop: Option<ControlLoop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_method: Option<DeliveryMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downstream_biomarkers: Option<Vec<Biomarker>>,
}

impl Subroutine {
    pub fn organ(&self) -> &str {
        &self.target_morphology.organ
    }

    pub fn species(&self) -> &str {
        &self.target_morphology.species
    }

    pub fn references(&self) -> &[String] {
        self.metadata
            .as_ref()
            .map(|m| m.references.as_slice())
            .unwrap_or(&[])
    }

    pub fn biomarker_genes(&self) -> Vec<&str> {
        self.downstream_biomarkers
            .iter()
            .flatten()
            .map(|b| b.gene.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "id": "min_01",
        "target_morphology": {"organ": "eye", "species": "Xenopus laevis", "action": "induce"},
        "bioelectric_state": {
            "spatial_domain": "ventral_ectoderm",
            "target_vmem_range": [-30, -50],
            "duration_hours": 48
        },
        "hardware_drivers": [
            {"name": "Kv1.5", "type": "ion_channel", "mechanism_of_action": "K+ efflux"}
        ]
    }"#;

    #[test]
    fn test_minimal_record_leaves_optional_sections_empty() {
        let sub: Subroutine = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(sub.organ(), "eye");
        assert!(sub.developmental_context.is_none());
        assert!(sub.control_loop.is_none());
        assert!(sub.delivery_method.is_none());
        assert!(sub.downstream_biomarkers.is_none());
        assert!(sub.references().is_empty());
        assert_eq!(sub.hardware_drivers[0].driver_type, "ion_channel");
    }

    #[test]
    fn test_range_keeps_authoring_order_but_sorts_on_use() {
        let sub: Subroutine = serde_json::from_str(MINIMAL).unwrap();
        let range = sub.bioelectric_state.target_vmem_range;
        assert_eq!(range.raw(), [-30.0, -50.0]);
        assert_eq!(range.sorted(), (-50.0, -30.0));
        assert_eq!(range.midpoint(), -40.0);
        assert_eq!(range.to_string(), "[-30, -50]");
    }

    #[test]
    fn test_range_containment_is_inclusive() {
        let range = VmemRange::new(-30.0, -50.0);
        assert!(range.contains(-50.0));
        assert!(range.contains(-30.0));
        assert!(!range.contains(-29.9));
        assert_eq!(range.deviation(-60.0), 10.0);
        assert_eq!(range.deviation(-20.0), 10.0);
        assert_eq!(range.deviation(-40.0), 0.0);
    }

    #[test]
    fn test_range_with_three_values_is_rejected() {
        let text = MINIMAL.replace("[-30, -50]", "[-30, -50, -70]");
        assert!(serde_json::from_str::<Subroutine>(&text).is_err());
    }

    #[test]
    fn test_metadata_keeps_unknown_keys() {
        let text = MINIMAL.replace(
            r#""id": "min_01","#,
            r#""id": "min_01", "metadata": {"references": ["Pai et al. 2012"], "curator": "lab"},"#,
        );
        let sub: Subroutine = serde_json::from_str(&text).unwrap();
        assert_eq!(sub.references(), ["Pai et al. 2012".to_string()]);
        let meta = sub.metadata.as_ref().unwrap();
        assert_eq!(meta.extra.get("curator").and_then(|v| v.as_str()), Some("lab"));
    }

    #[test]
    fn test_numeric_stage_and_check_time_are_accepted() {
        let text = MINIMAL.replace(
            r#""hardware_drivers""#,
            r#""developmental_context": {"stage_start": 10, "reference_system": "Nieuwkoop-Faber"},
            "downstream_biomarkers": [
                {"gene": "Pax6", "expected_expression": "up", "check_time": 24, "location": "eye field"},
                {"gene": "Rx1", "expected_expression": "up", "check_time": "stage 25", "location": "eye field"}
            ],
            "hardware_drivers""#,
        );
        let sub: Subroutine = serde_json::from_str(&text).unwrap();
        assert_eq!(sub.developmental_context.unwrap().stage_start, "10");
        let times = sub
            .downstream_biomarkers
            .unwrap()
            .into_iter()
            .map(|b| b.check_time)
            .collect::<Vec<_>>();
        assert_eq!(times, vec!["24", "stage 25"]);

        let bad = text.replace(r#""check_time": 24"#, r#""check_time": [24]"#);
        assert!(serde_json::from_str::<Subroutine>(&bad).is_err());
    }

    #[test]
    fn test_spatial_restriction_parse() {
        assert_eq!(SpatialRestriction::parse("systemic"), SpatialRestriction::Systemic);
        assert_eq!(SpatialRestriction::parse("Systemic"), SpatialRestriction::Other);
        assert_eq!(SpatialRestriction::parse(" systemic "), SpatialRestriction::Other);
        assert_eq!(SpatialRestriction::parse("local"), SpatialRestriction::Local);
        assert_eq!(SpatialRestriction::parse("tissue"), SpatialRestriction::Other);
    }
}
