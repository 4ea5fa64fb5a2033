use crate::{
    config::MorphoConfig,
    matcher::find_subroutine,
    predict::{Prediction, predict, render_prediction_report},
    protocol::{ProtocolDocument, assemble},
    store::{StoreIssue, SubroutineStore},
    verification::{BioStateValidator, VerificationOutcome, VmemMap, verify_observed},
};
use morpho_protocol::Subroutine;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct SubroutineSummary {
    pub id: String,
    pub action: String,
    pub organ: String,
    pub species: String,
    pub spatial_domain: String,
    pub target_vmem_range: [f64; 2],
    pub has_control_loop: bool,
}

impl From<&Subroutine> for SubroutineSummary {
    fn from(sub: &Subroutine) -> Self {
        Self {
            id: sub.id.clone(),
            action: sub.target_morphology.action.clone(),
            organ: sub.organ().to_string(),
            species: sub.species().to_string(),
            spatial_domain: sub.bioelectric_state.spatial_domain.clone(),
            target_vmem_range: sub.bioelectric_state.target_vmem_range.raw(),
            has_control_loop: sub.control_loop.is_some(),
        }
    }
}

/// Forward compiler and inverse decoder over one read-only store.
#[derive(Debug, Clone, Default)]
pub struct MorphoEngine {
    store: SubroutineStore,
    validator: BioStateValidator,
}

impl MorphoEngine {
    pub fn new() -> Self {
        Self::from_store(SubroutineStore::load())
    }

    pub fn from_store(store: SubroutineStore) -> Self {
        Self {
            store,
            validator: BioStateValidator::default(),
        }
    }

    pub fn from_config(config: &MorphoConfig) -> Self {
        Self {
            store: SubroutineStore::load_from_path(config.database_path.as_deref()),
            validator: config.validator(),
        }
    }

    pub fn store(&self) -> &SubroutineStore {
        &self.store
    }

    pub fn validator(&self) -> &BioStateValidator {
        &self.validator
    }

    pub fn summaries(&self) -> Vec<SubroutineSummary> {
        self.store.iter().map(SubroutineSummary::from).collect()
    }

    pub fn validate_store(&self) -> Vec<StoreIssue> {
        self.store.validate()
    }

    pub fn find_subroutine(&self, organ: &str, species: &str) -> Option<&Subroutine> {
        info!("Compiling request: build '{organ}' in '{species}'");
        let found = find_subroutine(&self.store, organ, species);
        match found {
            Some(sub) => debug!("matched subroutine {}", sub.id),
            None => info!("no subroutine for '{organ}' in '{species}'"),
        }
        found
    }

    pub fn generate_protocol(&self, sub: &Subroutine) -> ProtocolDocument {
        assemble(sub)
    }

    /// `None` is a lookup miss, not an error.
    pub fn compile(&self, organ: &str, species: &str) -> Option<ProtocolDocument> {
        self.find_subroutine(organ, species)
            .map(|sub| self.generate_protocol(sub))
    }

    pub fn predict(&self, vmem: f64, spatial_domain: &str, species: Option<&str>) -> Vec<&Subroutine> {
        info!("Analyzing bioelectric pattern: {vmem} mV in '{spatial_domain}'");
        predict(&self.store, vmem, spatial_domain, species)
    }

    pub fn predictions(
        &self,
        vmem: f64,
        spatial_domain: &str,
        species: Option<&str>,
    ) -> Vec<Prediction> {
        self.predict(vmem, spatial_domain, species)
            .into_iter()
            .map(Prediction::from)
            .collect()
    }

    pub fn prediction_report(&self, vmem: f64, spatial_domain: &str, species: Option<&str>) -> String {
        render_prediction_report(&self.predict(vmem, spatial_domain, species))
    }

    /// Checks a voltage map against the target state of the matching record.
    pub fn verify_map(&self, organ: &str, species: &str, map: &VmemMap) -> Option<VerificationOutcome> {
        let sub = self.find_subroutine(organ, species)?;
        Some(self.validator.verify_state(map, &sub.bioelectric_state))
    }

    pub fn verify_observed(&self, organ: &str, species: &str, observed_mean: f64) -> Option<VerificationOutcome> {
        let sub = self.find_subroutine(organ, species)?;
        Some(verify_observed(
            observed_mean,
            &sub.bioelectric_state.target_vmem_range,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{protocol::PhaseKind, store::fixtures::record, verification::Calibration};

    fn engine() -> MorphoEngine {
        MorphoEngine::from_store(SubroutineStore::builtin())
    }

    #[test]
    fn test_compile_known_and_unknown_targets() {
        let engine = engine();
        let doc = engine.compile("EYE", "xenopus laevis").unwrap();
        assert_eq!(doc.header.subroutine_id, "xenopus_eye_induction_01");
        assert!(engine.compile("nonexistent", "Fake Species").is_none());
    }

    #[test]
    fn test_tail_protocol_has_long_schedule() {
        let doc = engine().compile("tail", "Xenopus laevis").unwrap();
        let plan = doc
            .phase(PhaseKind::HomeostaticMaintenance)
            .and_then(|p| p.maintenance.as_ref())
            .unwrap();
        let hours = plan.schedule.iter().map(|c| c.hour).collect::<Vec<_>>();
        assert_eq!(hours, vec![0, 8, 24, 48, 72, 96, 120, 168]);
        assert_eq!(plan.feedback.upper_threshold, -5.0);
        assert_eq!(plan.feedback.lower_threshold, -35.0);
    }

    #[test]
    fn test_record_without_control_loop_omits_maintenance() {
        let engine = MorphoEngine::from_store(SubroutineStore::from_subroutines(vec![record(
            "bare",
            "eye",
            "Xenopus laevis",
            "ventral_ectoderm",
            [-50.0, -30.0],
        )]));
        let doc = engine.compile("eye", "Xenopus laevis").unwrap();
        assert!(!doc.has_phase(PhaseKind::HomeostaticMaintenance));
    }

    #[test]
    fn test_empty_store_misses_everything() {
        let engine = MorphoEngine::from_store(SubroutineStore::empty());
        assert!(engine.compile("eye", "Xenopus laevis").is_none());
        assert!(engine.predict(-40.0, "ventral_ectoderm", None).is_empty());
        assert!(engine.summaries().is_empty());
    }

    #[test]
    fn test_predictions_and_report() {
        let engine = engine();
        let predictions = engine.predictions(-40.0, "ventral_ectoderm", Some("Xenopus laevis"));
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].organ, "eye");
        assert!(engine
            .prediction_report(-40.0, "ventral_ectoderm", None)
            .contains("INDUCE EYE"));
    }

    #[test]
    fn test_verify_against_record_range() {
        let engine = engine();
        let map = VmemMap::from_intensities(4, 4, &[40u8; 16], &Calibration::default()).unwrap();
        assert!(engine.verify_map("eye", "Xenopus laevis", &map).unwrap().success);
        let miss = engine.verify_observed("eye", "Xenopus laevis", -70.0).unwrap();
        assert!(!miss.success);
        assert_eq!(miss.deviation, 20.0);
        assert!(engine.verify_observed("gill", "Xenopus laevis", -40.0).is_none());
    }

    #[test]
    fn test_summaries_follow_store_order() {
        let ids = engine()
            .summaries()
            .into_iter()
            .map(|s| s.id)
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![
                "xenopus_eye_induction_01",
                "xenopus_tail_regeneration_01",
                "planaria_head_regeneration_01"
            ]
        );
    }
}
