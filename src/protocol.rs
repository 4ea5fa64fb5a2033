//! Lowering of a subroutine record into an ordered, multi-phase lab protocol.
//!
//! Each phase builder maps one (possibly absent) record section to an
//! optional phase; the document is the ordered concatenation of the phases
//! that were produced. Only `target_morphology`, `bioelectric_state` and
//! `hardware_drivers` are ever assumed present.

use crate::{
    control_loop::{
        Checkpoint, FeedbackTree, StopCondition, feedback_tree, monitoring_schedule,
        termination_criteria,
    },
    risk::{SpatialRiskWarning, analyze_spatial_risk},
};
use chrono::{DateTime, Local};
use itertools::Itertools;
use morpho_protocol::{
    BioelectricState, Biomarker, ControlLoop, DeliveryMethod, DevelopmentalContext,
    HardwareDriver, Subroutine,
};
use serde::Serialize;

pub const PROTOCOL_TITLE: &str = "BIOELECTRIC COMPILER PROTOCOL v1.0";
pub const DEFAULT_DOSAGE: &str = "See paper";
const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    DevelopmentalContext,
    TargetState,
    HardwareSelection,
    DeliveryConstraints,
    HomeostaticMaintenance,
    SafetyVerification,
}

impl PhaseKind {
    pub fn number(self) -> u8 {
        match self {
            Self::DevelopmentalContext => 0,
            Self::TargetState => 1,
            Self::HardwareSelection => 2,
            Self::DeliveryConstraints => 3,
            Self::HomeostaticMaintenance => 4,
            Self::SafetyVerification => 5,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::DevelopmentalContext => "DEVELOPMENTAL CONTEXT",
            Self::TargetState => "TARGET STATE DEFINITION",
            Self::HardwareSelection => "HARDWARE SELECTION",
            Self::DeliveryConstraints => "DELIVERY & SPATIAL CONSTRAINTS",
            Self::HomeostaticMaintenance => "HOMEOSTATIC MAINTENANCE",
            Self::SafetyVerification => "SAFETY & VERIFICATION",
        }
    }

    pub fn heading(self) -> String {
        format!("[PHASE {}: {}]", self.number(), self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenancePlan {
    pub monitoring_frequency: String,
    pub schedule: Vec<Checkpoint>,
    pub feedback: FeedbackTree,
    pub stop_conditions: Vec<StopCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    pub kind: PhaseKind,
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<SpatialRiskWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<MaintenancePlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biomarkers: Option<Vec<Biomarker>>,
}

impl Phase {
    fn new(kind: PhaseKind, lines: Vec<String>) -> Self {
        Self {
            kind,
            lines,
            risk: None,
            maintenance: None,
            biomarkers: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolHeader {
    pub title: String,
    pub generated: String,
    pub subroutine_id: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolDocument {
    pub header: ProtocolHeader,
    pub phases: Vec<Phase>,
}

impl ProtocolDocument {
    pub fn phase(&self, kind: PhaseKind) -> Option<&Phase> {
        self.phases.iter().find(|p| p.kind == kind)
    }

    pub fn has_phase(&self, kind: PhaseKind) -> bool {
        self.phase(kind).is_some()
    }

    pub fn phase_kinds(&self) -> Vec<PhaseKind> {
        self.phases.iter().map(|p| p.kind).collect()
    }

    pub fn render_text(&self) -> String {
        let mut out = vec![
            self.header.title.clone(),
            format!("generated: {}", self.header.generated),
            format!("TARGET: {}", self.header.target),
            "-".repeat(RULE_WIDTH),
        ];
        for phase in &self.phases {
            out.push(format!("\n{}", phase.kind.heading()));
            out.extend(phase.lines.iter().cloned());
        }
        out.join("\n")
    }
}

fn developmental_context_phase(context: Option<&DevelopmentalContext>) -> Option<Phase> {
    let context = context?;
    let lines = vec![
        format!(
            "Intervene only inside this developmental window ({} staging):",
            context.reference_system
        ),
        format!("  > Start Stage: {}", context.stage_start),
        format!(
            "  > End Stage:   {}",
            context.stage_end.as_deref().unwrap_or("open-ended")
        ),
        "Outside this window the tissue may not be competent to respond.".to_string(),
    ];
    Some(Phase::new(PhaseKind::DevelopmentalContext, lines))
}

fn target_state_phase(organ: &str, state: &BioelectricState) -> Phase {
    let mut lines = vec![
        format!("To achieve {organ} morphogenesis, the tissue must enter the following state:"),
        format!("  > Spatial Domain: {}", state.spatial_domain),
        format!("  > Target Vmem:    {} mV", state.target_vmem_range),
        format!("  > Duration:       {} hours", state.duration_hours),
    ];
    if let Some(profile) = &state.temporal_profile {
        lines.push(format!("  > Temporal:       {profile}"));
    }
    lines.push(format!(
        "  > Logic Note:     {}",
        state.notes.as_deref().unwrap_or("")
    ));
    Phase::new(PhaseKind::TargetState, lines)
}

fn hardware_phase(drivers: &[HardwareDriver], references: &[String]) -> Phase {
    let mut lines = vec!["Select ONE of the following drivers to instantiate the state:".to_string()];
    for (i, driver) in drivers.iter().enumerate() {
        lines.push(format!(
            "\n  OPTION {}: {} ({})",
            i + 1,
            driver.name,
            driver.driver_type
        ));
        lines.push(format!("    - Mechanism: {}", driver.mechanism_of_action));
        lines.push(format!(
            "    - Dosage:    {}",
            driver.dosage.as_deref().unwrap_or(DEFAULT_DOSAGE)
        ));
    }
    if !references.is_empty() {
        lines.push(format!("\n  Sources: {}", references.iter().join(", ")));
    }
    Phase::new(PhaseKind::HardwareSelection, lines)
}

fn delivery_phase(delivery: Option<&DeliveryMethod>, spatial_domain: &str) -> Option<Phase> {
    let delivery = delivery?;
    let mut lines = vec![
        format!("  > Method:      {}", delivery.method_type),
        format!("  > Restriction: {}", delivery.spatial_restriction),
    ];
    if let Some(timing) = &delivery.timing {
        lines.push(format!("  > Timing:      {timing}"));
    }
    if let Some(notes) = &delivery.notes {
        lines.push(format!("  > Notes:       {notes}"));
    }
    let risk = analyze_spatial_risk(spatial_domain, Some(delivery));
    match &risk {
        Some(warning) => {
            lines.push(String::new());
            lines.extend(warning.lines());
        }
        None => lines.push(format!(
            "  Spatial check: delivery is compatible with target domain '{spatial_domain}'."
        )),
    }
    let mut phase = Phase::new(PhaseKind::DeliveryConstraints, lines);
    phase.risk = risk;
    Some(phase)
}

fn maintenance_phase(control: Option<&ControlLoop>, state: &BioelectricState) -> Option<Phase> {
    let control = control?;
    let plan = MaintenancePlan {
        monitoring_frequency: control.monitoring_frequency.clone(),
        schedule: monitoring_schedule(control, state),
        feedback: feedback_tree(control, state),
        stop_conditions: termination_criteria(control),
    };

    let mut lines = vec![
        "This is a CLOSED-LOOP intervention: measure, compare against the target, correct.".to_string(),
        format!("  Monitoring Frequency: {}", plan.monitoring_frequency),
        "\n  Monitoring Schedule:".to_string(),
    ];
    lines.extend(plan.schedule.iter().map(|c| format!("    {}", c.line())));
    lines.push("\n  Feedback Decision Tree:".to_string());
    for branch in &plan.feedback.branches {
        lines.extend(branch.lines().into_iter().map(|l| format!("    {l}")));
    }
    lines.push("\n  STOP CONDITIONS (whichever is met first):".to_string());
    lines.extend(
        plan.stop_conditions
            .iter()
            .enumerate()
            .map(|(i, s)| format!("    {}. {}", i + 1, s.line())),
    );

    let mut phase = Phase::new(PhaseKind::HomeostaticMaintenance, lines);
    phase.maintenance = Some(plan);
    Some(phase)
}

fn verification_phase(biomarkers: Option<&Vec<Biomarker>>, state: &BioelectricState) -> Phase {
    let (lo, hi) = state.target_vmem_range.sorted();
    let mut lines = vec![
        "(!) WARNING: High voltage/current can cause irreversible damage.".to_string(),
        format!(
            "(!) VERIFY:  Use Ratiometric Voltage Imaging (e.g. CC2-DMPE/DiSBAC2(3)) to confirm Vmem in [{lo}, {hi}] mV before 24h."
        ),
        "    Calibrate dye intensity against voltage-clamped cells before converting to mV.".to_string(),
    ];
    let biomarkers = biomarkers.filter(|b| !b.is_empty());
    if let Some(markers) = biomarkers {
        lines.push("\n  Genetic Biomarker Checklist:".to_string());
        lines.extend(markers.iter().map(|m| {
            format!(
                "    [ ] {}: {} at {} in {}",
                m.gene, m.expected_expression, m.check_time, m.location
            )
        }));
    }
    let mut phase = Phase::new(PhaseKind::SafetyVerification, lines);
    phase.biomarkers = biomarkers.cloned();
    phase
}

pub fn assemble_at(sub: &Subroutine, generated: DateTime<Local>) -> ProtocolDocument {
    let target = &sub.target_morphology;
    let state = &sub.bioelectric_state;

    let header = ProtocolHeader {
        title: PROTOCOL_TITLE.to_string(),
        generated: generated.format("%Y-%m-%d %H:%M").to_string(),
        subroutine_id: sub.id.clone(),
        target: format!(
            "{} {} in {}",
            target.action.to_uppercase(),
            target.organ.to_uppercase(),
            target.species
        ),
    };

    let phases = [
        developmental_context_phase(sub.developmental_context.as_ref()),
        Some(target_state_phase(&target.organ, state)),
        Some(hardware_phase(&sub.hardware_drivers, sub.references())),
        delivery_phase(sub.delivery_method.as_ref(), &state.spatial_domain),
        maintenance_phase(sub.control_loop.as_ref(), state),
        Some(verification_phase(sub.downstream_biomarkers.as_ref(), state)),
    ]
    .into_iter()
    .flatten()
    .collect();

    ProtocolDocument { header, phases }
}

/// Translates a subroutine into its lab protocol, stamped with the current time.
pub fn assemble(sub: &Subroutine) -> ProtocolDocument {
    assemble_at(sub, Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        control_loop::CheckpointKind, matcher::find_subroutine, store::SubroutineStore,
        store::fixtures::record,
    };
    use morpho_protocol::{FeedbackMechanism, TerminationCriteria};

    fn eye() -> Subroutine {
        let mut sub = record("eye", "eye", "Xenopus laevis", "ventral_ectoderm", [-50.0, -30.0]);
        sub.control_loop = Some(ControlLoop {
            monitoring_frequency: "every 4 hours".to_string(),
            feedback_mechanism: FeedbackMechanism::default(),
            termination_criteria: TerminationCriteria {
                max_duration_hours: 48.0,
                anatomical_marker: Some("ectopic eye".to_string()),
                bioelectric_marker: None,
            },
        });
        sub
    }

    #[test]
    fn test_minimal_record_yields_required_phases_only() {
        let sub = record("min", "eye", "Xenopus laevis", "ventral_ectoderm", [-30.0, -50.0]);
        let doc = assemble(&sub);
        assert_eq!(
            doc.phase_kinds(),
            vec![
                PhaseKind::TargetState,
                PhaseKind::HardwareSelection,
                PhaseKind::SafetyVerification
            ]
        );
        let text = doc.render_text();
        assert!(!text.contains("HOMEOSTATIC MAINTENANCE"));
        assert!(!text.contains("Genetic Biomarker Checklist"));
        assert!(text.contains("Dosage:    See paper"));
    }

    #[test]
    fn test_full_record_phase_order() {
        let store = SubroutineStore::builtin();
        let sub = find_subroutine(&store, "eye", "Xenopus laevis").unwrap();
        let doc = assemble(sub);
        assert_eq!(
            doc.phase_kinds(),
            vec![
                PhaseKind::DevelopmentalContext,
                PhaseKind::TargetState,
                PhaseKind::HardwareSelection,
                PhaseKind::DeliveryConstraints,
                PhaseKind::HomeostaticMaintenance,
                PhaseKind::SafetyVerification
            ]
        );
        let text = doc.render_text();
        assert!(text.starts_with(PROTOCOL_TITLE));
        assert!(text.contains("TARGET: INDUCE EYE in Xenopus laevis"));
        assert!(text.contains("[PHASE 0: DEVELOPMENTAL CONTEXT]"));
        assert!(text.contains("OPTION 3: GlyR + ivermectin (ligand_gated_channel)"));
        assert!(text.contains("Sources: Pai VP et al."));
        assert!(text.contains("Ratiometric Voltage Imaging"));
        assert!(text.contains("[ ] Pax6: upregulated at NF 22 in ventral_ectoderm"));
    }

    #[test]
    fn test_maintenance_phase_embeds_schedule_tree_and_stops() {
        let doc = assemble(&eye());
        let phase = doc.phase(PhaseKind::HomeostaticMaintenance).unwrap();
        let plan = phase.maintenance.as_ref().unwrap();
        let baselines = plan
            .schedule
            .iter()
            .filter(|c| c.kind == CheckpointKind::Baseline)
            .count();
        assert_eq!(baselines, 1);
        assert!(plan
            .schedule
            .iter()
            .any(|c| c.kind == CheckpointKind::RangeVerification));

        let text = phase.lines.join("\n");
        let schedule_at = text.find("Monitoring Schedule").unwrap();
        let tree_at = text.find("Feedback Decision Tree").unwrap();
        let stops_at = text.find("STOP CONDITIONS").unwrap();
        assert!(schedule_at < tree_at && tree_at < stops_at);
        assert!(text.contains("CLOSED-LOOP intervention"));
        assert!(text.contains("T+0h: Baseline measurement"));
    }

    #[test]
    fn test_risk_warning_embedded_only_when_triggered() {
        let mut sub = record("stump", "tail", "Xenopus laevis", "amputation_stump", [-10.0, -30.0]);
        sub.delivery_method = Some(DeliveryMethod {
            method_type: "bath_application".to_string(),
            spatial_restriction: "systemic".to_string(),
            timing: None,
            notes: None,
        });
        let doc = assemble(&sub);
        let phase = doc.phase(PhaseKind::DeliveryConstraints).unwrap();
        assert!(phase.risk.is_some());
        assert!(doc.render_text().contains("WARNING: GLOBAL REMODELING RISK"));

        let store = SubroutineStore::builtin();
        let planaria = find_subroutine(&store, "head", "Girardia dorotocephala").unwrap();
        assert!(!assemble(planaria).render_text().contains("GLOBAL REMODELING RISK"));
    }

    #[test]
    fn test_assembly_is_idempotent_apart_from_timestamp() {
        let sub = eye();
        let first = assemble(&sub);
        let second = assemble(&sub);
        assert_eq!(first.phases, second.phases);
        assert_eq!(first.header.target, second.header.target);

        let at = Local::now();
        assert_eq!(assemble_at(&sub, at), assemble_at(&sub, at));
    }

    #[test]
    fn test_document_serializes_to_json() {
        let doc = assemble(&eye());
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["phases"][0]["kind"], "target_state");
        assert_eq!(value["header"]["subroutine_id"], "eye");
    }
}
