//! Closed-loop maintenance planning: measurement schedule, feedback decision
//! tree and stop conditions derived from a subroutine's `control_loop`.

use morpho_protocol::{BioelectricState, ControlLoop};
use serde::Serialize;

pub const DEFAULT_DEPOLARIZATION_ACTION: &str = "Monitor closely and reduce driver activity";
pub const DEFAULT_HYPERPOLARIZATION_ACTION: &str = "Allow stabilization before re-dosing";

/// Checkpoint grid for experiments up to `max_hours` long; `None` is open-ended.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointTier {
    pub max_hours: Option<f64>,
    pub hours: &'static [u32],
}

/// Longer experiments are sampled more coarsely.
pub const CHECKPOINT_TIERS: &[CheckpointTier] = &[
    CheckpointTier {
        max_hours: Some(48.0),
        hours: &[0, 4, 8, 12, 24, 36, 48],
    },
    CheckpointTier {
        max_hours: Some(72.0),
        hours: &[0, 6, 12, 24, 36, 48, 60, 72],
    },
    CheckpointTier {
        max_hours: None,
        hours: &[0, 8, 24, 48, 72, 96, 120, 168],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    Baseline,
    RangeVerification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Checkpoint {
    pub hour: u32,
    pub kind: CheckpointKind,
    pub description: String,
}

impl Checkpoint {
    pub fn line(&self) -> String {
        format!("T+{}h: {}", self.hour, self.description)
    }
}

pub fn checkpoint_tier(max_duration_hours: f64) -> &'static CheckpointTier {
    CHECKPOINT_TIERS
        .iter()
        .find(|tier| tier.max_hours.is_none_or(|max| max_duration_hours <= max))
        .unwrap_or(&CHECKPOINT_TIERS[CHECKPOINT_TIERS.len() - 1])
}

/// Measurement timeline bounded by the hard time cutoff.
///
/// `monitoring_frequency` is informational only and never changes the grid.
pub fn monitoring_schedule(control: &ControlLoop, state: &BioelectricState) -> Vec<Checkpoint> {
    let max = control.termination_criteria.max_duration_hours;
    let (lo, hi) = state.target_vmem_range.sorted();
    checkpoint_tier(max)
        .hours
        .iter()
        .copied()
        .filter(|hour| f64::from(*hour) <= max)
        .map(|hour| {
            if hour == 0 {
                Checkpoint {
                    hour,
                    kind: CheckpointKind::Baseline,
                    description: "Baseline measurement (immediately post-intervention)".to_string(),
                }
            } else {
                Checkpoint {
                    hour,
                    kind: CheckpointKind::RangeVerification,
                    description: format!(
                        "Verify Vmem within [{lo}, {hi}] mV in {}",
                        state.spatial_domain
                    ),
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftState {
    Depolarized,
    Hyperpolarized,
    Maintained,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackBranch {
    pub state: DriftState,
    pub condition: String,
    pub interpretation: String,
    pub action: String,
}

impl FeedbackBranch {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("IF {}:", self.condition),
            format!("  -> {}", self.interpretation),
            format!("  -> ACTION: {}", self.action),
        ]
    }
}

/// Three-way decision rule evaluated in order: above, below, otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackTree {
    pub upper_threshold: f64,
    pub lower_threshold: f64,
    pub branches: [FeedbackBranch; 3],
}

impl FeedbackTree {
    pub fn classify(&self, observed_vmem: f64) -> DriftState {
        if observed_vmem > self.upper_threshold {
            DriftState::Depolarized
        } else if observed_vmem < self.lower_threshold {
            DriftState::Hyperpolarized
        } else {
            DriftState::Maintained
        }
    }

    pub fn branch_for(&self, observed_vmem: f64) -> &FeedbackBranch {
        let state = self.classify(observed_vmem);
        self.branches
            .iter()
            .find(|b| b.state == state)
            .unwrap_or(&self.branches[2])
    }
}

pub fn feedback_tree(control: &ControlLoop, state: &BioelectricState) -> FeedbackTree {
    let (lo, hi) = state.target_vmem_range.sorted();
    let feedback = &control.feedback_mechanism;
    let upper = feedback.if_vmem_drifts_above.unwrap_or(hi);
    let lower = feedback.if_vmem_drifts_below.unwrap_or(lo);
    let corrective = feedback.corrective_action.as_deref();

    FeedbackTree {
        upper_threshold: upper,
        lower_threshold: lower,
        branches: [
            FeedbackBranch {
                state: DriftState::Depolarized,
                condition: format!("Vmem > {upper} mV"),
                interpretation: "Depolarization drift: tissue is leaving the target state".to_string(),
                action: corrective.unwrap_or(DEFAULT_DEPOLARIZATION_ACTION).to_string(),
            },
            FeedbackBranch {
                state: DriftState::Hyperpolarized,
                condition: format!("Vmem < {lower} mV"),
                interpretation: "Hyperpolarization drift: overshoot beyond the target state".to_string(),
                action: corrective.unwrap_or(DEFAULT_HYPERPOLARIZATION_ACTION).to_string(),
            },
            FeedbackBranch {
                state: DriftState::Maintained,
                condition: format!("{lower} <= Vmem <= {upper} mV"),
                interpretation: "Target state maintained".to_string(),
                action: "Continue scheduled monitoring".to_string(),
            },
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Anatomical,
    Bioelectric,
    SafetyCutoff,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopCondition {
    pub kind: StopKind,
    pub description: String,
}

impl StopCondition {
    pub fn line(&self) -> String {
        let label = match self.kind {
            StopKind::Anatomical => "SUCCESS (anatomical)",
            StopKind::Bioelectric => "SUCCESS (bioelectric)",
            StopKind::SafetyCutoff => "SAFETY CUTOFF",
        };
        format!("{label}: {}", self.description)
    }
}

/// Anatomical, then bioelectric, then the hard cutoff, which is always last.
pub fn termination_criteria(control: &ControlLoop) -> Vec<StopCondition> {
    let criteria = &control.termination_criteria;
    let mut out = Vec::with_capacity(3);
    if let Some(marker) = &criteria.anatomical_marker {
        out.push(StopCondition {
            kind: StopKind::Anatomical,
            description: marker.clone(),
        });
    }
    if let Some(marker) = &criteria.bioelectric_marker {
        out.push(StopCondition {
            kind: StopKind::Bioelectric,
            description: marker.clone(),
        });
    }
    out.push(StopCondition {
        kind: StopKind::SafetyCutoff,
        description: format!(
            "Terminate after {} hours regardless of outcome",
            criteria.max_duration_hours
        ),
    });
    out
}
