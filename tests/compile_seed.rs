use morpholang::{
    control_loop::CheckpointKind,
    engine::MorphoEngine,
    matcher::find_subroutine,
    protocol::PhaseKind,
    store::{DATABASE_ENV, RUNTIME_DATABASE_PATH, SubroutineStore, default_store},
};
use std::{env, fs, path::Path};
use tempfile::tempdir;

fn engine() -> MorphoEngine {
    MorphoEngine::from_store(SubroutineStore::builtin())
}

#[test]
fn eye_protocol_end_to_end() {
    let engine = engine();
    let doc = engine.compile("eye", "Xenopus laevis").unwrap();
    let text = doc.render_text();

    assert!(text.contains("BIOELECTRIC COMPILER PROTOCOL"));
    assert!(text.contains("PHASE 0: DEVELOPMENTAL CONTEXT"));
    assert!(text.contains("TARGET STATE DEFINITION"));
    assert!(text.contains("HARDWARE SELECTION"));
    assert!(text.contains("Ratiometric Voltage Imaging"));
    assert!(text.contains("PHASE 4: HOMEOSTATIC MAINTENANCE"));
    assert!(text.contains("CLOSED-LOOP intervention"));
    assert!(text.contains("Monitoring Schedule"));
    assert!(text.contains("Feedback Decision Tree"));
    assert!(text.contains("STOP CONDITIONS"));

    let plan = doc
        .phase(PhaseKind::HomeostaticMaintenance)
        .and_then(|p| p.maintenance.as_ref())
        .unwrap();
    let kinds = plan.schedule.iter().map(|c| c.kind).collect::<Vec<_>>();
    assert_eq!(
        kinds.iter().filter(|k| **k == CheckpointKind::Baseline).count(),
        1
    );
    assert!(kinds.contains(&CheckpointKind::RangeVerification));
}

#[test]
fn tail_protocol_lists_checkpoints() {
    let text = engine()
        .compile("tail", "Xenopus laevis")
        .unwrap()
        .render_text();
    assert!(text.contains("T+0h:"));
    assert!(text.contains("Baseline measurement"));
    assert!(text.contains("Verify Vmem"));
    assert!(text.contains("TARGET: REGENERATE TAIL in Xenopus laevis"));
}

#[test]
fn planaria_bath_application_is_not_flagged() {
    let text = engine()
        .compile("head", "Girardia dorotocephala")
        .unwrap()
        .render_text();
    assert!(text.contains("PHASE 3: DELIVERY & SPATIAL CONSTRAINTS"));
    assert!(!text.contains("WARNING: GLOBAL REMODELING RISK"));
}

#[test]
fn malformed_database_degrades_to_empty_engine() {
    let td = tempdir().unwrap();
    let path = td.path().join("database_seed.json");
    fs::write(&path, "{ this is not a list").unwrap();
    let engine = MorphoEngine::from_store(SubroutineStore::load_lenient(&path));
    assert!(engine.store().is_empty());
    assert!(engine.compile("eye", "Xenopus laevis").is_none());
    assert!(engine.predict(-40.0, "ventral_ectoderm", None).is_empty());
}

#[test]
fn inverse_lookup_round_trips_every_seed_record() {
    let engine = engine();
    for sub in engine.store() {
        let state = &sub.bioelectric_state;
        let found = engine.predict(
            state.target_vmem_range.midpoint(),
            &state.spatial_domain,
            Some(sub.species()),
        );
        assert!(found.iter().any(|m| m.id == sub.id));
    }
}

#[test]
fn library_entry_points_use_process_wide_store() {
    let store = default_store();
    if env::var_os(DATABASE_ENV).is_none() && !Path::new(RUNTIME_DATABASE_PATH).exists() {
        assert_eq!(store.len(), SubroutineStore::builtin().len());
    }

    let expected = find_subroutine(store, "eye", "Xenopus laevis").map(|s| s.id.clone());
    let compiled = morpholang::compile("EYE", "xenopus laevis").map(|doc| doc.header.subroutine_id);
    assert_eq!(compiled, expected);

    let predicted = morpholang::predict(-40.0, "ventral_ectoderm", Some(""))
        .into_iter()
        .map(|s| s.id.as_str())
        .collect::<Vec<_>>();
    let direct = morpholang::predict::predict(store, -40.0, "ventral_ectoderm", None)
        .into_iter()
        .map(|s| s.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(predicted, direct);
}
