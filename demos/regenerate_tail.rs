//! Tail regeneration rescue during the Xenopus refractory period, followed by
//! an inverse lookup of a voltage measured on the stump.

use morpholang::{engine::MorphoEngine, logging::init_tracing};

fn main() {
    init_tracing();
    println!("{}", "=".repeat(60));
    println!("MorphoLang Example: Tail Regeneration");
    println!("{}\n", "=".repeat(60));

    let engine = MorphoEngine::new();
    println!("Searching for 'tail' regeneration subroutine in 'Xenopus laevis'...\n");

    match engine.compile("tail", "Xenopus laevis") {
        Some(protocol) => println!("{}", protocol.render_text()),
        None => println!("[!] Error: No bioelectric subroutine found for this morphology."),
    }

    println!();
    println!(
        "{}",
        engine.prediction_report(-20.0, "amputation_stump", Some("Xenopus laevis"))
    );

    let outcomes = morpholang::predict(-20.0, "amputation_stump", None);
    println!(
        "\nProcess-wide database: {} outcome(s) for -20 mV on the stump.",
        outcomes.len()
    );
}
