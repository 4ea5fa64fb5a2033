//! Ectopic eye induction in Xenopus laevis.

use morpholang::{engine::MorphoEngine, logging::init_tracing};

fn main() {
    init_tracing();
    println!("{}", "=".repeat(60));
    println!("MorphoLang Example: Ectopic Eye Induction");
    println!("{}\n", "=".repeat(60));

    let engine = MorphoEngine::new();
    println!("Searching for 'eye' subroutine in 'Xenopus laevis'...\n");

    match engine.compile("eye", "Xenopus laevis") {
        Some(protocol) => println!("{}", protocol.render_text()),
        None => {
            println!("[!] Error: No bioelectric subroutine found for this morphology.");
            println!("    Please check the database or contribute a new subroutine!");
        }
    }
}
