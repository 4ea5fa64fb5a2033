use anyhow::{Context, Result, anyhow, bail};
use morpholang::{
    about,
    config::MorphoConfig,
    engine::MorphoEngine,
    logging::init_tracing,
};
use serde::Serialize;
use std::env;

const NO_SUBROUTINE_MESSAGE: &str = "No known bioelectric subroutine for this morphology.";

fn usage() {
    eprintln!(
        "Usage:\n  \
  morpholang_cli --version\n  \
  morpholang_cli [GLOBAL] compile ORGAN SPECIES [--json]\n  \
  morpholang_cli [GLOBAL] predict VMEM DOMAIN [--species NAME] [--json]\n  \
  morpholang_cli [GLOBAL] verify IMAGE ORGAN SPECIES [--json]\n  \
  morpholang_cli [GLOBAL] list [--json]\n  \
  morpholang_cli [GLOBAL] validate\n\n  \
  GLOBAL: [--config PATH] [--database PATH]\n  \
  Logging: MORPHOLANG_LOG=morpholang=debug"
    );
}

struct GlobalArgs {
    config_path: Option<String>,
    database_path: Option<String>,
    cmd_idx: usize,
}

fn parse_global_args(args: &[String]) -> Result<GlobalArgs> {
    let mut out = GlobalArgs {
        config_path: None,
        database_path: None,
        cmd_idx: 1,
    };
    while out.cmd_idx < args.len() {
        let slot = match args[out.cmd_idx].as_str() {
            "--config" => &mut out.config_path,
            "--database" => &mut out.database_path,
            _ => break,
        };
        let value = args
            .get(out.cmd_idx + 1)
            .ok_or_else(|| anyhow!("Missing value for {}", args[out.cmd_idx]))?;
        *slot = Some(value.clone());
        out.cmd_idx += 2;
    }
    Ok(out)
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|a| a != flag);
    args.len() != before
}

fn take_option(args: &mut Vec<String>, name: &str) -> Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("Missing value for {name}");
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text =
        serde_json::to_string_pretty(value).context("Could not serialize JSON output")?;
    println!("{text}");
    Ok(())
}

fn positional<'a>(rest: &'a [String], idx: usize, what: &str) -> Result<&'a str> {
    rest.get(idx).map(String::as_str).ok_or_else(|| {
        usage();
        anyhow!("Missing {what}")
    })
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        bail!("Missing command");
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }
    init_tracing();

    let global = parse_global_args(&args)?;
    if args.len() <= global.cmd_idx {
        usage();
        bail!("Missing command");
    }
    let mut config = MorphoConfig::load(global.config_path.as_deref())?;
    if global.database_path.is_some() {
        config.database_path = global.database_path;
    }
    let engine = MorphoEngine::from_config(&config);

    let command = args[global.cmd_idx].as_str();
    let mut rest = args[global.cmd_idx + 1..].to_vec();
    let json = take_flag(&mut rest, "--json");

    match command {
        "compile" => {
            let organ = positional(&rest, 0, "ORGAN")?;
            let species = positional(&rest, 1, "SPECIES")?;
            match engine.compile(organ, species) {
                Some(doc) if json => print_json(&doc)?,
                Some(doc) => println!("{}", doc.render_text()),
                None => println!("[!] {NO_SUBROUTINE_MESSAGE}"),
            }
        }
        "predict" => {
            let species = take_option(&mut rest, "--species")?;
            let vmem: f64 = positional(&rest, 0, "VMEM")?
                .parse()
                .context("VMEM must be a number in mV")?;
            let domain = positional(&rest, 1, "DOMAIN")?;
            if json {
                print_json(&engine.predictions(vmem, domain, species.as_deref()))?;
            } else {
                println!(
                    "{}",
                    engine.prediction_report(vmem, domain, species.as_deref())
                );
            }
        }
        "verify" => {
            let image = positional(&rest, 0, "IMAGE")?;
            let organ = positional(&rest, 1, "ORGAN")?;
            let species = positional(&rest, 2, "SPECIES")?;
            let map = engine
                .validator()
                .analyze_image(image)
                .with_context(|| format!("Could not analyze image '{image}'"))?;
            match engine.verify_map(organ, species, &map) {
                Some(outcome) if json => print_json(&outcome)?,
                Some(outcome) => {
                    if let Some(mean) = outcome.observed_mean {
                        println!("Observed Avg: {mean:.2} mV");
                    }
                    println!("{}", outcome.message);
                }
                None => println!("[!] {NO_SUBROUTINE_MESSAGE}"),
            }
        }
        "list" => {
            let summaries = engine.summaries();
            if json {
                print_json(&summaries)?;
            } else if summaries.is_empty() {
                println!("[!] The subroutine database is empty.");
            } else {
                for s in summaries {
                    println!(
                        "{}\t{} {}\t{}\t[{}, {}] mV",
                        s.id,
                        s.action,
                        s.organ,
                        s.species,
                        s.target_vmem_range[0],
                        s.target_vmem_range[1]
                    );
                }
            }
        }
        "validate" => {
            let issues = engine.validate_store();
            if issues.is_empty() {
                println!("{} subroutines, no issues", engine.store().len());
            } else {
                print_json(&issues)?;
                bail!("{} store issue(s) found", issues.len());
            }
        }
        other => {
            usage();
            bail!("Unknown command '{other}'");
        }
    }
    Ok(())
}
