use gravsim::{ScenarioConfig, Scenario, DiagnosticsMonitor};
use gravsim::{run_all_checks, bench_gravity, bench_integrators, compare_integrators};

use clap::Parser;
use anyhow::{Context, Result};
use log::{info, warn};

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Headless gravitational N-body simulator")]
struct Args {
    /// Scenario file under scenarios/ (or a path to one)
    #[arg(short, default_value = "two_body.yaml")]
    file_name: String,

    /// Override the scenario's run length (advance calls)
    #[arg(long)]
    steps: Option<usize>,

    /// Run the validation battery instead of a scenario
    #[arg(long)]
    validate: bool,

    /// Run the force/integrator benchmarks instead of a scenario
    #[arg(long)]
    bench: bool,

    /// Print the final serialized state as JSON
    #[arg(long)]
    json: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let direct = PathBuf::from(file_name);
    let config_path = if direct.is_file() {
        direct
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
    };
    let scenario_cfg = ScenarioConfig::from_yaml_file(&config_path)
        .with_context(|| format!("failed to load scenario {}", config_path.display()))?;
    Ok(scenario_cfg)
}

fn run_validation() -> bool {
    let results = run_all_checks();
    for r in &results {
        println!("{r}");
    }
    let passed = results.iter().filter(|r| r.passed).count();
    println!("{passed}/{} checks passed", results.len());
    passed == results.len()
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.validate {
        if !run_validation() {
            anyhow::bail!("validation failed");
        }
        return Ok(());
    }

    if args.bench {
        bench_gravity()?;
        bench_integrators()?;
        compare_integrators()?;
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let Scenario { mut simulation, steps } = Scenario::build_scenario(scenario_cfg)?;
    let steps = args.steps.unwrap_or(steps);
    info!("running {} for {steps} ticks with {} bodies", args.file_name, simulation.body_count());

    let mut monitor = DiagnosticsMonitor::new();
    simulation.start();
    for _ in 0..steps {
        if let Err(err) = simulation.advance() {
            // non-finite bodies were reset by the controller, keep going
            warn!("{err}");
        }
        monitor.update(&simulation);
    }
    simulation.stop();

    println!("{}", simulation.stats());
    println!("{}", monitor.report(&simulation).summary());

    if args.json {
        println!("{}", simulation.to_state().to_json_pretty()?);
    }

    Ok(())
}
