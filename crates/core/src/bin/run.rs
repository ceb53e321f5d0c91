//! Thin CLI harness: wires the default `TextConfig` + `FlatRaster` adapters to
//! [`Simulation`] and drives the replicate loop. The core crate places the CLI surface
//! itself out of scope; this binary exists only so the crate is demonstrably runnable
//! end to end.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use landscape_sim_core::{
    ConfigSource, FireEngine, Grid, GridInputs, RasterSource, SimError, Simulation, SpeciesRegistry, SuccessionParams,
    SuppressionPolicy, TextConfig, VegType, load_habitat_definitions, load_map_stats_requests,
};

#[derive(Parser, Debug)]
#[command(name = "landscape-sim")]
#[command(about = "Boreal/tundra landscape succession and wildfire simulator", long_about = None)]
struct Args {
    /// Path to the run's key=value configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Directory holding the input raster bands (FlatRaster layout).
    #[arg(long)]
    input_dir: PathBuf,

    /// Directory output maps and stats are written to.
    #[arg(long)]
    output_dir: PathBuf,

    /// Base RNG seed; each replicate derives its stream from `(seed, replicate_index)`.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Number of independent replicates to run.
    #[arg(long, default_value_t = 1)]
    replicates: u64,

    /// First simulated calendar year.
    #[arg(long)]
    first_year: i64,

    /// Number of years per replicate.
    #[arg(long)]
    num_years: i64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::from(0),
        Err(SimError::Config(msg)) => {
            tracing::error!("fatal config error: {msg}");
            ExitCode::from(1)
        }
        Err(SimError::Io(msg)) => {
            tracing::error!("fatal I/O error: {msg}");
            ExitCode::from(2)
        }
        Err(err) => {
            tracing::error!("fatal internal error: {err}");
            ExitCode::from(3)
        }
    }
}

fn run(args: &Args) -> landscape_sim_core::SimResult<()> {
    let config_text = std::fs::read_to_string(&args.config).map_err(|e| SimError::Io(e.to_string()))?;
    let config = TextConfig::parse(&config_text)?;

    let veg_types: Vec<VegType> = VegType::ALL.iter().copied().filter(|t| *t != VegType::NoVeg).collect();
    let registry = SpeciesRegistry::load(&config, &veg_types)?;
    let fire_engine = FireEngine::load(&config);
    let habitats = load_habitat_definitions(&config)?;
    let map_requests = load_map_stats_requests(&config)?;
    let sim = Simulation::new(registry, fire_engine, args.seed, args.first_year, args.num_years, habitats);

    let params = SuccessionParams {
        climate_coupling_enabled: config.get_bool_or("ClimateCouplingEnabled", false)?,
        climate_temp: config.get_float_or("Climate.Temp", 0.0)?,
        climate_precip: config.get_float_or("Climate.Precip", 0.0)?,
    };

    let input_source = landscape_sim_core::FlatRaster::new(&args.input_dir);
    landscape_sim_core::raster::ensure_dir(&args.output_dir)?;

    let veg_code_to_type: Vec<(u8, VegType)> = veg_types.iter().enumerate().map(|(i, &t)| (i as u8, t)).collect();

    let outputs = sim.run_replicates(
        args.replicates,
        |rep| {
            let vegetation = input_source.read_byte("vegetation")?;
            let age = input_source.read_int32("age")?;
            let topo_complex = input_source.read_byte("topo_complex")?;
            let site = input_source.read_float32("site")?;
            let tree_density = input_source.read_int32("tree_density")?;
            let ignition_factor = input_source.read_float32("ignition_factor")?;
            let sensitivity = input_source.read_float32("sensitivity")?;
            let mut rng = landscape_sim_core::ReplicateRng::for_replicate(args.seed, rep);
            Grid::from_rasters(
                &GridInputs {
                    vegetation: &vegetation,
                    age: &age,
                    topo_complex: &topo_complex,
                    site: &site,
                    tree_density: &tree_density,
                    ignition_factor: &ignition_factor,
                    sensitivity: &sensitivity,
                    veg_code_to_type: veg_code_to_type.clone(),
                },
                &sim.registry,
                args.first_year,
                &mut rng,
            )
        },
        || {
            SuppressionPolicy::load(&config, |name| input_source.read_byte(name)).unwrap_or_else(|_| SuppressionPolicy::disabled())
        },
        params,
        &map_requests,
        |_rep| landscape_sim_core::FlatRaster::new(&args.output_dir),
    );

    let mut output_sink = landscape_sim_core::FlatRaster::new(&args.output_dir);
    for (rep, result) in outputs.into_iter().enumerate() {
        let replicate_output = result?;
        tracing::info!(replicate = rep, years = replicate_output.years.len(), "replicate finished");
        write_final_maps(&replicate_output.grid, rep as u64, &mut output_sink)?;
    }
    Ok(())
}

fn write_final_maps(grid: &Grid, rep: u64, sink: &mut landscape_sim_core::FlatRaster) -> landscape_sim_core::SimResult<()> {
    use landscape_sim_core::{MapType, RasterSink};
    let vegetation = grid.export_byte(MapType::Vegetation)?;
    sink.write_byte(&format!("rep{rep}_vegetation"), &vegetation)?;
    let severity = grid.export_byte(MapType::BurnSeverity)?;
    sink.write_byte(&format!("rep{rep}_burn_severity"), &severity)?;
    let site = grid.export_float(MapType::SiteVariable)?;
    sink.write_float32(&format!("rep{rep}_site"), &site)?;
    Ok(())
}
