//! End-to-end scenarios exercising the public API: a run-harness caller never reaches
//! past `Simulation`/`FireEngine`/`Grid`, so these tests don't either.

use landscape_sim_core::raster::{decode_fire_scar, encode_fire_scar, NODATA_INT32};
use landscape_sim_core::{
    ConfigValue, FireEngine, Grid, GridInputs, MemoryRaster, RasterBand, ReplicateRng, Simulation, SpeciesRegistry,
    SuccessionParams, SuppressionPolicy, TextConfig, VegType,
};

fn tundra_config(fire_prob: f64) -> TextConfig {
    let mut cfg = TextConfig::default();
    for (k, v) in [
        ("WetlandTundra.FireProb", ConfigValue::Float(fire_prob)),
        ("WetlandTundra.BaseFlammability", ConfigValue::FloatArray(vec![0.1, 0.0])),
        ("WetlandTundra.SeedRange", ConfigValue::Float(3.0)),
        ("WetlandTundra.SeedSource", ConfigValue::FloatArray(vec![1.0, 2.0])),
        ("WetlandTundra.Seed.BasalArea", ConfigValue::Float(1.0)),
        ("WetlandTundra.Seedling", ConfigValue::Float(1.0)),
        ("WetlandTundra.SeedlingBA", ConfigValue::Float(0.01)),
        ("WetlandTundra.History", ConfigValue::Int(15)),
        ("WetlandTundra.SeedEstParms", ConfigValue::FloatArray(vec![5.0, 1.0])),
        ("WetlandTundra.MeanGrowth", ConfigValue::Float(0.1)),
        ("WetlandTundra.ClimGrowth", ConfigValue::FloatArray(vec![0.0, 0.0, 0.0])),
        ("WetlandTundra.CalFactor", ConfigValue::FloatArray(vec![1.0, 1.0])),
        ("WetlandTundra.Spruce.BasalArea", ConfigValue::Float(20.0)),
        ("WetlandTundra.StartAge.Type", ConfigValue::Str("Constant".to_string())),
        ("WetlandTundra.StartAge", ConfigValue::FloatArray(vec![5.0])),
    ] {
        cfg.set(k, v);
    }
    cfg
}

fn black_spruce_config(fire_prob: f64) -> TextConfig {
    let mut cfg = TextConfig::default();
    for (k, v) in [
        ("BSpruce.FireProb", ConfigValue::Float(fire_prob)),
        ("BSpruce.BaseFlammability", ConfigValue::FloatArray(vec![1.0, 0.0])),
        ("BSpruce.SeedRange", ConfigValue::Float(1.0)),
        ("BSpruce.SeedSource", ConfigValue::FloatArray(vec![1.0, 1.0])),
        ("BSpruce.Seed.BasalArea", ConfigValue::Float(1.0)),
        ("BSpruce.Seedling", ConfigValue::Float(1.0)),
        ("BSpruce.SeedlingBA", ConfigValue::Float(0.01)),
        ("BSpruce.History", ConfigValue::Int(15)),
        ("BSpruce.SeedEstParms", ConfigValue::FloatArray(vec![5.0, 1.0])),
        ("BSpruce.MeanGrowth", ConfigValue::Float(0.1)),
        ("BSpruce.ClimGrowth", ConfigValue::FloatArray(vec![0.0, 0.0, 0.0])),
        ("BSpruce.CalFactor", ConfigValue::FloatArray(vec![1.0, 1.0])),
        ("BSpruce.Spruce.BasalArea", ConfigValue::Float(20.0)),
        ("BSpruce.StartAge.Type", ConfigValue::Str("Constant".to_string())),
        ("BSpruce.StartAge", ConfigValue::FloatArray(vec![5.0])),
    ] {
        cfg.set(k, v);
    }
    cfg
}

fn square_grid(registry: &SpeciesRegistry, side: usize, veg_type: VegType, code: u8) -> Grid {
    let veg = RasterBand {
        rows: side,
        cols: side,
        nodata: 255,
        data: vec![code; side * side],
        georef: Default::default(),
    };
    let age = RasterBand {
        rows: side,
        cols: side,
        nodata: NODATA_INT32,
        data: vec![10; side * side],
        georef: Default::default(),
    };
    let topo = RasterBand::new(side, side, 0u8);
    let site = RasterBand::new(side, side, 0.0f32);
    let mut tree_density = RasterBand::new(side, side, 0i32);
    tree_density.data = vec![1; side * side];
    let ignition_factor = RasterBand::new(side, side, 1.0f32);
    let sensitivity = {
        let mut b = RasterBand::new(side, side, 0.0f32);
        b.data = vec![1.0; side * side];
        b
    };
    let inputs = GridInputs {
        vegetation: &veg,
        age: &age,
        topo_complex: &topo,
        site: &site,
        tree_density: &tree_density,
        ignition_factor: &ignition_factor,
        sensitivity: &sensitivity,
        veg_code_to_type: vec![(code, veg_type)],
    };
    let mut rng = ReplicateRng::for_replicate(1, 0);
    Grid::from_rasters(&inputs, registry, 2000, &mut rng).unwrap()
}

/// Scenario 1: a 3x3 all-Tundra landscape with fire probability zero sees five years
/// pass with every cell aging by five and never burning.
#[test]
fn no_ignition_landscape_only_ages() {
    let cfg = tundra_config(0.0);
    let registry = SpeciesRegistry::load(&cfg, &[VegType::WetlandTundra]).unwrap();
    let grid = square_grid(&registry, 3, VegType::WetlandTundra, 1);
    let initial_age = grid.get(1, 1).age();

    let sim = Simulation::new(registry, FireEngine::default(), 11, 2000, 5, Vec::new());
    let mut sink = MemoryRaster::new();
    let output = sim
        .run_replicate(0, grid, SuppressionPolicy::disabled(), SuccessionParams::default(), &[], &mut sink)
        .unwrap();

    for row in 0..3 {
        for col in 0..3 {
            let frame = output.grid.get(row, col);
            assert_eq!(frame.age(), initial_age + 5);
            assert_eq!(frame.veg_type(), VegType::WetlandTundra);
        }
    }
}

/// Scenario 2: a 3x3 Black Spruce landscape with ignition and spread both certain burns
/// every cell within a single simulated year.
#[test]
fn certain_fire_burns_whole_landscape_in_one_year() {
    let cfg = black_spruce_config(1.0);
    let registry = SpeciesRegistry::load(&cfg, &[VegType::BlackSpruce]).unwrap();
    let grid = square_grid(&registry, 3, VegType::BlackSpruce, 1);

    let sim = Simulation::new(registry, FireEngine::default(), 5, 2000, 1, Vec::new());
    let mut sink = MemoryRaster::new();
    let output = sim
        .run_replicate(0, grid, SuppressionPolicy::disabled(), SuccessionParams::default(), &[], &mut sink)
        .unwrap();

    assert_eq!(output.years.len(), 1);
    assert_eq!(output.years[0].fire_size_stats.total_burned, 9);
    for row in 0..3 {
        for col in 0..3 {
            assert_eq!(output.grid.get(row, col).year_of_last_burn, 2000);
        }
    }
}

/// Scenario 3: a tundra cell whose basal area has already crossed the spruce threshold
/// transitions on its very next succession call; `Site(0, 0.5) < 0.9` biases the draw
/// toward white spruce (the worked example from the testable-properties list).
#[test]
fn tundra_crossing_basal_area_threshold_transitions_to_white_spruce() {
    let mut cfg = tundra_config(0.0);
    for (k, v) in [
        ("WSpruce.FireProb", ConfigValue::Float(0.0)),
        ("WSpruce.BaseFlammability", ConfigValue::FloatArray(vec![0.1, 0.0])),
        ("WSpruce.SeedRange", ConfigValue::Float(3.0)),
        ("WSpruce.SeedSource", ConfigValue::FloatArray(vec![1.0, 2.0])),
        ("WSpruce.Seed.BasalArea", ConfigValue::Float(1.0)),
        ("WSpruce.Seedling", ConfigValue::Float(1.0)),
        ("WSpruce.SeedlingBA", ConfigValue::Float(0.01)),
        ("WSpruce.History", ConfigValue::Int(15)),
        ("WSpruce.SeedEstParms", ConfigValue::FloatArray(vec![5.0, 1.0])),
        ("WSpruce.MeanGrowth", ConfigValue::Float(0.1)),
        ("WSpruce.ClimGrowth", ConfigValue::FloatArray(vec![0.0, 0.0, 0.0])),
        ("WSpruce.CalFactor", ConfigValue::FloatArray(vec![1.0, 1.0])),
        ("WSpruce.Spruce.BasalArea", ConfigValue::Float(20.0)),
        ("WSpruce.StartAge.Type", ConfigValue::Str("Constant".to_string())),
        ("WSpruce.StartAge", ConfigValue::FloatArray(vec![5.0])),
    ] {
        cfg.set(k, v);
    }
    let registry = SpeciesRegistry::load(&cfg, &[VegType::WetlandTundra, VegType::WhiteSpruce]).unwrap();
    let mut grid = square_grid(&registry, 1, VegType::WetlandTundra, 1);

    {
        let frame = grid.get_mut(0, 0);
        frame.site = 0.0;
        if let landscape_sim_core::FrameKind::Woody(woody) = &mut frame.kind {
            woody.basal_area = 25.0; // above WetlandTundra.Spruce.BasalArea == 20.0
        }
    }

    let sim = Simulation::new(registry, FireEngine::default(), 3, 2000, 1, Vec::new());
    let mut sink = MemoryRaster::new();
    let output = sim
        .run_replicate(0, grid, SuppressionPolicy::disabled(), SuccessionParams::default(), &[], &mut sink)
        .unwrap();

    assert_eq!(output.grid.get(0, 0).veg_type(), VegType::WhiteSpruce);
}

/// Scenario 4: a ten-cell row with a single forced ignition at the origin and a
/// suppression-class boundary partway across stops the burn exactly at the boundary.
#[test]
fn suppression_boundary_stops_spread_partway_across_a_row() {
    let cfg = black_spruce_config(0.0);
    let registry = SpeciesRegistry::load(&cfg, &[VegType::BlackSpruce]).unwrap();
    let cols = 10;
    let veg = RasterBand {
        rows: 1,
        cols,
        nodata: 255,
        data: vec![1; cols],
        georef: Default::default(),
    };
    let age = RasterBand {
        rows: 1,
        cols,
        nodata: NODATA_INT32,
        data: vec![10; cols],
        georef: Default::default(),
    };
    let topo = RasterBand::new(1, cols, 0u8);
    let site = RasterBand::new(1, cols, 0.0f32);
    let mut tree_density = RasterBand::new(1, cols, 0i32);
    tree_density.data = vec![1; cols];
    let ignition_factor = {
        let mut b = RasterBand::new(1, cols, 0.0f32);
        b.set(0, 0, 1.0);
        b
    };
    let sensitivity = {
        let mut b = RasterBand::new(1, cols, 0.0f32);
        b.data = vec![1.0; cols];
        b
    };
    let inputs = GridInputs {
        vegetation: &veg,
        age: &age,
        topo_complex: &topo,
        site: &site,
        tree_density: &tree_density,
        ignition_factor: &ignition_factor,
        sensitivity: &sensitivity,
        veg_code_to_type: vec![(1, VegType::BlackSpruce)],
    };
    let mut rng = ReplicateRng::for_replicate(1, 0);
    let mut grid = Grid::from_rasters(&inputs, &registry, 2000, &mut rng).unwrap();
    for col in 4..cols {
        grid.set_suppression_class(0, col, 1);
    }

    let mut supp_cfg = TextConfig::default();
    supp_cfg.set("Suppression.Years", ConfigValue::FloatArray(vec![0.0]));
    supp_cfg.set("Suppression.0.Classes", ConfigValue::FloatArray(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
    let mut policy = SuppressionPolicy::load(&supp_cfg, |_| unreachable!("no map configured")).unwrap();
    policy.apply_transition_if_due(2010, &mut grid).unwrap();

    let engine = FireEngine::default();
    let stats = engine.run(&mut grid, &registry, 2010, &policy, &mut rng).unwrap();
    assert_eq!(stats.total_burned, 4);
    assert_eq!(stats.total_ignitions, 1);
}

/// Scenario 5: two replicates built from the same seed and replicate index reproduce
/// identical state; a different seed is free to diverge. Uses a Black Spruce grid with
/// fire probability strictly between 0 and 1 (unlike the all-tundra, no-ignition fixture
/// used elsewhere in this file) so the ignition draws actually depend on the RNG stream —
/// `ReplicateRng::for_replicate` mixes the seed through `StdRng`, so two distinct seeds
/// over four years of per-cell ignition draws on a 3x3 grid diverge for all practical
/// purposes (see `rng::tests::different_replicate_index_diverges` for the same argument
/// applied to the raw stream).
#[test]
fn same_seed_reproduces_same_replicate_different_seed_may_diverge() {
    let cfg = black_spruce_config(0.5);
    let registry_a = SpeciesRegistry::load(&cfg, &[VegType::BlackSpruce]).unwrap();
    let registry_a2 = SpeciesRegistry::load(&cfg, &[VegType::BlackSpruce]).unwrap();
    let registry_b = SpeciesRegistry::load(&cfg, &[VegType::BlackSpruce]).unwrap();
    let grid_a = square_grid(&registry_a, 3, VegType::BlackSpruce, 1);
    let grid_a2 = square_grid(&registry_a2, 3, VegType::BlackSpruce, 1);
    let grid_b = square_grid(&registry_b, 3, VegType::BlackSpruce, 1);

    let sim_a = Simulation::new(registry_a, FireEngine::default(), 99, 2000, 4, Vec::new());
    let sim_a2 = Simulation::new(registry_a2, FireEngine::default(), 99, 2000, 4, Vec::new());
    let sim_b = Simulation::new(registry_b, FireEngine::default(), 4_242_424_242, 2000, 4, Vec::new());

    let mut sink_a = MemoryRaster::new();
    let mut sink_a2 = MemoryRaster::new();
    let mut sink_b = MemoryRaster::new();
    let out_a = sim_a
        .run_replicate(2, grid_a, SuppressionPolicy::disabled(), SuccessionParams::default(), &[], &mut sink_a)
        .unwrap();
    let out_a2 = sim_a2
        .run_replicate(2, grid_a2, SuppressionPolicy::disabled(), SuccessionParams::default(), &[], &mut sink_a2)
        .unwrap();
    let out_b = sim_b
        .run_replicate(2, grid_b, SuppressionPolicy::disabled(), SuccessionParams::default(), &[], &mut sink_b)
        .unwrap();

    for row in 0..3 {
        for col in 0..3 {
            assert_eq!(out_a.grid.get(row, col).age(), out_a2.grid.get(row, col).age());
            assert_eq!(out_a.grid.get(row, col).year_of_last_burn, out_a2.grid.get(row, col).year_of_last_burn);
        }
    }

    let diverges = (0..3).any(|row| {
        (0..3).any(|col| {
            out_a.grid.get(row, col).age() != out_b.grid.get(row, col).age()
                || out_a.grid.get(row, col).year_of_last_burn != out_b.grid.get(row, col).year_of_last_burn
        })
    });
    assert!(diverges, "a different base seed should diverge from at least one cell after four stochastic fire years");
}

/// Scenario 6: fire-scar encoding round-trips through the `sign(+-)*year.fireID` scheme
/// for both ignition-origin and spread cells.
#[test]
fn fire_scar_encoding_round_trips_for_origin_and_spread_cells() {
    let origin = encode_fire_scar(2031, 3, true);
    let (year, fire_id, was_origin) = decode_fire_scar(origin);
    assert_eq!((year, fire_id, was_origin), (2031, 3, true));

    let spread = encode_fire_scar(2031, 3, false);
    let (year, fire_id, was_origin) = decode_fire_scar(spread);
    assert_eq!((year, fire_id, was_origin), (2031, 3, false));
    assert!(spread > 0.0 && origin < 0.0);
}
