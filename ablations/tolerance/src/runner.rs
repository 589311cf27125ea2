//! 程序运行函数.

use crate::profile::{Profile, Stage};
use crate::result::AblationResult;
use grain_berry::consts::angle;
use grain_berry::phantom::Phantom;
use grain_berry::post_proc::{fill_bad_data, merge_twins, HealSpec, TwinSpec};
use grain_berry::segment::{grow, GrowSpec, MisorientationGrouping};
use grain_berry::orientation::SymmetryOps;
use grain_berry::{GridShape, SegmentResult, VoxelGrid};
use std::thread;
use std::time::Instant;
use utils::loader;

/// 参与比较的取向差容差 (度).
pub const TOLERANCES_DEG: [f64; 5] = [1.0, 2.0, 5.0, 10.0, 15.0];

/// 每个容差下运行的模型个数, 可由 `$GRAIN_ABLATION_RUNS` 覆盖.
const DEFAULT_RUNS: u64 = 4;

/// 面积小于该值的未分配连通区域被视为缺陷.
const MIN_DEFECT_SIZE: usize = 8;

/// 在单个模型上运行完整的分割流程, 并把统计结果记入 `profile`.
fn segment_one(phantom: &Phantom, tolerance: f64, profile: &mut Profile) -> SegmentResult<()> {
    let cells = phantom.cells();
    let predicate = MisorientationGrouping::from_cells(cells, tolerance)?;
    let mut grid = VoxelGrid::new(*cells.addressing());
    let begin = Instant::now();

    profile.stage_start(Stage::Grow);
    let mut features = grow(&mut grid, cells, &predicate, &GrowSpec::scan())?.into_inner();
    profile.stage_elapsed(Stage::Grow);
    profile.count_found(features.len() as u64);

    profile.stage_start(Stage::Twins);
    let merged = merge_twins(
        &mut grid,
        &mut features,
        &SymmetryOps,
        cells.crystal_structures(),
        &TwinSpec::default(),
    )?
    .into_inner();
    profile.stage_elapsed(Stage::Twins);
    profile.count_merged(merged as u64);

    profile.stage_start(Stage::Heal);
    let mut attrs = cells.clone();
    let report = fill_bad_data(&mut grid, &HealSpec::new(MIN_DEFECT_SIZE)?, &mut attrs)?.into_inner();
    profile.stage_elapsed(Stage::Heal);
    profile.count_healed(report.filled as u64);

    profile.record_pipeline(begin.elapsed());
    Ok(())
}

/// 在全部模型上以 `tolerance_deg` 度容差运行分割流程.
fn sweep(phantoms: &[Phantom], tolerance_deg: f64) -> Profile {
    let tolerance = angle::to_radians(tolerance_deg);
    let mut profile = Profile::new();
    for phantom in phantoms {
        let expected = phantom.truth().max_id().unwrap_or(0).max(0) as u64;
        profile.count_phantom(expected);
        if let Err(e) = segment_one(phantom, tolerance, &mut profile) {
            log::warn!("Tolerance {tolerance_deg}°: {e}");
            profile.count_failed();
        }
    }
    profile.finish()
}

/// 实际运行.
pub fn run() -> AblationResult {
    let runs = std::env::var("GRAIN_ABLATION_RUNS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RUNS);

    let phantoms = loader::phantoms_from_env(0..runs).expect("Phantom configuration error");
    log::info!("{} phantoms ready, {} cpus", phantoms.len(), utils::cpus());

    println!("Running ablation studies...");
    thread::scope(|s| {
        let phantoms = phantoms.as_slice();
        let handles = TOLERANCES_DEG.map(|t| s.spawn(move || sweep(phantoms, t)));

        AblationResult::from_iter(
            TOLERANCES_DEG.into_iter().zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            ),
        )
    })
}
