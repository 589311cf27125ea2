//! 区域生长: 从未分配的有效体素出发, 以可插拔的归组谓词做 6-邻域洪泛填充.
//!
//! # 算法
//!
//! 1. 清空网格 (全部置 `0`).
//! 2. 按 [`SeedStrategy`] 挑选一个未分配的有效体素作为种子, 分配新的 feature id.
//! 3. 广度优先: 对队首体素的每个面相邻体素, 若未分配且有效,
//!    则以种子取向为参考调用 [`GroupingPredicate::groups`], 成立时分配并入队.
//! 4. 重复 2-3 直至所有有效体素均已分配, 最后建立 feature 邻接关系.
//!
//! 有效体素指相编号非 0 且未被有效体素掩膜排除的体素.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::consts::label;
use crate::control::{Cancellation, Completion, NEVER};
use crate::error::SegmentResult;
use crate::feature::FeatureSet;
use crate::grid::{CellData, GridShape, VoxelGrid};
use crate::orientation::Quat;

mod misorientation;

pub use misorientation::MisorientationGrouping;

pub(crate) use misorientation::check_tolerance;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 归组谓词: 判断候选体素能否并入参考取向所在的 feature.
pub trait GroupingPredicate {
    /// `reference` / `reference_phase` 为 feature 种子的取向与相编号,
    /// `candidate` / `candidate_phase` 为待测体素的取向与相编号.
    fn groups(
        &self,
        reference: &Quat,
        reference_phase: i32,
        candidate: &Quat,
        candidate_phase: i32,
    ) -> bool;
}

impl<F> GroupingPredicate for F
where
    F: Fn(&Quat, i32, &Quat, i32) -> bool,
{
    #[inline]
    fn groups(
        &self,
        reference: &Quat,
        reference_phase: i32,
        candidate: &Quat,
        candidate_phase: i32,
    ) -> bool {
        self(reference, reference_phase, candidate, candidate_phase)
    }
}

/// 种子选择策略.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SeedStrategy {
    /// 按线性索引顺序选择第一个未分配的有效体素. 结果完全确定.
    #[default]
    Scan,

    /// 以 `seed` 初始化随机数发生器, 每次均匀随机抽取一个起点,
    /// 再从起点向后循环扫描到第一个未分配的有效体素.
    /// 相同的 `seed` 总是得到相同的结果.
    Random {
        /// 随机种子.
        seed: u64,
    },
}

/// 区域生长参数.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GrowSpec {
    /// 种子选择策略.
    pub seeds: SeedStrategy,
}

impl GrowSpec {
    /// 确定性扫描.
    #[must_use]
    pub const fn scan() -> Self {
        Self {
            seeds: SeedStrategy::Scan,
        }
    }

    /// 以 `seed` 随机选择种子.
    #[must_use]
    pub const fn random(seed: u64) -> Self {
        Self {
            seeds: SeedStrategy::Random { seed },
        }
    }
}

/// 种子挑选器.
enum SeedPicker {
    /// 单调前进的扫描游标. 游标之前的有效体素都已分配.
    Scan(usize),
    Random(StdRng),
}

impl SeedPicker {
    fn new(strategy: SeedStrategy) -> Self {
        match strategy {
            SeedStrategy::Scan => SeedPicker::Scan(0),
            SeedStrategy::Random { seed } => SeedPicker::Random(StdRng::seed_from_u64(seed)),
        }
    }

    /// 下一个种子. 不存在未分配的有效体素时返回 `None`.
    fn next(&mut self, grid: &VoxelGrid, cells: &CellData) -> Option<usize> {
        let n = grid.size();
        let free = |i: usize| label::is_unassigned(grid[i]) && cells.is_eligible(i);
        match self {
            SeedPicker::Scan(cursor) => {
                while *cursor < n {
                    if free(*cursor) {
                        return Some(*cursor);
                    }
                    *cursor += 1;
                }
                None
            }
            SeedPicker::Random(rng) => {
                let start = rng.gen_range(0..n);
                (0..n).map(|k| (start + k) % n).find(|&i| free(i))
            }
        }
    }
}

/// 对整个网格做区域生长分割. 等价于不可取消的 [`grow_cancellable`].
pub fn grow<P>(
    grid: &mut VoxelGrid,
    cells: &CellData,
    predicate: &P,
    spec: &GrowSpec,
) -> SegmentResult<Completion<FeatureSet>>
where
    P: GroupingPredicate + ?Sized,
{
    grow_cancellable(grid, cells, predicate, spec, &NEVER)
}

/// 对整个网格做区域生长分割.
///
/// # 注意
///
/// 1. 网格原有内容会被全部清空.
/// 2. 参考取向是种子体素的取向, 在 feature 生长期间保持不变.
/// 3. 网格中没有任何有效体素时返回空集合, 不视为错误.
///
/// # 返回值
///
/// 形状不一致时返回错误, 此时网格未被修改. 否则返回新建的 feature 集合.
/// `cancel` 在每次选择种子之前检查; 被取消时返回已完整生长的 feature.
pub fn grow_cancellable<P>(
    grid: &mut VoxelGrid,
    cells: &CellData,
    predicate: &P,
    spec: &GrowSpec,
    cancel: &Cancellation,
) -> SegmentResult<Completion<FeatureSet>>
where
    P: GroupingPredicate + ?Sized,
{
    cells.check_grid(grid)?;
    grid.reset();

    let addressing = *grid.addressing();
    let mut features = FeatureSet::new();
    let mut picker = SeedPicker::new(spec.seeds);
    let mut bfs_q = VecDeque::with_capacity(64);
    let mut cancelled = false;

    loop {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let Some(seed) = picker.next(grid, cells) else {
            break;
        };

        let phase = cells.phase(seed);
        let reference = *cells.quat(seed);
        let id = features.push(phase, reference);
        grid.set(seed, id);
        let mut voxels = vec![seed];
        bfs_q.push_back(seed);

        while let Some(cur) = bfs_q.pop_front() {
            for n in addressing.face_neighbours(cur) {
                if !label::is_unassigned(grid[n]) || !cells.is_eligible(n) {
                    continue;
                }
                if predicate.groups(&reference, phase, cells.quat(n), cells.phase(n)) {
                    grid.set(n, id);
                    voxels.push(n);
                    bfs_q.push_back(n);
                }
            }
        }
        if let Some(f) = features.get_mut(id) {
            f.voxels = voxels;
        }
    }

    features.rebuild_neighbours(grid)?;
    log::debug!(
        "区域生长完成: {} 个 feature, 策略 {:?}{}",
        features.len(),
        spec.seeds,
        if cancelled { " (已取消)" } else { "" }
    );

    Ok(if cancelled {
        Completion::Cancelled(features)
    } else {
        Completion::Done(features)
    })
}
