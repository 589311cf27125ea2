//! 缺陷修复: 把未索引 (feature id 为 `0`) 的小区域并入周围的 feature.
//!
//! 算法分为两个阶段:
//!
//! 1. 以 6-邻域对所有 `0` 体素求连通分量. 大小不小于 `min_defect_size`
//!    的分量视为真实空洞 (孔隙, 第二相等), 保持为 `0`; 其余分量标记为 `-1`.
//! 2. 反复扫描所有 `-1` 体素: 统计每个体素正 feature id 邻居的票数,
//!    记录票数 **首次** 达到最高的那个邻居. 整轮统计完毕后统一提交:
//!    体素取该邻居的 feature id, 并由 [`VoxelAttributes::copy_tuple`] 复制其余逐体素属性.
//!    直至不再有 `-1` 体素.
//!
//! 因为每轮先读后写, 同一轮内的提交互不影响, 结果与扫描顺序和是否并行无关.

use std::collections::VecDeque;

use ndarray::Array3;

use crate::consts::{label, VoxelState};
use crate::control::{Cancellation, Completion, NEVER};
use crate::error::{ConfigError, SegmentError, SegmentResult};
use crate::grid::{CellData, GridAddressing, GridShape, VoxelGrid};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 缺陷修复参数.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HealSpec {
    min_defect_size: usize,
}

impl Default for HealSpec {
    #[inline]
    fn default() -> Self {
        Self { min_defect_size: 1 }
    }
}

impl HealSpec {
    /// `min_defect_size`: 不小于该体素个数的 `0` 连通分量被保留为空洞. 必须不小于 1.
    pub fn new(min_defect_size: usize) -> Result<Self, ConfigError> {
        let ans = Self { min_defect_size };
        ans.validate()?;
        Ok(ans)
    }

    /// 检查参数合法性.
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_defect_size == 0 {
            Err(ConfigError::ZeroMinDefectSize)
        } else {
            Ok(())
        }
    }

    /// 最小保留空洞尺寸.
    #[inline]
    pub fn min_defect_size(&self) -> usize {
        self.min_defect_size
    }
}

/// 修复时需要同步复制的逐体素属性.
pub trait VoxelAttributes {
    /// 检查属性数组与网格形状一致.
    #[inline]
    fn check_shape(&self, _grid: &VoxelGrid) -> SegmentResult<()> {
        Ok(())
    }

    /// 把体素 `src` 的全部属性复制到体素 `dst`.
    fn copy_tuple(&mut self, src: usize, dst: usize);
}

/// 无附加属性.
impl VoxelAttributes for () {
    #[inline]
    fn copy_tuple(&mut self, _src: usize, _dst: usize) {}
}

impl VoxelAttributes for CellData {
    #[inline]
    fn check_shape(&self, grid: &VoxelGrid) -> SegmentResult<()> {
        self.check_grid(grid)
    }

    fn copy_tuple(&mut self, src: usize, dst: usize) {
        let addressing = *self.addressing();
        let (s, d) = (addressing.coords(src), addressing.coords(dst));
        self.phases[d] = self.phases[s];
        self.quats[d] = self.quats[s];
        if let Some(mask) = self.good_voxels.as_mut() {
            mask[d] = mask[s];
        }
    }
}

/// 任意附加的逐体素数组.
impl<T: Clone> VoxelAttributes for Array3<T> {
    fn check_shape(&self, grid: &VoxelGrid) -> SegmentResult<()> {
        if self.dim() == grid.shape() {
            Ok(())
        } else {
            Err(SegmentError::ShapeMismatch {
                name: "attribute",
                expected: grid.shape(),
                found: self.dim(),
            })
        }
    }

    fn copy_tuple(&mut self, src: usize, dst: usize) {
        let (nz, ny, nx) = self.dim();
        // 形状已在 `check_shape` 中校验过, 这里不会失败.
        if let Ok(addressing) = GridAddressing::new(nx, ny, nz) {
            let v = self[addressing.coords(src)].clone();
            self[addressing.coords(dst)] = v;
        }
    }
}

/// 同时复制两组属性.
impl<A: VoxelAttributes, B: VoxelAttributes> VoxelAttributes for (A, B) {
    fn check_shape(&self, grid: &VoxelGrid) -> SegmentResult<()> {
        self.0.check_shape(grid)?;
        self.1.check_shape(grid)
    }

    #[inline]
    fn copy_tuple(&mut self, src: usize, dst: usize) {
        self.0.copy_tuple(src, dst);
        self.1.copy_tuple(src, dst);
    }
}

/// 修复统计.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HealReport {
    /// 被保留为空洞的 `0` 连通分量个数.
    pub kept_voids: usize,

    /// 被保留为空洞的体素总数.
    pub kept_void_voxels: usize,

    /// 第一阶段标记 (以及原本就存在) 的缺陷体素个数.
    pub defect_voxels: usize,

    /// 已修复的缺陷体素个数.
    pub filled: usize,

    /// 第二阶段实际进行的轮数.
    pub passes: usize,
}

/// 缺陷修复. 等价于不可取消的 [`fill_bad_data_cancellable`].
pub fn fill_bad_data<A>(
    grid: &mut VoxelGrid,
    spec: &HealSpec,
    attrs: &mut A,
) -> SegmentResult<Completion<HealReport>>
where
    A: VoxelAttributes + ?Sized,
{
    fill_bad_data_cancellable(grid, spec, attrs, &NEVER)
}

/// 缺陷修复.
///
/// # 注意
///
/// 1. 网格中小于 `-1` 的值同样视为缺陷.
/// 2. 修复只改变缺陷体素的 feature id, 不维护 [`crate::FeatureSet`] 的体素列表.
///
/// # 返回值
///
/// 以下情况返回错误, 且网格和属性都未被修改:
///
/// - 参数非法, 或属性数组与网格形状不一致;
/// - 网格中不存在任何正 feature id;
/// - 某个缺陷区域不与任何 feature 面相邻, 永远无法被修复.
///
/// `cancel` 在第二阶段每轮开始前检查; 被取消时网格停留在某一轮完整提交之后的状态.
pub fn fill_bad_data_cancellable<A>(
    grid: &mut VoxelGrid,
    spec: &HealSpec,
    attrs: &mut A,
    cancel: &Cancellation,
) -> SegmentResult<Completion<HealReport>>
where
    A: VoxelAttributes + ?Sized,
{
    spec.validate()?;
    attrs.check_shape(grid)?;
    if !grid.has_feature() {
        return Err(SegmentError::NoFeatures);
    }

    let addressing = *grid.addressing();
    let mut ids: Vec<i64> = grid.iter().collect();
    let mut report = HealReport::default();

    mark_defects(&addressing, &mut ids, spec.min_defect_size, &mut report);
    let stranded = unreachable_defects(&addressing, &ids);
    if stranded > 0 {
        return Err(SegmentError::HealStalled(stranded));
    }
    report.defect_voxels = ids.iter().filter(|&&v| is_defect(v)).count();
    log::debug!(
        "缺陷修复: {} 个空洞 ({} 体素) 保留, {} 个缺陷体素待修复",
        report.kept_voids,
        report.kept_void_voxels,
        report.defect_voxels
    );

    let mut cancelled = false;
    loop {
        let defects: Vec<usize> = (0..ids.len()).filter(|&i| is_defect(ids[i])).collect();
        if defects.is_empty() {
            break;
        }
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        // 读取 + 计算.
        #[cfg(feature = "rayon")]
        let votes: Vec<Option<usize>> = defects
            .par_iter()
            .map(|&i| vote(&addressing, &ids, i))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let votes: Vec<Option<usize>> = defects
            .iter()
            .map(|&i| vote(&addressing, &ids, i))
            .collect();

        // 提交. 胜出的邻居都是正 feature, 本轮不会被改写.
        let mut filled = 0;
        for (&i, best) in defects.iter().zip(votes) {
            if let Some(n) = best {
                ids[i] = ids[n];
                attrs.copy_tuple(n, i);
                filled += 1;
            }
        }
        report.passes += 1;
        report.filled += filled;
        log::trace!("第 {} 轮修复 {filled} 个体素", report.passes);

        // 可达性已预先检查, 每轮至少修复一个体素.
        debug_assert!(filled > 0);
        if filled == 0 {
            break;
        }
    }

    for (w, r) in grid.feature_ids_mut().iter_mut().zip(ids) {
        *w = r;
    }
    log::info!(
        "缺陷修复{}: {} 轮, 修复 {} 个体素",
        if cancelled { "已取消" } else { "完成" },
        report.passes,
        report.filled
    );

    Ok(if cancelled {
        Completion::Cancelled(report)
    } else {
        Completion::Done(report)
    })
}

#[inline]
fn is_defect(id: i64) -> bool {
    VoxelState::of(id).is_defect()
}

/// 第一阶段: 对 `0` 体素求连通分量, 小分量标记为 `-1`.
fn mark_defects(
    addressing: &GridAddressing,
    ids: &mut [i64],
    min_size: usize,
    report: &mut HealReport,
) {
    let mut resolved: Vec<bool> = ids.iter().map(|&v| !label::is_unassigned(v)).collect();
    let mut bfs_q = VecDeque::with_capacity(16);
    let mut component = Vec::with_capacity(16);

    for start in 0..ids.len() {
        if resolved[start] {
            continue;
        }
        resolved[start] = true;
        bfs_q.push_back(start);
        component.clear();

        while let Some(cur) = bfs_q.pop_front() {
            component.push(cur);
            for n in addressing.face_neighbours(cur) {
                if !resolved[n] {
                    resolved[n] = true;
                    bfs_q.push_back(n);
                }
            }
        }

        if component.len() >= min_size {
            report.kept_voids += 1;
            report.kept_void_voxels += component.len();
        } else {
            component.iter().for_each(|&v| ids[v] = label::DEFECT);
        }
    }
}

/// 从全部正 feature 体素出发, 经缺陷体素做多源广度优先搜索,
/// 返回无法触达的缺陷体素个数.
fn unreachable_defects(addressing: &GridAddressing, ids: &[i64]) -> usize {
    let mut reached = vec![false; ids.len()];
    let mut bfs_q: VecDeque<usize> = (0..ids.len())
        .filter(|&i| label::is_feature(ids[i]))
        .collect();

    while let Some(cur) = bfs_q.pop_front() {
        for n in addressing.face_neighbours(cur) {
            if is_defect(ids[n]) && !reached[n] {
                reached[n] = true;
                bfs_q.push_back(n);
            }
        }
    }
    (0..ids.len())
        .filter(|&i| is_defect(ids[i]) && !reached[i])
        .count()
}

/// 统计 `index` 的正 feature 邻居票数, 返回票数首次达到最高的邻居.
/// 没有正 feature 邻居时返回 `None`.
fn vote(addressing: &GridAddressing, ids: &[i64], index: usize) -> Option<usize> {
    // 最多 6 个不同的 feature.
    let mut tally: [(i64, usize); 6] = [(0, 0); 6];
    let mut kinds = 0;
    let mut most = 0;
    let mut best = None;

    for n in addressing.face_neighbours(index) {
        let id = ids[n];
        if !label::is_feature(id) {
            continue;
        }
        let slot = match tally[..kinds].iter().position(|&(f, _)| f == id) {
            Some(k) => k,
            None => {
                tally[kinds] = (id, 0);
                kinds += 1;
                kinds - 1
            }
        };
        tally[slot].1 += 1;
        if tally[slot].1 > most {
            most = tally[slot].1;
            best = Some(n);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::{
        fill_bad_data, fill_bad_data_cancellable, vote, HealReport, HealSpec, VoxelAttributes,
    };
    use crate::control::Cancellation;
    use crate::error::{ConfigError, SegmentError};
    use crate::grid::{CellData, GridAddressing, VoxelGrid};
    use crate::orientation::{LaueClass, Quat};
    use ndarray::Array3;

    fn grid_of(shape: (usize, usize, usize), ids: Vec<i64>) -> VoxelGrid {
        VoxelGrid::from_feature_ids(Array3::from_shape_vec(shape, ids).unwrap()).unwrap()
    }

    #[test]
    fn test_spec_validation() {
        assert_eq!(HealSpec::new(0), Err(ConfigError::ZeroMinDefectSize));
        assert_eq!(HealSpec::new(3).unwrap().min_defect_size(), 3);
        assert_eq!(HealSpec::default().min_defect_size(), 1);
    }

    /// 被 feature 3 完全包围的单个未索引体素会被修复为 3.
    #[test]
    fn test_surrounded_voxel() {
        let mut ids = vec![3; 27];
        ids[13] = 0;
        let mut grid = grid_of((3, 3, 3), ids);
        let report = fill_bad_data(&mut grid, &HealSpec::new(2).unwrap(), &mut ())
            .unwrap()
            .done()
            .unwrap();
        assert_eq!(grid[13], 3);
        assert_eq!(grid.count(3), 27);
        assert_eq!(report.filled, 1);
        assert_eq!(report.passes, 1);
    }

    /// 单体素缺陷小于 `min_defect_size = 5`, 先被标记为 `-1` 然后修复, 不会残留为 `0`.
    #[test]
    fn test_small_defect_is_healed() {
        let mut ids = vec![1; 5];
        ids[2] = 0;
        let mut grid = grid_of((1, 1, 5), ids);
        let report = fill_bad_data(&mut grid, &HealSpec::new(5).unwrap(), &mut ())
            .unwrap()
            .into_inner();
        assert_eq!(grid.count(0), 0);
        assert_eq!(grid.count(-1), 0);
        assert_eq!(report.defect_voxels, 1);
        assert_eq!(report.kept_voids, 0);
    }

    /// 大小恰好等于 `min_defect_size` 的空洞被保留.
    #[test]
    fn test_void_at_threshold_is_kept() {
        let ids = vec![1, 0, 0, 0, 2, 0, 2];
        let mut grid = grid_of((1, 1, 7), ids);
        let report = fill_bad_data(&mut grid, &HealSpec::new(3).unwrap(), &mut ())
            .unwrap()
            .into_inner();
        assert_eq!(grid.iter().collect::<Vec<_>>(), vec![1, 0, 0, 0, 2, 2, 2]);
        assert_eq!(
            report,
            HealReport {
                kept_voids: 1,
                kept_void_voxels: 3,
                defect_voxels: 1,
                filled: 1,
                passes: 1,
            }
        );
    }

    /// 多轮修复从外向内推进.
    #[test]
    fn test_multi_pass() {
        let mut ids = vec![0; 7];
        ids[0] = 4;
        let mut grid = grid_of((1, 1, 7), ids);
        let report = fill_bad_data(&mut grid, &HealSpec::new(100).unwrap(), &mut ())
            .unwrap()
            .into_inner();
        assert_eq!(grid.count(4), 7);
        assert_eq!(report.passes, 6);
        assert_eq!(report.filled, 6);
    }

    /// 票数相同时按 `-z, -y, -x, +x, +y, +z` 的顺序先到者胜.
    #[test]
    fn test_vote_tie_break() {
        // 1 x 3 x 3, 中心体素左 (-x) 为 5, 右 (+x) 为 6, 上 (-y) 为 7, 下 (+y) 为 6.
        let ids = vec![0, 7, 0, 5, -1, 6, 0, 6, 0];
        let addr = GridAddressing::new(3, 3, 1).unwrap();
        // 6 得两票, 记录的是第二票所在的 +y 邻居.
        assert_eq!(vote(&addr, &ids, 4), Some(7));

        let ids = vec![0, 7, 0, 5, -1, 6, 0, 0, 0];
        // 各一票, -y 方向最先.
        assert_eq!(vote(&addr, &ids, 4), Some(1));

        let ids = vec![0, 0, 0, 0, -1, 0, 0, 0, 0];
        assert_eq!(vote(&addr, &ids, 4), None);
    }

    #[test]
    fn test_attributes_are_copied() {
        let mut ids = vec![2; 4];
        ids[3] = 0;
        let mut grid = grid_of((1, 1, 4), ids);
        let phases = Array3::from_shape_vec((1, 1, 4), vec![1, 1, 1, 0]).unwrap();
        let q = Quat::from_axis_angle([0.0, 1.0, 0.0], 0.5).unwrap();
        let quats = Array3::from_shape_vec((1, 1, 4), vec![q, q, q, Quat::IDENTITY]).unwrap();
        let cells = CellData::new(phases, quats, vec![LaueClass::Cubic; 2]).unwrap();
        let extra = Array3::from_shape_vec((1, 1, 4), vec![0.1, 0.2, 0.3, 9.9]).unwrap();

        let mut attrs = (cells, extra);
        fill_bad_data(&mut grid, &HealSpec::new(2).unwrap(), &mut attrs).unwrap();
        let (cells, extra) = attrs;

        assert_eq!(grid[3], 2);
        assert_eq!(cells.phase(3), 1);
        assert_eq!(cells.quat(3), cells.quat(2));
        assert_eq!(extra[(0, 0, 3)], 0.3);
    }

    #[test]
    fn test_no_features() {
        let mut grid = grid_of((1, 1, 3), vec![0, -1, 0]);
        let before = grid.clone();
        let e = fill_bad_data(&mut grid, &HealSpec::default(), &mut ()).unwrap_err();
        assert_eq!(e, SegmentError::NoFeatures);
        assert_eq!(grid, before);
    }

    /// 被保留的空洞把缺陷和 feature 隔开时, 缺陷永远无法修复.
    #[test]
    fn test_stranded_defect() {
        let ids = vec![1, 0, 0, 0, -1];
        let mut grid = grid_of((1, 1, 5), ids);
        let before = grid.clone();
        let e = fill_bad_data(&mut grid, &HealSpec::new(3).unwrap(), &mut ()).unwrap_err();
        assert_eq!(e, SegmentError::HealStalled(1));
        assert_eq!(grid, before);
    }

    #[test]
    fn test_attribute_shape_mismatch() {
        let mut grid = grid_of((1, 1, 3), vec![1, 0, 1]);
        let mut extra = Array3::<f32>::zeros((1, 1, 4));
        assert!(matches!(
            fill_bad_data(&mut grid, &HealSpec::default(), &mut extra),
            Err(SegmentError::ShapeMismatch { name: "attribute", .. })
        ));
    }

    #[test]
    fn test_cancelled_heal() {
        let mut grid = grid_of((1, 1, 4), vec![1, 0, 0, 0]);
        let flag = Cancellation::new();
        flag.cancel();
        let res = fill_bad_data_cancellable(&mut grid, &HealSpec::new(10).unwrap(), &mut (), &flag)
            .unwrap();
        assert!(res.is_cancelled());
        // 第一阶段已完整提交, 第二阶段一轮也未进行.
        assert_eq!(grid.iter().collect::<Vec<_>>(), vec![1, -1, -1, -1]);
        assert_eq!(res.into_inner().passes, 0);
    }

    /// 在第一次复制属性时请求取消, 同时记录每个体素被复制到的 feature id.
    struct CancelOnCopy<'a> {
        shadow: Vec<i64>,
        copies: usize,
        flag: &'a Cancellation,
    }

    impl VoxelAttributes for CancelOnCopy<'_> {
        fn copy_tuple(&mut self, src: usize, dst: usize) {
            self.shadow[dst] = self.shadow[src];
            self.copies += 1;
            self.flag.cancel();
        }
    }

    /// 第一轮修复期间请求取消: 该轮完整提交后停止, 网格与属性保持一致.
    #[test]
    fn test_cancelled_mid_pass_is_consistent() {
        let ids = vec![1, 0, 0, 0, 2];
        let mut grid = grid_of((1, 1, 5), ids.clone());
        let flag = Cancellation::new();
        let mut attrs = CancelOnCopy {
            shadow: ids,
            copies: 0,
            flag: &flag,
        };

        let res = fill_bad_data_cancellable(&mut grid, &HealSpec::new(4).unwrap(), &mut attrs, &flag)
            .unwrap();
        assert!(res.is_cancelled());
        let report = res.into_inner();
        assert_eq!(report.passes, 1);
        assert_eq!(report.filled, 2);
        assert_eq!(attrs.copies, 2);

        // 中间体素要到第二轮才有正 feature 邻居.
        assert_eq!(grid.iter().collect::<Vec<_>>(), vec![1, 1, -1, 2, 2]);
        for i in 0..5 {
            if grid[i] > 0 {
                assert_eq!(attrs.shadow[i], grid[i]);
            }
        }

        // 继续修复可以完成剩余的缺陷.
        let report = fill_bad_data(&mut grid, &HealSpec::new(4).unwrap(), &mut ())
            .unwrap()
            .into_inner();
        assert_eq!(report.filled, 1);
        assert_eq!(grid.iter().collect::<Vec<_>>(), vec![1, 1, 1, 2, 2]);
    }

    #[test]
    fn test_heal_covers_every_defect() {
        let addr = GridAddressing::new(6, 5, 4).unwrap();
        let ids: Vec<i64> = (0..addr.size())
            .map(|i| if i % 7 == 0 || i % 11 == 3 { 0 } else { (i % 3) as i64 + 1 })
            .collect();
        let mut grid = grid_of(addr.shape(), ids.clone());
        fill_bad_data(&mut grid, &HealSpec::new(4).unwrap(), &mut ()).unwrap();
        assert_eq!(grid.count(-1), 0);
        for (i, &v) in ids.iter().enumerate() {
            if v > 0 {
                // 原有 feature 体素不变.
                assert_eq!(grid[i], v);
            }
        }
    }
}
