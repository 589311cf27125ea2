//! 体素网格: 寻址, feature id 数组与逐体素输入数据.
//!
//! 所有三维数组的形状均为 `(nz, ny, nx)`, 即 `(plane, row, col)`,
//! 与 [`crate::Idx3d`] 的分量顺序一致. 线性索引为
//! `i = col + nx * (row + ny * plane)`.

use std::ops::Index;

use ndarray::{Array3, ArrayView3, ArrayViewMut3};

use crate::consts::label;
use crate::error::{ConfigError, SegmentError, SegmentResult};
use crate::orientation::{LaueClass, Quat};
use crate::Idx3d;

mod iter;
mod mirror;

pub use iter::{Direction, FaceNeighbours, PosIter3d};
pub use mirror::{CompactFeatureIds, FeatureIdMirror};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 规则网格的线性索引 / 三维坐标换算. 轻量值类型, 可随意复制.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridAddressing {
    nx: usize,
    ny: usize,
    nz: usize,
}

impl GridAddressing {
    /// 以 x, y, z 方向的体素个数创建寻址器. 任一维为 0 时返回错误.
    pub fn new(nx: usize, ny: usize, nz: usize) -> Result<Self, ConfigError> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(ConfigError::EmptyShape(nx, ny, nz));
        }
        Ok(Self { nx, ny, nz })
    }

    /// 以数组形状 `(nz, ny, nx)` 创建寻址器.
    #[inline]
    pub fn from_shape((nz, ny, nx): Idx3d) -> Result<Self, ConfigError> {
        Self::new(nx, ny, nz)
    }

    /// `(nx, ny, nz)`.
    #[inline]
    pub const fn dims(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    /// 数组形状 `(nz, ny, nx)`.
    #[inline]
    pub const fn shape(&self) -> Idx3d {
        (self.nz, self.ny, self.nx)
    }

    /// 体素总数.
    #[inline]
    pub const fn size(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// 线性索引转换为 `(plane, row, col)`. 调用者保证 `index < self.size()`.
    #[inline]
    pub const fn coords(&self, index: usize) -> Idx3d {
        let col = index % self.nx;
        let row = (index / self.nx) % self.ny;
        let plane = index / (self.nx * self.ny);
        (plane, row, col)
    }

    /// `(plane, row, col)` 转换为线性索引. 调用者保证坐标合法.
    #[inline]
    pub const fn index_of(&self, &(plane, row, col): &Idx3d) -> usize {
        col + self.nx * (row + self.ny * plane)
    }

    /// 检查坐标是否在网格内.
    #[inline]
    pub const fn check(&self, &(plane, row, col): &Idx3d) -> bool {
        plane < self.nz && row < self.ny && col < self.nx
    }

    /// 全部网格内面相邻体素, 按 `-z, -y, -x, +x, +y, +z` 的顺序.
    #[inline]
    pub fn face_neighbours(&self, index: usize) -> FaceNeighbours {
        FaceNeighbours::new(*self, index)
    }

    /// 按线性索引顺序迭代所有坐标.
    #[inline]
    pub fn positions(&self) -> PosIter3d {
        PosIter3d::new(self.shape())
    }
}

/// 定义在规则网格上的数据的共用属性.
pub trait GridShape {
    /// 寻址器.
    fn addressing(&self) -> &GridAddressing;

    /// 数组形状 `(nz, ny, nx)`.
    #[inline]
    fn shape(&self) -> Idx3d {
        self.addressing().shape()
    }

    /// 体素总数.
    #[inline]
    fn size(&self) -> usize {
        self.addressing().size()
    }

    /// 检查坐标是否合法.
    #[inline]
    fn check(&self, pos: &Idx3d) -> bool {
        self.addressing().check(pos)
    }

    /// 与 `other` 形状一致时返回 `Ok`, 否则返回以 `name` 标注的形状错误.
    fn check_same_shape<G: GridShape>(&self, name: &'static str, other: &G) -> SegmentResult<()> {
        ensure_shape(name, self.shape(), other.shape())
    }
}

#[inline]
fn ensure_shape(name: &'static str, expected: Idx3d, found: Idx3d) -> SegmentResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(SegmentError::ShapeMismatch {
            name,
            expected,
            found,
        })
    }
}

#[inline]
fn dim3<T>(arr: &Array3<T>) -> Idx3d {
    arr.dim()
}

/// 逐体素 feature id. 分割 / 合并 / 修复的输出都落在这里.
///
/// 取值约定见 [`crate::consts::label`]: `0` 未分配, `-1` 待修复, 正数为 feature id.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoxelGrid {
    addressing: GridAddressing,
    feature_ids: Array3<i64>,
}

impl GridShape for VoxelGrid {
    #[inline]
    fn addressing(&self) -> &GridAddressing {
        &self.addressing
    }
}

impl Index<usize> for VoxelGrid {
    type Output = i64;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.feature_ids[self.addressing.coords(index)]
    }
}

impl Index<Idx3d> for VoxelGrid {
    type Output = i64;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.feature_ids[index]
    }
}

impl VoxelGrid {
    /// 全部体素未分配的网格.
    pub fn new(addressing: GridAddressing) -> Self {
        Self {
            addressing,
            feature_ids: Array3::zeros(addressing.shape()),
        }
    }

    /// 从已有的 feature id 数组 (形状 `(nz, ny, nx)`) 创建网格.
    pub fn from_feature_ids(feature_ids: Array3<i64>) -> Result<Self, ConfigError> {
        let addressing = GridAddressing::from_shape(dim3(&feature_ids))?;
        let feature_ids = if feature_ids.is_standard_layout() {
            feature_ids
        } else {
            feature_ids.as_standard_layout().to_owned()
        };
        Ok(Self {
            addressing,
            feature_ids,
        })
    }

    /// 取出底层数组.
    #[inline]
    pub fn into_raw(self) -> Array3<i64> {
        self.feature_ids
    }

    /// 底层数组的只读视图.
    #[inline]
    pub fn feature_ids(&self) -> ArrayView3<i64> {
        self.feature_ids.view()
    }

    /// 底层数组的可变视图.
    #[inline]
    pub fn feature_ids_mut(&mut self) -> ArrayViewMut3<i64> {
        self.feature_ids.view_mut()
    }

    /// 按线性索引读取. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<i64> {
        (index < self.size()).then(|| self[index])
    }

    /// 按线性索引写入. 越界时 panic.
    #[inline]
    pub fn set(&mut self, index: usize, id: i64) {
        let pos = self.addressing.coords(index);
        self.feature_ids[pos] = id;
    }

    /// 按线性索引顺序迭代所有 feature id.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.feature_ids.iter().copied()
    }

    /// 统计值为 `id` 的体素个数.
    pub fn count(&self, id: i64) -> usize {
        self.feature_ids.iter().filter(|&&v| v == id).count()
    }

    /// 最大 feature id. 网格中不存在 feature 时返回 `None`.
    pub fn max_id(&self) -> Option<i64> {
        self.feature_ids
            .iter()
            .copied()
            .filter(|&v| label::is_feature(v))
            .max()
    }

    /// 是否存在至少一个 feature 体素?
    pub fn has_feature(&self) -> bool {
        self.feature_ids.iter().any(|&v| label::is_feature(v))
    }

    /// 将所有体素重置为未分配.
    #[inline]
    pub fn reset(&mut self) {
        self.feature_ids.fill(label::UNASSIGNED);
    }

    /// 以映射表 `table` 重写所有 feature 体素: `id -> table[id]`.
    /// 非正值保持不变. `table` 长度必须大于最大 feature id.
    pub(crate) fn relabel(&mut self, table: &[i64]) {
        let map = |v: &mut i64| {
            if label::is_feature(*v) {
                *v = table[*v as usize];
            }
        };
        #[cfg(feature = "rayon")]
        self.feature_ids.par_map_inplace(map);
        #[cfg(not(feature = "rayon"))]
        self.feature_ids.map_inplace(map);
    }
}

/// 逐体素输入数据: 相编号, 取向以及可选的有效体素掩膜.
/// 对分割核心而言只读 (缺陷修复时会整体拷贝元组).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellData {
    addressing: GridAddressing,
    pub(crate) phases: Array3<i32>,
    pub(crate) quats: Array3<Quat>,
    pub(crate) good_voxels: Option<Array3<bool>>,

    /// 下标为相编号. 下标 0 不使用.
    crystal_structures: Vec<LaueClass>,
}

impl GridShape for CellData {
    #[inline]
    fn addressing(&self) -> &GridAddressing {
        &self.addressing
    }
}

impl CellData {
    /// 创建并校验逐体素数据.
    ///
    /// # 参数
    ///
    /// - `phases`: 相编号, `0` 代表无效体素.
    /// - `quats`: 取向, 形状必须与 `phases` 一致. 有效相体素的四元数会被归一化.
    /// - `crystal_structures`: 相编号到 Laue 类的映射, 下标 0 不使用.
    ///
    /// # 返回值
    ///
    /// 形状不一致, 相编号无对应晶体结构, 有效体素四元数无法归一化时返回错误.
    pub fn new(
        phases: Array3<i32>,
        mut quats: Array3<Quat>,
        crystal_structures: Vec<LaueClass>,
    ) -> SegmentResult<Self> {
        let addressing = GridAddressing::from_shape(dim3(&phases))?;
        ensure_shape("quats", addressing.shape(), dim3(&quats))?;

        for (pos, &phase) in phases.indexed_iter() {
            if !label::is_valid_phase(phase) {
                continue;
            }
            if phase as usize >= crystal_structures.len() {
                return Err(SegmentError::UnknownPhase {
                    phase,
                    len: crystal_structures.len(),
                });
            }
            let q = &mut quats[pos];
            *q = q
                .try_normalize()
                .ok_or(SegmentError::DegenerateQuat(addressing.index_of(&pos)))?;
        }

        Ok(Self {
            addressing,
            phases: phases.as_standard_layout().to_owned(),
            quats: quats.as_standard_layout().to_owned(),
            good_voxels: None,
            crystal_structures,
        })
    }

    /// 附加有效体素掩膜. 掩膜为 `false` 的体素永远不会被分配到 feature.
    pub fn with_good_voxels(mut self, mask: Array3<bool>) -> SegmentResult<Self> {
        ensure_shape("good_voxels", self.shape(), dim3(&mask))?;
        self.good_voxels = Some(mask.as_standard_layout().to_owned());
        Ok(self)
    }

    /// 检查 `grid` 与自身形状一致.
    #[inline]
    pub fn check_grid(&self, grid: &VoxelGrid) -> SegmentResult<()> {
        self.check_same_shape("feature_ids", grid)
    }

    /// 第 `index` 个体素的相编号.
    #[inline]
    pub fn phase(&self, index: usize) -> i32 {
        self.phases[self.addressing.coords(index)]
    }

    /// 第 `index` 个体素的取向.
    #[inline]
    pub fn quat(&self, index: usize) -> &Quat {
        &self.quats[self.addressing.coords(index)]
    }

    /// 第 `index` 个体素是否可以被分配到 feature: 相编号有效且未被掩膜排除.
    #[inline]
    pub fn is_eligible(&self, index: usize) -> bool {
        let pos = self.addressing.coords(index);
        label::is_valid_phase(self.phases[pos])
            && self.good_voxels.as_ref().map_or(true, |m| m[pos])
    }

    /// 相编号对应的 Laue 类. 无效相或越界时返回 `None`.
    #[inline]
    pub fn structure_of(&self, phase: i32) -> Option<LaueClass> {
        if !label::is_valid_phase(phase) {
            return None;
        }
        self.crystal_structures.get(phase as usize).copied()
    }

    /// 相编号到 Laue 类的映射表.
    #[inline]
    pub fn crystal_structures(&self) -> &[LaueClass] {
        &self.crystal_structures
    }

    /// 相编号数组.
    #[inline]
    pub fn phases(&self) -> ArrayView3<i32> {
        self.phases.view()
    }

    /// 取向数组.
    #[inline]
    pub fn quats(&self) -> ArrayView3<Quat> {
        self.quats.view()
    }

    /// 有效体素掩膜.
    #[inline]
    pub fn good_voxels(&self) -> Option<ArrayView3<bool>> {
        self.good_voxels.as_ref().map(|m| m.view())
    }
}
