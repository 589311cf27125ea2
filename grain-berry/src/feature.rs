//! Feature (晶粒) 与 feature 集合.
//!
//! feature id 从 1 开始连续编号; `FeatureSet` 中第 `k` 个元素的 id 恒为 `k + 1`.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::consts::label;
use crate::error::{SegmentError, SegmentResult};
use crate::grid::{GridShape, VoxelGrid};
use crate::orientation::Quat;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一个 feature: 一组面连通, 相编号相同, 且彼此取向相近的体素.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Feature {
    pub(crate) id: i64,

    /// 体素线性索引, 按生长顺序排列.
    pub(crate) voxels: Vec<usize>,

    pub(crate) phase: i32,

    /// 参考取向, 即种子体素的取向.
    pub(crate) reference: Quat,

    /// 面相邻的其它 feature id.
    pub(crate) neighbours: BTreeSet<i64>,

    /// 合并过程中的临时记录: 已被并入的 feature id. 重新编号后清空.
    pub(crate) merged_into: Option<i64>,
}

impl Feature {
    pub(crate) fn new(id: i64, phase: i32, reference: Quat) -> Self {
        Self {
            id,
            voxels: Vec::new(),
            phase,
            reference,
            neighbours: BTreeSet::new(),
            merged_into: None,
        }
    }

    /// feature id.
    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// 体素线性索引, 按生长顺序排列.
    #[inline]
    pub fn voxels(&self) -> &[usize] {
        &self.voxels
    }

    /// 体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.voxels.len()
    }

    /// 相编号.
    #[inline]
    pub fn phase(&self) -> i32 {
        self.phase
    }

    /// 参考取向.
    #[inline]
    pub fn reference(&self) -> &Quat {
        &self.reference
    }

    /// 面相邻的 feature id, 升序.
    #[inline]
    pub fn neighbours(&self) -> &BTreeSet<i64> {
        &self.neighbours
    }

    /// 合并过程中该 feature 被并入的目标. 合并完成后恒为 `None`.
    #[inline]
    pub fn merged_into(&self) -> Option<i64> {
        self.merged_into
    }
}

/// 阈值比较方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Comparison {
    /// `metric < value`.
    LessThan,

    /// `metric > value`.
    GreaterThan,

    /// `metric == value`.
    Equal,
}

impl Comparison {
    /// 比较 `lhs` 与 `rhs`.
    #[inline]
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::LessThan => lhs < rhs,
            Comparison::GreaterThan => lhs > rhs,
            Comparison::Equal => lhs == rhs,
        }
    }
}

/// 稠密编号的 feature 集合.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureSet {
    features: Vec<Feature>,
}

impl FeatureSet {
    /// 空集合.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// feature 个数, 同时也是最大 feature id.
    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// 按 id 获取 feature. id 不存在时返回 `None`.
    #[inline]
    pub fn get(&self, id: i64) -> Option<&Feature> {
        Self::slot(id).and_then(|k| self.features.get(k))
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: i64) -> Option<&mut Feature> {
        Self::slot(id).and_then(|k| self.features.get_mut(k))
    }

    /// 按 id 升序迭代.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// 全部 feature id, 即 `1..=len`.
    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = i64> {
        label::FIRST_FEATURE..label::FIRST_FEATURE + self.len() as i64
    }

    #[inline]
    fn slot(id: i64) -> Option<usize> {
        label::is_feature(id).then(|| (id - label::FIRST_FEATURE) as usize)
    }

    /// 新建一个 feature, 返回其 id.
    pub(crate) fn push(&mut self, phase: i32, reference: Quat) -> i64 {
        let id = label::FIRST_FEATURE + self.len() as i64;
        self.features.push(Feature::new(id, phase, reference));
        id
    }

    /// 检查网格中每个体素的取值都是 `0`, 负数或集合中存在的 id.
    pub fn check_grid(&self, grid: &VoxelGrid) -> SegmentResult<()> {
        let n = self.len() as i64;
        match grid.iter().find(|&v| v > n) {
            Some(id) => Err(SegmentError::UnknownFeature(id)),
            None => Ok(()),
        }
    }

    /// 根据网格的面相邻关系重建所有 feature 的邻居集合.
    pub fn rebuild_neighbours(&mut self, grid: &VoxelGrid) -> SegmentResult<()> {
        self.check_grid(grid)?;
        self.features.iter_mut().for_each(|f| f.neighbours.clear());

        let addressing = *grid.addressing();
        // 只需检查正方向的邻居, 再对称插入.
        for i in 0..grid.size() {
            let a = grid[i];
            if !label::is_feature(a) {
                continue;
            }
            for j in addressing.face_neighbours(i).filter(|&j| j > i) {
                let b = grid[j];
                if label::is_feature(b) && b != a {
                    self.features[a as usize - 1].neighbours.insert(b);
                    self.features[b as usize - 1].neighbours.insert(a);
                }
            }
        }
        Ok(())
    }

    /// 将 `member` 并入 `root`: 体素列表追加到 `root` 末尾, 并记录 `merged_into`.
    ///
    /// 网格本身不在此处修改, 需要随后调用 [`Self::renumber`].
    pub(crate) fn absorb(&mut self, root: i64, member: i64) {
        debug_assert_ne!(root, member);
        let Some(m) = self.get_mut(member) else {
            return;
        };
        m.merged_into = Some(root);
        let voxels = std::mem::take(&mut m.voxels);
        if let Some(r) = self.get_mut(root) {
            r.voxels.extend(voxels);
        }
    }

    /// 删除所有已被并入其它 feature 的成员, 剩余 feature 按原 id 升序重新稠密编号,
    /// 并同步重写网格和邻居集合. 完成后所有 `merged_into` 均为 `None`.
    ///
    /// # 返回值
    ///
    /// 被删除的 feature 个数.
    pub fn renumber(&mut self, grid: &mut VoxelGrid) -> SegmentResult<usize> {
        let removed = self.compact(grid)?;
        self.rebuild_neighbours(grid)?;
        Ok(removed)
    }

    /// 与 [`Self::renumber`] 相同, 但不按网格重建邻居集合:
    /// 每个幸存 feature 只保留它自己原有邻居中同样幸存的那些 (按新编号).
    ///
    /// # 注意
    ///
    /// 经成员间接相邻的 feature 不会出现在幸存者的邻居集合中,
    /// 此时邻居集合不再等同于网格上的面相邻关系. 需要时可调用 [`Self::rebuild_neighbours`].
    pub(crate) fn renumber_survivors(&mut self, grid: &mut VoxelGrid) -> SegmentResult<usize> {
        self.compact(grid)
    }

    /// 删除被并入的成员, 重写网格与 id. 邻居集合只保留幸存者.
    fn compact(&mut self, grid: &mut VoxelGrid) -> SegmentResult<usize> {
        self.check_grid(grid)?;

        // table[old] = new. 下标 0 占位.
        let mut table = vec![label::UNASSIGNED; self.len() + 1];
        let mut next = label::FIRST_FEATURE;
        for f in self.features.iter().filter(|f| f.merged_into.is_none()) {
            table[f.id as usize] = next;
            next += 1;
        }
        let survives: Vec<bool> = table.iter().map(|&t| label::is_feature(t)).collect();
        for f in self.features.iter() {
            if let Some(root) = f.merged_into {
                table[f.id as usize] = table[root as usize];
            }
        }

        let before = self.len();
        self.features.retain(|f| f.merged_into.is_none());
        for f in self.features.iter_mut() {
            f.id = table[f.id as usize];
            f.neighbours = f
                .neighbours
                .iter()
                .filter(|&&n| survives[n as usize])
                .map(|&n| table[n as usize])
                .collect();
        }
        grid.relabel(&table);
        Ok(before - self.len())
    }

    /// 以种子 `seed` 对 feature id 做一次随机置换, 网格和集合同步更新.
    /// 编号仍保持 `1..=len` 稠密.
    pub fn randomize_ids(&mut self, grid: &mut VoxelGrid, seed: u64) -> SegmentResult<()> {
        self.check_grid(grid)?;

        let mut perm: Vec<i64> = self.ids().collect();
        perm.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut table = vec![label::UNASSIGNED; self.len() + 1];
        for (old, new) in self.ids().zip(perm) {
            table[old as usize] = new;
        }

        for f in self.features.iter_mut() {
            f.id = table[f.id as usize];
            f.neighbours = f.neighbours.iter().map(|&n| table[n as usize]).collect();
        }
        self.features.sort_unstable_by_key(|f| f.id);
        grid.relabel(&table);
        Ok(())
    }

    /// 对每个 feature 计算 `metric` 并与 `value` 比较, 得到 "good feature" 掩膜.
    ///
    /// # 返回值
    ///
    /// 长度为 `len + 1` 的掩膜, 下标为 feature id. 下标 0 恒为 `false`.
    pub fn threshold<F>(&self, metric: F, cmp: Comparison, value: f64) -> Vec<bool>
    where
        F: Fn(&Feature) -> f64,
    {
        std::iter::once(false)
            .chain(self.features.iter().map(|f| cmp.apply(metric(f), value)))
            .collect()
    }
}
