//! 孪晶合并: 把与邻居满足特定取向关系 (默认 Σ3: 绕 <111> 旋转 60 度) 的 feature
//! 合并为一个 feature.

use std::collections::VecDeque;

use crate::consts::{angle, label};
use crate::control::{Cancellation, Completion, NEVER};
use crate::error::{ConfigError, SegmentError, SegmentResult};
use crate::feature::FeatureSet;
use crate::grid::VoxelGrid;
use crate::orientation::{axis_deviation, norm3, LaueClass, OrientationOps, Quat};
use crate::segment::check_tolerance;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 孪晶关系参数. 角度均以弧度为单位.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TwinSpec {
    axis: [f64; 3],
    angle: f64,
    angle_tolerance: f64,
    axis_tolerance: f64,
}

impl Default for TwinSpec {
    #[inline]
    fn default() -> Self {
        Self::sigma3()
    }
}

impl TwinSpec {
    /// 创建孪晶关系参数.
    ///
    /// # 参数
    ///
    /// - `axis`: 孪晶转轴 (晶体坐标系), 无需归一化, 但不能为零向量.
    /// - `angle`: 孪晶旋转角, 位于 `[0, PI]`.
    /// - `angle_tolerance`, `axis_tolerance`: 旋转角 / 转轴的容差, 必须为正.
    pub fn new(
        axis: [f64; 3],
        angle: f64,
        angle_tolerance: f64,
        axis_tolerance: f64,
    ) -> Result<Self, ConfigError> {
        let ans = Self {
            axis,
            angle,
            angle_tolerance,
            axis_tolerance,
        };
        ans.validate()?;
        Ok(ans)
    }

    /// Σ3 孪晶: 绕 <111> 旋转 60 度, 转轴与角度容差均为 2 度.
    pub const fn sigma3() -> Self {
        Self {
            axis: [angle::FRAC_1_SQRT_3; 3],
            angle: angle::SIGMA3_ANGLE,
            angle_tolerance: angle::SIGMA3_ANGLE_TOLERANCE,
            axis_tolerance: angle::SIGMA3_AXIS_TOLERANCE,
        }
    }

    /// 修改容差.
    #[must_use]
    pub fn with_tolerances(mut self, angle_tolerance: f64, axis_tolerance: f64) -> Self {
        self.angle_tolerance = angle_tolerance;
        self.axis_tolerance = axis_tolerance;
        self
    }

    /// 检查参数合法性.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = norm3(&self.axis);
        if !n.is_finite() || n <= f64::EPSILON {
            return Err(ConfigError::DegenerateTwinAxis(self.axis));
        }
        if !(0.0..=std::f64::consts::PI).contains(&self.angle) {
            return Err(ConfigError::TwinAngleOutOfRange(self.angle));
        }
        check_tolerance("angle_tolerance", self.angle_tolerance)?;
        check_tolerance("axis_tolerance", self.axis_tolerance)?;
        Ok(())
    }

    /// 孪晶转轴.
    #[inline]
    pub fn axis(&self) -> [f64; 3] {
        self.axis
    }

    /// 孪晶旋转角.
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// 旋转角容差.
    #[inline]
    pub fn angle_tolerance(&self) -> f64 {
        self.angle_tolerance
    }

    /// 转轴容差.
    #[inline]
    pub fn axis_tolerance(&self) -> f64 {
        self.axis_tolerance
    }
}

/// 合并孪晶. 等价于不可取消的 [`merge_twins_cancellable`].
pub fn merge_twins<O>(
    grid: &mut VoxelGrid,
    features: &mut FeatureSet,
    ops: &O,
    crystal_structures: &[LaueClass],
    spec: &TwinSpec,
) -> SegmentResult<Completion<usize>>
where
    O: OrientationOps + ?Sized,
{
    merge_twins_cancellable(grid, features, ops, crystal_structures, spec, &NEVER)
}

/// 合并孪晶.
///
/// 按 id 升序处理每个尚未归组的 feature `i`, 以其为根在 feature 邻接图上广度优先搜索:
/// 弹出 `f` 后检查它的每个尚未归组的邻居 `n`. 若两者相编号相同且有效,
/// 参考取向间的取向差与孪晶旋转角之差小于角度容差, 且转轴偏差小于转轴容差,
/// 则 `n` 加入 `i` 的组并入队. 因此孪晶关系是可传递的.
///
/// 完成后每组并为一个 feature, id 按根 id 升序重新稠密编号. 合并后的体素列表为
/// 根的体素在前, 其余成员按搜索顺序追加. 合并后的参考取向和邻居集合都保持为根自己的
/// (邻居集合只保留幸存的 feature), 因此对结果再次合并不会产生新的组.
///
/// # 返回值
///
/// 参数非法, feature 集合与网格不一致, 或 feature 相编号没有晶体结构时返回错误,
/// 此时网格和 `features` 均未被修改. 否则返回被吸收的 feature 个数.
/// `cancel` 在处理每个根之前检查; 被取消时已处理的组照常合并.
pub fn merge_twins_cancellable<O>(
    grid: &mut VoxelGrid,
    features: &mut FeatureSet,
    ops: &O,
    crystal_structures: &[LaueClass],
    spec: &TwinSpec,
    cancel: &Cancellation,
) -> SegmentResult<Completion<usize>>
where
    O: OrientationOps + ?Sized,
{
    spec.validate()?;
    features.check_grid(grid)?;
    for f in features.iter() {
        let phase = f.phase();
        if label::is_valid_phase(phase) && phase as usize >= crystal_structures.len() {
            return Err(SegmentError::UnknownPhase {
                phase,
                len: crystal_structures.len(),
            });
        }
    }

    let mut grouped = vec![false; features.len() + 1];
    let mut bfs_q = VecDeque::with_capacity(8);
    let mut cancelled = false;
    let mut groups = 0usize;

    for root in features.ids() {
        if grouped[root as usize] {
            continue;
        }
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        grouped[root as usize] = true;
        bfs_q.push_back(root);
        let mut members = 0usize;

        while let Some(cur) = bfs_q.pop_front() {
            let Some(f) = features.get(cur) else {
                continue;
            };
            let phase = f.phase();
            if !label::is_valid_phase(phase) {
                continue;
            }
            let class = crystal_structures[phase as usize];
            let reference = *f.reference();

            let twins: Vec<i64> = f
                .neighbours()
                .iter()
                .copied()
                .filter(|&n| !grouped[n as usize])
                .filter(|&n| {
                    features.get(n).map_or(false, |other| {
                        other.phase() == phase
                            && is_twin(ops, class, &reference, other.reference(), spec)
                    })
                })
                .collect();

            for n in twins {
                grouped[n as usize] = true;
                features.absorb(root, n);
                bfs_q.push_back(n);
                members += 1;
            }
        }
        if members > 0 {
            groups += 1;
            log::trace!("feature {root} 吸收 {members} 个孪晶");
        }
    }

    let removed = features.renumber_survivors(grid)?;
    log::info!(
        "孪晶合并: {groups} 组, 移除 {removed} 个 feature, 剩余 {}{}",
        features.len(),
        if cancelled { " (已取消)" } else { "" }
    );

    Ok(if cancelled {
        Completion::Cancelled(removed)
    } else {
        Completion::Done(removed)
    })
}

/// 两个取向是否满足孪晶关系?
fn is_twin<O>(
    ops: &O,
    class: LaueClass,
    q1: &Quat,
    q2: &Quat,
    spec: &TwinSpec,
) -> bool
where
    O: OrientationOps + ?Sized,
{
    let Some(m) = ops.misorientation(q1, class, q2, class) else {
        return false;
    };
    (m.angle - spec.angle).abs() < spec.angle_tolerance
        && axis_deviation(class, m.axis, spec.axis) < spec.axis_tolerance
}
