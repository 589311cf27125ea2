//! 基于取向差的归组谓词.

use super::GroupingPredicate;
use crate::consts::label;
use crate::error::ConfigError;
use crate::grid::CellData;
use crate::orientation::{LaueClass, OrientationOps, Quat, SymmetryOps};

/// 两个体素的相编号映射到同一 Laue 类, 且考虑对称性后的最小取向差
/// **严格小于** `tolerance` (弧度) 时归为同一 feature.
#[derive(Clone, Debug)]
pub struct MisorientationGrouping<O = SymmetryOps> {
    ops: O,
    crystal_structures: Vec<LaueClass>,
    tolerance: f64,
}

/// 容差必须是正的有限值.
pub(crate) fn check_tolerance(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NonPositiveTolerance(name, value))
    }
}

impl<O: OrientationOps> MisorientationGrouping<O> {
    /// # 参数
    ///
    /// - `ops`: 取向数学提供者.
    /// - `crystal_structures`: 相编号到 Laue 类的映射, 下标 0 不使用.
    /// - `tolerance`: 取向差容差, 单位为弧度.
    pub fn new(
        ops: O,
        crystal_structures: Vec<LaueClass>,
        tolerance: f64,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            ops,
            crystal_structures,
            tolerance: check_tolerance("misorientation_tolerance", tolerance)?,
        })
    }

    /// 容差 (弧度).
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[inline]
    fn class_of(&self, phase: i32) -> Option<LaueClass> {
        if !label::is_valid_phase(phase) {
            return None;
        }
        self.crystal_structures.get(phase as usize).copied()
    }
}

impl MisorientationGrouping<SymmetryOps> {
    /// 使用参考取向数学实现, 晶体结构表取自 `cells`.
    pub fn from_cells(cells: &CellData, tolerance: f64) -> Result<Self, ConfigError> {
        Self::new(SymmetryOps, cells.crystal_structures().to_vec(), tolerance)
    }
}

impl<O: OrientationOps> GroupingPredicate for MisorientationGrouping<O> {
    fn groups(
        &self,
        reference: &Quat,
        reference_phase: i32,
        candidate: &Quat,
        candidate_phase: i32,
    ) -> bool {
        let (Some(c1), Some(c2)) = (self.class_of(reference_phase), self.class_of(candidate_phase))
        else {
            return false;
        };
        self.ops
            .misorientation(reference, c1, candidate, c2)
            .map_or(false, |m| m.angle < self.tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::MisorientationGrouping;
    use crate::consts::angle::to_radians;
    use crate::error::ConfigError;
    use crate::orientation::{LaueClass, Quat, SymmetryOps};
    use crate::segment::GroupingPredicate;

    fn pred(tol_deg: f64) -> MisorientationGrouping {
        MisorientationGrouping::new(
            SymmetryOps,
            vec![LaueClass::Cubic, LaueClass::Cubic, LaueClass::Hexagonal],
            to_radians(tol_deg),
        )
        .unwrap()
    }

    fn rot_x(deg: f64) -> Quat {
        Quat::from_axis_angle([1.0, 0.0, 0.0], to_radians(deg)).unwrap()
    }

    #[test]
    fn test_tolerance_is_strict() {
        let p = pred(5.0);
        assert!(p.groups(&rot_x(0.0), 1, &rot_x(4.9), 1));
        assert!(!p.groups(&rot_x(0.0), 1, &rot_x(5.1), 1));
        // 立方晶系: 88 度与 0 度只差 2 度.
        assert!(p.groups(&rot_x(0.0), 1, &rot_x(88.0), 1));
    }

    #[test]
    fn test_class_mismatch_never_groups() {
        let p = pred(5.0);
        let q = Quat::IDENTITY;
        assert!(!p.groups(&q, 1, &q, 2));
        assert!(!p.groups(&q, 0, &q, 0));
        assert!(!p.groups(&q, 1, &q, 7));
    }

    #[test]
    fn test_bad_tolerance() {
        for t in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let e = MisorientationGrouping::new(SymmetryOps, vec![], t).unwrap_err();
            assert!(matches!(
                e,
                ConfigError::NonPositiveTolerance("misorientation_tolerance", _)
            ));
        }
    }
}
