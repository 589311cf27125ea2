//! 取向数学.
//!
//! 分割算法只通过 [`OrientationOps`] 访问取向数学. 本模块同时提供一个参考实现
//! [`SymmetryOps`], 基于四元数和各 Laue 类的对称操作表.
//! 欧拉角 / Rodrigues 向量等表示之间的转换不在本 crate 的范围内.

use ordered_float::NotNan;
use std::ops::Mul;

mod symmetry;

pub use symmetry::LaueClass;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

type Vec3 = [f64; 3];

/// 单位四元数形式的晶体取向, 按 `(w, x, y, z)` 存储.
///
/// 该结构本身不强制归一化; 进入分割流程的四元数会在
/// [`crate::CellData::new`] 中统一归一化.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Quat {
    /// 标量部分.
    pub w: f64,
    /// 向量部分 x 分量.
    pub x: f64,
    /// 向量部分 y 分量.
    pub y: f64,
    /// 向量部分 z 分量.
    pub z: f64,
}

impl Default for Quat {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Quat {
    type Output = Quat;

    /// Hamilton 乘积 `self * rhs`, 即先施加 `rhs` 再施加 `self`.
    #[inline]
    fn mul(self, rhs: Quat) -> Quat {
        let Quat { w: a, x: b, y: c, z: d } = self;
        let Quat { w: e, x: f, y: g, z: h } = rhs;
        Quat {
            w: a * e - b * f - c * g - d * h,
            x: a * f + b * e + c * h - d * g,
            y: a * g - b * h + c * e + d * f,
            z: a * h + b * g - c * f + d * e,
        }
    }
}

impl Quat {
    /// 恒等旋转.
    pub const IDENTITY: Quat = Quat::new(1.0, 0.0, 0.0, 0.0);

    /// 直接构造, 不做归一化.
    #[inline]
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// 绕 `axis` 旋转 `angle` 弧度. `axis` 无需归一化.
    ///
    /// 如果 `axis` 为零向量或含非有限分量, 返回 `None`.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Option<Self> {
        let n = norm3(&axis);
        if !n.is_finite() || n <= f64::EPSILON || !angle.is_finite() {
            return None;
        }
        let (s, c) = (angle / 2.0).sin_cos();
        Some(Self::new(c, s * axis[0] / n, s * axis[1] / n, s * axis[2] / n))
    }

    /// 同 [`Self::from_axis_angle`], 但对退化输入返回恒等旋转. 仅用于常量表.
    #[inline]
    pub(crate) fn rotation(axis: Vec3, angle: f64) -> Self {
        Self::from_axis_angle(axis, angle).unwrap_or(Self::IDENTITY)
    }

    /// 四元数的模.
    #[inline]
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// 四维内积.
    #[inline]
    pub fn dot(&self, rhs: &Quat) -> f64 {
        self.w * rhs.w + self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// 归一化. 零四元数或含非有限分量时返回 `None`.
    pub fn try_normalize(&self) -> Option<Self> {
        let n = self.norm();
        (n.is_finite() && n > f64::EPSILON)
            .then(|| Self::new(self.w / n, self.x / n, self.y / n, self.z / n))
    }

    /// 共轭. 对单位四元数而言即逆旋转.
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// 旋转角, 范围 `[0, PI]`. 假设 `self` 是单位四元数.
    #[inline]
    pub fn angle(&self) -> f64 {
        2.0 * self.w.abs().min(1.0).acos()
    }

    /// 旋转轴 (单位向量), 方向取 `w >= 0` 的表示. 旋转角为 0 时返回 `[0, 0, 1]`.
    pub fn axis(&self) -> Vec3 {
        let sign = if self.w < 0.0 { -1.0 } else { 1.0 };
        let v = [sign * self.x, sign * self.y, sign * self.z];
        let n = norm3(&v);
        if n <= f64::EPSILON {
            [0.0, 0.0, 1.0]
        } else {
            [v[0] / n, v[1] / n, v[2] / n]
        }
    }

    /// 用该 (单位) 四元数旋转向量 `v`.
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        let p = *self * Quat::new(0.0, v[0], v[1], v[2]) * self.conjugate();
        [p.x, p.y, p.z]
    }
}

/// 三维向量的模.
#[inline]
pub(crate) fn norm3(v: &Vec3) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// 两个取向之间考虑对称性后的最小取向差.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Misorientation {
    /// 最小取向差角, 单位为弧度, 范围 `[0, PI]`.
    pub angle: f64,

    /// 与最小角对应的旋转轴 (单位向量, 晶体坐标系).
    pub axis: Vec3,
}

/// 取向数学提供者.
///
/// 分割 / 孪晶合并只依赖该 trait 的两个入口: 取向差计算和对称操作个数查询.
pub trait OrientationOps: Sync {
    /// 计算 `q1` (属于 `class1`) 和 `q2` (属于 `class2`) 之间的最小取向差.
    ///
    /// 两者 Laue 类不同时返回 `None`, 调用者应将其视为 "永不归组".
    fn misorientation(
        &self,
        q1: &Quat,
        class1: LaueClass,
        q2: &Quat,
        class2: LaueClass,
    ) -> Option<Misorientation>;

    /// `class` 的对称操作个数.
    #[inline]
    fn symmetry_count(&self, class: LaueClass) -> usize {
        class.symmetry_count()
    }
}

/// 基于对称操作表的参考实现.
///
/// 对 `q2 * q1⁻¹` 左乘每一个对称操作, 取旋转角最小者.
/// 两侧的对称操作 `S_i * Δ * S_j` 与单侧 `S_k * Δ` 的最小角相同, 因此只需遍历一侧.
#[derive(Copy, Clone, Debug, Default)]
pub struct SymmetryOps;

impl OrientationOps for SymmetryOps {
    fn misorientation(
        &self,
        q1: &Quat,
        class1: LaueClass,
        q2: &Quat,
        class2: LaueClass,
    ) -> Option<Misorientation> {
        if class1 != class2 {
            return None;
        }
        let delta = *q2 * q1.conjugate();

        // |w| 越大, 旋转角越小.
        let best = class1
            .operators()
            .iter()
            .map(|op| *op * delta)
            .filter_map(|q| NotNan::new(q.w.abs()).ok().map(|w| (w, q)))
            .max_by_key(|(w, _)| *w)?
            .1;

        Some(Misorientation {
            angle: best.angle(),
            axis: best.axis(),
        })
    }
}

/// 转轴 `axis` 与目标转轴 `target` 之间的最小夹角 (弧度, `[0, PI / 2]`).
///
/// 遍历 `class` 中全部对称操作作用后的 `axis` 等价像,
/// 并以 `|axis · target|` 比较, 即不区分转轴正负方向.
/// `target` 为零向量时返回 `PI / 2`.
pub fn axis_deviation(class: LaueClass, axis: Vec3, target: Vec3) -> f64 {
    let n = norm3(&target);
    if n <= f64::EPSILON {
        return std::f64::consts::FRAC_PI_2;
    }
    let t = [target[0] / n, target[1] / n, target[2] / n];

    class
        .operators()
        .iter()
        .map(|op| {
            let [a, b, c] = op.rotate(axis);
            (a * t[0] + b * t[1] + c * t[2]).abs().min(1.0)
        })
        .filter_map(|cos| NotNan::new(cos).ok())
        .max()
        .map_or(std::f64::consts::FRAC_PI_2, |cos| cos.into_inner().acos())
}

#[cfg(test)]
mod tests {
    use super::{axis_deviation, LaueClass, OrientationOps, Quat, SymmetryOps};
    use crate::consts::angle::to_radians;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// 几个不在任何特殊位置的 "随机" 取向.
    fn samples() -> Vec<Quat> {
        vec![
            Quat::from_axis_angle([0.3, -0.2, 0.9], 0.7).unwrap(),
            Quat::from_axis_angle([-1.0, 0.4, 0.1], 2.1).unwrap(),
            Quat::from_axis_angle([0.5, 0.5, -0.2], 1.3).unwrap(),
        ]
    }

    #[test]
    fn test_quat_basic() {
        let q = Quat::from_axis_angle([0.0, 0.0, 2.0], FRAC_PI_2).unwrap();
        assert!(f64_eq(q.norm(), 1.0));
        assert!(f64_eq(q.angle(), FRAC_PI_2));
        let [x, y, z] = q.rotate([1.0, 0.0, 0.0]);
        assert!(f64_eq(x, 0.0) && f64_eq(y, 1.0) && f64_eq(z, 0.0));

        let id = q * q.conjugate();
        assert!(f64_eq(id.angle(), 0.0));
        assert_eq!(Quat::from_axis_angle([0.0; 3], 1.0), None);
        assert_eq!(Quat::new(0.0, 0.0, 0.0, 0.0).try_normalize(), None);
    }

    #[test]
    fn test_misorientation_identity() {
        let ops = SymmetryOps;
        for q in samples() {
            for class in LaueClass::ALL {
                let m = ops.misorientation(&q, class, &q, class).unwrap();
                assert!(m.angle.abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_misorientation_class_mismatch() {
        let q = Quat::IDENTITY;
        let ops = SymmetryOps;
        assert!(ops
            .misorientation(&q, LaueClass::Cubic, &q, LaueClass::Hexagonal)
            .is_none());
    }

    /// 将任一侧替换为其对称等价表示, 取向差不变.
    #[test]
    fn test_misorientation_symmetry_invariance() {
        let ops = SymmetryOps;
        let qs = samples();
        for class in LaueClass::ALL {
            for (a, b) in [(0, 1), (1, 2), (0, 2)] {
                let base = ops.misorientation(&qs[a], class, &qs[b], class).unwrap();
                for op in class.operators() {
                    let left = ops
                        .misorientation(&(*op * qs[a]), class, &qs[b], class)
                        .unwrap();
                    let right = ops
                        .misorientation(&qs[a], class, &(*op * qs[b]), class)
                        .unwrap();
                    assert!(f64_eq(base.angle, left.angle), "{class:?}");
                    assert!(f64_eq(base.angle, right.angle), "{class:?}");
                }
            }
        }
    }

    /// 立方晶系中 90 度绕 <100> 是对称操作, 因此取向差为 0;
    /// 正交晶系中则保持 90 度.
    #[test]
    fn test_misorientation_quarter_turn() {
        let ops = SymmetryOps;
        let q1 = samples()[0];
        let q2 = Quat::from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2).unwrap() * q1;

        let cubic = ops
            .misorientation(&q1, LaueClass::Cubic, &q2, LaueClass::Cubic)
            .unwrap();
        assert!(cubic.angle < 1e-6);

        let ortho = ops
            .misorientation(&q1, LaueClass::Orthorhombic, &q2, LaueClass::Orthorhombic)
            .unwrap();
        assert!(f64_eq(ortho.angle, FRAC_PI_2));
    }

    /// 立方晶系取向差最大不超过 62.8 度.
    #[test]
    fn test_cubic_fundamental_bound() {
        let ops = SymmetryOps;
        let qs = samples();
        for a in qs.iter() {
            for b in qs.iter() {
                let m = ops
                    .misorientation(a, LaueClass::Cubic, b, LaueClass::Cubic)
                    .unwrap();
                assert!(m.angle <= to_radians(62.81));
            }
        }
    }

    #[test]
    fn test_sigma3_axis() {
        let ops = SymmetryOps;
        let q1 = samples()[1];
        let twin = Quat::from_axis_angle([1.0, 1.0, 1.0], PI / 3.0).unwrap();
        let q2 = twin * q1;

        let m = ops
            .misorientation(&q1, LaueClass::Cubic, &q2, LaueClass::Cubic)
            .unwrap();
        assert!(f64_eq(m.angle, PI / 3.0));
        let dev = axis_deviation(LaueClass::Cubic, m.axis, [1.0, 1.0, 1.0]);
        assert!(dev < 1e-6);
    }

    #[test]
    fn test_axis_deviation_sign_insensitive() {
        let dev = axis_deviation(LaueClass::Triclinic, [-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        assert!(dev < 1e-9);

        // 立方晶系中 [1, -1, 1] 与 [1, 1, 1] 等价.
        let s = 1.0 / 3.0f64.sqrt();
        let dev = axis_deviation(LaueClass::Cubic, [s, -s, s], [1.0, 1.0, 1.0]);
        assert!(dev < 1e-9);

        let dev = axis_deviation(LaueClass::Triclinic, [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]);
        assert!(f64_eq(dev, FRAC_PI_2));
    }
}
