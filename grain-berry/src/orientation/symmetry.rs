//! 各 Laue 类的对称操作表.
//!
//! 表中每个元素都是单位四元数, 第一个元素总是恒等变换.
//! 表在第一次访问时构建, 此后只读.

use super::Quat;
use itertools::iproduct;
use once_cell::sync::Lazy;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_3, FRAC_PI_6, PI};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 晶体的 Laue 类 (点群). 决定一个取向有多少个等价的数值表示.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LaueClass {
    /// 六方 (622), 12 个对称操作.
    Hexagonal,

    /// 立方 (432), 24 个对称操作.
    Cubic,

    /// 正交 (222), 4 个对称操作.
    Orthorhombic,

    /// 三斜, 只有恒等操作.
    Triclinic,
}

static CUBIC: Lazy<Vec<Quat>> = Lazy::new(|| {
    let mut ops = Vec::with_capacity(24);
    ops.push(Quat::IDENTITY);

    // 绕 <100> 的 90, 180, 270 度旋转.
    for axis in [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]] {
        for k in 1..=3 {
            ops.push(Quat::rotation(axis, k as f64 * FRAC_PI_2));
        }
    }

    // 绕 <111> 的 120 度旋转. 8 个带符号方向恰好覆盖 4 个轴上的 120 / 240 度.
    for (a, b, c) in iproduct!([1.0, -1.0], [1.0, -1.0], [1.0, -1.0]) {
        ops.push(Quat::rotation([a, b, c], 2.0 * FRAC_PI_3));
    }

    // 绕 <110> 的 180 度旋转.
    for axis in [
        [1.0, 1.0, 0.0],
        [1.0, -1.0, 0.0],
        [1.0, 0.0, 1.0],
        [1.0, 0.0, -1.0],
        [0.0, 1.0, 1.0],
        [0.0, 1.0, -1.0],
    ] {
        ops.push(Quat::rotation(axis, PI));
    }
    debug_assert_eq!(ops.len(), 24);
    ops
});

static HEXAGONAL: Lazy<Vec<Quat>> = Lazy::new(|| {
    let mut ops = Vec::with_capacity(12);

    // 绕 c 轴的 k * 60 度旋转.
    for k in 0..6 {
        ops.push(Quat::rotation([0.0, 0.0, 1.0], k as f64 * FRAC_PI_3));
    }

    // 绕基面内 6 个二次轴的 180 度旋转.
    for k in 0..6 {
        let phi = k as f64 * FRAC_PI_6;
        ops.push(Quat::rotation([phi.cos(), phi.sin(), 0.0], PI));
    }
    debug_assert_eq!(ops.len(), 12);
    ops
});

static ORTHORHOMBIC: Lazy<Vec<Quat>> = Lazy::new(|| {
    vec![
        Quat::IDENTITY,
        Quat::new(0.0, 1.0, 0.0, 0.0),
        Quat::new(0.0, 0.0, 1.0, 0.0),
        Quat::new(0.0, 0.0, 0.0, 1.0),
    ]
});

static TRICLINIC: [Quat; 1] = [Quat::IDENTITY];

impl LaueClass {
    /// 全部 Laue 类.
    pub const ALL: [LaueClass; 4] = [
        LaueClass::Hexagonal,
        LaueClass::Cubic,
        LaueClass::Orthorhombic,
        LaueClass::Triclinic,
    ];

    /// 获取该类的全部对称操作 (单位四元数). 第一个元素为恒等变换.
    pub fn operators(&self) -> &'static [Quat] {
        match self {
            LaueClass::Cubic => CUBIC.as_slice(),
            LaueClass::Hexagonal => HEXAGONAL.as_slice(),
            LaueClass::Orthorhombic => ORTHORHOMBIC.as_slice(),
            LaueClass::Triclinic => &TRICLINIC,
        }
    }

    /// 对称操作个数.
    #[inline]
    pub const fn symmetry_count(&self) -> usize {
        match self {
            LaueClass::Cubic => 24,
            LaueClass::Hexagonal => 12,
            LaueClass::Orthorhombic => 4,
            LaueClass::Triclinic => 1,
        }
    }
}
