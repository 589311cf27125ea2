//! 通用常量.

/// 体素标签 (feature id) 的保留值.
pub mod label {
    /// 未分配 / 背景 (void) 体素的 feature id.
    pub const UNASSIGNED: i64 = 0;

    /// 待修复的缺陷体素的 feature id.
    pub const DEFECT: i64 = -1;

    /// 第一个合法的 feature id. feature 编号从 1 开始连续递增.
    pub const FIRST_FEATURE: i64 = 1;

    /// 无效相 (phase) 编号. 该相的体素永远不会被分配到任何 feature.
    pub const INVALID_PHASE: i32 = 0;

    /// 体素是否未分配?
    #[inline]
    pub const fn is_unassigned(id: i64) -> bool {
        matches!(id, UNASSIGNED)
    }

    /// 体素是否是待修复缺陷?
    #[inline]
    pub const fn is_defect(id: i64) -> bool {
        matches!(id, DEFECT)
    }

    /// 体素是否已属于某个 feature?
    #[inline]
    pub const fn is_feature(id: i64) -> bool {
        id >= FIRST_FEATURE
    }

    /// 相编号是否有效?
    #[inline]
    pub const fn is_valid_phase(phase: i32) -> bool {
        phase > INVALID_PHASE
    }
}

/// 角度相关常量.
pub mod angle {
    /// 一度对应的弧度.
    pub const DEGREE: f64 = std::f64::consts::PI / 180.0;

    /// 1 / sqrt(3). `<111>` 单位向量的各分量.
    pub const FRAC_1_SQRT_3: f64 = 0.577_350_269_189_625_8;

    /// Σ3 孪晶关系的旋转角 (60 度).
    pub const SIGMA3_ANGLE: f64 = 60.0 * DEGREE;

    /// Σ3 孪晶合并的默认角度容差 (2 度).
    pub const SIGMA3_ANGLE_TOLERANCE: f64 = 2.0 * DEGREE;

    /// Σ3 孪晶合并的默认转轴容差 (2 度).
    pub const SIGMA3_AXIS_TOLERANCE: f64 = 2.0 * DEGREE;

    /// 角度转换为弧度.
    #[inline]
    pub fn to_radians(degree: f64) -> f64 {
        degree * DEGREE
    }

    /// 弧度转换为角度.
    #[inline]
    pub fn to_degrees(radian: f64) -> f64 {
        radian / DEGREE
    }
}

/// 体素状态.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VoxelState {
    /// `label::UNASSIGNED`, 代表背景或未分配.
    Unassigned,

    /// `label::DEFECT`, 代表待修复缺陷.
    Defect,

    /// 正整数, 代表已归属某个 feature.
    Feature,
}

impl VoxelState {
    /// 根据 feature id 判断体素状态. 小于 `-1` 的值同样视为缺陷.
    #[inline]
    pub const fn of(id: i64) -> Self {
        if label::is_feature(id) {
            Self::Feature
        } else if label::is_unassigned(id) {
            Self::Unassigned
        } else {
            Self::Defect
        }
    }

    /// 是否已归属 feature.
    #[inline]
    pub fn is_feature(&self) -> bool {
        matches!(self, Self::Feature)
    }

    /// 是否是待修复缺陷.
    #[inline]
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::Defect)
    }
}
