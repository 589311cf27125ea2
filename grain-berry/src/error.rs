//! 运行时错误.

use thiserror::Error;

/// 分割 / 合并 / 修复操作的结果类型.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// 参数配置错误. 在任何网格修改发生之前就会被检出.
#[derive(Copy, Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// 网格尺寸中存在 0.
    #[error("网格尺寸必须为正: ({0}, {1}, {2})")]
    EmptyShape(usize, usize, usize),

    /// 容差 (弧度) 非正或不是有限值. 第一个参数是参数名.
    #[error("容差 `{0}` 必须为正的有限值, 实际为 {1}")]
    NonPositiveTolerance(&'static str, f64),

    /// 最小缺陷尺寸必须不小于 1.
    #[error("最小缺陷尺寸必须不小于 1")]
    ZeroMinDefectSize,

    /// 孪晶转轴为零向量或含有非有限分量.
    #[error("孪晶转轴必须为非零有限向量: {0:?}")]
    DegenerateTwinAxis([f64; 3]),

    /// 孪晶旋转角不在 `[0, PI]` 范围内.
    #[error("孪晶旋转角必须位于 [0, PI], 实际为 {0}")]
    TwinAngleOutOfRange(f64),
}

/// 分割相关操作的前置条件错误.
///
/// 出现该错误时, 网格数据保证未被修改.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SegmentError {
    /// 参数配置错误.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 两个体素数组形状不一致. 形状均以 `(nz, ny, nx)` 表示.
    #[error("`{name}` 形状 {found:?} 与网格形状 {expected:?} 不一致")]
    ShapeMismatch {
        /// 出错的数组名.
        name: &'static str,
        /// 网格形状.
        expected: (usize, usize, usize),
        /// 实际形状.
        found: (usize, usize, usize),
    },

    /// 某个体素的相编号在晶体结构表中不存在.
    #[error("相 {phase} 没有对应的晶体结构 (结构表长度 {len})")]
    UnknownPhase {
        /// 相编号.
        phase: i32,
        /// 晶体结构表长度.
        len: usize,
    },

    /// 四元数无法归一化 (零向量或含非有限分量).
    #[error("体素 {0} 的四元数无法归一化")]
    DegenerateQuat(usize),

    /// 网格上不存在任何 feature, 无法以其修复缺陷.
    #[error("网格中不存在任何 feature, 需要先运行分割")]
    NoFeatures,

    /// feature 集合与网格不一致 (例如网格中出现了集合之外的 id).
    #[error("feature id {0} 不在 feature 集合中")]
    UnknownFeature(i64),

    /// 缺陷区域无法触达任何 feature, 修复无法继续推进.
    /// 参数为剩余待修复体素个数.
    #[error("剩余 {0} 个缺陷体素无法触达任何 feature")]
    HealStalled(usize),
}

/// feature id 快照的压缩 / 解压错误.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// zlib 流读写失败.
    #[error("快照读写失败: {0}")]
    Io(#[from] std::io::Error),

    /// bincode 编解码失败.
    #[error("快照编解码失败: {0}")]
    Codec(#[from] bincode::Error),

    /// 快照中记录的形状非法.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 解压得到的体素个数与记录的形状不符.
    #[error("快照应包含 {expected} 个体素, 实际为 {found}")]
    LengthMismatch {
        /// 形状对应的体素个数.
        expected: usize,
        /// 实际解出的体素个数.
        found: usize,
    },
}
