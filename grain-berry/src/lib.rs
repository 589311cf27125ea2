#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 从逐体素的晶体取向测量数据 (EBSD 体数据) 中重建晶粒 (feature),
//! 并对分割结果做孪晶合并和缺陷修复.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 所有三维数组的形状均为 `(nz, ny, nx)`, 即 `(plane, row, col)`.
//!   线性体素索引为 `col + nx * (row + ny * plane)`.
//! 2. feature id 约定: `0` 为背景 / 未分配, `-1` 为待修复缺陷, 正数为 feature.
//! 3. 输入不合法时返回 [`SegmentError`] 且不修改网格, 而不是 panic.
//!
//! # 开发计划
//!
//! ### 网格寻址与 6-邻域迭代 ✅
//!
//! 邻居按 `-z, -y, -x, +x, +y, +z` 顺序访问, 不跨越边界.
//!
//! 实现位于 `grain-berry/src/grid`.
//!
//! ### 取向数学 ✅
//!
//! 四元数, 立方 / 六方 / 正交 / 三斜 Laue 类的对称操作表, 最小取向差.
//! 其它取向表示 (欧拉角, Rodrigues 向量等) 之间的转换不在计划内.
//!
//! 实现位于 `grain-berry/src/orientation`.
//!
//! ### 区域生长分割 ✅
//!
//! 可插拔的归组谓词, 确定性扫描 / 带种子的随机种子选择.
//!
//! 实现位于 `grain-berry/src/segment`.
//!
//! ### 孪晶合并 & 缺陷修复 ✅
//!
//! 实现位于 `grain-berry/src/post_proc`.
//!
//! ### 小功能 ✅
//!
//! 1. 提供 mirror type 以支持 feature id 的备份与恢复; 压缩快照. ✅
//! 2. feature id 随机置换, 按 feature 属性阈值筛选. ✅
//! 3. 合成多晶体模型. ✅
//!
//! ### 合并后参考取向重新平均 ⌛️
//!
//! 目前合并后的 feature 沿用根 feature 的参考取向.

/// 三维索引 `(plane, row, col)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

mod control;
mod error;
mod feature;

pub mod grid;
pub mod orientation;
pub mod phantom;
pub mod post_proc;
pub mod segment;

pub mod prelude;

pub use control::{Cancellation, Completion};
pub use error::{ConfigError, SegmentError, SegmentResult, SnapshotError};
pub use feature::{Comparison, Feature, FeatureSet};
pub use grid::{CellData, GridAddressing, GridShape, VoxelGrid};
