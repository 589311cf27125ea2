//! feature id 镜像与压缩快照. 用于备份和复原分割结果.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::Array3;

use super::{GridAddressing, GridShape, VoxelGrid};
use crate::error::SnapshotError;
use crate::Idx3d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一个拥有所有权的 feature id 数组的不透明镜像.
/// 用于临时保存分割结果, 并在随后恢复.
///
/// 注意该结构是被设计来 **快速** 回填原数据的,
/// 因此并不压缩原数据. 需要长期保存时请使用 [`CompactFeatureIds`].
#[derive(Clone, Debug)]
pub struct FeatureIdMirror(pub(crate) Vec<i64>);

impl From<&VoxelGrid> for FeatureIdMirror {
    fn from(value: &VoxelGrid) -> Self {
        Self(value.iter().collect())
    }
}

impl FeatureIdMirror {
    /// 镜像中的体素个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 镜像是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl VoxelGrid {
    /// 获取拥有所有权的镜像, 供以后可能的恢复.
    #[inline]
    pub fn mirror(&self) -> FeatureIdMirror {
        FeatureIdMirror::from(self)
    }

    /// 用 `mirror` 覆写 `self` 的内容.
    ///
    /// 如果 `mirror` 大小与 `self.size()` 不符, 则程序 panic.
    pub fn resume(&mut self, mirror: &FeatureIdMirror) {
        assert_eq!(self.size(), mirror.len(), "镜像大小不符");
        for (w, r) in self.feature_ids.iter_mut().zip(mirror.0.iter()) {
            *w = *r;
        }
    }

    /// 压缩 feature id 数组: 先以 bincode 编码, 再经 zlib 压缩.
    pub fn compress(&self) -> Result<CompactFeatureIds, SnapshotError> {
        let ids: Vec<i64> = self.iter().collect();
        let raw = bincode::serialize(&ids)?;
        let mut e = ZlibEncoder::new(Vec::with_capacity(raw.len() / 8 + 16), Compression::best());
        e.write_all(&raw)?;
        Ok(CompactFeatureIds {
            buf: e.finish()?,
            sh: self.shape(),
        })
    }
}

/// 压缩存储的 [`VoxelGrid`]; 不透明类型.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompactFeatureIds {
    /// 压缩的不透明字节流.
    buf: Vec<u8>,

    /// 形状 `(nz, ny, nx)`.
    sh: Idx3d,
}

impl CompactFeatureIds {
    /// 压缩后的字节数.
    #[inline]
    pub fn compressed_len(&self) -> usize {
        self.buf.len()
    }

    /// 原网格形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.sh
    }

    /// 解压缩数据.
    pub fn decompress(self) -> Result<VoxelGrid, SnapshotError> {
        let Self { buf, sh } = self;
        let addressing = GridAddressing::from_shape(sh)?;

        let mut d = ZlibDecoder::new(buf.as_slice());
        let mut raw = Vec::with_capacity(addressing.size() * 8 + 8);
        d.read_to_end(&mut raw)?;
        let ids: Vec<i64> = bincode::deserialize(&raw)?;

        let found = ids.len();
        let expected = addressing.size();
        if found != expected {
            return Err(SnapshotError::LengthMismatch { expected, found });
        }
        let data = Array3::from_shape_vec(sh, ids)
            .map_err(|_| SnapshotError::LengthMismatch { expected, found })?;
        Ok(VoxelGrid::from_feature_ids(data)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SnapshotError;
    use crate::grid::{GridAddressing, VoxelGrid};
    use ndarray::Array3;

    fn sample_grid() -> VoxelGrid {
        let ids = Array3::from_shape_fn((2, 3, 4), |(z, h, w)| ((z + h * w) % 3) as i64 - 1);
        VoxelGrid::from_feature_ids(ids).unwrap()
    }

    #[test]
    fn test_mirror_resume() {
        let mut grid = sample_grid();
        let backup = grid.mirror();
        let expected = grid.clone();
        grid.reset();
        assert_ne!(grid, expected);
        grid.resume(&backup);
        assert_eq!(grid, expected);
    }

    #[test]
    #[should_panic(expected = "镜像大小不符")]
    fn test_mirror_size_mismatch() {
        let backup = sample_grid().mirror();
        let mut other = VoxelGrid::new(GridAddressing::new(1, 1, 1).unwrap());
        other.resume(&backup);
    }

    #[test]
    fn test_compact_snapshot() {
        let grid = sample_grid();
        let compact = grid.compress().unwrap();
        assert_eq!(compact.shape(), (2, 3, 4));
        assert_eq!(compact.decompress().unwrap(), grid);
    }

    /// 大片同值区域应当被显著压缩.
    #[test]
    fn test_compact_snapshot_ratio() {
        let ids = Array3::from_elem((8, 32, 32), 5i64);
        let grid = VoxelGrid::from_feature_ids(ids).unwrap();
        let compact = grid.compress().unwrap();
        assert!(compact.compressed_len() < grid.len_bytes() / 10);
    }

    #[test]
    fn test_corrupt_snapshot() {
        let mut compact = sample_grid().compress().unwrap();
        compact.sh = (2, 3, 5);
        assert!(matches!(
            compact.decompress(),
            Err(SnapshotError::LengthMismatch {
                expected: 30,
                found: 24
            })
        ));
    }

    impl VoxelGrid {
        fn len_bytes(&self) -> usize {
            self.feature_ids.len() * std::mem::size_of::<i64>()
        }
    }
}
