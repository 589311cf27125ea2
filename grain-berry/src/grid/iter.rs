//! 网格上的方向与迭代器.

use super::GridAddressing;
use crate::Idx3d;

/// 三维网格上的 6 个面相邻单位方向.
///
/// 枚举的声明顺序就是邻居的访问顺序: `-z, -y, -x, +x, +y, +z`.
/// 区域生长和缺陷修复中的 "先到者优先" 规则都依赖这一顺序, 不要调整.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    /// 向前一个平面.
    PlaneNeg1,

    /// 向上一行.
    RowNeg1,

    /// 向左一列.
    ColNeg1,

    /// 向右一列.
    ColPos1,

    /// 向下一行.
    RowPos1,

    /// 向后一个平面.
    PlanePos1,
}

impl Direction {
    /// 全部方向, 按访问顺序排列.
    pub const ALL: [Direction; 6] = [
        Direction::PlaneNeg1,
        Direction::RowNeg1,
        Direction::ColNeg1,
        Direction::ColPos1,
        Direction::RowPos1,
        Direction::PlanePos1,
    ];

    /// 在形状为 `shape` 的网格内将 `pos` 沿该方向移动一格.
    /// 越过网格边界时返回 `None`, 永不回绕.
    #[inline]
    pub fn step(&self, &(z, h, w): &Idx3d, (nz, nh, nw): Idx3d) -> Option<Idx3d> {
        match self {
            Direction::PlaneNeg1 => (z > 0).then(|| (z - 1, h, w)),
            Direction::RowNeg1 => (h > 0).then(|| (z, h - 1, w)),
            Direction::ColNeg1 => (w > 0).then(|| (z, h, w - 1)),
            Direction::ColPos1 => (w + 1 < nw).then(|| (z, h, w + 1)),
            Direction::RowPos1 => (h + 1 < nh).then(|| (z, h + 1, w)),
            Direction::PlanePos1 => (z + 1 < nz).then(|| (z + 1, h, w)),
        }
    }
}

/// 某体素所有网格内面相邻体素的线性索引迭代器, 按 [`Direction::ALL`] 顺序产出.
#[derive(Clone, Debug)]
pub struct FaceNeighbours {
    addressing: GridAddressing,
    pos: Idx3d,
    cursor: usize,
}

impl FaceNeighbours {
    #[inline]
    pub(crate) fn new(addressing: GridAddressing, index: usize) -> Self {
        Self {
            addressing,
            pos: addressing.coords(index),
            cursor: 0,
        }
    }
}

impl Iterator for FaceNeighbours {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let shape = self.addressing.shape();
        while let Some(dir) = Direction::ALL.get(self.cursor) {
            self.cursor += 1;
            if let Some(p) = dir.step(&self.pos, shape) {
                return Some(self.addressing.index_of(&p));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(Direction::ALL.len() - self.cursor.min(Direction::ALL.len())))
    }
}

/// 三维行优先坐标迭代器, 顺序与线性索引一致.
///
/// 与 `iproduct!(0..z, 0..h, 0..w)` 等价, 但只占用几个 `usize`.
#[derive(Debug)]
pub struct PosIter3d {
    cur: Idx3d,
    shape: Idx3d,
}

impl PosIter3d {
    /// 从 `(0, 0, 0)` 开始迭代形状为 `shape` 的网格.
    #[inline]
    pub fn new(shape: Idx3d) -> Self {
        Self {
            cur: (0, 0, 0),
            shape,
        }
    }
}

impl Iterator for PosIter3d {
    type Item = Idx3d;

    fn next(&mut self) -> Option<Self::Item> {
        let (z, h, w) = self.shape;
        if z == 0 || h == 0 || w == 0 || self.cur.0 == z {
            return None;
        }
        let ret_pos = self.cur;
        if self.cur.2 + 1 < w {
            self.cur.2 += 1;
        } else if self.cur.1 + 1 < h {
            self.cur = (self.cur.0, self.cur.1 + 1, 0);
        } else {
            self.cur = (self.cur.0 + 1, 0, 0);
        }
        Some(ret_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, PosIter3d};
    use crate::grid::GridAddressing;
    use itertools::iproduct;

    #[test]
    fn test_pos_iter_3d() {
        for (z, h, w) in iproduct!(0..=3, 0..=3, 0..=3) {
            let builtin = iproduct!(0..z, 0..h, 0..w);
            assert!(Iterator::eq(builtin, PosIter3d::new((z, h, w))));
        }
    }

    #[test]
    fn test_direction_step() {
        let shape = (2, 2, 2);
        for d in Direction::ALL {
            // 从两个对角出发, 每个方向要么越界, 要么恰好移动一格.
            for p in [(0, 0, 0), (1, 1, 1)] {
                if let Some(q) = d.step(&p, shape) {
                    let diff = [p.0.abs_diff(q.0), p.1.abs_diff(q.1), p.2.abs_diff(q.2)];
                    assert_eq!(diff.iter().sum::<usize>(), 1);
                }
            }
        }
        assert_eq!(Direction::ColPos1.step(&(0, 0, 1), shape), None);
        assert_eq!(Direction::PlaneNeg1.step(&(1, 0, 0), shape), Some((0, 0, 0)));
    }

    #[test]
    fn test_face_neighbours_order() {
        let addr = GridAddressing::new(3, 3, 3).unwrap();
        let center = addr.index_of(&(1, 1, 1));
        let got: Vec<usize> = addr.face_neighbours(center).collect();
        // -z, -y, -x, +x, +y, +z.
        assert_eq!(got, vec![4, 10, 12, 14, 16, 22]);
    }

    #[test]
    fn test_face_neighbours_boundary() {
        let addr = GridAddressing::new(4, 2, 1).unwrap();
        // 角落体素只有两个邻居, 不会回绕到另一行.
        let got: Vec<usize> = addr.face_neighbours(3).collect();
        assert_eq!(got, vec![2, 7]);
        let got: Vec<usize> = addr.face_neighbours(4).collect();
        assert_eq!(got, vec![0, 5]);

        let single = GridAddressing::new(1, 1, 1).unwrap();
        assert_eq!(single.face_neighbours(0).count(), 0);
    }

    /// 邻接关系是对称的.
    #[test]
    fn test_face_neighbours_symmetric() {
        let addr = GridAddressing::new(3, 4, 2).unwrap();
        for i in 0..addr.size() {
            for j in addr.face_neighbours(i) {
                assert!(addr.face_neighbours(j).any(|k| k == i));
            }
        }
    }
}
