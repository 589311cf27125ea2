//! 合成多晶体模型, 供测试和消融实验使用.
//!
//! 晶粒由随机晶核的 Voronoi 剖分得到, 每个晶粒取一个随机取向.
//! 可选地让部分晶粒与最近的已有晶粒构成 Σ3 孪晶, 或随机撒布未索引体素.

use std::f64::consts::TAU;

use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::consts::{angle, label};
use crate::error::{ConfigError, SegmentResult};
use crate::grid::{CellData, GridAddressing, VoxelGrid};
use crate::orientation::{LaueClass, Quat};
use crate::Idx3d;

/// 合成多晶体.
#[derive(Clone, Debug)]
pub struct Phantom {
    cells: CellData,
    truth: VoxelGrid,
    twin_pairs: Vec<(i64, i64)>,
}

impl Phantom {
    /// 逐体素输入数据. 只有一个相, 编号为 1.
    #[inline]
    pub fn cells(&self) -> &CellData {
        &self.cells
    }

    /// 真值晶粒编号 (`1..=grains`). 未索引体素仍保留其所在晶粒的编号.
    #[inline]
    pub fn truth(&self) -> &VoxelGrid {
        &self.truth
    }

    /// 构成孪晶关系的晶粒对 `(父晶粒, 孪晶)`.
    #[inline]
    pub fn twin_pairs(&self) -> &[(i64, i64)] {
        &self.twin_pairs
    }

    /// 拆分为逐体素数据与真值.
    #[inline]
    pub fn into_parts(self) -> (CellData, VoxelGrid) {
        (self.cells, self.truth)
    }
}

/// [`Phantom`] 构造器.
#[derive(Clone, Debug)]
pub struct PhantomBuilder {
    shape: Idx3d,
    grains: usize,
    laue: LaueClass,
    twin_fraction: f64,
    unindexed_fraction: f64,
    scatter: f64,
    seed: u64,
}

impl PhantomBuilder {
    /// 形状为 `(nz, ny, nx)` 的立方晶系单相模型, 默认 8 个晶粒, 无孪晶, 无噪声.
    pub fn new(shape: Idx3d) -> Self {
        Self {
            shape,
            grains: 8,
            laue: LaueClass::Cubic,
            twin_fraction: 0.0,
            unindexed_fraction: 0.0,
            scatter: 0.0,
            seed: 0,
        }
    }

    /// 晶粒个数. 至少为 1.
    #[must_use]
    pub fn grains(mut self, grains: usize) -> Self {
        self.grains = grains.max(1);
        self
    }

    /// 晶体结构.
    #[must_use]
    pub fn laue(mut self, laue: LaueClass) -> Self {
        self.laue = laue;
        self
    }

    /// 每个晶粒 (第一个除外) 成为其最近邻晶粒的 Σ3 孪晶的概率.
    #[must_use]
    pub fn twin_fraction(mut self, fraction: f64) -> Self {
        self.twin_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// 每个体素被置为未索引 (相编号 0) 的概率.
    #[must_use]
    pub fn unindexed_fraction(mut self, fraction: f64) -> Self {
        self.unindexed_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// 晶粒内部取向散布的最大角度 (弧度).
    #[must_use]
    pub fn scatter(mut self, radians: f64) -> Self {
        self.scatter = radians.abs();
        self
    }

    /// 随机种子.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// 生成模型. 形状含 0 时返回错误.
    pub fn build(&self) -> SegmentResult<Phantom> {
        let addressing = GridAddressing::from_shape(self.shape)?;
        let (nz, ny, nx) = self.shape;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let centres: Vec<[f64; 3]> = (0..self.grains)
            .map(|_| {
                [
                    rng.gen_range(0.0..nz as f64),
                    rng.gen_range(0.0..ny as f64),
                    rng.gen_range(0.0..nx as f64),
                ]
            })
            .collect();

        let mut orientations: Vec<Quat> = Vec::with_capacity(self.grains);
        let mut twin_pairs = Vec::new();
        let twin = Quat::from_axis_angle([1.0, 1.0, 1.0], angle::SIGMA3_ANGLE)
            .ok_or(ConfigError::DegenerateTwinAxis([1.0, 1.0, 1.0]))?;
        for k in 0..self.grains {
            let parent = nearest(&centres[..k], &centres[k]);
            let q = match parent {
                Some(j) if rng.gen_bool(self.twin_fraction) => {
                    twin_pairs.push((j as i64 + 1, k as i64 + 1));
                    twin * orientations[j]
                }
                _ => random_quat(&mut rng),
            };
            orientations.push(q);
        }

        let mut truth = VoxelGrid::new(addressing);
        let mut phases = Array3::from_elem(self.shape, 1i32);
        let mut quats = Array3::from_elem(self.shape, Quat::IDENTITY);

        for (i, pos) in addressing.positions().enumerate() {
            let centre = [pos.0 as f64 + 0.5, pos.1 as f64 + 0.5, pos.2 as f64 + 0.5];
            let g = nearest(&centres, &centre).unwrap_or(0);
            truth.set(i, g as i64 + label::FIRST_FEATURE);

            if rng.gen_bool(self.unindexed_fraction) {
                phases[pos] = label::INVALID_PHASE;
                continue;
            }
            let mut q = orientations[g];
            if self.scatter > 0.0 {
                let axis = random_quat(&mut rng).axis();
                let dq = Quat::from_axis_angle(axis, rng.gen_range(0.0..self.scatter));
                q = dq.map_or(q, |dq| dq * q);
            }
            quats[pos] = q;
        }

        let cells = CellData::new(phases, quats, vec![self.laue; 2])?;
        log::debug!(
            "合成模型 {:?}: {} 个晶粒, {} 对孪晶",
            (nx, ny, nz),
            self.grains,
            twin_pairs.len()
        );
        Ok(Phantom {
            cells,
            truth,
            twin_pairs,
        })
    }
}

/// `points` 中距离 `p` 最近者的下标. `points` 为空时返回 `None`.
fn nearest(points: &[[f64; 3]], p: &[f64; 3]) -> Option<usize> {
    points
        .iter()
        .map(|c| (0..3).map(|d| (c[d] - p[d]).powi(2)).sum::<f64>())
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(k, _)| k)
}

/// 均匀分布的随机单位四元数 (Shoemake).
fn random_quat<R: Rng>(rng: &mut R) -> Quat {
    let u1: f64 = rng.gen();
    let (u2, u3): (f64, f64) = (rng.gen(), rng.gen());
    let (a, b) = ((1.0 - u1).sqrt(), u1.sqrt());
    Quat::new(
        a * (TAU * u2).sin(),
        a * (TAU * u2).cos(),
        b * (TAU * u3).sin(),
        b * (TAU * u3).cos(),
    )
}

#[cfg(test)]
mod tests {
    use super::PhantomBuilder;
    use crate::consts::angle::to_radians;
    use crate::grid::GridShape;
    use crate::orientation::{axis_deviation, LaueClass, OrientationOps, SymmetryOps};

    #[test]
    fn test_phantom_is_reproducible() {
        let a = PhantomBuilder::new((3, 6, 7)).grains(4).seed(5).build().unwrap();
        let b = PhantomBuilder::new((3, 6, 7)).grains(4).seed(5).build().unwrap();
        assert_eq!(a.truth(), b.truth());
        assert_eq!(a.cells().quats(), b.cells().quats());
        assert_eq!(a.cells().size(), 126);
        assert!(a.truth().max_id().unwrap() <= 4);
    }

    #[test]
    fn test_phantom_unindexed() {
        let p = PhantomBuilder::new((4, 8, 8))
            .unindexed_fraction(1.0)
            .build()
            .unwrap();
        assert!(p.cells().phases().iter().all(|&v| v == 0));

        let p = PhantomBuilder::new((4, 8, 8)).build().unwrap();
        assert!(p.cells().phases().iter().all(|&v| v == 1));
    }

    #[test]
    fn test_phantom_twins() {
        let p = PhantomBuilder::new((4, 12, 12))
            .grains(6)
            .twin_fraction(1.0)
            .seed(3)
            .build()
            .unwrap();
        assert_eq!(p.twin_pairs().len(), 5);

        let cells = p.cells();
        let first = |id: i64| {
            (0..cells.size())
                .find(|&i| p.truth()[i] == id)
                .map(|i| *cells.quat(i))
        };
        for &(parent, twin) in p.twin_pairs() {
            let (Some(a), Some(b)) = (first(parent), first(twin)) else {
                // 晶核太近时晶粒可能没有体素.
                continue;
            };
            let m = SymmetryOps
                .misorientation(&a, LaueClass::Cubic, &b, LaueClass::Cubic)
                .unwrap();
            assert!((m.angle - to_radians(60.0)).abs() < 1e-6);
            assert!(axis_deviation(LaueClass::Cubic, m.axis, [1.0, 1.0, 1.0]) < 1e-6);
        }
    }

    #[test]
    fn test_phantom_empty_shape() {
        assert!(PhantomBuilder::new((0, 3, 3)).build().is_err());
    }
}
