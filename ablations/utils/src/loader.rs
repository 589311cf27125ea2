//! 对 `grain_berry::phantom` 的更一层封装. 提供可由环境变量配置的合成数据加载器.

use grain_berry::phantom::{Phantom, PhantomBuilder};
use grain_berry::SegmentResult;
use std::env;
use std::str::FromStr;

/// 默认模型形状 `(nz, ny, nx)`.
pub const DEFAULT_SHAPE: (usize, usize, usize) = (24, 64, 64);

/// 读取环境变量 `key` 并解析. 变量不存在或无法解析时返回 `default`.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// 由环境变量配置的合成模型构造器.
///
/// 1. `$GRAIN_PHANTOM_GRAINS`: 晶粒个数, 默认 64;
/// 2. `$GRAIN_PHANTOM_SEED`: 随机种子, 默认 0;
/// 3. `$GRAIN_PHANTOM_TWINS`: 孪晶比例, 默认 0.2;
/// 4. `$GRAIN_PHANTOM_UNINDEXED`: 未索引体素比例, 默认 0.02;
/// 5. `$GRAIN_PHANTOM_SCATTER_DEG`: 晶粒内部取向散布 (度), 默认 1.
pub fn builder_from_env() -> PhantomBuilder {
    let scatter: f64 = env_or("GRAIN_PHANTOM_SCATTER_DEG", 1.0);
    PhantomBuilder::new(DEFAULT_SHAPE)
        .grains(env_or("GRAIN_PHANTOM_GRAINS", 64))
        .seed(env_or("GRAIN_PHANTOM_SEED", 0))
        .twin_fraction(env_or("GRAIN_PHANTOM_TWINS", 0.2))
        .unindexed_fraction(env_or("GRAIN_PHANTOM_UNINDEXED", 0.02))
        .scatter(scatter.to_radians())
}

/// 以 `seeds` 中的每个种子生成一个模型, 其余参数取自环境变量.
pub fn phantoms_from_env<I: IntoIterator<Item = u64>>(seeds: I) -> SegmentResult<Vec<Phantom>> {
    let builder = builder_from_env();
    seeds
        .into_iter()
        .map(|s| builder.clone().seed(s).build())
        .collect()
}
