//! 算法运行统计.

use std::time::{Duration, Instant};

/// ablation/benchmark 计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    pub fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    pub fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 获得总共累计下来的时间 (以微秒为单位).
    #[inline]
    pub fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// 分割流程的阶段.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    /// 区域生长.
    Grow,
    /// 孪晶合并.
    Twins,
    /// 缺陷修复.
    Heal,
}

/// 某一取向差容差下的数据统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 处理过的合成模型个数.
    phantoms: u64,

    /// 分割失败 (返回错误) 的模型个数.
    failed: u64,

    /// 真值晶粒总数.
    expected: u64,

    /// 区域生长得到的 feature 总数.
    found: u64,

    /// 孪晶合并吸收的 feature 总数.
    merged: u64,

    /// 缺陷修复填充的体素总数.
    healed: u64,

    grow_time: AccTimer,
    twins_time: AccTimer,
    heal_time: AccTimer,

    /// 整个任务花费的总时间 (包括模型生成).
    real_time: AccTimer,

    /// 单个模型最耗时的一次完整分割.
    most: Option<Duration>,
}

impl Profile {
    /// 初始化.
    #[inline]
    pub fn new() -> Self {
        Self {
            phantoms: 0,
            failed: 0,
            expected: 0,
            found: 0,
            merged: 0,
            healed: 0,
            grow_time: AccTimer::default(),
            twins_time: AccTimer::default(),
            heal_time: AccTimer::default(),
            real_time: AccTimer::default(),
            most: None,
        }
    }

    fn timer(&mut self, stage: Stage) -> &mut AccTimer {
        match stage {
            Stage::Grow => &mut self.grow_time,
            Stage::Twins => &mut self.twins_time,
            Stage::Heal => &mut self.heal_time,
        }
    }

    /// 记录一个新的模型, 其真值晶粒数为 `expected`.
    #[inline]
    pub fn count_phantom(&mut self, expected: u64) {
        self.phantoms += 1;
        self.expected += expected;
    }

    /// 记录一次分割失败.
    #[inline]
    pub fn count_failed(&mut self) {
        self.failed += 1;
    }

    /// 开始 `stage` 阶段计时.
    #[inline]
    pub fn stage_start(&mut self, stage: Stage) {
        self.timer(stage).start();
    }

    /// 结束 `stage` 阶段计时, 返回本轮时长.
    #[inline]
    pub fn stage_elapsed(&mut self, stage: Stage) -> Duration {
        self.timer(stage).elapsed()
    }

    /// 记录一次完整分割的总时长.
    #[inline]
    pub fn record_pipeline(&mut self, d: Duration) {
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
    }

    /// 记录区域生长得到的 feature 个数.
    #[inline]
    pub fn count_found(&mut self, n: u64) {
        self.found += n;
    }

    /// 记录孪晶合并吸收的 feature 个数.
    #[inline]
    pub fn count_merged(&mut self, n: u64) {
        self.merged += n;
    }

    /// 记录修复的体素个数.
    #[inline]
    pub fn count_healed(&mut self, n: u64) {
        self.healed += n;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 获得模型个数.
    #[inline]
    pub fn get_phantoms(&self) -> u64 {
        self.phantoms
    }

    /// 获得失败次数.
    #[inline]
    pub fn get_failed(&self) -> u64 {
        self.failed
    }

    /// 获得真值晶粒总数.
    #[inline]
    pub fn get_expected(&self) -> u64 {
        self.expected
    }

    /// 获得区域生长得到的 feature 总数.
    #[inline]
    pub fn get_found(&self) -> u64 {
        self.found
    }

    /// 获得孪晶合并吸收的 feature 总数.
    #[inline]
    pub fn get_merged(&self) -> u64 {
        self.merged
    }

    /// 获得修复的体素总数.
    #[inline]
    pub fn get_healed(&self) -> u64 {
        self.healed
    }

    /// 以微秒为单位获得 `stage` 阶段的总时间.
    #[inline]
    pub fn get_stage_time_us(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Grow => self.grow_time.get_total_us(),
            Stage::Twins => self.twins_time.get_total_us(),
            Stage::Heal => self.heal_time.get_total_us(),
        }
    }

    /// 以微秒为单位获得运行到目前的总自然时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.get_total_us()
    }

    /// 合并孪晶后 feature 数与真值晶粒数之比. 成功处理的模型为 0 时返回 `None`.
    pub fn get_over_segmentation(&self) -> Option<f64> {
        match self.expected {
            0 => None,
            e => Some((self.found - self.merged) as f64 / e as f64),
        }
    }

    /// 获取最耗时的一次完整分割所消耗的时间.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Profile, Stage};
    use std::time::Duration;

    #[test]
    fn test_profile_counters() {
        let mut p = Profile::new();
        assert_eq!(p.get_over_segmentation(), None);
        assert_eq!(p.get_most_time_consuming(), None);

        p.count_phantom(10);
        p.count_found(14);
        p.count_merged(2);
        p.record_pipeline(Duration::from_millis(3));
        p.record_pipeline(Duration::from_millis(1));
        p.stage_start(Stage::Grow);
        p.stage_elapsed(Stage::Grow);

        let p = p.finish();
        assert_eq!(p.get_phantoms(), 1);
        assert_eq!(p.get_over_segmentation(), Some(1.2));
        assert_eq!(p.get_most_time_consuming(), Some(Duration::from_millis(3)));
    }
}
