//! 取向差容差消融实验: 在合成多晶体上比较不同容差下的分割结果与耗时.

mod profile;
mod result;
mod runner;

fn main() {
    simple_logger::init_with_level(log::Level::Info).expect("Logger initialization error");
    runner::run().analyze();
}
