//! 分割后处理流程集合.

mod heal;
mod twins;

pub use heal::{
    fill_bad_data, fill_bad_data_cancellable, HealReport, HealSpec, VoxelAttributes,
};

pub use twins::{merge_twins, merge_twins_cancellable, TwinSpec};
