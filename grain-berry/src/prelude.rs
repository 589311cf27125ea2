//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::{Cancellation, Completion, ConfigError, SegmentError, SegmentResult};
pub use crate::{CellData, Comparison, Feature, FeatureSet, GridAddressing, GridShape, VoxelGrid};

pub use crate::consts::{angle, label, VoxelState};

pub use crate::orientation::{LaueClass, Misorientation, OrientationOps, Quat, SymmetryOps};

pub use crate::segment::{grow, GroupingPredicate, GrowSpec, MisorientationGrouping, SeedStrategy};

pub use crate::post_proc::{fill_bad_data, merge_twins, HealReport, HealSpec, TwinSpec};

pub use crate::phantom::PhantomBuilder;
