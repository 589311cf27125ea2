//! 实验结果.

use crate::profile::{Profile, Stage};
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(tolerance_deg: f64, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.4}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Tolerance {tolerance_deg}°:")?;
    writeln!(w, "{S4}Phantoms: {} ({} failed)", p.get_phantoms(), p.get_failed())?;
    writeln!(w, "{S4}Ground-truth grains: {}", p.get_expected())?;
    writeln!(w, "{S4}Grown features: {}", p.get_found())?;
    writeln!(w, "{S4}Merged as twins: {}", p.get_merged())?;
    writeln!(
        w,
        "{S4}Over-segmentation ratio: {}",
        f64_to_display(p.get_over_segmentation())
    )?;
    writeln!(w, "{S4}Healed voxels: {}", p.get_healed())?;
    writeln!(w, "{S4}Grow time: {} us", p.get_stage_time_us(Stage::Grow))?;
    writeln!(w, "{S4}Twin merging time: {} us", p.get_stage_time_us(Stage::Twins))?;
    writeln!(w, "{S4}Healing time: {} us", p.get_stage_time_us(Stage::Heal))?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    let t = p.get_most_time_consuming().map(|d| d.as_micros().to_string());
    write!(
        w,
        "{S4}Most time-consuming pipeline costs {} us",
        t.as_deref().unwrap_or("/")
    )?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(f64, Profile)>,
}

impl AblationResult {
    pub fn from_iter<I: IntoIterator<Item = (f64, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 将全部结果写进 `w` 中.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        utils::sep_to(&mut w)?;
        for (tolerance, profile) in self.data.iter() {
            describe_into(*tolerance, profile, &mut w)?;
            writeln!(w)?;
            utils::sep_to(&mut w)?;
        }
        Ok(())
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        if let Err(e) = self.write_to(io::stdout().lock()) {
            log::error!("Failed to print ablation result: {e}");
        }
    }
}
