pub mod apply;
pub mod plan;
pub mod show;

use anyhow::Result;
use paramkit::DesiredState;
use std::path::Path;

use crate::config::DesiredConfig;
use crate::store::FileGroup;

/// Desired file, its resolved state, and the live group it targets
pub struct Loaded {
    pub config: DesiredConfig,
    pub desired: DesiredState,
    pub group: FileGroup,
}

/// Load the desired state file and the live group file it applies to
pub fn load(desired_path: &Path, state_path: &Path) -> Result<Loaded> {
    let config = DesiredConfig::load(desired_path)?;
    let desired = config.desired_state()?;
    let limits = config.apply_options(false).limits;
    let group = FileGroup::load_or_create(
        state_path,
        &config.name,
        &config.family,
        config.matching(),
        limits,
    )?;

    Ok(Loaded {
        config,
        desired,
        group,
    })
}
