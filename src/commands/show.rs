use anyhow::Result;
use paramkit::{BatchLimits, NameMatching};
use std::path::Path;

use crate::store::FileGroup;
use crate::ui;

/// Print the live parameter group stored at `state_path`
pub fn run(state_path: &Path, json: bool) -> Result<()> {
    let group = FileGroup::load(state_path, NameMatching::default(), BatchLimits::default())?;

    if json {
        println!("{}", serde_json::to_string_pretty(group.data())?);
    } else {
        ui::display_group(group.data());
    }

    Ok(())
}
