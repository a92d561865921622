//! Copy command

use anyhow::Result;
use shipami_lifecycle::CopyOptions;

use crate::cli::{Cli, CopyArgs, CopyFlags};
use crate::commands::Context;
use crate::output;

pub async fn run(args: &CopyArgs, cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;

    let spinner = output::spinner(&format!("Copying {}...", args.image_id));
    let result = ctx
        .operator()
        .copy(&args.image_id, &copy_options(&args.flags))
        .await;
    spinner.finish_and_clear();

    println!("{}", result?);
    Ok(())
}

/// Translate copy flags into operator options
pub(crate) fn copy_options(flags: &CopyFlags) -> CopyOptions {
    CopyOptions {
        source_region: flags.source_region.clone(),
        name: flags.name.clone(),
        name_suffix: None,
        description: flags.description.clone(),
        copy_tags: flags.copy_tags || !flags.no_copy_tags,
        copy_tags_to_snapshots: flags.copy_tags_to_snapshots,
        copy_permissions: flags.copy_permissions,
        wait: flags.wait,
        clean_name: !flags.no_clean,
    }
}
