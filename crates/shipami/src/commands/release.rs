//! Release command

use anyhow::Result;

use crate::cli::{Cli, ReleaseArgs};
use crate::commands::copy::copy_options;
use crate::commands::Context;
use crate::output;

pub async fn run(args: &ReleaseArgs, cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;

    let spinner = output::spinner(&format!(
        "Releasing {} as {}...",
        args.image_id, args.release
    ));
    let result = ctx
        .operator()
        .release(&args.image_id, &args.release, &copy_options(&args.flags))
        .await;
    spinner.finish_and_clear();

    println!("{}", result?);
    Ok(())
}
