//! Delete command

use anyhow::Result;

use crate::cli::{Cli, DeleteArgs};
use crate::commands::Context;

pub async fn run(args: &DeleteArgs, cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let operator = ctx.operator();

    // One at a time so every deletion is reported before a failure aborts the batch
    for image_id in &args.image_ids {
        for deleted in operator
            .delete(std::slice::from_ref(image_id), args.force)
            .await?
        {
            println!("{}", deleted);
        }
    }

    Ok(())
}
