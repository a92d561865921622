//! Share command

use anyhow::Result;

use crate::cli::{Cli, ShareArgs};
use crate::commands::Context;
use crate::output;

pub async fn run(args: &ShareArgs, cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;

    let principal = match &args.account_id {
        Some(account_id) => account_id.clone(),
        None => format!("AWS Marketplace ({})", ctx.config().marketplace.account_id),
    };

    ctx.operator()
        .share(&args.image_id, args.account_id.as_deref(), args.remove)
        .await?;

    if args.remove {
        output::success(&format!("Revoked {} access to {}", principal, args.image_id));
    } else {
        output::success(&format!("Shared {} with {}", args.image_id, principal));
    }
    Ok(())
}
