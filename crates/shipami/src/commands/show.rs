//! Show command

use anyhow::Result;
use shipami_lifecycle::ImageDetail;

use crate::cli::{Cli, ShowArgs};
use crate::commands::Context;
use crate::output;

pub async fn run(args: &ShowArgs, cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let details = ctx.query().show(&args.image_ids).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }

    for detail in &details {
        print_detail(detail);
    }

    Ok(())
}

fn print_detail(detail: &ImageDetail) {
    let image = &detail.image;
    output::header(&image.id);
    output::kv("Name", &image.name);
    output::kv("State", &output::state(image.state));
    if let Some(created) = image.creation_date {
        output::kv("Created", &created.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
    if let Some(description) = &image.description {
        output::kv("Description", description);
    }

    let lineage = &detail.lineage;
    output::kv("Managed", if lineage.managed { "yes" } else { "no" });
    if let Some(release) = &lineage.release {
        output::kv("Release", release);
    }
    if let Some(parent) = &lineage.copied_from {
        output::kv("Copied from", &parent.to_string());
    }
    for child in lineage.copied_to.iter() {
        output::kv("Copied to", &child.to_string());
    }

    if !image.tags.is_empty() {
        println!("\nTags:");
        for tag in &image.tags {
            output::kv(&tag.key, &tag.value);
        }
    }

    println!("\nShares:");
    if detail.shares.is_empty() {
        output::kv("Launch permission", "private");
    }
    for principal in &detail.shares {
        output::kv("Launch permission", &principal.to_string());
    }
    output::kv(
        "Marketplace",
        if detail.marketplace_shared { "shared" } else { "not shared" },
    );
}
