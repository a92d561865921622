//! List command

use anyhow::Result;
use shipami_lifecycle::ImageSummary;

use crate::cli::{Cli, ListArgs};
use crate::commands::Context;
use crate::output;

pub async fn run(args: &ListArgs, cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;

    let spinner = (!args.json).then(|| output::spinner("Listing images..."));
    let summaries = ctx.query().list().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let summaries = select(summaries?, args);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    let (managed, unmanaged): (Vec<_>, Vec<_>) =
        summaries.iter().partition(|summary| summary.lineage.managed);

    if !args.unmanaged {
        output::header("Managed images");
        for summary in &managed {
            print_managed(summary);
        }
    }

    if !args.managed {
        output::header("Unmanaged images");
        for summary in &unmanaged {
            println!("\t{}:\t{}", summary.id, summary.name);
        }
    }

    Ok(())
}

/// Apply the managed/unmanaged filter and order by creation date
fn select(mut summaries: Vec<ImageSummary>, args: &ListArgs) -> Vec<ImageSummary> {
    summaries.retain(|summary| {
        (!args.managed || summary.lineage.managed) && (!args.unmanaged || !summary.lineage.managed)
    });
    // undated images sort first
    summaries.sort_by(|a, b| a.creation_date.cmp(&b.creation_date));
    summaries
}

fn print_managed(summary: &ImageSummary) {
    let mut line = format!(
        "\t{}:\t{} {}",
        summary.id,
        summary.name,
        output::state(summary.state)
    );
    if let Some(release) = &summary.lineage.release {
        line.push_str(&format!(" release: {}", release));
    }
    if let Some(parent) = &summary.lineage.copied_from {
        line.push_str(&format!(" from: {}", parent));
    }
    if !summary.lineage.copied_to.is_empty() {
        line.push_str(&format!(" to: {}", summary.lineage.copied_to));
    }
    println!("{}", line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shipami_core::ImageState;
    use shipami_lifecycle::LineageInfo;

    fn summary(id: &str, managed: bool, day: Option<u32>) -> ImageSummary {
        ImageSummary {
            id: id.to_string(),
            name: format!("{}-name", id),
            state: ImageState::Available,
            creation_date: day.map(|d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()),
            lineage: LineageInfo {
                managed,
                ..Default::default()
            },
        }
    }

    fn args(managed: bool, unmanaged: bool) -> ListArgs {
        ListArgs {
            json: false,
            managed,
            unmanaged,
        }
    }

    fn ids(summaries: &[ImageSummary]) -> Vec<&str> {
        summaries.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_sorted_by_creation_date() {
        let selected = select(
            vec![
                summary("ami-c", true, Some(3)),
                summary("ami-a", false, Some(1)),
                summary("ami-x", false, None),
                summary("ami-b", true, Some(2)),
            ],
            &args(false, false),
        );

        assert_eq!(ids(&selected), vec!["ami-x", "ami-a", "ami-b", "ami-c"]);
    }

    #[test]
    fn test_managed_filter() {
        let all = || {
            vec![
                summary("ami-a", true, Some(1)),
                summary("ami-b", false, Some(2)),
            ]
        };

        assert_eq!(ids(&select(all(), &args(true, false))), vec!["ami-a"]);
        assert_eq!(ids(&select(all(), &args(false, true))), vec!["ami-b"]);
    }
}
