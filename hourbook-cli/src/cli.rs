use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use hourbook::domain::{DisplayHour, MetricField, Screen, ScopeFilter};

#[derive(Debug, Parser)]
#[command(name = "hourbook")]
#[command(about = "Review and correct hourly store analytics")]
pub struct Cli {
    /// Use seeded in-memory data instead of the analytics API
    #[arg(long, global = true)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print one day of hourly data with live totals
    Show(ViewArgs),
    /// Apply hourly corrections and save them
    Edit(EditArgs),
    /// Print config path and create default file if missing
    ConfigPath,
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    /// flow, heatmap or queue
    #[arg(long, default_value = "flow")]
    pub screen: Screen,

    /// Day to load, defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Camera, zone or cashier id, or "all"
    #[arg(long, default_value = "all")]
    pub scope: ScopeFilter,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    #[command(flatten)]
    pub view: ViewArgs,

    /// Edit as HH:field=value in display hours; an empty value clears the field
    #[arg(long = "set", value_name = "HH:FIELD=VALUE", required = true, value_parser = parse_edit)]
    pub edits: Vec<FieldEdit>,

    /// Show the projected result without saving
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldEdit {
    pub hour: DisplayHour,
    pub field: MetricField,
    pub value: String,
}

/// Parses `14:entered=15`, `14:00:entered=15` or `14:avgWaitTime=`.
pub fn parse_edit(s: &str) -> Result<FieldEdit, String> {
    let (target, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected HH:field=value, got {s:?}"))?;
    let (hour, field) = target
        .rsplit_once(':')
        .ok_or_else(|| format!("expected HH:field=value, got {s:?}"))?;

    let hour: DisplayHour = hour.parse().map_err(|e| format!("{e}"))?;
    let field: MetricField = field.parse()?;

    Ok(FieldEdit {
        hour,
        field,
        value: value.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_edit_with_padded_hour() {
        let edit = parse_edit("09:entered=15").unwrap();
        assert_eq!(edit.hour, DisplayHour::new(9).unwrap());
        assert_eq!(edit.field, MetricField::Entered);
        assert_eq!(edit.value, "15");
    }

    #[test]
    fn parses_edit_with_minutes_and_empty_value() {
        let edit = parse_edit("14:00:avgWaitTime=").unwrap();
        assert_eq!(edit.hour, DisplayHour::new(14).unwrap());
        assert_eq!(edit.field, MetricField::AvgWaitTime);
        assert_eq!(edit.value, "");
    }

    #[test]
    fn rejects_malformed_edits() {
        assert!(parse_edit("14entered=1").is_err());
        assert!(parse_edit("14:entered").is_err());
        assert!(parse_edit("25:entered=1").is_err());
        assert!(parse_edit("14:bogus=1").is_err());
    }

    #[test]
    fn edit_command_collects_every_set() {
        let cli = Cli::try_parse_from([
            "hourbook",
            "--dev",
            "edit",
            "--screen",
            "queue",
            "--scope",
            "cashier-1",
            "--set",
            "10:customers=4",
            "--set",
            "11:wait=30.5",
            "--dry-run",
        ])
        .unwrap();

        assert!(cli.dev);
        let Commands::Edit(args) = cli.command else {
            panic!("expected edit command");
        };
        assert_eq!(args.view.screen, Screen::Queue);
        assert_eq!(args.view.scope, ScopeFilter::entity("cashier-1"));
        assert_eq!(args.edits.len(), 2);
        assert_eq!(args.edits[1].field, MetricField::AvgWaitTime);
        assert!(args.dry_run);
    }

    #[test]
    fn edit_requires_at_least_one_set() {
        assert!(Cli::try_parse_from(["hourbook", "edit"]).is_err());
    }
}
