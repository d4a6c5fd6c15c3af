use hourbook::domain::{DailySnapshot, FieldKind, MetricField};
use hourbook::ports::AnalyticsBackend;
use hourbook::{HourlyEditSession, RowView};

fn format_value(field: MetricField, value: f64) -> String {
    match field.kind() {
        FieldKind::Count => field.render(value),
        FieldKind::Duration => format!("{value:.1}s"),
    }
}

fn status(row: &RowView) -> String {
    match &row.editable {
        Ok(()) => String::new(),
        Err(reason) => format!("  ({reason})"),
    }
}

fn row_line(row: &RowView) -> String {
    let marker = if row.edited { '*' } else { ' ' };
    let cells = row
        .cells
        .iter()
        .map(|cell| {
            let text = cell.text();
            let text = if text.is_empty() { "-".to_string() } else { text };
            format!("{:>14}", text)
        })
        .collect::<String>();
    format!("{marker} {}:00{cells}{}", row.hour, status(row))
}

pub fn print_rows<B: AnalyticsBackend + ?Sized>(session: &HourlyEditSession<B>) {
    let Some(snapshot) = session.snapshot() else {
        println!("No data loaded.");
        return;
    };
    let window = session.settings().window;
    println!(
        "{} {} [{}] hours {}:00-{}:00",
        snapshot.screen(),
        snapshot.date(),
        snapshot.scope(),
        window.start(),
        window.end()
    );

    let header = snapshot
        .screen()
        .fields()
        .iter()
        .map(|field| format!("{:>14}", field.wire_name()))
        .collect::<String>();
    println!("  hour {header}");

    let rows = session.display_rows();
    if rows.is_empty() {
        println!("  (no hourly data in this window)");
    }
    for row in &rows {
        println!("{}", row_line(row));
    }
}

pub fn print_totals<B: AnalyticsBackend + ?Sized>(session: &HourlyEditSession<B>) {
    let totals = session.projected_totals();
    if totals.is_empty() {
        return;
    }
    let line = totals
        .iter()
        .map(|(field, value)| format!("{field}={}", format_value(*field, *value)))
        .collect::<Vec<_>>()
        .join("  ");
    let suffix = if session.is_dirty() { " (with pending edits)" } else { "" };
    println!("Totals: {line}{suffix}");
}

pub fn print_stats(snapshot: &DailySnapshot) {
    if !snapshot.overall_stats.is_empty() {
        let line = snapshot
            .overall_stats
            .iter()
            .map(|(field, value)| format!("{field}={}", format_value(*field, *value)))
            .collect::<Vec<_>>()
            .join("  ");
        println!("Server stats: {line}");
    }
    if let Some(zone) = &snapshot.busiest_zone {
        println!("Busiest zone: {zone}");
    }
    for (field, stats) in &snapshot.comparison_stats {
        for stat in stats {
            let change = stat
                .change_percent
                .map(|c| format!("{c:+.1}%"))
                .unwrap_or_else(|| "n/a".to_string());
            println!("{field} vs {}: {change}", stat.period);
        }
    }
    if !snapshot.available_scopes.is_empty() {
        println!("Scopes: all, {}", snapshot.available_scopes.join(", "));
    }
}
