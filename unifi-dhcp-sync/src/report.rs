use colored::Colorize;
use reservation_diff_core::{
    format_plan_summary, format_plan_text, format_report_text, EnvironmentConfig,
    ReconciliationPlan, ReservationSet, RunReport,
};

/// Render a plan for terminal output.
pub fn render_plan(plan: &ReconciliationPlan, include_unchanged: bool) -> String {
    let raw = format_plan_text(plan, include_unchanged);
    let mut out = Vec::new();

    for line in raw.lines() {
        let colored = if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with('~') {
            line.yellow().to_string()
        } else if line.starts_with('!') {
            line.magenta().bold().to_string()
        } else if line.starts_with('=') {
            line.dimmed().to_string()
        } else {
            line.to_string()
        };
        out.push(colored);
    }

    out.join("\n")
}

/// Render bucket counts for terminal output.
pub fn render_plan_summary(plan: &ReconciliationPlan) -> String {
    format_plan_summary(plan).cyan().to_string()
}

/// Render per-change outcomes and the result line.
pub fn render_report(report: &RunReport) -> String {
    let raw = format_report_text(report);
    let mut out = Vec::new();

    for line in raw.lines() {
        let colored = if line.starts_with("APPLIED") {
            line.green().to_string()
        } else if line.starts_with("FAILED") || line.starts_with("aborted") {
            line.red().to_string()
        } else if line.starts_with("SKIPPED") {
            line.yellow().to_string()
        } else if line.starts_with("result") {
            line.cyan().to_string()
        } else {
            line.to_string()
        };
        out.push(colored);
    }

    out.join("\n")
}

/// Render reservations as an aligned table in MAC order.
pub fn render_reservations(set: &ReservationSet) -> String {
    let rows: Vec<[String; 4]> = set
        .iter()
        .map(|r| {
            [
                r.mac_address.to_string(),
                r.ip_address.to_string(),
                r.hostname.clone(),
                r.description.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let header = ["MAC", "IP", "HOSTNAME", "DESCRIPTION"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: [&str; 4]| {
        format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {}",
            cells[0],
            cells[1],
            cells[2],
            cells[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2]
        )
        .trim_end()
        .to_string()
    };

    let mut out = vec![line(header).bold().to_string()];
    for row in &rows {
        out.push(line([
            row[0].as_str(),
            row[1].as_str(),
            row[2].as_str(),
            row[3].as_str(),
        ]));
    }
    out.push(format!("{} reservations", rows.len()).cyan().to_string());
    out.join("\n")
}

/// One line per configured environment. Shows the credential reference, never its value.
pub fn render_environments(configs: &[EnvironmentConfig]) -> String {
    if configs.is_empty() {
        return "no environments configured".yellow().to_string();
    }
    configs
        .iter()
        .map(|c| {
            format!(
                "{} ({}) site={} url={} key={}",
                c.id.bold(),
                c.display_name,
                c.host_label,
                c.base_url,
                c.api_key_env
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
