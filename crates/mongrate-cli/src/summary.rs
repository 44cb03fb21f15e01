use mongrate_config::AppConfig;
use mongrate_migrator::MigrationPlan;

const WIDTH: usize = 70;
const LEFT_W: usize = 20;

/// Print the status box: target, history collection and what would run.
pub fn print_status(config: &AppConfig, collection: &str, plan: &MigrationPlan) {
    for line in status_lines(config, collection, plan) {
        println!("{line}");
    }
}

fn status_lines(config: &AppConfig, collection: &str, plan: &MigrationPlan) -> Vec<String> {
    let version = env!("CARGO_PKG_VERSION");
    let right_w = WIDTH - LEFT_W - 6; // 6 for "│ ", " │ " and "│"

    let title = format!("Mongrate v{version}");
    let title_dashes = WIDTH - 2 - title.len() - 5; // 2 for ╭╮, 5 for "─── " + " "
    let top = format!("╭─── {title} {}╮", "─".repeat(title_dashes));
    let bottom = format!("╰{}╯", "─".repeat(WIDTH - 2));

    let row = |l: &str, r: &str| {
        format!(
            "│ {:<LEFT_W$} │ {:<right_w$}│",
            l,
            truncate(r, right_w)
        )
    };

    let strict = if config.migration.fail_on_order_mismatch {
        "strict"
    } else {
        "lenient"
    };

    let mut lines = vec![
        top,
        row("Database", &format!("{}/{}", redact(&config.database.uri), config.database.name)),
        row("Scripts", &config.migration.scripts_dir.display().to_string()),
        row("History", collection),
        row("Order check", strict),
        row("Applied", &plan.applied.len().to_string()),
        row("Pending", &plan.pending.len().to_string()),
    ];

    if !plan.pending.is_empty() {
        lines.push(row("", &"─".repeat(right_w - 2)));
        for (i, pending) in plan.pending.iter().enumerate() {
            let label = if i == 0 { "Will run" } else { "" };
            lines.push(row(label, &pending.script_id));
        }
    }

    lines.push(bottom);
    lines
}

/// Hide credentials embedded in a connection string.
fn redact(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &uri[..scheme_end], &uri[at..])
        }
        _ => uri.to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
