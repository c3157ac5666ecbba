use pinning_core::pipeline::RunReport;

const PIN_HEADERS: [&str; 6] = ["FILE", "JOB", "STEP", "ACTION", "FROM", "COMMIT"];

pub fn print_report_json(report: &RunReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// One row per pinned `uses:` value. Prints nothing when nothing was pinned.
pub fn print_pins(report: &RunReport) {
    let lines = pin_lines(report);
    for line in &lines {
        println!("{line}");
    }
}

fn pin_lines(report: &RunReport) -> Vec<String> {
    let rows: Vec<[String; 6]> = report
        .fixed
        .iter()
        .flat_map(|file| {
            let name = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.path.display().to_string());
            file.pins.iter().map(move |pin| {
                [
                    name.clone(),
                    pin.job.clone(),
                    pin.step.to_string(),
                    pin.action.clone(),
                    pin.from.clone(),
                    pin.commit.clone(),
                ]
            })
        })
        .collect();
    if rows.is_empty() {
        return Vec::new();
    }

    let mut widths = PIN_HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(render(&PIN_HEADERS, &widths));
    lines.push(render(&widths.map(|w| "-".repeat(w)), &widths));
    for row in &rows {
        lines.push(render(row, &widths));
    }
    lines
}

fn render<S: AsRef<str>>(cells: &[S], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:width$}", cell.as_ref(), width = *width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}
