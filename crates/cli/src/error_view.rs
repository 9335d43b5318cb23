use crate::error::CliError;
use crate::output;
use crate::style::{Color, Style};
use crate::ui::Ui;

pub fn render(err: &CliError, style: Style) -> Vec<String> {
    let ui = Ui::new(style);
    let mut lines = vec![
        ui.rule(),
        style.paint_stderr(Color::Red, &format!("predms: {}", err.title())),
        String::new(),
    ];

    let sections = [
        ("Reason", err.reason()),
        ("What this means", err.meaning()),
        ("Suggested action", err.action()),
    ];
    for (heading, body) in sections {
        if let Some(body) = body {
            lines.push(format!("{heading}:"));
            lines.extend(body.lines().map(|l| format!("  {l}")));
            lines.push(String::new());
        }
    }

    lines.push(format!("exit code {}", err.exit_code()));
    lines.push(ui.rule());
    lines
}

pub fn print(err: &CliError) {
    for line in render(err, Style::detect()) {
        output::error(line);
    }
}
