use crate::style::Style;

/// Fixed-width report lines for command output.
pub struct Ui {
    style: Style,
    width: usize,
}

impl Ui {
    pub fn new(style: Style) -> Self {
        Self { style, width: 48 }
    }

    pub fn rule(&self) -> String {
        "-".repeat(self.width)
    }

    pub fn header(&self, title: &str) -> Vec<String> {
        vec![self.rule(), title.to_string(), self.rule()]
    }

    pub fn kv(&self, key: &str, value: &str) -> String {
        format!("{key:<18}: {value}")
    }

    pub fn ok_line(&self, message: &str) -> String {
        format!("{} {message}", self.style.ok())
    }

    pub fn failed_line(&self, message: &str) -> String {
        format!("{} {message}", self.style.failed())
    }

    pub fn info_line(&self, message: &str) -> String {
        format!("{} {message}", self.style.arrow())
    }

    /// `  • label.......... suffix`, padded so suffixes line up.
    pub fn list_item(&self, label: &str, suffix: &str) -> String {
        let label_width = 36usize;
        let dots = ".".repeat(label_width.saturating_sub(label.chars().count()));
        format!("  • {label}{dots} {suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::Ui;
    use crate::style::Style;

    #[test]
    fn list_items_align() {
        let ui = Ui::new(Style::plain());
        let a = ui.list_item("GatherCaseIDs", "2026-01-02 03:04:05");
        let b = ui.list_item("update_joins", "2026-01-02 03:04:06");
        assert_eq!(a.find("2026"), b.find("2026"));
        assert_eq!(ui.kv("applied", "3"), format!("{:<18}: 3", "applied"));
        assert_eq!(ui.ok_line("connected"), "✔ connected");
    }
}
