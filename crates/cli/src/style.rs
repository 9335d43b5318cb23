use std::io::IsTerminal;

#[derive(Clone, Copy)]
pub enum Color {
    Green,
    Yellow,
    Red,
}

/// ANSI colouring, off when `NO_COLOR` is set or the stream is not a terminal.
#[derive(Clone, Copy)]
pub struct Style {
    use_color_stdout: bool,
    use_color_stderr: bool,
}

impl Style {
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some();

        Self {
            use_color_stdout: !no_color && std::io::stdout().is_terminal(),
            use_color_stderr: !no_color && std::io::stderr().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self {
            use_color_stdout: false,
            use_color_stderr: false,
        }
    }

    pub fn ok(&self) -> String {
        self.paint_stdout(Color::Green, "✔")
    }

    pub fn failed(&self) -> String {
        self.paint_stdout(Color::Red, "✘")
    }

    pub fn arrow(&self) -> String {
        self.paint_stdout(Color::Yellow, "→")
    }

    pub fn paint_stdout(&self, color: Color, text: &str) -> String {
        if self.use_color_stdout {
            paint(color, text)
        } else {
            text.to_string()
        }
    }

    pub fn paint_stderr(&self, color: Color, text: &str) -> String {
        if self.use_color_stderr {
            paint(color, text)
        } else {
            text.to_string()
        }
    }
}

fn paint(color: Color, text: &str) -> String {
    let code = match color {
        Color::Green => "32",
        Color::Yellow => "33",
        Color::Red => "31",
    };

    format!("\u{1b}[{code}m{text}\u{1b}[0m")
}
