use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_banner() {
    println!();
    println!(
        "{}",
        style(" flink-job-manager ").bold().black().on_cyan()
    );
    println!(
        "{}\n",
        style("Keeps behavior and rule pipelines running on Flink SQL.").cyan()
    );
}

/// A titled block of aligned help lines.
pub struct GuideSection {
    title: String,
    lines: Vec<String>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.lines.push(format!(
            "  {} {}",
            style(format!("{:<32}", name)).green(),
            description
        ));
        self
    }

    pub fn status(mut self, label: &str, value: &str) -> Self {
        self.lines
            .push(format!("  {}: {}", style(label).bold().cyan(), value));
        self
    }

    pub fn blank(mut self) -> Self {
        self.lines.push(String::new());
        self
    }

    pub fn print(self) {
        println!("{} {}", SPARKLE, style(&self.title).bold());
        for line in &self.lines {
            println!("{}", line);
        }
        println!();
    }
}

pub fn print_goodbye() {
    println!(
        "\n{} {}",
        SPARKLE,
        style("flink-job-manager stopped.").bold().cyan()
    );
}
