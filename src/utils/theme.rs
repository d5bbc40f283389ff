use colored::Colorize;
use rand::seq::SliceRandom;

const WELCOME_LINES: &[&str] = &[
    "everything you need, in a nutshell",
    "two processes and a pipe ought to be enough for anybody",
    "type a command, or `exit` when you have had enough",
];

pub struct Theme {
    pub prompt: String,
    pub success_symbol: String,
    pub error_symbol: String,
    pub welcome_message: String,
    pub exit_message: String,
    pub error_style: Box<dyn Fn(String) -> String>,
    pub success_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        let welcome = WELCOME_LINES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(WELCOME_LINES[0]);
        Theme {
            prompt: "nutsh> ".bright_cyan().to_string(),
            success_symbol: "✓".bright_green().to_string(),
            error_symbol: "✗".red().to_string(),
            welcome_message: welcome.bright_cyan().to_string(),
            exit_message: "see you next time".bright_blue().to_string(),
            error_style: Box::new(|s| s.bright_red().to_string()),
            success_style: Box::new(|s| s.bright_green().to_string()),
        }
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "default" => Theme::default(),
        "plain" => Theme {
            prompt: "nutsh> ".to_string(),
            success_symbol: "ok".to_string(),
            error_symbol: "!!".to_string(),
            welcome_message: WELCOME_LINES[0].to_string(),
            exit_message: "see you next time".to_string(),
            error_style: Box::new(|s| s),
            success_style: Box::new(|s| s),
        },
        _ => Theme::default(),
    }
}
