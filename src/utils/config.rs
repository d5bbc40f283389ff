use dotenv::dotenv;
use log::warn;
use std::env;
use std::fs;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub command_root: PathBuf,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/nutsh")
        } else {
            PathBuf::from("tmp")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("nutsh"),
            command_root: PathBuf::from("/bin"),
            theme: String::from("default"),
            history_file: config_dir.join(".nutsh_history"),
            editor_mode: String::from("vi"),
            logger_level: String::from("warn"),
            logger_dir: config_dir.join("logs"),
        }
    }

    pub fn new() -> Self {
        // Environment files take precedence over the built-in defaults.
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(root) = env::var("NUTSH_ROOT") {
            config.command_root = PathBuf::from(shellexpand::tilde(&root).into_owned());
        }

        if let Ok(theme) = env::var("NUTSH_THEME") {
            config.theme = theme;
        }

        if let Ok(editor) = env::var("NUTSH_EDITOR") {
            config.editor_mode = editor;
        }

        if let Ok(history) = env::var("NUTSH_HISTORY") {
            config.history_file = PathBuf::from(shellexpand::tilde(&history).into_owned());
        }

        if let Ok(level) = env::var("NUTSH_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("NUTSH_LOG_DIR") {
            config.logger_dir = PathBuf::from(shellexpand::tilde(&dir).into_owned());
        }

        // The history directory has to exist before rustyline saves into it.
        if let Some(parent) = config.history_file.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!("could not create history directory: {}", err);
            }
        }

        config
    }
}
