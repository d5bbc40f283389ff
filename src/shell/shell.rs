use std::error::Error;
use std::io::Write;

use log::{debug, error, warn};

use crate::shell::executor::{ignore_interrupts, Executor};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::utils::config::Config;
use crate::utils::theme::{load_theme, Theme};

/// The command-line dispatcher: owns the prompt loop, recognizes the
/// built-in terminate command and routes each line to the single-command or
/// pipeline runner.
pub struct Shell<'a> {
    config: &'a Config,
    theme: Theme,
    executor: Executor,
    readline: ReadlineManager<'a>,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            theme: load_theme(&config.theme),
            executor: Executor::new(config.command_root.clone()),
            readline: ReadlineManager::new(config),
        }
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("starting nutsh...");
        // The shell must survive a Ctrl-C aimed at its foreground child.
        ignore_interrupts()?;
        self.readline.load_history()?;

        println!(
            "{}",
            (self.theme.success_style)(self.theme.welcome_message.clone())
        );
        debug!(
            "nutsh ready, command root {}",
            self.config.command_root.display()
        );

        self.run_loop()?;
        self.readline.save_history()?;

        debug!("leaving nutsh...");
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            std::io::stdout().flush()?;
            let prompt = self.theme.prompt.clone();

            match self.readline.readline(&prompt) {
                Ok(line) => {
                    if line.trim() == "exit" {
                        println!(
                            "{}",
                            (self.theme.success_style)(self.theme.exit_message.clone())
                        );
                        break;
                    }
                    self.handle_line(&line)?;
                }
                Err(ReadlineError::Eof) => {
                    warn!("received EOF, leaving nutsh...");
                    println!(
                        "\n{}",
                        (self.theme.success_style)(self.theme.exit_message.clone())
                    );
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    warn!("interrupted at the prompt...");
                }
                Err(err) => {
                    error!("readline error: {}", err);
                    eprintln!(
                        "{} {}",
                        self.theme.error_symbol,
                        (self.theme.error_style)(err.to_string())
                    );
                }
            }
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Result<(), Box<dyn Error>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        self.readline.add_history(line.to_string())?;
        debug!("dispatching: {}", line);

        // Only the first pipe is significant; everything after it, further
        // pipes included, belongs to the right segment.
        let result = match line.split_once('|') {
            Some((left, right)) => self.executor.run_pipeline(left, right),
            None => self.executor.run_single(line),
        };

        match result {
            Ok(0) => {
                println!(
                    "{} {}",
                    self.theme.success_symbol,
                    (self.theme.success_style)(String::from("done"))
                );
            }
            Ok(code) => {
                eprintln!(
                    "{} {}",
                    self.theme.error_symbol,
                    (self.theme.error_style)(format!("command exited with code {}", code))
                );
            }
            Err(err) => {
                error!("command failed: {}", err);
                eprintln!(
                    "{} {}",
                    self.theme.error_symbol,
                    (self.theme.error_style)(err.to_string())
                );
            }
        }
        Ok(())
    }
}
