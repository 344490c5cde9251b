/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: question prompts only.
    Clean,
    /// Verbose output: skipped questions, current values, page banners.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Owns all wizard printing; the main loop only reads answers.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            header_printed: false,
        }
    }

    pub fn show_header(&mut self, form_key: &str, pages: usize) {
        if self.header_printed {
            return;
        }
        println!("Form: {} ({} pages)", form_key, pages);
        println!("Press enter to skip a question.");
        self.header_printed = true;
    }

    pub fn show_page(&self, index: usize, total: usize) {
        println!();
        println!("-- Page {}/{} --", index + 1, total);
    }

    pub fn show_skipped(&self, title: &str) {
        if self.verbosity.is_verbose() {
            println!("(hidden) {}", title);
        }
    }

    pub fn ask_input(&self, title: &str, prompt: &str, current: &str) {
        println!();
        println!("{}", title);
        if self.verbosity.is_verbose() && !current.is_empty() {
            println!("  current: {}", current);
        }
        print!("  {} ", prompt);
        flush();
    }

    pub fn ask_choice(&self, title: &str, choices: &[String], selected: &[String]) {
        println!();
        println!("{}", title);
        for (index, choice) in choices.iter().enumerate() {
            let marker = if selected.iter().any(|entry| entry == choice) {
                "*"
            } else {
                " "
            };
            println!("  {} {}) {}", marker, index + 1, choice);
        }
        print!("  pick a number (0 clears): ");
        flush();
    }

    pub fn ask_new_instance(&self, label: &str) {
        println!();
        print!("{}? [y/N] ", label);
        flush();
    }

    pub fn show_export(&self, exported: &str) {
        println!();
        println!("{}", exported);
    }

    pub fn show_saved(&self, path: &std::path::Path) {
        println!("Session saved to {}", path.display());
    }
}

fn flush() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}
