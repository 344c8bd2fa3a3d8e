use console::style;
use std::io::Write;

use crate::pipeline::GenerationEvent;

/// Terminal rendering for CLI commands
pub struct Output {
    quiet: bool,
}

impl Output {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn status(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("›").cyan(), style(message).dim());
        }
    }

    pub fn section(&self, title: &str) {
        println!("\n{}", style(title).bold());
        println!("{}", "─".repeat(40));
    }

    /// Stream a fragment without a trailing newline
    pub fn fragment(&self, text: &str) {
        if self.quiet {
            return;
        }
        eprint!("{}", style(text).dim());
        let _ = std::io::stderr().flush();
    }

    /// Human rendering of one pipeline event
    pub fn event(&self, event: &GenerationEvent) {
        match event {
            GenerationEvent::MappingSent { message } => {
                // explanation fragments leave the cursor mid-line
                if !self.quiet {
                    eprintln!();
                }
                self.status(message);
            }
            GenerationEvent::Started { message }
            | GenerationEvent::ExplanationSent { message }
            | GenerationEvent::DiagramSent { message }
            | GenerationEvent::Explanation { message }
            | GenerationEvent::Mapping { message }
            | GenerationEvent::Diagram { message } => self.status(message),
            GenerationEvent::ExplanationChunk { chunk } => self.fragment(chunk),
            GenerationEvent::MappingChunk { .. } | GenerationEvent::DiagramChunk { .. } => {}
            GenerationEvent::Complete {
                diagram, clicks, ..
            } => {
                self.section("Diagram");
                println!("{}", diagram);
                self.success(&format!("Diagram ready ({} linked components)", clicks.len()));
            }
            GenerationEvent::Error { error } => {
                if !self.quiet {
                    eprintln!();
                }
                self.error(error);
            }
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
