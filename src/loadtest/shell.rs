// ABOUTME: Blocking operator prompt: "q" quits, anything else is echoed back as unknown
// ABOUTME: Works over any BufRead/Write pair so it can be driven from stdin or from a test buffer

use std::io::{self, BufRead, Write};

const PROMPT: &str = "Press [q] to quit\n\n";

/// Why the shell stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    Quit,
    /// Input closed; treated like a quit
    EndOfInput,
}

pub struct InteractiveShell<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> InteractiveShell<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Prompt and read commands until "q" or end of input.
    ///
    /// Never touches the session.
    pub fn run(mut self) -> io::Result<ShellExit> {
        let mut line = String::new();
        loop {
            self.output.write_all(PROMPT.as_bytes())?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(ShellExit::EndOfInput);
            }

            let command = line.trim().to_lowercase();
            if command == "q" {
                writeln!(self.output, "Exiting...")?;
                return Ok(ShellExit::Quit);
            }
            writeln!(self.output, "Unknown command: {command}")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> (ShellExit, String) {
        let mut output = Vec::new();
        let exit = InteractiveShell::new(input.as_bytes(), &mut output).run().unwrap();
        (exit, String::from_utf8(output).unwrap())
    }

    #[test]
    fn q_quits() {
        let (exit, output) = run("q\n");
        assert_eq!(exit, ShellExit::Quit);
        assert_eq!(output, "Press [q] to quit\n\nExiting...\n");
    }

    #[test]
    fn unknown_commands_are_echoed_and_prompt_repeats() {
        let (exit, output) = run("status\nQ\n");
        assert_eq!(exit, ShellExit::Quit);
        assert_eq!(
            output,
            "Press [q] to quit\n\nUnknown command: status\nPress [q] to quit\n\nExiting...\n"
        );
    }

    #[test]
    fn end_of_input_stops_the_shell() {
        let (exit, output) = run("help");
        assert_eq!(exit, ShellExit::EndOfInput);
        assert!(output.ends_with("Unknown command: help\nPress [q] to quit\n\n"));
    }
}
