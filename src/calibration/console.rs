use std::{
    fmt,
    io::{BufRead, Write},
};

use anyhow::bail;

/// Line-based interaction with the user.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    /// Prints a line of text.
    pub fn say(&mut self, msg: impl fmt::Display) -> anyhow::Result<()> {
        writeln!(self.output, "{msg}")?;
        Ok(())
    }

    /// Prints `prompt` (without a newline) and reads the answer.
    ///
    /// Only the line terminator is removed from the answer. Running out of input is an error.
    pub fn prompt(&mut self, prompt: &str) -> anyhow::Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("unexpected end of input");
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    /// Asks for the user's palm width in cm until a positive number is entered.
    pub fn read_hand_width(&mut self) -> anyhow::Result<f64> {
        loop {
            let answer =
                self.prompt("Please enter your hand width in cm (measure across your palm): ")?;
            match answer.trim().parse::<f64>() {
                Ok(width) if width.is_finite() && width > 0.0 => return Ok(width),
                Ok(_) => self.say("Please enter a positive number.")?,
                Err(_) => self.say("Invalid input. Please enter a number.")?,
            }
        }
    }

    /// Asks whether to reuse the stored calibration until `y` or `n` is entered.
    pub fn ask_reuse(&mut self) -> anyhow::Result<bool> {
        loop {
            let answer = self
                .prompt("Use previous calibration (y) or run new calibration (n)? [y/n]: ")?
                .to_lowercase();
            match answer.as_str() {
                "y" => return Ok(true),
                "n" => return Ok(false),
                _ => self.say("Invalid choice. Please enter 'y' or 'n'.")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console(input: &str) -> Console<&[u8], Vec<u8>> {
        Console::new(input.as_bytes(), Vec::new())
    }

    fn output(console: &Console<&[u8], Vec<u8>>) -> String {
        String::from_utf8(console.output().clone()).unwrap()
    }

    #[test]
    fn hand_width_reprompts() {
        let mut c = console("abc\n-2\n0\n\ninf\n8.5\n");
        assert_eq!(c.read_hand_width().unwrap(), 8.5);

        let out = output(&c);
        assert_eq!(
            out.matches("Please enter your hand width in cm (measure across your palm): ")
                .count(),
            6
        );
        assert_eq!(out.matches("Invalid input. Please enter a number.").count(), 2);
        assert_eq!(out.matches("Please enter a positive number.").count(), 3);
    }

    #[test]
    fn hand_width_allows_surrounding_whitespace() {
        let mut c = console("  7.25 \r\n");
        assert_eq!(c.read_hand_width().unwrap(), 7.25);
    }

    #[test]
    fn reuse_answer_is_case_insensitive() {
        assert!(console("Y\n").ask_reuse().unwrap());
        assert!(!console("N\r\n").ask_reuse().unwrap());
    }

    #[test]
    fn reuse_reprompts_on_invalid_choice() {
        let mut c = console("yes\n y\n\nn\n");
        assert!(!c.ask_reuse().unwrap());
        assert_eq!(
            output(&c)
                .matches("Invalid choice. Please enter 'y' or 'n'.")
                .count(),
            3
        );
    }

    #[test]
    fn eof_is_an_error() {
        assert!(console("").read_hand_width().is_err());
        assert!(console("maybe\n").ask_reuse().is_err());
    }
}
