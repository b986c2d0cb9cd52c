use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, BufRead, IsTerminal, Write};

/// Characters of the key left visible after F2 is pressed.
const REVEAL_TAIL_CHARS: usize = 4;

fn read_answer(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut input = String::new();
    let read = io::stdin().lock().read_line(&mut input)?;
    if read == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before an answer was given",
        ));
    }
    Ok(input)
}

/// Ask for an API key on the terminal. The key is masked while typed; piped
/// input is read as a plain line.
pub fn prompt_token(prompt: &str) -> io::Result<String> {
    if io::stdin().is_terminal() {
        prompt_masked_input(prompt, REVEAL_TAIL_CHARS).map(|token| token.trim().to_string())
    } else {
        read_answer(prompt).map(|token| token.trim().to_string())
    }
}

/// Ask a yes/no question; anything but an explicit yes counts as no.
pub fn prompt_confirmation(question: &str) -> io::Result<bool> {
    let answer = read_answer(&format!("{question} (y/N): "))?;
    Ok(parse_confirmation(&answer))
}

fn parse_confirmation(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct MaskedInput {
    text: String,
    reveal_tail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MaskedOutcome {
    Continue,
    Submit(String),
    Cancelled,
}

impl MaskedInput {
    fn apply(&mut self, key: &KeyEvent) -> MaskedOutcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => MaskedOutcome::Submit(std::mem::take(&mut self.text)),
            KeyCode::Esc => MaskedOutcome::Cancelled,
            KeyCode::Char('c') if ctrl => MaskedOutcome::Cancelled,
            KeyCode::Char('u') if ctrl => {
                self.text.clear();
                self.reveal_tail = false;
                MaskedOutcome::Continue
            }
            KeyCode::Backspace => {
                self.text.pop();
                self.reveal_tail = false;
                MaskedOutcome::Continue
            }
            KeyCode::F(2) => {
                self.reveal_tail = !self.reveal_tail;
                MaskedOutcome::Continue
            }
            KeyCode::Char(c) if !ctrl => {
                self.text.push(c);
                self.reveal_tail = false;
                MaskedOutcome::Continue
            }
            _ => MaskedOutcome::Continue,
        }
    }

    /// One `*` per character, except the last `tail_chars` when revealed.
    fn display(&self, tail_chars: usize) -> String {
        let len = self.text.chars().count();
        if self.reveal_tail && len >= tail_chars {
            let hidden = len - tail_chars;
            let tail: String = self.text.chars().skip(hidden).collect();
            format!("{}{tail}", "*".repeat(hidden))
        } else {
            "*".repeat(len)
        }
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn prompt_masked_input(prompt: &str, tail_chars: usize) -> io::Result<String> {
    let mut stdout = io::stdout();
    let result = {
        let _raw = RawModeGuard::enable()?;
        let mut state = MaskedInput::default();
        loop {
            write!(stdout, "\r\x1b[K{prompt}{}", state.display(tail_chars))?;
            stdout.flush()?;

            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match state.apply(&key) {
                MaskedOutcome::Continue => {}
                MaskedOutcome::Submit(value) => break Ok(value),
                MaskedOutcome::Cancelled => {
                    break Err(io::Error::new(
                        io::ErrorKind::Interrupted,
                        "Cancelled by user",
                    ))
                }
            }
        }
    };
    writeln!(stdout)?;
    result
}
