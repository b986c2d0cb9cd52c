//! Line-oriented chat front end.
//!
//! Every line is either a slash command or a message for the loaded
//! character. Leaving the loop, by `/quit` or end of input, saves every
//! character back to the characters folder.

use std::error::Error;
use std::io::{self, BufRead, Write};

use tracing::{debug, warn};

use crate::auth::AuthManager;
use crate::character::store::{self, StoreError};
use crate::character::{CharacterFields, Selection};
use crate::cli::character_list::format_entry;
use crate::cli::SessionOptions;
use crate::core::completion::HttpCompletionClient;
use crate::core::config::{path_display, Config};
use crate::core::session::{SaveOutcome, SessionController};
use crate::core::speech::speaker_from_config;
use crate::utils::logging::TranscriptLog;

const HELP_TEXT: &str = "\
Commands:
  /new              Create a character from a blank form
  /edit             Show the loaded character's fields
  /save             Save the form: updates the loaded character, or creates one
  /list             List characters
  /load <n>         Load the character at position n
  /log <filename>   Enable logging to specified file
  /log              Toggle logging pause/resume
  /help             Show this list
  /quit             Save all characters and exit
Anything else is sent to the loaded character.";

/// Ends a multi-line definition.
const DEFINITION_END: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    New,
    Edit,
    Save,
    List,
    /// Zero-based position; `None` when no valid position was given.
    Load(Option<usize>),
    Log(Option<String>),
    Help,
    Quit,
    Unknown(String),
    Message(String),
}

/// Interpret one input line; `None` for a blank line.
pub fn parse_command(line: &str) -> Option<ChatCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(ChatCommand::Message(line.to_string()));
    }

    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (line, None),
    };

    Some(match command {
        "/new" => ChatCommand::New,
        "/edit" => ChatCommand::Edit,
        "/save" => ChatCommand::Save,
        "/list" => ChatCommand::List,
        "/load" => ChatCommand::Load(
            arg.and_then(|a| a.parse::<usize>().ok())
                .and_then(|n| n.checked_sub(1)),
        ),
        "/log" => ChatCommand::Log(arg.map(str::to_string)),
        "/help" => ChatCommand::Help,
        "/quit" | "/exit" => ChatCommand::Quit,
        other => ChatCommand::Unknown(other.to_string()),
    })
}

/// Resolve credentials and collaborators, then load the characters folder.
///
/// Startup failures (no API key, an unreadable character file under the
/// abort policy) end the process with a message.
pub(crate) fn open_session(
    options: &SessionOptions,
    config: &Config,
) -> Result<SessionController, Box<dyn Error>> {
    let auth_manager = AuthManager::new();
    let (api_key, source) = match auth_manager.resolve_api_key() {
        Ok(found) => found,
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    };
    debug!(%source, "Resolved API key");

    let completion =
        HttpCompletionClient::new(config.base_url(), api_key, config.request_timeout())?;
    let speaker = speaker_from_config(&config.speech, options.mute);
    let characters_dir = options.characters_dir(config);

    match SessionController::open(
        &characters_dir,
        config.load_policy(),
        options.model(config),
        Box::new(completion),
        speaker,
    ) {
        Ok(session) => Ok(session),
        Err(err) => {
            eprintln!("❌ Could not load characters: {err}");
            if matches!(err, StoreError::MalformedCharacterFile { .. }) {
                eprintln!();
                eprintln!("💡 Fix or remove the file, or skip unreadable files with:");
                eprintln!("   dawbrei set load-policy skip");
            }
            std::process::exit(1);
        }
    }
}

pub async fn run_chat(options: SessionOptions) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let session = open_session(&options, &config)?;
    let transcript = TranscriptLog::new(options.log.clone())?;

    println!(
        "Dawbrei · model {} · characters from {}",
        session.model(),
        path_display(session.characters_dir())
    );
    println!("Type /help for commands.\n");

    let stdin = io::stdin();
    let mut chat = ChatLoop::new(session, transcript, stdin.lock(), io::stdout());
    chat.run().await
}

pub struct ChatLoop<R, W> {
    session: SessionController,
    transcript: TranscriptLog,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ChatLoop<R, W> {
    pub fn new(
        session: SessionController,
        transcript: TranscriptLog,
        input: R,
        output: W,
    ) -> Self {
        Self {
            session,
            transcript,
            input,
            output,
        }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Read and handle lines until `/quit` or end of input, then save.
    ///
    /// Characters are saved even when the loop stops on an I/O error.
    pub async fn run(&mut self) -> Result<(), Box<dyn Error>> {
        let outcome = self.read_commands().await;
        let closed = self.session.close();

        if let Err(err) = outcome {
            if let Err(close_err) = closed {
                warn!(error = %close_err, "Could not save characters");
            }
            return Err(err.into());
        }
        if let Err(err) = closed {
            writeln!(self.output, "❌ {err}")?;
            return Err(err.into());
        }
        writeln!(self.output, "Characters saved. Goodbye.")?;
        Ok(())
    }

    async fn read_commands(&mut self) -> io::Result<()> {
        self.print_list()?;

        while let Some(line) = self.read_line()? {
            let Some(command) = parse_command(&line) else {
                continue;
            };
            if command == ChatCommand::Quit {
                break;
            }
            self.handle(command).await?;
        }
        Ok(())
    }

    async fn handle(&mut self, command: ChatCommand) -> io::Result<()> {
        match command {
            ChatCommand::New => {
                if let Some(current) = self.session.current() {
                    writeln!(
                        self.output,
                        "Note: {} is loaded, so saving will update it.",
                        current.name
                    )?;
                }
                self.save_form(CharacterFields::default())
            }
            ChatCommand::Save => {
                let start = self.session.begin_edit().unwrap_or_default();
                self.save_form(start)
            }
            ChatCommand::Edit => match self.session.begin_edit() {
                Ok(fields) => self.print_fields(&fields),
                Err(err) => writeln!(self.output, "{err}"),
            },
            ChatCommand::List => self.print_list(),
            ChatCommand::Load(index) => match self.session.load(index) {
                Ok(character) => {
                    writeln!(self.output, "Loaded character {}", character.name)?;
                    if let Some(greeting) = character.get_greeting() {
                        writeln!(self.output, "{}: {}", character.name, greeting)?;
                    }
                    Ok(())
                }
                Err(err) => writeln!(self.output, "{err}"),
            },
            ChatCommand::Log(path) => {
                let result = match path {
                    Some(path) => self.transcript.start(path).map(Some),
                    None => self.transcript.toggle(),
                };
                match result {
                    Ok(Some(message)) => writeln!(self.output, "{message}"),
                    Ok(None) => writeln!(
                        self.output,
                        "No log file specified. Use /log <filename> to enable logging first."
                    ),
                    Err(err) => writeln!(self.output, "❌ Could not open log file: {err}"),
                }
            }
            ChatCommand::Help => writeln!(self.output, "{HELP_TEXT}"),
            ChatCommand::Unknown(command) => writeln!(
                self.output,
                "Unknown command {command}. Type /help for commands."
            ),
            ChatCommand::Message(text) => self.send(&text).await,
            ChatCommand::Quit => Ok(()),
        }
    }

    async fn send(&mut self, text: &str) -> io::Result<()> {
        let Some(name) = self.session.current().map(|c| c.name.clone()) else {
            return writeln!(self.output, "Please select or create a character first.");
        };

        match self.session.send_turn(text).await {
            Ok(reply) => {
                writeln!(self.output, "{name}: {reply}")?;
                self.output.flush()?;
                self.log_turn("You", text)?;
                self.log_turn(&name, &reply)?;
                self.session.speak_reply(&reply).await;
            }
            Err(err) => writeln!(self.output, "❌ {err}")?,
        }
        Ok(())
    }

    /// A failed transcript write is reported and the chat goes on.
    fn log_turn(&mut self, speaker: &str, content: &str) -> io::Result<()> {
        if let Err(err) = self.transcript.log_turn(speaker, content) {
            warn!(error = %err, "Transcript write failed");
            writeln!(self.output, "⚠️  Could not write chat log: {err}")?;
        }
        Ok(())
    }

    /// Fill in `start` field by field; an empty answer keeps the shown value.
    fn save_form(&mut self, start: CharacterFields) -> io::Result<()> {
        let Some(fields) = self.prompt_fields(start)? else {
            return writeln!(self.output, "Cancelled.");
        };

        if let Err(err) = store::character_path(self.session.characters_dir(), &fields.name) {
            return writeln!(self.output, "❌ {err}");
        }

        let (outcome, _) = self.session.new_or_update(fields);
        match outcome {
            SaveOutcome::Created => writeln!(self.output, "Character saved."),
            SaveOutcome::Updated => writeln!(self.output, "Character updated."),
        }
    }

    /// `None` when input ends before the form is complete.
    fn prompt_fields(&mut self, mut fields: CharacterFields) -> io::Result<Option<CharacterFields>> {
        for (label, value) in [
            ("Name", &mut fields.name),
            ("Tagline", &mut fields.tagline),
            ("Description", &mut fields.description),
            ("Greeting", &mut fields.greeting),
        ] {
            self.prompt_label(label, value)?;
            let Some(answer) = self.read_line()? else {
                writeln!(self.output)?;
                return Ok(None);
            };
            if !answer.trim().is_empty() {
                *value = answer;
            }
        }

        self.prompt_label(
            "Definition (end with a line holding only '.')",
            &fields.definition,
        )?;
        let Some(lines) = self.read_definition()? else {
            writeln!(self.output)?;
            return Ok(None);
        };
        if !lines.is_empty() {
            fields.definition = lines.join("\n");
        }
        Ok(Some(fields))
    }

    fn prompt_label(&mut self, label: &str, value: &str) -> io::Result<()> {
        if value.is_empty() {
            write!(self.output, "{label}: ")?;
        } else {
            write!(self.output, "{label} [{value}]: ")?;
        }
        self.output.flush()
    }

    /// Lines up to a lone `.`. An empty first line keeps the current value
    /// and yields no lines.
    fn read_definition(&mut self) -> io::Result<Option<Vec<String>>> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line()? {
            let done = line.trim() == DEFINITION_END
                || (lines.is_empty() && line.trim().is_empty());
            if done {
                return Ok(Some(lines));
            }
            lines.push(line);
        }
        Ok(None)
    }

    fn print_fields(&mut self, fields: &CharacterFields) -> io::Result<()> {
        writeln!(self.output, "Name: {}", fields.name)?;
        writeln!(self.output, "Tagline: {}", fields.tagline)?;
        writeln!(self.output, "Description: {}", fields.description)?;
        writeln!(self.output, "Greeting: {}", fields.greeting)?;
        writeln!(self.output, "Definition: {}", fields.definition)
    }

    fn print_list(&mut self) -> io::Result<()> {
        let registry = self.session.registry();
        if registry.is_empty() {
            return writeln!(self.output, "No characters yet. Use /new to create one.");
        }

        let selected = match registry.selection() {
            Selection::Selected(index) => Some(index),
            Selection::Unselected => None,
        };
        writeln!(self.output, "Characters:")?;
        for (index, character) in registry.iter().enumerate() {
            let entry = format_entry(index + 1, character);
            if selected == Some(index) {
                writeln!(self.output, "*{}", entry.strip_prefix(' ').unwrap_or(&entry))?;
            } else {
                writeln!(self.output, "{entry}")?;
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatMessage;
    use crate::character::test_helpers::helpers::{
        create_temp_characters_dir, create_temp_characters_dir_with,
    };
    use crate::character::LoadPolicy;
    use crate::core::completion::{CompletionClient, CompletionError};
    use crate::core::speech::MutedSpeaker;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    struct EchoCompletion {
        seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    }

    #[async_trait]
    impl CompletionClient for EchoCompletion {
        async fn complete(
            &self,
            _model: &str,
            messages: &[ChatMessage],
        ) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(format!("  You said {}  ", messages[1].content))
        }
    }

    type Seen = Arc<Mutex<Vec<Vec<ChatMessage>>>>;

    fn open_controller(dir: &Path) -> (SessionController, Seen) {
        let seen: Seen = Arc::default();
        let session = SessionController::open(
            dir,
            LoadPolicy::Abort,
            "test-model",
            Box::new(EchoCompletion { seen: seen.clone() }),
            Box::new(MutedSpeaker),
        )
        .unwrap();
        (session, seen)
    }

    fn chat_loop(dir: &Path, input: &str) -> (ChatLoop<Cursor<Vec<u8>>, Vec<u8>>, Seen) {
        let (session, seen) = open_controller(dir);
        let transcript = TranscriptLog::new(None).unwrap();
        let chat = ChatLoop::new(
            session,
            transcript,
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
        );
        (chat, seen)
    }

    /// Accepts writes until one contains `fail_on`.
    struct BrokenOutput {
        fail_on: &'static str,
    }

    impl Write for BrokenOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if String::from_utf8_lossy(buf).contains(self.fail_on) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "output closed"));
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    async fn run_to_end(dir: &Path, input: &str) -> (String, Seen) {
        let (mut chat, seen) = chat_loop(dir, input);
        chat.run().await.unwrap();
        let output = String::from_utf8(chat.into_output()).unwrap();
        (output, seen)
    }

    #[test]
    fn parses_commands_and_messages() {
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("/new"), Some(ChatCommand::New));
        assert_eq!(parse_command("/load 2"), Some(ChatCommand::Load(Some(1))));
        assert_eq!(parse_command("/load"), Some(ChatCommand::Load(None)));
        assert_eq!(parse_command("/load 0"), Some(ChatCommand::Load(None)));
        assert_eq!(parse_command("/load two"), Some(ChatCommand::Load(None)));
        assert_eq!(
            parse_command("/log  chat.txt "),
            Some(ChatCommand::Log(Some("chat.txt".to_string())))
        );
        assert_eq!(parse_command("/log"), Some(ChatCommand::Log(None)));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(
            parse_command("/dance"),
            Some(ChatCommand::Unknown("/dance".to_string()))
        );
        assert_eq!(
            parse_command(" hello there "),
            Some(ChatCommand::Message("hello there".to_string()))
        );
    }

    #[tokio::test]
    async fn message_without_selection_asks_for_a_character() {
        let (_tmp, dir) = create_temp_characters_dir_with(&[("Nova", "Hi")]);
        let (output, seen) = run_to_end(&dir, "hello\n/quit\n").await;

        assert!(output.contains("Please select or create a character first."));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_then_chat_prints_greeting_and_reply() {
        let (_tmp, dir) = create_temp_characters_dir_with(&[("Nova", "Hi there")]);
        let (output, seen) = run_to_end(&dir, "/load 1\nWho are you?\n").await;

        assert!(output.contains("Loaded character Nova\nNova: Hi there\n"));
        assert!(output.contains("Nova: You said Who are you?\n"));

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0][0].content,
            "You are to play the character of: Nova. You are Nova. Friendly and helpful."
        );
    }

    #[tokio::test]
    async fn load_out_of_range_keeps_session_usable() {
        let (_tmp, dir) = create_temp_characters_dir_with(&[("Nova", "Hi")]);
        let (output, _) = run_to_end(&dir, "/load 5\n/load\n/edit\n").await;

        assert!(output.contains("No character at position 5 (there are 1)"));
        assert!(output.contains("Please select a character to load."));
        assert!(output.contains("Please select or create a character first."));
    }

    #[tokio::test]
    async fn save_without_selection_creates_and_persists_on_quit() {
        let (_tmp, dir) = create_temp_characters_dir();
        let input = "/save\nNova\nT\nD\nHi\nYou are Nova.\n.\n/list\n/quit\n";
        let (output, _) = run_to_end(&dir, input).await;

        assert!(output.contains("Character saved."));
        assert!(output.contains("  1. Nova - T"));
        assert!(!output.contains("Unknown command ."));
        assert!(output.ends_with("Characters saved. Goodbye.\n"));

        let saved = store::load_character(&dir.join("Nova.json")).unwrap();
        assert_eq!(saved.definition, "You are Nova.");
    }

    #[tokio::test]
    async fn definition_spans_lines_until_the_end_marker() {
        let (_tmp, dir) = create_temp_characters_dir();
        let input = "/new\nNova\n\n\n\nYou are Nova.\nYou speak in rhyme.\n.\n/quit\n";
        let (output, seen) = run_to_end(&dir, input).await;

        assert!(output.contains("Definition (end with a line holding only '.'): "));
        assert!(output.contains("Character saved."));
        assert!(!output.contains("Please select or create a character first."));
        assert!(seen.lock().unwrap().is_empty());

        let saved = store::load_character(&dir.join("Nova.json")).unwrap();
        assert_eq!(saved.definition, "You are Nova.\nYou speak in rhyme.");
    }

    #[tokio::test]
    async fn selected_character_is_marked_in_the_list() {
        let (_tmp, dir) = create_temp_characters_dir_with(&[("Nova", "Hi")]);
        let (output, _) = run_to_end(&dir, "/load 1\n/list\n").await;

        assert!(output.starts_with("Characters:\n  1. Nova - Tagline for Nova\n"));
        assert!(output.contains("* 1. Nova - Tagline for Nova\n"));
    }

    #[tokio::test]
    async fn output_failure_still_saves_characters() {
        let (_tmp, dir) = create_temp_characters_dir();
        let (session, _) = open_controller(&dir);
        let input = Cursor::new(b"/new\nZed\n\n\n\n\n/quit\n".to_vec());
        let mut chat = ChatLoop::new(
            session,
            TranscriptLog::new(None).unwrap(),
            input,
            BrokenOutput {
                fail_on: "Character saved.",
            },
        );

        assert!(chat.run().await.is_err());
        assert_eq!(chat.session().list(), vec!["Zed"]);
        assert!(dir.join("Zed.json").exists());
    }

    #[tokio::test]
    async fn save_with_selection_updates_and_keeps_blank_answers() {
        let (_tmp, dir) = create_temp_characters_dir_with(&[("Nova", "Hi")]);
        let input = "/load 1\n/save\n\nNew tagline\n\n\n\n";
        let (output, _) = run_to_end(&dir, input).await;

        assert!(output.contains("Tagline [Tagline for Nova]: "));
        assert!(output.contains("Character updated."));

        let saved = store::load_character(&dir.join("Nova.json")).unwrap();
        assert_eq!(saved.tagline, "New tagline");
        assert_eq!(saved.greeting, "Hi");
    }

    #[tokio::test]
    async fn end_of_input_mid_form_cancels_and_still_saves() {
        let (_tmp, dir) = create_temp_characters_dir_with(&[("Nova", "Hi")]);
        let (mut chat, _) = chat_loop(&dir, "/new\nHalf");
        chat.run().await.unwrap();

        assert_eq!(chat.session().list(), vec!["Nova"]);
        let output = String::from_utf8(chat.into_output()).unwrap();
        assert!(output.contains("Cancelled."));
        assert!(dir.join("Nova.json").exists());
    }

    #[tokio::test]
    async fn invalid_name_is_rejected_before_adding() {
        let (_tmp, dir) = create_temp_characters_dir();
        let (mut chat, _) = chat_loop(&dir, "/new\n../evil\n\n\n\n\n");
        chat.run().await.unwrap();

        assert!(chat.session().list().is_empty());
        let output = String::from_utf8(chat.into_output()).unwrap();
        assert!(output.contains("cannot be used as a character file name"));
    }

    #[tokio::test]
    async fn log_command_records_turns() {
        let (tmp, dir) = create_temp_characters_dir_with(&[("Nova", "Hi")]);
        let log_path = tmp.path().join("chat.log");
        let input = format!("/log {}\n/load 1\nhello\n", log_path.display());
        let (output, _) = run_to_end(&dir, &input).await;

        assert!(output.contains("Logging enabled to: "));
        let transcript = std::fs::read_to_string(&log_path).unwrap();
        assert!(transcript.contains("You: hello\n"));
        assert!(transcript.contains("Nova: You said hello\n"));
    }
}
