//! Session controller: the one place where user intent meets the registry,
//! the store, and the external collaborators.
//!
//! The controller owns the [`CharacterRegistry`] for the lifetime of a
//! session. Whether "save" creates or updates depends only on the registry's
//! [`Selection`] state. Conversation turns are stateless: each request holds
//! the persona instruction and the current user message, nothing else.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::api::ChatMessage;
use crate::character::store::{self, LoadPolicy, StoreError};
use crate::character::{
    Character, CharacterFields, CharacterRegistry, Selection, SelectionOutOfRange,
};
use crate::core::completion::{CompletionClient, CompletionError};
use crate::core::speech::Speaker;

#[derive(Debug)]
pub enum SessionError {
    /// An edit or send was requested with no character selected.
    NoSelection,
    /// A load was requested with no valid list entry.
    SelectionOutOfRange(SelectionOutOfRange),
    /// The completion collaborator failed; the turn can be retried.
    Completion(CompletionError),
    /// Reading or writing character files failed.
    Store(StoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoSelection => write!(f, "Please select or create a character first."),
            SessionError::SelectionOutOfRange(err) => write!(f, "{err}"),
            SessionError::Completion(err) => write!(f, "{err}"),
            SessionError::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::NoSelection => None,
            SessionError::SelectionOutOfRange(err) => Some(err),
            SessionError::Completion(err) => Some(err),
            SessionError::Store(err) => Some(err),
        }
    }
}

impl From<SelectionOutOfRange> for SessionError {
    fn from(err: SelectionOutOfRange) -> Self {
        SessionError::SelectionOutOfRange(err)
    }
}

impl From<CompletionError> for SessionError {
    fn from(err: CompletionError) -> Self {
        SessionError::Completion(err)
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Store(err)
    }
}

/// Which branch [`SessionController::new_or_update`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

pub struct SessionController {
    registry: CharacterRegistry,
    characters_dir: PathBuf,
    model: String,
    completion: Box<dyn CompletionClient>,
    speaker: Box<dyn Speaker>,
    closed: bool,
}

impl SessionController {
    pub fn new(
        registry: CharacterRegistry,
        characters_dir: impl Into<PathBuf>,
        model: impl Into<String>,
        completion: Box<dyn CompletionClient>,
        speaker: Box<dyn Speaker>,
    ) -> Self {
        Self {
            registry,
            characters_dir: characters_dir.into(),
            model: model.into(),
            completion,
            speaker,
            closed: false,
        }
    }

    /// Load every saved character from `characters_dir` and start a session.
    pub fn open(
        characters_dir: impl Into<PathBuf>,
        policy: LoadPolicy,
        model: impl Into<String>,
        completion: Box<dyn CompletionClient>,
        speaker: Box<dyn Speaker>,
    ) -> Result<Self, StoreError> {
        let characters_dir = characters_dir.into();
        let characters = store::load_all(&characters_dir, policy)?;
        info!(
            folder = %characters_dir.display(),
            count = characters.len(),
            "Session opened"
        );
        Ok(Self::new(
            CharacterRegistry::from_characters(characters),
            characters_dir,
            model,
            completion,
            speaker,
        ))
    }

    pub fn registry(&self) -> &CharacterRegistry {
        &self.registry
    }

    pub fn characters_dir(&self) -> &Path {
        &self.characters_dir
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Names of all characters, in list order.
    pub fn list(&self) -> Vec<&str> {
        self.registry.list()
    }

    pub fn current(&self) -> Option<&Character> {
        self.registry.current()
    }

    /// Create a character when nothing is selected, otherwise overwrite the
    /// selected one in place.
    ///
    /// Creating does not select the new character.
    pub fn new_or_update(&mut self, fields: CharacterFields) -> (SaveOutcome, &Character) {
        match self.registry.selection() {
            Selection::Unselected => {
                debug!(name = %fields.name, "Creating character");
                let created = self.registry.add(Character::from_fields(fields));
                (SaveOutcome::Created, created)
            }
            Selection::Selected(index) => {
                debug!(index, name = %fields.name, "Updating selected character");
                (SaveOutcome::Updated, self.registry.update_at(index, fields))
            }
        }
    }

    /// The selected character's fields, for editing.
    pub fn begin_edit(&self) -> Result<CharacterFields, SessionError> {
        self.registry
            .current()
            .map(Character::fields)
            .ok_or(SessionError::NoSelection)
    }

    /// Select the character at `index` in [`list`](Self::list) order.
    pub fn load(&mut self, index: Option<usize>) -> Result<&Character, SessionError> {
        let character = self.registry.select(index)?;
        info!(name = %character.name, "Loaded character");
        Ok(character)
    }

    /// The two messages sent for one turn with `character`.
    pub fn build_turn(character: &Character, user_text: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(character.build_system_prompt()),
            ChatMessage::user(user_text),
        ]
    }

    /// Run one stateless conversation turn with the selected character.
    pub async fn send_turn(&self, user_text: &str) -> Result<String, SessionError> {
        let character = self.registry.current().ok_or(SessionError::NoSelection)?;
        let messages = Self::build_turn(character, user_text);

        debug!(character = %character.name, model = %self.model, "Sending turn");
        let reply = self.completion.complete(&self.model, &messages).await?;
        Ok(reply.trim().to_string())
    }

    /// Speak a reply aloud. Speech problems are logged, never returned, so a
    /// broken speech engine cannot fail a turn.
    pub async fn speak_reply(&self, reply: &str) {
        if let Err(err) = self.speaker.speak(reply).await {
            warn!(error = %err, "Speech playback failed");
        }
    }

    /// Persist every character. Only the first call writes anything.
    pub fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        store::save_all(&self.characters_dir, self.registry.iter())?;
        info!(
            folder = %self.characters_dir.display(),
            count = self.registry.len(),
            "Saved characters on close"
        );
        Ok(())
    }
}
