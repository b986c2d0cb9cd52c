use serde::{Deserialize, Serialize};

/// A persona definition used to seed a conversation.
///
/// This is also the on-disk format: one flat JSON object per character with
/// all five keys present. Unknown keys are ignored when reading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Character {
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub greeting: String,
    pub definition: String,
}

/// The five editable values of a character, as shown in an editor form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterFields {
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub greeting: String,
    pub definition: String,
}

impl Character {
    pub fn from_fields(fields: CharacterFields) -> Self {
        let CharacterFields {
            name,
            tagline,
            description,
            greeting,
            definition,
        } = fields;
        Self {
            name,
            tagline,
            description,
            greeting,
            definition,
        }
    }

    pub fn fields(&self) -> CharacterFields {
        CharacterFields {
            name: self.name.clone(),
            tagline: self.tagline.clone(),
            description: self.description.clone(),
            greeting: self.greeting.clone(),
            definition: self.definition.clone(),
        }
    }

    /// Overwrite every field in place.
    pub fn apply(&mut self, fields: CharacterFields) {
        *self = Self::from_fields(fields);
    }

    /// Build the system instruction sent ahead of each user message.
    pub fn build_system_prompt(&self) -> String {
        format!(
            "You are to play the character of: {}. {}",
            self.name, self.definition
        )
    }

    /// The greeting, if the character has one.
    pub fn get_greeting(&self) -> Option<&str> {
        let greeting = self.greeting.trim();
        if greeting.is_empty() {
            None
        } else {
            Some(greeting)
        }
    }
}
