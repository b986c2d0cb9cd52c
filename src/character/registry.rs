//! In-memory working set of characters and the current selection.

use std::fmt;

use crate::character::{Character, CharacterFields};

/// Which character, if any, the session is talking to.
///
/// The index always refers to a live element: characters are never removed
/// from a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Unselected,
    Selected(usize),
}

/// A load was requested with no list entry, or one past the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutOfRange {
    pub index: Option<usize>,
    pub len: usize,
}

impl fmt::Display for SelectionOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            None => write!(f, "Please select a character to load."),
            Some(index) => write!(
                f,
                "No character at position {} (there are {})",
                index + 1,
                self.len
            ),
        }
    }
}

impl std::error::Error for SelectionOutOfRange {}

#[derive(Debug, Default)]
pub struct CharacterRegistry {
    characters: Vec<Character>,
    selection: Selection,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_characters(characters: Vec<Character>) -> Self {
        Self {
            characters,
            selection: Selection::Unselected,
        }
    }

    /// Append a character; names are not checked for duplicates.
    pub fn add(&mut self, character: Character) -> &Character {
        let index = self.characters.len();
        self.characters.push(character);
        &self.characters[index]
    }

    /// Overwrite the character at a position taken from [`Selection`].
    pub(crate) fn update_at(&mut self, index: usize, fields: CharacterFields) -> &Character {
        let character = &mut self.characters[index];
        character.apply(fields);
        character
    }

    /// Names in insertion order, for display.
    pub fn list(&self) -> Vec<&str> {
        self.characters.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Make the character at `index` current.
    ///
    /// On failure the previous selection is left untouched.
    pub fn select(&mut self, index: Option<usize>) -> Result<&Character, SelectionOutOfRange> {
        let len = self.characters.len();
        match index {
            Some(i) if i < len => {
                self.selection = Selection::Selected(i);
                Ok(&self.characters[i])
            }
            _ => Err(SelectionOutOfRange { index, len }),
        }
    }

    pub fn current(&self) -> Option<&Character> {
        match self.selection {
            Selection::Unselected => None,
            Selection::Selected(i) => self.characters.get(i),
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut Character> {
        match self.selection {
            Selection::Unselected => None,
            Selection::Selected(i) => self.characters.get_mut(i),
        }
    }
}
