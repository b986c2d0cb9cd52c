//! JSON-file persistence for characters.
//!
//! Each character lives in `<name>.json` inside a single flat folder. The
//! directory listing is the index: there is no manifest, and files are read
//! back in whatever order the operating system enumerates them.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::character::Character;
use crate::core::config::io::write_atomically;
use crate::core::config::path_display;

/// Folder name used when nothing else is configured, relative to the
/// working directory.
pub const DEFAULT_CHARACTERS_DIR: &str = "characters";

/// What [`load_all`] does when it meets a file it cannot parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Stop at the first malformed file and report it.
    #[default]
    Abort,
    /// Log a warning for the malformed file and keep going.
    Skip,
}

/// Errors raised by the character store.
#[derive(Debug)]
pub enum StoreError {
    /// Reading or writing the folder or one of its files failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A `*.json` file could not be parsed into a character.
    MalformedCharacterFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The character's name cannot be used as a file stem.
    InvalidName(String),

    /// Encoding a character as JSON failed.
    Serialize(serde_json::Error),

    /// Some saves in a batch failed; the rest were written.
    Partial(Vec<StoreError>),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "I/O error at {}: {}", path_display(path), source)
            }
            StoreError::MalformedCharacterFile { path, source } => {
                write!(
                    f,
                    "Malformed character file {}: {}",
                    path_display(path),
                    source
                )
            }
            StoreError::InvalidName(name) => {
                write!(f, "'{}' cannot be used as a character file name", name)
            }
            StoreError::Serialize(err) => write!(f, "Failed to encode character: {err}"),
            StoreError::Partial(errors) => {
                writeln!(f, "{} character(s) could not be saved:", errors.len())?;
                for error in errors {
                    writeln!(f, "  • {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::MalformedCharacterFile { source, .. } => Some(source),
            StoreError::Serialize(err) => Some(err),
            StoreError::InvalidName(_) | StoreError::Partial(_) => None,
        }
    }
}

fn ensure_folder(folder: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(folder).map_err(|source| StoreError::Io {
        path: folder.to_path_buf(),
        source,
    })
}

fn is_json_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Read one character file.
pub fn load_character(path: &Path) -> Result<Character, StoreError> {
    let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|source| StoreError::MalformedCharacterFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Load every `*.json` character in `folder`, creating the folder if needed.
///
/// Characters are returned in directory enumeration order, which is not
/// guaranteed to be alphabetical. With [`LoadPolicy::Abort`] the first
/// malformed file fails the whole load.
pub fn load_all(folder: &Path, policy: LoadPolicy) -> Result<Vec<Character>, StoreError> {
    ensure_folder(folder)?;

    let entries = fs::read_dir(folder).map_err(|source| StoreError::Io {
        path: folder.to_path_buf(),
        source,
    })?;

    let mut characters = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StoreError::Io {
            path: folder.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !is_json_file(&path) {
            continue;
        }

        match load_character(&path) {
            Ok(character) => characters.push(character),
            Err(err @ StoreError::MalformedCharacterFile { .. })
                if policy == LoadPolicy::Skip =>
            {
                warn!(path = %path.display(), error = %err, "Skipping malformed character file");
            }
            Err(err) => return Err(err),
        }
    }

    debug!(
        folder = %folder.display(),
        count = characters.len(),
        "Loaded characters"
    );
    Ok(characters)
}

/// Path of the file a character with `name` is stored in.
pub fn character_path(folder: &Path, name: &str) -> Result<PathBuf, StoreError> {
    let unusable = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if unusable {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(folder.join(format!("{name}.json")))
}

/// Write `character` to `<folder>/<name>.json`, replacing any existing file.
///
/// The file is written to a temporary sibling first and renamed into place,
/// so an interrupted write never leaves a truncated character behind.
pub fn save(folder: &Path, character: &Character) -> Result<(), StoreError> {
    let path = character_path(folder, &character.name)?;
    let contents = serde_json::to_string_pretty(character).map_err(StoreError::Serialize)?;

    write_atomically(&path, contents.as_bytes()).map_err(|source| StoreError::Io {
        path: path.clone(),
        source,
    })?;

    debug!(path = %path.display(), "Saved character");
    Ok(())
}

/// Save every character, attempting all of them even when some fail.
pub fn save_all<'a, I>(folder: &Path, characters: I) -> Result<(), StoreError>
where
    I: IntoIterator<Item = &'a Character>,
{
    let mut seen = HashSet::new();
    let mut failures = Vec::new();

    for character in characters {
        if !seen.insert(character.name.as_str()) {
            warn!(
                name = %character.name,
                "Several characters share this name; the last one saved wins"
            );
        }
        if let Err(err) = save(folder, character) {
            failures.push(err);
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Partial(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::test_helpers::helpers::{
        create_temp_characters_dir, create_test_character, nova,
    };

    #[test]
    fn load_all_creates_missing_folder() {
        let (temp_dir, _) = create_temp_characters_dir();
        let folder = temp_dir.path().join("not-yet");

        let characters = load_all(&folder, LoadPolicy::Abort).expect("load");
        assert!(characters.is_empty());
        assert!(folder.is_dir());

        // Pre-existing folder is fine too.
        load_all(&folder, LoadPolicy::Abort).expect("second load");
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        let character = nova();

        save(&folder, &character).expect("save");
        assert!(folder.join("Nova.json").is_file());

        let loaded = load_all(&folder, LoadPolicy::Abort).expect("load");
        assert_eq!(loaded, vec![character]);
    }

    #[test]
    fn round_trip_keeps_empty_and_unusual_text() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        let character = Character {
            name: "Zoë".to_string(),
            tagline: String::new(),
            description: "Line one\nLine two\t\"quoted\"".to_string(),
            greeting: String::new(),
            definition: "You are Zoë. {{user}} \\ 🎭\n".to_string(),
        };

        save(&folder, &character).expect("save");
        let loaded = load_all(&folder, LoadPolicy::Abort).expect("load");
        assert_eq!(loaded, vec![character]);
    }

    #[test]
    fn saving_twice_is_idempotent() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        let character = create_test_character("Alice", "Hello");

        save(&folder, &character).expect("first save");
        let first = fs::read_to_string(folder.join("Alice.json")).unwrap();
        save(&folder, &character).expect("second save");
        let second = fs::read_to_string(folder.join("Alice.json")).unwrap();

        let first: Character = serde_json::from_str(&first).unwrap();
        let second: Character = serde_json::from_str(&second).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_dir(&folder).unwrap().count(), 1);
    }

    #[test]
    fn save_overwrites_same_name() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        let first = create_test_character("Alice", "Hello");
        let mut second = first.clone();
        second.greeting = "Hi again".to_string();

        save(&folder, &first).expect("save first");
        save(&folder, &second).expect("save second");

        let loaded = load_all(&folder, LoadPolicy::Abort).expect("load");
        assert_eq!(loaded, vec![second]);
    }

    #[test]
    fn malformed_file_aborts_load() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        save(&folder, &nova()).unwrap();
        fs::write(folder.join("broken.json"), "{ not json").unwrap();

        match load_all(&folder, LoadPolicy::Abort) {
            Err(StoreError::MalformedCharacterFile { path, .. }) => {
                assert!(path.ends_with("broken.json"));
            }
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[test]
    fn missing_field_counts_as_malformed() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        fs::write(folder.join("partial.json"), r#"{"name": "Partial"}"#).unwrap();

        let err = load_all(&folder, LoadPolicy::Abort).unwrap_err();
        assert!(matches!(err, StoreError::MalformedCharacterFile { .. }));
    }

    #[test]
    fn skip_policy_keeps_good_files() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        save(&folder, &nova()).unwrap();
        fs::write(folder.join("broken.json"), "[]").unwrap();

        let loaded = load_all(&folder, LoadPolicy::Skip).expect("load");
        assert_eq!(loaded, vec![nova()]);
    }

    #[test]
    fn non_json_entries_are_ignored() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        save(&folder, &nova()).unwrap();
        fs::write(folder.join("notes.txt"), "hello").unwrap();
        fs::create_dir(folder.join("nested.json")).unwrap();

        let loaded = load_all(&folder, LoadPolicy::Abort).expect("load");
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        for name in ["", ".", "..", "../escape", "a/b", "a\\b"] {
            let character = create_test_character(name, "Hi");
            let err = save(&folder, &character).unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidName(ref n) if n == name),
                "name {name:?} should be rejected"
            );
        }
        assert_eq!(fs::read_dir(&folder).unwrap().count(), 0);
    }

    #[test]
    fn save_all_attempts_every_character() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        let characters = vec![
            create_test_character("Alice", "Hi"),
            create_test_character("", "nameless"),
            create_test_character("Bob", "Yo"),
        ];

        match save_all(&folder, &characters) {
            Err(StoreError::Partial(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected partial failure, got {other:?}"),
        }
        assert!(folder.join("Alice.json").is_file());
        assert!(folder.join("Bob.json").is_file());
    }

    #[test]
    fn save_all_with_duplicate_names_keeps_the_last() {
        let (_temp_dir, folder) = create_temp_characters_dir();
        let first = create_test_character("Alice", "first");
        let last = create_test_character("Alice", "last");

        save_all(&folder, [&first, &last]).expect("save all");

        let loaded = load_all(&folder, LoadPolicy::Abort).expect("load");
        assert_eq!(loaded, vec![last]);
    }

    #[test]
    fn load_policy_parses_from_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: LoadPolicy,
        }
        let parsed: Wrapper = toml::from_str("policy = \"skip\"").unwrap();
        assert_eq!(parsed.policy, LoadPolicy::Skip);
    }
}
