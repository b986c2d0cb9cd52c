// Test helpers for character tests
// This module provides utilities for safe, concurrent testing

#[cfg(test)]
pub(crate) mod helpers {
    use crate::character::Character;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Create a test character with the given name and greeting
    pub fn create_test_character(name: &str, greeting: &str) -> Character {
        Character {
            name: name.to_string(),
            tagline: format!("Tagline for {}", name),
            description: format!("Test character {}", name),
            greeting: greeting.to_string(),
            definition: format!("You are {}. Friendly and helpful.", name),
        }
    }

    /// The character used in the save/restart scenario
    pub fn nova() -> Character {
        Character {
            name: "Nova".to_string(),
            tagline: "T".to_string(),
            description: "D".to_string(),
            greeting: "Hi".to_string(),
            definition: "You are Nova.".to_string(),
        }
    }

    /// Create a temporary characters directory
    /// Returns the temp directory and the characters directory path
    /// The directory will be automatically cleaned up when the TempDir is dropped
    pub fn create_temp_characters_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let characters_dir = temp_dir.path().join("characters");
        fs::create_dir_all(&characters_dir).unwrap();
        (temp_dir, characters_dir)
    }

    /// Create a temporary characters directory with pre-populated characters
    pub fn create_temp_characters_dir_with(characters: &[(&str, &str)]) -> (TempDir, PathBuf) {
        let (temp_dir, characters_dir) = create_temp_characters_dir();

        for (name, greeting) in characters {
            let character = create_test_character(name, greeting);
            let json = serde_json::to_string(&character).unwrap();
            fs::write(characters_dir.join(format!("{}.json", name)), json).unwrap();
        }

        (temp_dir, characters_dir)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_create_temp_characters_dir_with() {
            let (_temp_dir, dir) =
                create_temp_characters_dir_with(&[("Alice", "Hello, I'm Alice!"), ("Bob", "Hi!")]);

            assert!(dir.join("Alice.json").exists());
            assert!(dir.join("Bob.json").exists());

            let alice_json = fs::read_to_string(dir.join("Alice.json")).unwrap();
            let alice: Character = serde_json::from_str(&alice_json).unwrap();
            assert_eq!(alice.greeting, "Hello, I'm Alice!");
        }
    }
}
