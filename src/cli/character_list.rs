use crate::character::store;
use crate::character::{Character, LoadPolicy};
use crate::core::config::path_display;
use std::error::Error;
use std::path::Path;

/// One line of the `list` output.
pub fn format_entry(position: usize, character: &Character) -> String {
    if character.tagline.trim().is_empty() {
        format!("  {}. {}", position, character.name)
    } else {
        format!("  {}. {} - {}", position, character.name, character.tagline)
    }
}

pub fn list_characters(characters_dir: &Path, policy: LoadPolicy) -> Result<(), Box<dyn Error>> {
    println!(
        "Available characters (from {}):\n",
        path_display(characters_dir)
    );

    match store::load_all(characters_dir, policy) {
        Ok(characters) => {
            if characters.is_empty() {
                println!("  No characters found.");
                println!("\n💡 Create one in the chat with /new");
            } else {
                for (index, character) in characters.iter().enumerate() {
                    println!("{}", format_entry(index + 1, character));
                }
                println!("\n💡 Talk to one with:");
                println!("   dawbrei say -c <name> <message>");
            }
        }
        Err(e) => {
            eprintln!("❌ Error listing characters: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
