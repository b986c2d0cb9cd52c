//! One-shot "say" command

use std::error::Error;

use crate::cli::chat::open_session;
use crate::cli::SessionOptions;
use crate::core::config::Config;
use crate::utils::logging::TranscriptLog;

/// Position of `wanted` in `names`: an exact match first, then the first
/// case-insensitive one.
pub fn find_character(names: &[&str], wanted: &str) -> Option<usize> {
    let wanted = wanted.trim();
    names
        .iter()
        .position(|name| *name == wanted)
        .or_else(|| {
            names
                .iter()
                .position(|name| name.eq_ignore_ascii_case(wanted))
        })
}

pub async fn run_say(
    options: SessionOptions,
    character: &str,
    prompt: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: dawbrei say -c <character> <prompt>");
        std::process::exit(1);
    }

    let config = Config::load()?;
    let mut session = open_session(&options, &config)?;
    let transcript = TranscriptLog::new(options.log.clone())?;

    let Some(index) = find_character(&session.list(), character) else {
        eprintln!("❌ No character named '{character}'");
        let names = session.list();
        if !names.is_empty() {
            eprintln!("Available characters: {}", names.join(", "));
        }
        std::process::exit(1);
    };
    let name = session.load(Some(index))?.name.clone();

    match session.send_turn(&prompt).await {
        Ok(reply) => {
            println!("{reply}");
            transcript.log_turn("You", &prompt)?;
            transcript.log_turn(&name, &reply)?;
            session.speak_reply(&reply).await;
        }
        Err(err) => {
            eprintln!("❌ Error: {err}");
            std::process::exit(1);
        }
    }

    session.close()?;
    Ok(())
}
