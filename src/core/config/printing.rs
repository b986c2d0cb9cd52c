use crate::core::config::data::{path_display, Config};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  model: {}", self.model());
        println!("  base-url: {}", self.base_url());
        println!("  characters-dir: {}", path_display(self.characters_dir()));
        match self.load_policy() {
            crate::character::LoadPolicy::Abort => println!("  load-policy: abort"),
            crate::character::LoadPolicy::Skip => println!("  load-policy: skip"),
        }
        match self.request_timeout_secs {
            Some(secs) => println!("  request-timeout: {secs}s"),
            None => println!("  request-timeout: (unset)"),
        }
        match self.speech.enabled {
            true => println!("  speech: on"),
            false => println!("  speech: off"),
        }
        println!("  speech-program: {}", self.speech.program);
        println!("  speech-rate: {}", self.speech.rate);
        println!("  speech-volume: {}", self.speech.volume);
        match &self.speech.voice {
            Some(voice) => println!("  speech-voice: {voice}"),
            None => println!("  speech-voice: (default)"),
        }
    }
}
