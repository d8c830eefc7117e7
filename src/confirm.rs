use dialoguer::{Confirm as ConfirmPrompt, Password};

/// Interactive yes/no gate in front of destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every prompt the same way (`--yes`, tests).
#[derive(Debug, Clone, Copy)]
pub struct Fixed(pub bool);

impl Confirm for Fixed {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Terminal prompt defaulting to "no". A prompt that cannot be shown
/// (no TTY, closed stdin) counts as a refusal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        match ConfirmPrompt::new().with_prompt(prompt).default(false).interact() {
            Ok(answer) => answer,
            Err(err) => {
                tracing::warn!(error = %err, "confirmation prompt failed; treating as no");
                false
            }
        }
    }
}

/// Reads a password without echoing it. `repeat` asks twice, for sign-up.
pub fn read_password(repeat: bool) -> Result<String, dialoguer::Error> {
    let prompt = Password::new().with_prompt("Password");
    if repeat {
        prompt
            .with_confirmation("Password (again)", "Passwords do not match")
            .interact()
    } else {
        prompt.interact()
    }
}
