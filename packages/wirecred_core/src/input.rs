//! Input collaborator interface
//!
//! The core never reads the terminal itself. The CLI (or a test double)
//! supplies prompting through this trait.

use std::io;

use crate::crypto::Secret;

pub trait Prompt {
    /// Ask for a line of text, offering `default` when the user enters
    /// nothing. An empty `default` means the answer is free-form.
    fn ask_string(&mut self, question: &str, default: &str) -> io::Result<String>;

    /// Ask for a password. With `confirm` the entry is collected twice and
    /// must match (used when setting a password for the first time).
    fn ask_password(&mut self, question: &str, confirm: bool) -> io::Result<Secret>;
}
