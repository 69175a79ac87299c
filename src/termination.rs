//! Defines the [`Termination`] trait.

use std::{convert::Infallible, fmt::Debug, process};

/// Extends [`std::process::Termination`] with a success check.
///
/// The application code runs on a secondary thread while the main thread is owned by the window
/// event loop, which never returns. [`gui::run`] therefore exits the process itself, picking the
/// exit status from the [`Termination`] value returned by the application.
///
/// [`gui::run`]: crate::gui::run
pub trait Termination: process::Termination {
    fn is_success(&self) -> bool;
}

impl Termination for Infallible {
    fn is_success(&self) -> bool {
        match *self {}
    }
}

impl Termination for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn is_success(&self) -> bool {
        match self {
            Ok(term) => term.is_success(),
            Err(_) => false,
        }
    }
}
