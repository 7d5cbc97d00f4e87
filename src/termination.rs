//! Exit status of the application thread.

use std::{convert::Infallible, fmt::Debug};

/// Values an application started with [`crate::gui::run`] can return.
///
/// The windowing event loop cannot return control to `main`, so the process is exited directly
/// with the code produced here.
pub trait Termination {
    /// Reports a failure, if any, and returns the process exit code.
    fn exit_code(self) -> i32;
}

impl Termination for () {
    fn exit_code(self) -> i32 {
        0
    }
}

impl Termination for Infallible {
    fn exit_code(self) -> i32 {
        match self {}
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn exit_code(self) -> i32 {
        match self {
            Ok(t) => t.exit_code(),
            Err(e) => {
                // `anyhow::Error`'s `Debug` output includes the cause chain.
                log::error!("{e:?}");
                1
            }
        }
    }
}
