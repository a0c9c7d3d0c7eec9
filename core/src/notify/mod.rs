// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
A framework for notifying users about what tools are doing.

This module provides a way for Apersharp pipeline stages to notify the user
about actions taken, problems, and so on. The stages never print directly:
they take a `&mut dyn NotificationBackend` and report through the `an_*`
macros, so that the command-line driver can colorize the output and tests can
capture it.

*/

#[cfg(feature = "notifications")]
pub mod termcolor;

use anyhow::Error;
use std::cmp;
use std::fmt::Arguments;

/// How chatty the notification system should be.
#[repr(usize)]
#[derive(Clone, Copy, Eq, Debug)]
pub enum ChatterLevel {
    /// A minimal level of output — only warnings and errors will be reported.
    Minimal = 0,

    /// The normal level of output — informational messages will be reported.
    Normal,
}

impl PartialEq for ChatterLevel {
    #[inline]
    fn eq(&self, other: &ChatterLevel) -> bool {
        *self as usize == *other as usize
    }
}

impl PartialOrd for ChatterLevel {
    #[inline]
    fn partial_cmp(&self, other: &ChatterLevel) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChatterLevel {
    #[inline]
    fn cmp(&self, other: &ChatterLevel) -> cmp::Ordering {
        (*self as usize).cmp(&(*other as usize))
    }
}

/// The kind of notification that is being produced.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NotificationKind {
    /// An informational notice.
    Note,

    /// Warning of an unusual condition; the program will likely perform as intended.
    Warning,

    /// Notification of a severe problem; the program will likely fail but will attempt to contine.
    Severe,

    /// Notification of a fatal error; the program must give up.
    Fatal,
}

/// Trait for type that handle notifications to the user.
pub trait NotificationBackend {
    /// Notify the user about an event.
    ///
    /// If `err` is not `None`, the information contained in the object should
    /// be reported after the main message.
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>);
}

/// Send an informational notification to the user.
///
/// Standard usage looks like this:
///
/// ```rust,ignore
/// an_note!(nbe, "found {} sources in beam {}", n_src, beam);
/// ```
///
/// where `nbe` is a type implementing the NotificationBackend trait. You may
/// also provide an Error value after a semicolon; the information it contains
/// will be printed after the informational message. This is not expected to
/// be common usage for this particular macro, but makes more sense for the
/// `an_warning!`, `an_severe!`, and `an_fatal!` macros.
#[macro_export]
macro_rules! an_note {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Note, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Note, format_args!($( $fmt_args ),*), Some($err.into()))
    };
}

/// Warn the user of a problematic condition.
///
/// See the documentation of `an_note!` for usage information. This macro
/// should be used when an unusual condition has been detected, but the task
/// at hand will likely succeed: a beam without a catalog, a source without a
/// spectrum.
#[macro_export]
macro_rules! an_warning {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Warning, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Warning, format_args!($( $fmt_args ),*), Some($err.into()))
    };
}

/// Notify the user of a severe problem.
///
/// See the documentation of `an_note!` for usage information. This macro
/// should be used when an issue has been detected that makes it likely that
/// the task at hand cannot be completed successfully; however, the program
/// will attempt to continue.
#[macro_export]
macro_rules! an_severe {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Severe, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Severe, format_args!($( $fmt_args ),*), Some($err.into()))
    };
}

/// Notify the user of a fatal problem.
///
/// See the documentation of `an_note!` for usage information. This macro
/// should be used when an issue has been detected that forces the program to
/// give up on the task at hand.
#[macro_export]
macro_rules! an_fatal {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Fatal, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Fatal, format_args!($( $fmt_args ),*), Some($err.into()))
    };
}

#[derive(Debug)]
struct NotificationData {
    kind: NotificationKind,
    text: String,
    cause: Option<String>,
}

/// A notification backend that buffers notifications and emits them later.
#[derive(Debug, Default)]
pub struct BufferingNotificationBackend {
    buf: Vec<NotificationData>,
}

impl BufferingNotificationBackend {
    /// Create and return a new BufferingNotificationBackend.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Count the buffered notifications of the given kind.
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.buf.iter().filter(|d| d.kind == kind).count()
    }

    /// Iterate over the text of the buffered notifications of the given kind.
    pub fn messages(&self, kind: NotificationKind) -> impl Iterator<Item = &str> {
        self.buf
            .iter()
            .filter(move |d| d.kind == kind)
            .map(|d| d.text.as_str())
    }

    /// Iterate over the attached error chains of the buffered notifications
    /// of the given kind, rendered as `outer: inner: ...`.
    ///
    /// Notifications without an attached error are skipped.
    pub fn causes(&self, kind: NotificationKind) -> impl Iterator<Item = &str> {
        self.buf
            .iter()
            .filter(move |d| d.kind == kind)
            .filter_map(|d| d.cause.as_deref())
    }
}

impl NotificationBackend for BufferingNotificationBackend {
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>) {
        self.buf.push(NotificationData {
            kind,
            text: format!("{args}"),
            cause: err.map(|e| format!("{e:#}")),
        });
    }
}

/// An extension trait for adding standard notification arguments to a clap
/// Command object.
#[cfg(feature = "notifications")]
pub trait ClapNotificationArgsExt {
    /// Add standard Apersharp notification-related arguments to this Command.
    fn apersharp_notify_args(self) -> Self;
}

#[cfg(feature = "notifications")]
impl ClapNotificationArgsExt for clap::Command {
    fn apersharp_notify_args(self) -> Self {
        self.arg(
            clap::Arg::new("chatter_level")
                .long("chatter")
                .short('c')
                .value_name("LEVEL")
                .help("How much chatter to print when running")
                .value_parser(["default", "minimal"])
                .default_value("default")
                .global(true),
        )
    }
}

/// Run a function with colorized reporting of errors.
#[cfg(feature = "notifications")]
pub fn run_with_notifications<E, F>(matches: clap::ArgMatches, inner: F) -> i32
where
    E: Into<Error>,
    F: FnOnce(clap::ArgMatches, &mut dyn NotificationBackend) -> Result<i32, E>,
{
    let chatter = match matches
        .get_one::<String>("chatter_level")
        .map(|s| s.as_str())
    {
        Some("minimal") => ChatterLevel::Minimal,
        _ => ChatterLevel::Normal,
    };

    // Set up colorized output. At one point we might add an option to disable
    // this, which is why the inner function takes a boxed trait object.

    let mut tnb = termcolor::TermcolorNotificationBackend::new(chatter);

    match inner(matches, &mut tnb) {
        Ok(ret) => ret,

        Err(e) => {
            tnb.bare_error(e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffering_counts_by_kind() {
        let mut nbe = BufferingNotificationBackend::new();
        an_note!(nbe, "note {}", 1);
        an_warning!(nbe, "warning {}", 2);
        an_warning!(nbe, "warning {}", 3);

        assert_eq!(nbe.count(NotificationKind::Note), 1);
        assert_eq!(nbe.count(NotificationKind::Warning), 2);
        assert_eq!(nbe.count(NotificationKind::Fatal), 0);

        let warnings: Vec<_> = nbe.messages(NotificationKind::Warning).collect();
        assert_eq!(warnings, vec!["warning 2", "warning 3"]);
    }

    #[test]
    fn attached_errors_keep_their_chain() {
        let mut nbe = BufferingNotificationBackend::new();
        an_severe!(nbe, "oops"; anyhow::anyhow!("inner cause").context("outer"));
        an_severe!(nbe, "no cause");

        assert_eq!(nbe.count(NotificationKind::Severe), 2);
        assert_eq!(nbe.messages(NotificationKind::Severe).next(), Some("oops"));

        let causes: Vec<_> = nbe.causes(NotificationKind::Severe).collect();
        assert_eq!(causes, vec!["outer: inner cause"]);
    }

    #[test]
    fn chatter_ordering() {
        assert!(ChatterLevel::Minimal < ChatterLevel::Normal);
    }
}
