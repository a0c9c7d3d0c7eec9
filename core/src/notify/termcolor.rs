// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
A notification backend that sends colorized output to the terminal.

Notes go to standard output; everything else goes to standard error, so that
pipeline runs redirected to a log file still surface their warnings.

*/

use anyhow::Error;
use std::backtrace::BacktraceStatus;
use std::fmt::Arguments;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use super::{ChatterLevel, NotificationBackend, NotificationKind};

/// A notification backend that writes colorized output to the terminal.
///
/// This struct implements the NotificationBackend trait, and emits
/// notifications to standard output and standard error with colorized
/// prefixes.
pub struct TermcolorNotificationBackend {
    chatter: ChatterLevel,
    stdout: StandardStream,
    stderr: StandardStream,
    note_spec: ColorSpec,
    warning_spec: ColorSpec,
    severe_spec: ColorSpec,
    fatal_spec: ColorSpec,
}

impl TermcolorNotificationBackend {
    /// Create a new TermcolorNotificationBackend.
    pub fn new(chatter: ChatterLevel) -> TermcolorNotificationBackend {
        let mut note_spec = ColorSpec::new();
        note_spec.set_fg(Some(Color::Green)).set_bold(true);

        let mut warning_spec = ColorSpec::new();
        warning_spec.set_fg(Some(Color::Yellow)).set_bold(true);

        let mut severe_spec = ColorSpec::new();
        severe_spec.set_fg(Some(Color::Red)).set_bold(true);

        let mut fatal_spec = ColorSpec::new();
        fatal_spec
            .set_fg(Some(Color::Red))
            .set_bold(true)
            .set_underline(true);

        TermcolorNotificationBackend {
            chatter,
            stdout: StandardStream::stdout(ColorChoice::Auto),
            stderr: StandardStream::stderr(ColorChoice::Auto),
            note_spec,
            warning_spec,
            severe_spec,
            fatal_spec,
        }
    }

    fn is_muted(&self, kind: NotificationKind) -> bool {
        kind == NotificationKind::Note && self.chatter <= ChatterLevel::Minimal
    }

    fn styled<F>(&mut self, kind: NotificationKind, f: F)
    where
        F: FnOnce(&mut StandardStream),
    {
        if self.is_muted(kind) {
            return;
        }

        let (spec, stream) = match kind {
            NotificationKind::Note => (&self.note_spec, &mut self.stdout),
            NotificationKind::Warning => (&self.warning_spec, &mut self.stderr),
            NotificationKind::Severe => (&self.severe_spec, &mut self.stderr),
            NotificationKind::Fatal => (&self.fatal_spec, &mut self.stderr),
        };

        // Coloring failures are cosmetic; the text still goes out below.
        let _ = stream.set_color(spec);
        f(stream);
        let _ = stream.reset();
    }

    fn with_stream<F>(&mut self, kind: NotificationKind, f: F)
    where
        F: FnOnce(&mut StandardStream),
    {
        if self.is_muted(kind) {
            return;
        }

        let stream = match kind {
            NotificationKind::Note => &mut self.stdout,
            _ => &mut self.stderr,
        };

        f(stream);
    }

    fn generic_message(&mut self, kind: NotificationKind, prefix: Option<&str>, args: Arguments) {
        let text = match prefix {
            Some(s) => s,
            None => match kind {
                NotificationKind::Note => "note:",
                NotificationKind::Warning => "warning:",
                NotificationKind::Severe => "severe:",
                NotificationKind::Fatal => "fatal:",
            },
        };

        self.styled(kind, |s| {
            let _ = write!(s, "{text}");
        });
        self.with_stream(kind, |s| {
            let _ = writeln!(s, " {args}");
        });
    }

    fn dump_chain(&mut self, kind: NotificationKind, err: &Error, first_prefix: &str) {
        let mut prefix = first_prefix;

        for cause in err.chain() {
            self.generic_message(kind, Some(prefix), format_args!("{cause}"));
            prefix = "caused by:";
        }

        let backtrace = err.backtrace();

        if backtrace.status() == BacktraceStatus::Captured {
            self.generic_message(kind, Some("debugging:"), format_args!("backtrace follows:"));
            self.with_stream(kind, |s| {
                let _ = writeln!(s, "{backtrace}");
            });
        }
    }

    /// Print the information contained in an Error object.
    ///
    /// This function prints out the error, the sub-errors that caused it, and
    /// its associated backtrace if one was captured, with colorization.
    pub fn bare_error<E: Into<Error>>(&mut self, err: E) {
        let err = err.into();
        self.dump_chain(NotificationKind::Severe, &err, "error:");
    }
}

impl NotificationBackend for TermcolorNotificationBackend {
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>) {
        self.generic_message(kind, None, args);

        if let Some(e) = err {
            self.dump_chain(kind, &e, "caused by:");
        }
    }
}
