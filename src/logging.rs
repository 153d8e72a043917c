//! Log capture: forward an application's `tracing` events into the console.
//!
//! [`LogCaptureLayer`] is a [`tracing_subscriber`] layer that copies every
//! log event into a channel; [`LogEvents`] drains them, typically once per
//! frame, printing through the console with level colors. This is how an
//! embedder gets its regular `info!`/`warn!` output interleaved with
//! command results in the same terminal.

use std::sync::mpsc;
use std::time::SystemTime;

use tracing::{Level, Subscriber};
use tracing_subscriber::field::Visit;
use tracing_subscriber::Layer;

use crate::core::console::Console;
use crate::term::color;

/// One captured log event.
#[derive(Debug, Clone)]
pub struct LogMessage {
    /// The formatted message contents.
    pub message: String,
    /// The event's target (usually the module path).
    pub target: String,
    /// Verbosity level.
    pub level: Level,
    /// When the event was recorded.
    pub time: SystemTime,
}

/// Create a connected capture layer / drain pair.
///
/// ```
/// use tracing_subscriber::prelude::*;
///
/// let (layer, events) = devcon::log_capture_pair();
/// let subscriber = tracing_subscriber::registry().with(layer);
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!("hello from the app");
/// });
/// assert_eq!(events.drain().count(), 1);
/// ```
pub fn log_capture_pair() -> (LogCaptureLayer, LogEvents) {
    let (sender, receiver) = mpsc::channel();
    (LogCaptureLayer { sender }, LogEvents { receiver })
}

/// A `tracing` layer that captures log events for console display.
pub struct LogCaptureLayer {
    sender: mpsc::Sender<LogMessage>,
}

impl<S: Subscriber> Layer<S> for LogCaptureLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut message = None;
        event.record(&mut MessageVisitor(&mut message));
        if let Some(message) = message {
            let metadata = event.metadata();
            let _ = self.sender.send(LogMessage {
                message,
                target: metadata.target().to_string(),
                level: *metadata.level(),
                time: SystemTime::now(),
            });
        }
    }
}

/// A [`Visit`]or that pulls out the `message` field.
struct MessageVisitor<'a>(&'a mut Option<String>);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = Some(format!("{value:?}"));
        }
    }
}

/// Receiving end of the capture channel.
pub struct LogEvents {
    receiver: mpsc::Receiver<LogMessage>,
}

impl LogEvents {
    /// Pull everything captured so far.
    pub fn drain(&self) -> impl Iterator<Item = LogMessage> + '_ {
        self.receiver.try_iter()
    }

    /// Drain and print through a console, warnings yellow and errors red.
    /// Returns the number of messages printed.
    pub fn print_to(&self, console: &mut Console) -> usize {
        let mut printed = 0usize;
        for msg in self.drain() {
            let code = match msg.level {
                Level::ERROR => color::red(),
                Level::WARN => color::yellow(),
                _ => "",
            };
            if code.is_empty() {
                console.print_ln(&msg.message);
            } else {
                console.set_text_color(code);
                console.print_ln(&msg.message);
                console.restore_text_color();
            }
            printed += 1;
        }
        printed
    }
}
