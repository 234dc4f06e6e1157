//! Console lines to triggers.

use dmutex::{ProcessId, Trigger};
use futures::{Stream, StreamExt, future};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, warn};

/// Map one input line.
///
/// `x` (either case) requests the critical section; the process's own ID
/// is a local event. Anything else is `None`.
#[must_use]
pub fn parse_line(line: &str, own: ProcessId) -> Option<Trigger> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("x") {
        Some(Trigger::RequestCs)
    } else if line.parse::<u64>() == Ok(own.0) {
        Some(Trigger::LocalTick)
    } else {
        None
    }
}

/// Triggers from every line of `reader`, ending at EOF or on a read error.
pub fn triggers<R>(reader: R, own: ProcessId) -> impl Stream<Item = Trigger>
where
    R: AsyncBufRead,
{
    LinesStream::new(reader.lines())
        .take_while(|line| {
            if let Err(error) = line {
                warn!(%error, "failed to read input");
            }
            future::ready(line.is_ok())
        })
        .filter_map(move |line| {
            let trigger = line.ok().and_then(|line| {
                let trigger = parse_line(&line, own);
                if trigger.is_none() && !line.trim().is_empty() {
                    debug!(%line, "ignoring input");
                }
                trigger
            });
            future::ready(trigger)
        })
}
