//! Line-delimited JSON input.
//!
//! Each line is either a bridge payload
//! (`{"device_id": "...", "button_type": "raise", "action": "press"}`) or a
//! pause (`{"wait_ms": 800}`) used to script holds. Blank lines are skipped.
//! Lines that fail to parse are logged and skipped.

use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use picolink_app::ports::EventPublisher;
use picolink_domain::button::{ButtonEvent, RawButtonEvent};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputLine {
    Wait { wait_ms: u64 },
    Event(RawButtonEvent),
}

/// Counters reported once the input is exhausted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InputStats {
    pub published: usize,
    pub skipped: usize,
}

/// Read `reader` to the end, publishing every valid event and sleeping on
/// every wait line.
///
/// # Errors
///
/// Returns the underlying I/O error if reading fails.
pub async fn pump<Rd, P>(reader: Rd, publisher: &P) -> std::io::Result<InputStats>
where
    Rd: AsyncBufRead + Unpin,
    P: EventPublisher,
{
    let mut stats = InputStats::default();
    let mut lines = reader.lines();
    let mut line_no = 0_usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<InputLine>(line)
            .map_err(|err| err.to_string())
            .and_then(|input| match input {
                InputLine::Wait { wait_ms } => Ok(Err(Duration::from_millis(wait_ms))),
                InputLine::Event(raw) => ButtonEvent::try_from(raw)
                    .map(Ok)
                    .map_err(|err| err.to_string()),
            });
        match parsed {
            Ok(Ok(event)) => {
                publisher.publish(event).await;
                stats.published += 1;
            }
            Ok(Err(wait)) => tokio::time::sleep(wait).await,
            Err(reason) => {
                tracing::warn!(line = line_no, error = %reason, "input line skipped");
                stats.skipped += 1;
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use picolink_app::event_bus::InProcessEventBus;
    use picolink_domain::button::{Button, Phase};

    #[tokio::test(start_paused = true)]
    async fn should_publish_valid_lines_and_skip_the_rest() {
        let bus = InProcessEventBus::new(16);
        let mut events = bus.subscribe();
        let input = concat!(
            r#"{"device_id": "r", "button_type": "raise", "action": "press"}"#,
            "\n\n",
            r#"{"device_id": "r", "button_type": "favorite", "action": "press"}"#,
            "\n",
            "not json\n",
            r#"{"device_id": "r", "button_type": "RAISE", "action": "Release"}"#,
            "\n",
        );

        let stats = pump(input.as_bytes(), &bus).await.unwrap();

        assert_eq!(
            stats,
            InputStats {
                published: 2,
                skipped: 2
            }
        );
        let first = events.recv().await.unwrap();
        assert_eq!((first.button, first.phase), (Button::Raise, Phase::Press));
        let second = events.recv().await.unwrap();
        assert_eq!(second.phase, Phase::Release);
    }

    #[tokio::test(start_paused = true)]
    async fn should_sleep_on_wait_lines() {
        let bus = InProcessEventBus::new(16);
        let started = tokio::time::Instant::now();
        let input = "{\"wait_ms\": 800}\n{\"wait_ms\": 200}\n";

        let stats = pump(input.as_bytes(), &bus).await.unwrap();

        assert_eq!(stats, InputStats::default());
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }
}
