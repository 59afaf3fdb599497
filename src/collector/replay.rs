//! Replays a recorded JSON Lines event stream as an event source.
//!
//! Each line is one [`SourceEvent`]. Malformed lines are skipped with a
//! warning. End of input is delivered as `Teardown`.

use super::{category_mask, passes, CollectorError, EventSource, SourceEvent, CHANNEL_CAPACITY};
use crate::config::SourceConfig;
use crossbeam_channel::{bounded, Receiver};
use std::io::BufRead;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Event source reading JSON Lines from any buffered reader.
pub struct ReplaySource {
    reader: Option<Box<dyn BufRead + Send>>,
    realtime: bool,
}

impl ReplaySource {
    pub fn new(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            realtime: false,
        }
    }

    /// Sleep between events according to their timestamps so that timers
    /// fire as they would have during the recorded visit.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

impl EventSource for ReplaySource {
    fn subscribe(&mut self, sources: &SourceConfig) -> Result<Receiver<SourceEvent>, CollectorError> {
        if !sources.any_enabled() {
            return Err(CollectorError::NothingSubscribed);
        }
        let reader = self.reader.take().ok_or(CollectorError::AlreadySubscribed)?;
        let mask = category_mask(sources);
        let realtime = self.realtime;
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);

        thread::Builder::new()
            .name("evtrack-replay".to_string())
            .spawn(move || {
                let mut last_ts: Option<u64> = None;
                for (number, line) in reader.lines().enumerate() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("replay input error: {e}");
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let event: SourceEvent = match serde_json::from_str(&line) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(line = number + 1, "skipping malformed event: {e}");
                            continue;
                        }
                    };

                    if realtime {
                        if let Some(ts) = timestamp_of(&event) {
                            if let Some(prev) = last_ts {
                                thread::sleep(Duration::from_millis(ts.saturating_sub(prev)));
                            }
                            last_ts = Some(ts);
                        }
                    }

                    let is_teardown = event == SourceEvent::Teardown;
                    if passes(mask, &event) && sender.send(event).is_err() {
                        return;
                    }
                    if is_teardown {
                        return;
                    }
                }
                debug!("replay input exhausted");
                let _ = sender.send(SourceEvent::Teardown);
            })
            .map_err(|e| CollectorError::Io(e.to_string()))?;

        Ok(receiver)
    }
}

fn timestamp_of(event: &SourceEvent) -> Option<u64> {
    match event {
        SourceEvent::Event { event, .. } => Some(event.timestamp_ms),
        SourceEvent::Touch { event, .. } => Some(event.timestamp_ms),
        SourceEvent::Teardown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::EventKind;
    use std::io::Cursor;

    const INPUT: &str = r#"{"type":"event","kind":"mousemove","event":{"timestamp_ms":0,"page_x":1,"page_y":2}}
not json
{"type":"event","kind":"keydown","event":{"timestamp_ms":5}}

{"type":"touch","kind":"touchstart","event":{"timestamp_ms":9,"touches":[{"identifier":1,"page_x":3,"page_y":4}]}}
"#;

    #[test]
    fn test_replay_filters_and_ends_with_teardown() {
        let mut source = ReplaySource::new(Cursor::new(INPUT));
        let receiver = source
            .subscribe(&SourceConfig::from_csv("mouse,touch"))
            .unwrap();

        let events: Vec<SourceEvent> = receiver.iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0],
            SourceEvent::Event {
                kind: EventKind::MouseMove,
                ..
            }
        ));
        assert!(matches!(events[1], SourceEvent::Touch { .. }));
        assert_eq!(events[2], SourceEvent::Teardown);
    }

    #[test]
    fn test_replay_subscribes_once() {
        let mut source = ReplaySource::new(Cursor::new(""));
        let receiver = source.subscribe(&SourceConfig::default()).unwrap();
        assert_eq!(receiver.recv().unwrap(), SourceEvent::Teardown);
        assert!(matches!(
            source.subscribe(&SourceConfig::default()),
            Err(CollectorError::AlreadySubscribed)
        ));
    }
}
