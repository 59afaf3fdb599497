//! Demonstration of the evtrack pipeline.
//!
//! This example shows how to:
//! 1. Start a tracker on a channel-backed event source
//! 2. Raise events from a separate "host" thread
//! 3. Watch the init and append requests go out
//! 4. End the visit with a teardown flush
//!
//! Run with: cargo run --example replay_demo

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use evtrack::{
    collector::{TargetNode, TouchPoint},
    ChannelSource, Config, ConfigOverrides, EventKind, Host, MemoryTransport, PageMetrics,
    Payload, RawEvent, RawTouchEvent, SourceEvent, StaticMetrics, Tracker,
};

fn main() {
    println!("evtrack - Pipeline Demo");
    println!("=======================");
    println!();

    let mut source = ChannelSource::new();
    let emitter = source.emitter();
    let transport = Arc::new(MemoryTransport::with_init_responses(["42"]));

    let overrides = ConfigOverrides {
        post_interval: Some(0.5),
        sampling_freq: Some(20.0),
        task_name: Some("demo".to_string()),
        ..Default::default()
    };
    let host = Host::new(StaticMetrics(PageMetrics {
        url: "https://example.org/checkout".to_string(),
        screen_width: 1920,
        screen_height: 1080,
        window_width: 1280,
        window_height: 800,
        document_width: 1280,
        document_height: 3000,
    }));

    let mut tracker = match Tracker::start(
        &Config::default(),
        &overrides,
        host,
        transport.clone(),
        &mut source,
    ) {
        Ok(tracker) => tracker,
        Err(e) => {
            eprintln!("Error starting tracker: {e}");
            return;
        }
    };

    println!("Visit: {}", tracker.stats().visit_id());
    println!("Simulating two seconds of activity...");
    println!();

    let host_thread = thread::spawn(move || {
        let form = vec![
            TargetNode::new("html", 1),
            TargetNode::new("body", 1),
            TargetNode::new("form", 1).with_id("checkout"),
            TargetNode::new("input", 2),
        ];
        for step in 0..40u64 {
            let t = step * 50;
            emitter.emit(SourceEvent::Event {
                kind: EventKind::MouseMove,
                event: RawEvent::at_position(t, 200.0 + step as f64 * 4.0, 300.0)
                    .with_target(form.clone()),
            });
            if step % 10 == 0 {
                emitter.emit(SourceEvent::Event {
                    kind: EventKind::KeyDown,
                    event: RawEvent::at(t + 1).with_target(form.clone()),
                });
            }
            if step == 25 {
                emitter.emit(SourceEvent::Touch {
                    kind: EventKind::TouchStart,
                    event: RawTouchEvent {
                        timestamp_ms: t + 2,
                        touches: vec![
                            TouchPoint::new(1, 400.0, 500.0),
                            TouchPoint::new(2, 420.0, 520.0),
                        ],
                        target: form.clone(),
                    },
                });
            }
            thread::sleep(Duration::from_millis(50));
        }
        emitter.teardown();
    });

    let reason = tracker.run(&AtomicBool::new(true));
    let _ = host_thread.join();

    println!("Stopped ({reason:?})");
    println!();
    for (i, request) in transport.requests().iter().enumerate() {
        let kind = match &request.payload {
            Payload::Init(_) => "init".to_string(),
            Payload::Append(append) => format!("append uid={}", append.session_id),
        };
        println!(
            "  #{:<2} {:<14} {:>3} records{}",
            i + 1,
            kind,
            request.payload.record_count(),
            if request.synchronous { " (sync)" } else { "" }
        );
    }
    println!();
    println!("{}", tracker.stats().summary());
}
