//! Form field encoding of payloads.

use crate::core::Payload;

/// Ordered `(name, value)` pairs for a payload.
///
/// Init: `url, screenw, screenh, winw, winh, docw, doch, info, task, layout, action`.
/// Append: `uid, info, action`.
pub fn form_fields(payload: &Payload) -> Vec<(&'static str, String)> {
    match payload {
        Payload::Init(init) => {
            let m = &init.metrics;
            vec![
                ("url", m.url.clone()),
                ("screenw", m.screen_width.to_string()),
                ("screenh", m.screen_height.to_string()),
                ("winw", m.window_width.to_string()),
                ("winh", m.window_height.to_string()),
                ("docw", m.document_width.to_string()),
                ("doch", m.document_height.to_string()),
                ("info", init.info.clone()),
                ("task", init.task.clone()),
                ("layout", init.layout.to_string()),
                ("action", payload.action().to_string()),
            ]
        }
        Payload::Append(append) => vec![
            ("uid", append.session_id.to_string()),
            ("info", append.info.clone()),
            ("action", payload.action().to_string()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::EventKind;
    use crate::config::Config;
    use crate::core::{EventRecord, SessionId, SessionManager};
    use crate::host::PageMetrics;

    #[test]
    fn test_init_fields_in_order() {
        let metrics = PageMetrics {
            url: "https://example.org/".to_string(),
            screen_width: 1280,
            screen_height: 800,
            window_width: 1200,
            window_height: 700,
            document_width: 1200,
            document_height: 3000,
        };
        let records = vec![EventRecord::new(0, 10, 1, 2, EventKind::Click, "/html")];
        let payload = SessionManager::build_init_payload(&records, metrics, &Config::default());
        let fields = form_fields(&payload);

        let names: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            vec![
                "url", "screenw", "screenh", "winw", "winh", "docw", "doch", "info", "task",
                "layout", "action"
            ]
        );
        assert_eq!(fields[1].1, "1280");
        assert_eq!(fields[7].1, "0 10 1 2 click /html");
        assert_eq!(fields[9].1, "liquid");
        assert_eq!(fields[10].1, "init");
    }

    #[test]
    fn test_append_fields() {
        let id = SessionId::new(42).unwrap();
        let payload = SessionManager::build_append_payload(id, &[]);
        assert_eq!(
            form_fields(&payload),
            vec![
                ("uid", "42".to_string()),
                ("info", String::new()),
                ("action", "append".to_string()),
            ]
        );
    }
}
