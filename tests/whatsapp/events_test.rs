//! Bridge event decoding.

use whatsapp_gateway::whatsapp::client::ClientEvent;
use whatsapp_gateway::whatsapp::events::BridgeEvent;

fn decode(json: &str) -> Vec<ClientEvent> {
    let events: Vec<BridgeEvent> = serde_json::from_str(json).expect("valid event batch");
    events
        .into_iter()
        .filter_map(BridgeEvent::into_client_event)
        .collect()
}

#[test]
fn lifecycle_events_are_mapped() {
    let events = decode(
        r#"[
            {"type": "qr", "qr": "2@abc,def"},
            {"type": "ready"},
            {"type": "disconnected", "reason": "LOGOUT"}
        ]"#,
    );

    assert_eq!(
        events,
        vec![
            ClientEvent::Qr("2@abc,def".to_owned()),
            ClientEvent::Ready,
            ClientEvent::Disconnected {
                reason: Some("LOGOUT".to_owned())
            },
        ]
    );
}

#[test]
fn disconnect_without_reason() {
    let events = decode(r#"[{"type": "disconnected"}]"#);
    assert_eq!(events, vec![ClientEvent::Disconnected { reason: None }]);
}

#[test]
fn untracked_events_are_dropped() {
    let events = decode(
        r#"[
            {"type": "message", "from": "551199999999@c.us", "body": "hi"},
            {"type": "loading_screen", "percent": 40},
            {"type": "ready"}
        ]"#,
    );

    assert_eq!(events, vec![ClientEvent::Ready]);
}

#[test]
fn qr_without_payload_is_rejected() {
    let parsed = serde_json::from_str::<Vec<BridgeEvent>>(r#"[{"type": "qr"}]"#);
    assert!(parsed.is_err());
}
