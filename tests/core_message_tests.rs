use frameguard::core::message::{
    decode_envelope, encode_envelope, normalize_score, ScoreResponse, StatelessRequest,
    WireFrame, WireReply, PROTOCOL_VERSION,
};
use frameguard::core::{
    BackgroundToPage, EncodedFrame, GuardError, PageToBackground, StreamId, SubmissionId,
};
use serde_json::{json, Value};

#[test]
fn test_frame_envelope_shape() {
    let message = PageToBackground::Frame {
        image: EncodedFrame::new("data:image/jpeg;base64,AAAA"),
        stream_id: StreamId::new("vid-a"),
    };
    let value: Value = serde_json::from_str(&encode_envelope(&message).unwrap()).unwrap();

    assert_eq!(
        value,
        json!({
            "v": PROTOCOL_VERSION,
            "kind": "frame",
            "image": "data:image/jpeg;base64,AAAA",
            "streamId": "vid-a",
        })
    );
}

#[test]
fn test_unattributed_score_envelope() {
    let raw = encode_envelope(&BackgroundToPage::Score {
        stream_id: None,
        score: 0.25,
    })
    .unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(value["kind"], "score");
    assert_eq!(value["streamId"], Value::Null);
    assert_eq!(
        decode_envelope::<BackgroundToPage>(&raw).unwrap(),
        BackgroundToPage::Score {
            stream_id: None,
            score: 0.25,
        }
    );
}

#[test]
fn test_envelope_rejects_other_versions() {
    let raw = r#"{"v":2,"kind":"reconnect"}"#;
    assert!(matches!(
        decode_envelope::<PageToBackground>(raw),
        Err(GuardError::MalformedReply(_))
    ));
    assert!(decode_envelope::<PageToBackground>(r#"{"kind":"reconnect"}"#).is_err());
}

#[test]
fn test_wire_frame_field_names() {
    let text = serde_json::to_string(&WireFrame {
        frame_id: "f-1",
        image_base64: "data:image/jpeg;base64,AAAA",
    })
    .unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!({"frame_id": "f-1", "image_base64": "data:image/jpeg;base64,AAAA"}));
}

#[test]
fn test_wire_reply_decoding() {
    let reply = WireReply::decode(r#"{"frame_id":"f-1","score":0.9,"extra":true}"#).unwrap();
    assert_eq!(reply.submission_id, SubmissionId::new("f-1"));
    assert_eq!(reply.score().unwrap(), 0.9);

    let aliased = WireReply::decode(r#"{"frameId":"f-2","score":0.1}"#).unwrap();
    assert_eq!(aliased.submission_id.as_str(), "f-2");
}

#[test]
fn test_wire_reply_requires_identifier() {
    for raw in [r#"{"score":0.4}"#, r#"{"frame_id":"","score":0.4}"#, "[1,2]", ""] {
        assert!(
            matches!(WireReply::decode(raw), Err(GuardError::MalformedReply(_))),
            "accepted {:?}",
            raw
        );
    }
}

#[test]
fn test_wire_reply_with_bad_score_keeps_identifier() {
    for raw in [
        r#"{"frame_id":"f-1"}"#,
        r#"{"frame_id":"f-1","score":"high"}"#,
        r#"{"frame_id":"f-1","score":null}"#,
    ] {
        let reply = WireReply::decode(raw).unwrap();
        assert_eq!(reply.submission_id.as_str(), "f-1");
        assert!(
            matches!(reply.score(), Err(GuardError::MalformedReply(_))),
            "scored {:?}",
            raw
        );
    }
}

#[test]
fn test_wire_reply_score_is_clamped() {
    let reply = WireReply::decode(r#"{"frame_id":"f-1","score":3}"#).unwrap();
    assert_eq!(reply.score().unwrap(), 1.0);
}

#[test]
fn test_scores_are_clamped() {
    assert_eq!(normalize_score(1.7).unwrap(), 1.0);
    assert_eq!(normalize_score(-0.2).unwrap(), 0.0);
    assert_eq!(normalize_score(0.42).unwrap(), 0.42);
    assert!(normalize_score(f64::NAN).is_err());
    assert!(normalize_score(f64::INFINITY).is_err());
}

#[test]
fn test_stateless_request_body() {
    let request = StatelessRequest {
        image_base64: "data:image/jpeg;base64,AAAA".to_string(),
        timestamp: "2024-01-01T00:00:00.000Z".to_string(),
        frame_id: "f-9".to_string(),
    };
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["image_base64"], "data:image/jpeg;base64,AAAA");
    assert_eq!(value["timestamp"], "2024-01-01T00:00:00.000Z");
    assert_eq!(value["frame_id"], "f-9");
}

#[test]
fn test_score_response_tolerates_missing_frame_id() {
    let response: ScoreResponse = serde_json::from_str(r#"{"score":0.3}"#).unwrap();
    assert_eq!(response.score, 0.3);
    assert!(response.frame_id.is_none());
}
