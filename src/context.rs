use crate::event::MessageContext;
use serde_json::Value;
use std::collections::BTreeMap;

/// Declared role of one parameter of a registered call, supplied by the
/// host at registration time. Replaces runtime inspection of parameter
/// annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// Explicitly tagged as the message payload; used verbatim.
    Payload,
    /// A key-value header bag; scanned for broker-standard keys.
    Headers,
    /// An acknowledgment handle; carries no context.
    Acknowledgment,
    /// Anything else; candidate for the payload-by-default rule.
    Plain,
}

/// Derive a [`MessageContext`] from a call's declared parameter roles and
/// actual arguments.
///
/// A `Payload` parameter is used verbatim. A `Headers` parameter (when it
/// is an object) contributes topic/partition/offset/key and is retained
/// as the raw header bag. Acknowledgment handles are skipped. If no
/// parameter is tagged as payload, the first non-null argument that is
/// neither a headers bag nor an acknowledgment handle is used instead.
/// A statically declared topic binding is recorded even when the headers
/// carry no topic.
pub fn extract_message_context(
    roles: &[ParamRole],
    declared_topics: &[String],
    args: &[Value],
    include_payload: bool,
) -> MessageContext {
    let role_of = |i: usize| roles.get(i).copied().unwrap_or(ParamRole::Plain);

    let mut payload: Option<Value> = None;
    let mut headers: Option<BTreeMap<String, Value>> = None;

    for (i, arg) in args.iter().enumerate() {
        if arg.is_null() {
            continue;
        }
        match role_of(i) {
            ParamRole::Payload => {
                if payload.is_none() {
                    payload = Some(arg.clone());
                }
            }
            ParamRole::Headers => {
                if headers.is_none() {
                    if let Value::Object(map) = arg {
                        headers =
                            Some(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
                    }
                }
            }
            ParamRole::Acknowledgment => {}
            ParamRole::Plain => {}
        }
    }

    // Payload-by-default: first non-null argument with no special role.
    if payload.is_none() {
        for (i, arg) in args.iter().enumerate() {
            if arg.is_null() {
                continue;
            }
            if role_of(i) == ParamRole::Plain {
                payload = Some(arg.clone());
                break;
            }
        }
    }

    let mut context = match &headers {
        Some(bag) => MessageContext::from_headers(bag, payload),
        None => MessageContext {
            payload,
            ..MessageContext::default()
        },
    };

    if !declared_topics.is_empty() {
        context.topic = Some(declared_topics.join(","));
    }

    if !include_payload {
        context.payload = None;
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{HEADER_OFFSET, HEADER_RECEIVED_PARTITION, HEADER_RECEIVED_TOPIC};
    use serde_json::json;

    #[test]
    fn explicit_payload_used_verbatim() {
        let args = vec![json!({"id": "m-1"}), json!("ignored")];
        let ctx = extract_message_context(
            &[ParamRole::Payload, ParamRole::Plain],
            &[],
            &args,
            true,
        );
        assert_eq!(ctx.payload, Some(json!({"id": "m-1"})));
    }

    #[test]
    fn first_non_null_plain_argument_is_default_payload() {
        let args = vec![Value::Null, json!("ack"), json!({"id": "m-2"})];
        let ctx = extract_message_context(
            &[ParamRole::Plain, ParamRole::Acknowledgment, ParamRole::Plain],
            &[],
            &args,
            true,
        );
        assert_eq!(ctx.payload, Some(json!({"id": "m-2"})));
    }

    #[test]
    fn headers_bag_contributes_broker_keys() {
        let args = vec![
            json!({"id": "m-3"}),
            json!({
                HEADER_RECEIVED_TOPIC: "orders",
                HEADER_RECEIVED_PARTITION: 2,
                HEADER_OFFSET: 41,
                "custom": "x"
            }),
        ];
        let ctx = extract_message_context(
            &[ParamRole::Payload, ParamRole::Headers],
            &[],
            &args,
            true,
        );
        assert_eq!(ctx.topic.as_deref(), Some("orders"));
        assert_eq!(ctx.partition, Some(2));
        assert_eq!(ctx.offset, Some(41));
        assert_eq!(ctx.payload, Some(json!({"id": "m-3"})));
        let raw = ctx.raw_headers.unwrap();
        assert_eq!(raw.get("custom"), Some(&json!("x")));
    }

    #[test]
    fn declared_topic_recorded_without_headers() {
        // A handler bound to "test-topic" with a bare payload parameter.
        let args = vec![json!({"id": "error-trigger"})];
        let ctx = extract_message_context(
            &[ParamRole::Plain],
            &["test-topic".to_string()],
            &args,
            true,
        );
        assert_eq!(ctx.topic.as_deref(), Some("test-topic"));
        assert_eq!(ctx.payload, Some(json!({"id": "error-trigger"})));
    }

    #[test]
    fn declared_topics_join_with_comma() {
        let ctx = extract_message_context(
            &[],
            &["a".to_string(), "b".to_string()],
            &[],
            true,
        );
        assert_eq!(ctx.topic.as_deref(), Some("a,b"));
    }

    #[test]
    fn acknowledgment_never_becomes_payload() {
        let args = vec![json!("ack-handle")];
        let ctx = extract_message_context(&[ParamRole::Acknowledgment], &[], &args, true);
        assert_eq!(ctx.payload, None);
    }

    #[test]
    fn payload_omitted_when_disabled() {
        let args = vec![json!({"secret": true})];
        let ctx = extract_message_context(&[ParamRole::Payload], &[], &args, false);
        assert_eq!(ctx.payload, None);
    }
}
