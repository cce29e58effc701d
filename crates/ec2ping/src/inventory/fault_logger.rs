//! Inventory Fault Logger
//!
//! Client interceptor that logs the outgoing request together with the service's
//! fault body whenever the inventory API answers with a non-success status.
//! Purely diagnostic: every hook returns `Ok(())`.

use crate::observability::events;
use aws_smithy_runtime_api::box_error::BoxError;
use aws_smithy_runtime_api::client::interceptors::context::{
    AfterDeserializationInterceptorContextRef, BeforeTransmitInterceptorContextRef,
};
use aws_smithy_runtime_api::client::interceptors::Intercept;
use aws_smithy_runtime_api::client::runtime_components::RuntimeComponents;
use aws_smithy_types::config_bag::{ConfigBag, Storable, StoreReplace};

/// Longest fault body logged verbatim.
const MAX_LOGGED_BODY: usize = 4096;

#[derive(Debug, Default, Clone, Copy)]
pub struct FaultLogger;

/// Request summary carried from transmit to deserialization for one operation.
#[derive(Debug, Clone)]
struct CapturedRequest(String);

impl Storable for CapturedRequest {
    type Storer = StoreReplace<Self>;
}

impl Intercept for FaultLogger {
    fn name(&self) -> &'static str {
        "InventoryFaultLogger"
    }

    fn read_before_transmit(
        &self,
        context: &BeforeTransmitInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let request = context.request();
        let summary = describe_request(request.method(), request.uri(), request.body().bytes());
        cfg.interceptor_state().store_put(CapturedRequest(summary));
        Ok(())
    }

    fn read_after_deserialization(
        &self,
        context: &AfterDeserializationInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let response = context.response();
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let request = cfg
            .load::<CapturedRequest>()
            .map(|r| r.0.as_str())
            .unwrap_or("<request not captured>");
        let fault = describe_body(response.body().bytes());
        events::inventory_fault(status.as_u16(), request, &fault);
        Ok(())
    }
}

fn describe_request(method: &str, uri: &str, body: Option<&[u8]>) -> String {
    match body {
        Some(bytes) if !bytes.is_empty() => format!("{method} {uri} {}", describe_body(Some(bytes))),
        _ => format!("{method} {uri}"),
    }
}

fn describe_body(body: Option<&[u8]>) -> String {
    match body {
        None => "<streaming body>".to_string(),
        Some(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if text.len() > MAX_LOGGED_BODY {
                let mut cut = MAX_LOGGED_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                format!("{}... ({} bytes)", &text[..cut], bytes.len())
            } else {
                text.into_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_request_includes_form_body() {
        let summary = describe_request(
            "POST",
            "https://ec2.us-west-2.amazonaws.com/",
            Some(b"Action=DescribeInstances&Version=2016-11-15"),
        );
        assert_eq!(
            summary,
            "POST https://ec2.us-west-2.amazonaws.com/ Action=DescribeInstances&Version=2016-11-15"
        );
    }

    #[test]
    fn test_describe_request_without_body() {
        assert_eq!(describe_request("GET", "https://x/", None), "GET https://x/");
        assert_eq!(describe_request("GET", "https://x/", Some(b"")), "GET https://x/");
    }

    #[test]
    fn test_long_fault_body_is_truncated() {
        let body = vec![b'a'; MAX_LOGGED_BODY + 10];
        let text = describe_body(Some(&body));
        assert!(text.starts_with(&"a".repeat(MAX_LOGGED_BODY)));
        assert!(text.ends_with(&format!("({} bytes)", MAX_LOGGED_BODY + 10)));
    }

    #[test]
    fn test_invalid_utf8_does_not_panic() {
        let text = describe_body(Some(&[0xff, 0xfe, b'<']));
        assert!(text.ends_with('<'));
    }
}
