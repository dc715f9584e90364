use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Header carrying the id that ties a request's log lines together.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 64;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn default_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose {
        "openshock_gateway=debug,info"
    } else {
        "openshock_gateway=info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

pub fn init_logger(verbose: bool, json: bool) {
    let registry = tracing_subscriber::registry().with(default_filter(verbose));

    if json {
        // JSON 格式方便日誌收集系統解析
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .init();
    }
}

/// Reuses a caller-supplied id when it is short printable ASCII, otherwise
/// hands out the next local one.
pub fn request_id(supplied: Option<&str>) -> String {
    match supplied {
        Some(id)
            if !id.is_empty()
                && id.len() <= MAX_REQUEST_ID_LEN
                && id.bytes().all(|b| b.is_ascii_graphic()) =>
        {
            id.to_string()
        }
        _ => format!("req-{}", NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)),
    }
}

/// Span for one inbound request; events emitted while handling it, including
/// spawned downstream calls, carry these fields.
pub fn request_span(request_id: &str, method: &str, path: &str) -> Span {
    tracing::info_span!("request", request_id = %request_id, method = %method, path = %path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_reuses_well_formed_header() {
        assert_eq!(request_id(Some("abc-123")), "abc-123");
    }

    #[test]
    fn test_request_id_replaces_unusable_header() {
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        for supplied in [None, Some(""), Some("has space"), Some(long.as_str())] {
            assert!(request_id(supplied).starts_with("req-"));
        }
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(request_id(None), request_id(None));
    }
}
