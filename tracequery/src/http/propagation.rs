//! Request-scoped propagation concerns: bearer tokens, tenant headers,
//! and the W3C `traceresponse` correlation header.

use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use tracequery_model::{BearerToken, TenantName};

use crate::config::TenancyOptions;
use crate::error::QueryError;

/// Secondary header some ingress proxies use for forwarded credentials.
pub const FORWARDED_ACCESS_TOKEN: &str = "x-forwarded-access-token";

const TRACEPARENT_HEADER: &str = "traceparent";

/// Response header carrying the server-side trace context.
pub const TRACERESPONSE_HEADER: &str = "traceresponse";

/// Extracts a bearer token from `Authorization` or
/// `X-Forwarded-Access-Token`.
///
/// A missing header yields `None`, not an error; a present header must
/// carry the `Bearer` scheme. `Basic` and malformed values are rejected.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<BearerToken>, QueryError> {
    let raw = match headers
        .get(AUTHORIZATION)
        .or_else(|| headers.get(FORWARDED_ACCESS_TOKEN))
    {
        Some(value) => value
            .to_str()
            .map_err(|_| QueryError::Unauthorized("malformed authorization header".to_owned()))?,
        None => return Ok(None),
    };

    match raw.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(Some(BearerToken(token.to_owned())))
        }
        _ => Err(QueryError::Unauthorized(
            "unsupported authorization scheme, expecting 'Bearer'".to_owned(),
        )),
    }
}

/// Extracts and validates the tenant when multi-tenancy is enabled.
///
/// Absent or unknown tenants are unauthorized; with tenancy disabled the
/// header is ignored entirely.
pub fn extract_tenant(
    headers: &HeaderMap,
    options: &TenancyOptions,
) -> Result<Option<TenantName>, QueryError> {
    if !options.enabled {
        return Ok(None);
    }
    let tenant = headers
        .get(options.header.as_str())
        .and_then(|v| v.to_str().ok())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| QueryError::Unauthorized("missing tenant header".to_owned()))?;
    if !options.allows(tenant) {
        return Err(QueryError::Unauthorized("unknown tenant".to_owned()));
    }
    Ok(Some(TenantName(tenant.to_owned())))
}

/// Derives the `traceresponse` header value from an inbound
/// `traceparent`, enabling end-to-end correlation.
///
/// The inbound value is validated field by field per the W3C
/// trace-context rules; anything malformed yields `None` and no
/// response header.
pub fn trace_response_value(request_headers: &HeaderMap) -> Option<HeaderValue> {
    let header = request_headers.get(TRACEPARENT_HEADER)?.to_str().ok()?;
    let parts: Vec<&str> = header.trim().split_terminator('-').collect();
    if parts.len() < 4 {
        return None;
    }

    let version = u8::from_str_radix(parts[0], 16).ok()?;
    if version == u8::MAX || (version == 0 && parts.len() != 4) {
        return None;
    }

    if parts[1].len() != 32
        || parts[2].len() != 16
        || parts[1].chars().any(|c| c.is_ascii_uppercase())
        || parts[2].chars().any(|c| c.is_ascii_uppercase())
    {
        return None;
    }
    let trace_id = u128::from_str_radix(parts[1], 16).ok()?;
    let span_id = u64::from_str_radix(parts[2], 16).ok()?;
    if trace_id == 0 || span_id == 0 {
        return None;
    }

    let flags = u8::from_str_radix(parts[3], 16).ok()?;
    // Only the sampled bit is defined; clear the rest.
    let sampled = flags & 0x01;

    HeaderValue::from_str(&format!("00-{trace_id:032x}-{span_id:016x}-{sampled:02x}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn bearer_tokens_come_from_either_header() {
        let token = extract_bearer_token(&headers(&[("authorization", "Bearer tok-1")]))
            .unwrap()
            .unwrap();
        assert_eq!(token.0, "tok-1");

        let token =
            extract_bearer_token(&headers(&[("x-forwarded-access-token", "Bearer tok-2")]))
                .unwrap()
                .unwrap();
        assert_eq!(token.0, "tok-2");

        assert!(extract_bearer_token(&headers(&[])).unwrap().is_none());
    }

    #[test]
    fn basic_and_malformed_authorization_is_rejected() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "token-without-scheme"] {
            let err =
                extract_bearer_token(&headers(&[("authorization", value)])).unwrap_err();
            assert!(matches!(err, QueryError::Unauthorized(_)), "{value}");
        }
    }

    #[test]
    fn tenancy_disabled_ignores_the_header() {
        let options = TenancyOptions::default();
        assert_eq!(
            extract_tenant(&headers(&[("x-tenant", "acme")]), &options).unwrap(),
            None
        );
    }

    #[test]
    fn tenancy_enabled_requires_a_known_tenant() {
        let options = TenancyOptions {
            enabled: true,
            allowed: vec!["acme".to_owned()],
            ..Default::default()
        };
        let tenant = extract_tenant(&headers(&[("x-tenant", "acme")]), &options)
            .unwrap()
            .unwrap();
        assert_eq!(tenant, TenantName("acme".to_owned()));

        assert!(extract_tenant(&headers(&[]), &options).is_err());
        assert!(extract_tenant(&headers(&[("x-tenant", "globex")]), &options).is_err());
    }

    #[rustfmt::skip]
    fn traceparent_cases() -> Vec<(&'static str, Option<&'static str>)> {
        vec![
            ("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01", Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")),
            ("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00", Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00")),
            // Undefined flag bits clear.
            ("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-09", Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")),
            ("00-00000000000000000000000000000000-00f067aa0ba902b7-01", None),
            ("00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01", None),
            ("00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01", None),
            ("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7", None),
            ("qq-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01", None),
        ]
    }

    #[test]
    fn trace_response_mirrors_valid_traceparents() {
        for (input, expected) in traceparent_cases() {
            let got = trace_response_value(&headers(&[(TRACEPARENT_HEADER, input)]));
            assert_eq!(
                got.as_ref().and_then(|v| v.to_str().ok()),
                expected,
                "input: {input}"
            );
        }
    }
}
