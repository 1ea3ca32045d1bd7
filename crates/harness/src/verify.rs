//! Response contract assertions.
//!
//! Each assertion returns a [`ContractViolation`] naming the request instead
//! of panicking, so a scenario failure is reported and the suite continues.

use serde::Serialize;
use serde_json::Value;

use crate::client::{ApiResponse, JSON_UTF8};
use crate::error::ContractViolation;

/// Result of an assertion.
pub type Verdict = Result<(), ContractViolation>;

/// Asserts that the response has the expected status code.
pub fn expect_status(response: &ApiResponse, expected: u16) -> Verdict {
    let actual = response.status_code();
    if actual == expected {
        return Ok(());
    }
    Err(ContractViolation::new(
        response.request(),
        format!(
            "expected status {}, got {} (body: {})",
            expected,
            actual,
            excerpt(response.text())
        ),
    ))
}

/// Asserts the JSON content type on 2xx and 4xx responses.
///
/// Other statuses carry no content-type contract and always pass.
pub fn expect_json_content_type(response: &ApiResponse) -> Verdict {
    let status = response.status();
    if !(status.is_success() || status.is_client_error()) {
        return Ok(());
    }

    match response.content_type() {
        Some(actual) if is_json_utf8(actual) => Ok(()),
        Some(actual) => Err(ContractViolation::new(
            response.request(),
            format!("expected content type {:?}, got {:?}", JSON_UTF8, actual),
        )),
        None => Err(ContractViolation::new(
            response.request(),
            format!("expected content type {:?}, header missing", JSON_UTF8),
        )),
    }
}

/// Asserts an empty body: nothing, whitespace or `{}`.
pub fn expect_empty_body(response: &ApiResponse) -> Verdict {
    if response.is_empty_body() {
        return Ok(());
    }
    Err(ContractViolation::new(
        response.request(),
        format!("expected an empty body, got {}", excerpt(response.text())),
    ))
}

/// Asserts that the decoded body equals `expected`.
pub fn expect_json_eq<T: Serialize + ?Sized>(response: &ApiResponse, expected: &T) -> Verdict {
    let expected = serde_json::to_value(expected).map_err(|e| {
        ContractViolation::new(response.request(), format!("cannot encode expectation: {e}"))
    })?;
    let actual = decode(response)?;
    if actual == expected {
        return Ok(());
    }
    Err(ContractViolation::new(
        response.request(),
        format!("expected body {}, got {}", expected, actual),
    ))
}

/// Asserts that the raw body text contains `needle`.
pub fn expect_body_contains(response: &ApiResponse, needle: &str) -> Verdict {
    if response.text().contains(needle) {
        return Ok(());
    }
    Err(ContractViolation::new(
        response.request(),
        format!(
            "expected body to contain {:?}, got {}",
            needle,
            excerpt(response.text())
        ),
    ))
}

/// Asserts that a decoded list has `expected` items.
pub fn expect_len(request: &str, actual: &[Value], expected: usize) -> Verdict {
    if actual.len() == expected {
        return Ok(());
    }
    Err(ContractViolation::new(
        request,
        format!("expected {} item(s), got {}", expected, actual.len()),
    ))
}

/// Asserts that every expected item appears in `actual`, in any order.
pub fn expect_contains_all(request: &str, actual: &[Value], expected: &[Value]) -> Verdict {
    let missing: Vec<&Value> = expected
        .iter()
        .filter(|item| !actual.contains(item))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(ContractViolation::new(
        request,
        format!("missing item(s) {:?}", missing),
    ))
}

/// Asserts that two values are equal, labelling the comparison.
pub fn expect_eq<T: PartialEq + std::fmt::Debug>(
    request: &str,
    what: &str,
    actual: &T,
    expected: &T,
) -> Verdict {
    if actual == expected {
        return Ok(());
    }
    Err(ContractViolation::new(
        request,
        format!("{}: expected {:?}, got {:?}", what, expected, actual),
    ))
}

/// Decodes the body as JSON, reporting failure as a violation.
pub fn decode(response: &ApiResponse) -> Result<Value, ContractViolation> {
    response.json_value().map_err(|_| {
        ContractViolation::new(
            response.request(),
            format!("expected a JSON body, got {}", excerpt(response.text())),
        )
    })
}

/// Decodes the body as a JSON array.
pub fn decode_list(response: &ApiResponse) -> Result<Vec<Value>, ContractViolation> {
    match decode(response)? {
        Value::Array(items) => Ok(items),
        other => Err(ContractViolation::new(
            response.request(),
            format!("expected a JSON array, got {}", other),
        )),
    }
}

/// Computes the expected result of a PATCH: `patch` merged into `prior`
/// with JSON merge-patch semantics (RFC 7396).
pub fn expected_patch_result<P: Serialize, Q: Serialize>(
    prior: &P,
    patch: &Q,
) -> Result<Value, serde_json::Error> {
    let mut merged = serde_json::to_value(prior)?;
    let patch = serde_json::to_value(patch)?;
    json_patch::merge(&mut merged, &patch);
    Ok(merged)
}

fn is_json_utf8(content_type: &str) -> bool {
    let mut parts = content_type.split(';').map(str::trim);
    let mime = parts.next().unwrap_or_default();
    if !mime.eq_ignore_ascii_case("application/json") {
        return false;
    }
    let params: Vec<&str> = parts.filter(|p| !p.is_empty()).collect();
    matches!(params.as_slice(), [charset] if charset.eq_ignore_ascii_case("charset=utf-8"))
}

fn excerpt(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() <= LIMIT {
        return format!("{:?}", body);
    }
    let head: String = body.chars().take(LIMIT).collect();
    format!("{:?}...", head)
}
