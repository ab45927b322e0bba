// gateway-server/src/orchestrator/output.rs
//! Captured toolkit output and extraction of its JSON result.
//!
//! Contract with the toolkit: the structured result is the last thing it
//! prints, either as a single line `TOOLKIT_RESULT {...}` or as a trailing
//! JSON object that no later diagnostic line follows with another `{`.
//! Deployments may instead end with a plain `Market: 0x...` line, which is
//! what the factory script prints once it has seen `MarketCreated`.
use crate::error::{tail_chars, GatewayError, OUTPUT_TAIL_CHARS};
use serde_json::{Map, Value};

/// Prefix of the line carrying the toolkit's result
pub const RESULT_SENTINEL: &str = "TOOLKIT_RESULT ";

/// Prefix of the factory script's closing line
const MARKET_LINE: &str = "Market:";

// Candidates tried when scanning backwards for a trailing object
const MAX_BRACE_CANDIDATES: usize = 64;

/// Merged stdout/stderr, capped at `capacity` bytes. Keeps the tail, since
/// the result is printed last.
#[derive(Debug)]
pub struct OutputBuffer {
    data: Vec<u8>,
    capacity: usize,
    truncated: bool,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity: capacity.max(1),
            truncated: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
        if self.data.len() > self.capacity {
            let excess = self.data.len() - self.capacity;
            self.data.drain(..excess);
            self.truncated = true;
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Lossy text view; a cut through a multi-byte char becomes U+FFFD.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Locate the toolkit's JSON result in its output.
pub fn extract_result(output: &str) -> Option<Map<String, Value>> {
    if let Some(object) = output
        .lines()
        .rev()
        .find_map(|line| line.trim_start().strip_prefix(RESULT_SENTINEL))
        .and_then(parse_object)
    {
        return Some(object);
    }

    // Fallback: the last `{` whose suffix parses as one object. Nested
    // objects make the very last `{` an inner one, so earlier candidates
    // are tried too.
    output
        .match_indices('{')
        .map(|(idx, _)| idx)
        .rev()
        .take(MAX_BRACE_CANDIDATES)
        .find_map(|idx| parse_object(&output[idx..]))
}

/// `{"marketAddress": ...}` from the last `Market: <address>` line, if that
/// address is well-formed.
fn market_line(output: &str) -> Option<Map<String, Value>> {
    let raw = output
        .lines()
        .rev()
        .find_map(|line| line.trim_start().strip_prefix(MARKET_LINE))?;
    let address = common::normalize_address(raw.trim()).ok()?;

    let mut result = Map::new();
    result.insert("marketAddress".to_string(), Value::String(address.to_string()));
    Some(result)
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// How strictly a result without an explicit `success` flag is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessRule {
    /// Needs `success: true`
    ExplicitFlag,
    /// `success: true`, or exit 0 plus a well-formed `marketAddress`
    FlagOrMarketAddress,
}

/// Turn exit status and captured output into the toolkit's result object.
pub fn interpret_exit(
    exit_code: Option<i32>,
    output: &str,
    rule: SuccessRule,
) -> Result<Map<String, Value>, GatewayError> {
    let output_tail = tail_chars(output, OUTPUT_TAIL_CHARS);
    let parsed = extract_result(output).or_else(|| match rule {
        SuccessRule::FlagOrMarketAddress => market_line(output),
        SuccessRule::ExplicitFlag => None,
    });
    let exited_cleanly = exit_code == Some(0);

    let result = match parsed {
        Some(result) => result,
        None if exited_cleanly => {
            return Err(GatewayError::ParseError { exit_code, output_tail });
        },
        None => {
            return Err(GatewayError::DeployFailed { exit_code, result: None, output_tail });
        },
    };

    let flag = result.get("success").and_then(Value::as_bool);
    let accepted = exited_cleanly
        && match (flag, rule) {
            (Some(flag), _) => flag,
            (None, SuccessRule::ExplicitFlag) => false,
            (None, SuccessRule::FlagOrMarketAddress) => result
                .get("marketAddress")
                .and_then(Value::as_str)
                .map_or(false, |addr| common::normalize_address(addr).is_ok()),
        };

    if accepted {
        Ok(result)
    } else {
        Err(GatewayError::DeployFailed {
            exit_code,
            result: Some(Value::Object(result)),
            output_tail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MARKET: &str = "0x00000000000000000000000000000000000000ab";

    #[test]
    fn test_trailing_object_after_noise() {
        let output = "Compiling...\nDeployer: 0x1\n{\"success\":true,\"marketAddress\":\"0xabc\"}\n";
        let result = extract_result(output).unwrap();
        assert_eq!(result.get("success"), Some(&json!(true)));
        assert_eq!(result.get("marketAddress"), Some(&json!("0xabc")));
    }

    #[test]
    fn test_no_brace_is_parse_error() {
        let err = interpret_exit(Some(0), "Market: 0xabc\nno json here", SuccessRule::FlagOrMarketAddress)
            .unwrap_err();
        assert!(matches!(err, GatewayError::ParseError { exit_code: Some(0), .. }));
    }

    #[test]
    fn test_factory_market_line() {
        let output = "Deployer: 0x1\nFee bps: 300\nMarket: 0x00000000000000000000000000000000000000AB\n";
        let result = interpret_exit(Some(0), output, SuccessRule::FlagOrMarketAddress).unwrap();
        assert_eq!(result.get("marketAddress"), Some(&json!(MARKET)));

        // No event seen: the script prints a placeholder instead of an address
        let err = interpret_exit(Some(0), "Market: (see tx)\n", SuccessRule::FlagOrMarketAddress).unwrap_err();
        assert!(matches!(err, GatewayError::ParseError { .. }));

        let err = interpret_exit(Some(0), output, SuccessRule::ExplicitFlag).unwrap_err();
        assert!(matches!(err, GatewayError::ParseError { .. }));
    }

    #[test]
    fn test_sentinel_line_wins_over_later_braces() {
        let output = format!(
            "{}{{\"success\":true,\"marketAddress\":\"{}\"}}\nwarning: {{ not json",
            RESULT_SENTINEL, MARKET
        );
        let result = extract_result(&output).unwrap();
        assert_eq!(result.get("marketAddress"), Some(&json!(MARKET)));
    }

    #[test]
    fn test_nested_trailing_object() {
        let output = "log\n{\"success\":true,\"detail\":{\"gas\":1}}";
        let result = extract_result(output).unwrap();
        assert_eq!(result.get("detail"), Some(&json!({"gas": 1})));
    }

    #[test]
    fn test_explicit_failure_with_zero_exit() {
        let output = "{\"success\":false,\"error\":\"reverted\"}";
        let err = interpret_exit(Some(0), output, SuccessRule::FlagOrMarketAddress).unwrap_err();
        match err {
            GatewayError::DeployFailed { exit_code, result, .. } => {
                assert_eq!(exit_code, Some(0));
                assert_eq!(result.unwrap()["error"], json!("reverted"));
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_nonzero_exit_fails_even_with_success_flag() {
        let output = "{\"success\":true}";
        let err = interpret_exit(Some(1), output, SuccessRule::ExplicitFlag).unwrap_err();
        assert!(matches!(err, GatewayError::DeployFailed { exit_code: Some(1), .. }));

        let err = interpret_exit(None, "killed", SuccessRule::ExplicitFlag).unwrap_err();
        assert!(matches!(err, GatewayError::DeployFailed { exit_code: None, result: None, .. }));
    }

    #[test]
    fn test_missing_flag_rules() {
        let with_market = format!("{{\"marketAddress\":\"{}\"}}", MARKET);
        assert!(interpret_exit(Some(0), &with_market, SuccessRule::FlagOrMarketAddress).is_ok());
        assert!(interpret_exit(Some(0), &with_market, SuccessRule::ExplicitFlag).is_err());
        assert!(interpret_exit(Some(0), "{\"marketAddress\":\"0xabc\"}", SuccessRule::FlagOrMarketAddress).is_err());
    }

    #[test]
    fn test_output_tail_is_bounded() {
        let noise = "x".repeat(OUTPUT_TAIL_CHARS * 2);
        match interpret_exit(Some(0), &noise, SuccessRule::ExplicitFlag).unwrap_err() {
            GatewayError::ParseError { output_tail, .. } => {
                assert_eq!(output_tail.len(), OUTPUT_TAIL_CHARS)
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_buffer_keeps_tail() {
        let mut buffer = OutputBuffer::new(8);
        buffer.push(b"hello ");
        assert!(!buffer.is_truncated());
        buffer.push(b"world!");
        assert!(buffer.is_truncated());
        assert_eq!(buffer.to_text(), "o world!");
    }
}
