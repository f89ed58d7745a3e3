use std::collections::HashMap;

/// Parse query parameters from a URI string.
///
/// Values are URL-decoded; when a key repeats, the last value wins.
pub fn parse_query_params(uri: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if let Some(query_start) = uri.find('?') {
        let query = &uri[query_start + 1..];
        for param in query.split('&') {
            if let Some(eq_idx) = param.find('=') {
                let key = &param[..eq_idx];
                let encoded_value = &param[eq_idx + 1..];
                let decoded = urlencoding::decode(encoded_value)
                    .unwrap_or(std::borrow::Cow::Borrowed(encoded_value))
                    .to_string();
                params.insert(key.to_string(), decoded);
            } else {
                // Flag parameter without value
                params.insert(param.to_string(), String::new());
            }
        }
    }

    params
}

pub fn get_string(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).cloned()
}

/// Boolean flag parameter (e.g. ?registered=true)
pub fn get_bool_flag(params: &HashMap<String, String>, key: &str) -> bool {
    params.get(key).map(|v| v == "true").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_decodes() {
        let params = parse_query_params("/search?q=hello%20world&filter=popular");
        assert_eq!(params.get("q").map(String::as_str), Some("hello world"));
        assert_eq!(params.get("filter").map(String::as_str), Some("popular"));
    }

    #[test]
    fn no_query_is_empty() {
        assert!(parse_query_params("/feed").is_empty());
    }

    #[test]
    fn flag_params() {
        let params = parse_query_params("/login?registered=true&bare");
        assert!(get_bool_flag(&params, "registered"));
        assert!(!get_bool_flag(&params, "missing"));
        assert_eq!(params.get("bare").map(String::as_str), Some(""));
    }
}
