/// Strip the signature segment so a token can be logged.
///
/// Anything that is not a three-segment compact token is returned unchanged.
pub fn sanitize_token(token: &str) -> &str {
    let mut dots = token.match_indices('.').map(|(i, _)| i);
    match (dots.next(), dots.next(), dots.next()) {
        (Some(_), Some(second), None) => &token[..second],
        _ => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_signature_segment() {
        assert_eq!(sanitize_token("aGVhZGVy.cGF5bG9hZA.c2ln"), "aGVhZGVy.cGF5bG9hZA");
    }

    #[test]
    fn leaves_non_tokens_alone() {
        assert_eq!(sanitize_token("mock-string"), "mock-string");
        assert_eq!(sanitize_token(""), "");
        assert_eq!(sanitize_token("a.b"), "a.b");
        assert_eq!(sanitize_token("a.b.c.d"), "a.b.c.d");
    }
}
