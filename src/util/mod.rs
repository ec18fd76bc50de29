pub mod env;
pub mod telemetry;

/// Compares two `&str`s in constant time with respect to their contents
pub fn constant_time_cmp(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let res = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (l, r)| acc | std::hint::black_box(l ^ r));

    std::hint::black_box(res) == 0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_const_time_cmp() {
        let expects = "internal_token";
        let passing = "internal_token";

        let bad_start = "__ternal_token";
        let bad_end = "internal_tok__";

        let short = "internal_toke";
        let long = "internal_token_";

        assert!(constant_time_cmp(expects, passing));
        assert!(!constant_time_cmp(expects, bad_start));
        assert!(!constant_time_cmp(expects, bad_end));
        assert!(!constant_time_cmp(expects, short));
        assert!(!constant_time_cmp(expects, long));
        assert!(constant_time_cmp("", ""));
    }
}
