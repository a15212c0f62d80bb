/// Rough token count for text the provider did not meter: ceil(chars * 1.2)
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u64;
    let estimate = (chars * 6).div_ceil(5);
    u32::try_from(estimate).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 2);
        assert_eq!(estimate_tokens("abcde"), 6);
        assert_eq!(estimate_tokens("abcdefghij"), 12);
    }

    #[test]
    fn test_estimate_counts_chars() {
        assert_eq!(estimate_tokens("안녕하세요"), 6);
    }
}
