const REGISTER_ATTEMPT_PREFIX: &str = "register_attempt";
const TWO_FACTOR_CHALLENGE_PREFIX: &str = "2fa_auth";
const REFRESH_TOKEN_PREFIX: &str = "refresh_token";

/// Username lock key. The username is trimmed and lowercased so that
/// `" Alice"` and `"alice"` contend for the same lock.
pub fn register_attempt_key(username: &str) -> String {
    format!(
        "{}:{}",
        REGISTER_ATTEMPT_PREFIX,
        username.trim().to_lowercase()
    )
}

pub fn two_factor_challenge_key(user_id: i64) -> String {
    format!("{}:{}", TWO_FACTOR_CHALLENGE_PREFIX, user_id)
}

pub fn refresh_token_key(token_id: &str) -> String {
    format!("{}:{}", REFRESH_TOKEN_PREFIX, token_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_attempt_key_is_normalized() {
        assert_eq!(register_attempt_key("  ALICE "), "register_attempt:alice");
        assert_eq!(register_attempt_key("alice"), register_attempt_key("Alice"));
    }

    #[test]
    fn test_keys_do_not_collide_across_kinds() {
        assert_ne!(two_factor_challenge_key(7), refresh_token_key("7"));
        assert_eq!(two_factor_challenge_key(7), "2fa_auth:7");
        assert_eq!(refresh_token_key("abc"), "refresh_token:abc");
    }
}
