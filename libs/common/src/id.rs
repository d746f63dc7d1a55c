use chrono::Utc;
use rand::Rng;

/// Mints a fresh client identifier of the form `<unix-seconds>.<random-31-bit>`.
///
/// Identifiers are deliberately not unique across concurrent connections: the
/// same browser opening two tabs presents the same identifier twice, and both
/// connections are first-class peers.
///
/// # Examples
/// ```
/// let id = bounce_common::id::mint_client_id();
/// assert!(id.contains('.'));
/// ```
pub fn mint_client_id() -> String {
    format!(
        "{}.{}",
        Utc::now().timestamp(),
        rand::rng().random_range(0..1_i64 << 31),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_format_is_seconds_dot_random() {
        let id = mint_client_id();
        let (secs, tail) = id.split_once('.').expect("dot separator");

        let secs: i64 = secs.parse().expect("leading unix seconds");
        let now = Utc::now().timestamp();
        assert!(secs > 0 && secs <= now);

        let tail: i64 = tail.parse().expect("trailing random part");
        assert!((0..1_i64 << 31).contains(&tail));
    }

    #[test]
    fn mint_varies() {
        let a = mint_client_id();
        let b = mint_client_id();
        assert_ne!(a, b);
    }
}
