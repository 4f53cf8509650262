use std::time::Duration;

/// Shortest lifetime the policy ever hands out.
pub const MIN_LIVE_TTL: Duration = Duration::from_secs(8);

/// Cache lifetime (and base poll interval) for the live snapshot given how
/// many fixtures are currently in play.
///
/// Non-increasing in `live_count`: nothing live → long TTL to save upstream
/// calls; lots live → short TTL so goals reach subscribers quickly.
pub fn live_ttl(live_count: usize) -> Duration {
    let ttl = match live_count {
        0 => Duration::from_secs(45),
        1..=5 => Duration::from_secs(15),
        6..=15 => Duration::from_secs(10),
        _ => MIN_LIVE_TTL,
    };
    ttl.max(MIN_LIVE_TTL)
}

/// TTL applied to the cached snapshot: whole seconds, never below one.
pub fn live_cache_ttl(live_count: usize) -> Duration {
    let ms = live_ttl(live_count).as_millis() as u64;
    let secs = ((ms + 500) / 1000).max(1);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_is_longest() {
        assert_eq!(live_ttl(0), Duration::from_secs(45));
    }

    #[test]
    fn test_busy_is_floor() {
        assert_eq!(live_ttl(16), MIN_LIVE_TTL);
        assert_eq!(live_ttl(500), MIN_LIVE_TTL);
    }

    #[test]
    fn test_monotonically_non_increasing() {
        let mut prev = live_ttl(0);
        for n in 1..200 {
            let cur = live_ttl(n);
            assert!(cur <= prev, "ttl({}) = {:?} > ttl({}) = {:?}", n, cur, n - 1, prev);
            assert!(cur >= MIN_LIVE_TTL);
            prev = cur;
        }
    }

    #[test]
    fn test_cache_ttl_whole_seconds() {
        assert_eq!(live_cache_ttl(3), Duration::from_secs(15));
        assert_eq!(live_cache_ttl(10), Duration::from_secs(10));
    }
}
