//! URL/time matching
//!
//! The single predicate deciding whether a policy applies to a URL at an
//! instant. The compiler reuses the same window check; the navigation
//! fallback uses the full predicate directly.

use chrono::{DateTime, Local};
use warden_browser_api::BLOCKED_PAGE_PATH;
use warden_policy::PolicyRecord;

/// Does `policy` block `url` at `now`?
///
/// Pure function of its three inputs: the weekday must be in the policy's
/// day set, `now` must fall inside the `[start, end]` window (inclusive on
/// both ends), and the URL must contain the pattern (with any trailing `*`
/// removed) as a case-insensitive substring.
pub fn policy_matches(policy: &PolicyRecord, url: &str, now: &DateTime<Local>) -> bool {
    policy.window.contains(now) && url_matches(policy, url)
}

/// The URL half of the predicate, without the window check.
pub fn url_matches(policy: &PolicyRecord, url: &str) -> bool {
    contains_ignore_ascii_case(url, policy.pattern_fragment())
}

/// First policy in `policies` that blocks `url` at `now`, if any.
pub fn find_blocking_policy<'a>(
    policies: &'a [PolicyRecord],
    url: &str,
    now: &DateTime<Local>,
) -> Option<&'a PolicyRecord> {
    policies.iter().find(|p| policy_matches(p, url, now))
}

/// Target the navigation fallback redirects to, with the original URL as a
/// display parameter for the interstitial.
pub fn blocked_page_target(url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
    format!("{}?url={}", BLOCKED_PAGE_PATH, encoded)
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }

    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > haystack.len() {
        return false;
    }

    let last = haystack.len() - needle.len();
    (0..=last).any(|i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use warden_policy::PolicyRecord;
    use warden_util::{parse_day_tokens, BlockWindow, PolicyId, UserId, WallClock};

    fn policy(pattern: &str, start: (u8, u8), end: (u8, u8), days: &str) -> PolicyRecord {
        PolicyRecord {
            id: PolicyId::new(1),
            url_pattern: pattern.into(),
            window: BlockWindow::new(
                parse_day_tokens(days).unwrap(),
                WallClock::new(start.0, start.1).unwrap(),
                WallClock::new(end.0, end.1).unwrap(),
            ),
            created_at: warden_util::now(),
            owner: UserId::new(1),
        }
    }

    fn weekday_nine_to_five(pattern: &str) -> PolicyRecord {
        policy(pattern, (9, 0), (17, 0), "Mo,Tu,We,Th,Fr")
    }

    // 2026-03-04 is a Wednesday, 2026-03-07 a Saturday
    fn wednesday_afternoon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 4, 14, 30, 0).unwrap()
    }

    fn saturday_afternoon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 7, 14, 30, 0).unwrap()
    }

    #[test]
    fn matches_active_wildcard_policy() {
        let policy = weekday_nine_to_five("facebook.com/*");
        assert!(policy_matches(
            &policy,
            "https://facebook.com/feed",
            &wednesday_afternoon()
        ));
    }

    #[test]
    fn wrong_weekday_never_matches() {
        let policy = weekday_nine_to_five("facebook.com/*");
        assert!(!policy_matches(
            &policy,
            "https://facebook.com/feed",
            &saturday_afternoon()
        ));
    }

    #[test]
    fn outside_window_never_matches() {
        let policy = weekday_nine_to_five("facebook.com/*");
        let evening = Local.with_ymd_and_hms(2026, 3, 4, 18, 0, 0).unwrap();
        assert!(!policy_matches(&policy, "https://facebook.com/feed", &evening));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let policy = weekday_nine_to_five("example.com");
        let at_start = Local.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap();
        let at_end = Local.with_ymd_and_hms(2026, 3, 4, 17, 0, 0).unwrap();

        assert!(policy_matches(&policy, "https://example.com/", &at_start));
        assert!(policy_matches(&policy, "https://example.com/", &at_end));
    }

    #[test]
    fn url_match_is_case_insensitive() {
        let policy = weekday_nine_to_five("facebook.com");
        assert!(url_matches(&policy, "https://FACEBOOK.COM/profile"));
        assert!(url_matches(&policy, "https://m.FaceBook.com/"));
    }

    #[test]
    fn wildcard_strips_only_trailing_star() {
        let policy = weekday_nine_to_five("reddit.com*");
        assert!(url_matches(&policy, "https://reddit.com/r/rust"));
        assert!(url_matches(&policy, "https://old.reddit.com/"));
        assert!(!url_matches(&policy, "https://example.org/"));
    }

    #[test]
    fn literal_pattern_is_substring_match() {
        let policy = weekday_nine_to_five("news.ycombinator.com");
        assert!(url_matches(&policy, "https://news.ycombinator.com/item?id=1"));
        assert!(!url_matches(&policy, "https://ycombinator.com/"));
    }

    #[test]
    fn empty_day_set_never_matches() {
        let mut policy = weekday_nine_to_five("facebook.com");
        policy.window.days = warden_util::DaysOfWeek::NONE;
        assert!(!policy_matches(
            &policy,
            "https://facebook.com/",
            &wednesday_afternoon()
        ));
    }

    #[test]
    fn find_blocking_policy_returns_first_match() {
        let policies = vec![
            weekday_nine_to_five("a.com"),
            weekday_nine_to_five("b.com"),
            weekday_nine_to_five("b.com/special"),
        ];

        let hit = find_blocking_policy(&policies, "https://b.com/x", &wednesday_afternoon());
        assert_eq!(hit.unwrap().url_pattern, "b.com");

        let miss = find_blocking_policy(&policies, "https://c.com/", &wednesday_afternoon());
        assert!(miss.is_none());
    }

    #[test]
    fn blocked_page_target_encodes_url() {
        let target = blocked_page_target("https://facebook.com/feed?x=1&y=2");
        assert!(target.starts_with("/blocked.html?url="));
        assert!(target.contains("https%3A%2F%2Ffacebook.com%2Ffeed%3Fx%3D1%26y%3D2"));
    }
}
