//! Rule compilation
//!
//! Turns the policies active at an instant into the redirect rules the
//! browser should be enforcing right now. Compiled rules carry no identity
//! across passes; every pass regenerates the full set.

use chrono::{DateTime, Local};
use std::collections::HashSet;
use tracing::debug;
use warden_browser_api::CompiledRule;
use warden_policy::PolicyRecord;

/// Compile the currently-active policies into a fresh rule batch.
///
/// A literal pattern yields one rule matching any scheme and any host
/// containing it. A wildcard pattern yields two: the bare domain root
/// first, then the domain plus any subdomain/path suffix. All rules are
/// scoped to top-level navigations.
pub fn compile(policies: &[PolicyRecord], now: &DateTime<Local>) -> Vec<CompiledRule> {
    let mut rules = Vec::new();
    let base = rule_id_base(now);
    let mut next_id = base;

    for policy in policies {
        if !policy.window.contains(now) {
            debug!(policy_id = %policy.id, pattern = %policy.url_pattern, "Policy inactive, skipped");
            continue;
        }

        if policy.is_wildcard() {
            let domain = policy.pattern_fragment();
            rules.push(CompiledRule::redirect(next_id, format!("*://{}*", domain)));
            next_id += 1;
            rules.push(CompiledRule::redirect(next_id, format!("*://*.{}*", domain)));
            next_id += 1;
        } else {
            rules.push(CompiledRule::redirect(
                next_id,
                format!("*://*{}*", policy.url_pattern),
            ));
            next_id += 1;
        }
    }

    // Ids are sequential by construction; this is a safety net, not the
    // primary path. A batch with duplicate ids would be rejected wholesale
    // by the rule table.
    if has_duplicate_ids(&rules) {
        debug!("Duplicate rule ids detected, reassigning sequentially");
        reassign_sequential_ids(&mut rules, base);
    }

    rules
}

/// Rule id base for a pass, derived from the instant. Nonzero; the rule
/// table rejects id 0.
fn rule_id_base(now: &DateTime<Local>) -> u32 {
    (now.timestamp_millis().rem_euclid(1_000_000)) as u32 + 1
}

fn has_duplicate_ids(rules: &[CompiledRule]) -> bool {
    let mut seen = HashSet::with_capacity(rules.len());
    rules.iter().any(|rule| !seen.insert(rule.id))
}

/// Fallback id assignment: strictly sequential from `base`.
fn reassign_sequential_ids(rules: &mut [CompiledRule], base: u32) {
    for (index, rule) in rules.iter_mut().enumerate() {
        rule.id = base + index as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use warden_util::{parse_day_tokens, BlockWindow, PolicyId, UserId, WallClock};

    fn policy(id: i64, pattern: &str, days: &str) -> PolicyRecord {
        PolicyRecord {
            id: PolicyId::new(id),
            url_pattern: pattern.into(),
            window: BlockWindow::new(
                parse_day_tokens(days).unwrap(),
                WallClock::new(9, 0).unwrap(),
                WallClock::new(17, 0).unwrap(),
            ),
            created_at: warden_util::now(),
            owner: UserId::new(1),
        }
    }

    // Wednesday
    fn wednesday_afternoon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 4, 14, 30, 0).unwrap()
    }

    #[test]
    fn empty_policy_list_compiles_to_nothing() {
        assert!(compile(&[], &wednesday_afternoon()).is_empty());
    }

    #[test]
    fn literal_pattern_yields_one_rule() {
        let policies = vec![policy(1, "example.com", "We")];
        let rules = compile(&policies, &wednesday_afternoon());

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].condition.url_filter, "*://*example.com*");
    }

    #[test]
    fn wildcard_pattern_yields_domain_and_subdomain_rules() {
        let policies = vec![policy(1, "facebook.com/*", "Mo,Tu,We,Th,Fr")];
        let rules = compile(&policies, &wednesday_afternoon());

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].condition.url_filter, "*://facebook.com/*");
        assert_eq!(rules[1].condition.url_filter, "*://*.facebook.com/*");
    }

    #[test]
    fn inactive_policy_contributes_no_rules() {
        // Saturday-only policy compiled on a Wednesday
        let policies = vec![policy(1, "facebook.com/*", "Sa")];
        assert!(compile(&policies, &wednesday_afternoon()).is_empty());

        // Right day, wrong time
        let evening = Local.with_ymd_and_hms(2026, 3, 4, 20, 0, 0).unwrap();
        let policies = vec![policy(1, "facebook.com/*", "We")];
        assert!(compile(&policies, &evening).is_empty());
    }

    #[test]
    fn output_follows_policy_iteration_order() {
        let policies = vec![
            policy(1, "a.com*", "We"),
            policy(2, "b.com", "We"),
            policy(3, "saturday-only.com", "Sa"),
        ];
        let rules = compile(&policies, &wednesday_afternoon());

        let filters: Vec<&str> = rules
            .iter()
            .map(|r| r.condition.url_filter.as_str())
            .collect();
        assert_eq!(
            filters,
            vec!["*://a.com*", "*://*.a.com*", "*://*b.com*"]
        );
    }

    #[test]
    fn batch_ids_are_pairwise_distinct_and_sequential() {
        let policies = vec![
            policy(1, "a.com*", "We"),
            policy(2, "b.com", "We"),
            policy(3, "c.com*", "We"),
        ];
        let rules = compile(&policies, &wednesday_afternoon());

        let ids: HashSet<u32> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), rules.len());

        for pair in rules.windows(2) {
            assert_eq!(pair[1].id, pair[0].id + 1);
        }
        assert!(rules[0].id > 0);
    }

    #[test]
    fn sequential_reassignment_resolves_collisions() {
        let mut rules = vec![
            CompiledRule::redirect(5, "*://*a.com*"),
            CompiledRule::redirect(5, "*://*b.com*"),
            CompiledRule::redirect(6, "*://*c.com*"),
        ];
        assert!(has_duplicate_ids(&rules));

        reassign_sequential_ids(&mut rules, 100);

        assert!(!has_duplicate_ids(&rules));
        assert_eq!(
            rules.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![100, 101, 102]
        );
        // Filters untouched
        assert_eq!(rules[1].condition.url_filter, "*://*b.com*");
    }

    #[test]
    fn compiled_rules_target_the_interstitial() {
        let policies = vec![policy(1, "example.com", "We")];
        let rules = compile(&policies, &wednesday_afternoon());

        match &rules[0].action {
            warden_browser_api::RuleAction::Redirect { extension_path } => {
                assert_eq!(extension_path, warden_browser_api::BLOCKED_PAGE_PATH);
            }
        }
    }
}
