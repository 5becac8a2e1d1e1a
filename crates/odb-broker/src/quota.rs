//! Instance quotas
//!
//! Counts come from the registry on every request; nothing here caches.
//! Enforcement is best effort: two concurrent provisions can both see room
//! for one more instance.

use std::collections::HashMap;

/// The quota that would be exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaScope {
    Plan,
    Global,
}

impl QuotaScope {
    pub fn message(self) -> &'static str {
        match self {
            QuotaScope::Plan => {
                "The quota for this service plan has been exceeded. Please contact your Operator for help."
            }
            QuotaScope::Global => {
                "The quota for this service has been exceeded. Please contact your Operator for help."
            }
        }
    }
}

impl std::fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Whether one more instance fits under `limit`
pub fn allows(count: usize, limit: Option<usize>) -> bool {
    limit.is_none_or(|limit| count < limit)
}

/// Check that a new instance of `plan_id` fits both scopes
///
/// `counts` maps plan id to live instance count; the global scope is the sum.
pub fn check_provision(
    counts: &HashMap<String, usize>,
    plan_id: &str,
    plan_limit: Option<usize>,
    global_limit: Option<usize>,
) -> Result<(), QuotaScope> {
    let total: usize = counts.values().sum();
    if !allows(total, global_limit) {
        return Err(QuotaScope::Global);
    }

    let plan_count = counts.get(plan_id).copied().unwrap_or(0);
    if !allows(plan_count, plan_limit) {
        return Err(QuotaScope::Plan);
    }

    Ok(())
}

/// Remaining capacity, floored at zero
pub fn remaining(count: usize, limit: usize) -> usize {
    limit.saturating_sub(count)
}
