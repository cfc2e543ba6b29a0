use chrono::Utc;

/// Allocates a definitive rule id against the ids already in the stored list.
///
/// Ids derive from creation time (epoch milliseconds), so they sort by age
/// and distinguish rules created at different moments without coordination.
/// If the candidate collides with an existing id (two creates within the
/// same millisecond), the allocation bumps past the current maximum; ids are
/// never reused.
pub fn allocate_rule_id<I>(existing: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    let candidate = Utc::now().timestamp_millis();
    let mut max = i64::MIN;
    let mut taken = false;
    for id in existing {
        if id == candidate {
            taken = true;
        }
        if id > max {
            max = id;
        }
    }
    if taken || max >= candidate {
        max + 1
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_distinct_ids_under_collision() {
        let first = allocate_rule_id([]);
        let second = allocate_rule_id([first]);
        assert_ne!(first, second);
        assert!(second > first);
    }

    #[test]
    fn bumps_past_future_dated_ids() {
        let far_future = Utc::now().timestamp_millis() + 1_000_000;
        let id = allocate_rule_id([far_future]);
        assert_eq!(id, far_future + 1);
    }
}
