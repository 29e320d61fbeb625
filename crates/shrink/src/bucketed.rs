use planner_task::Rng;
use planner_transition_system::IndexedPartition;
use planner_transition_system::StateId;

/// Shared bucket-merging engine for the `f-preserving` and `random` shrink
/// variants (spec.md §4.7 "Bucketed base class").
///
/// `buckets` is ordered high-priority first; states within the same bucket
/// are considered equally important to keep distinguished, so merges start
/// inside the lowest-priority bucket before buckets themselves are fused.
pub fn bucket_merge(buckets: Vec<Vec<StateId>>, target_size: usize, rng: &mut impl Rng) -> IndexedPartition {
    let num_states: usize = buckets.iter().map(|b| b.len()).sum();

    // Each bucket starts out as a list of singleton classes.
    let mut bucket_classes: Vec<Vec<Vec<StateId>>> = buckets
        .into_iter()
        .map(|bucket| bucket.into_iter().map(|s| vec![s]).collect())
        .filter(|b: &Vec<Vec<StateId>>| !b.is_empty())
        .collect();

    let mut total_classes = num_states;

    while total_classes > target_size && !bucket_classes.is_empty() {
        // Prefer splitting within the lowest-priority bucket that still has
        // more than one class.
        let non_singleton = bucket_classes.iter().rposition(|b| b.len() >= 2);

        match non_singleton {
            Some(index) => {
                let bucket = &mut bucket_classes[index];
                let a = rng.next_uint(bucket.len());
                let mut b = rng.next_uint(bucket.len() - 1);
                if b >= a {
                    b += 1;
                }

                let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                let merged_in = bucket.remove(hi);
                bucket[lo].extend(merged_in);

                total_classes -= 1;
            }
            None => {
                // Every non-empty bucket is a singleton class: fuse the two
                // lowest-priority buckets so future iterations can merge
                // across the old boundary.
                if bucket_classes.len() < 2 {
                    break;
                }

                let last = bucket_classes.pop().expect("checked len >= 2");
                bucket_classes
                    .last_mut()
                    .expect("checked len >= 2")
                    .extend(last);
            }
        }
    }

    let mut blocks = vec![0; num_states];
    let mut next_block = 0;
    for bucket in bucket_classes {
        for class in bucket {
            for state in class {
                blocks[state] = next_block;
            }
            next_block += 1;
        }
    }

    IndexedPartition::from_blocks(blocks)
}
