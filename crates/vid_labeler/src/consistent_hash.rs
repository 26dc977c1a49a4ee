//! Jump Consistent Hash (Lamping & Veach, 2014)
//!
//! Maps a 64-bit key to a bucket in `[0, num_buckets)`. Growing the bucket count
//! by one moves a key either nowhere or into the new last bucket, which keeps
//! virtual person ids stable as population pools grow.

const MULTIPLIER: u64 = 2_862_933_555_777_941_757;
const NUMERATOR: f64 = (1u64 << 31) as f64;

/// Returns the bucket for `key`, or `-1` when `num_buckets <= 0`.
pub fn jump_consistent_hash(key: u64, num_buckets: i32) -> i32 {
    let mut bucket: i64 = -1;
    let mut next: i64 = 0;
    let mut key = key;
    while next < i64::from(num_buckets) {
        bucket = next;
        key = key.wrapping_mul(MULTIPLIER).wrapping_add(1);
        next = ((next + 1) as f64 * (NUMERATOR / ((key >> 33) + 1) as f64)) as i64;
    }
    bucket as i32
}
