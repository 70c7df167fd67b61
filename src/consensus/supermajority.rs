//! Supermajority arithmetic for `N` peers tolerating `f = floor((N - 1) / 3)` faulty ones.

/// Minimum number of votes that decides a hash: `floor(2N/3) + 1`
pub fn supermajority_threshold(peers: usize) -> usize {
    peers * 2 / 3 + 1
}

/// Does `count` out of `peers` form a supermajority?
pub fn has_supermajority(count: usize, peers: usize) -> bool {
    peers > 0 && count <= peers && count >= supermajority_threshold(peers)
}

/// The round cannot be decided any more: enough peers voted, yet even if every
/// outstanding peer joined the most popular hash it would stay below threshold.
pub fn is_rejected(max_hash_count: usize, voted: usize, peers: usize) -> bool {
    if peers == 0 || voted > peers {
        return false;
    }
    let threshold = supermajority_threshold(peers);
    let outstanding = peers - voted;
    voted >= threshold && max_hash_count + outstanding < threshold
}
