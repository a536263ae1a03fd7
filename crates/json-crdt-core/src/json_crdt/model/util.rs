use rand::Rng;

use crate::json_crdt_patch::enums::{MIN_USER_SESSION, SESSION};

/// Random session id in `[65536, 2^53 - 1]`. Lower ids are reserved.
pub fn random_session_id() -> u64 {
    rand::thread_rng().gen_range(MIN_USER_SESSION..=SESSION::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_stay_in_user_range() {
        for _ in 0..100 {
            let sid = random_session_id();
            assert!((MIN_USER_SESSION..=SESSION::MAX).contains(&sid));
        }
    }
}
