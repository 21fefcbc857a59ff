use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Length of generated job identifiers.
pub const JOB_ID_LEN: usize = 12;

/// Generate an unguessable job identifier from the OS random source.
pub fn new_job_id() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(JOB_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_id_shape() {
        let id = new_job_id();
        assert_eq!(id.len(), JOB_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_ids_do_not_repeat() {
        let ids: HashSet<String> = (0..1000).map(|_| new_job_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
