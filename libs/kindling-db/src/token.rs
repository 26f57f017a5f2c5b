//! License key tokens: 16 characters from `[A-Z0-9]` in four hyphen-joined groups.

use rand::Rng;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const GROUPS: usize = 4;
const GROUP_LEN: usize = 4;

/// Formatted length including separators (`AB12-CD34-EF56-GH78`).
pub const TOKEN_LEN: usize = GROUPS * GROUP_LEN + GROUPS - 1;

/// Draws a fresh token from the thread-local CSPRNG.
pub fn generate_token() -> String {
    generate_token_with(&mut rand::rng())
}

pub fn generate_token_with<R: Rng>(rng: &mut R) -> String {
    let mut token = String::with_capacity(TOKEN_LEN);
    for i in 0..GROUPS * GROUP_LEN {
        if i > 0 && i % GROUP_LEN == 0 {
            token.push('-');
        }
        let idx = rng.random_range(0..CHARSET.len());
        token.push(char::from(CHARSET[idx]));
    }
    token
}

/// Canonical form used for lookups: surrounding whitespace removed, uppercased.
pub fn normalize(input: &str) -> String {
    input.trim().to_uppercase()
}

pub fn is_well_formed(token: &str) -> bool {
    if token.len() != TOKEN_LEN {
        return false;
    }
    token.split('-').count() == GROUPS
        && token
            .split('-')
            .all(|group| group.len() == GROUP_LEN && group.bytes().all(|b| CHARSET.contains(&b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generated_tokens_are_well_formed() {
        for _ in 0..256 {
            let token = generate_token();
            assert!(is_well_formed(&token), "malformed token {token}");
        }
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize("  ab12-cd34-ef56-gh78\n"), "AB12-CD34-EF56-GH78");
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(!is_well_formed("AB12-CD34-EF56"));
        assert!(!is_well_formed("AB12CD34EF56GH78XYZ"));
        assert!(!is_well_formed("ab12-cd34-ef56-gh78"));
        assert!(!is_well_formed("AB1-2CD34-EF56-GH78"));
        assert!(!is_well_formed("AB12-CD34-EF56-GH7!"));
    }

    proptest! {
        #[test]
        fn any_seed_yields_well_formed_token(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let token = generate_token_with(&mut rng);
            prop_assert_eq!(token.len(), TOKEN_LEN);
            prop_assert!(is_well_formed(&token));
            prop_assert_eq!(normalize(&token.to_lowercase()), token);
        }
    }
}
