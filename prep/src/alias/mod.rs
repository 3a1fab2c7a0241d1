// Two letter aliases for sorted sibling folders: 1 -> "aa", 2 -> "ab", 27 -> "ba", 676 -> "zz".
//
// The alias is the 0-based rank written as two base-26 digits, most significant first,
// with digits mapped onto 'a'..='z'.

use crate::PrepError;

pub const ALPHABET_LEN: i64 = 26;

// Two digits is all an alias has room for
pub const MAX_POSITION: i64 = ALPHABET_LEN * ALPHABET_LEN;

// Alias for a 1-based sequence position.
//
// Positions below 1 are an `InvalidArgument`, positions past 676 a `Domain` error;
// neither is mapped onto something that merely looks like an alias.
pub fn alias_for(position: i64) -> Result<String, PrepError> {
    if position < 1 {
        return Err(PrepError::InvalidArgument(format!(
            "sequence position must be >= 1, got {position}"
        )));
    }
    if position > MAX_POSITION {
        return Err(PrepError::Domain {
            position,
            max: MAX_POSITION,
        });
    }
    let m = position - 1;
    let first = (b'a' + (m / ALPHABET_LEN) as u8) as char;
    let second = (b'a' + (m % ALPHABET_LEN) as u8) as char;
    Ok([first, second].iter().collect())
}

// Parse a position as typed on a command line.
pub fn parse_position(text: &str) -> Result<i64, PrepError> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| PrepError::InvalidArgument(format!("not an integer position: {text:?}")))
}

// Inverse of [`alias_for`].
pub fn position_of(alias: &str) -> Result<i64, PrepError> {
    let bytes = alias.as_bytes();
    match bytes {
        [hi @ b'a'..=b'z', lo @ b'a'..=b'z'] => {
            Ok(((hi - b'a') as i64) * ALPHABET_LEN + ((lo - b'a') as i64) + 1)
        }
        _ => Err(PrepError::InvalidArgument(format!(
            "not a two letter alias: {alias:?}"
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn boundaries() {
        assert_eq!(alias_for(1).unwrap(), "aa");
        assert_eq!(alias_for(2).unwrap(), "ab");
        assert_eq!(alias_for(26).unwrap(), "az");
        assert_eq!(alias_for(27).unwrap(), "ba");
        assert_eq!(alias_for(676).unwrap(), "zz");
    }

    #[test]
    fn whole_domain_is_two_lowercase_letters() {
        for n in 1..=MAX_POSITION {
            let a = alias_for(n).unwrap();
            assert_eq!(a.len(), 2, "position {n}");
            assert!(a.chars().all(|c| c.is_ascii_lowercase()), "position {n} -> {a}");
        }
    }

    #[test]
    fn injective() {
        let seen: HashSet<String> = (1..=MAX_POSITION).map(|n| alias_for(n).unwrap()).collect();
        assert_eq!(seen.len(), MAX_POSITION as usize);
    }

    #[test]
    fn successor_is_lexicographically_next() {
        for n in 1..MAX_POSITION {
            let cur = alias_for(n).unwrap();
            let nxt = alias_for(n + 1).unwrap();
            assert!(cur < nxt, "{cur} !< {nxt}");
        }
    }

    #[test]
    fn past_the_domain_fails() {
        match alias_for(677) {
            Err(PrepError::Domain { position, max }) => {
                assert_eq!(position, 677);
                assert_eq!(max, 676);
            }
            other => panic!("expected domain error, got {other:?}"),
        }
        assert!(matches!(alias_for(i64::MAX), Err(PrepError::Domain { .. })));
    }

    #[test]
    fn non_positive_is_invalid() {
        assert!(matches!(alias_for(0), Err(PrepError::InvalidArgument(_))));
        assert!(matches!(alias_for(-5), Err(PrepError::InvalidArgument(_))));
    }

    #[test]
    fn parse() {
        assert_eq!(parse_position(" 27 ").unwrap(), 27);
        assert!(matches!(
            parse_position("2.5"),
            Err(PrepError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_position("ab"),
            Err(PrepError::InvalidArgument(_))
        ));
    }

    #[test]
    fn inverse() {
        for n in 1..=MAX_POSITION {
            assert_eq!(position_of(&alias_for(n).unwrap()).unwrap(), n);
        }
        assert!(position_of("a").is_err());
        assert!(position_of("aaa").is_err());
        assert!(position_of("A1").is_err());
        assert!(position_of("Ab").is_err());
    }
}
