//! Numeric-aware string ordering ("2" before "10").

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        chars.next();
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        // "01" after "1"
        .then_with(|| a.len().cmp(&b.len()))
}

/// Compare two strings, treating runs of digits as numbers and letters
/// case-insensitively.
///
/// Strings that compare equal that way fall back to plain byte order, so the
/// result is a total order.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ordering = cmp_digit_runs(&take_digits(&mut left), &take_digits(&mut right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            },
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            },
        }
    }
}

/// Sort in place by a string key in natural order.
pub fn sort_naturally_by<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| natural_cmp(key(a), key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numbers_sort_by_value() {
        let mut names = vec!["subnet-10", "subnet-2", "subnet-1"];
        sort_naturally_by(&mut names, |s| *s);
        assert_eq!(names, vec!["subnet-1", "subnet-2", "subnet-10"]);
    }

    #[test]
    fn digits_sort_before_letters() {
        let mut names = vec!["fabric-1", "1 fabric", "fabric-10"];
        sort_naturally_by(&mut names, |s| *s);
        assert_eq!(names, vec!["1 fabric", "fabric-1", "fabric-10"]);
    }

    #[test]
    fn letters_compare_case_insensitively() {
        assert_eq!(natural_cmp("Alpha", "beta"), Ordering::Less);
        assert_eq!(natural_cmp("10.0.0.0/24", "9.0.0.0/24"), Ordering::Greater);
        assert_eq!(natural_cmp("a", "a"), Ordering::Equal);
    }

    proptest! {
        #[test]
        fn natural_order_is_antisymmetric(a in "[a-c0-9 -]{0,6}", b in "[a-c0-9 -]{0,6}") {
            prop_assert_eq!(natural_cmp(&a, &b), natural_cmp(&b, &a).reverse());
        }

        #[test]
        fn numbers_order_numerically(x in 0u32..10_000, y in 0u32..10_000) {
            prop_assert_eq!(
                natural_cmp(&format!("node-{x}"), &format!("node-{y}")),
                x.cmp(&y)
            );
        }
    }
}
