//! Deterministic "package of the day" selection.
//!
//! A package is featured on a date when the MD5 digest of `name ++ date`
//! shares its first `bits` bits with the digest of the date alone. The
//! outcome depends only on the package name, the date and `bits`, so adding or
//! removing packages never changes anyone else's membership, and the expected
//! subset size is `packages / 2^bits`.

use chrono::{Days, NaiveDate};

const DIGEST_BITS: u32 = 128;

pub fn date_as_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Whether a package may be featured at all, regardless of hashing.
pub fn dailyable(name: &str, repo: &str) -> bool {
    !repo.starts_with("multilib") && !name.ends_with("-devel") && !name.ends_with("-dbg")
}

/// `count` consecutive dates starting at `start`.
pub fn date_window(start: NaiveDate, count: u32) -> Vec<NaiveDate> {
    (0..u64::from(count))
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySelector {
    bits: u32,
}

impl DailySelector {
    pub fn new(bits: u32) -> Self {
        DailySelector {
            bits: bits.min(DIGEST_BITS),
        }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Hash-only membership test; eligibility is checked by [`dailyable`].
    pub fn is_member(&self, name: &str, date: NaiveDate) -> bool {
        let date = date_as_string(date);
        let anchor = digest(&date);
        let candidate = digest(&format!("{name}{date}"));
        shares_prefix(&anchor, &candidate, self.bits)
    }

    pub fn selected_dates(&self, name: &str, dates: &[NaiveDate]) -> Vec<NaiveDate> {
        dates
            .iter()
            .copied()
            .filter(|date| self.is_member(name, *date))
            .collect()
    }
}

/// Digest rendered as the big-endian bit string the selection is defined on.
pub fn digest_bit_string(input: &str) -> String {
    digest(input)
        .iter()
        .map(|byte| format!("{byte:08b}"))
        .collect()
}

fn digest(input: &str) -> [u8; 16] {
    md5::compute(input.as_bytes()).0
}

fn shares_prefix(left: &[u8; 16], right: &[u8; 16], bits: u32) -> bool {
    let full_bytes = (bits / 8) as usize;
    if left[..full_bytes] != right[..full_bytes] {
        return false;
    }
    let rest = bits % 8;
    if rest == 0 {
        return true;
    }
    let mask = 0xffu8 << (8 - rest);
    (left[full_bytes] & mask) == (right[full_bytes] & mask)
}

#[cfg(test)]
mod tests {
    use crate::daily::{
        dailyable, date_as_string, date_window, digest_bit_string, shares_prefix, DailySelector,
    };
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).expect("date parse failed")
    }

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("package-{i}")).collect()
    }

    #[test]
    fn date_is_rendered_iso() {
        assert_eq!(date_as_string(date(5)), "2024-03-05");
    }

    #[test]
    fn digest_bit_string_is_128_bits() {
        let bits = digest_bit_string("");
        assert_eq!(bits.len(), 128);
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert!(bits.starts_with("11010100000111011000110011011001"));
    }

    #[test]
    fn membership_matches_bit_string_prefix() {
        let selector = DailySelector::new(5);
        for name in names(200) {
            let day = date_as_string(date(9));
            let anchor = digest_bit_string(&day);
            let candidate = digest_bit_string(&format!("{name}{day}"));
            assert_eq!(
                selector.is_member(&name, date(9)),
                anchor[..5] == candidate[..5],
                "{name}"
            );
        }
    }

    #[test]
    fn membership_is_deterministic() {
        let selector = DailySelector::new(4);
        for name in names(100) {
            let first = selector.is_member(&name, date(1));
            for _ in 0..3 {
                assert_eq!(selector.is_member(&name, date(1)), first);
            }
        }
    }

    #[test]
    fn membership_does_not_depend_on_other_packages() {
        let selector = DailySelector::new(3);
        let all = names(300);
        let small: Vec<_> = all.iter().take(50).cloned().collect();
        let selected_from = |pool: &[String]| -> Vec<String> {
            pool.iter()
                .filter(|name| selector.is_member(name, date(2)))
                .cloned()
                .collect()
        };
        let from_all = selected_from(&all);
        let from_small = selected_from(&small);
        let restricted: Vec<_> = from_all
            .into_iter()
            .filter(|name| small.contains(name))
            .collect();
        assert_eq!(restricted, from_small);
    }

    #[test]
    fn zero_bits_selects_everyone() {
        let selector = DailySelector::new(0);
        assert!(names(50).iter().all(|name| selector.is_member(name, date(3))));
    }

    #[test]
    fn bits_are_clamped_to_digest_width() {
        assert_eq!(DailySelector::new(500).bits(), 128);
    }

    #[test]
    fn subset_size_follows_bits() {
        let selector = DailySelector::new(4);
        let count = names(4096)
            .iter()
            .filter(|name| selector.is_member(name, date(7)))
            .count();
        // expected 256
        assert!((150..400).contains(&count), "selected {count}");
    }

    #[test]
    fn subset_changes_between_days() {
        let selector = DailySelector::new(4);
        let pool = names(1000);
        let day_one: Vec<_> = pool.iter().filter(|n| selector.is_member(n, date(1))).collect();
        let day_two: Vec<_> = pool.iter().filter(|n| selector.is_member(n, date(2))).collect();
        assert_ne!(day_one, day_two);
    }

    #[test]
    fn shares_prefix_checks_partial_bytes() {
        let left = [0b1010_0000u8; 16];
        let mut right = left;
        right[0] = 0b1011_0000;
        assert!(shares_prefix(&left, &right, 3));
        assert!(!shares_prefix(&left, &right, 4));
        assert!(shares_prefix(&left, &left, 128));
    }

    #[test]
    fn dailyable_excludes_multilib_devel_and_dbg() {
        assert!(dailyable("xbps", "current"));
        assert!(dailyable("xbps", "current/multilib"));
        assert!(!dailyable("xbps", "multilib"));
        assert!(!dailyable("xbps-devel", "current"));
        assert!(!dailyable("xbps-dbg", "current"));
    }

    #[test]
    fn date_window_is_consecutive() {
        let window = date_window(date(30), 3);
        assert_eq!(
            window,
            vec![
                date(30),
                date(31),
                NaiveDate::from_ymd_opt(2024, 4, 1).expect("date parse failed")
            ]
        );
        assert!(date_window(date(1), 0).is_empty());
    }
}
