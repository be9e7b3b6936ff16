use std::cmp::Ordering;

/// Numeric-aware string ordering: `port2` sorts before `port10`.
///
/// Digit runs are compared by value (without overflow, so arbitrarily long
/// runs are fine); everything else byte by byte.  Runs of equal value but
/// different zero padding fall back to the shorter run first.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let a_end = digit_run_end(a, i);
            let b_end = digit_run_end(b, j);
            match cmp_digit_runs(&a[i..a_end], &b[j..b_end]) {
                Ordering::Equal => {
                    i = a_end;
                    j = b_end;
                }
                ord => return ord,
            }
        } else {
            match a[i].cmp(&b[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                ord => return ord,
            }
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

fn digit_run_end(s: &[u8], start: usize) -> usize {
    s[start..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(s.len(), |n| start + n)
}

fn cmp_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let a_trim = strip_leading_zeros(a);
    let b_trim = strip_leading_zeros(b);
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.len().cmp(&b.len()))
}

fn strip_leading_zeros(s: &[u8]) -> &[u8] {
    let zeros = s.iter().take_while(|&&c| c == b'0').count();
    &s[zeros..]
}
