//! Integer helpers for divider planning.

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

pub fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return 0
    }
    a / gcd(a, b) * b
}

/// Best rational approximation of `num / den` with the numerator bounded by
/// `max_num` and the denominator by `max_den`.
///
/// Walks the continued fraction expansion and, when the next convergent would
/// exceed a bound, picks either the previous convergent or the largest
/// semi-convergent, whichever is closer.
pub fn best_approximation(num: u64, den: u64, max_num: u64, max_den: u64) -> (u64, u64) {
    let (mut n, mut d) = (num, den);
    let (mut n0, mut d0) = (0u64, 1u64);
    let (mut n1, mut d1) = (1u64, 0u64);

    while d != 0 {
        let dp = d;
        let a = n / d;
        d = n % d;
        n = dp;

        let n2 = n0 + a * n1;
        let d2 = d0 + a * d1;

        if n2 > max_num || d2 > max_den {
            let mut t = u64::MAX;
            if d1 != 0 {
                t = (max_den - d0) / d1;
            }
            if n1 != 0 {
                t = t.min((max_num - n0) / n1);
            }

            // Semi-convergent closer than the previous convergent? There is no
            // previous convergent on the first term.
            if d1 == 0 || 2 * t > a || (2 * t == a && d0 * dp > d1 * d) {
                n1 = n0 + t * n1;
                d1 = d0 + t * d1;
            }
            break
        }

        n0 = n1;
        n1 = n2;
        d0 = d1;
        d1 = d2;
    }

    (n1, d1)
}
