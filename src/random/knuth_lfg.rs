//! Knuth's lagged Fibonacci generator.
//!
//! Rust port of the generator published by D. E. Knuth (Seminumerical Algorithms, 3rd edition,
//! Section 3.6), including the modifications of the 9th printing (2002). It generates the same
//! sequence as the reference C code `rng.c` and as the GSL implementation.
use rand_chacha::rand_core::{impls, Error, RngCore, SeedableRng};

/// The long lag.
const KK: usize = 100;
/// The short lag.
const LL: usize = 37;
/// The modulus.
const MM: i64 = 1 << 30;
/// Guaranteed separation between streams.
const TT: i64 = 70;
/// Number of values generated per refill; only the first `KK` are delivered.
const QUALITY: usize = 1009;
/// Factor mapping an integer draw to [0, 1).
const I2D_FACTOR: f64 = 1.0 / MM as f64;

fn mod_diff(x: i64, y: i64) -> i64 {
    (x - y) & (MM - 1)
}

/// Knuth's lagged Fibonacci generator, drawing 30-bit integers.
#[derive(Debug, Clone)]
pub struct KnuthLfg {
    ran_x: [i64; KK],
    buffer: Vec<i64>,
    next: usize,
}

impl KnuthLfg {
    /// Create a generator with the given seed. Only the 30 lowest bits of the seed are used.
    pub fn new(seed: u64) -> Self {
        let mut rng = KnuthLfg {
            ran_x: [0; KK],
            buffer: vec![0; QUALITY],
            next: KK,
        };
        rng.ran_start((seed & (MM as u64 - 1)) as i64);
        rng
    }

    /// Fill `aa` with new values and advance the generator state.
    /// The slice must hold at least `KK` values.
    fn ran_array(ran_x: &mut [i64; KK], aa: &mut [i64]) {
        let n = aa.len();
        debug_assert!(n >= KK);
        aa[..KK].copy_from_slice(&ran_x[..]);
        for j in KK..n {
            aa[j] = mod_diff(aa[j - KK], aa[j - LL]);
        }
        let mut j = n;
        for i in 0..LL {
            ran_x[i] = mod_diff(aa[j - KK], aa[j - LL]);
            j += 1;
        }
        for i in LL..KK {
            ran_x[i] = mod_diff(aa[j - KK], ran_x[i - LL]);
            j += 1;
        }
    }

    fn ran_start(&mut self, seed: i64) {
        let mut x = [0_i64; KK + KK - 1];
        let mut ss = (seed + 2) & (MM - 2);
        for item in x.iter_mut().take(KK) {
            *item = ss;
            ss <<= 1;
            if ss >= MM {
                ss -= MM - 2;
            }
        }
        x[1] += 1;

        let mut ss = seed & (MM - 1);
        let mut t = TT - 1;
        while t != 0 {
            // square
            for j in (1..KK).rev() {
                x[j + j] = x[j];
                x[j + j - 1] = 0;
            }
            for j in (KK..=KK + KK - 2).rev() {
                x[j - (KK - LL)] = mod_diff(x[j - (KK - LL)], x[j]);
                x[j - KK] = mod_diff(x[j - KK], x[j]);
            }
            // multiply by z
            if ss & 1 == 1 {
                for j in (1..=KK).rev() {
                    x[j] = x[j - 1];
                }
                x[0] = x[KK];
                x[LL] = mod_diff(x[LL], x[KK]);
            }
            if ss != 0 {
                ss >>= 1;
            } else {
                t -= 1;
            }
        }

        for j in 0..LL {
            self.ran_x[j + KK - LL] = x[j];
        }
        for j in LL..KK {
            self.ran_x[j - LL] = x[j];
        }
        // warm up
        for _ in 0..10 {
            Self::ran_array(&mut self.ran_x, &mut x);
        }
        self.next = KK;
    }

    /// Deliver the next 30-bit integer, refilling the buffer when needed.
    fn ran_draw(&mut self) -> i64 {
        if self.next == KK {
            Self::ran_array(&mut self.ran_x, &mut self.buffer);
            self.next = 0;
        }
        let x = self.buffer[self.next];
        self.next += 1;
        x
    }

    /// Draw a uniform number in [0, 1).
    pub fn drand(&mut self) -> f64 {
        I2D_FACTOR * self.ran_draw() as f64
    }
}

impl RngCore for KnuthLfg {
    fn next_u32(&mut self) -> u32 {
        let high = (self.ran_draw() as u32) << 2;
        let low = (self.ran_draw() as u32) >> 28;
        high | low
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for KnuthLfg {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        KnuthLfg::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        KnuthLfg::new(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knuth_self_test() {
        let mut rng = KnuthLfg::new(310952);
        let mut a = vec![0_i64; 1009];
        for _ in 0..=2009 {
            KnuthLfg::ran_array(&mut rng.ran_x, &mut a);
        }
        assert_eq!(a[0], 995235265);

        let mut rng = KnuthLfg::new(310952);
        let mut a = vec![0_i64; 2009];
        for _ in 0..=1009 {
            KnuthLfg::ran_array(&mut rng.ran_x, &mut a);
        }
        assert_eq!(a[0], 995235265);
    }

    #[test]
    fn test_drand_range_and_reproducibility() {
        let mut rng1 = KnuthLfg::new(42);
        let mut rng2 = KnuthLfg::seed_from_u64(42);
        for _ in 0..5000 {
            let x = rng1.drand();
            assert!((0.0..1.0).contains(&x));
            assert_eq!(x, rng2.drand());
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut rng1 = KnuthLfg::new(1);
        let mut rng2 = KnuthLfg::new(2);
        let draws1: Vec<u32> = (0..10).map(|_| rng1.next_u32()).collect();
        let draws2: Vec<u32> = (0..10).map(|_| rng2.next_u32()).collect();
        assert_ne!(draws1, draws2);
    }
}
