//! Base 2 Sobol points, the low discrepancy sequence Saltelli's scheme is built on.
//!
//! Dimension `0` is the van der Corput sequence. Every other dimension takes the next
//! primitive polynomial over GF(2), ordered by degree and then by coefficients, and
//! seeds its first direction numbers with odd integers drawn from a fixed seed. The
//! sequence is therefore the same on every run.

use rand::{Rng, SeedableRng, rngs::StdRng};

const BITS: usize = 32;
const SCALE: f64 = 1.0 / (1u64 << BITS) as f64;
const DIRECTION_SEED: u64 = 0x5eed_0b01;

type Directions = [u32; BITS];

/// A stream of points of the unit hypercube, one coordinate per dimension.
pub struct Sobol {
    directions: Vec<Directions>,
    point: Vec<u32>,
    index: u64,
}

impl Sobol {
    /// Creates a new `Sobol` sequence positioned at its first point, the origin.
    ///
    /// # Arguments
    /// * `dims` - The amount of coordinates of every point.
    pub fn new(dims: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(DIRECTION_SEED);

        let directions = std::iter::once(van_der_corput())
            .chain(
                Primitives::default()
                    .map(|(degree, inner)| recurrence(degree, inner, &mut rng))
                    .take(dims.saturating_sub(1)),
            )
            .take(dims)
            .collect();

        Self {
            directions,
            point: vec![0; dims],
            index: 0,
        }
    }

    pub fn dims(&self) -> usize {
        self.point.len()
    }

    /// Moves the sequence so that the next point written is the `index`th one.
    pub fn seek(&mut self, index: u64) {
        let gray = index ^ (index >> 1);

        for (x, v) in self.point.iter_mut().zip(&self.directions) {
            *x = (0..BITS)
                .filter(|&bit| gray >> bit & 1 == 1)
                .fold(0, |acc, bit| acc ^ v[bit]);
        }

        self.index = index;
    }

    /// Writes the current point into `out` and advances to the next one.
    ///
    /// Each coordinate lies in `[0, 1)`.
    pub fn fill(&mut self, out: &mut [f64]) {
        for (o, &x) in out.iter_mut().zip(&self.point) {
            *o = f64::from(x) * SCALE;
        }

        // the gray codes of `index` and `index + 1` differ in the lowest zero bit of
        // `index`, past `2^BITS` points the sequence starts repeating itself
        let bit = (self.index.trailing_ones() as usize).min(BITS - 1);
        for (x, v) in self.point.iter_mut().zip(&self.directions) {
            *x ^= v[bit];
        }

        self.index += 1;
    }
}

/// The direction numbers `2^-1, 2^-2, ..` of the first dimension.
fn van_der_corput() -> Directions {
    std::array::from_fn(|k| 1 << (BITS - 1 - k))
}

/// The direction numbers of the primitive polynomial of `degree` whose middle
/// coefficients are the bits of `inner`, highest power first.
fn recurrence<R: Rng>(degree: usize, inner: u64, rng: &mut R) -> Directions {
    let mut v = [0u32; BITS];

    for k in 0..BITS {
        v[k] = if k < degree {
            // an odd integer below 2^(k + 1)
            let m = (rng.random::<u32>() >> (BITS - 1 - k)) | 1;
            m << (BITS - 1 - k)
        } else {
            let mut x = v[k - degree] ^ (v[k - degree] >> degree);
            for i in 1..degree {
                if inner >> (degree - 1 - i) & 1 == 1 {
                    x ^= v[k - i];
                }
            }
            x
        };
    }

    v
}

/// Every primitive polynomial over GF(2), by increasing degree.
///
/// Yields `(degree, inner)` where `inner` holds the coefficients between the leading
/// and the constant term, both of which are always set.
#[derive(Debug, Default)]
struct Primitives {
    degree: usize,
    inner: u64,
}

impl Iterator for Primitives {
    type Item = (usize, u64);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.degree == 0 || self.inner == 1 << (self.degree - 1) {
                self.degree += 1;
                self.inner = 0;
            }

            let candidate = (self.degree, self.inner);
            self.inner += 1;

            if is_primitive(candidate.0, candidate.1) {
                return Some(candidate);
            }
        }
    }
}

/// Whether `x` generates the whole multiplicative group modulo the polynomial.
fn is_primitive(degree: usize, inner: u64) -> bool {
    let poly = 1 << degree | inner << 1 | 1;
    let order = (1 << degree) - 1;
    let x = mul_mod(1, 0b10, poly, degree);

    pow_mod(x, order, poly, degree) == 1
        && prime_factors(order)
            .into_iter()
            .all(|q| pow_mod(x, order / q, poly, degree) != 1)
}

/// Carry-less product of `a` and `b` reduced modulo `poly`.
fn mul_mod(mut a: u64, mut b: u64, poly: u64, degree: usize) -> u64 {
    let mut product = 0;

    while b != 0 {
        if b & 1 == 1 {
            product ^= a;
        }
        b >>= 1;
        a <<= 1;
        if a >> degree & 1 == 1 {
            a ^= poly;
        }
    }

    product
}

fn pow_mod(mut base: u64, mut exp: u64, poly: u64, degree: usize) -> u64 {
    let mut result = 1;

    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, poly, degree);
        }
        base = mul_mod(base, base, poly, degree);
        exp >>= 1;
    }

    result
}

fn prime_factors(mut n: u64) -> Vec<u64> {
    let mut factors = Vec::new();
    let mut q = 2;

    while q * q <= n {
        if n % q == 0 {
            factors.push(q);
            while n % q == 0 {
                n /= q;
            }
        }
        q += 1;
    }

    if n > 1 {
        factors.push(n);
    }

    factors
}
