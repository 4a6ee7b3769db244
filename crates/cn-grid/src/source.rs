use std::fmt::Debug;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reference generator for the input matrices of a run.
///
/// Blocks are initialized by sampling `a` and `b` at global coordinates, and
/// results are verified against `expected`. Implementations must be pure
/// functions of their arguments: every worker samples independently.
pub trait MatrixSource: Send + Sync + Debug {
    /// Returns the name of this source (e.g., "identity").
    fn name(&self) -> &str;

    /// Side length N of the matrices.
    fn matrix_dim(&self) -> usize;

    /// Global element A(row, col).
    fn a(&self, row: usize, col: usize) -> f32;

    /// Global element B(row, col).
    fn b(&self, row: usize, col: usize) -> f32;

    /// Global element (A @ B)(row, col).
    ///
    /// Defaults to the dot product of row `row` of A with column `col` of B,
    /// summed in ascending k.
    fn expected(&self, row: usize, col: usize) -> f32 {
        let mut sum = 0.0f32;
        for k in 0..self.matrix_dim() {
            sum += self.a(row, k) * self.b(k, col);
        }
        sum
    }
}

/// A(r, c) = r·N + c and B = I, so the product is A itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityFixture {
    n: usize,
}

impl IdentityFixture {
    pub fn new(n: usize) -> Self {
        IdentityFixture { n }
    }
}

impl MatrixSource for IdentityFixture {
    fn name(&self) -> &str {
        "identity"
    }

    fn matrix_dim(&self) -> usize {
        self.n
    }

    fn a(&self, row: usize, col: usize) -> f32 {
        (row * self.n + col) as f32
    }

    fn b(&self, row: usize, col: usize) -> f32 {
        if row == col {
            1.0
        } else {
            0.0
        }
    }

    fn expected(&self, row: usize, col: usize) -> f32 {
        self.a(row, col)
    }
}

/// Seeded random small integers in A and B with an exact reference product.
///
/// Values are drawn from `-MAX_ABS..=MAX_ABS`, which keeps every partial sum
/// exactly representable in f32 for any N up to several thousand.
#[derive(Debug, Clone)]
pub struct RandomIntegerFixture {
    n: usize,
    a: Vec<f32>,
    b: Vec<f32>,
    c: Vec<f32>,
}

impl RandomIntegerFixture {
    pub const MAX_ABS: i32 = 4;

    pub fn new(n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut draw = |len: usize| -> Vec<f32> {
            (0..len)
                .map(|_| rng.gen_range(-Self::MAX_ABS..=Self::MAX_ABS) as f32)
                .collect()
        };
        let a = draw(n * n);
        let b = draw(n * n);

        let mut c = vec![0.0f32; n * n];
        for i in 0..n {
            for k in 0..n {
                let a_ik = a[i * n + k];
                for j in 0..n {
                    c[i * n + j] += a_ik * b[k * n + j];
                }
            }
        }
        log::debug!("generated {}x{} random integer fixture (seed {})", n, n, seed);
        RandomIntegerFixture { n, a, b, c }
    }
}

impl MatrixSource for RandomIntegerFixture {
    fn name(&self) -> &str {
        "random"
    }

    fn matrix_dim(&self) -> usize {
        self.n
    }

    fn a(&self, row: usize, col: usize) -> f32 {
        self.a[row * self.n + col]
    }

    fn b(&self, row: usize, col: usize) -> f32 {
        self.b[row * self.n + col]
    }

    fn expected(&self, row: usize, col: usize) -> f32 {
        self.c[row * self.n + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_fixture() {
        let f = IdentityFixture::new(4);
        assert_eq!(f.a(2, 3), 11.0);
        assert_eq!(f.b(1, 1), 1.0);
        assert_eq!(f.b(1, 2), 0.0);
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(f.expected(r, c), f.a(r, c));
            }
        }
    }

    #[test]
    fn test_identity_closed_form_matches_dot_product() {
        #[derive(Debug)]
        struct Generic(IdentityFixture);
        impl MatrixSource for Generic {
            fn name(&self) -> &str {
                "generic"
            }
            fn matrix_dim(&self) -> usize {
                self.0.matrix_dim()
            }
            fn a(&self, row: usize, col: usize) -> f32 {
                self.0.a(row, col)
            }
            fn b(&self, row: usize, col: usize) -> f32 {
                self.0.b(row, col)
            }
        }

        let f = IdentityFixture::new(6);
        let g = Generic(f);
        for r in 0..6 {
            for c in 0..6 {
                assert_eq!(g.expected(r, c), f.expected(r, c));
            }
        }
    }

    #[test]
    fn test_random_fixture_is_seeded() {
        let x = RandomIntegerFixture::new(5, 7);
        let y = RandomIntegerFixture::new(5, 7);
        let z = RandomIntegerFixture::new(5, 8);
        assert_eq!(x.a, y.a);
        assert_eq!(x.b, y.b);
        assert_ne!(x.a, z.a);
    }

    #[test]
    fn test_random_fixture_values_are_small_integers() {
        let f = RandomIntegerFixture::new(6, 1);
        for v in f.a.iter().chain(f.b.iter()) {
            assert_eq!(v.fract(), 0.0);
            assert!(v.abs() <= RandomIntegerFixture::MAX_ABS as f32);
        }
    }

    #[test]
    fn test_random_fixture_reference_product() {
        let f = RandomIntegerFixture::new(5, 42);
        for r in 0..5 {
            for c in 0..5 {
                let mut sum = 0.0f32;
                for k in 0..5 {
                    sum += f.a(r, k) * f.b(k, c);
                }
                assert_eq!(f.expected(r, c), sum);
            }
        }
    }
}
