//! Classic benchmark functions
//!
//! All of them are minimized.  The two dimensional functions (Matyas,
//! Himmelblau, six-hump camel) only look at the first two coordinates.
extern crate evostrat_core;

use std::f64;
use std::fmt;
use std::str::FromStr;

use self::evostrat_core::driver::Objective;

/// Benchmark function selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Benchmark {
    /// Sum of squares, minimum 0 at the origin
    Quadratic,
    /// Rosenbrock's valley, minimum 0 at (1, .., 1)
    Rosenbrock,
    /// Ackley, minimum 0 at the origin
    Ackley,
    /// Griewank, minimum 0 at the origin
    Griewank,
    /// Rastrigin, minimum 0 at the origin
    Rastrigin,
    /// Schwefel, minimum 0 at (420.9687, ..)
    Schwefel,
    /// Himmelblau, minimum 0 at (3, 2) among others
    Himmelblau,
    /// Six-hump camel, minimum -1.0316 at (0.0898, -0.7126)
    SixHump,
    /// Matyas, minimum 0 at the origin
    Matyas,
}

impl Benchmark {
    /// All the benchmarks
    pub const ALL: [Benchmark; 9] = [
        Benchmark::Quadratic,
        Benchmark::Rosenbrock,
        Benchmark::Ackley,
        Benchmark::Griewank,
        Benchmark::Rastrigin,
        Benchmark::Schwefel,
        Benchmark::Himmelblau,
        Benchmark::SixHump,
        Benchmark::Matyas,
    ];

    /// Name used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Benchmark::Quadratic => "quadratic",
            Benchmark::Rosenbrock => "rosenbrock",
            Benchmark::Ackley => "ackley",
            Benchmark::Griewank => "griewank",
            Benchmark::Rastrigin => "rastrigin",
            Benchmark::Schwefel => "schwefel",
            Benchmark::Himmelblau => "himmelblau",
            Benchmark::SixHump => "six_hump",
            Benchmark::Matyas => "matyas",
        }
    }
}

impl FromStr for Benchmark {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let name = s.to_lowercase().replace('-', "_");
        Benchmark::ALL
            .iter()
            .find(|b| b.name() == name)
            .cloned()
            .ok_or_else(|| format!("unknown objective: {}", s))
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// First two coordinates, zero padded
fn pair(x: &[f32]) -> (f64, f64) {
    let a = x.get(0).cloned().unwrap_or(0.) as f64;
    let b = x.get(1).cloned().unwrap_or(0.) as f64;
    (a, b)
}

fn ackley(x: &[f32]) -> f64 {
    let n = x.len().max(1) as f64;
    let sq: f64 = x.iter().map(|v| (*v as f64).powi(2)).sum::<f64>() / n;
    let cos: f64 = x
        .iter()
        .map(|v| (2. * f64::consts::PI * *v as f64).cos())
        .sum::<f64>()
        / n;
    -20. * (-0.2 * sq.sqrt()).exp() - cos.exp() + 20. + f64::consts::E
}

fn griewank(x: &[f32]) -> f64 {
    let sum: f64 = x.iter().map(|v| (*v as f64).powi(2)).sum::<f64>() / 4000.;
    let prod: f64 = x
        .iter()
        .enumerate()
        .map(|(i, v)| (*v as f64 / ((i + 1) as f64).sqrt()).cos())
        .product();
    1. + sum - prod
}

impl Objective for Benchmark {
    fn evaluate(&self, x: &[f32]) -> f32 {
        let value = match self {
            Benchmark::Quadratic => x.iter().map(|v| (*v as f64).powi(2)).sum(),
            Benchmark::Rosenbrock => x
                .windows(2)
                .map(|w| {
                    let (a, b) = (w[0] as f64, w[1] as f64);
                    100. * (b - a * a).powi(2) + (1. - a).powi(2)
                })
                .sum(),
            Benchmark::Ackley => ackley(x),
            Benchmark::Griewank => griewank(x),
            Benchmark::Rastrigin => x
                .iter()
                .map(|v| {
                    let v = *v as f64;
                    v * v - 10. * (2. * f64::consts::PI * v).cos() + 10.
                })
                .sum(),
            Benchmark::Schwefel => {
                418.9829 * x.len() as f64
                    - x.iter()
                        .map(|v| {
                            let v = *v as f64;
                            v * v.abs().sqrt().sin()
                        })
                        .sum::<f64>()
            }
            Benchmark::Himmelblau => {
                let (a, b) = pair(x);
                (a * a + b - 11.).powi(2) + (a + b * b - 7.).powi(2)
            }
            Benchmark::SixHump => {
                let (a, b) = pair(x);
                (4. - 2.1 * a * a + a.powi(4) / 3.) * a * a + a * b + (-4. + 4. * b * b) * b * b
            }
            Benchmark::Matyas => {
                let (a, b) = pair(x);
                0.26 * (a * a + b * b) - 0.48 * a * b
            }
        };
        value as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32, tol: f32) {
        assert!((a - b).abs() < tol, "expected {}, got {}", b, a);
    }

    #[test]
    fn test_minima() {
        close(Benchmark::Quadratic.evaluate(&[0., 0., 0.]), 0., 1e-6);
        close(Benchmark::Rosenbrock.evaluate(&[1., 1., 1.]), 0., 1e-6);
        close(Benchmark::Ackley.evaluate(&[0., 0.]), 0., 1e-5);
        close(Benchmark::Griewank.evaluate(&[0., 0., 0.]), 0., 1e-6);
        close(Benchmark::Rastrigin.evaluate(&[0., 0.]), 0., 1e-6);
        close(Benchmark::Schwefel.evaluate(&[420.9687, 420.9687]), 0., 1e-3);
        close(Benchmark::Himmelblau.evaluate(&[3., 2.]), 0., 1e-6);
        close(Benchmark::SixHump.evaluate(&[0.0898, -0.7126]), -1.0316, 1e-4);
        close(Benchmark::Matyas.evaluate(&[0., 0.]), 0., 1e-6);
    }

    #[test]
    fn test_values() {
        close(Benchmark::Quadratic.evaluate(&[1., 2.]), 5., 1e-6);
        // 100 * (1 - 0)^2 + (1 - 0)^2
        close(Benchmark::Rosenbrock.evaluate(&[0., 1.]), 101., 1e-4);
        close(Benchmark::Rastrigin.evaluate(&[1., 1.]), 2., 1e-5);
        close(Benchmark::Matyas.evaluate(&[1., 1.]), 0.04, 1e-6);
        assert!(Benchmark::Ackley.evaluate(&[1., 1.]) > 1.);
    }

    #[test]
    fn test_parse() {
        for b in Benchmark::ALL.iter() {
            assert_eq!(b.name().parse::<Benchmark>().unwrap(), *b);
        }
        assert_eq!("six-hump".parse::<Benchmark>().unwrap(), Benchmark::SixHump);
        assert!("sphere2".parse::<Benchmark>().is_err());
    }
}
