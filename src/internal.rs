use rand::Rng;

use crate::scalar::Real;


#[inline]
pub fn negative_index(i: isize, n: usize, start_behind: bool) -> usize {
  if i < 0 {
    let offset = if start_behind { 1 } else { 0 };
    (n as isize + i + offset) as usize
  } else {
    i as usize
  }
}


// Dimensions kept by a reduction over `dim..`, padded with ones

pub fn keep_dims(dims: &[usize], dim: isize) -> Vec<usize> {
  let udim = negative_index(dim, dims.len(), false);
  let mut kept = dims[..udim].to_vec();
  kept.resize(dims.len(), 1);
  kept
}


// Polar Box-Muller transformation

pub fn randn<T: Real, R: Rng>(rng: &mut R) -> (T, T) {
  let two = T::one() + T::one();
  loop {
    let u = rng.gen_range(-T::one(), T::one());
    let v = rng.gen_range(-T::one(), T::one());
    let r = u * u + v * v;
    // Try again if outside interval
    if r == T::zero() || r >= T::one() { continue }
    let c = (-two * r.ln() / r).sqrt();
    return (u * c, v * c)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };

  #[test]
  fn keeps_leading_dims() {
    assert_eq!(keep_dims(&[2, 3, 4], -1), vec![2, 3, 1]);
    assert_eq!(keep_dims(&[2, 3, 4], 1), vec![2, 1, 1]);
    assert_eq!(keep_dims(&[5], 0), vec![1]);
  }

  #[test]
  fn standard_normal_pairs() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
      let (a, b): (f64, f64) = randn(&mut rng);
      assert!(a.is_finite() && b.is_finite());
    }
  }
}
