//! Deterministic random source and seed resolution.
//!
//! Every random decision in a race (entrant conditions, round draws, luck)
//! comes from a [`RandomSource`]. The production source is [`Mulberry32`]:
//! a 32-bit state advanced by a Weyl constant and finished with two rounds of
//! multiply/xor-shift mixing. It is pure integer arithmetic, so a seed
//! produces the same floats on every host.

use derby_env::RaceContext;
use rand::{RngCore, SeedableRng};
use std::sync::Arc;

/// 2^32, the output divisor mapping a `u32` into [0, 1).
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Weyl increment applied to the state on every draw.
const WEYL_STEP: u32 = 0x6D2B_79F5;

/// Source of uniform floats in [0, 1).
pub trait RandomSource {
    /// Returns the next float in [0, 1).
    fn next_f64(&mut self) -> f64;
}

// =============================================================================
// MULBERRY32
// =============================================================================

/// Small, fast, deterministic PRNG with a 32-bit state.
///
/// Not cryptographic. Two generators built from the same seed yield the same
/// sequence forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    /// Creates a generator from a 32-bit seed.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Advances the state and returns the next mixed 32-bit word.
    fn step(&mut self) -> u32 {
        self.state = self.state.wrapping_add(WEYL_STEP);
        let t = self.state;

        let mut x = (t ^ (t >> 15)).wrapping_mul(1 | t);
        x ^= x.wrapping_add((x ^ (x >> 7)).wrapping_mul(61 | x));
        x ^ (x >> 14)
    }
}

impl RandomSource for Mulberry32 {
    fn next_f64(&mut self) -> f64 {
        self.step() as f64 / TWO_POW_32
    }
}

impl RngCore for Mulberry32 {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        let lo = self.step() as u64;
        let hi = self.step() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.step().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Mulberry32 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }

    /// Truncates to the low 32 bits so `seed_from_u64(n) == new(n as u32)`.
    fn seed_from_u64(state: u64) -> Self {
        Self::new(state as u32)
    }
}

// =============================================================================
// TEST AND ADAPTER SOURCES
// =============================================================================

/// Source that always returns the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSource(pub f64);

impl RandomSource for ConstantSource {
    fn next_f64(&mut self) -> f64 {
        self.0
    }
}

/// Source backed by a closure.
pub struct FnSource<F>(F);

/// Wraps a closure as a [`RandomSource`].
pub fn from_fn<F: FnMut() -> f64>(f: F) -> FnSource<F> {
    FnSource(f)
}

impl<F: FnMut() -> f64> RandomSource for FnSource<F> {
    fn next_f64(&mut self) -> f64 {
        (self.0)()
    }
}

// =============================================================================
// SEED RESOLUTION
// =============================================================================

/// Parses an external seed string.
///
/// Accepts any finite decimal number (surrounding whitespace ignored) and
/// reduces it to 32 bits by truncating toward zero and wrapping modulo 2^32.
/// Returns `None` for absent, blank, unparsable or non-finite input.
pub fn parse_seed(raw: Option<&str>) -> Option<u32> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let value: f64 = raw.parse().ok()?;
    value.is_finite().then(|| wrap_u32(value))
}

/// Resolves the seed for a new stream: the parsed external seed, or the
/// clock in milliseconds (low 32 bits) when there is none.
pub fn resolve_seed(raw: Option<&str>, now_ms: impl FnOnce() -> u64) -> u32 {
    parse_seed(raw).unwrap_or_else(|| now_ms() as u32)
}

fn wrap_u32(value: f64) -> u32 {
    value.trunc().rem_euclid(TWO_POW_32) as u32
}

// =============================================================================
// FACTORIES
// =============================================================================

/// Creates a fresh random stream per race start or generate call.
pub trait RngFactory: Send + Sync {
    fn create(&self) -> Box<dyn RandomSource + Send>;
}

/// Production factory: external seed when configured, clock otherwise.
pub struct SeedPolicy {
    read_seed: Box<dyn Fn() -> Option<String> + Send + Sync>,
    now_ms: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl SeedPolicy {
    /// Creates a policy from a seed reader and a millisecond clock.
    pub fn new(
        read_seed: impl Fn() -> Option<String> + Send + Sync + 'static,
        now_ms: impl Fn() -> u64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            read_seed: Box::new(read_seed),
            now_ms: Box::new(now_ms),
        }
    }

    /// Policy that always resolves to `seed`.
    pub fn fixed(seed: u32) -> Self {
        Self::new(move || Some(seed.to_string()), || 0)
    }

    /// Policy reading the seed hint and wall clock of an environment context.
    pub fn from_context<Ctx: RaceContext>(ctx: Arc<Ctx>) -> Self {
        let clock = Arc::clone(&ctx);
        Self::new(move || ctx.seed_hint(), move || clock.wall_clock_millis())
    }

    /// Resolves the seed the next stream will use.
    pub fn resolve(&self) -> u32 {
        let raw = (self.read_seed)();
        resolve_seed(raw.as_deref(), || (self.now_ms)())
    }
}

impl RngFactory for SeedPolicy {
    fn create(&self) -> Box<dyn RandomSource + Send> {
        Box::new(Mulberry32::new(self.resolve()))
    }
}

/// Factory backed by a closure.
pub struct FnFactory<F>(F);

/// Wraps a closure as an [`RngFactory`].
pub fn factory_fn<F>(f: F) -> FnFactory<F>
where
    F: Fn() -> Box<dyn RandomSource + Send> + Send + Sync,
{
    FnFactory(f)
}

impl<F> RngFactory for FnFactory<F>
where
    F: Fn() -> Box<dyn RandomSource + Send> + Send + Sync,
{
    fn create(&self) -> Box<dyn RandomSource + Send> {
        (self.0)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn take<R: RandomSource>(rng: &mut R, n: usize) -> Vec<f64> {
        (0..n).map(|_| rng.next_f64()).collect()
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Mulberry32::new(42);
        let mut b = Mulberry32::new(42);

        assert_eq!(take(&mut a, 1000), take(&mut b, 1000));
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = Mulberry32::new(1);
        let mut b = Mulberry32::new(2);

        assert_ne!(take(&mut a, 10), take(&mut b, 10));
    }

    #[test]
    fn test_seedable_rng_matches_new() {
        let mut direct = Mulberry32::new(777);
        let mut seeded = Mulberry32::seed_from_u64(777);
        let mut from_bytes = Mulberry32::from_seed(777u32.to_le_bytes());

        let expected = take(&mut direct, 5);
        assert_eq!(take(&mut seeded, 5), expected);
        assert_eq!(take(&mut from_bytes, 5), expected);
    }

    #[test]
    fn test_rng_core_shares_the_stream() {
        let mut a = Mulberry32::new(9);
        let mut b = Mulberry32::new(9);

        let word = a.next_u32();
        assert_eq!(word as f64 / TWO_POW_32, b.next_f64());

        let mut bytes = [0u8; 6];
        a.fill_bytes(&mut bytes);
        let w1 = b.step().to_le_bytes();
        let w2 = b.step().to_le_bytes();
        assert_eq!(&bytes[..4], &w1);
        assert_eq!(&bytes[4..], &w2[..2]);
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed(Some("777")), Some(777));
        assert_eq!(parse_seed(Some(" 42 ")), Some(42));
        assert_eq!(parse_seed(Some("42.9")), Some(42));
        assert_eq!(parse_seed(Some("-1")), Some(u32::MAX));
        assert_eq!(parse_seed(Some("4294967297")), Some(1));
        assert_eq!(parse_seed(Some("not-a-number")), None);
        assert_eq!(parse_seed(Some("inf")), None);
        assert_eq!(parse_seed(Some("")), None);
        assert_eq!(parse_seed(Some("   ")), None);
        assert_eq!(parse_seed(Some("0x10")), None);
        assert_eq!(parse_seed(None), None);
    }

    #[test]
    fn test_resolve_seed_uses_env_seed_when_provided() {
        assert_eq!(resolve_seed(Some("777"), || 5), 777);
    }

    #[test]
    fn test_resolve_seed_falls_back_to_clock() {
        assert_eq!(resolve_seed(None, || 999), 999);
        assert_eq!(resolve_seed(Some("not-a-number"), || 12345), 12345);
        // Clock values wrap to 32 bits
        assert_eq!(resolve_seed(None, || (1u64 << 32) + 7), 7);
    }

    #[test]
    fn test_seed_policy_matches_direct_generator() {
        let policy = SeedPolicy::new(|| Some("777".to_string()), || 0);
        let mut from_policy = policy.create();
        let mut direct = Mulberry32::new(777);

        for _ in 0..10 {
            assert_eq!(from_policy.next_f64(), direct.next_f64());
        }
    }

    #[test]
    fn test_seed_policy_clock_fallback() {
        let policy = SeedPolicy::new(|| None, || 999);
        assert_eq!(policy.resolve(), 999);
    }

    #[test]
    fn test_fn_source_and_factory() {
        let mut i = 0u32;
        let mut source = from_fn(move || {
            i += 1;
            f64::from(i % 100) / 100.0
        });
        assert_eq!(source.next_f64(), 0.01);
        assert_eq!(source.next_f64(), 0.02);

        let factory = factory_fn(|| Box::new(ConstantSource(0.5)) as Box<dyn RandomSource + Send>);
        assert_eq!(factory.create().next_f64(), 0.5);
    }

    proptest! {
        #[test]
        fn prop_output_in_unit_interval(seed in any::<u32>()) {
            let mut rng = Mulberry32::new(seed);
            for _ in 0..256 {
                let x = rng.next_f64();
                prop_assert!((0.0..1.0).contains(&x));
            }
        }

        #[test]
        fn prop_reproducible(seed in any::<u32>(), n in 1usize..512) {
            let mut a = Mulberry32::new(seed);
            let mut b = Mulberry32::new(seed);
            prop_assert_eq!(take(&mut a, n), take(&mut b, n));
        }
    }
}
